use std::fmt;

/// Normalizes a client supplied path into directory form.
///
/// Backslashes are treated as separators, repeated separators collapse,
/// `.` segments vanish and `..` pops the previous segment. Popping past the
/// root is a no-op. The result always starts and ends with `/`.
pub fn normalize(input: &str) -> String {
    let path = input.replace('\\', "/");

    let segments = path.split('/').fold(Vec::new(), |mut acc, segment| {
        match segment {
            "" | "." => {}
            ".." => {
                acc.pop();
            }
            part => acc.push(part),
        }
        acc
    });

    let mut out = String::with_capacity(path.len() + 2);
    out.push('/');
    for segment in segments {
        out.push_str(segment);
        out.push('/');
    }
    out
}

/// An absolute, normalized path in the server namespace, e.g. `/LittleFS/logs/`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct VirtualPath(String);

impl VirtualPath {
    pub fn root() -> Self {
        VirtualPath("/".to_string())
    }

    pub fn new(path: &str) -> Self {
        VirtualPath(normalize(path))
    }

    /// Resolves client input against this directory. Absolute input ignores
    /// the current directory, `.` keeps it.
    pub fn join(&self, input: &str) -> Self {
        if input == "." {
            return self.clone();
        }
        if input.starts_with('/') || input.starts_with('\\') {
            VirtualPath::new(input)
        } else {
            VirtualPath::new(&format!("{}{}", self.0, input))
        }
    }

    pub fn is_root(&self) -> bool {
        self.0 == "/"
    }

    /// Directory form, with the trailing slash.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// File form: `/LittleFS/a.txt` rather than `/LittleFS/a.txt/`.
    pub fn as_file_path(&self) -> &str {
        if self.is_root() {
            &self.0
        } else {
            self.0.trim_end_matches('/')
        }
    }

    pub fn parent(&self) -> Self {
        self.join("..")
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
