use crate::core_vfs::error::PathError;
use crate::core_vfs::path::VirtualPath;
use crate::core_vfs::FileSystem;
use std::fmt;
use std::sync::Arc;

/// Identity of a mount, stable for the lifetime of the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MountId(usize);

pub struct Mount {
    pub id: MountId,
    pub prefix: VirtualPath,
    pub fs: Arc<dyn FileSystem>,
    pub available: bool,
}

impl fmt::Debug for Mount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mount")
            .field("id", &self.id)
            .field("prefix", &self.prefix)
            .field("available", &self.available)
            .finish()
    }
}

/// A virtual path mapped onto the filesystem that owns it.
#[derive(Clone)]
pub struct Resolved {
    pub mount: MountId,
    pub fs: Arc<dyn FileSystem>,
    /// Path relative to the mount root, `/` for the mount itself.
    pub path: String,
}

impl fmt::Debug for Resolved {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolved")
            .field("mount", &self.mount)
            .field("path", &self.path)
            .finish()
    }
}

#[derive(Debug, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new() -> Self {
        Self { mounts: Vec::new() }
    }

    /// Registers a filesystem under `prefix` and returns its identity.
    pub fn mount(&mut self, prefix: &str, fs: Arc<dyn FileSystem>, available: bool) -> MountId {
        let id = MountId(self.mounts.len());
        self.mounts.push(Mount {
            id,
            prefix: VirtualPath::new(prefix),
            fs,
            available,
        });
        id
    }

    pub fn available(&self) -> impl Iterator<Item = &Mount> {
        self.mounts.iter().filter(|mount| mount.available)
    }

    /// Maps a virtual path onto the mount with the longest matching prefix.
    ///
    /// The root itself belongs to no mount. A matching mount whose
    /// filesystem failed to initialise resolves as not found.
    pub fn resolve(&self, path: &VirtualPath) -> Result<Resolved, PathError> {
        let mount = self
            .mounts
            .iter()
            .filter(|mount| path.as_str().starts_with(mount.prefix.as_str()))
            .max_by_key(|mount| mount.prefix.as_str().len())
            .ok_or_else(|| PathError::NotMounted(path.to_string()))?;

        if !mount.available {
            return Err(PathError::Unavailable(mount.prefix.to_string()));
        }

        // prefix ends with '/', so the remainder is "" or "logs/" style
        let rest = &path.as_str()[mount.prefix.as_str().len()..];
        let relative = format!("/{}", rest.trim_end_matches('/'));

        Ok(Resolved {
            mount: mount.id,
            fs: Arc::clone(&mount.fs),
            path: relative,
        })
    }
}
