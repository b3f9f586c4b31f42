use crate::constants::MAX_LINE_LENGTH;

/// Accumulates control channel bytes and hands out complete command lines.
///
/// The cursor only moves inside the current line: `get_word` and `get_rest`
/// consume it token by token, `next_line` drops it once dispatched.
#[derive(Debug, Default)]
pub struct CommandBuffer {
    buffer: Vec<u8>,
    cursor: usize,
}

impl CommandBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Position of the CR of the first CRLF in the buffer.
    fn line_end(&self) -> Option<usize> {
        self.buffer.windows(2).position(|pair| pair == b"\r\n")
    }

    pub fn has_line(&self) -> bool {
        self.line_end().is_some()
    }

    /// True when the pending bytes hold no complete line and exceed the
    /// line length limit.
    pub fn over_limit(&self) -> bool {
        !self.has_line() && self.buffer.len() > MAX_LINE_LENGTH
    }

    /// Discards everything buffered.
    pub fn clear(&mut self) {
        self.buffer.clear();
        self.cursor = 0;
    }

    /// Drops the current line and its terminator.
    pub fn next_line(&mut self) {
        match self.line_end() {
            Some(end) => {
                self.buffer.drain(..end + 2);
            }
            None => self.buffer.clear(),
        }
        self.cursor = 0;
    }

    fn limit(&self) -> usize {
        self.line_end().unwrap_or(self.buffer.len())
    }

    fn skip_spaces(&mut self, limit: usize) {
        while self.cursor < limit && self.buffer[self.cursor] == b' ' {
            self.cursor += 1;
        }
    }

    /// Next space delimited token of the current line, case preserved.
    pub fn get_word(&mut self) -> String {
        let limit = self.limit();
        self.skip_spaces(limit);
        let start = self.cursor;
        while self.cursor < limit && !matches!(self.buffer[self.cursor], b' ' | b'\r' | b'\n') {
            self.cursor += 1;
        }
        String::from_utf8_lossy(&self.buffer[start..self.cursor]).into_owned()
    }

    /// Remainder of the current line without leading spaces.
    pub fn get_rest(&mut self) -> String {
        let limit = self.limit();
        self.skip_spaces(limit);
        let start = self.cursor;
        self.cursor = limit;
        String::from_utf8_lossy(&self.buffer[start..limit]).into_owned()
    }
}
