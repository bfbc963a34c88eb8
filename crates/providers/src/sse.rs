//! Server-sent events line framing.
//!
//! Buffers raw bytes and only decodes complete lines, so a multi-byte UTF-8
//! character split across two network chunks is reassembled before decoding.

/// Longest SSE line accepted before the stream is declared malformed.
pub(crate) const MAX_LINE_BYTES: usize = 1024 * 1024;

#[derive(Debug, PartialEq, Eq)]
pub(crate) enum LineError {
    InvalidUtf8(usize),
    TooLong(usize),
}

impl std::fmt::Display for LineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidUtf8(len) => write!(f, "invalid UTF-8 in {len}-byte SSE line"),
            Self::TooLong(len) => write!(f, "SSE line exceeds {len} bytes without a newline"),
        }
    }
}

/// Accumulates bytes and yields complete lines (without the trailing `\n`/`\r\n`).
#[derive(Debug)]
pub(crate) struct LineBuffer {
    buf: Vec<u8>,
    /// Bytes of `buf` already known to contain no newline.
    scanned: usize,
    max_line: usize,
}

impl Default for LineBuffer {
    fn default() -> Self {
        Self::with_max_line(MAX_LINE_BYTES)
    }
}

impl LineBuffer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_max_line(max_line: usize) -> Self {
        Self {
            buf: Vec::new(),
            scanned: 0,
            max_line,
        }
    }

    pub(crate) fn push(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Pop the next complete line.
    pub(crate) fn next_line(&mut self) -> Option<Result<String, LineError>> {
        let Some(offset) = self.buf[self.scanned..].iter().position(|&b| b == b'\n') else {
            self.scanned = self.buf.len();
            if self.buf.len() > self.max_line {
                return Some(Err(LineError::TooLong(self.max_line)));
            }
            return None;
        };

        let end = self.scanned + offset;
        self.scanned = 0;
        if end > self.max_line {
            return Some(Err(LineError::TooLong(self.max_line)));
        }
        let mut line: Vec<u8> = self.buf.drain(..=end).collect();
        line.pop();
        Some(decode(line))
    }

    /// Take whatever follows the last newline as a final line, once the
    /// byte stream has ended. Whitespace-only leftovers yield `None`.
    pub(crate) fn finish(&mut self) -> Option<Result<String, LineError>> {
        self.scanned = 0;
        let rest = std::mem::take(&mut self.buf);
        if rest.iter().all(u8::is_ascii_whitespace) {
            return None;
        }
        Some(decode(rest))
    }
}

fn decode(mut line: Vec<u8>) -> Result<String, LineError> {
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    let len = line.len();
    String::from_utf8(line).map_err(|_| LineError::InvalidUtf8(len))
}

/// One meaningful SSE line.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum SseLine<'a> {
    Data(&'a str),
    /// Blank lines, comments, and `event:`/`id:`/`retry:` fields.
    Ignored,
}

pub(crate) fn classify(line: &str) -> SseLine<'_> {
    if line.is_empty() || line.starts_with(':') {
        return SseLine::Ignored;
    }
    match line.strip_prefix("data:") {
        Some(data) => SseLine::Data(data.strip_prefix(' ').unwrap_or(data)),
        None => SseLine::Ignored,
    }
}
