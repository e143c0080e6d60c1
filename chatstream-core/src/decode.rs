//! Byte-to-line plumbing for the response body.
//!
//! Network reads can end anywhere, including inside a multi-byte character or
//! in the middle of a line, so both the decoder and the line buffer carry state
//! from one read to the next.

/// Incremental UTF-8 decoder.
///
/// An incomplete sequence at the end of a read is held back and completed by
/// the next read. Invalid bytes decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8StreamDecoder {
    pending: Vec<u8>,
}

impl Utf8StreamDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, bytes: &[u8]) -> String {
        let mut input = std::mem::take(&mut self.pending);
        input.extend_from_slice(bytes);

        let mut out = String::with_capacity(input.len());
        let mut rest = input.as_slice();
        loop {
            match std::str::from_utf8(rest) {
                Ok(s) => {
                    out.push_str(s);
                    break;
                }
                Err(e) => {
                    let (valid, after) = rest.split_at(e.valid_up_to());
                    out.push_str(&String::from_utf8_lossy(valid));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            rest = &after[bad..];
                        }
                        None => {
                            // truncated sequence at the end; wait for more bytes
                            self.pending = after.to_vec();
                            break;
                        }
                    }
                }
            }
        }
        out
    }

    /// Flushes at end of input. A dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        if self.pending.is_empty() {
            String::new()
        } else {
            self.pending.clear();
            char::REPLACEMENT_CHARACTER.to_string()
        }
    }
}

/// Splits decoded text on `\n`, holding back the trailing partial line.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `text` and returns every line it completed, without the `\n`.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buf.push_str(text);
        let Some(idx) = self.buf.rfind('\n') else {
            return Vec::new();
        };
        let tail = self.buf.split_off(idx + 1);
        let complete = std::mem::replace(&mut self.buf, tail);
        complete[..idx].split('\n').map(str::to_string).collect()
    }

    /// Returns the held-back fragment, leaving the buffer empty.
    pub fn take_remainder(&mut self) -> String {
        std::mem::take(&mut self.buf)
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}
