//! Incremental line decoder.

use tracing::trace;

use super::{DATA_MARKER, DEFAULT_ERROR_MESSAGE, DONE_SENTINEL, Frame, FrameKind, StreamChunk};

/// Incremental parser for the chat stream.
///
/// Fragment boundaries may fall anywhere, including inside the `data:`
/// marker, inside a JSON record, or inside a multi-byte character. The
/// decoder keeps whatever follows the last newline and only emits a frame
/// once its line is complete.
///
/// Lines that are not payload lines, are not valid JSON, or carry an unknown
/// `type` are dropped without error.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: String,
    pending: Vec<u8>,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a text fragment and drain every frame whose line is now complete.
    pub fn consume(&mut self, fragment: &str) -> Vec<Frame> {
        if fragment.is_empty() {
            return Vec::new();
        }

        self.buffer.push_str(fragment);

        let mut frames = Vec::new();
        let mut start = 0;
        while let Some(offset) = self.buffer[start..].find('\n') {
            let end = start + offset;
            let line = &self.buffer[start..end];
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(frame) = decode_line(line) {
                frames.push(frame);
            }
            start = end + 1;
        }
        self.buffer.drain(..start);

        frames
    }

    /// Feed raw transport bytes.
    ///
    /// An incomplete UTF-8 sequence at the end of `bytes` is held back until
    /// the rest of the character arrives. Invalid sequences are replaced with
    /// U+FFFD.
    pub fn consume_bytes(&mut self, bytes: &[u8]) -> Vec<Frame> {
        if bytes.is_empty() {
            return Vec::new();
        }

        self.pending.extend_from_slice(bytes);

        let valid = match std::str::from_utf8(&self.pending) {
            Ok(_) => self.pending.len(),
            Err(e) if e.error_len().is_none() => e.valid_up_to(),
            Err(_) => self.pending.len(),
        };
        let text = String::from_utf8_lossy(&self.pending[..valid]).into_owned();
        self.pending.drain(..valid);

        self.consume(&text)
    }

    /// Decode whatever is left once the channel has closed.
    ///
    /// Servers normally terminate every line, so this only matters for a
    /// final line sent without its newline.
    pub fn finish(&mut self) -> Option<Frame> {
        if !self.pending.is_empty() {
            let tail = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            self.buffer.push_str(&tail);
        }

        let rest = std::mem::take(&mut self.buffer);
        let line = rest.strip_suffix('\r').unwrap_or(&rest);
        decode_line(line)
    }

    /// Returns true when no partial line is buffered.
    pub fn is_empty_buffer(&self) -> bool {
        self.buffer.trim().is_empty() && self.pending.is_empty()
    }

    /// Returns the number of buffered bytes not yet decoded.
    pub fn buffered_len(&self) -> usize {
        self.buffer.len() + self.pending.len()
    }
}

fn decode_line(line: &str) -> Option<Frame> {
    let data = line.strip_prefix(DATA_MARKER)?;
    let data = data.strip_prefix(' ').unwrap_or(data);

    if data.trim() == DONE_SENTINEL {
        return Some(Frame::new(FrameKind::Done, line, None));
    }

    let chunk: StreamChunk = match serde_json::from_str(data) {
        Ok(chunk) => chunk,
        Err(err) => {
            trace!(error = %err, line, "Dropping undecodable stream line");
            return None;
        }
    };

    let kind = match chunk.kind.as_str() {
        "message" => FrameKind::Message {
            content: chunk.content.clone().unwrap_or_default(),
        },
        "error" => FrameKind::Error {
            message: chunk
                .error
                .clone()
                .filter(|m| !m.is_empty())
                .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string()),
        },
        "done" => FrameKind::Done,
        other => {
            trace!(kind = other, "Dropping frame with unknown type");
            return None;
        }
    };

    Some(Frame::new(kind, line, Some(chunk)))
}
