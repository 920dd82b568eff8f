//! Newline framing (panic-free).

use bytes::BytesMut;

/// Line delimiter.
pub const LINE_DELIMITER: u8 = b'\n';

/// Incremental line splitter over a growing read buffer.
///
/// Remembers how far the pending partial line has been searched, so each read
/// only scans the bytes it appended. The buffer must only grow at the back
/// between calls, apart from what this framer or [`take_trailing`] removes.
#[derive(Debug, Default)]
pub struct LineFramer {
    scanned: usize,
}

impl LineFramer {
    /// Split the next complete line (delimiter included) off the front of
    /// `buf`.
    ///
    /// Returns `None` when `buf` holds no delimiter yet; the partial line stays
    /// buffered for the next read.
    pub fn next_line(&mut self, buf: &mut BytesMut) -> Option<BytesMut> {
        let start = self.scanned.min(buf.len());
        let found = buf
            .get(start..)
            .and_then(|tail| tail.iter().position(|b| *b == LINE_DELIMITER));

        match found {
            Some(off) => {
                self.scanned = 0;
                Some(buf.split_to(start + off + 1))
            }
            None => {
                self.scanned = buf.len();
                None
            }
        }
    }

    /// Bytes of the pending partial line already searched.
    pub fn scanned(&self) -> usize {
        self.scanned
    }
}

/// Drain an unterminated trailing line left at end-of-stream.
pub fn take_trailing(buf: &mut BytesMut) -> Option<BytesMut> {
    if buf.is_empty() {
        None
    } else {
        Some(buf.split())
    }
}
