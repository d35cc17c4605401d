//! Line transport
//!
//! Splits the DBI3 byte stream into lines. The device terminates lines with
//! `\n\r`, so a line ends at `\n` and the stray `\r` left at the start of the
//! next line is trimmed along with any other surrounding whitespace.

use std::io::{self, Read};
use tracing::warn;

use super::{CommunicationChannel, ProtocolError, READ_CHUNK_SIZE};

/// Result of a single line read
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadLine {
    /// A complete line, trimmed of surrounding whitespace
    Line(String),
    /// No complete line arrived before the read timeout
    TimedOut,
}

impl ReadLine {
    /// The line text, or `None` on timeout
    pub fn into_line(self) -> Option<String> {
        match self {
            ReadLine::Line(line) => Some(line),
            ReadLine::TimedOut => None,
        }
    }
}

/// Buffered line reader over a [`CommunicationChannel`]
///
/// Bytes read past the end of a line stay buffered for the next call.
pub struct LineReader<C> {
    channel: C,
    buf: Vec<u8>,
    consumed: usize,
}

impl<C: CommunicationChannel> LineReader<C> {
    /// Reader over `channel` with an empty buffer
    pub fn new(channel: C) -> Self {
        Self {
            channel,
            buf: Vec::with_capacity(READ_CHUNK_SIZE),
            consumed: 0,
        }
    }

    /// Read one line, blocking for at most the channel timeout per read
    pub fn read_line(&mut self) -> Result<ReadLine, ProtocolError> {
        let mut chunk = [0u8; READ_CHUNK_SIZE];

        loop {
            if let Some(line) = self.take_line() {
                let text = std::str::from_utf8(&line)?;
                return Ok(ReadLine::Line(text.trim().to_string()));
            }

            // Read whatever is waiting, but at least one byte so the read
            // blocks until data or timeout.
            let waiting = self.channel.bytes_to_read().unwrap_or(0) as usize;
            let want = waiting.clamp(1, READ_CHUNK_SIZE);

            match self.channel.read(&mut chunk[..want]) {
                Ok(0) => return Ok(self.timed_out()),
                Ok(n) => self.buf.extend_from_slice(&chunk[..n]),
                Err(e) if is_timeout(&e) => return Ok(self.timed_out()),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Drop everything buffered, returning how many bytes were discarded
    pub fn discard_buffered(&mut self) -> usize {
        let dropped = self.buffered_len();
        self.buf.clear();
        self.consumed = 0;
        dropped
    }

    /// Bytes received but not yet returned as a line
    pub fn buffered_len(&self) -> usize {
        self.buf.len() - self.consumed
    }

    /// Access the underlying channel
    pub fn get_mut(&mut self) -> &mut C {
        &mut self.channel
    }

    /// Access the underlying channel
    pub fn get_ref(&self) -> &C {
        &self.channel
    }

    /// Consume the reader, returning the channel
    pub fn into_inner(self) -> C {
        self.channel
    }

    /// Split the next `\n`-terminated line off the buffer
    fn take_line(&mut self) -> Option<Vec<u8>> {
        let pending = &self.buf[self.consumed..];
        let pos = pending.iter().position(|&b| b == b'\n')?;
        let line = pending[..pos].to_vec();
        self.consumed += pos + 1;

        if self.consumed == self.buf.len() {
            self.buf.clear();
            self.consumed = 0;
        }
        Some(line)
    }

    fn timed_out(&mut self) -> ReadLine {
        if self.consumed > 0 {
            self.buf.drain(..self.consumed);
            self.consumed = 0;
        }
        // The trailing `\r` of the device's `\n\r` is normally all that is left
        if self.buf.iter().any(|b| !b.is_ascii_whitespace()) {
            warn!(
                "Read timeout waiting for end of line, {} bytes buffered: {:?}",
                self.buf.len(),
                String::from_utf8_lossy(&self.buf)
            );
        }
        ReadLine::TimedOut
    }
}

pub(super) fn is_timeout(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::stream::mock::MockChannel;
    use pretty_assertions::assert_eq;

    fn lines_from(reader: &mut LineReader<MockChannel>) -> Vec<String> {
        let mut out = Vec::new();
        while let ReadLine::Line(line) = reader.read_line().unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn test_reversed_terminator() {
        let mut reader = LineReader::new(MockChannel::new().preload(b"abc\n\rdef\n\r"));
        assert_eq!(lines_from(&mut reader), vec!["abc", "def"]);
    }

    #[test]
    fn test_every_split_point() {
        let data = b"abc\n\rdef\n\r";
        for split in 1..data.len() {
            let mut channel = MockChannel::new().preload(data);
            channel.max_read = split;
            let mut reader = LineReader::new(channel);
            assert_eq!(lines_from(&mut reader), vec!["abc", "def"], "split at {}", split);
        }
    }

    #[test]
    fn test_conventional_terminator() {
        let mut reader = LineReader::new(MockChannel::new().preload(b"one\r\ntwo\r\n"));
        assert_eq!(lines_from(&mut reader), vec!["one", "two"]);
    }

    #[test]
    fn test_partial_line_stays_buffered() {
        let mut reader = LineReader::new(MockChannel::new().preload(b"ok\n\rpart"));
        assert_eq!(reader.read_line().unwrap(), ReadLine::Line("ok".into()));
        assert_eq!(reader.read_line().unwrap(), ReadLine::TimedOut);
        assert_eq!(reader.buffered_len(), 5);
    }

    #[test]
    fn test_invalid_utf8() {
        let mut reader = LineReader::new(MockChannel::new().preload(b"\xff\xfe\n\rok\n\r"));
        assert!(matches!(reader.read_line(), Err(ProtocolError::Encoding(_))));
        // The bad line is consumed, the stream continues
        assert_eq!(reader.read_line().unwrap(), ReadLine::Line("ok".into()));
    }

    #[test]
    fn test_empty_channel_times_out() {
        let mut reader = LineReader::new(MockChannel::new());
        assert_eq!(reader.read_line().unwrap(), ReadLine::TimedOut);
        assert_eq!(reader.discard_buffered(), 0);
    }
}
