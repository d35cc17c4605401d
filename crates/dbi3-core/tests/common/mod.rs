//! Shared helpers for integration tests

#![allow(dead_code)]

use dbi3_core::protocol::CommunicationChannel;
use std::collections::VecDeque;
use std::io::{self, Read, Write};
use std::time::Duration;

/// Install a test log subscriber, honouring `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A fake DBI3: answers each `\r`-terminated command from a script
#[derive(Default)]
pub struct ScriptedDevice {
    script: VecDeque<(String, String)>,
    rx: VecDeque<u8>,
    pending: Vec<u8>,
    pub sent: Vec<String>,
    timeout: Duration,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reply to `command` with `lines`, each terminated the way the device does
    pub fn on(mut self, command: &str, lines: &[&str]) -> Self {
        let reply = lines.iter().map(|l| format!("{}\n\r", l)).collect();
        self.script.push_back((command.to_string(), reply));
        self
    }

    /// `fs stop` then `md mach`, as issued before each functional command
    pub fn idle(self) -> Self {
        self.on("fs stop", &["ok"]).on("md mach", &["ok"])
    }

    pub fn pending_commands(&self) -> usize {
        self.script.len()
    }
}

impl Read for ScriptedDevice {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.rx.is_empty() {
            return Err(io::ErrorKind::TimedOut.into());
        }
        let n = buf.len().min(self.rx.len());
        for (slot, byte) in buf.iter_mut().zip(self.rx.drain(..n)) {
            *slot = byte;
        }
        Ok(n)
    }
}

impl Write for ScriptedDevice {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        for &byte in buf {
            if byte != b'\r' {
                self.pending.push(byte);
                continue;
            }
            let command = String::from_utf8_lossy(&self.pending).into_owned();
            self.pending.clear();
            let (expected, reply) = self
                .script
                .pop_front()
                .unwrap_or_else(|| panic!("unscripted command '{}'", command));
            assert_eq!(command, expected);
            self.rx.extend(reply.as_bytes());
            self.sent.push(command);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for ScriptedDevice {
    fn set_timeout(&mut self, timeout: Duration) -> io::Result<()> {
        self.timeout = timeout;
        Ok(())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok(self.rx.len() as u32)
    }
}

/// Delivers fixed chunks of bytes, one per read
pub struct ChunkedChannel {
    chunks: VecDeque<Vec<u8>>,
}

impl ChunkedChannel {
    /// Empty chunks are dropped; a zero-length read means timeout
    pub fn new(chunks: &[&[u8]]) -> Self {
        Self {
            chunks: chunks
                .iter()
                .filter(|c| !c.is_empty())
                .map(|c| c.to_vec())
                .collect(),
        }
    }
}

impl Read for ChunkedChannel {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(chunk) = self.chunks.front_mut() else {
            return Err(io::ErrorKind::TimedOut.into());
        };
        let n = buf.len().min(chunk.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            self.chunks.pop_front();
        }
        Ok(n)
    }
}

impl Write for ChunkedChannel {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl CommunicationChannel for ChunkedChannel {
    fn set_timeout(&mut self, _timeout: Duration) -> io::Result<()> {
        Ok(())
    }

    fn timeout(&self) -> Duration {
        Duration::ZERO
    }

    fn bytes_to_read(&mut self) -> io::Result<u32> {
        Ok(self.chunks.front().map_or(0, |c| c.len() as u32))
    }
}
