#![allow(dead_code)]

use std::collections::VecDeque;
use std::fs;
use std::io::{self, IoSlice, Read, Write};
use std::os::unix::fs::PermissionsExt;
use std::path::Path;

use tempfile::TempDir;

/// In-memory stream behaving like a non-blocking socket.
///
/// Reads hand out the fed chunks one at a time and report `WouldBlock` once
/// they run out, or end-of-stream after [`MockStream::close_input`]. Writes
/// accept at most the remaining write budget.
#[derive(Debug, Default)]
pub struct MockStream {
    input: VecDeque<Vec<u8>>,
    eof: bool,
    written: Vec<u8>,
    write_budget: Option<usize>,
    fail_writes: bool,
}

impl MockStream {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_input(bytes: &[u8]) -> Self {
        let mut stream = Self::new();
        stream.feed(bytes);
        stream
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.input.push_back(bytes.to_vec());
    }

    pub fn close_input(&mut self) {
        self.eof = true;
    }

    /// Limits how many more bytes writes accept. `None` removes the limit.
    pub fn set_write_budget(&mut self, budget: Option<usize>) {
        self.write_budget = budget;
    }

    pub fn fail_writes(&mut self) {
        self.fail_writes = true;
    }

    pub fn written(&self) -> &[u8] {
        &self.written
    }

    pub fn written_str(&self) -> String {
        String::from_utf8_lossy(&self.written).into_owned()
    }

    pub fn take_written(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.written)
    }

    fn accept(&mut self, len: usize) -> io::Result<usize> {
        if self.fail_writes {
            return Err(io::ErrorKind::BrokenPipe.into());
        }
        match self.write_budget {
            Some(0) => Err(io::ErrorKind::WouldBlock.into()),
            Some(budget) => {
                let n = budget.min(len);
                self.write_budget = Some(budget - n);
                Ok(n)
            }
            None => Ok(len),
        }
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let Some(chunk) = self.input.front_mut() else {
            if self.eof {
                return Ok(0);
            }
            return Err(io::ErrorKind::WouldBlock.into());
        };

        let n = chunk.len().min(buf.len());
        buf[..n].copy_from_slice(&chunk[..n]);
        chunk.drain(..n);
        if chunk.is_empty() {
            self.input.pop_front();
        }
        Ok(n)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.accept(buf.len())?;
        self.written.extend_from_slice(&buf[..n]);
        Ok(n)
    }

    fn write_vectored(&mut self, bufs: &[IoSlice<'_>]) -> io::Result<usize> {
        let total = bufs.iter().map(|buf| buf.len()).sum();
        let mut remaining = self.accept(total)?;
        let accepted = remaining;
        for buf in bufs {
            let n = remaining.min(buf.len());
            self.written.extend_from_slice(&buf[..n]);
            remaining -= n;
        }
        Ok(accepted)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Creates a document root holding world-readable `files`.
pub fn doc_root(files: &[(&str, &[u8])]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (name, contents) in files {
        add_file(dir.path(), name, contents, 0o644);
    }
    dir
}

pub fn add_file(root: &Path, name: &str, contents: &[u8], mode: u32) {
    let path = root.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, contents).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(mode)).unwrap();
}

/// Splits a raw response into its head (status line and headers) and body.
pub fn split_response(raw: &[u8]) -> (String, Vec<u8>) {
    let end = raw
        .windows(4)
        .position(|w| w == b"\r\n\r\n")
        .expect("response has no header terminator");
    let head = String::from_utf8(raw[..end].to_vec()).unwrap();
    (head, raw[end + 4..].to_vec())
}

/// The exact bytes of a response carrying `body`.
pub fn expected_response(status: &str, body: &[u8], keep_alive: bool) -> Vec<u8> {
    let connection = if keep_alive { "keep-alive" } else { "close" };
    let mut raw = format!(
        "HTTP/1.1 {status}\r\nContent-Length: {}\r\nConnection: {connection}\r\n\r\n",
        body.len()
    )
    .into_bytes();
    raw.extend_from_slice(body);
    raw
}
