use std::fmt;
use std::io::{self, IoSlice, Write};

use crate::http::error::ResponseError;
use crate::http::resource::MappedFile;
use crate::http::response::StatusCode;

const HTTP_VERSION: &str = "HTTP/1.1";

/// Default capacity of a connection's write buffer.
pub const WRITE_BUFFER_SIZE: usize = 1024;

/// Fixed-capacity buffer holding the status line, headers and error bodies.
#[derive(Debug)]
pub struct WriteBuffer {
    buf: Box<[u8]>,
    filled: usize,
}

impl WriteBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            filled: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.filled]
    }

    pub fn clear(&mut self) {
        self.filled = 0;
    }

    /// Appends formatted text. Nothing is kept if it does not fit entirely.
    pub fn append(&mut self, args: fmt::Arguments<'_>) -> Result<(), ResponseError> {
        let capacity = self.buf.len();
        let mut spare = &mut self.buf[self.filled..];
        let available = spare.len();
        spare
            .write_fmt(args)
            .map_err(|_| ResponseError::Overflow { capacity })?;
        self.filled += available - spare.len();
        Ok(())
    }

    pub fn add_status_line(&mut self, status: StatusCode) -> Result<(), ResponseError> {
        self.append(format_args!(
            "{} {} {}\r\n",
            HTTP_VERSION,
            status.as_u16(),
            status.reason_phrase()
        ))
    }

    pub fn add_headers(&mut self, content_length: usize, linger: bool) -> Result<(), ResponseError> {
        self.append(format_args!("Content-Length: {content_length}\r\n"))?;
        self.append(format_args!(
            "Connection: {}\r\n",
            if linger { "keep-alive" } else { "close" }
        ))?;
        self.append(format_args!("\r\n"))
    }

    pub fn add_content(&mut self, content: &str) -> Result<(), ResponseError> {
        self.append(format_args!("{content}"))
    }
}

/// Whether the send loop drained everything it was given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendStatus {
    Complete,
    WouldBlock,
}

/// Assembles one response and transmits it with scatter/gather writes.
///
/// The transmission is at most two segments: the bytes of the write buffer
/// and, for a file response, the mapped file. File bytes are never copied.
#[derive(Debug)]
pub struct ResponseWriter {
    header: WriteBuffer,
    file: Option<MappedFile>,
    sent: usize,
}

impl ResponseWriter {
    pub fn new() -> Self {
        Self::with_capacity(WRITE_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            header: WriteBuffer::with_capacity(capacity),
            file: None,
            sent: 0,
        }
    }

    pub fn buffer(&self) -> &WriteBuffer {
        &self.header
    }

    /// Bytes sent so far across all attempts.
    pub fn sent(&self) -> usize {
        self.sent
    }

    /// Total bytes of the prepared response.
    pub fn total(&self) -> usize {
        self.header.filled() + self.file.as_ref().map_or(0, |file| file.len())
    }

    pub fn is_pending(&self) -> bool {
        self.sent < self.total()
    }

    pub fn has_file(&self) -> bool {
        self.file.is_some()
    }

    /// Prepares a 200 response for a resolved file.
    pub fn prepare_file(&mut self, file: MappedFile, linger: bool) -> Result<(), ResponseError> {
        self.release();
        if file.is_empty() {
            return self.prepare_page(StatusCode::Ok, linger);
        }
        let result = self
            .header
            .add_status_line(StatusCode::Ok)
            .and_then(|()| self.header.add_headers(file.len(), linger));
        match result {
            Ok(()) => self.file = Some(file),
            Err(_) => self.header.clear(),
        }
        result
    }

    /// Prepares a response whose body is the canonical page of `status`.
    pub fn prepare_page(&mut self, status: StatusCode, linger: bool) -> Result<(), ResponseError> {
        self.release();
        let result = Self::write_page(&mut self.header, status, linger);
        if result.is_err() {
            self.header.clear();
        }
        result
    }

    fn write_page(header: &mut WriteBuffer, status: StatusCode, linger: bool) -> Result<(), ResponseError> {
        let body = status.canonical_body();
        header.add_status_line(status)?;
        header.add_headers(body.len(), linger)?;
        header.add_content(body)
    }

    /// Writes pending bytes until done or the socket would block.
    ///
    /// Progress survives a would-block result; the next call resumes where
    /// this one stopped.
    pub fn send<W: Write>(&mut self, stream: &mut W) -> io::Result<SendStatus> {
        while self.is_pending() {
            let header = self.header.as_bytes();
            let body: &[u8] = self.file.as_deref().unwrap_or(&[]);

            let slices = if self.sent < header.len() {
                [IoSlice::new(&header[self.sent..]), IoSlice::new(body)]
            } else {
                [IoSlice::new(&body[self.sent - header.len()..]), IoSlice::new(&[])]
            };

            match stream.write_vectored(&slices) {
                Ok(0) => return Err(io::ErrorKind::WriteZero.into()),
                Ok(n) => self.sent += n,
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(SendStatus::WouldBlock),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
        Ok(SendStatus::Complete)
    }

    /// Drops the file mapping and forgets the prepared response.
    pub fn release(&mut self) {
        self.file = None;
        self.header.clear();
        self.sent = 0;
    }
}

impl Default for ResponseWriter {
    fn default() -> Self {
        Self::new()
    }
}
