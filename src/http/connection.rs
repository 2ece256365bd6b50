use std::io::{self, Read, Write};
use std::path::Path;
use std::sync::Arc;

use crate::http::error::RequestError;
use crate::http::parser::{ParseStatus, READ_BUFFER_SIZE, RequestParser};
use crate::http::resource;
use crate::http::writer::{ResponseWriter, SendStatus, WRITE_BUFFER_SIZE};

/// What the caller must do with the descriptor after [`Connection::handle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Next {
    /// Re-arm for read interest and call again when data arrives
    Read,
    /// Re-arm for write interest and call again when the socket is writable
    Write,
    /// Deregister and close the descriptor
    Close,
}

/// The readiness the caller observed on the descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Readable,
    Writable,
}

/// Per-socket HTTP state.
///
/// Created on accept, reset in place after each keep-alive response and
/// dropped on close. The caller guarantees that at most one thread drives a
/// given connection at a time; nothing inside is locked.
#[derive(Debug)]
pub struct Connection<S> {
    stream: S,
    doc_root: Arc<Path>,
    parser: RequestParser,
    writer: ResponseWriter,
    linger: bool,
}

impl<S: Read + Write> Connection<S> {
    pub fn new(stream: S, doc_root: Arc<Path>) -> Self {
        Self::with_capacity(stream, doc_root, READ_BUFFER_SIZE, WRITE_BUFFER_SIZE)
    }

    pub fn with_capacity(stream: S, doc_root: Arc<Path>, read_capacity: usize, write_capacity: usize) -> Self {
        Self {
            stream,
            doc_root,
            parser: RequestParser::with_capacity(read_capacity),
            writer: ResponseWriter::with_capacity(write_capacity),
            linger: false,
        }
    }

    pub fn stream(&self) -> &S {
        &self.stream
    }

    pub fn stream_mut(&mut self) -> &mut S {
        &mut self.stream
    }

    pub fn parser(&self) -> &RequestParser {
        &self.parser
    }

    pub fn writer(&self) -> &ResponseWriter {
        &self.writer
    }

    /// Runs one readiness event through the engine.
    pub fn handle(&mut self, readiness: Readiness) -> Next {
        match readiness {
            Readiness::Readable => match self.read() {
                Ok(_) => self.process(),
                Err(e) => {
                    tracing::debug!(error = %e, "Read failed, closing connection");
                    Next::Close
                }
            },
            Readiness::Writable => self.write(),
        }
    }

    /// Drains the socket into the read buffer until it would block.
    ///
    /// Returns the number of bytes received. A peer that closed its end is
    /// reported as `UnexpectedEof`. Reading stops early once the buffer is
    /// full; the parser then rejects the request as too large.
    pub fn read(&mut self) -> io::Result<usize> {
        let mut received = 0;
        loop {
            let spare = self.parser.buffer_mut().spare_mut();
            if spare.is_empty() {
                return Ok(received);
            }
            match self.stream.read(spare) {
                Ok(0) => return Err(io::ErrorKind::UnexpectedEof.into()),
                Ok(n) => {
                    self.parser.buffer_mut().commit(n);
                    received += n;
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(received),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => {}
                Err(e) => return Err(e),
            }
        }
    }

    /// Parses what has been received and, once the request is decided,
    /// prepares the response.
    pub fn process(&mut self) -> Next {
        let outcome = match self.parser.parse() {
            Ok(ParseStatus::Incomplete) => return Next::Read,
            Ok(ParseStatus::Complete) => {
                let request = self.parser.request();
                tracing::debug!(method = ?request.method, url = %request.url, "Request received");
                resource::resolve(&self.doc_root, &request.url)
            }
            Err(e) => Err(RequestError::from(e)),
        };

        self.linger = self.parser.request().linger;

        let prepared = match outcome {
            Ok(file) => {
                tracing::debug!(path = %file.path().display(), size = file.len(), status = 200, "Serving file");
                self.writer.prepare_file(file, self.linger)
            }
            Err(e) => {
                let status = e.status();
                tracing::debug!(error = %e, status = status.as_u16(), "Request failed");
                self.writer.prepare_page(status, self.linger)
            }
        };

        match prepared {
            Ok(()) => Next::Write,
            Err(e) => {
                tracing::error!(error = %e, "Failed to assemble response");
                self.writer.release();
                Next::Close
            }
        }
    }

    /// Sends the prepared response.
    pub fn write(&mut self) -> Next {
        if !self.writer.is_pending() {
            self.reset();
            return Next::Read;
        }

        match self.writer.send(&mut self.stream) {
            Ok(SendStatus::WouldBlock) => Next::Write,
            Ok(SendStatus::Complete) => {
                self.writer.release();
                if self.linger {
                    self.reset();
                    Next::Read
                } else {
                    Next::Close
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, sent = self.writer.sent(), "Send failed, dropping response");
                self.writer.release();
                Next::Close
            }
        }
    }

    /// Returns the connection to its initial state for the next request.
    pub fn reset(&mut self) {
        self.parser.reset();
        self.writer.release();
        self.linger = false;
    }
}
