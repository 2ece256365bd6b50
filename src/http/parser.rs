//! Restartable request parser.
//!
//! The parser works directly on the connection's fixed-capacity read buffer
//! and keeps all of its progress in the buffer cursors, so it can be invoked
//! again after every non-blocking receive without re-scanning bytes it has
//! already classified. Feeding a request in any number of pieces yields the
//! same result as feeding it at once.

use std::ops::Range;

use crate::http::error::ParseError;
use crate::http::request::{HeaderLine, Request};

/// Default capacity of a connection's read buffer.
pub const READ_BUFFER_SIZE: usize = 2048;

/// Fixed-capacity receive buffer.
///
/// Invariant: `line_start <= consumed <= filled <= capacity`.
#[derive(Debug)]
pub struct ReadBuffer {
    buf: Box<[u8]>,
    /// Bytes already classified into lines
    consumed: usize,
    /// Bytes received
    filled: usize,
    /// Start of the line currently being parsed
    line_start: usize,
}

/// Result of scanning for the next line terminator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineStatus {
    /// A complete line; the range excludes the `\r\n` terminator
    Ok(Range<usize>),
    /// A `\r` or `\n` outside the `\r\n` pattern
    Bad,
    /// No terminator in the received bytes yet
    Open,
}

impl ReadBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: vec![0; capacity].into_boxed_slice(),
            consumed: 0,
            filled: 0,
            line_start: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.buf.len()
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    pub fn filled(&self) -> usize {
        self.filled
    }

    pub fn line_start(&self) -> usize {
        self.line_start
    }

    pub fn is_full(&self) -> bool {
        self.filled == self.buf.len()
    }

    /// The unfilled tail of the buffer, for the next receive.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.filled..]
    }

    /// Marks `n` bytes of [`spare_mut`](Self::spare_mut) as received.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(self.filled + n <= self.buf.len(), "committed past the end of the buffer");
        self.filled += n;
    }

    /// Copies as much of `bytes` as fits and returns the number copied.
    pub fn extend_from_slice(&mut self, bytes: &[u8]) -> usize {
        let spare = self.spare_mut();
        let n = spare.len().min(bytes.len());
        spare[..n].copy_from_slice(&bytes[..n]);
        self.commit(n);
        n
    }

    /// Received bytes from the start of the current line.
    pub fn unparsed(&self) -> &[u8] {
        &self.buf[self.line_start..self.filled]
    }

    pub fn clear(&mut self) {
        self.consumed = 0;
        self.filled = 0;
        self.line_start = 0;
    }

    /// Scans forward from `consumed` for a `\r\n` terminator.
    ///
    /// A trailing `\r` leaves `consumed` on the `\r` so the next call, after
    /// more bytes arrived, re-examines it together with its successor.
    pub fn parse_line(&mut self) -> LineStatus {
        while self.consumed < self.filled {
            match self.buf[self.consumed] {
                b'\r' => {
                    if self.consumed + 1 == self.filled {
                        return LineStatus::Open;
                    }
                    if self.buf[self.consumed + 1] != b'\n' {
                        return LineStatus::Bad;
                    }
                    let end = self.consumed;
                    self.consumed += 2;
                    return LineStatus::Ok(self.line_start..end);
                }
                b'\n' => {
                    if self.consumed > self.line_start && self.buf[self.consumed - 1] == b'\r' {
                        let end = self.consumed - 1;
                        self.consumed += 1;
                        return LineStatus::Ok(self.line_start..end);
                    }
                    return LineStatus::Bad;
                }
                _ => self.consumed += 1,
            }
        }
        LineStatus::Open
    }

    /// Starts the next line at the current scan position.
    fn begin_line(&mut self) {
        self.line_start = self.consumed;
    }
}

/// Position of the parser within a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CheckState {
    #[default]
    RequestLine,
    Header,
    Content,
}

/// Outcome of one parser invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseStatus {
    /// More bytes are needed; invoke again after the next receive
    Incomplete,
    /// The request line, headers and declared body are all buffered
    Complete,
}

#[derive(Debug)]
pub struct RequestParser {
    buffer: ReadBuffer,
    state: CheckState,
    request: Request,
}

impl RequestParser {
    pub fn new() -> Self {
        Self::with_capacity(READ_BUFFER_SIZE)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: ReadBuffer::with_capacity(capacity),
            state: CheckState::RequestLine,
            request: Request::new(),
        }
    }

    pub fn buffer(&self) -> &ReadBuffer {
        &self.buffer
    }

    pub fn buffer_mut(&mut self) -> &mut ReadBuffer {
        &mut self.buffer
    }

    pub fn state(&self) -> CheckState {
        self.state
    }

    pub fn request(&self) -> &Request {
        &self.request
    }

    /// Returns the parser to its initial state, discarding buffered bytes.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.state = CheckState::RequestLine;
        self.request = Request::new();
    }

    /// Parses as far as the received bytes allow.
    pub fn parse(&mut self) -> Result<ParseStatus, ParseError> {
        loop {
            if self.state == CheckState::Content {
                return self.parse_content();
            }

            let Some(range) = self.next_line()? else {
                return Ok(ParseStatus::Incomplete);
            };

            let text = std::str::from_utf8(&self.buffer.buf[range])
                .map_err(|_| ParseError::InvalidEncoding)?;
            tracing::trace!(line = text, state = ?self.state, "Got request line");

            match self.state {
                CheckState::RequestLine => {
                    self.request.parse_request_line(text)?;
                    self.state = CheckState::Header;
                }
                CheckState::Header => match self.request.parse_header(text)? {
                    HeaderLine::End if self.request.content_length == 0 => {
                        return Ok(ParseStatus::Complete);
                    }
                    HeaderLine::End => self.state = CheckState::Content,
                    HeaderLine::Field => {}
                },
                CheckState::Content => return self.parse_content(),
            }
        }
    }

    fn next_line(&mut self) -> Result<Option<Range<usize>>, ParseError> {
        match self.buffer.parse_line() {
            LineStatus::Ok(range) => {
                self.buffer.begin_line();
                Ok(Some(range))
            }
            LineStatus::Bad => Err(ParseError::BadLineEnding),
            LineStatus::Open if self.buffer.is_full() => {
                Err(ParseError::TooLarge { capacity: self.buffer.capacity() })
            }
            LineStatus::Open => Ok(None),
        }
    }

    /// Completes once the declared body is fully buffered. The body itself is not decoded.
    ///
    /// A declared length that cannot fit behind the headers is rejected at
    /// once instead of waiting for bytes that have nowhere to go.
    fn parse_content(&self) -> Result<ParseStatus, ParseError> {
        let buffered = self.buffer.filled - self.buffer.line_start;
        let room = self.buffer.capacity() - self.buffer.line_start;
        if buffered >= self.request.content_length {
            Ok(ParseStatus::Complete)
        } else if self.request.content_length > room || self.buffer.is_full() {
            Err(ParseError::TooLarge { capacity: self.buffer.capacity() })
        } else {
            Ok(ParseStatus::Incomplete)
        }
    }
}

impl Default for RequestParser {
    fn default() -> Self {
        Self::new()
    }
}
