use crate::http::error::ParseError;

/// HTTP request methods.
///
/// Only GET is served; every other token is rejected while parsing the
/// request line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Method {
    /// GET - Retrieve a resource
    #[default]
    GET,
}

/// The only protocol version accepted on the request line.
pub const HTTP_11: &str = "HTTP/1.1";

impl Method {
    /// Parses an HTTP method token, ignoring ASCII case.
    ///
    /// # Example
    ///
    /// ```
    /// # use lumen::http::request::Method;
    /// assert_eq!(Method::from_token("GET"), Some(Method::GET));
    /// assert_eq!(Method::from_token("get"), Some(Method::GET));
    /// assert_eq!(Method::from_token("POST"), None);
    /// ```
    pub fn from_token(s: &str) -> Option<Self> {
        s.eq_ignore_ascii_case("GET").then_some(Method::GET)
    }
}

/// The decoded request line and recognized headers of one request.
///
/// Filled in line by line by the parser and cleared by the keep-alive reset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Request {
    /// The HTTP method (GET only)
    pub method: Method,
    /// Absolute path of the request target (e.g. "/index.html")
    pub url: String,
    /// Declared body length from `Content-Length`
    pub content_length: usize,
    /// `Host` header value, verbatim
    pub host: Option<String>,
    /// `Connection: keep-alive` was requested
    pub linger: bool,
}

/// What a single header line meant to the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderLine {
    /// The blank line terminating the header block
    End,
    /// A header was consumed (recognized or ignored)
    Field,
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Splits `text` at the first space or tab, skipping the run of blanks that follows.
fn split_token(text: &str) -> Option<(&str, &str)> {
    let (head, rest) = text.split_once(is_blank)?;
    Some((head, rest.trim_start_matches(is_blank)))
}

/// Case-insensitive prefix strip.
fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix).then(|| &text[prefix.len()..])
}

impl Request {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parses a request line such as `GET /index.html HTTP/1.1`.
    ///
    /// An absolute-form target (`http://host/path`) is reduced to its path.
    pub fn parse_request_line(&mut self, text: &str) -> Result<(), ParseError> {
        let (method, rest) =
            split_token(text).ok_or(ParseError::invalid_request_line("missing request target"))?;

        self.method = Method::from_token(method).ok_or_else(|| ParseError::unsupported_method(method))?;

        let (target, version) =
            split_token(rest).ok_or(ParseError::invalid_request_line("missing http version"))?;

        if !version.eq_ignore_ascii_case(HTTP_11) {
            return Err(ParseError::unsupported_version(version));
        }

        let path = match strip_prefix_ci(target, "http://") {
            Some(authority) => authority.find('/').map(|idx| &authority[idx..]),
            None => Some(target),
        };

        match path {
            Some(path) if path.starts_with('/') => {
                self.url = path.to_string();
                Ok(())
            }
            _ => Err(ParseError::invalid_uri(target)),
        }
    }

    /// Parses one header line. An empty line ends the header block.
    ///
    /// `Connection`, `Content-Length` and `Host` are recorded; anything else
    /// is ignored.
    pub fn parse_header(&mut self, text: &str) -> Result<HeaderLine, ParseError> {
        if text.is_empty() {
            return Ok(HeaderLine::End);
        }

        if let Some(value) = strip_prefix_ci(text, "Connection:") {
            if value.trim_matches(is_blank).eq_ignore_ascii_case("keep-alive") {
                self.linger = true;
            }
        } else if let Some(value) = strip_prefix_ci(text, "Content-Length:") {
            let value = value.trim_matches(is_blank);
            self.content_length = value
                .parse::<usize>()
                .map_err(|_| ParseError::invalid_content_length(value))?;
        } else if let Some(value) = strip_prefix_ci(text, "Host:") {
            self.host = Some(value.trim_start_matches(is_blank).to_string());
        } else {
            tracing::debug!(header = text, "Ignoring unknown header");
        }

        Ok(HeaderLine::Field)
    }
}
