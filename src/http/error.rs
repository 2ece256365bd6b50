use std::io;

use thiserror::Error;

use crate::http::response::StatusCode;

/// Malformed or unsupported request syntax. Always answered with 400.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("malformed request line terminator")]
    BadLineEnding,

    #[error("request line or header is not valid utf-8")]
    InvalidEncoding,

    #[error("malformed request line: {reason}")]
    InvalidRequestLine { reason: &'static str },

    #[error("unsupported http method: {method}")]
    UnsupportedMethod { method: String },

    #[error("invalid request target: {target}")]
    InvalidUri { target: String },

    #[error("unsupported http version: {version}")]
    UnsupportedVersion { version: String },

    #[error("invalid content-length header: {value}")]
    InvalidContentLength { value: String },

    #[error("request exceeds the {capacity} byte read buffer")]
    TooLarge { capacity: usize },
}

impl ParseError {
    pub fn invalid_request_line(reason: &'static str) -> Self {
        Self::InvalidRequestLine { reason }
    }

    pub fn unsupported_method<S: ToString>(method: S) -> Self {
        Self::UnsupportedMethod { method: method.to_string() }
    }

    pub fn invalid_uri<S: ToString>(target: S) -> Self {
        Self::InvalidUri { target: target.to_string() }
    }

    pub fn unsupported_version<S: ToString>(version: S) -> Self {
        Self::UnsupportedVersion { version: version.to_string() }
    }

    pub fn invalid_content_length<S: ToString>(value: S) -> Self {
        Self::InvalidContentLength { value: value.to_string() }
    }
}

/// Terminal outcome of a request that did not produce a servable file.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("bad request: {source}")]
    Parse {
        #[from]
        source: ParseError,
    },

    #[error("resource not found")]
    NotFound,

    #[error("resource is not world-readable")]
    Forbidden,

    #[error("resource is a directory")]
    IsDirectory,

    #[error("internal error: {source}")]
    Internal { source: io::Error },
}

impl RequestError {
    pub fn internal<E: Into<io::Error>>(e: E) -> Self {
        Self::Internal { source: e.into() }
    }

    /// The status the client observes for this outcome.
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::Parse { .. } | RequestError::IsDirectory => StatusCode::BadRequest,
            RequestError::NotFound => StatusCode::NotFound,
            RequestError::Forbidden => StatusCode::Forbidden,
            RequestError::Internal { .. } => StatusCode::InternalError,
        }
    }
}

/// Response assembly failure. The response is discarded, never truncated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResponseError {
    #[error("response header exceeds the {capacity} byte write buffer")]
    Overflow { capacity: usize },
}
