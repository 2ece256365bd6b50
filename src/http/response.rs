/// HTTP status codes produced by the server.
///
/// - `Ok` (200): File served
/// - `BadRequest` (400): Malformed request, unsupported method/version, or directory target
/// - `Forbidden` (403): File exists but is not world-readable
/// - `NotFound` (404): No such file under the document root
/// - `InternalError` (500): The file could not be mapped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusCode {
    /// 200 OK
    Ok,
    /// 400 Bad Request
    BadRequest,
    /// 403 Forbidden
    Forbidden,
    /// 404 Not Found
    NotFound,
    /// 500 Internal Error
    InternalError,
}

/// Body sent with a 200 response for a zero-length file.
pub const EMPTY_PAGE: &str = "<html><body></body></html>";

impl StatusCode {
    /// Returns the numeric HTTP status code.
    ///
    /// # Example
    ///
    /// ```
    /// # use lumen::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.as_u16(), 200);
    /// assert_eq!(StatusCode::NotFound.as_u16(), 404);
    /// ```
    pub fn as_u16(&self) -> u16 {
        match self {
            StatusCode::Ok => 200,
            StatusCode::BadRequest => 400,
            StatusCode::Forbidden => 403,
            StatusCode::NotFound => 404,
            StatusCode::InternalError => 500,
        }
    }

    /// Returns the reason phrase written on the status line.
    ///
    /// # Example
    ///
    /// ```
    /// # use lumen::http::response::StatusCode;
    /// assert_eq!(StatusCode::Ok.reason_phrase(), "OK");
    /// assert_eq!(StatusCode::InternalError.reason_phrase(), "Internal Error");
    /// ```
    pub fn reason_phrase(&self) -> &'static str {
        match self {
            StatusCode::Ok => "OK",
            StatusCode::BadRequest => "Bad Request",
            StatusCode::Forbidden => "Forbidden",
            StatusCode::NotFound => "Not Found",
            StatusCode::InternalError => "Internal Error",
        }
    }

    /// Returns the fixed one-line body of an error page.
    ///
    /// A successful response carries the file bytes instead, or
    /// [`EMPTY_PAGE`] when the file is empty.
    pub fn canonical_body(&self) -> &'static str {
        match self {
            StatusCode::Ok => EMPTY_PAGE,
            StatusCode::BadRequest => {
                "Your request has bad syntax or is inherently impossible to satisfy.\n"
            }
            StatusCode::Forbidden => "You do not have permission to get file from this server.\n",
            StatusCode::NotFound => "The requested file was not found on this server.\n",
            StatusCode::InternalError => {
                "There was an unusual problem serving the requested file.\n"
            }
        }
    }
}
