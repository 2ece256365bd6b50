use lumen::http::error::ParseError;
use lumen::http::request::{HeaderLine, Method, Request};

fn request_line(text: &str) -> Result<Request, ParseError> {
    let mut request = Request::new();
    request.parse_request_line(text)?;
    Ok(request)
}

#[test]
fn test_method_from_token() {
    assert_eq!(Method::from_token("GET"), Some(Method::GET));
    assert_eq!(Method::from_token("gEt"), Some(Method::GET));
    assert_eq!(Method::from_token("HEAD"), None);
    assert_eq!(Method::from_token(""), None);
}

#[test]
fn test_request_line_origin_form() {
    let request = request_line("GET /index.html HTTP/1.1").unwrap();
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.url, "/index.html");
}

#[test]
fn test_request_line_tolerates_blank_runs() {
    let request = request_line("GET \t /a/b.txt \t HTTP/1.1").unwrap();
    assert_eq!(request.url, "/a/b.txt");
}

#[test]
fn test_request_line_case_insensitive_tokens() {
    let request = request_line("get /x http/1.1").unwrap();
    assert_eq!(request.url, "/x");
}

#[test]
fn test_request_line_absolute_form() {
    let request = request_line("GET HTTP://example.com:8080/a/b.html HTTP/1.1").unwrap();
    assert_eq!(request.url, "/a/b.html");
}

#[test]
fn test_request_line_absolute_form_without_path() {
    assert_eq!(
        request_line("GET http://example.com HTTP/1.1"),
        Err(ParseError::invalid_uri("http://example.com"))
    );
}

#[test]
fn test_request_line_relative_target() {
    assert_eq!(
        request_line("GET index.html HTTP/1.1"),
        Err(ParseError::invalid_uri("index.html"))
    );
}

#[test]
fn test_request_line_missing_parts() {
    assert_eq!(
        request_line("GET"),
        Err(ParseError::invalid_request_line("missing request target"))
    );
    assert_eq!(
        request_line("GET /"),
        Err(ParseError::invalid_request_line("missing http version"))
    );
}

#[test]
fn test_request_line_version_must_stand_alone() {
    assert_eq!(
        request_line("GET / HTTP/1.1 extra"),
        Err(ParseError::unsupported_version("HTTP/1.1 extra"))
    );
}

#[test]
fn test_keep_alive_header() {
    let mut request = Request::new();
    assert_eq!(request.parse_header("connection: \tKeep-Alive"), Ok(HeaderLine::Field));
    assert!(request.linger);
}

#[test]
fn test_connection_close_does_not_linger() {
    let mut request = Request::new();
    request.parse_header("Connection: close").unwrap();
    assert!(!request.linger);
}

#[test]
fn test_content_length_header() {
    let mut request = Request::new();
    request.parse_header("Content-Length: 42").unwrap();
    assert_eq!(request.content_length, 42);

    assert_eq!(
        request.parse_header("Content-Length: lots"),
        Err(ParseError::invalid_content_length("lots"))
    );
}

#[test]
fn test_host_header_kept_verbatim() {
    let mut request = Request::new();
    request.parse_header("Host:   Example.COM:8080").unwrap();
    assert_eq!(request.host.as_deref(), Some("Example.COM:8080"));
}

#[test]
fn test_unknown_header_is_ignored() {
    let mut request = Request::new();
    assert_eq!(request.parse_header("X-Trace: 1"), Ok(HeaderLine::Field));
    assert_eq!(request, Request::new());
}

#[test]
fn test_blank_line_ends_headers() {
    let mut request = Request::new();
    assert_eq!(request.parse_header(""), Ok(HeaderLine::End));
}
