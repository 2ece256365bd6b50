use lumen::http::error::ParseError;
use lumen::http::parser::{CheckState, ParseStatus, RequestParser};
use lumen::http::request::Method;

const REQUEST: &[u8] =
    b"GET /docs/index.html HTTP/1.1\r\nHost: example.com\r\nConnection: keep-alive\r\nAccept: */*\r\n\r\n";

fn parse_whole(bytes: &[u8]) -> (Result<ParseStatus, ParseError>, RequestParser) {
    let mut parser = RequestParser::new();
    parser.buffer_mut().extend_from_slice(bytes);
    let result = parser.parse();
    (result, parser)
}

fn assert_cursors(parser: &RequestParser) {
    let buffer = parser.buffer();
    assert!(buffer.line_start() <= buffer.consumed());
    assert!(buffer.consumed() <= buffer.filled());
    assert!(buffer.filled() <= buffer.capacity());
}

#[test]
fn test_parse_simple_get_request() {
    let (result, parser) = parse_whole(REQUEST);

    assert_eq!(result, Ok(ParseStatus::Complete));
    let request = parser.request();
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.url, "/docs/index.html");
    assert_eq!(request.host.as_deref(), Some("example.com"));
    assert!(request.linger);
    assert_eq!(request.content_length, 0);
}

#[test]
fn test_every_split_point_gives_the_same_request() {
    let (_, whole) = parse_whole(REQUEST);

    for split in 0..=REQUEST.len() {
        let mut parser = RequestParser::new();
        parser.buffer_mut().extend_from_slice(&REQUEST[..split]);
        let first = parser.parse();
        assert_cursors(&parser);

        if split < REQUEST.len() {
            assert_eq!(first, Ok(ParseStatus::Incomplete), "split at {split}");
            parser.buffer_mut().extend_from_slice(&REQUEST[split..]);
            assert_eq!(parser.parse(), Ok(ParseStatus::Complete), "split at {split}");
        } else {
            assert_eq!(first, Ok(ParseStatus::Complete));
        }

        assert_cursors(&parser);
        assert_eq!(parser.request(), whole.request(), "split at {split}");
    }
}

#[test]
fn test_byte_at_a_time() {
    let mut parser = RequestParser::new();
    let (last, head) = REQUEST.split_last().unwrap();

    for byte in head {
        parser.buffer_mut().extend_from_slice(&[*byte]);
        assert_eq!(parser.parse(), Ok(ParseStatus::Incomplete));
    }
    parser.buffer_mut().extend_from_slice(&[*last]);

    assert_eq!(parser.parse(), Ok(ParseStatus::Complete));
    assert_eq!(parser.request().url, "/docs/index.html");
}

#[test]
fn test_parse_incomplete_request_missing_blank_line() {
    let (result, parser) = parse_whole(b"GET / HTTP/1.1\r\nHost: example.com\r\n");

    assert_eq!(result, Ok(ParseStatus::Incomplete));
    assert_eq!(parser.state(), CheckState::Header);
}

#[test]
fn test_waits_for_declared_body() {
    let mut parser = RequestParser::new();
    parser
        .buffer_mut()
        .extend_from_slice(b"GET / HTTP/1.1\r\nContent-Length: 5\r\n\r\nhel");

    assert_eq!(parser.parse(), Ok(ParseStatus::Incomplete));
    assert_eq!(parser.state(), CheckState::Content);

    parser.buffer_mut().extend_from_slice(b"lo");
    assert_eq!(parser.parse(), Ok(ParseStatus::Complete));
    assert_eq!(parser.request().content_length, 5);
}

#[test]
fn test_bare_line_feed_is_rejected() {
    let (result, _) = parse_whole(b"GET / HTTP/1.1\nHost: x\r\n\r\n");
    assert_eq!(result, Err(ParseError::BadLineEnding));
}

#[test]
fn test_carriage_return_without_line_feed_is_rejected() {
    let (result, _) = parse_whole(b"GET / HTTP/1.1\r\rHost: x\r\n\r\n");
    assert_eq!(result, Err(ParseError::BadLineEnding));
}

#[test]
fn test_full_buffer_without_terminator_is_too_large() {
    let mut parser = RequestParser::with_capacity(16);
    parser.buffer_mut().extend_from_slice(b"GET /aaaaaaaaaaaaaaaaaaaa");

    assert!(parser.buffer().is_full());
    assert_eq!(parser.parse(), Err(ParseError::TooLarge { capacity: 16 }));
}

#[test]
fn test_body_larger_than_buffer_is_too_large() {
    let mut parser = RequestParser::with_capacity(48);
    parser
        .buffer_mut()
        .extend_from_slice(b"GET / HTTP/1.1\r\nContent-Length: 100\r\n\r\nxxxxxxxxxxxxxxxxxxxx");

    assert_eq!(parser.parse(), Err(ParseError::TooLarge { capacity: 48 }));
}

#[test]
fn test_non_utf8_line_is_rejected() {
    let (result, _) = parse_whole(b"GET /\xff\xfe HTTP/1.1\r\n\r\n");
    assert_eq!(result, Err(ParseError::InvalidEncoding));
}

#[test]
fn test_unsupported_method() {
    let (result, _) = parse_whole(b"DELETE /x HTTP/1.1\r\n\r\n");
    assert_eq!(result, Err(ParseError::unsupported_method("DELETE")));
}

#[test]
fn test_unsupported_version() {
    let (result, _) = parse_whole(b"GET / HTTP/1.0\r\n\r\n");
    assert_eq!(result, Err(ParseError::unsupported_version("HTTP/1.0")));
}

#[test]
fn test_reset_discards_everything() {
    let (_, mut parser) = parse_whole(REQUEST);
    parser.reset();

    assert_eq!(parser.state(), CheckState::RequestLine);
    assert_eq!(parser.buffer().filled(), 0);
    assert_eq!(parser.buffer().consumed(), 0);
    assert!(!parser.request().linger);
    assert!(parser.request().url.is_empty());
}

#[test]
fn test_terminator_split_between_receives() {
    let mut parser = RequestParser::new();
    parser.buffer_mut().extend_from_slice(b"GET /a HTTP/1.1\r");

    assert_eq!(parser.parse(), Ok(ParseStatus::Incomplete));
    assert_eq!(parser.state(), CheckState::RequestLine);
    assert_eq!(parser.buffer().consumed(), 15);

    parser.buffer_mut().extend_from_slice(b"\n");
    assert_eq!(parser.parse(), Ok(ParseStatus::Incomplete));
    assert_eq!(parser.state(), CheckState::Header);
    assert_eq!(parser.request().url, "/a");
}

#[test]
fn test_declared_body_beyond_capacity_is_rejected_early() {
    let mut parser = RequestParser::new();
    parser
        .buffer_mut()
        .extend_from_slice(b"GET /a.txt HTTP/1.1\r\nContent-Length: 1000000\r\n\r\nxyz");

    assert!(!parser.buffer().is_full());
    assert_eq!(parser.parse(), Err(ParseError::TooLarge { capacity: 2048 }));
}

#[test]
fn test_declared_body_that_fits_still_waits() {
    let mut parser = RequestParser::with_capacity(64);
    let head = b"GET / HTTP/1.1\r\nContent-Length: 26\r\n\r\n";
    parser.buffer_mut().extend_from_slice(head);

    assert_eq!(64 - head.len(), 26);
    assert_eq!(parser.parse(), Ok(ParseStatus::Incomplete));

    parser.buffer_mut().extend_from_slice(&[b'x'; 26]);
    assert_eq!(parser.parse(), Ok(ParseStatus::Complete));
}
