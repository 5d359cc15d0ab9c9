use super::*;

#[test]
fn test_parses_request_with_content_length() {
    let mut parser = Parser::for_request();
    let raw = b"POST /socket.io/ HTTP/1.1\r\nHost: example.com\r\nContent-Length: 5\r\n\r\nhello";
    let events = parser.feed(raw).unwrap();

    assert!(matches!(events[0], ParserEvent::RequestHeaders(_)));
    match &events[0] {
        ParserEvent::RequestHeaders(head) => {
            assert_eq!(head.method, "POST");
            assert_eq!(head.uri, "/socket.io/");
        }
        _ => panic!("expected request headers"),
    }
    assert!(matches!(&events[1], ParserEvent::Chunk(c) if c == b"hello"));
    assert!(matches!(events[2], ParserEvent::End));
    assert!(parser.is_done());
}

#[test]
fn test_handles_split_reads_across_header_boundary() {
    let mut parser = Parser::for_request();
    let first = b"GET / HTTP/1.1\r\nHost: ex";
    let second = b"ample.com\r\n\r\n";

    let events1 = parser.feed(first).unwrap();
    assert!(events1.is_empty());

    let events2 = parser.feed(second).unwrap();
    assert_eq!(events2.len(), 2); // headers + End (no body, no content-length)
    assert!(matches!(events2[0], ParserEvent::RequestHeaders(_)));
    assert!(matches!(events2[1], ParserEvent::End));
}

#[test]
fn test_parses_chunked_response_body() {
    let mut parser = Parser::for_response();
    let raw = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n";
    let events = parser.feed(raw).unwrap();

    let chunks: Vec<&[u8]> = events
        .iter()
        .filter_map(|e| match e {
            ParserEvent::Chunk(c) => Some(c.as_slice()),
            _ => None,
        })
        .collect();
    assert_eq!(chunks, vec![b"hello".as_slice()]);
    assert!(matches!(events.last(), Some(ParserEvent::End)));
}

#[test]
fn test_body_fed_across_multiple_reads() {
    let mut parser = Parser::for_request();
    parser
        .feed(b"PUT /x HTTP/1.1\r\nContent-Length: 10\r\n\r\n")
        .unwrap();
    let e1 = parser.feed(b"abcde").unwrap();
    assert!(matches!(&e1[0], ParserEvent::Chunk(c) if c == b"abcde"));
    let e2 = parser.feed(b"fghij").unwrap();
    assert!(matches!(&e2[0], ParserEvent::Chunk(c) if c == b"fghij"));
    assert!(matches!(e2[1], ParserEvent::End));
}
