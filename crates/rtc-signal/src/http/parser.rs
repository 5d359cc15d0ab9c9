#[cfg(test)]
mod parser_test;

use crate::error::{Error, Result};
use crate::http::message::{Headers, RequestHead, ResponseHead};

/// One event a [`Parser`] emits as bytes arrive. `Headers` fires once the
/// blank line terminating the header block is seen; `Chunk` fires for
/// every body fragment (whether framed by `Content-Length` or chunked
/// transfer-encoding); `End` fires once the body is fully received.
#[derive(Debug, Clone)]
pub enum ParserEvent {
    RequestHeaders(RequestHead),
    ResponseHeaders(ResponseHead),
    Chunk(Vec<u8>),
    End,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseMode {
    Request,
    Response,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Head,
    BodyFixed(usize),
    BodyChunked,
    /// Zero-length chunk seen; waiting on the CRLF that ends the (empty,
    /// trailers unsupported) trailer section before the message is `Done`.
    ChunkTrailerEnd,
    BodyUntilClose,
    Done,
}

/// Streaming HTTP/1.1 parser. Feeds `ParserEvent`s as data arrives; does
/// not itself own a socket. One `Parser` handles exactly one
/// request/response (a `Connection` constructs a fresh one per message on
/// keep-alive connections).
pub struct Parser {
    mode: ParseMode,
    state: State,
    buf: Vec<u8>,
    remaining_chunk: usize,
    chunk_trailer_pending: bool,
}

impl Parser {
    pub fn for_request() -> Self {
        Parser {
            mode: ParseMode::Request,
            state: State::Head,
            buf: Vec::new(),
            remaining_chunk: 0,
            chunk_trailer_pending: false,
        }
    }

    pub fn for_response() -> Self {
        Parser {
            mode: ParseMode::Response,
            state: State::Head,
            buf: Vec::new(),
            remaining_chunk: 0,
            chunk_trailer_pending: false,
        }
    }

    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Feeds `data` into the parser, returning every event it completes.
    /// Safe to call repeatedly with partial data (a short read, a split
    /// TCP segment).
    pub fn feed(&mut self, data: &[u8]) -> Result<Vec<ParserEvent>> {
        self.buf.extend_from_slice(data);
        let mut events = Vec::new();

        loop {
            match self.state {
                State::Head => {
                    if let Some(pos) = find_double_crlf(&self.buf) {
                        let head_bytes = self.buf.drain(..pos + 4).collect::<Vec<u8>>();
                        let head_str = String::from_utf8_lossy(&head_bytes[..pos]).into_owned();
                        let (headers, event) = match self.mode {
                            ParseMode::Request => {
                                let head = parse_request_line(&head_str)?;
                                let headers = head.headers.clone();
                                (headers, ParserEvent::RequestHeaders(head))
                            }
                            ParseMode::Response => {
                                let head = parse_status_line(&head_str)?;
                                let headers = head.headers.clone();
                                (headers, ParserEvent::ResponseHeaders(head))
                            }
                        };
                        events.push(event);

                        self.state = if headers.is_chunked() {
                            State::BodyChunked
                        } else if let Some(len) = headers.content_length() {
                            if len == 0 {
                                events.push(ParserEvent::End);
                                State::Done
                            } else {
                                State::BodyFixed(len)
                            }
                        } else if self.mode == ParseMode::Response {
                            State::BodyUntilClose
                        } else {
                            events.push(ParserEvent::End);
                            State::Done
                        };
                    } else {
                        break;
                    }
                }
                State::BodyFixed(remaining) => {
                    if self.buf.is_empty() {
                        break;
                    }
                    let take = remaining.min(self.buf.len());
                    let chunk: Vec<u8> = self.buf.drain(..take).collect();
                    events.push(ParserEvent::Chunk(chunk));
                    let left = remaining - take;
                    if left == 0 {
                        events.push(ParserEvent::End);
                        self.state = State::Done;
                    } else {
                        self.state = State::BodyFixed(left);
                        break;
                    }
                }
                State::BodyChunked => {
                    if self.chunk_trailer_pending {
                        if self.buf.len() < 2 {
                            break;
                        }
                        self.buf.drain(..2); // trailing CRLF after chunk data
                        self.chunk_trailer_pending = false;
                        continue;
                    }

                    if self.remaining_chunk > 0 {
                        let take = self.remaining_chunk.min(self.buf.len());
                        if take == 0 {
                            break;
                        }
                        let chunk: Vec<u8> = self.buf.drain(..take).collect();
                        events.push(ParserEvent::Chunk(chunk));
                        self.remaining_chunk -= take;
                        if self.remaining_chunk == 0 {
                            self.chunk_trailer_pending = true;
                        }
                        continue;
                    }

                    if let Some(pos) = find_crlf(&self.buf) {
                        let size_line = String::from_utf8_lossy(&self.buf[..pos]).into_owned();
                        self.buf.drain(..pos + 2);
                        let size = usize::from_str_radix(size_line.trim(), 16)
                            .map_err(|_| Error::ErrHttpParse("bad chunk size".to_owned()))?;
                        if size == 0 {
                            self.state = State::ChunkTrailerEnd;
                        } else {
                            self.remaining_chunk = size;
                        }
                    } else {
                        break;
                    }
                }
                State::ChunkTrailerEnd => {
                    if self.buf.len() < 2 {
                        break;
                    }
                    self.buf.drain(..2);
                    events.push(ParserEvent::End);
                    self.state = State::Done;
                }
                State::BodyUntilClose => {
                    if !self.buf.is_empty() {
                        let chunk: Vec<u8> = self.buf.drain(..).collect();
                        events.push(ParserEvent::Chunk(chunk));
                    }
                    break;
                }
                State::Done => break,
            }
        }

        Ok(events)
    }

    /// For `BodyUntilClose` responses (no `Content-Length`, not chunked):
    /// the connection's closure itself terminates the body.
    pub fn notify_eof(&mut self) -> Vec<ParserEvent> {
        if self.state == State::BodyUntilClose {
            self.state = State::Done;
            vec![ParserEvent::End]
        } else {
            Vec::new()
        }
    }
}

fn find_double_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n")
}

fn find_crlf(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\r\n")
}

fn parse_headers(lines: &[&str]) -> Headers {
    let mut headers = Headers::new();
    for line in lines {
        if let Some((name, value)) = line.split_once(':') {
            headers.push(name.trim(), value.trim());
        }
    }
    headers
}

fn parse_request_line(head: &str) -> Result<RequestHead> {
    let mut lines = head.split("\r\n");
    let request_line = lines
        .next()
        .ok_or_else(|| Error::ErrHttpParse("empty request".to_owned()))?;
    let mut parts = request_line.splitn(3, ' ');
    let method = parts
        .next()
        .ok_or_else(|| Error::ErrHttpParse("missing method".to_owned()))?
        .to_owned();
    let uri = parts
        .next()
        .ok_or_else(|| Error::ErrHttpParse("missing uri".to_owned()))?
        .to_owned();
    let version = parts
        .next()
        .ok_or_else(|| Error::ErrHttpParse("missing version".to_owned()))?
        .to_owned();

    let remaining: Vec<&str> = lines.collect();
    Ok(RequestHead {
        method,
        uri,
        version,
        headers: parse_headers(&remaining),
    })
}

fn parse_status_line(head: &str) -> Result<ResponseHead> {
    let mut lines = head.split("\r\n");
    let status_line = lines
        .next()
        .ok_or_else(|| Error::ErrHttpParse("empty response".to_owned()))?;
    let mut parts = status_line.splitn(3, ' ');
    let version = parts
        .next()
        .ok_or_else(|| Error::ErrHttpParse("missing version".to_owned()))?
        .to_owned();
    let status: u16 = parts
        .next()
        .ok_or_else(|| Error::ErrHttpParse("missing status".to_owned()))?
        .parse()
        .map_err(|_| Error::ErrHttpParse("bad status code".to_owned()))?;
    let reason = parts.next().unwrap_or("").to_owned();

    let remaining: Vec<&str> = lines.collect();
    Ok(ResponseHead {
        version,
        status,
        reason,
        headers: parse_headers(&remaining),
    })
}
