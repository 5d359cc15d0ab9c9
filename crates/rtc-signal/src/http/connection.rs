use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use rtc_net::socket::Socket;
use tokio::sync::Mutex;
use util::timer::Timer;

use crate::error::{Error, Result};
use crate::http::message::{RequestHead, ResponseHead};
use crate::http::parser::{Parser, ParserEvent};

/// Default idle timeout for a connection that has sent or received nothing
/// for a while, matching the data model's "idle-timeout clock" attribute.
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

/// Observer for a [`ClientConnection`]'s download progress, per 4.8:
/// "tracks download progress against Content-Length, fires progress
/// callbacks, and surfaces a `complete` event when either length-terminated
/// or connection-terminated."
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, downloaded: usize, total: Option<usize>);
    fn on_complete(&self, body: &[u8]);
}

/// Server-side per-accepted-socket state: request header, response header,
/// parser, and the "should-send-header" flag that becomes false after the
/// first byte of body is written, per the data model's `HTTP Connection`
/// entry.
pub struct ServerConnection {
    socket: Arc<Socket>,
    parser: Mutex<Parser>,
    request: Mutex<Option<RequestHead>>,
    response: Mutex<ResponseHead>,
    should_send_header: AtomicBool,
    closed: AtomicBool,
    idle_timer: Timer,
}

impl ServerConnection {
    pub fn new(socket: Arc<Socket>) -> Self {
        ServerConnection {
            socket,
            parser: Mutex::new(Parser::for_request()),
            request: Mutex::new(None),
            response: Mutex::new(ResponseHead::new(200, "OK")),
            should_send_header: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            idle_timer: Timer::new(),
        }
    }

    /// Feeds one read's worth of bytes to the parser. Restarts the idle
    /// timeout clock on every call, since any activity postpones it.
    pub async fn feed(&self, data: &[u8]) -> Result<Vec<ParserEvent>> {
        self.idle_timer.stop();
        let events = self.parser.lock().await.feed(data)?;
        for event in &events {
            if let ParserEvent::RequestHeaders(head) = event {
                *self.request.lock().await = Some(head.clone());
            }
        }
        Ok(events)
    }

    pub async fn request(&self) -> Option<RequestHead> {
        self.request.lock().await.clone()
    }

    pub async fn set_status(&self, status: u16, reason: impl Into<String>) {
        let mut response = self.response.lock().await;
        response.status = status;
        response.reason = reason.into();
    }

    pub async fn set_header(&self, name: impl Into<String>, value: impl Into<String>) {
        self.response.lock().await.headers.push(name, value);
    }

    /// Writes a body chunk, serializing and sending the response header
    /// first if this is the first call since `should_send_header` was last
    /// reset, matching the data model's flag.
    pub async fn write_body(&self, chunk: &[u8]) -> Result<usize> {
        if self.closed.load(Ordering::Acquire) {
            return Err(Error::ErrClosed);
        }
        let mut n = 0;
        if self.should_send_header.swap(false, Ordering::AcqRel) {
            let head = self.response.lock().await.serialize();
            n += self.socket.send(&head, None).await?;
        }
        n += self.socket.send(chunk, None).await?;
        Ok(n)
    }

    /// Resets the connection for a fresh request/response on a keep-alive
    /// socket: a new parser, a default response, and `should_send_header`
    /// flipped back to `true`.
    pub async fn reset(&self) {
        *self.parser.lock().await = Parser::for_request();
        *self.request.lock().await = None;
        *self.response.lock().await = ResponseHead::new(200, "OK");
        self.should_send_header.store(true, Ordering::Release);
    }

    pub fn arm_idle_timeout(self: &Arc<Self>, timeout: Duration) {
        let conn = Arc::clone(self);
        self.idle_timer.start(timeout, move || {
            conn.closed.store(true, Ordering::Release);
        });
    }

    pub fn arm_default_idle_timeout(self: &Arc<Self>) {
        self.arm_idle_timeout(DEFAULT_IDLE_TIMEOUT);
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        self.idle_timer.stop();
        self.socket.close().await?;
        Ok(())
    }
}

/// Client-side connection: issues one request, tracks the response's
/// download progress against `Content-Length`, and fires `on_complete`
/// whether the body is length-terminated or the peer simply closed the
/// connection.
pub struct ClientConnection {
    socket: Arc<Socket>,
    parser: Mutex<Parser>,
    response: Mutex<Option<ResponseHead>>,
    body: Mutex<Vec<u8>>,
    downloaded: AtomicUsize,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl ClientConnection {
    pub fn new(socket: Arc<Socket>, observer: Option<Arc<dyn ProgressObserver>>) -> Self {
        ClientConnection {
            socket,
            parser: Mutex::new(Parser::for_response()),
            response: Mutex::new(None),
            body: Mutex::new(Vec::new()),
            downloaded: AtomicUsize::new(0),
            observer,
        }
    }

    pub async fn send_request(&self, head: &RequestHead, body: &[u8]) -> Result<()> {
        self.socket.send(&head.serialize(), None).await?;
        if !body.is_empty() {
            self.socket.send(body, None).await?;
        }
        Ok(())
    }

    pub async fn response(&self) -> Option<ResponseHead> {
        self.response.lock().await.clone()
    }

    /// Feeds one read's worth of response bytes, tracking progress and
    /// firing `on_complete` on `ParserEvent::End`.
    pub async fn feed(&self, data: &[u8]) -> Result<bool> {
        let events = self.parser.lock().await.feed(data)?;
        self.handle_events(events).await
    }

    /// For connection-terminated (no `Content-Length`, not chunked)
    /// bodies: the socket's EOF itself completes the response.
    pub async fn notify_eof(&self) -> Result<bool> {
        let events = self.parser.lock().await.notify_eof();
        self.handle_events(events).await
    }

    async fn handle_events(&self, events: Vec<ParserEvent>) -> Result<bool> {
        let mut completed = false;
        for event in events {
            match event {
                ParserEvent::ResponseHeaders(head) => {
                    *self.response.lock().await = Some(head);
                }
                ParserEvent::Chunk(chunk) => {
                    let total = self.response.lock().await.as_ref().and_then(|h| h.headers.content_length());
                    let downloaded = self.downloaded.fetch_add(chunk.len(), Ordering::AcqRel) + chunk.len();
                    self.body.lock().await.extend_from_slice(&chunk);
                    if let Some(observer) = &self.observer {
                        observer.on_progress(downloaded, total);
                    }
                }
                ParserEvent::End => {
                    completed = true;
                }
                ParserEvent::RequestHeaders(_) => unreachable!("client connection never parses requests"),
            }
        }
        if completed {
            let body = self.body.lock().await;
            if let Some(observer) = &self.observer {
                observer.on_complete(&body);
            }
        }
        Ok(completed)
    }

    pub async fn close(&self) -> Result<()> {
        Ok(self.socket.close().await?)
    }
}
