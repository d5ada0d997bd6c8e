use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::Serialize;

use crate::error::CheckError;

/// 探测只需要 GET 与 POST
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

/// One outgoing check request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: HashMap<String, String>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// POST carrying an already serialized JSON payload.
    ///
    /// # Examples
    ///
    /// ```
    /// use pingai::http::{HttpMethod, HttpRequest};
    ///
    /// let request = HttpRequest::post_json("https://api.example.com/v1/chat/completions", b"{}".to_vec());
    /// assert_eq!(request.method, HttpMethod::Post);
    /// assert_eq!(request.headers["Content-Type"], "application/json");
    /// ```
    pub fn post_json(url: impl Into<String>, body: Vec<u8>) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            headers: HashMap::from([("Content-Type".to_string(), "application/json".to_string())]),
            body: Some(body),
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            headers: HashMap::new(),
            body: None,
        }
    }

    /// Same-named entries in `headers` win.
    pub fn with_headers(mut self, headers: HashMap<String, String>) -> Self {
        self.headers.extend(headers);
        self
    }
}

/// Fully buffered reply.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        is_2xx(self.status)
    }

    /// Body as text; invalid UTF-8 is replaced rather than rejected.
    ///
    /// # Examples
    ///
    /// ```
    /// use pingai::http::HttpResponse;
    ///
    /// let response = HttpResponse { status: 502, body: b"bad gateway".to_vec() };
    /// assert_eq!(response.text_lossy(), "bad gateway");
    /// assert!(!response.is_success());
    /// ```
    pub fn text_lossy(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Reply whose body is still arriving.
pub struct HttpStreamResponse {
    pub status: u16,
    pub body: HttpBodyStream,
}

impl HttpStreamResponse {
    pub fn is_success(&self) -> bool {
        is_2xx(self.status)
    }
}

/// Body chunks in arrival order; a read failure is yielded as an item.
pub type HttpBodyStream = Pin<Box<dyn Stream<Item = Result<Vec<u8>, CheckError>> + Send>>;

fn is_2xx(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Seam between the protocol adapters and the HTTP client.
///
/// One instance is shared by every concurrent check, so implementations must not hold
/// per-call state.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Resolves once the whole body has been read.
    ///
    /// # Errors
    ///
    /// [`CheckError::Transport`] for DNS, connect, TLS or body read failures. A received
    /// status of any class is `Ok`.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CheckError>;

    /// Resolves as soon as the status line is in; the body is read lazily.
    ///
    /// # Errors
    ///
    /// As for [`HttpTransport::send`], except body read failures surface later as
    /// stream items.
    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, CheckError>;
}

pub type DynHttpTransport = Arc<dyn HttpTransport>;

/// Serializes `body` and POSTs it with the given headers.
///
/// # Examples
///
/// ```
/// # use std::collections::HashMap;
/// # use std::sync::Mutex;
/// # use async_trait::async_trait;
/// # use pingai::error::CheckError;
/// # use pingai::http::{post_json_with_headers, HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};
/// # use serde_json::json;
/// /// Answers every request with `{}` and keeps the last URL.
/// #[derive(Default)]
/// struct Echo(Mutex<String>);
///
/// #[async_trait]
/// impl HttpTransport for Echo {
///     async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CheckError> {
///         *self.0.lock().unwrap() = request.url;
///         Ok(HttpResponse { status: 200, body: b"{}".to_vec() })
///     }
///     async fn send_stream(&self, _: HttpRequest) -> Result<HttpStreamResponse, CheckError> {
///         Err(CheckError::transport("no streams here"))
///     }
/// }
///
/// # tokio::runtime::Runtime::new().unwrap().block_on(async {
/// let echo = Echo::default();
/// let headers = HashMap::from([("x-api-key".to_string(), "k".to_string())]);
/// let reply = post_json_with_headers(&echo, "https://api.example.com/v1/messages", headers, &json!({"max_tokens": 1}))
///     .await
///     .unwrap();
/// assert_eq!(reply.status, 200);
/// assert_eq!(*echo.0.lock().unwrap(), "https://api.example.com/v1/messages");
/// # });
/// ```
///
/// # Errors
///
/// [`CheckError::Validation`] when `body` cannot be serialized; otherwise whatever the
/// transport reports.
pub async fn post_json_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpResponse, CheckError> {
    let request = HttpRequest::post_json(url, encode_json(body)?).with_headers(headers);
    transport.send(request).await
}

/// Streaming twin of [`post_json_with_headers`].
///
/// # Errors
///
/// Same as [`post_json_with_headers`].
pub async fn post_json_stream_with_headers<T: Serialize>(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
    body: &T,
) -> Result<HttpStreamResponse, CheckError> {
    let request = HttpRequest::post_json(url, encode_json(body)?).with_headers(headers);
    transport.send_stream(request).await
}

pub async fn get_with_headers(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
) -> Result<HttpResponse, CheckError> {
    transport.send(HttpRequest::get(url).with_headers(headers)).await
}

/// GET that reports only the status code. The body is dropped unread.
pub async fn get_status_with_headers(
    transport: &dyn HttpTransport,
    url: impl Into<String>,
    headers: HashMap<String, String>,
) -> Result<u16, CheckError> {
    let request = HttpRequest::get(url).with_headers(headers);
    Ok(transport.send_stream(request).await?.status)
}

/// Reads a streamed body to the end, stopping quietly at the first read error.
pub async fn collect_body_text(body: HttpBodyStream) -> String {
    let bytes: Vec<u8> = body
        .take_while(|chunk| std::future::ready(chunk.is_ok()))
        .filter_map(|chunk| std::future::ready(chunk.ok()))
        .concat()
        .await;
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Gemini puts the key in the query string; log only what precedes it.
pub(crate) fn redact_url(url: &str) -> &str {
    url.split_once('?').map_or(url, |(path, _)| path)
}

fn encode_json<T: Serialize>(body: &T) -> Result<Vec<u8>, CheckError> {
    serde_json::to_vec(body).map_err(|err| CheckError::Validation {
        message: format!("failed to serialize request: {err}"),
    })
}

pub mod reqwest;
