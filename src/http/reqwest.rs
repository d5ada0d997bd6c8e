use std::error::Error as _;
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Method, Response};

use crate::error::CheckError;

use super::{
    DynHttpTransport, HttpBodyStream, HttpMethod, HttpRequest, HttpResponse, HttpStreamResponse,
    HttpTransport, redact_url,
};

/// 建连超时 与各检测项的截止时间相互独立
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// 基于 reqwest 的 HttpTransport 连接池由所有检测任务共享
pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    /// 使用自定义 reqwest::Client
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Client with the crate user agent and [`DEFAULT_CONNECT_TIMEOUT`].
    ///
    /// # Errors
    ///
    /// Returns [`CheckError::Transport`] when the TLS backend cannot be initialized.
    pub fn default_client() -> Result<Self, CheckError> {
        Self::with_connect_timeout(DEFAULT_CONNECT_TIMEOUT)
    }

    pub fn with_connect_timeout(connect_timeout: Duration) -> Result<Self, CheckError> {
        Client::builder()
            .user_agent(concat!("pingai/", env!("CARGO_PKG_VERSION")))
            .connect_timeout(connect_timeout)
            .build()
            .map(Self::new)
            .map_err(|err| CheckError::transport(format!("failed to create reqwest client: {err}")))
    }

    fn headers(request: &mut HttpRequest) -> Result<HeaderMap, CheckError> {
        let mut map = HeaderMap::with_capacity(request.headers.len());
        for (name, value) in request.headers.drain() {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|err| CheckError::transport(format!("invalid header name: {err}")))?;
            // never echo the value, it is usually a credential
            let value = HeaderValue::from_str(&value)
                .map_err(|_| CheckError::transport(format!("invalid characters in header {name}")))?;
            map.insert(name, value);
        }
        Ok(map)
    }

    /// Sends the request and waits for the status line.
    async fn dispatch(&self, mut request: HttpRequest) -> Result<Response, CheckError> {
        let method = match request.method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
        };
        let headers = Self::headers(&mut request)?;
        let mut builder = self.client.request(method, &request.url).headers(headers);
        if let Some(body) = request.body.take() {
            builder = builder.body(body);
        }

        tracing::trace!(url = redact_url(&request.url), method = ?request.method, "dispatching");
        builder.send().await.map_err(transport_error)
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CheckError> {
        let response = self.dispatch(request).await?;
        let status = response.status().as_u16();
        let body = response.bytes().await.map_err(transport_error)?.to_vec();
        Ok(HttpResponse { status, body })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, CheckError> {
        let response = self.dispatch(request).await?;
        let status = response.status().as_u16();
        let body: HttpBodyStream = Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map(|bytes| bytes.to_vec()).map_err(transport_error)),
        );
        Ok(HttpStreamResponse { status, body })
    }
}

/// Prefixes the failing stage so a check detail tells DNS/connect trouble from a
/// dropped body. URLs are stripped from the message since Gemini keys ride in the query.
fn transport_error(err: reqwest::Error) -> CheckError {
    let stage = if err.is_connect() {
        "connect"
    } else if err.is_timeout() {
        "timeout"
    } else if err.is_body() || err.is_decode() {
        "body"
    } else {
        "request"
    };
    let err = err.without_url();
    let mut message = format!("{stage}: {err}");
    let mut cause = err.source();
    while let Some(inner) = cause {
        let _ = write!(message, ": {inner}");
        cause = inner.source();
    }
    CheckError::transport(message)
}

/// 便捷构造线程安全 Transport
pub fn default_dyn_transport() -> Result<DynHttpTransport, CheckError> {
    Ok(Arc::new(ReqwestTransport::default_client()?))
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn header_values_are_not_echoed_in_errors() {
        let mut request = HttpRequest::get("http://a.example").with_headers(HashMap::from([(
            "Authorization".to_string(),
            "Bearer sk-secret\n".to_string(),
        )]));
        let err = ReqwestTransport::headers(&mut request).expect_err("newline is invalid");
        assert!(!err.detail().contains("sk-secret"), "{}", err.detail());
        assert!(err.detail().contains("authorization"));
    }

    #[tokio::test]
    async fn refused_connection_is_tagged_as_connect() {
        let transport = ReqwestTransport::default_client().expect("client");
        // nothing listens on port 1
        let err = transport
            .send(HttpRequest::get("http://127.0.0.1:1/v1/models?key=secret"))
            .await
            .expect_err("refused");
        let detail = err.detail();
        assert!(detail.starts_with("connect: "), "{detail}");
        assert!(!detail.contains("secret"), "{detail}");
    }
}
