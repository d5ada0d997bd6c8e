//! Scripted transport shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;

use crate::error::CheckError;
use crate::http::{HttpBodyStream, HttpRequest, HttpResponse, HttpStreamResponse, HttpTransport};

/// One canned reply, consumed in order by [`ScriptedTransport`].
pub(crate) enum Scripted {
    Reply {
        status: u16,
        body: Vec<u8>,
        chunk_size: usize,
    },
    Fail(String),
}

impl Scripted {
    pub(crate) fn json(status: u16, body: &str) -> Self {
        Scripted::Reply {
            status,
            body: body.as_bytes().to_vec(),
            chunk_size: usize::MAX,
        }
    }

    /// 200 reply whose body arrives in `chunk_size` byte pieces.
    pub(crate) fn sse(body: &str, chunk_size: usize) -> Self {
        Scripted::Reply {
            status: 200,
            body: body.as_bytes().to_vec(),
            chunk_size: chunk_size.max(1),
        }
    }

    pub(crate) fn fail(message: &str) -> Self {
        Scripted::Fail(message.to_string())
    }
}

/// Transport that records every request and answers from a queue.
pub(crate) struct ScriptedTransport {
    replies: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl ScriptedTransport {
    pub(crate) fn new(replies: Vec<Scripted>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: HttpRequest) -> Result<(u16, Vec<u8>, usize), CheckError> {
        self.requests.lock().unwrap().push(request);
        match self.replies.lock().unwrap().pop_front() {
            Some(Scripted::Reply {
                status,
                body,
                chunk_size,
            }) => Ok((status, body, chunk_size)),
            Some(Scripted::Fail(message)) => Err(CheckError::transport(message)),
            None => Err(CheckError::transport("no scripted reply left")),
        }
    }
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, CheckError> {
        let (status, body, _) = self.next(request)?;
        Ok(HttpResponse { status, body })
    }

    async fn send_stream(&self, request: HttpRequest) -> Result<HttpStreamResponse, CheckError> {
        let (status, body, chunk_size) = self.next(request)?;
        let chunks: Vec<Result<Vec<u8>, CheckError>> = body
            .chunks(chunk_size.min(body.len().max(1)))
            .map(|chunk| Ok(chunk.to_vec()))
            .collect();
        let body: HttpBodyStream = Box::pin(stream::iter(chunks));
        Ok(HttpStreamResponse { status, body })
    }
}
