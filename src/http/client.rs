use super::redact::Redactor;
use crate::trace::SessionTrace;
use futures_util::StreamExt;
use reqwest::header::HeaderMap;
use reqwest::{Client, Request};
use serde::Serialize;
use std::fmt;

/// reqwest wrapper that mirrors every exchange into the session trace.
#[derive(Clone)]
pub struct HttpClient {
    inner: Client,
    redactor: Redactor,
    trace: Option<SessionTrace>,
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("redactor", &self.redactor)
            .field("traced", &self.trace.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponseData {
    pub status: u16,
    pub body: String,
}

impl HttpResponseData {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl HttpClient {
    pub fn new(inner: Client) -> Self {
        Self {
            inner,
            redactor: Redactor::default(),
            trace: None,
        }
    }

    pub fn with_trace(mut self, trace: SessionTrace) -> Self {
        self.trace = Some(trace);
        self
    }

    pub fn with_redactor(mut self, redactor: Redactor) -> Self {
        self.redactor = redactor;
        self
    }

    pub async fn post_json<T: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        payload: &T,
    ) -> Result<HttpResponseData, reqwest::Error> {
        let request = self.build_post(url, query, payload)?;
        let response = self.execute(request).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        self.trace_response(status, &headers, &body);
        Ok(HttpResponseData { status, body })
    }

    /// Posts `payload` and hands each body chunk of a successful response to
    /// `on_chunk` as it arrives. For non-2xx responses the body is read in
    /// full and returned instead; `on_chunk` is not called.
    pub async fn post_json_stream<T, F>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        payload: &T,
        mut on_chunk: F,
    ) -> Result<HttpResponseData, reqwest::Error>
    where
        T: Serialize + ?Sized,
        F: FnMut(&[u8]) + Send,
    {
        let request = self.build_post(url, query, payload)?;
        let response = self.execute(request).await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();

        if !response.status().is_success() {
            let body = response.text().await?;
            self.trace_response(status, &headers, &body);
            return Ok(HttpResponseData { status, body });
        }

        self.trace_response(status, &headers, "");
        let mut tracer = ChunkTracer::new(self.redactor.max_body_chars);
        let mut chunks = response.bytes_stream();
        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(err) => {
                    self.trace_error(&err);
                    return Err(err);
                }
            };
            if let Some(trace) = &self.trace
                && let Some(text) = tracer.push(&chunk)
            {
                trace.log_http_chunk(&text);
            }
            on_chunk(&chunk);
        }
        if let Some(trace) = &self.trace
            && let Some(text) = tracer.finish()
        {
            trace.log_http_chunk(&text);
        }

        Ok(HttpResponseData {
            status,
            body: String::new(),
        })
    }

    fn build_post<T: Serialize + ?Sized>(
        &self,
        url: &str,
        query: &[(&str, &str)],
        payload: &T,
    ) -> Result<Request, reqwest::Error> {
        let request = self.inner.post(url).query(query).json(payload).build()?;
        if let Some(trace) = &self.trace {
            let body = request
                .body()
                .and_then(|body| body.as_bytes())
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .unwrap_or_default();
            trace.log_http_request(
                &format!(
                    "{} {}",
                    request.method(),
                    self.redactor.url(request.url())
                ),
                &self.header_lines(request.headers()),
                &self.redactor.body(&body),
            );
        }
        Ok(request)
    }

    async fn execute(&self, request: Request) -> Result<reqwest::Response, reqwest::Error> {
        self.inner.execute(request).await.inspect_err(|err| {
            self.trace_error(err);
        })
    }

    fn trace_response(&self, status: u16, headers: &HeaderMap, body: &str) {
        if let Some(trace) = &self.trace {
            trace.log_http_response(
                status,
                &self.header_lines(headers),
                &self.redactor.body(body),
            );
        }
    }

    fn trace_error(&self, err: &reqwest::Error) {
        if let Some(trace) = &self.trace {
            trace.log_http_error(&err.to_string());
        }
    }

    fn header_lines(&self, headers: &HeaderMap) -> Vec<String> {
        headers
            .iter()
            .map(|(name, value)| self.redactor.header(name, value))
            .collect()
    }
}

/// Turns streamed body bytes into trace text. An incomplete UTF-8 sequence at
/// the end of a chunk waits for the next chunk, and the whole stream shares one
/// `max_body_chars` budget.
struct ChunkTracer {
    pending: Vec<u8>,
    remaining: usize,
    dropped: usize,
}

impl ChunkTracer {
    fn new(max_chars: usize) -> Self {
        Self {
            pending: Vec::new(),
            remaining: max_chars,
            dropped: 0,
        }
    }

    fn push(&mut self, chunk: &[u8]) -> Option<String> {
        self.pending.extend_from_slice(chunk);
        let complete = match std::str::from_utf8(&self.pending) {
            Err(err) if err.error_len().is_none() => err.valid_up_to(),
            _ => self.pending.len(),
        };
        let text = String::from_utf8_lossy(&self.pending[..complete]).into_owned();
        self.pending.drain(..complete);
        self.take(&text)
    }

    fn finish(mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        let tail = self.take(&rest);
        if self.dropped == 0 {
            return tail;
        }
        Some(format!(
            "{}... <truncated {} chars>",
            tail.unwrap_or_default(),
            self.dropped
        ))
    }

    fn take(&mut self, text: &str) -> Option<String> {
        let total = text.chars().count();
        let kept = total.min(self.remaining);
        self.remaining -= kept;
        self.dropped += total - kept;
        (kept > 0).then(|| text.chars().take(kept).collect())
    }
}
