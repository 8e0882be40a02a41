//! The HTTP seam between the client and the network.
//!
//! [`Transport`] is the only thing the client needs from an HTTP stack: send a
//! request, get back a status, headers, and a body that can be read whole or
//! as a stream of byte chunks.  [`ReqwestTransport`] is the default; tests
//! substitute an in-memory implementation built from
//! [`HttpResponse::from_bytes`] and [`HttpResponse::from_chunks`].

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures::stream::{self, BoxStream};
use futures::{StreamExt, TryStreamExt};
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;

use crate::error::{AcpError, ResponseHead, Result};

/// A response body delivered chunk by chunk.
pub type BodyStream = BoxStream<'static, Result<Bytes>>;

// ---------------------------------------------------------------------------
// Request
// ---------------------------------------------------------------------------

/// A fully built HTTP request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: HeaderMap,
    pub body: Option<Bytes>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: HeaderMap::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(Method::POST, url)
    }

    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Serialize `body` as the JSON request body.
    pub fn json<T: Serialize + ?Sized>(mut self, body: &T) -> Result<Self> {
        self.body = Some(Bytes::from(serde_json::to_vec(body)?));
        self.headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        Ok(self)
    }
}

// ---------------------------------------------------------------------------
// Response
// ---------------------------------------------------------------------------

/// A response whose body has not been read yet.
pub struct HttpResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Option<BodyStream>,
}

impl HttpResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Option<BodyStream>) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// A response with the whole body available up front.
    pub fn from_bytes(status: StatusCode, headers: HeaderMap, body: impl Into<Bytes>) -> Self {
        let body: Bytes = body.into();
        Self::new(
            status,
            headers,
            Some(stream::once(async move { Ok::<_, AcpError>(body) }).boxed()),
        )
    }

    /// A response whose body arrives as the given sequence of chunks.
    ///
    /// An `Err` item simulates a connection that breaks mid-body.
    pub fn from_chunks<I>(status: StatusCode, headers: HeaderMap, chunks: I) -> Self
    where
        I: IntoIterator<Item = Result<Bytes>>,
        I::IntoIter: Send + 'static,
    {
        Self::new(status, headers, Some(stream::iter(chunks).boxed()))
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn head(&self) -> ResponseHead {
        ResponseHead::new(self.status, self.headers.clone())
    }

    pub fn has_body(&self) -> bool {
        self.body.is_some()
    }

    /// Read the whole body as text, replacing invalid UTF-8.
    pub async fn text(self) -> Result<String> {
        let head = self.head();
        let Some(body) = self.body else {
            return Ok(String::new());
        };

        let bytes = body
            .try_fold(BytesMut::new(), |mut acc, chunk| async move {
                acc.extend_from_slice(&chunk);
                Ok::<_, AcpError>(acc)
            })
            .await
            .map_err(|e| match e {
                AcpError::Cancelled { .. } => e,
                other => AcpError::transport("failed to read response body", Some(head), other),
            })?;

        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    /// Take the body as a chunk stream.  `None` if the response has no body.
    pub fn into_body_stream(self) -> Option<BodyStream> {
        self.body
    }
}

impl fmt::Debug for HttpResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("has_body", &self.body.is_some())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Transport trait
// ---------------------------------------------------------------------------

/// Sends requests on behalf of the client.
///
/// Implementations return [`AcpError::Transport`] when the call cannot
/// complete and [`AcpError::Cancelled`] when it was aborted on purpose; the
/// client passes both through unchanged.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

// ---------------------------------------------------------------------------
// reqwest implementation
// ---------------------------------------------------------------------------

/// [`Transport`] backed by a shared [`reqwest::Client`].
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    http: reqwest::Client,
}

impl ReqwestTransport {
    /// Build a transport with an optional whole-request timeout.
    ///
    /// Leave the timeout unset for streaming runs; it also bounds the time
    /// spent reading the body.
    pub fn new(timeout: Option<Duration>) -> Result<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        Ok(Self {
            http: builder.build()?,
        })
    }

    /// Wrap an existing client, e.g. one with custom TLS or proxy settings.
    pub fn from_client(http: reqwest::Client) -> Self {
        Self { http }
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut builder = self
            .http
            .request(request.method, &request.url)
            .headers(request.headers);
        if let Some(body) = request.body {
            builder = builder.body(body);
        }

        let resp = builder.send().await?;
        let status = resp.status();
        let headers = resp.headers().clone();
        let body = resp.bytes_stream().map_err(AcpError::from).boxed();

        Ok(HttpResponse::new(status, headers, Some(body)))
    }
}
