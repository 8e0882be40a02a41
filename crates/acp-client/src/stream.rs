//! Typed event streams over `text/event-stream` responses.
//!
//! [`EventStream::connect`] checks the response before any event is produced;
//! after that the stream is lazy and single-pass.  The first error ends it,
//! and the underlying body is dropped as soon as the stream finishes, fails,
//! or is itself dropped.

use std::collections::VecDeque;
use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};

use acp_models::{Event, validation};
use futures::{Stream, StreamExt};
use reqwest::StatusCode;

use crate::error::{AcpError, ResponseHead, Result};
use crate::sse::{SseDecoder, SseFault, SseRecord};
use crate::transport::{BodyStream, HttpResponse};

const EVENT_STREAM: &str = "text/event-stream";

/// A live sequence of validated [`Event`]s.
pub struct EventStream {
    head: ResponseHead,
    body: Option<BodyStream>,
    decoder: SseDecoder,
    pending: VecDeque<SseRecord>,
    /// Decoder fault raised once `pending` has drained.
    deferred: Option<AcpError>,
    done: bool,
}

impl EventStream {
    /// Validate `response` as an event stream and start consuming it.
    ///
    /// Fails with [`AcpError::Stream`] on a 204, a non-2xx status, a content
    /// type other than `text/event-stream`, or a missing body, in that order.
    pub fn connect(response: HttpResponse) -> Result<Self> {
        let head = response.head();

        if head.status == StatusCode::NO_CONTENT {
            return Err(AcpError::stream(
                "server sent http 204, not connecting",
                head,
            ));
        }
        if !head.status.is_success() {
            return Err(AcpError::stream(
                format!("non-2xx status code ({})", head.status.as_u16()),
                head,
            ));
        }
        let is_event_stream = head
            .content_type()
            .is_some_and(|ct| ct.starts_with(EVENT_STREAM));
        if !is_event_stream {
            return Err(AcpError::stream(
                format!("invalid content type, expected \"{EVENT_STREAM}\""),
                head,
            ));
        }
        let Some(body) = response.into_body_stream() else {
            return Err(AcpError::stream("missing response body", head));
        };

        tracing::debug!(status = %head.status, "event stream opened");

        Ok(Self {
            head,
            body: Some(body),
            decoder: SseDecoder::new(),
            pending: VecDeque::new(),
            deferred: None,
            done: false,
        })
    }

    /// Status and headers of the response backing this stream.
    pub fn head(&self) -> &ResponseHead {
        &self.head
    }

    /// Whether the stream has produced its final item.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Stop producing items and release the connection.
    fn finish(&mut self) {
        self.done = true;
        self.body = None;
        self.pending.clear();
        self.deferred = None;
    }

    fn fail(&mut self, err: AcpError) -> Poll<Option<Result<Event>>> {
        tracing::debug!(error = %err, "event stream failed");
        self.finish();
        Poll::Ready(Some(Err(err)))
    }

    fn decode(record: &SseRecord) -> Result<Event> {
        tracing::trace!(event = ?record.event, data = %record.data, "sse record");
        let event: Event = validation::parse_str(&record.data)?;
        match event {
            Event::Error { error } => Err(AcpError::Protocol { error }),
            event => Ok(event),
        }
    }

    fn wrap_body_error(&self, err: AcpError) -> AcpError {
        match err {
            AcpError::Cancelled { .. } => err,
            other => AcpError::Stream {
                reason: format!("event stream interrupted: {other}"),
                head: Some(self.head.clone()),
                source: Some(Box::new(other)),
            },
        }
    }
}

impl Stream for EventStream {
    type Item = Result<Event>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();

        loop {
            if this.done {
                return Poll::Ready(None);
            }

            if let Some(record) = this.pending.pop_front() {
                return match Self::decode(&record) {
                    Ok(event) => Poll::Ready(Some(Ok(event))),
                    Err(err) => this.fail(err),
                };
            }

            if let Some(err) = this.deferred.take() {
                return this.fail(err);
            }

            let Some(body) = this.body.as_mut() else {
                this.finish();
                continue;
            };

            match body.poll_next_unpin(cx) {
                Poll::Pending => return Poll::Pending,
                Poll::Ready(Some(Ok(chunk))) => match this.decoder.feed(&chunk) {
                    Ok(records) => this.pending.extend(records),
                    Err(SseFault { records, error }) => {
                        this.pending.extend(records);
                        this.deferred = Some(AcpError::Stream {
                            reason: error.to_string(),
                            head: Some(this.head.clone()),
                            source: Some(Box::new(error)),
                        });
                        // Stop reading; the fault follows the records already decoded.
                        this.body = None;
                    }
                },
                Poll::Ready(Some(Err(e))) => {
                    let err = this.wrap_body_error(e);
                    return this.fail(err);
                }
                Poll::Ready(None) => {
                    tracing::debug!("event stream closed");
                    this.finish();
                    return Poll::Ready(None);
                }
            }
        }
    }
}

impl fmt::Debug for EventStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventStream")
            .field("head", &self.head)
            .field("pending", &self.pending.len())
            .field("deferred", &self.deferred.is_some())
            .field("done", &self.done)
            .finish()
    }
}
