//! Server-sent events record decoder.
//!
//! Feeds raw body chunks in, gets complete records out.  Lines may end in
//! LF, CRLF, or a lone CR, and a chunk boundary may fall anywhere, including
//! inside a multi-byte UTF-8 sequence or between the CR and LF of a CRLF
//! pair.  Bytes are only decoded once a full line is available.
//!
//! Malformed lines are faults, never skipped: invalid UTF-8, a non-integer
//! `retry`, or a field outside `event`/`data`/`id`/`retry`.

/// One dispatched event-stream record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseRecord {
    /// Value of the `event:` field, if the record had one.
    pub event: Option<String>,
    /// All `data:` lines of the record joined with `\n`.
    pub data: String,
    pub id: Option<String>,
    /// Reconnection delay in milliseconds.
    pub retry: Option<u64>,
}

/// A malformed line in the event stream.
#[derive(Debug, thiserror::Error)]
pub enum SseError {
    #[error("invalid utf-8 in event stream: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("invalid retry value `{value}` in event stream, expected an integer")]
    InvalidRetry { value: String },

    #[error("unknown field `{field}` in event stream")]
    UnknownField { field: String },
}

/// A fault raised by [`SseDecoder::feed`].
///
/// `records` holds what the same chunk completed before the malformed line;
/// they precede the fault in transmission order.
#[derive(Debug)]
pub struct SseFault {
    pub records: Vec<SseRecord>,
    pub error: SseError,
}

/// Incremental decoder for `text/event-stream` bodies.
#[derive(Debug, Default)]
pub struct SseDecoder {
    /// Bytes after the last complete line.
    buffer: Vec<u8>,
    /// The previous chunk ended in CR; swallow a leading LF.
    pending_cr: bool,
    event: Option<String>,
    data: Vec<String>,
    id: Option<String>,
    retry: Option<u64>,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode `chunk` and return every record completed by it.
    ///
    /// A record still being assembled when the body ends is never returned.
    /// After a fault the decoder holds no state and should not be fed again.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Vec<SseRecord>, SseFault> {
        let mut chunk = chunk;
        if std::mem::take(&mut self.pending_cr) && chunk.first() == Some(&b'\n') {
            chunk = &chunk[1..];
        }
        self.buffer.extend_from_slice(chunk);

        let mut records = Vec::new();
        let mut start = 0;
        let mut pos = 0;

        while pos < self.buffer.len() {
            let byte = self.buffer[pos];
            if byte != b'\n' && byte != b'\r' {
                pos += 1;
                continue;
            }

            let mut next = pos + 1;
            if byte == b'\r' {
                match self.buffer.get(next) {
                    Some(b'\n') => next += 1,
                    Some(_) => {}
                    None => self.pending_cr = true,
                }
            }

            let processed = match std::str::from_utf8(&self.buffer[start..pos]) {
                Ok(line) => {
                    let line = line.to_owned();
                    self.process_line(&line)
                }
                Err(e) => Err(SseError::from(e)),
            };
            match processed {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(error) => {
                    *self = Self::default();
                    return Err(SseFault { records, error });
                }
            }

            start = next;
            pos = next;
        }

        self.buffer.drain(..start);
        Ok(records)
    }

    fn process_line(&mut self, line: &str) -> Result<Option<SseRecord>, SseError> {
        if line.is_empty() {
            return Ok(self.dispatch());
        }
        if line.starts_with(':') {
            return Ok(None);
        }

        let (field, value) = match line.split_once(':') {
            Some((field, value)) => (field, value.strip_prefix(' ').unwrap_or(value)),
            None => (line, ""),
        };

        match field {
            "event" => self.event = Some(value.to_owned()),
            "data" => self.data.push(value.to_owned()),
            "id" if value.contains('\0') => tracing::trace!("ignoring sse id containing NUL"),
            "id" => self.id = Some(value.to_owned()),
            "retry" => {
                let invalid = || SseError::InvalidRetry {
                    value: value.to_owned(),
                };
                if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(invalid());
                }
                self.retry = Some(value.parse::<u64>().map_err(|_| invalid())?);
            }
            _ => {
                return Err(SseError::UnknownField {
                    field: field.to_owned(),
                });
            }
        }
        Ok(None)
    }

    fn dispatch(&mut self) -> Option<SseRecord> {
        let event = self.event.take();
        let id = self.id.take();
        let retry = self.retry.take();

        if self.data.is_empty() {
            return None;
        }

        Some(SseRecord {
            event,
            data: std::mem::take(&mut self.data).join("\n"),
            id,
            retry,
        })
    }
}
