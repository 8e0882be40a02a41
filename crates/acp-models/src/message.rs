//! Messages, message parts, and artifacts.
//!
//! A [`Message`] is an ordered list of [`MessagePart`]s tagged with a
//! [`Role`].  Part order is significant: it reflects the order in which the
//! content was produced.  Every part carries exactly one of inline `content`
//! or a `content_url`; that invariant is checked whenever a part is built,
//! whether from JSON or through the constructors below.

use std::fmt;
use std::sync::LazyLock;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ModelError, Result};

/// Default content type of a message part.
pub const TEXT_PLAIN: &str = "text/plain";

static ROLE_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(user|agent(/[a-zA-Z0-9_\-]+)?)$").expect("role pattern is a valid regex")
});

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// Who produced a message: `user`, `agent`, or `agent/<name>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Role(String);

impl Role {
    /// Validate and wrap a role string.
    pub fn new(role: impl Into<String>) -> Result<Self> {
        let role = role.into();
        if ROLE_PATTERN.is_match(&role) {
            Ok(Self(role))
        } else {
            Err(ModelError::validation(format!(
                "invalid role `{role}`: expected `user`, `agent`, or `agent/<name>`"
            )))
        }
    }

    pub fn user() -> Self {
        Self("user".into())
    }

    pub fn agent() -> Self {
        Self("agent".into())
    }

    /// An agent role qualified with the agent's name, e.g. `agent/echo`.
    pub fn agent_named(name: &str) -> Result<Self> {
        Self::new(format!("agent/{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_agent(&self) -> bool {
        self.0.starts_with("agent")
    }
}

impl Default for Role {
    fn default() -> Self {
        Self::user()
    }
}

impl TryFrom<String> for Role {
    type Error = ModelError;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Role> for String {
    fn from(role: Role) -> Self {
        role.0
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ---------------------------------------------------------------------------
// MessagePart
// ---------------------------------------------------------------------------

/// How inline part content is encoded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentEncoding {
    #[default]
    Plain,
    Base64,
}

/// Where the bytes of a part live.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Body {
    Inline(String),
    Url(String),
}

/// A single unit of message content.
///
/// Unknown JSON fields are kept in [`MessagePart::extra`] and written back on
/// serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPart", into = "RawPart")]
pub struct MessagePart {
    name: Option<String>,
    content_type: String,
    body: Body,
    content_encoding: ContentEncoding,
    extra: Map<String, Value>,
}

impl MessagePart {
    /// Build a part from optional inline content and an optional URL.
    ///
    /// Exactly one of the two must be given.
    pub fn new(content: Option<String>, content_url: Option<String>) -> Result<Self> {
        Ok(Self {
            name: None,
            content_type: TEXT_PLAIN.to_owned(),
            body: Body::from_fields(content, content_url)?,
            content_encoding: ContentEncoding::Plain,
            extra: Map::new(),
        })
    }

    /// An unnamed plain-text part.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            name: None,
            content_type: TEXT_PLAIN.to_owned(),
            body: Body::Inline(content.into()),
            content_encoding: ContentEncoding::Plain,
            extra: Map::new(),
        }
    }

    /// A part whose content lives at `content_url`.
    pub fn url(content_url: impl Into<String>) -> Result<Self> {
        Self::new(None, Some(content_url.into()))
    }

    /// A base64-encoded inline part carrying raw bytes.
    pub fn binary(bytes: &[u8], content_type: impl Into<String>) -> Self {
        Self {
            name: None,
            content_type: content_type.into(),
            body: Body::Inline(BASE64.encode(bytes)),
            content_encoding: ContentEncoding::Base64,
            extra: Map::new(),
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }

    pub fn with_encoding(mut self, encoding: ContentEncoding) -> Self {
        self.content_encoding = encoding;
        self
    }

    /// Attach an extension field that is not part of the core schema.
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Inline content, if this part is not URL-backed.
    pub fn content(&self) -> Option<&str> {
        match &self.body {
            Body::Inline(content) => Some(content),
            Body::Url(_) => None,
        }
    }

    pub fn content_url(&self) -> Option<&str> {
        match &self.body {
            Body::Url(url) => Some(url),
            Body::Inline(_) => None,
        }
    }

    pub fn content_encoding(&self) -> ContentEncoding {
        self.content_encoding
    }

    /// Fields that were present on the wire but are not part of the schema.
    pub fn extra(&self) -> &Map<String, Value> {
        &self.extra
    }

    /// Whether this part is inline, plain-encoded `text/plain`.
    pub fn is_plain_text(&self) -> bool {
        self.content_type == TEXT_PLAIN
            && self.content_encoding == ContentEncoding::Plain
            && matches!(self.body, Body::Inline(_))
    }

    /// The raw bytes of inline content, decoding base64 when required.
    pub fn decoded_content(&self) -> Result<Vec<u8>> {
        let Body::Inline(content) = &self.body else {
            return Err(ModelError::validation(
                "part content is referenced by URL, not inline",
            ));
        };

        match self.content_encoding {
            ContentEncoding::Plain => Ok(content.as_bytes().to_vec()),
            ContentEncoding::Base64 => BASE64
                .decode(content)
                .map_err(|e| ModelError::validation(format!("invalid base64 content: {e}"))),
        }
    }

    /// Whether this part may be merged with an adjacent one by
    /// [`compress_message`].
    fn is_joinable(&self) -> bool {
        self.name.is_none() && self.is_plain_text()
    }
}

impl Body {
    fn from_fields(content: Option<String>, content_url: Option<String>) -> Result<Self> {
        match (content, content_url) {
            (Some(content), None) => Ok(Self::Inline(content)),
            (None, Some(url)) => {
                url::Url::parse(&url).map_err(|e| {
                    ModelError::validation(format!("invalid content_url `{url}`: {e}"))
                })?;
                Ok(Self::Url(url))
            }
            (None, None) => Err(ModelError::validation(
                "either content or content_url must be provided",
            )),
            (Some(_), Some(_)) => Err(ModelError::validation(
                "only one of content or content_url can be provided",
            )),
        }
    }
}

/// Wire shape of a part before its invariants are checked.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawPart {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(default)]
    content_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content: Option<String>,
    #[serde(default)]
    content_encoding: Option<ContentEncoding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    content_url: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

impl TryFrom<RawPart> for MessagePart {
    type Error = ModelError;

    fn try_from(raw: RawPart) -> Result<Self> {
        Ok(Self {
            body: Body::from_fields(raw.content, raw.content_url)?,
            name: raw.name,
            content_type: raw.content_type.unwrap_or_else(|| TEXT_PLAIN.to_owned()),
            content_encoding: raw.content_encoding.unwrap_or_default(),
            extra: raw.extra,
        })
    }
}

impl From<MessagePart> for RawPart {
    fn from(part: MessagePart) -> Self {
        let (content, content_url) = match part.body {
            Body::Inline(content) => (Some(content), None),
            Body::Url(url) => (None, Some(url)),
        };
        Self {
            name: part.name,
            content_type: Some(part.content_type),
            content,
            content_encoding: Some(part.content_encoding),
            content_url,
            extra: part.extra,
        }
    }
}

// ---------------------------------------------------------------------------
// Artifact
// ---------------------------------------------------------------------------

/// A named message part, typically a file-like result of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawPart", into = "RawPart")]
pub struct Artifact {
    /// Always carries a name.
    part: MessagePart,
}

impl Artifact {
    pub fn new(name: impl Into<String>, part: MessagePart) -> Self {
        Self {
            part: part.with_name(name),
        }
    }

    pub fn name(&self) -> &str {
        self.part.name().unwrap_or_default()
    }

    pub fn as_part(&self) -> &MessagePart {
        &self.part
    }

    pub fn into_part(self) -> MessagePart {
        self.part
    }
}

impl TryFrom<MessagePart> for Artifact {
    type Error = ModelError;

    fn try_from(part: MessagePart) -> Result<Self> {
        if part.name.is_none() {
            return Err(ModelError::validation("artifact name is required"));
        }
        Ok(Self { part })
    }
}

impl TryFrom<RawPart> for Artifact {
    type Error = ModelError;

    fn try_from(raw: RawPart) -> Result<Self> {
        MessagePart::try_from(raw).and_then(Self::try_from)
    }
}

impl From<Artifact> for RawPart {
    fn from(artifact: Artifact) -> Self {
        artifact.part.into()
    }
}

impl From<Artifact> for MessagePart {
    fn from(artifact: Artifact) -> Self {
        artifact.part
    }
}

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// An ordered sequence of parts produced by one participant.
///
/// `created_at` and `completed_at` default to the current time when absent
/// from the wire; an explicit `null` is kept as `None`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    #[serde(default)]
    pub role: Role,
    pub parts: Vec<MessagePart>,
    #[serde(default = "now")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default = "now")]
    pub completed_at: Option<DateTime<Utc>>,
}

fn now() -> Option<DateTime<Utc>> {
    Some(Utc::now())
}

impl Message {
    pub fn new(role: Role, parts: Vec<MessagePart>) -> Self {
        let ts = Utc::now();
        Self {
            role,
            parts,
            created_at: Some(ts),
            completed_at: Some(ts),
        }
    }

    pub fn user(parts: Vec<MessagePart>) -> Self {
        Self::new(Role::user(), parts)
    }

    pub fn agent(parts: Vec<MessagePart>) -> Self {
        Self::new(Role::agent(), parts)
    }

    /// A user message with a single plain-text part.
    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![MessagePart::text(text)])
    }

    /// An agent message with a single plain-text part.
    pub fn agent_text(text: impl Into<String>) -> Self {
        Self::agent(vec![MessagePart::text(text)])
    }

    /// Concatenated inline content of every `text/plain` part.
    pub fn text(&self) -> String {
        self.parts
            .iter()
            .filter(|p| p.content_type() == TEXT_PLAIN)
            .filter_map(MessagePart::content)
            .collect()
    }

    /// Append `other` to this message.  See [`concat_messages`].
    pub fn concat(&self, other: &Message) -> Result<Message> {
        if self.role != other.role {
            return Err(ModelError::RoleMismatch {
                left: self.role.to_string(),
                right: other.role.to_string(),
            });
        }

        let mut parts = Vec::with_capacity(self.parts.len() + other.parts.len());
        parts.extend(self.parts.iter().cloned());
        parts.extend(other.parts.iter().cloned());

        Ok(Message {
            role: self.role.clone(),
            parts,
            created_at: match (self.created_at, other.created_at) {
                (Some(a), Some(b)) => Some(a.min(b)),
                _ => None,
            },
            completed_at: match (self.completed_at, other.completed_at) {
                (Some(a), Some(b)) => Some(a.max(b)),
                _ => None,
            },
        })
    }

    /// Merge adjacent plain-text parts.  See [`compress_message`].
    pub fn compress(&self) -> Message {
        let mut parts: Vec<MessagePart> = Vec::with_capacity(self.parts.len());

        for part in &self.parts {
            match parts.last_mut() {
                Some(last) if last.is_joinable() && part.is_joinable() => {
                    let joined = format!(
                        "{}{}",
                        last.content().unwrap_or_default(),
                        part.content().unwrap_or_default()
                    );
                    *last = MessagePart::text(joined);
                }
                _ => parts.push(part.clone()),
            }
        }

        Message {
            parts,
            ..self.clone()
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text())
    }
}

/// Merge two messages of the same role into one logical message.
///
/// Parts are `lhs.parts` followed by `rhs.parts`.  `created_at` is the
/// earlier and `completed_at` the later of the two timestamps; if either side
/// lacks a timestamp the result lacks it too.
pub fn concat_messages(lhs: &Message, rhs: &Message) -> Result<Message> {
    lhs.concat(rhs)
}

/// Merge runs of adjacent unnamed, inline, plain-encoded `text/plain` parts.
///
/// Parts are never reordered and never merged across a part that does not
/// qualify.
pub fn compress_message(message: &Message) -> Message {
    message.compress()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
