//! Normalization of caller input into a list of messages.

use serde_json::Value;

use crate::error::{ModelError, Result};
use crate::message::{Message, MessagePart};
use crate::validation;

/// Anything a caller may pass as run input.
///
/// Lists must be homogeneous.  [`Input::Json`] accepts the same shapes as
/// untyped JSON and is disambiguated with the validation type guards.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    Text(String),
    Part(MessagePart),
    Message(Message),
    Texts(Vec<String>),
    Parts(Vec<MessagePart>),
    Messages(Vec<Message>),
    Json(Value),
}

impl From<&str> for Input {
    fn from(text: &str) -> Self {
        Self::Text(text.to_owned())
    }
}

impl From<String> for Input {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<MessagePart> for Input {
    fn from(part: MessagePart) -> Self {
        Self::Part(part)
    }
}

impl From<Message> for Input {
    fn from(message: Message) -> Self {
        Self::Message(message)
    }
}

impl From<Vec<String>> for Input {
    fn from(texts: Vec<String>) -> Self {
        Self::Texts(texts)
    }
}

impl From<Vec<&str>> for Input {
    fn from(texts: Vec<&str>) -> Self {
        Self::Texts(texts.into_iter().map(str::to_owned).collect())
    }
}

impl From<Vec<MessagePart>> for Input {
    fn from(parts: Vec<MessagePart>) -> Self {
        Self::Parts(parts)
    }
}

impl From<Vec<Message>> for Input {
    fn from(messages: Vec<Message>) -> Self {
        Self::Messages(messages)
    }
}

impl From<Value> for Input {
    fn from(value: Value) -> Self {
        Self::Json(value)
    }
}

/// Turn any accepted input shape into the list of messages sent on the wire.
///
/// - a string becomes one user message with one text part;
/// - a part becomes one user message holding that part;
/// - a message becomes a one-element list;
/// - a list of strings or parts becomes one user message, one part per item;
/// - a list of messages is returned as is, and an empty list stays empty.
pub fn normalize_input(input: impl Into<Input>) -> Result<Vec<Message>> {
    match input.into() {
        Input::Text(text) => Ok(vec![Message::user_text(text)]),
        Input::Part(part) => Ok(vec![Message::user(vec![part])]),
        Input::Message(message) => Ok(vec![message]),
        Input::Texts(texts) => Ok(parts_to_messages(
            texts.into_iter().map(MessagePart::text).collect(),
        )),
        Input::Parts(parts) => Ok(parts_to_messages(parts)),
        Input::Messages(messages) => Ok(messages),
        Input::Json(value) => normalize_json(value),
    }
}

fn parts_to_messages(parts: Vec<MessagePart>) -> Vec<Message> {
    if parts.is_empty() {
        Vec::new()
    } else {
        vec![Message::user(parts)]
    }
}

fn normalize_json(value: Value) -> Result<Vec<Message>> {
    match value {
        Value::String(text) => normalize_input(text),
        Value::Array(items) => {
            if items.is_empty() {
                return Ok(Vec::new());
            }
            if items.iter().all(validation::is_message) {
                let messages = items
                    .into_iter()
                    .map(validation::parse::<Message>)
                    .collect::<Result<Vec<_>>>()?;
                return Ok(messages);
            }
            if items.iter().all(validation::is_message_part) {
                let parts = items
                    .into_iter()
                    .map(validation::parse::<MessagePart>)
                    .collect::<Result<Vec<_>>>()?;
                return Ok(parts_to_messages(parts));
            }
            if items.iter().all(Value::is_string) {
                let texts = items
                    .into_iter()
                    .filter_map(|v| match v {
                        Value::String(s) => Some(s),
                        _ => None,
                    })
                    .collect::<Vec<_>>();
                return normalize_input(texts);
            }
            Err(ModelError::MixedInput)
        }
        value @ Value::Object(_) => {
            if validation::is_message_part(&value) {
                validation::parse::<MessagePart>(value).and_then(|part| normalize_input(part))
            } else {
                validation::parse::<Message>(value).and_then(|message| normalize_input(message))
            }
        }
        other => Err(ModelError::validation(format!(
            "unsupported input: expected a string, part, message, or list, got `{other}`"
        ))),
    }
}
