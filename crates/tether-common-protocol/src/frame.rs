// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ProtocolError;

/// One whole message on the wire: a JSON object with a string `type`.
///
/// The transport never looks past the discriminator, which keeps it usable
/// for both the typed session channel and the bundler's reload channel.
#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Value", into = "Value")]
pub struct Frame {
	fields: Map<String, Value>,
}

impl Frame {
	/// Starts a frame that carries only its discriminator.
	pub fn new(frame_type: impl Into<String>) -> Self {
		let mut fields = Map::new();
		fields.insert("type".to_string(), Value::String(frame_type.into()));
		Self { fields }
	}

	/// Adds or replaces a field. The discriminator itself cannot be replaced.
	pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
		let key = key.into();
		if key != "type" {
			self.fields.insert(key, value.into());
		}
		self
	}

	/// Builds a frame from a JSON value, rejecting anything without a `type`.
	pub fn from_value(value: Value) -> Result<Self, ProtocolError> {
		let Value::Object(fields) = value else {
			return Err(ProtocolError::NotAnObject);
		};
		match fields.get("type") {
			Some(Value::String(_)) => Ok(Self { fields }),
			_ => Err(ProtocolError::MissingType),
		}
	}

	/// Parses a frame from the text of one wire message.
	pub fn parse(text: &str) -> Result<Self, ProtocolError> {
		let value: Value = serde_json::from_str(text)?;
		Self::from_value(value)
	}

	/// Serializes a typed message into a frame.
	pub fn encode<T: Serialize>(message: &T) -> Result<Self, ProtocolError> {
		Self::from_value(serde_json::to_value(message)?)
	}

	/// Deserializes the frame into a typed message.
	pub fn decode<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
		Ok(serde_json::from_value(Value::Object(self.fields.clone()))?)
	}

	/// The `type` discriminator.
	pub fn frame_type(&self) -> &str {
		self
			.fields
			.get("type")
			.and_then(Value::as_str)
			.unwrap_or_default()
	}

	/// Looks up a field other than the discriminator.
	pub fn get(&self, key: &str) -> Option<&Value> {
		self.fields.get(key)
	}

	/// Renders the frame as the text of one wire message.
	pub fn to_text(&self) -> String {
		Value::Object(self.fields.clone()).to_string()
	}
}

impl TryFrom<Value> for Frame {
	type Error = ProtocolError;

	fn try_from(value: Value) -> Result<Self, Self::Error> {
		Self::from_value(value)
	}
}

impl From<Frame> for Value {
	fn from(frame: Frame) -> Self {
		Value::Object(frame.fields)
	}
}

impl fmt::Debug for Frame {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Frame")
			.field("type", &self.frame_type())
			.field("fields", &self.fields.len())
			.finish()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	#[test]
	fn test_parse_requires_object() {
		assert!(matches!(
			Frame::parse("[1, 2]"),
			Err(ProtocolError::NotAnObject)
		));
		assert!(matches!(
			Frame::parse("not json"),
			Err(ProtocolError::InvalidJson(_))
		));
	}

	#[test]
	fn test_parse_requires_string_type() {
		assert!(matches!(
			Frame::parse(r#"{"chunk":"hi"}"#),
			Err(ProtocolError::MissingType)
		));
		assert!(matches!(
			Frame::parse(r#"{"type":7}"#),
			Err(ProtocolError::MissingType)
		));
	}

	#[test]
	fn test_builder_keeps_discriminator() {
		let frame = Frame::new("log-opt-in").with("level", 2).with("type", "other");
		assert_eq!(frame.frame_type(), "log-opt-in");
		assert_eq!(frame.get("level"), Some(&json!(2)));
	}

	#[test]
	fn test_frame_type_and_fields() {
		let frame = Frame::from_value(json!({"type": "log-opt-in", "level": 2})).unwrap();
		assert_eq!(frame.frame_type(), "log-opt-in");
		assert_eq!(frame.get("level"), Some(&json!(2)));
		assert_eq!(frame.get("missing"), None);
	}

	/// Test: text produced by a frame parses back to the same frame.
	///
	/// Why this test is important: captured frames are replayed from their text
	/// form after every reconnect; any drift would send the remote a different
	/// registration than the one the caller issued.
	#[test]
	fn test_text_is_stable() {
		let frame = Frame::from_value(json!({
			"type": "register-entrypoints",
			"entryPoints": ["index.bundle?platform=ios"],
		}))
		.unwrap();
		let reparsed = Frame::parse(&frame.to_text()).unwrap();
		assert_eq!(reparsed, frame);
	}

	#[test]
	fn test_debug_does_not_dump_fields() {
		let frame = Frame::from_value(json!({"type": "prompt", "content": "private"})).unwrap();
		let rendered = format!("{frame:?}");
		assert!(rendered.contains("prompt"));
		assert!(!rendered.contains("private"));
	}
}
