//! Stream Codec Module
//!
//! Turns inbound frames into [`InboundMessage`] values and outbound commands
//! into text frames.
//!
//! The Okotoki stream has two data planes, selected per connection by the
//! `useBinary` query flag:
//!
//! - **JSON**: every frame is a single-key object whose key is the message
//!   type and whose value holds the fields, e.g.
//!   `{"index": {"coin": "BTC", "price": 50000.0}}`.
//! - **Binary**: data arrives as Avro datums encoded with the schema from an
//!   earlier `binarySchema` message. Control messages still arrive as text,
//!   already flattened (`{"type": "pong"}`).
//!
//! Both planes normalize into the same `{"type": ..., ...fields}` shape before
//! typed deserialization, so a datum decodes to the same value whichever plane
//! carried it.

use serde_json::Value;

use super::messages::{InboundMessage, OutboundMessage};
use super::schema::BinaryDecoder;

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// JSON encoding/decoding failed.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),

    /// Frame does not have a recognizable message shape.
    #[error("invalid message format: {0}")]
    InvalidFormat(String),

    /// Binary frame received before any `binarySchema` message.
    #[error("binary frame received before schema")]
    SchemaNotLoaded,

    /// Server-provided schema could not be compiled.
    #[error("invalid binary schema: {0}")]
    InvalidSchema(String),

    /// Binary frame does not match the schema.
    #[error("binary decode error: {0}")]
    BinaryDecode(String),

    /// Decoded datum holds a value with no JSON counterpart.
    #[error("unsupported binary value: {0}")]
    UnsupportedValue(&'static str),
}

/// Data plane negotiated for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WireFormat {
    /// Single-key JSON objects.
    #[default]
    Json,
    /// Avro datums after a schema bootstrap.
    Binary,
}

impl WireFormat {
    /// Select the format from the `useBinary` option.
    #[must_use]
    pub const fn from_use_binary(use_binary: bool) -> Self {
        if use_binary { Self::Binary } else { Self::Json }
    }

    /// Get the value of the `useBinary` query parameter.
    #[must_use]
    pub const fn use_binary(self) -> bool {
        matches!(self, Self::Binary)
    }

    /// Get a string label for metrics and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Binary => "binary",
        }
    }
}

/// Codec for one session.
///
/// Holds the binary decoder once the server has announced its schema. The
/// decoder is per-connection state: call [`StreamCodec::clear_schema`] when
/// the transport reopens.
#[derive(Debug, Clone, Default)]
pub struct StreamCodec {
    format: WireFormat,
    decoder: Option<BinaryDecoder>,
}

impl StreamCodec {
    /// Create a new codec.
    #[must_use]
    pub const fn new(format: WireFormat) -> Self {
        Self {
            format,
            decoder: None,
        }
    }

    /// Get the negotiated data plane.
    #[must_use]
    pub const fn format(&self) -> WireFormat {
        self.format
    }

    /// Check if a binary schema is loaded.
    #[must_use]
    pub const fn has_schema(&self) -> bool {
        self.decoder.is_some()
    }

    /// Compile and install the schema from a `binarySchema` message.
    ///
    /// # Errors
    ///
    /// Returns an error if the definition is not a valid Avro schema. The
    /// previous decoder, if any, stays installed.
    pub fn load_schema(&mut self, definition: &Value) -> Result<(), CodecError> {
        self.decoder = Some(BinaryDecoder::from_definition(definition)?);
        Ok(())
    }

    /// Drop the binary decoder.
    pub fn clear_schema(&mut self) {
        self.decoder = None;
    }

    /// Decode a text frame.
    ///
    /// Accepts either an already-tagged object (`{"type": "pong"}`) or the
    /// single-key form (`{"pong": {}}`), in both data planes.
    ///
    /// # Errors
    ///
    /// Returns an error if the frame is not JSON, has neither shape, or its
    /// fields do not match the message type.
    pub fn decode_text(&self, text: &str) -> Result<InboundMessage, CodecError> {
        let value: Value = serde_json::from_str(text)?;
        let normalized = normalize_text(value)?;
        Ok(serde_json::from_value(normalized)?)
    }

    /// Decode a binary frame with the loaded schema.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::SchemaNotLoaded`] if no `binarySchema` message
    /// has been received on this connection, or a decode error if the bytes
    /// do not match the schema.
    pub fn decode_binary(&self, bytes: &[u8]) -> Result<InboundMessage, CodecError> {
        let decoder = self.decoder.as_ref().ok_or(CodecError::SchemaNotLoaded)?;
        let normalized = decoder.decode(bytes)?;
        Ok(serde_json::from_value(normalized)?)
    }

    /// Encode an outbound command as a text frame.
    ///
    /// # Errors
    ///
    /// Returns an error if JSON serialization fails.
    pub fn encode(&self, message: &OutboundMessage) -> Result<String, CodecError> {
        Ok(serde_json::to_string(message)?)
    }
}

/// Flatten a text frame into the tagged shape.
fn normalize_text(value: Value) -> Result<Value, CodecError> {
    let Value::Object(object) = value else {
        return Err(CodecError::InvalidFormat("expected JSON object".to_string()));
    };

    if object.get("type").is_some_and(Value::is_string) {
        return Ok(Value::Object(object));
    }

    if object.len() != 1 {
        return Err(CodecError::InvalidFormat(format!(
            "expected single-key object, got {} keys",
            object.len()
        )));
    }

    let Some((key, inner)) = object.into_iter().next() else {
        return Err(CodecError::InvalidFormat("empty object".to_string()));
    };
    let Value::Object(mut fields) = inner else {
        return Err(CodecError::InvalidFormat(format!(
            "payload of {key} is not an object"
        )));
    };
    fields.insert("type".to_string(), Value::String(key));
    Ok(Value::Object(fields))
}
