//! Avro Binary Decoder
//!
//! Decodes binary data frames using the schema the server pushes in its
//! `binarySchema` message. The writer schema is a union of the data record
//! types; each decoded datum is normalized into a JSON object whose `type`
//! field carries the fully-qualified record name of the union branch, so that
//! binary and text frames deserialize into the same
//! [`InboundMessage`](super::messages::InboundMessage) values.
//!
//! # Example
//!
//! A datum of the union branch `com.okotoki.model.Index` with fields
//! `coin = "BTC"` and `price = 50000.0` becomes:
//! ```json
//! {"type": "com.okotoki.model.Index", "coin": "BTC", "price": 50000.0}
//! ```

use apache_avro::Schema;
use apache_avro::types::Value as AvroValue;
use serde_json::{Map, Number, Value as JsonValue};

use super::codec::CodecError;

/// Decoder bound to one server-provided writer schema.
#[derive(Debug, Clone)]
pub struct BinaryDecoder {
    schema: Schema,
}

impl BinaryDecoder {
    /// Compile a decoder from the schema definition in a `binarySchema`
    /// message.
    ///
    /// # Errors
    ///
    /// Returns [`CodecError::InvalidSchema`] if the definition is not a valid
    /// Avro schema.
    pub fn from_definition(definition: &JsonValue) -> Result<Self, CodecError> {
        let schema =
            Schema::parse(definition).map_err(|e| CodecError::InvalidSchema(e.to_string()))?;
        Ok(Self { schema })
    }

    /// Get the compiled writer schema.
    #[must_use]
    pub const fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Decode one binary frame into a tagged JSON object.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes do not match the schema, the datum is
    /// not a named record, or it holds values with no JSON counterpart.
    pub fn decode(&self, bytes: &[u8]) -> Result<JsonValue, CodecError> {
        let mut reader = bytes;
        let datum = apache_avro::from_avro_datum(&self.schema, &mut reader, None)
            .map_err(|e| CodecError::BinaryDecode(e.to_string()))?;

        let (type_name, record) = match (&self.schema, datum) {
            (Schema::Union(union), AvroValue::Union(index, inner)) => {
                let branch = usize::try_from(index)
                    .ok()
                    .and_then(|i| union.variants().get(i))
                    .ok_or_else(|| {
                        CodecError::BinaryDecode(format!("union branch {index} out of range"))
                    })?;
                (record_name(branch)?, *inner)
            }
            (schema @ Schema::Record(_), record) => (record_name(schema)?, record),
            _ => {
                return Err(CodecError::InvalidFormat(
                    "binary datum is not a union of records".to_string(),
                ));
            }
        };

        let JsonValue::Object(mut fields) = to_json(record)? else {
            return Err(CodecError::InvalidFormat(format!(
                "{type_name} datum is not a record"
            )));
        };
        fields.insert("type".to_string(), JsonValue::String(type_name));
        Ok(JsonValue::Object(fields))
    }
}

/// Get the fully-qualified name of a record branch.
fn record_name(schema: &Schema) -> Result<String, CodecError> {
    match schema {
        Schema::Record(record) => Ok(record.name.fullname(None)),
        Schema::Ref { name } => Ok(name.fullname(None)),
        _ => Err(CodecError::InvalidFormat(
            "union branch is not a named record".to_string(),
        )),
    }
}

/// Convert a decoded Avro value into its JSON counterpart.
///
/// Nested unions are unwrapped to the selected branch. Enums become their
/// symbol. Temporal logical types keep their integer representation.
fn to_json(value: AvroValue) -> Result<JsonValue, CodecError> {
    Ok(match value {
        AvroValue::Null => JsonValue::Null,
        AvroValue::Boolean(b) => JsonValue::Bool(b),
        AvroValue::Int(n) | AvroValue::Date(n) | AvroValue::TimeMillis(n) => JsonValue::from(n),
        AvroValue::Long(n)
        | AvroValue::TimeMicros(n)
        | AvroValue::TimestampMillis(n)
        | AvroValue::TimestampMicros(n) => JsonValue::from(n),
        AvroValue::Float(f) => float(f64::from(f))?,
        AvroValue::Double(f) => float(f)?,
        AvroValue::String(s) | AvroValue::Enum(_, s) => JsonValue::String(s),
        AvroValue::Union(_, inner) => to_json(*inner)?,
        AvroValue::Array(items) => JsonValue::Array(
            items
                .into_iter()
                .map(to_json)
                .collect::<Result<Vec<_>, _>>()?,
        ),
        AvroValue::Map(entries) => JsonValue::Object(
            entries
                .into_iter()
                .map(|(k, v)| Ok((k, to_json(v)?)))
                .collect::<Result<Map<_, _>, CodecError>>()?,
        ),
        AvroValue::Record(fields) => JsonValue::Object(
            fields
                .into_iter()
                .map(|(k, v)| Ok((k, to_json(v)?)))
                .collect::<Result<Map<_, _>, CodecError>>()?,
        ),
        AvroValue::Bytes(_) | AvroValue::Fixed(..) => {
            return Err(CodecError::UnsupportedValue("bytes"));
        }
        _ => return Err(CodecError::UnsupportedValue("logical type")),
    })
}

fn float(f: f64) -> Result<JsonValue, CodecError> {
    Number::from_f64(f)
        .map(JsonValue::Number)
        .ok_or(CodecError::UnsupportedValue("non-finite float"))
}

#[cfg(test)]
mod tests {
    use apache_avro::to_avro_datum;
    use apache_avro::types::Record;

    use super::*;

    fn union_schema() -> JsonValue {
        serde_json::json!([
            {
                "type": "record",
                "name": "Index",
                "namespace": "com.okotoki.model",
                "fields": [
                    {"name": "coin", "type": "string"},
                    {"name": "price", "type": "double"}
                ]
            },
            {
                "type": "record",
                "name": "Price",
                "namespace": "com.okotoki.model",
                "fields": [
                    {"name": "exchange", "type": "string"},
                    {"name": "symbol", "type": "string"},
                    {"name": "timestamp", "type": "long"},
                    {"name": "price", "type": "double"}
                ]
            }
        ])
    }

    #[test]
    fn decodes_union_branch_with_type_tag() {
        let decoder = BinaryDecoder::from_definition(&union_schema()).unwrap();
        let Schema::Union(union) = decoder.schema() else {
            panic!("expected union schema");
        };

        let mut record = Record::new(&union.variants()[1]).unwrap();
        record.put("exchange", "bitmex");
        record.put("symbol", "XBTUSD");
        record.put("timestamp", 1_614_592_800_000_i64);
        record.put("price", 49_000.5);
        let datum = AvroValue::Union(1, Box::new(record.into()));
        let bytes = to_avro_datum(decoder.schema(), datum).unwrap();

        let json = decoder.decode(&bytes).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "com.okotoki.model.Price",
                "exchange": "bitmex",
                "symbol": "XBTUSD",
                "timestamp": 1_614_592_800_000_i64,
                "price": 49_000.5
            })
        );
    }

    #[test]
    fn rejects_invalid_schema() {
        let err = BinaryDecoder::from_definition(&serde_json::json!({"type": "nope"})).unwrap_err();
        assert!(matches!(err, CodecError::InvalidSchema(_)));
    }

    #[test]
    fn rejects_truncated_frame() {
        let decoder = BinaryDecoder::from_definition(&union_schema()).unwrap();
        // Branch 0 with a string length prefix but no bytes behind it.
        let err = decoder.decode(&[0x00, 0x10]).unwrap_err();
        assert!(matches!(err, CodecError::BinaryDecode(_)));
    }

    #[test]
    fn non_finite_float_unsupported() {
        let err = to_json(AvroValue::Double(f64::NAN)).unwrap_err();
        assert!(matches!(err, CodecError::UnsupportedValue(_)));
    }
}
