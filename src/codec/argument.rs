//! Argument codecs.
//!
//! Each [`Argument`] converts one [`Value`] to and from the bytes stored under
//! its key in a box. Encoding rules:
//!
//! | Codec | Wire form |
//! |---|---|
//! | `Integer` | decimal ASCII |
//! | `Float` | shortest text that parses back to the same `f64` |
//! | `Boolean` | `True` / `False` |
//! | `Unicode` | UTF-8 |
//! | `Bytes` | unchanged |
//! | `Path` | UTF-8 text of the path |
//! | `List` | one serialized box per element, back to back |

use std::path::PathBuf;

use bytes::{Bytes, BytesMut};

use super::names::local_name;
use super::{Value, Values};
use crate::error::{AmpError, Result};
use crate::protocol::{parse_boxes, AmpBox};

/// A codec for one argument.
#[derive(Debug, Clone, PartialEq)]
pub enum Argument {
    /// `i64` as decimal text.
    Integer,
    /// `f64` as round-trippable text.
    Float,
    /// `True` or `False`.
    Boolean,
    /// UTF-8 text.
    Unicode,
    /// Raw bytes.
    Bytes,
    /// Filesystem path as UTF-8 text.
    Path,
    /// A sequence of records, each described by the nested specs.
    List(Vec<ArgumentSpec>),
}

impl Argument {
    /// Encode a value for the argument named `name`.
    ///
    /// # Errors
    ///
    /// `ValueFormat` if the value has the wrong type or cannot be represented.
    pub fn encode(&self, name: &str, value: &Value) -> Result<Bytes> {
        match (self, value) {
            (Argument::Integer, Value::Integer(v)) => Ok(Bytes::from(v.to_string())),
            (Argument::Float, Value::Float(v)) => Ok(Bytes::from(v.to_string())),
            (Argument::Float, Value::Integer(v)) => Ok(Bytes::from((*v as f64).to_string())),
            (Argument::Boolean, Value::Boolean(v)) => {
                Ok(Bytes::from_static(if *v { b"True" } else { b"False" }))
            }
            (Argument::Unicode, Value::Unicode(v)) => Ok(Bytes::from(v.clone())),
            (Argument::Bytes, Value::Bytes(v)) => Ok(v.clone()),
            (Argument::Path, Value::Path(v)) => v
                .to_str()
                .map(|s| Bytes::from(s.to_owned()))
                .ok_or_else(|| format_error(name, "path is not valid UTF-8")),
            (Argument::List(specs), Value::List(items)) => {
                let mut buf = BytesMut::new();
                for item in items {
                    encode_values(specs, item, name)?.serialize_into(&mut buf)?;
                }
                Ok(buf.freeze())
            }
            (arg, value) => Err(format_error(
                name,
                format!("expected {}, got {}", arg.type_name(), value.type_name()),
            )),
        }
    }

    /// Decode the bytes stored for the argument named `name`.
    ///
    /// # Errors
    ///
    /// `ValueFormat` on unparseable input, including list data whose nested
    /// boxes are malformed.
    pub fn decode(&self, name: &str, data: &Bytes) -> Result<Value> {
        match self {
            Argument::Integer => text(name, data)?
                .parse::<i64>()
                .map(Value::Integer)
                .map_err(|e| format_error(name, e.to_string())),
            Argument::Float => text(name, data)?
                .parse::<f64>()
                .map(Value::Float)
                .map_err(|e| format_error(name, e.to_string())),
            Argument::Boolean => match &data[..] {
                b"True" => Ok(Value::Boolean(true)),
                b"False" => Ok(Value::Boolean(false)),
                _ => Err(format_error(name, "boolean must be True or False")),
            },
            Argument::Unicode => Ok(Value::Unicode(text(name, data)?.to_owned())),
            Argument::Bytes => Ok(Value::Bytes(data.clone())),
            Argument::Path => Ok(Value::Path(PathBuf::from(text(name, data)?))),
            Argument::List(specs) => parse_boxes(data)
                .map_err(|e| format_error(name, e.to_string()))?
                .iter()
                .map(|b| decode_values(specs, b))
                .collect::<Result<Vec<_>>>()
                .map(Value::List),
        }
    }

    /// Short name of the codec, for error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Argument::Integer => "integer",
            Argument::Float => "float",
            Argument::Boolean => "boolean",
            Argument::Unicode => "unicode",
            Argument::Bytes => "bytes",
            Argument::Path => "path",
            Argument::List(_) => "list",
        }
    }
}

/// One declared argument: wire name, codec, and whether it may be absent.
#[derive(Debug, Clone, PartialEq)]
pub struct ArgumentSpec {
    wire_name: String,
    local_name: String,
    argument: Argument,
    optional: bool,
}

impl ArgumentSpec {
    /// Declare a required argument.
    pub fn new(wire_name: impl Into<String>, argument: Argument) -> Self {
        let wire_name = wire_name.into();
        Self {
            local_name: local_name(&wire_name),
            wire_name,
            argument,
            optional: false,
        }
    }

    /// Mark the argument optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Name as it appears on the wire.
    pub fn wire_name(&self) -> &str {
        &self.wire_name
    }

    /// Name as it appears in [`Values`].
    pub fn local_name(&self) -> &str {
        &self.local_name
    }

    /// The codec.
    pub fn argument(&self) -> &Argument {
        &self.argument
    }

    /// Whether the argument may be absent.
    pub fn is_optional(&self) -> bool {
        self.optional
    }
}

/// Encode `values` into a box according to `specs`.
///
/// Absent optional values are skipped; values with no spec are ignored.
///
/// # Errors
///
/// `InvalidSignature` naming every missing required argument, or the first
/// encoding error.
pub fn encode_values(specs: &[ArgumentSpec], values: &Values, command: &str) -> Result<AmpBox> {
    let missing: Vec<String> = specs
        .iter()
        .filter(|s| !s.optional && values.get(&s.local_name).is_none())
        .map(|s| s.local_name.clone())
        .collect();
    if !missing.is_empty() {
        return Err(AmpError::InvalidSignature {
            command: command.to_owned(),
            missing,
        });
    }

    let mut b = AmpBox::new();
    for spec in specs {
        if let Some(value) = values.get(&spec.local_name) {
            let encoded = spec.argument.encode(&spec.wire_name, value)?;
            b.insert(spec.wire_name.clone(), encoded);
        }
    }
    Ok(b)
}

/// Decode a box into values according to `specs`.
///
/// Keys with no spec are ignored.
///
/// # Errors
///
/// `ValueFormat` if a required argument is missing or any value fails to decode.
pub fn decode_values(specs: &[ArgumentSpec], b: &AmpBox) -> Result<Values> {
    let mut values = Values::new();
    for spec in specs {
        match b.get(&spec.wire_name) {
            Some(data) => {
                values.insert(
                    spec.local_name.clone(),
                    spec.argument.decode(&spec.wire_name, data)?,
                );
            }
            None if spec.optional => {}
            None => return Err(format_error(&spec.wire_name, "missing required value")),
        }
    }
    Ok(values)
}

fn text<'a>(name: &str, data: &'a [u8]) -> Result<&'a str> {
    std::str::from_utf8(data).map_err(|e| format_error(name, e.to_string()))
}

fn format_error(name: &str, reason: impl Into<String>) -> AmpError {
    AmpError::ValueFormat {
        argument: name.to_owned(),
        reason: reason.into(),
    }
}
