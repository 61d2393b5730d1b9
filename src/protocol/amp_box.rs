//! Box and message types.
//!
//! [`AmpBox`] is the raw key/value unit that travels on the wire. Keys are
//! kept sorted so serialization is deterministic.
//!
//! [`Message`] is the classified form of a box: exactly one of ask, answer
//! or error, with the reserved keys lifted out into typed fields.
//!
//! # Example
//!
//! ```
//! use ampwire::protocol::{AmpBox, Message};
//!
//! let mut fields = AmpBox::new();
//! fields.insert("a", "3");
//! let msg = Message::Ask { command: "add".into(), tag: Some("1".into()), fields };
//!
//! let wire = msg.into_box();
//! assert_eq!(wire.get_str("_command"), Some("add"));
//! assert_eq!(wire.get_str("_ask"), Some("1"));
//! ```

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};
use tracing::warn;

use super::wire_format::{
    check_pair, is_reserved, put_string, put_terminator, ANSWER, ASK, COMMAND, ERROR, ERROR_CODE,
    ERROR_DESCRIPTION, LENGTH_PREFIX_SIZE,
};
use crate::error::{AmpError, Result};

/// A mapping of byte-string keys to byte-string values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AmpBox {
    entries: BTreeMap<Bytes, Bytes>,
}

impl AmpBox {
    /// Create an empty box.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a key/value pair, returning the previous value.
    pub fn insert(&mut self, key: impl Into<Bytes>, value: impl Into<Bytes>) -> Option<Bytes> {
        self.entries.insert(key.into(), value.into())
    }

    /// Get the raw value for a key.
    pub fn get(&self, key: impl AsRef<[u8]>) -> Option<&Bytes> {
        self.entries.get(key.as_ref())
    }

    /// Get a value as UTF-8 text.
    pub fn get_str(&self, key: impl AsRef<[u8]>) -> Option<&str> {
        self.get(key).and_then(|v| std::str::from_utf8(v).ok())
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: impl AsRef<[u8]>) -> Option<Bytes> {
        self.entries.remove(key.as_ref())
    }

    /// Check whether a key is present.
    pub fn contains_key(&self, key: impl AsRef<[u8]>) -> bool {
        self.entries.contains_key(key.as_ref())
    }

    /// Number of pairs.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the box has no pairs.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&Bytes, &Bytes)> {
        self.entries.iter()
    }

    /// Number of bytes this box occupies on the wire.
    pub fn encoded_len(&self) -> usize {
        self.entries
            .iter()
            .map(|(k, v)| 2 * LENGTH_PREFIX_SIZE + k.len() + v.len())
            .sum::<usize>()
            + LENGTH_PREFIX_SIZE
    }

    /// Serialize to wire bytes.
    ///
    /// # Errors
    ///
    /// Returns `TooLong` if any key or value exceeds the wire limits. Limits
    /// are checked before anything is written.
    pub fn serialize(&self) -> Result<Bytes> {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.serialize_into(&mut buf)?;
        Ok(buf.freeze())
    }

    /// Serialize onto the end of an existing buffer.
    ///
    /// On error `buf` is left untouched.
    pub fn serialize_into(&self, buf: &mut BytesMut) -> Result<()> {
        for (k, v) in &self.entries {
            check_pair(k, v)?;
        }
        buf.reserve(self.encoded_len());
        for (k, v) in &self.entries {
            put_string(buf, k);
            put_string(buf, v);
        }
        put_terminator(buf);
        Ok(())
    }
}

impl<K, V> FromIterator<(K, V)> for AmpBox
where
    K: Into<Bytes>,
    V: Into<Bytes>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            entries: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

impl IntoIterator for AmpBox {
    type Item = (Bytes, Bytes);
    type IntoIter = std::collections::btree_map::IntoIter<Bytes, Bytes>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

/// A classified box.
///
/// Holding a `Message` rather than an `AmpBox` guarantees the box is exactly
/// one of ask, answer or error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// A remote call. `tag` is `None` when no answer is wanted.
    Ask {
        /// Command name.
        command: String,
        /// Correlation tag.
        tag: Option<String>,
        /// Command arguments.
        fields: AmpBox,
    },
    /// A successful reply.
    Answer {
        /// Tag of the ask being answered.
        tag: String,
        /// Response values.
        fields: AmpBox,
    },
    /// A failed reply.
    Error {
        /// Tag of the ask being errored.
        tag: String,
        /// Wire error code.
        code: String,
        /// Human-readable description.
        description: String,
    },
}

impl Message {
    /// Classify a received box, lifting out the reserved keys.
    ///
    /// # Errors
    ///
    /// - `NoEmptyBoxes` if the box carries none, or more than one, of
    ///   `_answer`, `_error` and `_command`
    /// - `MalformedBox` if a reserved value is not UTF-8 or an error box
    ///   lacks its code or description
    pub fn classify(mut b: AmpBox) -> Result<Self> {
        let markers = [ANSWER, ERROR, COMMAND]
            .iter()
            .filter(|k| b.contains_key(k))
            .count();
        if markers != 1 {
            return Err(AmpError::NoEmptyBoxes);
        }

        if let Some(tag) = b.remove(ANSWER) {
            return Ok(Message::Answer {
                tag: reserved_text(ANSWER, tag)?,
                fields: b,
            });
        }

        if let Some(tag) = b.remove(ERROR) {
            let code = b
                .remove(ERROR_CODE)
                .ok_or_else(|| AmpError::MalformedBox("error box without _error_code".into()))?;
            let description = b.remove(ERROR_DESCRIPTION).ok_or_else(|| {
                AmpError::MalformedBox("error box without _error_description".into())
            })?;
            return Ok(Message::Error {
                tag: reserved_text(ERROR, tag)?,
                code: reserved_text(ERROR_CODE, code)?,
                description: String::from_utf8_lossy(&description).into_owned(),
            });
        }

        let command = b.remove(COMMAND).ok_or(AmpError::NoEmptyBoxes)?;
        let tag = b.remove(ASK).map(|t| reserved_text(ASK, t)).transpose()?;
        Ok(Message::Ask {
            command: reserved_text(COMMAND, command)?,
            tag,
            fields: b,
        })
    }

    /// Convert back into a wire box.
    ///
    /// Reserved keys found in `fields` are dropped; only the message's own
    /// markers may carry them.
    pub fn into_box(self) -> AmpBox {
        match self {
            Message::Ask {
                command,
                tag,
                fields,
            } => {
                let mut fields = strip_reserved(fields);
                fields.insert(COMMAND, command);
                if let Some(tag) = tag {
                    fields.insert(ASK, tag);
                }
                fields
            }
            Message::Answer { tag, fields } => {
                let mut fields = strip_reserved(fields);
                fields.insert(ANSWER, tag);
                fields
            }
            Message::Error {
                tag,
                code,
                description,
            } => {
                let mut b = AmpBox::new();
                b.insert(ERROR, tag);
                b.insert(ERROR_CODE, code);
                b.insert(ERROR_DESCRIPTION, description);
                b
            }
        }
    }

    /// The correlation tag, if any.
    pub fn tag(&self) -> Option<&str> {
        match self {
            Message::Ask { tag, .. } => tag.as_deref(),
            Message::Answer { tag, .. } | Message::Error { tag, .. } => Some(tag),
        }
    }
}

fn reserved_text(key: &str, value: Bytes) -> Result<String> {
    String::from_utf8(value.to_vec())
        .map_err(|_| AmpError::MalformedBox(format!("{} is not valid UTF-8", key)))
}

fn strip_reserved(mut fields: AmpBox) -> AmpBox {
    fields.entries.retain(|key, _| {
        if is_reserved(key) {
            warn!("Dropping reserved key {:?} from outgoing fields", String::from_utf8_lossy(key));
            return false;
        }
        true
    });
    fields
}
