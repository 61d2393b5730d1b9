//! Wire format encoding.
//!
//! A box is a sequence of length-prefixed strings, alternating key and value,
//! terminated by an empty key:
//! ```text
//! ┌──────────┬─────────┬──────────┬───────────┬─────┬────────┐
//! │ Key len  │ Key     │ Value len│ Value     │ ... │ 0x0000 │
//! │ u16 BE   │ 1..255  │ u16 BE   │ 0..65535  │     │        │
//! └──────────┴─────────┴──────────┴───────────┴─────┴────────┘
//! ```
//!
//! All multi-byte integers are Big Endian.

use bytes::{BufMut, BytesMut};

use crate::error::{AmpError, Result};

/// Size of every length prefix in bytes.
pub const LENGTH_PREFIX_SIZE: usize = 2;

/// Maximum key length in bytes.
pub const MAX_KEY_LENGTH: usize = 0xff;

/// Maximum value length in bytes.
pub const MAX_VALUE_LENGTH: usize = 0xffff;

/// Command name of an ask.
pub const COMMAND: &str = "_command";
/// Correlation tag of an ask.
pub const ASK: &str = "_ask";
/// Tag being answered.
pub const ANSWER: &str = "_answer";
/// Tag being errored.
pub const ERROR: &str = "_error";
/// Short error code string.
pub const ERROR_CODE: &str = "_error_code";
/// Human-readable error text.
pub const ERROR_DESCRIPTION: &str = "_error_description";

/// All keys with protocol meaning.
pub const RESERVED_KEYS: [&str; 6] = [
    COMMAND,
    ASK,
    ANSWER,
    ERROR,
    ERROR_CODE,
    ERROR_DESCRIPTION,
];

/// Error code for an uncaught or untranslated responder failure.
pub const UNKNOWN_ERROR_CODE: &str = "UNKNOWN";

/// Error code for a command with no responder.
pub const UNHANDLED_ERROR_CODE: &str = "UNHANDLED";

/// Check a key/value pair against the wire limits without writing anything.
pub fn check_pair(key: &[u8], value: &[u8]) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LENGTH {
        return Err(AmpError::TooLong {
            is_key: true,
            is_local: true,
            length: key.len(),
            key: None,
        });
    }
    if value.len() > MAX_VALUE_LENGTH {
        return Err(AmpError::TooLong {
            is_key: false,
            is_local: true,
            length: value.len(),
            key: Some(String::from_utf8_lossy(key).into_owned()),
        });
    }
    Ok(())
}

/// Append one length-prefixed string.
///
/// # Panics
///
/// Panics in debug builds if `data` is longer than `MAX_VALUE_LENGTH`;
/// callers validate with [`check_pair`] first.
#[inline]
pub fn put_string(buf: &mut BytesMut, data: &[u8]) {
    debug_assert!(data.len() <= MAX_VALUE_LENGTH);
    buf.put_u16(data.len() as u16);
    buf.put_slice(data);
}

/// Append the empty-key terminator that ends a box.
#[inline]
pub fn put_terminator(buf: &mut BytesMut) {
    buf.put_u16(0);
}

/// Read a length prefix from the front of `buf`.
///
/// Returns `None` if fewer than two bytes are available.
#[inline]
pub fn peek_length(buf: &[u8]) -> Option<usize> {
    if buf.len() < LENGTH_PREFIX_SIZE {
        return None;
    }
    Some(u16::from_be_bytes([buf[0], buf[1]]) as usize)
}

/// Check whether a key is one of the reserved protocol keys.
#[inline]
pub fn is_reserved(key: &[u8]) -> bool {
    RESERVED_KEYS.iter().any(|k| k.as_bytes() == key)
}
