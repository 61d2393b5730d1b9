//! Protocol module - wire format, box framing, and message types.
//!
//! This module implements the AMP box layer:
//! - Length-prefixed key/value encoding
//! - Box buffer for accumulating partial reads
//! - Message classification (ask / answer / error)

mod amp_box;
mod box_buffer;
mod wire_format;

pub use amp_box::{AmpBox, Message};
pub use box_buffer::{parse_boxes, BoxBuffer};
pub use wire_format::{
    check_pair, is_reserved, ANSWER, ASK, COMMAND, ERROR, ERROR_CODE, ERROR_DESCRIPTION,
    LENGTH_PREFIX_SIZE, MAX_KEY_LENGTH, MAX_VALUE_LENGTH, RESERVED_KEYS, UNHANDLED_ERROR_CODE,
    UNKNOWN_ERROR_CODE,
};
