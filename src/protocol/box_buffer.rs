//! Box buffer for accumulating partial reads.
//!
//! Uses `bytes::BytesMut` for zero-copy buffer management.
//! Implements a state machine over length-prefixed strings:
//! - `AwaitKey`: next string is a key, or the empty terminator of a box
//! - `AwaitValue`: next string is the value for the pending key
//!
//! Boxes are extracted one at a time so a caller can stop mid-buffer (for a
//! protocol switch) and detach whatever bytes were not yet consumed.
//!
//! # Example
//!
//! ```
//! use ampwire::protocol::{AmpBox, BoxBuffer};
//!
//! let mut b = AmpBox::new();
//! b.insert("hello", "world");
//! let wire = b.serialize().unwrap();
//!
//! let mut buffer = BoxBuffer::new();
//! let boxes = buffer.push(&wire).unwrap();
//! assert_eq!(boxes, vec![b]);
//! ```

use bytes::{Bytes, BytesMut};

use super::wire_format::{peek_length, LENGTH_PREFIX_SIZE, MAX_KEY_LENGTH};
use super::AmpBox;
use crate::error::{AmpError, Result};

/// Parse state.
#[derive(Debug)]
enum State {
    /// Expecting a key or the empty-key terminator.
    AwaitKey,
    /// Key read, expecting its value.
    AwaitValue { key: Bytes },
}

/// Buffer for accumulating incoming bytes and extracting complete boxes.
#[derive(Debug)]
pub struct BoxBuffer {
    /// Accumulated bytes from transport reads.
    buffer: BytesMut,
    /// Current parsing state.
    state: State,
    /// Pairs collected for the box under construction.
    current: AmpBox,
    /// Yield empty boxes instead of rejecting them. Nested list data only.
    allow_empty: bool,
}

impl BoxBuffer {
    /// Create a new box buffer.
    pub fn new() -> Self {
        Self::with_capacity(64 * 1024)
    }

    /// Create a new box buffer with a custom initial capacity.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: BytesMut::with_capacity(capacity),
            state: State::AwaitKey,
            current: AmpBox::new(),
            allow_empty: false,
        }
    }

    /// Push data into the buffer and extract all complete boxes.
    ///
    /// # Errors
    ///
    /// Returns a fatal error on a malformed stream; the buffer must not be
    /// used afterwards.
    pub fn push(&mut self, data: &[u8]) -> Result<Vec<AmpBox>> {
        self.extend(data);

        let mut boxes = Vec::new();
        while let Some(b) = self.next_box()? {
            boxes.push(b);
        }
        Ok(boxes)
    }

    /// Append data without extracting.
    pub fn extend(&mut self, data: &[u8]) {
        self.buffer.extend_from_slice(data);
    }

    /// Extract the next complete box, if one is buffered.
    ///
    /// Returns:
    /// - `Ok(Some(box))` if a complete box was extracted
    /// - `Ok(None)` if more data is needed
    /// - `Err(...)` on a protocol violation
    pub fn next_box(&mut self) -> Result<Option<AmpBox>> {
        loop {
            let Some(string) = self.next_string()? else {
                return Ok(None);
            };

            match std::mem::replace(&mut self.state, State::AwaitKey) {
                State::AwaitKey => {
                    if string.is_empty() {
                        if self.current.is_empty() && !self.allow_empty {
                            return Err(AmpError::NoEmptyBoxes);
                        }
                        return Ok(Some(std::mem::take(&mut self.current)));
                    }
                    if string.len() > MAX_KEY_LENGTH {
                        return Err(AmpError::TooLong {
                            is_key: true,
                            is_local: false,
                            length: string.len(),
                            key: None,
                        });
                    }
                    self.state = State::AwaitValue { key: string };
                }
                State::AwaitValue { key } => {
                    if self.current.insert(key.clone(), string).is_some() {
                        return Err(AmpError::MalformedBox(format!(
                            "duplicate key {:?}",
                            String::from_utf8_lossy(&key)
                        )));
                    }
                }
            }
        }
    }

    /// Take one length-prefixed string off the front of the buffer.
    fn next_string(&mut self) -> Result<Option<Bytes>> {
        let Some(len) = peek_length(&self.buffer) else {
            return Ok(None);
        };
        if self.buffer.len() < LENGTH_PREFIX_SIZE + len {
            return Ok(None);
        }
        let _ = self.buffer.split_to(LENGTH_PREFIX_SIZE);
        Ok(Some(self.buffer.split_to(len).freeze()))
    }

    /// Detach every byte that has not been consumed as part of a box.
    ///
    /// Consumes the buffer: after a protocol switch the remaining bytes belong
    /// to the new protocol and nothing may be parsed here again.
    ///
    /// # Errors
    ///
    /// Returns `MalformedBox` if a box was partially parsed, since its
    /// already-consumed strings cannot be handed back.
    pub fn into_remaining(self) -> Result<Bytes> {
        if !self.is_at_boundary() {
            return Err(AmpError::MalformedBox(
                "protocol switch in the middle of a box".into(),
            ));
        }
        Ok(self.buffer.freeze())
    }

    /// Whether no box is partially parsed.
    pub fn is_at_boundary(&self) -> bool {
        matches!(self.state, State::AwaitKey) && self.current.is_empty()
    }

    /// Get the number of buffered, unparsed bytes.
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Check if the buffer is empty.
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Get the current state for debugging.
    #[cfg(test)]
    fn state_name(&self) -> &'static str {
        match &self.state {
            State::AwaitKey => "AwaitKey",
            State::AwaitValue { .. } => "AwaitValue",
        }
    }
}

impl Default for BoxBuffer {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse a complete byte string into boxes.
///
/// Used for nested list values, where a record whose fields are all absent
/// is an empty box. Empty boxes are accepted here; only a connection rejects
/// them.
///
/// # Errors
///
/// Returns `MalformedBox` if the data ends in the middle of a box, or any
/// error [`BoxBuffer::next_box`] reports.
pub fn parse_boxes(data: &[u8]) -> Result<Vec<AmpBox>> {
    let mut buffer = BoxBuffer::with_capacity(data.len());
    buffer.allow_empty = true;
    let boxes = buffer.push(data)?;
    if !buffer.is_empty() {
        return Err(AmpError::MalformedBox(format!(
            "data ends inside a length-prefixed string ({} bytes left)",
            buffer.len()
        )));
    }
    if !buffer.is_at_boundary() {
        return Err(AmpError::MalformedBox(format!(
            "data ends inside a box after {} complete pairs",
            buffer.current.len()
        )));
    }
    Ok(boxes)
}
