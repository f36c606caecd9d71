//! Binary envelope codec with pooled buffers.
//!
//! Every value (and every facade key) is stored as a tagged envelope:
//!
//! ```text
//! [TAG: 1 byte] [POSTCARD PAYLOAD: N bytes]
//! ```
//!
//! The tag is reserved for future format versioning and is currently always
//! zero. An empty payload encodes to a zero-length envelope; that is the only
//! place the tag byte is omitted.

use crate::error::{Error, Result};
use crate::item::{CacheItem, ExpirationMode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::ops::{Deref, DerefMut};
use std::sync::Mutex;
use std::time::Duration;

/// Reserved envelope tag. Bump only with a format change.
pub const ENVELOPE_TAG: u8 = 0;

/// Buffers kept around between calls, at most this many.
const MAX_POOLED: usize = 16;

/// Fresh buffers start with this capacity.
const INITIAL_CAPACITY: usize = 256;

/// A small free-list of reusable encode buffers. Acquire/release per call,
/// no cross-call state beyond the spare capacity itself.
struct BufferPool {
    slots: Mutex<Vec<Vec<u8>>>,
}

impl BufferPool {
    fn acquire(&'static self) -> PooledBuffer {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        let buf = slots
            .pop()
            .unwrap_or_else(|| Vec::with_capacity(INITIAL_CAPACITY));
        PooledBuffer { buf, pool: self }
    }

    fn release(&self, mut buf: Vec<u8>) {
        buf.clear();
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        if slots.len() < MAX_POOLED {
            slots.push(buf);
        }
    }
}

/// RAII guard over a pooled buffer; goes back to the pool on drop, including
/// on the failure path.
struct PooledBuffer {
    buf: Vec<u8>,
    pool: &'static BufferPool,
}

impl Deref for PooledBuffer {
    type Target = Vec<u8>;

    fn deref(&self) -> &Vec<u8> {
        &self.buf
    }
}

impl DerefMut for PooledBuffer {
    fn deref_mut(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }
}

impl Drop for PooledBuffer {
    fn drop(&mut self) {
        self.pool.release(std::mem::take(&mut self.buf));
    }
}

static POOL: BufferPool = BufferPool {
    slots: Mutex::new(Vec::new()),
};

/// Encode a value into its tagged envelope.
///
/// The tag byte is written before the payload; if the payload turns out
/// empty, the envelope collapses to zero bytes.
///
/// # Errors
///
/// Returns `Error::Serialization` when postcard cannot encode the value.
pub fn serialize<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    let mut buf = POOL.acquire();
    buf.push(ENVELOPE_TAG);

    match postcard::to_extend(value, std::mem::take(&mut *buf)) {
        Ok(filled) => *buf = filled,
        Err(e) => return Err(Error::Serialization(e.to_string())),
    }

    // Tag-only means the payload was empty: zero-length envelope.
    if buf.len() <= 1 {
        return Ok(Vec::new());
    }
    Ok(buf.to_vec())
}

/// Decode a tagged envelope back into a value.
///
/// Skips the tag byte when the input is non-empty; an empty input is decoded
/// as an empty payload.
///
/// # Errors
///
/// Returns `Error::Deserialization` when the payload does not decode as `T`;
/// decoder failures propagate unmodified.
pub fn deserialize<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let payload = if bytes.is_empty() { bytes } else { &bytes[1..] };
    postcard::from_bytes(payload).map_err(|e| Error::Deserialization(e.to_string()))
}

/// Typed-wrapper factory used by host-side generic dispatch: package a value
/// under a string id with its expiration metadata.
pub fn make_item<V>(
    key: &str,
    value: V,
    mode: ExpirationMode,
    timeout: Duration,
) -> CacheItem<V> {
    CacheItem::with_expiration(key, value, mode, timeout)
}
