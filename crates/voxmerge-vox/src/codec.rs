//! Little-endian primitives shared by every chunk payload.
//!
//! ## Encodings
//!
//! | Type | Layout |
//! |------|--------|
//! | `int32` / `uint32` | 4 bytes, little-endian (negative values two's complement) |
//! | `STRING` | `uint32` byte length, then that many UTF-8 bytes (no terminator) |
//! | `DICT` | `uint32` entry count, then `count` × (`STRING` key, `STRING` value) |
//!
//! Decoding goes through [`ByteCursor`], which bounds-checks every read.
//! Encoding appends to a plain `Vec<u8>` through the `put_*` functions.

/// Errors raised while decoding bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DecodeError {
    /// A read needed more bytes than the buffer holds.
    #[error("data truncated at offset {offset}: needed {needed} bytes, {available} available")]
    Truncated {
        /// Offset of the failed read.
        offset: usize,
        /// Bytes the read required.
        needed: usize,
        /// Bytes left in the buffer.
        available: usize,
    },
    /// A string field is not valid UTF-8.
    #[error("invalid UTF-8 in string at offset {offset}")]
    InvalidUtf8 {
        /// Offset of the string bytes.
        offset: usize,
    },
    /// A child chunk extends past the children region of its parent.
    #[error("child chunk at offset {offset} overruns its parent (region ends at {end})")]
    ChildOverrun {
        /// Offset of the offending child header.
        offset: usize,
        /// End of the parent's children region.
        end: usize,
    },
    /// Chunks are nested deeper than the parser follows.
    #[error("chunk at offset {offset} is nested too deeply")]
    TooDeep {
        /// Offset of the chunk header past the depth limit.
        offset: usize,
    },
    /// The palette payload does not hold exactly 256 colors.
    #[error("palette has {0} bytes, expected 1024")]
    PaletteLength(usize),
}

/// Ordered string map (`DICT`).
///
/// Entries keep their file order so an untouched map re-encodes to the same
/// bytes. Keys are not deduplicated on decode.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Dict(Vec<(String, String)>);

impl Dict {
    /// Creates an empty map.
    pub fn new() -> Self {
        Self(Vec::new())
    }

    /// Returns the value of the first entry with `key`.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    /// Replaces the value of `key` in place, or appends a new entry.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        let key = key.into();
        let value = value.into();
        match self.0.iter_mut().find(|(k, _)| *k == key) {
            Some(entry) => entry.1 = value,
            None => self.0.push((key, value)),
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates entries in file order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Dict {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Forward-only reader over a byte slice.
///
/// Offsets reported in errors are absolute positions within the slice the
/// cursor was created over.
#[derive(Debug, Clone)]
pub struct ByteCursor<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> ByteCursor<'a> {
    /// Starts reading `buf` at offset 0.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Starts reading `buf` at `pos`.
    pub fn at(buf: &'a [u8], pos: usize) -> Self {
        Self { buf, pos }
    }

    /// Current offset.
    pub fn position(&self) -> usize {
        self.pos
    }

    /// Bytes left after the current offset.
    pub fn remaining(&self) -> usize {
        self.buf.len().saturating_sub(self.pos)
    }

    /// Returns `true` once every byte has been consumed.
    pub fn is_empty(&self) -> bool {
        self.remaining() == 0
    }

    /// Consumes `n` bytes and returns them.
    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        if n > self.remaining() {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: n,
                available: self.remaining(),
            });
        }
        let bytes = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(bytes)
    }

    /// Reads a fixed-size array.
    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Reads one byte.
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.read_array::<1>()?[0])
    }

    /// Reads a little-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    /// Reads a little-endian two's-complement `i32`.
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    /// Reads a length-prefixed UTF-8 string.
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let len = self.read_u32()? as usize;
        let offset = self.pos;
        let bytes = self.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| DecodeError::InvalidUtf8 { offset })
    }

    /// Reads a count-prefixed list of key/value string pairs.
    pub fn read_dict(&mut self) -> Result<Dict, DecodeError> {
        let count = self.read_u32()? as usize;
        // Each entry takes at least 8 bytes; reject impossible counts before allocating.
        if count > self.remaining() / 8 {
            return Err(DecodeError::Truncated {
                offset: self.pos,
                needed: count.saturating_mul(8),
                available: self.remaining(),
            });
        }
        let mut entries = Vec::with_capacity(count);
        for _ in 0..count {
            let key = self.read_string()?;
            let value = self.read_string()?;
            entries.push((key, value));
        }
        Ok(Dict(entries))
    }
}

/// Appends a little-endian `u32`.
pub fn put_u32(out: &mut Vec<u8>, value: u32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends a little-endian two's-complement `i32`.
pub fn put_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

/// Appends a length-prefixed UTF-8 string.
pub fn put_string(out: &mut Vec<u8>, value: &str) {
    put_u32(out, value.len() as u32);
    out.extend_from_slice(value.as_bytes());
}

/// Appends a count-prefixed string map, entries in order.
pub fn put_dict(out: &mut Vec<u8>, dict: &Dict) {
    put_u32(out, dict.len() as u32);
    for (key, value) in dict.iter() {
        put_string(out, key);
        put_string(out, value);
    }
}
