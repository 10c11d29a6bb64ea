//! Deterministic binary codec for transactions, records, and proofs.
//!
//! All numeric values are little-endian. Encoding format:
//! - Fixed-size fields (Hash, u64, u32, u8, bool) are written directly
//! - Variable-length fields (`Vec<u8>`, `String`) are length-prefixed (u32 LE)
//! - Sequences are count-prefixed (u32 LE) then concatenated
//! - Enum variants are introduced by a single tag byte
//! - `Option<T>`: 1-byte flag (0 = None, 1 = Some) followed by the value
//!
//! [`Decode::decode`] requires the whole input to be consumed, so every
//! byte string has at most one meaning.

/// Decoding failure.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CodecError {
    #[error("unexpected end of data")]
    UnexpectedEof,
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error("invalid tag 0x{tag:02x} for {ty}")]
    InvalidTag { ty: &'static str, tag: u8 },
    #[error("invalid bool value {0}")]
    InvalidBool(u8),
    #[error("invalid UTF-8 string")]
    InvalidUtf8,
    #[error("length {0} exceeds remaining input")]
    LengthOverflow(usize),
}

/// A cursor for reading bytes during decoding.
pub struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.data.len().saturating_sub(self.pos)
    }

    pub fn read_bytes(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        let end = self.pos.checked_add(n).ok_or(CodecError::UnexpectedEof)?;
        if end > self.data.len() {
            return Err(CodecError::UnexpectedEof);
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    pub fn read_u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.read_bytes(1)?[0])
    }

    pub fn read_u32(&mut self) -> Result<u32, CodecError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_u64(&mut self) -> Result<u64, CodecError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.read_bytes(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    pub fn read_array<const N: usize>(&mut self) -> Result<[u8; N], CodecError> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.read_bytes(N)?);
        Ok(out)
    }

    /// Read a u32 count and reject it early if it cannot possibly fit.
    pub fn read_len(&mut self) -> Result<usize, CodecError> {
        let len = self.read_u32()? as usize;
        if len > self.remaining() {
            return Err(CodecError::LengthOverflow(len));
        }
        Ok(len)
    }

    fn finish(&self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}

/// Deterministic encoding into a byte buffer.
pub trait Encode {
    fn encode_to(&self, buf: &mut Vec<u8>);

    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(64);
        self.encode_to(&mut buf);
        buf
    }
}

/// Decoding from a [`Reader`].
pub trait Decode: Sized {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError>;

    /// Decode a complete value; trailing bytes are an error.
    fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut r = Reader::new(data);
        let value = Self::decode_from(&mut r)?;
        r.finish()?;
        Ok(value)
    }
}

impl Encode for u8 {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.push(*self);
    }
}

impl Decode for u8 {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.read_u8()
    }
}

impl Encode for u32 {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u32 {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.read_u32()
    }
}

impl Encode for u64 {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(&self.to_le_bytes());
    }
}

impl Decode for u64 {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.read_u64()
    }
}

impl Encode for bool {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.push(u8::from(*self));
    }
}

impl Decode for bool {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            b => Err(CodecError::InvalidBool(b)),
        }
    }
}

impl<const N: usize> Encode for [u8; N] {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(self);
    }
}

impl<const N: usize> Decode for [u8; N] {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        r.read_array::<N>()
    }
}

impl Encode for [u8] {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        (self.len() as u32).encode_to(buf);
        buf.extend_from_slice(self);
    }
}

impl Encode for str {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.as_bytes().encode_to(buf);
    }
}

impl Encode for String {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.as_str().encode_to(buf);
    }
}

impl Decode for String {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let len = r.read_len()?;
        let bytes = r.read_bytes(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| CodecError::InvalidUtf8)
    }
}

/// Byte strings are length-prefixed; other sequences use [`encode_seq`].
impl Encode for Vec<u8> {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        self.as_slice().encode_to(buf);
    }
}

impl Decode for Vec<u8> {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        let len = r.read_len()?;
        Ok(r.read_bytes(len)?.to_vec())
    }
}

impl<T: Encode> Encode for Option<T> {
    fn encode_to(&self, buf: &mut Vec<u8>) {
        match self {
            None => buf.push(0),
            Some(v) => {
                buf.push(1);
                v.encode_to(buf);
            }
        }
    }
}

impl<T: Decode> Decode for Option<T> {
    fn decode_from(r: &mut Reader<'_>) -> Result<Self, CodecError> {
        match r.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(T::decode_from(r)?)),
            tag => Err(CodecError::InvalidTag { ty: "Option", tag }),
        }
    }
}

/// Encode a count-prefixed sequence.
pub fn encode_seq<T: Encode>(items: &[T], buf: &mut Vec<u8>) {
    (items.len() as u32).encode_to(buf);
    for item in items {
        item.encode_to(buf);
    }
}

/// Decode a count-prefixed sequence.
pub fn decode_seq<T: Decode>(r: &mut Reader<'_>) -> Result<Vec<T>, CodecError> {
    let count = r.read_len()?;
    let mut out = Vec::with_capacity(count);
    for _ in 0..count {
        out.push(T::decode_from(r)?);
    }
    Ok(out)
}
