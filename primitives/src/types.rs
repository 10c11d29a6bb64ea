//! Core type aliases and byte helpers.

use std::fmt::Write;

/// 32-byte hash used for header hashes, state roots, and Merkle nodes.
pub type Hash = [u8; 32];

/// 32-byte account address, derived from an Ed25519 public key.
pub type Address = [u8; 32];

/// Block height (monotonically increasing, genesis is 0).
pub type BlockHeight = u64;

/// A zero-valued hash (32 zero bytes). Root of the empty tree.
pub const ZERO_HASH: Hash = [0u8; 32];

/// Render bytes as `0x`-prefixed lowercase hex for logs.
pub fn to_hex(bytes: &[u8]) -> String {
    let mut s = String::with_capacity(2 + bytes.len() * 2);
    s.push_str("0x");
    for byte in bytes {
        let _ = write!(s, "{:02x}", byte);
    }
    s
}

/// Decode a u64 from the first 8 little-endian bytes.
pub fn u64_from_le_bytes(bytes: &[u8]) -> Option<u64> {
    let buf: [u8; 8] = bytes.get(..8)?.try_into().ok()?;
    Some(u64::from_le_bytes(buf))
}

/// Join key segments with `/`, the namespace separator.
pub fn join_key(segments: &[&[u8]]) -> Vec<u8> {
    let total: usize = segments.iter().map(|s| s.len() + 1).sum();
    let mut out = Vec::with_capacity(total);
    for (i, s) in segments.iter().enumerate() {
        if i > 0 {
            out.push(b'/');
        }
        out.extend_from_slice(s);
    }
    out
}
