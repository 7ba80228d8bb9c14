//! Streaming digest over the supported algorithm set.
//!
//! The algorithm is a closed tag dispatched here; no trait objects, no
//! shared state between files.

use digest::Digest as _;
use md5::Md5;
use sha1::Sha1;
use sha2::Sha256;

use crate::types::Algorithm;

const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

/// Encode bytes as lowercase hex.
pub fn hex_encode(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len() * 2);
    for &b in bytes {
        out.push(HEX_CHARS[(b >> 4) as usize] as char);
        out.push(HEX_CHARS[(b & 0x0f) as usize] as char);
    }
    out
}

/// One in-flight digest computation.
pub enum StreamingDigest {
    Sha256(Sha256),
    Sha1(Sha1),
    Md5(Md5),
}

impl StreamingDigest {
    pub fn new(algorithm: Algorithm) -> Self {
        match algorithm {
            Algorithm::Sha256 => StreamingDigest::Sha256(Sha256::new()),
            Algorithm::Sha1 => StreamingDigest::Sha1(Sha1::new()),
            Algorithm::Md5 => StreamingDigest::Md5(Md5::new()),
        }
    }

    pub fn update(&mut self, bytes: &[u8]) {
        match self {
            StreamingDigest::Sha256(h) => h.update(bytes),
            StreamingDigest::Sha1(h) => h.update(bytes),
            StreamingDigest::Md5(h) => h.update(bytes),
        }
    }

    /// Consume the digest and return the canonical lowercase hex string.
    pub fn finalize(self) -> String {
        match self {
            StreamingDigest::Sha256(h) => hex_encode(&h.finalize()),
            StreamingDigest::Sha1(h) => hex_encode(&h.finalize()),
            StreamingDigest::Md5(h) => hex_encode(&h.finalize()),
        }
    }
}
