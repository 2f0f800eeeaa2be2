//! Hash digests and helpers used by the script engine.

use crate::util::{Error, Result};
use bitcoin_hashes::{
    hash160 as bh_hash160, ripemd160 as bh_ripemd160, sha1 as bh_sha1, sha256 as bh_sha256,
    sha256d as bh_sha256d, Hash as BHHash,
};
use std::fmt;

/// 160-bit digest (RIPEMD160 of SHA256), as used by HASH160 and P2PKH.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash160(pub [u8; 20]);

/// 256-bit digest, as used by SHA256, HASH256, and signature hashes.
#[derive(Default, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Hash256(pub [u8; 32]);

/// Computes SHA256 of the data.
#[must_use]
#[inline]
pub fn sha256(data: &[u8]) -> Hash256 {
    let h = bh_sha256::Hash::hash(data).to_byte_array();
    Hash256(h)
}

/// Hashes a data array twice using SHA256.
#[must_use]
#[inline]
pub fn sha256d(data: &[u8]) -> Hash256 {
    let h = bh_sha256d::Hash::hash(data).to_byte_array();
    Hash256(h)
}

/// Computes Hash160 (RIPEMD160(SHA256(data))).
#[must_use]
#[inline]
pub fn hash160(data: &[u8]) -> Hash160 {
    let h = bh_hash160::Hash::hash(data).to_byte_array();
    Hash160(h)
}

/// Computes a single RIPEMD160 of the data.
#[must_use]
#[inline]
pub fn ripemd160(data: &[u8]) -> [u8; 20] {
    bh_ripemd160::Hash::hash(data).to_byte_array()
}

/// Computes SHA1 of the data. Legacy; only OP_SHA1 uses it.
#[must_use]
#[inline]
pub fn sha1(data: &[u8]) -> [u8; 20] {
    bh_sha1::Hash::hash(data).to_byte_array()
}

impl Hash256 {
    /// Converts the digest into a hex string.
    #[must_use]
    #[inline]
    pub fn encode(&self) -> String {
        hex::encode(self.0)
    }

    /// Converts a string of 64 hex characters into a digest.
    ///
    /// # Errors
    /// [`Error::BadArgument`] if the decoded length is not 32 bytes.
    #[inline]
    pub fn decode(s: &str) -> Result<Hash256> {
        let decoded_bytes = hex::decode(s)?;
        if decoded_bytes.len() != 32 {
            return Err(Error::BadArgument(format!("Length {} of decoded bytes", decoded_bytes.len())));
        }
        let mut hash_bytes = [0; 32];
        hash_bytes.copy_from_slice(&decoded_bytes);
        Ok(Hash256(hash_bytes))
    }
}

impl From<[u8; 20]> for Hash160 {
    fn from(bytes: [u8; 20]) -> Self {
        Hash160(bytes)
    }
}

impl From<[u8; 32]> for Hash256 {
    fn from(bytes: [u8; 32]) -> Self {
        Hash256(bytes)
    }
}

impl fmt::Debug for Hash160 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", hex::encode(self.0))
    }
}

impl fmt::Debug for Hash256 {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.encode())
    }
}
