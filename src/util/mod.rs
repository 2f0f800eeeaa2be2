//! Miscellaneous helpers for the script engine.

mod hash;
mod result;

pub use self::hash::{hash160, ripemd160, sha1, sha256, sha256d, Hash160, Hash256};
pub use self::result::{Error, Result};
