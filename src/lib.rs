//! A deterministic Bitcoin Script interpreter with a full execution trace.
//!
//! Scripts parse from raw bytes or mnemonic text into the same operation
//! sequence, evaluate against a dual-stack machine that records every step,
//! and classify into standard spending shapes without being executed.
//! Signature and timelock checks are delegated through a [`script::Checker`],
//! so evaluation itself stays pure and repeatable.
//!
//! ```
//! use scriptvm::script::{Context, Script, ScriptKind};
//!
//! // A hash lock over the empty preimage
//! let lock = Script::parse_text(
//!     "OP_SHA256 <e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855> OP_EQUAL",
//! )
//! .unwrap();
//! assert_eq!(lock.classify(), ScriptKind::HashLock);
//!
//! let result = lock.evaluate(&[vec![]], &Context::default());
//! assert!(result.success());
//! assert_eq!(result.trace.len(), 3);
//! ```

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod script;
pub mod util;
