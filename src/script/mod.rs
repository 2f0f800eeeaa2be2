//! Script parsing, evaluation, and classification.
//!
//! A [`Script`] is parsed from either raw bytes or mnemonic text, evaluated
//! against a dual-stack machine with a full execution trace, and classified
//! into standard spending shapes.
//!
//! ```
//! use scriptvm::script::{Context, Script};
//!
//! let script = Script::parse_text("OP_1 OP_1 OP_ADD OP_2 OP_EQUAL").unwrap();
//! let result = script.evaluate(&[], &Context::default());
//! assert!(result.success());
//! ```

pub mod checker;
pub mod classifier;
pub mod interpreter;
pub mod op_codes;
pub mod parser;
pub mod stack;

use std::fmt;

pub use self::checker::{verify_signature, Checker, Context, ContextChecker};
pub use self::classifier::{ScriptKind, TimeLockKind};
pub use self::interpreter::{EvaluationResult, FailReason, TraceStep, Verdict};
pub use self::op_codes::{Category, Opcode};
pub use self::parser::{ParseError, ParseErrorKind};

/// Maximum serialized script length in bytes.
pub const MAX_SCRIPT_SIZE: usize = 10_000;

/// Maximum number of non-push opcodes per script.
pub const MAX_OPS_PER_SCRIPT: usize = 201;

/// What a single parsed script element does.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OpKind {
    /// Pushes the payload onto the main stack.
    PushBytes(Vec<u8>),
    /// Pushes a number in its minimal stack encoding.
    PushNumber(i64),
    /// Executes a non-push opcode.
    Code(Opcode),
}

/// One parsed script element, with its position in the original input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operation {
    /// What the element does.
    pub kind: OpKind,
    /// Byte offset in the original input, for error reporting.
    pub offset: usize,
}

/// A parsed script: an ordered, bounds-checked sequence of operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Script {
    ops: Vec<Operation>,
}

impl Script {
    /// Parses a byte-serialized script.
    ///
    /// # Errors
    /// [`ParseError`] for truncated pushes, unknown opcode bytes, or scripts
    /// exceeding the size or opcode-count bounds.
    pub fn parse_bytes(raw: &[u8]) -> Result<Script, ParseError> {
        parser::parse_bytes(raw).map(|ops| Script { ops })
    }

    /// Parses a script in mnemonic text form.
    ///
    /// Tokens are whitespace-separated: `OP_<NAME>` mnemonics, `<hex>` or
    /// bare hex data pushes, and bare decimal number pushes.
    ///
    /// # Errors
    /// [`ParseError`] for unknown mnemonics, bad literals, out-of-range
    /// numbers, or scripts exceeding the size or opcode-count bounds.
    pub fn parse_text(text: &str) -> Result<Script, ParseError> {
        parser::parse_text(text).map(|ops| Script { ops })
    }

    /// Builds a script from operations, applying the same bounds as parsing.
    ///
    /// # Errors
    /// [`ParseError`] when the operations exceed the size or opcode-count
    /// bounds.
    pub fn from_operations(ops: Vec<Operation>) -> Result<Script, ParseError> {
        parser::validate(&ops)?;
        Ok(Script { ops })
    }

    /// The parsed operations in order.
    #[must_use]
    pub fn operations(&self) -> &[Operation] {
        &self.ops
    }

    /// Serializes to the canonical byte form.
    ///
    /// Number pushes use their minimal encoding (OP_0, OP_1NEGATE,
    /// OP_1..OP_16, or a short direct push); data pushes use the smallest
    /// sufficient length prefix.
    #[must_use]
    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::new();
        for op in &self.ops {
            match &op.kind {
                OpKind::PushNumber(n) => match *n {
                    0 => out.push(op_codes::OP_0),
                    -1 => out.push(op_codes::OP_1NEGATE),
                    1..=16 => out.push(op_codes::OP_1_OFFSET + *n as u8),
                    _ => {
                        let data = stack::encode_num(*n);
                        out.push(data.len() as u8);
                        out.extend_from_slice(&data);
                    }
                },
                OpKind::PushBytes(data) => {
                    match data.len() {
                        0..=75 => out.push(data.len() as u8),
                        76..=255 => {
                            out.push(op_codes::OP_PUSHDATA1);
                            out.push(data.len() as u8);
                        }
                        256..=65535 => {
                            out.push(op_codes::OP_PUSHDATA2);
                            out.extend_from_slice(&(data.len() as u16).to_le_bytes());
                        }
                        _ => {
                            out.push(op_codes::OP_PUSHDATA4);
                            out.extend_from_slice(&(data.len() as u32).to_le_bytes());
                        }
                    }
                    out.extend_from_slice(data);
                }
                OpKind::Code(opcode) => out.push(opcode.to_byte()),
            }
        }
        out
    }

    /// Renders the script in mnemonic text form.
    ///
    /// The output parses back to an identical script: opcodes by name, data
    /// pushes as `<hex>`, numbers as decimal.
    #[must_use]
    pub fn to_text(&self) -> String {
        let mut parts = Vec::with_capacity(self.ops.len());
        for op in &self.ops {
            match &op.kind {
                OpKind::PushBytes(data) => parts.push(format!("<{}>", hex::encode(data))),
                OpKind::PushNumber(n) => parts.push(n.to_string()),
                OpKind::Code(opcode) => parts.push(opcode.name().to_string()),
            }
        }
        parts.join(" ")
    }

    /// Evaluates the script against a caller-supplied initial stack and
    /// context, returning a verdict plus the full execution trace.
    #[must_use]
    pub fn evaluate(&self, initial_stack: &[Vec<u8>], context: &Context) -> EvaluationResult {
        let mut checker = ContextChecker::new(context);
        interpreter::eval(self, initial_stack, &mut checker, context.step_budget)
    }

    /// Evaluates with a custom [`Checker`] for signature and timelock policy.
    #[must_use]
    pub fn evaluate_with<C: Checker>(
        &self,
        initial_stack: &[Vec<u8>],
        checker: &mut C,
        step_budget: Option<usize>,
    ) -> EvaluationResult {
        interpreter::eval(self, initial_stack, checker, step_budget)
    }

    /// Reports the script's standard shape without executing it.
    #[must_use]
    pub fn classify(&self) -> ScriptKind {
        classifier::classify(self)
    }
}

impl fmt::Display for Script {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.to_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hex_literal::hex;
    use pretty_assertions::assert_eq;

    #[test]
    fn serialize_number_pushes() {
        let script = Script::parse_text("0 -1 1 16 17 -2 300").unwrap();
        assert_eq!(
            script.serialize(),
            vec![0x00, 0x4f, 0x51, 0x60, 0x01, 0x11, 0x01, 0x82, 0x02, 0x2c, 0x01]
        );
    }

    #[test]
    fn serialize_data_pushes() {
        let script = Script::parse_text("<0102>").unwrap();
        assert_eq!(script.serialize(), vec![0x02, 0x01, 0x02]);

        let long = "ab".repeat(100);
        let script = Script::parse_text(&format!("<{}>", long)).unwrap();
        let raw = script.serialize();
        assert_eq!(raw[0], op_codes::OP_PUSHDATA1);
        assert_eq!(raw[1], 100);
        assert_eq!(raw.len(), 102);

        let longer = "cd".repeat(300);
        let script = Script::parse_text(&format!("<{}>", longer)).unwrap();
        let raw = script.serialize();
        assert_eq!(raw[0], op_codes::OP_PUSHDATA2);
        assert_eq!(raw[1..3], [0x2c, 0x01]);
        assert_eq!(raw.len(), 303);
    }

    #[test]
    fn text_round_trip() {
        let text = "OP_DUP OP_HASH160 <3c231b5e624a42e99a87160c6e4231718a6d77c0> OP_EQUALVERIFY OP_CHECKSIG";
        let script = Script::parse_text(text).unwrap();
        assert_eq!(script.to_text(), text);
        assert_eq!(Script::parse_text(&script.to_text()).unwrap(), script);
    }

    #[test]
    fn byte_round_trip() {
        // A standard P2PKH lock script
        let raw = hex!("76a9143c231b5e624a42e99a87160c6e4231718a6d77c088ac");
        let script = Script::parse_bytes(&raw).unwrap();
        assert_eq!(script.serialize(), raw.to_vec());
    }

    #[test]
    fn text_and_bytes_agree() {
        let from_text =
            Script::parse_text("OP_DUP OP_HASH160 <3c231b5e624a42e99a87160c6e4231718a6d77c0> OP_EQUALVERIFY OP_CHECKSIG")
                .unwrap();
        let from_bytes =
            Script::parse_bytes(&hex!("76a9143c231b5e624a42e99a87160c6e4231718a6d77c088ac")).unwrap();
        assert_eq!(from_text.serialize(), from_bytes.serialize());
    }

    #[test]
    fn display_matches_text() {
        let script = Script::parse_text("OP_1 OP_2 OP_ADD").unwrap();
        assert_eq!(format!("{}", script), "1 2 OP_ADD");
    }

    #[test]
    fn from_operations_applies_bounds() {
        let ops: Vec<Operation> = (0..202)
            .map(|i| Operation { kind: OpKind::Code(Opcode::Nop), offset: i })
            .collect();
        assert!(Script::from_operations(ops).is_err());
    }
}
