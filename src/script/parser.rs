//! Dual-entry script parser: raw byte form and mnemonic text form.
//!
//! Both forms produce the same [`Operation`] sequence, so tooling that edits
//! scripts as text and tooling that handles serialized scripts agree on
//! semantics. Push payloads are delimited by explicit lengths (raw form) or
//! `<...>` literals (text form) and are never reinterpreted as opcodes.

use crate::script::op_codes::{self, Opcode};
use crate::script::stack::{decode_num, encode_num, NUM_MAX_LEN};
use crate::script::{OpKind, Operation, MAX_OPS_PER_SCRIPT, MAX_SCRIPT_SIZE};
use std::fmt;

/// Largest magnitude accepted for a bare decimal number push.
const NUM_LITERAL_MAX: i64 = 2_147_483_647;

/// Why parsing failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseErrorKind {
    /// A push's length prefix or payload extends past the end of the script.
    TruncatedPush,
    /// A byte outside the opcode table and the push range.
    UnknownOpcode(u8),
    /// A token that is not a mnemonic, number, or data literal.
    UnknownMnemonic(String),
    /// A `<...>` or bare-hex data literal that is not valid hex.
    BadDataLiteral(String),
    /// A decimal literal outside the 4-byte script-number range.
    NumberOutOfRange,
    /// Serialized script exceeds [`MAX_SCRIPT_SIZE`].
    ScriptTooLong(usize),
    /// More than [`MAX_OPS_PER_SCRIPT`] non-push opcodes.
    TooManyOpcodes(usize),
}

/// A structural script error, reported before any evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    /// Why parsing failed.
    pub kind: ParseErrorKind,
    /// Byte offset into the original input.
    pub offset: usize,
}

impl fmt::Display for ParseErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ParseErrorKind::TruncatedPush => write!(f, "push data extends past end of script"),
            ParseErrorKind::UnknownOpcode(byte) => write!(f, "unknown opcode byte 0x{:02x}", byte),
            ParseErrorKind::UnknownMnemonic(token) => write!(f, "unknown mnemonic: {}", token),
            ParseErrorKind::BadDataLiteral(token) => write!(f, "bad data literal: {}", token),
            ParseErrorKind::NumberOutOfRange => write!(f, "number out of range"),
            ParseErrorKind::ScriptTooLong(len) => {
                write!(f, "script is {} bytes, limit {}", len, MAX_SCRIPT_SIZE)
            }
            ParseErrorKind::TooManyOpcodes(count) => {
                write!(f, "script has {} opcodes, limit {}", count, MAX_OPS_PER_SCRIPT)
            }
        }
    }
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} at offset {}", self.kind, self.offset)
    }
}

impl std::error::Error for ParseError {}

/// Parses the raw byte-serialized form.
pub fn parse_bytes(raw: &[u8]) -> Result<Vec<Operation>, ParseError> {
    if raw.len() > MAX_SCRIPT_SIZE {
        return Err(ParseError { kind: ParseErrorKind::ScriptTooLong(raw.len()), offset: 0 });
    }
    let mut ops = Vec::new();
    let mut op_count = 0;
    let mut i = 0;
    while i < raw.len() {
        let offset = i;
        let byte = raw[i];
        i += 1;
        let kind = match byte {
            op_codes::OP_0 => OpKind::PushNumber(0),
            1..=op_codes::MAX_DIRECT_PUSH => {
                let payload = take(raw, &mut i, byte as usize, offset)?;
                decode_direct_push(payload)
            }
            op_codes::OP_PUSHDATA1 => {
                let len = take(raw, &mut i, 1, offset)?[0] as usize;
                OpKind::PushBytes(take(raw, &mut i, len, offset)?.to_vec())
            }
            op_codes::OP_PUSHDATA2 => {
                let prefix = take(raw, &mut i, 2, offset)?;
                let len = u16::from_le_bytes([prefix[0], prefix[1]]) as usize;
                OpKind::PushBytes(take(raw, &mut i, len, offset)?.to_vec())
            }
            op_codes::OP_PUSHDATA4 => {
                let prefix = take(raw, &mut i, 4, offset)?;
                let len = u32::from_le_bytes([prefix[0], prefix[1], prefix[2], prefix[3]]) as usize;
                OpKind::PushBytes(take(raw, &mut i, len, offset)?.to_vec())
            }
            op_codes::OP_1NEGATE => OpKind::PushNumber(-1),
            0x51..=0x60 => OpKind::PushNumber((byte - op_codes::OP_1_OFFSET) as i64),
            _ => match Opcode::from_byte(byte) {
                Some(opcode) => {
                    op_count += 1;
                    if op_count > MAX_OPS_PER_SCRIPT {
                        return Err(ParseError {
                            kind: ParseErrorKind::TooManyOpcodes(op_count),
                            offset,
                        });
                    }
                    OpKind::Code(opcode)
                }
                None => {
                    return Err(ParseError { kind: ParseErrorKind::UnknownOpcode(byte), offset })
                }
            },
        };
        ops.push(Operation { kind, offset });
    }
    Ok(ops)
}

/// Parses the mnemonic text form.
pub fn parse_text(text: &str) -> Result<Vec<Operation>, ParseError> {
    let mut ops = Vec::new();
    let mut op_count = 0;
    for (offset, token) in tokenize(text) {
        let kind = parse_token(token, offset)?;
        if matches!(kind, OpKind::Code(_)) {
            op_count += 1;
            if op_count > MAX_OPS_PER_SCRIPT {
                return Err(ParseError { kind: ParseErrorKind::TooManyOpcodes(op_count), offset });
            }
        }
        ops.push(Operation { kind, offset });
    }
    let len = serialized_len(&ops);
    if len > MAX_SCRIPT_SIZE {
        return Err(ParseError { kind: ParseErrorKind::ScriptTooLong(len), offset: 0 });
    }
    Ok(ops)
}

/// Applies the parse-time bounds to an already-built operation sequence.
pub(crate) fn validate(ops: &[Operation]) -> Result<(), ParseError> {
    let mut op_count = 0;
    for op in ops {
        if matches!(op.kind, OpKind::Code(_)) {
            op_count += 1;
            if op_count > MAX_OPS_PER_SCRIPT {
                return Err(ParseError {
                    kind: ParseErrorKind::TooManyOpcodes(op_count),
                    offset: op.offset,
                });
            }
        }
    }
    let len = serialized_len(ops);
    if len > MAX_SCRIPT_SIZE {
        return Err(ParseError { kind: ParseErrorKind::ScriptTooLong(len), offset: 0 });
    }
    Ok(())
}

/// A direct push whose payload is the canonical serialization of a number
/// outside -1..=16 decodes as that number, so both parse entries produce the
/// same operations for the same script.
fn decode_direct_push(payload: &[u8]) -> OpKind {
    if payload.len() <= NUM_MAX_LEN {
        if let Some(n) = decode_num(payload, NUM_MAX_LEN) {
            if !(-1..=16).contains(&n) && encode_num(n) == payload {
                return OpKind::PushNumber(n);
            }
        }
    }
    OpKind::PushBytes(payload.to_vec())
}

fn take<'a>(raw: &'a [u8], i: &mut usize, len: usize, offset: usize) -> Result<&'a [u8], ParseError> {
    if *i + len > raw.len() {
        return Err(ParseError { kind: ParseErrorKind::TruncatedPush, offset });
    }
    let slice = &raw[*i..*i + len];
    *i += len;
    Ok(slice)
}

fn tokenize(text: &str) -> Vec<(usize, &str)> {
    let mut out = Vec::new();
    let mut rest = text;
    let mut base = 0;
    loop {
        let trimmed = rest.trim_start();
        base += rest.len() - trimmed.len();
        if trimmed.is_empty() {
            break;
        }
        let end = trimmed.find(char::is_whitespace).unwrap_or(trimmed.len());
        out.push((base, &trimmed[..end]));
        base += end;
        rest = &trimmed[end..];
    }
    out
}

fn parse_token(token: &str, offset: usize) -> Result<OpKind, ParseError> {
    match token {
        "OP_0" | "OP_FALSE" => return Ok(OpKind::PushNumber(0)),
        "OP_TRUE" => return Ok(OpKind::PushNumber(1)),
        "OP_1NEGATE" => return Ok(OpKind::PushNumber(-1)),
        _ => {}
    }
    if let Some(rest) = token.strip_prefix("OP_") {
        // OP_1 through OP_16 are number pushes, not table opcodes
        if let Ok(n) = rest.parse::<u8>() {
            if (1..=16).contains(&n) {
                return Ok(OpKind::PushNumber(n as i64));
            }
        }
        return match Opcode::from_name(token) {
            Some(opcode) => Ok(OpKind::Code(opcode)),
            None => Err(ParseError {
                kind: ParseErrorKind::UnknownMnemonic(token.to_string()),
                offset,
            }),
        };
    }
    if let Some(inner) = token.strip_prefix('<').and_then(|t| t.strip_suffix('>')) {
        let inner = inner.strip_prefix("0x").unwrap_or(inner);
        return match hex::decode(inner) {
            Ok(data) => Ok(OpKind::PushBytes(data)),
            Err(_) => Err(ParseError {
                kind: ParseErrorKind::BadDataLiteral(token.to_string()),
                offset,
            }),
        };
    }
    let body = token.strip_prefix('-').unwrap_or(token);
    if !body.is_empty() && body.bytes().all(|b| b.is_ascii_digit()) {
        return match token.parse::<i64>() {
            Ok(n) if n.abs() <= NUM_LITERAL_MAX => Ok(OpKind::PushNumber(n)),
            _ => Err(ParseError { kind: ParseErrorKind::NumberOutOfRange, offset }),
        };
    }
    if token.bytes().all(|b| b.is_ascii_hexdigit()) {
        return match hex::decode(token) {
            Ok(data) => Ok(OpKind::PushBytes(data)),
            Err(_) => Err(ParseError {
                kind: ParseErrorKind::BadDataLiteral(token.to_string()),
                offset,
            }),
        };
    }
    Err(ParseError { kind: ParseErrorKind::UnknownMnemonic(token.to_string()), offset })
}

fn serialized_len(ops: &[Operation]) -> usize {
    ops.iter()
        .map(|op| match &op.kind {
            OpKind::PushNumber(n) => match *n {
                -1..=16 => 1,
                _ => 1 + encode_num(*n).len(),
            },
            OpKind::PushBytes(data) => {
                data.len()
                    + match data.len() {
                        0..=75 => 1,
                        76..=255 => 2,
                        256..=65535 => 3,
                        _ => 5,
                    }
            }
            OpKind::Code(_) => 1,
        })
        .sum()
}
