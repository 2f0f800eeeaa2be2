//! Recognizes standard locking-script shapes without executing them.

use crate::script::op_codes::Opcode;
use crate::script::{OpKind, Operation, Script};
use std::fmt;

/// Which kind of timelock a [`ScriptKind::TimeLock`] enforces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeLockKind {
    /// CHECKLOCKTIMEVERIFY against the transaction locktime.
    Absolute,
    /// CHECKSEQUENCEVERIFY against the input sequence.
    Relative,
}

/// A script's standard shape, or [`ScriptKind::Custom`] when none matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptKind {
    /// `OP_DUP OP_HASH160 <20 bytes> OP_EQUALVERIFY OP_CHECKSIG`.
    P2pkh,
    /// `OP_HASH160 <20 bytes> OP_EQUAL`.
    P2sh,
    /// `<m> <key>*n <n> OP_CHECKMULTISIG` with `1 <= m <= n <= 20`.
    Multisig {
        /// Signatures required to spend.
        required: usize,
        /// Public keys in the script.
        total: usize,
    },
    /// A hash opcode, its expected digest, and an equality check, with an
    /// optional trailing `<key> OP_CHECKSIG`.
    HashLock,
    /// A timelock check guarding a standard tail.
    TimeLock(TimeLockKind),
    /// A single top-level `OP_IF .. OP_ELSE .. OP_ENDIF` whose branches are
    /// classified recursively.
    Conditional(Box<ScriptKind>, Box<ScriptKind>),
    /// Anything else.
    Custom,
}

impl fmt::Display for ScriptKind {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ScriptKind::P2pkh => write!(f, "p2pkh"),
            ScriptKind::P2sh => write!(f, "p2sh"),
            ScriptKind::Multisig { required, total } => {
                write!(f, "multisig {}-of-{}", required, total)
            }
            ScriptKind::HashLock => write!(f, "hashlock"),
            ScriptKind::TimeLock(TimeLockKind::Absolute) => write!(f, "timelock(absolute)"),
            ScriptKind::TimeLock(TimeLockKind::Relative) => write!(f, "timelock(relative)"),
            ScriptKind::Conditional(a, b) => write!(f, "conditional({} | {})", a, b),
            ScriptKind::Custom => write!(f, "custom"),
        }
    }
}

pub(crate) fn classify(script: &Script) -> ScriptKind {
    classify_ops(script.operations())
}

fn classify_ops(ops: &[Operation]) -> ScriptKind {
    if is_p2pkh(ops) {
        return ScriptKind::P2pkh;
    }
    if is_p2sh(ops) {
        return ScriptKind::P2sh;
    }
    if let Some((required, total)) = as_multisig(ops) {
        return ScriptKind::Multisig { required, total };
    }
    if let Some(kind) = as_timelock(ops) {
        return ScriptKind::TimeLock(kind);
    }
    if is_hash_lock(ops) {
        return ScriptKind::HashLock;
    }
    if let Some(kind) = as_conditional(ops) {
        return kind;
    }
    ScriptKind::Custom
}

fn is_code(op: &Operation, code: Opcode) -> bool {
    op.kind == OpKind::Code(code)
}

fn is_push_of(op: &Operation, len: usize) -> bool {
    matches!(&op.kind, OpKind::PushBytes(data) if data.len() == len)
}

fn is_pubkey_push(op: &Operation) -> bool {
    is_push_of(op, 33) || is_push_of(op, 65)
}

fn is_p2pkh(ops: &[Operation]) -> bool {
    ops.len() == 5
        && is_code(&ops[0], Opcode::Dup)
        && is_code(&ops[1], Opcode::Hash160)
        && is_push_of(&ops[2], 20)
        && is_code(&ops[3], Opcode::EqualVerify)
        && is_code(&ops[4], Opcode::CheckSig)
}

fn is_p2sh(ops: &[Operation]) -> bool {
    ops.len() == 3
        && is_code(&ops[0], Opcode::Hash160)
        && is_push_of(&ops[1], 20)
        && is_code(&ops[2], Opcode::Equal)
}

fn small_int(op: &Operation) -> Option<usize> {
    match op.kind {
        OpKind::PushNumber(n) if (0..=20).contains(&n) => Some(n as usize),
        _ => None,
    }
}

fn as_multisig(ops: &[Operation]) -> Option<(usize, usize)> {
    if ops.len() < 4 || !is_code(&ops[ops.len() - 1], Opcode::CheckMultiSig) {
        return None;
    }
    let required = small_int(&ops[0])?;
    let total = small_int(&ops[ops.len() - 2])?;
    let keys = &ops[1..ops.len() - 2];
    if keys.len() != total || !keys.iter().all(is_pubkey_push) {
        return None;
    }
    if required < 1 || required > total || total > 20 {
        return None;
    }
    Some((required, total))
}

fn is_hash_lock(ops: &[Operation]) -> bool {
    if ops.len() < 3 {
        return false;
    }
    let digest_len = match ops[0].kind {
        OpKind::Code(Opcode::Sha256 | Opcode::Hash256) => 32,
        OpKind::Code(Opcode::Sha1 | Opcode::Ripemd160 | Opcode::Hash160) => 20,
        _ => return false,
    };
    if !is_push_of(&ops[1], digest_len)
        || !matches!(ops[2].kind, OpKind::Code(Opcode::Equal | Opcode::EqualVerify))
    {
        return false;
    }
    let rest = &ops[3..];
    rest.is_empty()
        || (rest.len() == 2 && is_pubkey_push(&rest[0]) && is_code(&rest[1], Opcode::CheckSig))
}

fn as_timelock(ops: &[Operation]) -> Option<TimeLockKind> {
    if ops.len() < 2 {
        return None;
    }
    let operand_ok = match &ops[0].kind {
        OpKind::PushNumber(n) => *n >= 0,
        OpKind::PushBytes(data) => data.len() <= 5,
        OpKind::Code(_) => false,
    };
    if !operand_ok {
        return None;
    }
    let kind = match ops[1].kind {
        OpKind::Code(Opcode::CheckLockTimeVerify) => TimeLockKind::Absolute,
        OpKind::Code(Opcode::CheckSequenceVerify) => TimeLockKind::Relative,
        _ => return None,
    };
    let mut rest = &ops[2..];
    if let Some(first) = rest.first() {
        if is_code(first, Opcode::Drop) {
            rest = &rest[1..];
        }
    }
    // The guarded tail must itself be a recognized shape
    if rest.is_empty() || classify_ops(rest) != ScriptKind::Custom {
        Some(kind)
    } else {
        None
    }
}

fn as_conditional(ops: &[Operation]) -> Option<ScriptKind> {
    if ops.len() < 2
        || !is_code(&ops[0], Opcode::If)
        || !is_code(&ops[ops.len() - 1], Opcode::EndIf)
    {
        return None;
    }
    let inner = &ops[1..ops.len() - 1];
    let mut depth = 0usize;
    let mut split = None;
    for (i, op) in inner.iter().enumerate() {
        match op.kind {
            OpKind::Code(Opcode::If | Opcode::NotIf) => depth += 1,
            OpKind::Code(Opcode::EndIf) => {
                // The closing ENDIF must be the final operation
                depth = depth.checked_sub(1)?;
            }
            OpKind::Code(Opcode::Else) if depth == 0 => {
                if split.is_some() {
                    return None;
                }
                split = Some(i);
            }
            _ => {}
        }
    }
    if depth != 0 {
        return None;
    }
    let (then_ops, else_ops) = match split {
        Some(i) => (&inner[..i], &inner[i + 1..]),
        None => (inner, &inner[inner.len()..]),
    };
    Some(ScriptKind::Conditional(
        Box::new(classify_ops(then_ops)),
        Box::new(classify_ops(else_ops)),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::Script;
    use pretty_assertions::assert_eq;

    fn classify_text(text: &str) -> ScriptKind {
        Script::parse_text(text).unwrap().classify()
    }

    fn key(byte: u8) -> String {
        format!("02{}", hex::encode([byte; 32]))
    }

    #[test]
    fn p2pkh() {
        let hash = hex::encode([0x11u8; 20]);
        assert_eq!(
            classify_text(&format!("OP_DUP OP_HASH160 <{}> OP_EQUALVERIFY OP_CHECKSIG", hash)),
            ScriptKind::P2pkh
        );
        // Wrong hash length is not standard
        let short = hex::encode([0x11u8; 19]);
        assert_eq!(
            classify_text(&format!("OP_DUP OP_HASH160 <{}> OP_EQUALVERIFY OP_CHECKSIG", short)),
            ScriptKind::Custom
        );
    }

    #[test]
    fn p2sh() {
        let hash = hex::encode([0x22u8; 20]);
        assert_eq!(classify_text(&format!("OP_HASH160 <{}> OP_EQUAL", hash)), ScriptKind::P2sh);
    }

    #[test]
    fn multisig() {
        let text = format!("2 <{}> <{}> <{}> 3 OP_CHECKMULTISIG", key(1), key(2), key(3));
        assert_eq!(classify_text(&text), ScriptKind::Multisig { required: 2, total: 3 });

        // Count mismatch, m > n, and zero-of-n all fall through to custom
        let text = format!("2 <{}> <{}> 3 OP_CHECKMULTISIG", key(1), key(2));
        assert_eq!(classify_text(&text), ScriptKind::Custom);
        let text = format!("3 <{}> <{}> 2 OP_CHECKMULTISIG", key(1), key(2));
        assert_eq!(classify_text(&text), ScriptKind::Custom);
        let text = format!("0 <{}> 1 OP_CHECKMULTISIG", key(1));
        assert_eq!(classify_text(&text), ScriptKind::Custom);
    }

    #[test]
    fn multisig_counts_above_sixteen_survive_byte_round_trip() {
        // 17..=20 serialize as direct number pushes rather than OP_N; both
        // entry forms must still classify identically
        let keys: Vec<String> = (1..=20).map(|i| format!("<{}>", key(i))).collect();
        let text = format!("17 {} 20 OP_CHECKMULTISIG", keys.join(" "));
        let script = Script::parse_text(&text).unwrap();
        let expected = ScriptKind::Multisig { required: 17, total: 20 };
        assert_eq!(script.classify(), expected);
        let reparsed = Script::parse_bytes(&script.serialize()).unwrap();
        assert_eq!(reparsed.classify(), expected);
    }

    #[test]
    fn hash_lock() {
        let digest = hex::encode([0x33u8; 32]);
        assert_eq!(classify_text(&format!("OP_SHA256 <{}> OP_EQUAL", digest)), ScriptKind::HashLock);
        assert_eq!(
            classify_text(&format!("OP_SHA256 <{}> OP_EQUALVERIFY <{}> OP_CHECKSIG", digest, key(1))),
            ScriptKind::HashLock
        );
        let short = hex::encode([0x33u8; 20]);
        assert_eq!(classify_text(&format!("OP_HASH160 <{}> OP_EQUALVERIFY", short)), ScriptKind::HashLock);
        // Digest length must match the hash function
        assert_eq!(classify_text(&format!("OP_SHA256 <{}> OP_EQUAL", short)), ScriptKind::Custom);
    }

    #[test]
    fn timelocks() {
        let hash = hex::encode([0x44u8; 20]);
        let p2pkh_tail = format!("OP_DUP OP_HASH160 <{}> OP_EQUALVERIFY OP_CHECKSIG", hash);
        assert_eq!(
            classify_text(&format!("600000 OP_CHECKLOCKTIMEVERIFY OP_DROP {}", p2pkh_tail)),
            ScriptKind::TimeLock(TimeLockKind::Absolute)
        );
        assert_eq!(
            classify_text(&format!("144 OP_CHECKSEQUENCEVERIFY OP_DROP {}", p2pkh_tail)),
            ScriptKind::TimeLock(TimeLockKind::Relative)
        );
        // Bare timelock with nothing guarded
        assert_eq!(
            classify_text("600000 OP_CHECKLOCKTIMEVERIFY"),
            ScriptKind::TimeLock(TimeLockKind::Absolute)
        );
        // An unrecognized tail is not a standard timelock
        assert_eq!(
            classify_text("600000 OP_CHECKLOCKTIMEVERIFY OP_DROP 1 OP_ADD"),
            ScriptKind::Custom
        );
    }

    #[test]
    fn conditional() {
        let hash = hex::encode([0x55u8; 20]);
        let digest = hex::encode([0x66u8; 32]);
        let text = format!(
            "OP_IF OP_SHA256 <{}> OP_EQUAL OP_ELSE OP_DUP OP_HASH160 <{}> OP_EQUALVERIFY OP_CHECKSIG OP_ENDIF",
            digest, hash
        );
        assert_eq!(
            classify_text(&text),
            ScriptKind::Conditional(
                Box::new(ScriptKind::HashLock),
                Box::new(ScriptKind::P2pkh)
            )
        );

        // Missing ELSE leaves an empty alternative branch
        let text = format!("OP_IF OP_HASH160 <{}> OP_EQUAL OP_ENDIF", hash);
        assert_eq!(
            classify_text(&text),
            ScriptKind::Conditional(Box::new(ScriptKind::P2sh), Box::new(ScriptKind::Custom))
        );

        // A nested conditional belongs to its branch, not the top level
        let text = format!(
            "OP_IF OP_IF OP_HASH160 <{}> OP_EQUAL OP_ELSE OP_HASH160 <{}> OP_EQUAL OP_ENDIF OP_ENDIF",
            hash, hash
        );
        assert_eq!(
            classify_text(&text),
            ScriptKind::Conditional(
                Box::new(ScriptKind::Conditional(
                    Box::new(ScriptKind::P2sh),
                    Box::new(ScriptKind::P2sh)
                )),
                Box::new(ScriptKind::Custom)
            )
        );
    }

    #[test]
    fn htlc_shape() {
        // Hash branch or timelocked refund, the common HTLC layout
        let digest = hex::encode([0x77u8; 32]);
        let hash = hex::encode([0x88u8; 20]);
        let text = format!(
            "OP_IF OP_SHA256 <{}> OP_EQUALVERIFY <{}> OP_CHECKSIG \
             OP_ELSE 600000 OP_CHECKLOCKTIMEVERIFY OP_DROP OP_DUP OP_HASH160 <{}> OP_EQUALVERIFY OP_CHECKSIG OP_ENDIF",
            digest,
            format!("02{}", hex::encode([0x09u8; 32])),
            hash
        );
        assert_eq!(
            classify_text(&text),
            ScriptKind::Conditional(
                Box::new(ScriptKind::HashLock),
                Box::new(ScriptKind::TimeLock(TimeLockKind::Absolute))
            )
        );
    }

    #[test]
    fn custom_fallback() {
        assert_eq!(classify_text("1 2 OP_ADD"), ScriptKind::Custom);
        assert_eq!(classify_text(""), ScriptKind::Custom);
        assert_eq!(classify_text("OP_DUP"), ScriptKind::Custom);
    }

    #[test]
    fn display_labels() {
        let hash = hex::encode([0x11u8; 20]);
        let kind = classify_text(&format!("OP_DUP OP_HASH160 <{}> OP_EQUALVERIFY OP_CHECKSIG", hash));
        assert_eq!(kind.to_string(), "p2pkh");
        let text = format!("2 <{}> <{}> <{}> 3 OP_CHECKMULTISIG", key(1), key(2), key(3));
        assert_eq!(classify_text(&text).to_string(), "multisig 2-of-3");
    }
}
