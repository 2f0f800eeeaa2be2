//! The dual-stack script machine.
//!
//! Evaluation walks the operation sequence once, front to back, against a main
//! stack and an alt stack, recording a [`TraceStep`] for every executed
//! operation. The outcome is a [`Verdict`] plus the full trace; evaluation is
//! deterministic, so the same script, initial stack, and checker always yield
//! the same [`EvaluationResult`].

use crate::script::checker::Checker;
use crate::script::op_codes::{Category, Opcode};
use crate::script::stack::{decode_bool, decode_num, encode_num, LOCKTIME_NUM_MAX_LEN, NUM_MAX_LEN};
use crate::script::{OpKind, Operation, Script};
use std::fmt;

/// Maximum number of items across the main and alt stacks combined.
pub const MAX_STACK_ITEMS: usize = 1_000;

/// Maximum size of a single stack item in bytes.
pub const MAX_ITEM_SIZE: usize = 520;

/// Maximum number of public keys per CHECKMULTISIG.
pub const MAX_MULTISIG_KEYS: usize = 20;

/// Why evaluation failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailReason {
    /// An opcode needed more stack items than were present.
    StackUnderflow,
    /// Pushing would exceed [`MAX_STACK_ITEMS`] across both stacks.
    StackOverflow,
    /// Pushing an item larger than [`MAX_ITEM_SIZE`] bytes.
    OversizedItem(usize),
    /// An arithmetic or locktime operand was too long to decode.
    NumberOutOfRange,
    /// A VERIFY-style opcode saw a false value.
    VerifyFailed(Opcode),
    /// OP_RETURN was executed.
    OpReturn,
    /// A disabled opcode appeared anywhere in the script.
    DisabledOpcode(Opcode),
    /// A reserved opcode was executed.
    ReservedOpcode(Opcode),
    /// ELSE or ENDIF without a matching IF, a duplicate ELSE, or an
    /// unterminated IF at the end of the script.
    UnbalancedConditional,
    /// CHECKMULTISIG key or signature counts out of range.
    MultisigBounds,
    /// CHECKLOCKTIMEVERIFY rejected the operand.
    LocktimeNotSatisfied,
    /// CHECKSEQUENCEVERIFY rejected the operand.
    SequenceNotSatisfied,
    /// The step budget ran out before the script finished.
    StepBudgetExhausted,
    /// The script finished with an empty main stack.
    FinalStackEmpty,
    /// The script finished with a false value on top of the stack.
    EvaluatedFalse,
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            FailReason::StackUnderflow => write!(f, "stack underflow"),
            FailReason::StackOverflow => write!(f, "stack size limit exceeded"),
            FailReason::OversizedItem(len) => {
                write!(f, "stack item of {} bytes exceeds limit of {}", len, MAX_ITEM_SIZE)
            }
            FailReason::NumberOutOfRange => write!(f, "numeric operand out of range"),
            FailReason::VerifyFailed(op) => write!(f, "{} failed", op.name()),
            FailReason::OpReturn => write!(f, "OP_RETURN executed"),
            FailReason::DisabledOpcode(op) => write!(f, "disabled opcode {}", op.name()),
            FailReason::ReservedOpcode(op) => write!(f, "reserved opcode {} executed", op.name()),
            FailReason::UnbalancedConditional => write!(f, "unbalanced conditional"),
            FailReason::MultisigBounds => write!(f, "multisig counts out of range"),
            FailReason::LocktimeNotSatisfied => write!(f, "locktime requirement not satisfied"),
            FailReason::SequenceNotSatisfied => write!(f, "sequence requirement not satisfied"),
            FailReason::StepBudgetExhausted => write!(f, "step budget exhausted"),
            FailReason::FinalStackEmpty => write!(f, "final stack is empty"),
            FailReason::EvaluatedFalse => write!(f, "script evaluated to false"),
        }
    }
}

/// The outcome of an evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// The script ran to completion and left a true value on top.
    Success,
    /// The script failed; the reason says why.
    Failure(FailReason),
}

/// One executed operation: its index, the operation itself, and stack
/// snapshots around it.
///
/// Operations skipped inside a branch that was not taken produce no step. A
/// failing step snapshots the before-state into both after fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceStep {
    /// Index of the operation within the script.
    pub step: usize,
    /// The operation that executed.
    pub op: Operation,
    /// Main stack before the operation, bottom first.
    pub main_before: Vec<Vec<u8>>,
    /// Main stack after the operation.
    pub main_after: Vec<Vec<u8>>,
    /// Alt stack after the operation.
    pub alt_after: Vec<Vec<u8>>,
}

/// Verdict, trace, and final stack from one evaluation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluationResult {
    /// Success or the reason for failure.
    pub verdict: Verdict,
    /// One entry per executed operation, in order.
    pub trace: Vec<TraceStep>,
    /// The main stack when evaluation stopped, bottom first.
    pub final_stack: Vec<Vec<u8>>,
}

impl EvaluationResult {
    /// True when the verdict is [`Verdict::Success`].
    #[must_use]
    pub fn success(&self) -> bool {
        matches!(self.verdict, Verdict::Success)
    }

    /// The failure reason, if any.
    #[must_use]
    pub fn fail_reason(&self) -> Option<&FailReason> {
        match &self.verdict {
            Verdict::Success => None,
            Verdict::Failure(reason) => Some(reason),
        }
    }
}

/// One IF/NOTIF conditional in progress.
struct Frame {
    /// Whether the branch currently selected executes its operations.
    taken: bool,
    /// Whether ELSE has already appeared in this conditional.
    seen_else: bool,
}

struct Machine<'a, C: Checker> {
    main: Vec<Vec<u8>>,
    alt: Vec<Vec<u8>>,
    frames: Vec<Frame>,
    checker: &'a mut C,
}

/// Runs a script against an initial stack, a checker, and an optional step
/// budget.
pub(crate) fn eval<C: Checker>(
    script: &Script,
    initial_stack: &[Vec<u8>],
    checker: &mut C,
    step_budget: Option<usize>,
) -> EvaluationResult {
    let mut machine = Machine { main: Vec::new(), alt: Vec::new(), frames: Vec::new(), checker };
    let mut trace = Vec::new();

    for item in initial_stack {
        if let Err(reason) = machine.push_item(item.clone()) {
            return EvaluationResult {
                verdict: Verdict::Failure(reason),
                trace,
                final_stack: machine.main,
            };
        }
    }

    let mut steps = 0usize;
    for (ip, op) in script.operations().iter().enumerate() {
        let main_before = machine.main.clone();
        let alt_before = machine.alt.clone();

        let fail = |reason, main_before: Vec<Vec<u8>>, alt_before, mut trace: Vec<TraceStep>| {
            trace.push(TraceStep {
                step: ip,
                op: op.clone(),
                main_before: main_before.clone(),
                main_after: main_before.clone(),
                alt_after: alt_before,
            });
            EvaluationResult {
                verdict: Verdict::Failure(reason),
                trace,
                final_stack: main_before,
            }
        };

        if let Some(budget) = step_budget {
            if steps >= budget {
                return fail(FailReason::StepBudgetExhausted, main_before, alt_before, trace);
            }
        }
        steps += 1;

        // Disabled opcodes fail wherever they appear, taken branch or not
        if let OpKind::Code(code) = &op.kind {
            if code.category() == Category::Disabled {
                return fail(FailReason::DisabledOpcode(*code), main_before, alt_before, trace);
            }
        }

        let executing = machine.executing();
        let frame_op = matches!(
            op.kind,
            OpKind::Code(Opcode::If | Opcode::NotIf | Opcode::Else | Opcode::EndIf)
        );
        if !executing && !frame_op {
            continue;
        }

        // ELSE and ENDIF belong to the whole conditional, so they count as
        // executed whenever every enclosing frame is taken
        let traced = match op.kind {
            OpKind::Code(Opcode::Else | Opcode::EndIf) => machine.outer_executing(),
            _ => executing,
        };

        let outcome = match &op.kind {
            OpKind::PushBytes(data) => machine.push_item(data.clone()),
            OpKind::PushNumber(n) => machine.push_item(encode_num(*n)),
            OpKind::Code(code) => machine.exec_code(*code, executing),
        };

        match outcome {
            Ok(()) => {
                if traced {
                    trace.push(TraceStep {
                        step: ip,
                        op: op.clone(),
                        main_before,
                        main_after: machine.main.clone(),
                        alt_after: machine.alt.clone(),
                    });
                }
            }
            Err(reason) => return fail(reason, main_before, alt_before, trace),
        }
    }

    let verdict = if !machine.frames.is_empty() {
        Verdict::Failure(FailReason::UnbalancedConditional)
    } else {
        match machine.main.last() {
            None => Verdict::Failure(FailReason::FinalStackEmpty),
            Some(top) if !decode_bool(top) => Verdict::Failure(FailReason::EvaluatedFalse),
            Some(_) => Verdict::Success,
        }
    };
    EvaluationResult { verdict, trace, final_stack: machine.main }
}

impl<C: Checker> Machine<'_, C> {
    fn executing(&self) -> bool {
        self.frames.iter().all(|frame| frame.taken)
    }

    fn outer_executing(&self) -> bool {
        let n = self.frames.len();
        n > 0 && self.frames[..n - 1].iter().all(|frame| frame.taken)
    }

    fn pop(&mut self) -> Result<Vec<u8>, FailReason> {
        self.main.pop().ok_or(FailReason::StackUnderflow)
    }

    fn pop_num(&mut self) -> Result<i64, FailReason> {
        let item = self.pop()?;
        decode_num(&item, NUM_MAX_LEN).ok_or(FailReason::NumberOutOfRange)
    }

    fn pop_bool(&mut self) -> Result<bool, FailReason> {
        Ok(decode_bool(&self.pop()?))
    }

    fn peek(&self) -> Result<&Vec<u8>, FailReason> {
        self.main.last().ok_or(FailReason::StackUnderflow)
    }

    fn require(&self, depth: usize) -> Result<(), FailReason> {
        if self.main.len() < depth {
            return Err(FailReason::StackUnderflow);
        }
        Ok(())
    }

    fn push_item(&mut self, item: Vec<u8>) -> Result<(), FailReason> {
        if item.len() > MAX_ITEM_SIZE {
            return Err(FailReason::OversizedItem(item.len()));
        }
        if self.main.len() + self.alt.len() >= MAX_STACK_ITEMS {
            return Err(FailReason::StackOverflow);
        }
        self.main.push(item);
        Ok(())
    }

    fn push_alt(&mut self, item: Vec<u8>) -> Result<(), FailReason> {
        if self.main.len() + self.alt.len() >= MAX_STACK_ITEMS {
            return Err(FailReason::StackOverflow);
        }
        self.alt.push(item);
        Ok(())
    }

    fn push_num(&mut self, n: i64) -> Result<(), FailReason> {
        self.push_item(encode_num(n))
    }

    fn push_bool(&mut self, b: bool) -> Result<(), FailReason> {
        self.push_item(if b { vec![1] } else { vec![] })
    }

    fn verify(&mut self, opcode: Opcode) -> Result<(), FailReason> {
        if !self.pop_bool()? {
            return Err(FailReason::VerifyFailed(opcode));
        }
        Ok(())
    }

    fn check_multisig(&mut self) -> Result<bool, FailReason> {
        let total = self.pop_num()?;
        if total < 0 || total as usize > MAX_MULTISIG_KEYS {
            return Err(FailReason::MultisigBounds);
        }
        let mut keys = Vec::with_capacity(total as usize);
        for _ in 0..total {
            keys.push(self.pop()?);
        }
        keys.reverse();

        let required = self.pop_num()?;
        if required < 0 || required > total {
            return Err(FailReason::MultisigBounds);
        }
        let mut sigs = Vec::with_capacity(required as usize);
        for _ in 0..required {
            sigs.push(self.pop()?);
        }
        sigs.reverse();

        // Signatures must match keys in key order; each key is tried at most once
        let mut key_iter = keys.iter();
        'sigs: for sig in &sigs {
            for key in key_iter.by_ref() {
                if self.checker.check_sig(sig, key) {
                    continue 'sigs;
                }
            }
            return Ok(false);
        }
        Ok(true)
    }

    fn exec_code(&mut self, opcode: Opcode, executing: bool) -> Result<(), FailReason> {
        match opcode {
            // Flow control
            Opcode::If | Opcode::NotIf => {
                let taken = if executing {
                    let condition = self.pop_bool()?;
                    if opcode == Opcode::If {
                        condition
                    } else {
                        !condition
                    }
                } else {
                    false
                };
                self.frames.push(Frame { taken, seen_else: false });
            }
            Opcode::Else => {
                let frame = self.frames.last_mut().ok_or(FailReason::UnbalancedConditional)?;
                if frame.seen_else {
                    return Err(FailReason::UnbalancedConditional);
                }
                frame.seen_else = true;
                frame.taken = !frame.taken;
            }
            Opcode::EndIf => {
                self.frames.pop().ok_or(FailReason::UnbalancedConditional)?;
            }
            Opcode::Verify => self.verify(Opcode::Verify)?,
            Opcode::Return => return Err(FailReason::OpReturn),
            Opcode::Nop
            | Opcode::Nop1
            | Opcode::Nop4
            | Opcode::Nop5
            | Opcode::Nop6
            | Opcode::Nop7
            | Opcode::Nop8
            | Opcode::Nop9
            | Opcode::Nop10 => {}

            // Stack
            Opcode::ToAltStack => {
                let item = self.pop()?;
                self.push_alt(item)?;
            }
            Opcode::FromAltStack => {
                let item = self.alt.pop().ok_or(FailReason::StackUnderflow)?;
                self.push_item(item)?;
            }
            Opcode::TwoDrop => {
                self.pop()?;
                self.pop()?;
            }
            Opcode::TwoDup => {
                self.require(2)?;
                let a = self.main[self.main.len() - 2].clone();
                let b = self.main[self.main.len() - 1].clone();
                self.push_item(a)?;
                self.push_item(b)?;
            }
            Opcode::ThreeDup => {
                self.require(3)?;
                let a = self.main[self.main.len() - 3].clone();
                let b = self.main[self.main.len() - 2].clone();
                let c = self.main[self.main.len() - 1].clone();
                self.push_item(a)?;
                self.push_item(b)?;
                self.push_item(c)?;
            }
            Opcode::TwoOver => {
                self.require(4)?;
                let a = self.main[self.main.len() - 4].clone();
                let b = self.main[self.main.len() - 3].clone();
                self.push_item(a)?;
                self.push_item(b)?;
            }
            Opcode::TwoRot => {
                self.require(6)?;
                let idx = self.main.len() - 6;
                let a = self.main.remove(idx);
                let b = self.main.remove(idx);
                self.main.push(a);
                self.main.push(b);
            }
            Opcode::TwoSwap => {
                self.require(4)?;
                let len = self.main.len();
                self.main.swap(len - 4, len - 2);
                self.main.swap(len - 3, len - 1);
            }
            Opcode::IfDup => {
                let top = self.peek()?.clone();
                if decode_bool(&top) {
                    self.push_item(top)?;
                }
            }
            Opcode::Depth => {
                let depth = self.main.len() as i64;
                self.push_num(depth)?;
            }
            Opcode::Drop => {
                self.pop()?;
            }
            Opcode::Dup => {
                let top = self.peek()?.clone();
                self.push_item(top)?;
            }
            Opcode::Nip => {
                self.require(2)?;
                let idx = self.main.len() - 2;
                self.main.remove(idx);
            }
            Opcode::Over => {
                self.require(2)?;
                let item = self.main[self.main.len() - 2].clone();
                self.push_item(item)?;
            }
            Opcode::Pick | Opcode::Roll => {
                let n = self.pop_num()?;
                if n < 0 || n as usize >= self.main.len() {
                    return Err(FailReason::StackUnderflow);
                }
                let idx = self.main.len() - 1 - n as usize;
                if opcode == Opcode::Pick {
                    let item = self.main[idx].clone();
                    self.push_item(item)?;
                } else {
                    let item = self.main.remove(idx);
                    self.main.push(item);
                }
            }
            Opcode::Rot => {
                self.require(3)?;
                let idx = self.main.len() - 3;
                let item = self.main.remove(idx);
                self.main.push(item);
            }
            Opcode::Swap => {
                self.require(2)?;
                let len = self.main.len();
                self.main.swap(len - 2, len - 1);
            }
            Opcode::Tuck => {
                self.require(2)?;
                let top = self.main[self.main.len() - 1].clone();
                if top.len() > MAX_ITEM_SIZE {
                    return Err(FailReason::OversizedItem(top.len()));
                }
                if self.main.len() + self.alt.len() >= MAX_STACK_ITEMS {
                    return Err(FailReason::StackOverflow);
                }
                let idx = self.main.len() - 2;
                self.main.insert(idx, top);
            }

            // Splice
            Opcode::Size => {
                let len = self.peek()?.len() as i64;
                self.push_num(len)?;
            }

            // Bitwise
            Opcode::Equal => {
                let b = self.pop()?;
                let a = self.pop()?;
                self.push_bool(a == b)?;
            }
            Opcode::EqualVerify => {
                let b = self.pop()?;
                let a = self.pop()?;
                if a != b {
                    return Err(FailReason::VerifyFailed(Opcode::EqualVerify));
                }
            }

            // Arithmetic
            Opcode::OneAdd => {
                let n = self.pop_num()?;
                self.push_num(n + 1)?;
            }
            Opcode::OneSub => {
                let n = self.pop_num()?;
                self.push_num(n - 1)?;
            }
            Opcode::Negate => {
                let n = self.pop_num()?;
                self.push_num(-n)?;
            }
            Opcode::Abs => {
                let n = self.pop_num()?;
                self.push_num(n.abs())?;
            }
            Opcode::Not => {
                let n = self.pop_num()?;
                self.push_bool(n == 0)?;
            }
            Opcode::ZeroNotEqual => {
                let n = self.pop_num()?;
                self.push_bool(n != 0)?;
            }
            Opcode::Add => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a + b)?;
            }
            Opcode::Sub => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a - b)?;
            }
            Opcode::BoolAnd => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a != 0 && b != 0)?;
            }
            Opcode::BoolOr => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a != 0 || b != 0)?;
            }
            Opcode::NumEqual => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a == b)?;
            }
            Opcode::NumEqualVerify => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                if a != b {
                    return Err(FailReason::VerifyFailed(Opcode::NumEqualVerify));
                }
            }
            Opcode::NumNotEqual => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a != b)?;
            }
            Opcode::LessThan => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a < b)?;
            }
            Opcode::GreaterThan => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a > b)?;
            }
            Opcode::LessThanOrEqual => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a <= b)?;
            }
            Opcode::GreaterThanOrEqual => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_bool(a >= b)?;
            }
            Opcode::Min => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a.min(b))?;
            }
            Opcode::Max => {
                let b = self.pop_num()?;
                let a = self.pop_num()?;
                self.push_num(a.max(b))?;
            }
            Opcode::Within => {
                let max = self.pop_num()?;
                let min = self.pop_num()?;
                let x = self.pop_num()?;
                self.push_bool(min <= x && x < max)?;
            }

            // Crypto
            Opcode::Ripemd160 => {
                let item = self.pop()?;
                self.push_item(crate::util::ripemd160(&item).to_vec())?;
            }
            Opcode::Sha1 => {
                let item = self.pop()?;
                self.push_item(crate::util::sha1(&item).to_vec())?;
            }
            Opcode::Sha256 => {
                let item = self.pop()?;
                self.push_item(crate::util::sha256(&item).0.to_vec())?;
            }
            Opcode::Hash160 => {
                let item = self.pop()?;
                self.push_item(crate::util::hash160(&item).0.to_vec())?;
            }
            Opcode::Hash256 => {
                let item = self.pop()?;
                self.push_item(crate::util::sha256d(&item).0.to_vec())?;
            }
            // No sighash binding here, so nothing to separate
            Opcode::CodeSeparator => {}
            Opcode::CheckSig => {
                let pubkey = self.pop()?;
                let sig = self.pop()?;
                let ok = self.checker.check_sig(&sig, &pubkey);
                self.push_bool(ok)?;
            }
            Opcode::CheckSigVerify => {
                let pubkey = self.pop()?;
                let sig = self.pop()?;
                if !self.checker.check_sig(&sig, &pubkey) {
                    return Err(FailReason::VerifyFailed(Opcode::CheckSigVerify));
                }
            }
            Opcode::CheckMultiSig => {
                let ok = self.check_multisig()?;
                self.push_bool(ok)?;
            }
            Opcode::CheckMultiSigVerify => {
                if !self.check_multisig()? {
                    return Err(FailReason::VerifyFailed(Opcode::CheckMultiSigVerify));
                }
            }

            // Locktime; the operand stays on the stack
            Opcode::CheckLockTimeVerify => {
                let n = decode_num(self.peek()?, LOCKTIME_NUM_MAX_LEN)
                    .ok_or(FailReason::NumberOutOfRange)?;
                if !self.checker.check_locktime(n) {
                    return Err(FailReason::LocktimeNotSatisfied);
                }
            }
            Opcode::CheckSequenceVerify => {
                let n = decode_num(self.peek()?, LOCKTIME_NUM_MAX_LEN)
                    .ok_or(FailReason::NumberOutOfRange)?;
                if !self.checker.check_sequence(n) {
                    return Err(FailReason::SequenceNotSatisfied);
                }
            }

            // Reserved opcodes fail only when executed
            Opcode::Reserved | Opcode::Ver | Opcode::Reserved1 | Opcode::Reserved2 => {
                return Err(FailReason::ReservedOpcode(opcode));
            }

            // Disabled opcodes are rejected before dispatch
            Opcode::Cat
            | Opcode::Substr
            | Opcode::Left
            | Opcode::Right
            | Opcode::Invert
            | Opcode::And
            | Opcode::Or
            | Opcode::Xor
            | Opcode::TwoMul
            | Opcode::TwoDiv
            | Opcode::Mul
            | Opcode::Div
            | Opcode::Mod
            | Opcode::LShift
            | Opcode::RShift
            | Opcode::VerIf
            | Opcode::VerNotIf => {
                return Err(FailReason::DisabledOpcode(opcode));
            }
        }
        Ok(())
    }
}
