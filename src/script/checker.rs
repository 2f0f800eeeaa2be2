//! Signature and timelock policy for CHECKSIG, CHECKMULTISIG,
//! CHECKLOCKTIMEVERIFY, and CHECKSEQUENCEVERIFY.
//!
//! The interpreter is pure stack mechanics; everything that depends on the
//! spending transaction goes through the [`Checker`] trait. [`ContextChecker`]
//! is the standard implementation, driven by a caller-supplied [`Context`]
//! carrying the precomputed signature hash and the transaction's locktime and
//! sequence fields.

use crate::util::Hash256;
use secp256k1::{ecdsa, schnorr, Message, PublicKey, Secp256k1, XOnlyPublicKey};

/// Locktime values below this are block heights, at or above are timestamps.
pub const LOCKTIME_THRESHOLD: i64 = 500_000_000;

/// Sequence bit that disables relative locktime entirely.
pub const SEQUENCE_LOCKTIME_DISABLE_FLAG: u32 = 1 << 31;

/// Sequence bit selecting time-based rather than block-based locks.
pub const SEQUENCE_LOCKTIME_TYPE_FLAG: u32 = 1 << 22;

/// Sequence bits that carry the lock type and value.
pub const SEQUENCE_LOCKTIME_MASK: u32 = 0x0040_ffff;

/// Transaction-dependent checks the interpreter delegates.
pub trait Checker {
    /// Checks a signature for the current spend. Called by CHECKSIG and once
    /// per candidate pairing by CHECKMULTISIG.
    fn check_sig(&mut self, sig: &[u8], pubkey: &[u8]) -> bool;

    /// Checks an absolute locktime requirement against the spending
    /// transaction.
    fn check_locktime(&self, locktime: i64) -> bool;

    /// Checks a relative locktime requirement against the spending input's
    /// sequence number.
    fn check_sequence(&self, sequence: i64) -> bool;
}

/// Spend-time facts for one evaluation.
///
/// All fields are optional; a check that needs a missing field fails rather
/// than guessing. The default context makes every signature and timelock
/// check fail, which suits pure stack scripts.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Context {
    /// Precomputed signature hash that signatures commit to.
    pub sighash: Option<Hash256>,
    /// The spending transaction's locktime field.
    pub locktime: Option<u32>,
    /// The spending input's sequence number.
    pub sequence: Option<u32>,
    /// Maximum operations to process before evaluation fails.
    pub step_budget: Option<usize>,
}

/// The standard [`Checker`], backed by a [`Context`].
#[derive(Debug)]
pub struct ContextChecker<'a> {
    context: &'a Context,
}

impl<'a> ContextChecker<'a> {
    /// Wraps a context for one evaluation.
    #[must_use]
    pub fn new(context: &'a Context) -> ContextChecker<'a> {
        ContextChecker { context }
    }
}

impl Checker for ContextChecker<'_> {
    fn check_sig(&mut self, sig: &[u8], pubkey: &[u8]) -> bool {
        if sig.is_empty() || pubkey.is_empty() {
            return false;
        }
        match self.context.sighash {
            Some(digest) => verify_signature(sig, pubkey, &digest),
            None => false,
        }
    }

    fn check_locktime(&self, locktime: i64) -> bool {
        if locktime < 0 {
            return false;
        }
        let tx_locktime = match self.context.locktime {
            Some(locktime) => locktime as i64,
            None => return false,
        };
        // Height locks and time locks never satisfy each other
        if (locktime < LOCKTIME_THRESHOLD) != (tx_locktime < LOCKTIME_THRESHOLD) {
            return false;
        }
        if locktime > tx_locktime {
            return false;
        }
        // A final input would let the transaction confirm immediately,
        // making the locktime field moot
        self.context.sequence != Some(0xffff_ffff)
    }

    fn check_sequence(&self, sequence: i64) -> bool {
        if sequence < 0 {
            return false;
        }
        // An operand with the disable bit set imposes no constraint
        if sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG as i64 != 0 {
            return true;
        }
        let tx_sequence = match self.context.sequence {
            Some(sequence) => sequence,
            None => return false,
        };
        if tx_sequence & SEQUENCE_LOCKTIME_DISABLE_FLAG != 0 {
            return false;
        }
        let mask = SEQUENCE_LOCKTIME_MASK as i64;
        let type_flag = SEQUENCE_LOCKTIME_TYPE_FLAG as i64;
        let masked_op = sequence & mask;
        let masked_tx = tx_sequence as i64 & mask;
        if (masked_op < type_flag) != (masked_tx < type_flag) {
            return false;
        }
        masked_op <= masked_tx
    }
}

/// Verifies a signature over a precomputed digest.
///
/// A 32-byte public key selects BIP340 Schnorr verification with a 64-byte
/// signature; any other key length selects ECDSA with a DER signature. Both
/// forms accept one trailing sighash-type byte. Malformed keys and signatures
/// verify as false rather than erroring.
#[must_use]
pub fn verify_signature(sig: &[u8], pubkey: &[u8], digest: &Hash256) -> bool {
    if pubkey.len() == 32 {
        verify_schnorr(sig, pubkey, digest)
    } else {
        verify_ecdsa(sig, pubkey, digest)
    }
}

fn verify_schnorr(sig: &[u8], pubkey: &[u8], digest: &Hash256) -> bool {
    let sig = match sig.len() {
        64 => sig,
        65 => &sig[..64],
        _ => return false,
    };
    let sig_bytes: [u8; 64] = match sig.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let key_bytes: [u8; 32] = match pubkey.try_into() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    let signature = schnorr::Signature::from_byte_array(sig_bytes);
    let public_key = match XOnlyPublicKey::from_byte_array(key_bytes) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let secp = Secp256k1::verification_only();
    secp.verify_schnorr(&signature, &digest.0, &public_key).is_ok()
}

fn verify_ecdsa(sig: &[u8], pubkey: &[u8], digest: &Hash256) -> bool {
    // The last byte is the sighash type, not part of the DER encoding
    let der = match sig.split_last() {
        Some((_, der)) => der,
        None => return false,
    };
    let signature = match ecdsa::Signature::from_der(der) {
        Ok(signature) => signature,
        Err(_) => return false,
    };
    let public_key = match PublicKey::from_slice(pubkey) {
        Ok(key) => key,
        Err(_) => return false,
    };
    let secp = Secp256k1::verification_only();
    let message = Message::from_digest(digest.0);
    secp.verify_ecdsa(message, &signature, &public_key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::script::interpreter::FailReason;
    use crate::script::{Opcode, Script};
    use crate::util::{hash160, sha256};
    use pretty_assertions::assert_eq;
    use secp256k1::{Keypair, SecretKey};

    const SIGHASH_ALL: u8 = 0x01;

    fn secret(byte: u8) -> SecretKey {
        SecretKey::from_byte_array([byte; 32]).unwrap()
    }

    fn ecdsa_sign(digest: &Hash256, key: &SecretKey) -> Vec<u8> {
        let secp = Secp256k1::new();
        let message = Message::from_digest(digest.0);
        let mut sig = secp.sign_ecdsa(message, key).serialize_der().to_vec();
        sig.push(SIGHASH_ALL);
        sig
    }

    fn pubkey_bytes(key: &SecretKey) -> Vec<u8> {
        let secp = Secp256k1::new();
        PublicKey::from_secret_key(&secp, key).serialize().to_vec()
    }

    #[test]
    fn ecdsa_verify() {
        let key = secret(1);
        let digest = sha256(b"spend this output");
        let sig = ecdsa_sign(&digest, &key);
        let pubkey = pubkey_bytes(&key);

        assert!(verify_signature(&sig, &pubkey, &digest));
        assert!(!verify_signature(&sig, &pubkey, &sha256(b"some other digest")));
        assert!(!verify_signature(&sig, &pubkey_bytes(&secret(2)), &digest));
    }

    #[test]
    fn schnorr_verify() {
        let secp = Secp256k1::new();
        let keypair = Keypair::from_secret_key(&secp, &secret(3));
        let digest = sha256(b"schnorr spend");
        let sig = secp.sign_schnorr_no_aux_rand(&digest.0, &keypair).to_byte_array().to_vec();
        let pubkey = keypair.x_only_public_key().0.serialize().to_vec();
        assert_eq!(pubkey.len(), 32);

        assert!(verify_signature(&sig, &pubkey, &digest));
        // A trailing sighash byte is accepted and stripped
        let mut with_type = sig.clone();
        with_type.push(SIGHASH_ALL);
        assert!(verify_signature(&with_type, &pubkey, &digest));
        assert!(!verify_signature(&sig, &pubkey, &sha256(b"wrong digest")));
    }

    #[test]
    fn malformed_keys_and_signatures_are_false() {
        let digest = sha256(b"x");
        assert!(!verify_signature(&[], &[], &digest));
        assert!(!verify_signature(&[0x30, 0x01, 0x02], &[0x02; 33], &digest));
        assert!(!verify_signature(&[0u8; 64], &[0xff; 32], &digest));
        assert!(!verify_signature(&[0u8; 63], &[0x00; 32], &digest));
        let key = secret(1);
        let sig = ecdsa_sign(&digest, &key);
        assert!(!verify_signature(&sig, &[0xff; 33], &digest));
    }

    #[test]
    fn missing_sighash_fails_signature_checks() {
        let context = Context::default();
        let mut checker = ContextChecker::new(&context);
        let digest = sha256(b"x");
        let key = secret(1);
        assert!(!checker.check_sig(&ecdsa_sign(&digest, &key), &pubkey_bytes(&key)));
    }

    #[test]
    fn p2pkh_spend() {
        let key = secret(4);
        let pubkey = pubkey_bytes(&key);
        let digest = sha256(b"p2pkh sighash");
        let sig = ecdsa_sign(&digest, &key);

        let lock = format!(
            "OP_DUP OP_HASH160 <{}> OP_EQUALVERIFY OP_CHECKSIG",
            hex::encode(hash160(&pubkey).0)
        );
        let script = Script::parse_text(&lock).unwrap();
        let context = Context { sighash: Some(digest), ..Context::default() };

        let result = script.evaluate(&[sig.clone(), pubkey.clone()], &context);
        assert!(result.success());

        // A signature by a different key fails the final CHECKSIG
        let bad_sig = ecdsa_sign(&digest, &secret(5));
        let result = script.evaluate(&[bad_sig, pubkey], &context);
        assert_eq!(result.fail_reason(), Some(&FailReason::EvaluatedFalse));
    }

    #[test]
    fn multisig_requires_signatures_in_key_order() {
        let keys = [secret(6), secret(7), secret(8)];
        let digest = sha256(b"2 of 3");
        let context = Context { sighash: Some(digest), ..Context::default() };

        let lock = format!(
            "2 <{}> <{}> <{}> 3 OP_CHECKMULTISIG",
            hex::encode(pubkey_bytes(&keys[0])),
            hex::encode(pubkey_bytes(&keys[1])),
            hex::encode(pubkey_bytes(&keys[2]))
        );
        let script = Script::parse_text(&lock).unwrap();

        let sig_b = ecdsa_sign(&digest, &keys[1]);
        let sig_c = ecdsa_sign(&digest, &keys[2]);

        let result = script.evaluate(&[sig_b.clone(), sig_c.clone()], &context);
        assert!(result.success());

        // Same signatures out of key order fail
        let result = script.evaluate(&[sig_c, sig_b], &context);
        assert_eq!(result.fail_reason(), Some(&FailReason::EvaluatedFalse));
    }

    #[test]
    fn hash_lock_with_signature() {
        let key = secret(9);
        let pubkey = pubkey_bytes(&key);
        let digest = sha256(b"hash lock sighash");
        let sig = ecdsa_sign(&digest, &key);
        let preimage = b"the secret preimage".to_vec();

        let lock = format!(
            "OP_SHA256 <{}> OP_EQUALVERIFY <{}> OP_CHECKSIG",
            hex::encode(sha256(&preimage).0),
            hex::encode(&pubkey)
        );
        let script = Script::parse_text(&lock).unwrap();
        let context = Context { sighash: Some(digest), ..Context::default() };

        assert!(script.evaluate(&[sig.clone(), preimage], &context).success());
        let result = script.evaluate(&[sig, b"wrong".to_vec()], &context);
        assert_eq!(
            result.fail_reason(),
            Some(&FailReason::VerifyFailed(Opcode::EqualVerify))
        );
    }

    #[test]
    fn locktime_policy() {
        let context =
            Context { locktime: Some(600_000), sequence: Some(0xffff_fffe), ..Context::default() };
        let checker = ContextChecker::new(&context);

        assert!(checker.check_locktime(600_000));
        assert!(checker.check_locktime(1));
        assert!(!checker.check_locktime(600_001));
        assert!(!checker.check_locktime(-1));
        // Height lock cannot satisfy a time lock or vice versa
        assert!(!checker.check_locktime(LOCKTIME_THRESHOLD));

        let time_context =
            Context { locktime: Some(1_700_000_000), sequence: Some(0), ..Context::default() };
        let time_checker = ContextChecker::new(&time_context);
        assert!(time_checker.check_locktime(1_600_000_000));
        assert!(!time_checker.check_locktime(600_000));

        // A final sequence disables the locktime field
        let final_context =
            Context { locktime: Some(600_000), sequence: Some(0xffff_ffff), ..Context::default() };
        assert!(!ContextChecker::new(&final_context).check_locktime(1));

        // No locktime in the context means the check cannot pass
        assert!(!ContextChecker::new(&Context::default()).check_locktime(1));
    }

    #[test]
    fn sequence_policy() {
        let context = Context { sequence: Some(10), ..Context::default() };
        let checker = ContextChecker::new(&context);

        assert!(checker.check_sequence(5));
        assert!(checker.check_sequence(10));
        assert!(!checker.check_sequence(11));
        assert!(!checker.check_sequence(-1));
        // Disable bit on the operand lifts the constraint
        assert!(checker.check_sequence(SEQUENCE_LOCKTIME_DISABLE_FLAG as i64));
        // Block-based operand against a time-based sequence
        assert!(!checker.check_sequence(SEQUENCE_LOCKTIME_TYPE_FLAG as i64 | 5));

        // Disable bit on the transaction rejects any constraint
        let disabled = Context {
            sequence: Some(SEQUENCE_LOCKTIME_DISABLE_FLAG | 10),
            ..Context::default()
        };
        assert!(!ContextChecker::new(&disabled).check_sequence(5));

        // Time-based lock against a time-based sequence
        let time_based = Context {
            sequence: Some(SEQUENCE_LOCKTIME_TYPE_FLAG | 100),
            ..Context::default()
        };
        let time_checker = ContextChecker::new(&time_based);
        assert!(time_checker.check_sequence(SEQUENCE_LOCKTIME_TYPE_FLAG as i64 | 50));
        assert!(!time_checker.check_sequence(SEQUENCE_LOCKTIME_TYPE_FLAG as i64 | 150));
        assert!(!time_checker.check_sequence(50));

        assert!(!ContextChecker::new(&Context::default()).check_sequence(5));
    }

    #[test]
    fn cltv_spend_end_to_end() {
        let script = Script::parse_text("600000 OP_CHECKLOCKTIMEVERIFY OP_DROP 1").unwrap();
        let ok = Context { locktime: Some(700_000), sequence: Some(0), ..Context::default() };
        assert!(script.evaluate(&[], &ok).success());
        let early = Context { locktime: Some(500_000), sequence: Some(0), ..Context::default() };
        assert_eq!(
            script.evaluate(&[], &early).fail_reason(),
            Some(&FailReason::LocktimeNotSatisfied)
        );
    }
}
