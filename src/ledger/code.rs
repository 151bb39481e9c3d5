//! Transaction code generation
//!
//! Every applied transaction carries a short human-facing code. Codes
//! are random, drawn from an alphabet without visually ambiguous
//! characters, and collision-checked against every code already issued.

use rand::Rng;

use crate::domain::LedgerError;

const CODE_PREFIX: &str = "TXN";
/// No 0/O, 1/I/L: these codes get read over the phone.
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKMNPQRSTUVWXYZ23456789";
const CODE_LENGTH: usize = 10;
const MAX_ATTEMPTS: u32 = 8;

/// Produce a fresh unique code. `is_taken` is consulted for every
/// candidate; after [`MAX_ATTEMPTS`] collisions this fails with
/// `CodeSpaceExhausted`, which is a fatal integrity condition — with a
/// 31^10 code space it cannot happen unless the ledger is corrupted.
pub fn next_code(is_taken: impl Fn(&str) -> bool) -> Result<String, LedgerError> {
    let mut rng = rand::thread_rng();

    for attempt in 0..MAX_ATTEMPTS {
        let body: String = (0..CODE_LENGTH)
            .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
            .collect();
        let candidate = format!("{CODE_PREFIX}-{body}");

        if !is_taken(&candidate) {
            return Ok(candidate);
        }

        tracing::warn!(
            candidate = %candidate,
            attempt = attempt + 1,
            "transaction code collision, retrying"
        );
    }

    Err(LedgerError::CodeSpaceExhausted)
}
