//! Note identifiers.
//!
//! A uid is 21 characters drawn from `[A-Za-z0-9]`, sampled from the
//! operating system's cryptographic random source. With 62^21 possible
//! values, collisions are not retried; the store's uniqueness constraint
//! turns one into an error.

use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;

/// Length of every generated uid.
pub const UID_LENGTH: usize = 21;

/// Generates a fresh uid.
pub fn generate_uid() -> String {
    OsRng
        .sample_iter(&Alphanumeric)
        .take(UID_LENGTH)
        .map(char::from)
        .collect()
}

/// Whether `uid` has the shape of a generated uid.
#[cfg(test)]
pub(crate) fn is_well_formed(uid: &str) -> bool {
    uid.len() == UID_LENGTH && uid.bytes().all(|b| b.is_ascii_alphanumeric())
}
