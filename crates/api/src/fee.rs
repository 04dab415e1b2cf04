//! Ciphertext fee transforms. Not wired into `TransferEngine`'s default
//! control flow — exposed as opt-in hooks a caller may apply to a
//! ciphertext before persisting it, mirroring the fact that the original
//! never invokes its own fee functions from a handler either.

use crate::crypto::ckks::{self, Ciphertext, Params};

/// Adds a flat, plaintext-known fee to an encrypted amount.
pub fn calc_fixed_fee(params: &Params, ct: &Ciphertext, flat_fee: f64) -> Ciphertext {
    ckks::ct_add_const(params, ct, flat_fee)
}

/// Scales an encrypted amount by `rate`, producing the fee amount itself
/// (not the post-fee balance) without decrypting.
pub fn calc_rated_fee(params: &Params, ct: &Ciphertext, rate: f64) -> Ciphertext {
    ckks::ct_scalar_mul(params, ct, rate)
}
