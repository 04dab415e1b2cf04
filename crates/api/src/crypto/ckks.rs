//! A single-slot, single-level RLWE-based additively homomorphic scheme.
//!
//! The protocol only ever needs to encrypt one `f64` amount per ciphertext
//! and to key-switch that ciphertext between two users' secret keys, so this
//! wraps the textbook RLWE public-key scheme (encrypt/decrypt/add) plus the
//! standard gadget-decomposition key-switch, rather than a full RNS/leveled
//! CKKS stack. See DESIGN.md for why no off-the-shelf CKKS crate is used.

use rand::RngCore;
use rand_chacha::ChaCha20Rng;
use rand_chacha::rand_core::SeedableRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("ciphertext has wrong ring degree: expected {expected}, got {got}")]
    WrongDegree { expected: usize, got: usize },
    #[error("failed to decode ciphertext: {0}")]
    DecodeFailed(String),
    #[error("failed to encode ciphertext: {0}")]
    EncodeFailed(String),
    #[error("key switch failed: {0}")]
    KeySwitchFailed(String),
}

/// Process-wide homomorphic parameter set, analogous to the Go source's
/// literal `ckks.PN12QP109` preset. Built once and threaded through every
/// constructor; never held as hidden global state.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Params {
    /// Ring degree (coefficients per polynomial).
    pub n: usize,
    /// Ciphertext modulus.
    pub q: u64,
    /// Fixed-point encoding scale (Δ).
    pub scale: f64,
    /// Gadget decomposition digit width, in bits.
    pub base_bits: u32,
    /// Number of gadget digits needed to cover `q`.
    pub num_digits: usize,
    /// Standard deviation bound used for error sampling.
    pub error_bound: i64,
}

impl Params {
    /// The preset used process-wide, modeled after `PN12QP109`: ring degree
    /// 2^12 and a modulus close to a 61-bit prime (one limb of the original
    /// multi-prime `QP109` chain).
    pub fn preset() -> Self {
        let n = 4096;
        let q: u64 = 2_305_843_009_213_693_951; // 2^61 - 1, a Mersenne prime
        let base_bits = 16;
        let num_digits = (64 - q.leading_zeros() as usize).div_ceil(base_bits as usize);
        Params {
            n,
            q,
            scale: (1u64 << 30) as f64,
            base_bits,
            num_digits,
            error_bound: 3,
        }
    }

    pub fn csprng() -> ChaCha20Rng {
        ChaCha20Rng::from_entropy()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poly {
    coeffs: Vec<u64>,
}

impl Poly {
    fn zero(n: usize) -> Self {
        Poly {
            coeffs: vec![0; n],
        }
    }

    fn ternary(params: &Params, rng: &mut impl RngCore) -> Self {
        let mut coeffs = vec![0u64; params.n];
        for c in coeffs.iter_mut() {
            *c = match rng.next_u32() % 3 {
                0 => 0,
                1 => 1,
                _ => params.q - 1,
            };
        }
        Poly { coeffs }
    }

    fn small_error(params: &Params, rng: &mut impl RngCore) -> Self {
        let mut coeffs = vec![0u64; params.n];
        let span = (2 * params.error_bound + 1) as u32;
        for c in coeffs.iter_mut() {
            let e = (rng.next_u32() % span) as i64 - params.error_bound;
            *c = reduce(params.q, e);
        }
        Poly { coeffs }
    }

    fn random_uniform(params: &Params, rng: &mut impl RngCore) -> Self {
        let mut coeffs = vec![0u64; params.n];
        for c in coeffs.iter_mut() {
            *c = rng.next_u64() % params.q;
        }
        Poly { coeffs }
    }

    fn add(&self, other: &Poly, q: u64) -> Poly {
        let coeffs = self
            .coeffs
            .iter()
            .zip(other.coeffs.iter())
            .map(|(a, b)| ((*a as u128 + *b as u128) % q as u128) as u64)
            .collect();
        Poly { coeffs }
    }

    fn sub(&self, other: &Poly, q: u64) -> Poly {
        let coeffs = self
            .coeffs
            .iter()
            .zip(other.coeffs.iter())
            .map(|(a, b)| reduce(q, *a as i64 - *b as i64))
            .collect();
        Poly { coeffs }
    }

    /// Negacyclic convolution mod (x^n + 1, q).
    fn mul(&self, other: &Poly, params: &Params) -> Poly {
        let n = params.n;
        let q = params.q;
        let mut acc = vec![0i128; n];
        for i in 0..n {
            if self.coeffs[i] == 0 {
                continue;
            }
            let a = self.coeffs[i] as i128;
            for j in 0..n {
                if other.coeffs[j] == 0 {
                    continue;
                }
                let b = other.coeffs[j] as i128;
                let idx = i + j;
                let prod = a * b;
                if idx < n {
                    acc[idx] += prod;
                } else {
                    acc[idx - n] -= prod;
                }
            }
        }
        let coeffs = acc
            .into_iter()
            .map(|v| reduce_wide(q, v))
            .collect();
        Poly { coeffs }
    }

    fn scalar_mul_u64(&self, k: u64, q: u64) -> Poly {
        let coeffs = self
            .coeffs
            .iter()
            .map(|c| ((*c as u128 * k as u128) % q as u128) as u64)
            .collect();
        Poly { coeffs }
    }

    /// Scale each coefficient by a real constant, treating the coefficient
    /// as its centered (signed) representative first. Valid because
    /// polynomial multiplication is linear in each operand's coefficients.
    fn scalar_mul_f64(&self, k: f64, q: u64) -> Poly {
        let coeffs = self
            .coeffs
            .iter()
            .map(|c| {
                let centered = center(q, *c) as f64;
                reduce(q, (centered * k).round() as i64)
            })
            .collect();
        Poly { coeffs }
    }

    fn decompose(&self, params: &Params) -> Vec<Poly> {
        let mask = (1u64 << params.base_bits) - 1;
        let mut digits = vec![Poly::zero(params.n); params.num_digits];
        for i in 0..params.n {
            let mut v = self.coeffs[i];
            for digit in digits.iter_mut() {
                digit.coeffs[i] = v & mask;
                v >>= params.base_bits;
            }
        }
        digits
    }
}

fn reduce(q: u64, v: i64) -> u64 {
    let qi = q as i64;
    (((v % qi) + qi) % qi) as u64
}

fn reduce_wide(q: u64, v: i128) -> u64 {
    let qi = q as i128;
    (((v % qi) + qi) % qi) as u64
}

/// Center a residue in `[0, q)` into `(-q/2, q/2]`.
fn center(q: u64, v: u64) -> i64 {
    if v > q / 2 { v as i64 - q as i64 } else { v as i64 }
}

fn encode_scalar(params: &Params, x: f64) -> Poly {
    let mut p = Poly::zero(params.n);
    p.coeffs[0] = reduce(params.q, (x * params.scale).round() as i64);
    p
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublicKey {
    b: Poly,
    a: Poly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretKey {
    s: Poly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RlweCiphertext {
    b: Poly,
    a: Poly,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SwitchingKey {
    digits: Vec<RlweCiphertext>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ciphertext {
    c0: Poly,
    c1: Poly,
}

pub struct KeyGenerator;

impl KeyGenerator {
    pub fn key_pair(params: &Params, rng: &mut impl RngCore) -> (PublicKey, SecretKey) {
        let s = Poly::ternary(params, rng);
        let a = Poly::random_uniform(params, rng);
        let e = Poly::small_error(params, rng);
        let a_s = a.mul(&s, params);
        let b = e.sub(&a_s, params.q);
        (PublicKey { b, a }, SecretKey { s })
    }

    /// Generate `swk(sk_in -> sk_out)`: key material letting anyone
    /// re-encrypt a ciphertext under `sk_in` into one decryptable under
    /// `sk_out`, without learning the plaintext. Must be produced by
    /// someone who holds both secret keys (the client), per the spec's
    /// "switching keys are user-generated" invariant.
    pub fn switching_key(
        params: &Params,
        sk_in: &SecretKey,
        sk_out: &SecretKey,
        rng: &mut impl RngCore,
    ) -> SwitchingKey {
        let mut digits = Vec::with_capacity(params.num_digits);
        let mut w_pow: u64 = 1;
        for _ in 0..params.num_digits {
            let a_j = Poly::random_uniform(params, rng);
            let e_j = Poly::small_error(params, rng);
            let scaled_s_in = sk_in.s.scalar_mul_u64(w_pow % params.q, params.q);
            let a_s_out = a_j.mul(&sk_out.s, params);
            let b_j = e_j.add(&scaled_s_in, params.q).sub(&a_s_out, params.q);
            digits.push(RlweCiphertext { b: b_j, a: a_j });
            w_pow <<= params.base_bits;
        }
        SwitchingKey { digits }
    }
}

/// Encode `x` as a one-slot plaintext at the preset scale and encrypt it
/// under `pk`.
pub fn encrypt(params: &Params, pk: &PublicKey, x: f64, rng: &mut impl RngCore) -> Ciphertext {
    let m = encode_scalar(params, x);
    let u = Poly::ternary(params, rng);
    let e0 = Poly::small_error(params, rng);
    let e1 = Poly::small_error(params, rng);
    let c0 = pk.b.mul(&u, params).add(&e0, params.q).add(&m, params.q);
    let c1 = pk.a.mul(&u, params).add(&e1, params.q);
    Ciphertext { c0, c1 }
}

/// Decrypt and round to cent precision, per the spec's contract that
/// clients may compare decrypted amounts with a 0.01 tolerance.
pub fn decrypt(params: &Params, sk: &SecretKey, ct: &Ciphertext) -> f64 {
    let c1s = ct.c1.mul(&sk.s, params);
    let t = ct.c0.add(&c1s, params.q);
    let raw = center(params.q, t.coeffs[0]);
    round_cents(raw as f64 / params.scale)
}

fn round_cents(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

pub fn ct_add(params: &Params, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
    Ciphertext {
        c0: a.c0.add(&b.c0, params.q),
        c1: a.c1.add(&b.c1, params.q),
    }
}

pub fn ct_scalar_mul(params: &Params, ct: &Ciphertext, k: f64) -> Ciphertext {
    Ciphertext {
        c0: ct.c0.scalar_mul_f64(k, params.q),
        c1: ct.c1.scalar_mul_f64(k, params.q),
    }
}

pub fn ct_add_const(params: &Params, ct: &Ciphertext, k: f64) -> Ciphertext {
    let encoded = encode_scalar(params, k);
    Ciphertext {
        c0: ct.c0.add(&encoded, params.q),
        c1: ct.c1.clone(),
    }
}

pub fn ct_sub(params: &Params, a: &Ciphertext, b: &Ciphertext) -> Ciphertext {
    ct_add(params, a, &ct_scalar_mul(params, b, -1.0))
}

/// Proxy re-encrypt `ct`, switching it from the key implied by `swk`'s
/// input secret key to the key implied by its output secret key.
pub fn key_switch(
    params: &Params,
    ct: &Ciphertext,
    swk: &SwitchingKey,
) -> Result<Ciphertext, CryptoError> {
    if ct.c0.coeffs.len() != params.n {
        return Err(CryptoError::WrongDegree {
            expected: params.n,
            got: ct.c0.coeffs.len(),
        });
    }
    if swk.digits.len() != params.num_digits {
        return Err(CryptoError::KeySwitchFailed(format!(
            "switching key has {} digits, expected {}",
            swk.digits.len(),
            params.num_digits
        )));
    }

    let digits = ct.c1.decompose(params);
    let mut new_c0 = ct.c0.clone();
    let mut new_c1 = Poly::zero(params.n);
    for (digit, rlwe) in digits.iter().zip(swk.digits.iter()) {
        new_c0 = new_c0.add(&digit.mul(&rlwe.b, params), params.q);
        new_c1 = new_c1.add(&digit.mul(&rlwe.a, params), params.q);
    }

    Ok(Ciphertext {
        c0: new_c0,
        c1: new_c1,
    })
}

pub fn encode_ct(ct: &Ciphertext) -> Result<Vec<u8>, CryptoError> {
    bincode::serialize(ct).map_err(|e| CryptoError::EncodeFailed(e.to_string()))
}

pub fn decode_ct(bytes: &[u8]) -> Result<Ciphertext, CryptoError> {
    bincode::deserialize(bytes).map_err(|e| CryptoError::DecodeFailed(e.to_string()))
}

pub fn encode_public_key(pk: &PublicKey) -> Result<Vec<u8>, CryptoError> {
    bincode::serialize(pk).map_err(|e| CryptoError::EncodeFailed(e.to_string()))
}

pub fn decode_public_key(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    bincode::deserialize(bytes).map_err(|e| CryptoError::DecodeFailed(e.to_string()))
}

pub fn encode_secret_key(sk: &SecretKey) -> Result<Vec<u8>, CryptoError> {
    bincode::serialize(sk).map_err(|e| CryptoError::EncodeFailed(e.to_string()))
}

pub fn decode_secret_key(bytes: &[u8]) -> Result<SecretKey, CryptoError> {
    bincode::deserialize(bytes).map_err(|e| CryptoError::DecodeFailed(e.to_string()))
}

pub fn encode_switching_key(swk: &SwitchingKey) -> Result<Vec<u8>, CryptoError> {
    bincode::serialize(swk).map_err(|e| CryptoError::EncodeFailed(e.to_string()))
}

pub fn decode_switching_key(bytes: &[u8]) -> Result<SwitchingKey, CryptoError> {
    bincode::deserialize(bytes).map_err(|e| CryptoError::DecodeFailed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rng() -> ChaCha20Rng {
        ChaCha20Rng::seed_from_u64(42)
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let params = Params::preset();
        let mut r = rng();
        let (pk, sk) = KeyGenerator::key_pair(&params, &mut r);
        for x in [0.0, 1.23, 42.5, 10_000.0] {
            let ct = encrypt(&params, &pk, x, &mut r);
            let got = decrypt(&params, &sk, &ct);
            assert!((got - x).abs() < 0.01, "x={x} got={got}");
        }
    }

    #[test]
    fn homomorphic_addition() {
        let params = Params::preset();
        let mut r = rng();
        let (pk, sk) = KeyGenerator::key_pair(&params, &mut r);
        let a = encrypt(&params, &pk, 30.0, &mut r);
        let b = encrypt(&params, &pk, 12.5, &mut r);
        let sum = ct_add(&params, &a, &b);
        let got = decrypt(&params, &sk, &sum);
        assert!((got - 42.5).abs() < 0.02);
    }

    #[test]
    fn homomorphic_subtraction_via_scalar_mul() {
        let params = Params::preset();
        let mut r = rng();
        let (pk, sk) = KeyGenerator::key_pair(&params, &mut r);
        let a = encrypt(&params, &pk, 100.0, &mut r);
        let b = encrypt(&params, &pk, 42.5, &mut r);
        let diff = ct_add(&params, &a, &ct_scalar_mul(&params, &b, -1.0));
        let got = decrypt(&params, &sk, &diff);
        assert!((got - 57.5).abs() < 0.02);
    }

    #[test]
    fn add_const_matches_plaintext_add() {
        let params = Params::preset();
        let mut r = rng();
        let (pk, sk) = KeyGenerator::key_pair(&params, &mut r);
        let ct = encrypt(&params, &pk, 10.0, &mut r);
        let got = decrypt(&params, &sk, &ct_add_const(&params, &ct, 5.5));
        assert!((got - 15.5).abs() < 0.02);
    }

    #[test]
    fn key_switch_preserves_plaintext() {
        let params = Params::preset();
        let mut r = rng();
        let (pk1, sk1) = KeyGenerator::key_pair(&params, &mut r);
        let (_pk2, sk2) = KeyGenerator::key_pair(&params, &mut r);
        let swk = KeyGenerator::switching_key(&params, &sk1, &sk2, &mut r);

        let ct = encrypt(&params, &pk1, 77.25, &mut r);
        let switched = key_switch(&params, &ct, &swk).expect("key switch");
        let got = decrypt(&params, &sk2, &switched);
        assert!((got - 77.25).abs() < 0.02, "got={got}");
    }

    #[test]
    fn ciphertext_codec_round_trips() {
        let params = Params::preset();
        let mut r = rng();
        let (pk, _sk) = KeyGenerator::key_pair(&params, &mut r);
        let ct = encrypt(&params, &pk, 5.0, &mut r);
        let bytes = encode_ct(&ct).unwrap();
        let decoded = decode_ct(&bytes).unwrap();
        assert_eq!(ct, decoded);
    }

    #[test]
    fn key_switch_rejects_malformed_key() {
        let params = Params::preset();
        let mut r = rng();
        let (pk, _sk) = KeyGenerator::key_pair(&params, &mut r);
        let ct = encrypt(&params, &pk, 1.0, &mut r);
        let bad = SwitchingKey { digits: vec![] };
        assert!(key_switch(&params, &ct, &bad).is_err());
    }
}
