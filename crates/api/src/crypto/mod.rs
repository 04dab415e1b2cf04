pub mod ckks;
pub mod ecdsa;

pub use ckks::CryptoError;
