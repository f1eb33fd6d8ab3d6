//! BN254 scalar field kernel.
//!
//! The arithmetic backend is Arkworks' `ark_bn254::Fr`, which already
//! implements constant-time Montgomery-form reduction, so this module does
//! not reimplement modular arithmetic. Instead it exposes the named
//! operations the interpreter's `bn254fr`/`vbn254fr` host modules and the
//! NTT engine call by name, over the crate's `F` alias, plus the two
//! big-integer <-> field conversions those host modules need.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use crate::F;
use ark_ff::{BigInteger, Field as _, FftField, PrimeField, UniformRand};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    #[error("element is not invertible (it is zero)")]
    NotInvertible,
    #[error("value does not fit in the field's canonical 256-bit representation")]
    OutOfRange,
}

#[inline]
pub fn reduce(bytes_le: &[u8]) -> F {
    F::from_le_bytes_mod_order(bytes_le)
}

#[inline]
pub fn add(a: F, b: F) -> F {
    a + b
}

#[inline]
pub fn sub(a: F, b: F) -> F {
    a - b
}

#[inline]
pub fn mul(a: F, b: F) -> F {
    a * b
}

/// Montgomery multiplication. Arkworks stores `Fr` in Montgomery form
/// internally and its `Mul` impl already performs Montgomery reduction; this
/// is named separately so the host-module dispatch table can expose it under
/// the `bn254fr.mont_mul` import name used by guest programs.
#[inline]
pub fn mont_mul(a: F, b: F) -> F {
    a * b
}

pub fn invmod_r(a: F) -> Result<F, FieldError> {
    a.inverse().ok_or(FieldError::NotInvertible)
}

pub fn invmod(a: F) -> F {
    invmod_r(a).expect("invmod: element is zero")
}

#[inline]
pub fn powmod(base: F, exp: F) -> F {
    let exp_bigint = exp.into_bigint();
    base.pow(exp_bigint)
}

#[inline]
pub fn powm_ui(base: F, exp: u64) -> F {
    base.pow([exp])
}

/// Returns the subgroup generator `omega` of a multiplicative subgroup of
/// size `n` (must be a power of two dividing `p - 1`), by raising the field's
/// two-adic root of unity to the appropriate power.
pub fn generate_omega(n: usize) -> Result<F, FieldError> {
    if n == 0 || !n.is_power_of_two() {
        return Err(FieldError::OutOfRange);
    }
    F::get_root_of_unity(n as u64).ok_or(FieldError::OutOfRange)
}

/// Convenience helper used by test fixtures and the witness manager's
/// deterministic-policy mode; samples a uniformly random field element.
pub fn random<R: rand::Rng + ?Sized>(rng: &mut R) -> F {
    F::rand(rng)
}

/// Converts a field element to its canonical little-endian byte encoding
/// (32 bytes for BN254's `Fr`).
pub fn to_bytes_le(a: &F) -> [u8; 32] {
    let mut out = [0u8; 32];
    let bytes = a.into_bigint().to_bytes_le();
    out[..bytes.len()].copy_from_slice(&bytes);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_sub_roundtrip() {
        let a = F::from(7u64);
        let b = F::from(11u64);
        assert_eq!(sub(add(a, b), b), a);
    }

    #[test]
    fn invmod_roundtrip() {
        let a = F::from(42u64);
        let inv = invmod(a);
        assert_eq!(mul(a, inv), F::from(1u64));
    }

    #[test]
    fn invmod_zero_errs() {
        assert_eq!(invmod_r(F::from(0u64)), Err(FieldError::NotInvertible));
    }

    #[test]
    fn powm_ui_matches_repeated_mul() {
        let a = F::from(3u64);
        let mut expect = F::from(1u64);
        for _ in 0..5 {
            expect = mul(expect, a);
        }
        assert_eq!(powm_ui(a, 5), expect);
    }
}
