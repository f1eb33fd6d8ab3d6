//! Witness manager.
//!
//! Tracks every value that becomes part of the committed trace: a pool of
//! [`WitnessSlot`]s (value + per-execution randomness) and [`QuadraticSlot`]s
//! that group three witnesses participating in one quadratic constraint.
//! Reproduces `zkp/backend/lazy_witness.hpp`'s `commit_status` state machine,
//! but as an arena of `u32` indices rather than a graph of raw pointers (see
//! the REDESIGN FLAGS in the source spec), which keeps the manager `Send` and
//! lets the prover own it without lifetime gymnastics.

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use crate::F;
use aes::Aes256;
use ctr::cipher::{KeyIvInit, StreamCipher};
use thiserror::Error;

type Aes256Ctr = ctr::Ctr128BE<Aes256>;

/// Default row-packing width `k` from the original prover's `params.hpp`.
pub const DEFAULT_ROW_SIZE: usize = 8192;
/// Number of sampled columns opened during verification.
pub const SAMPLE_SIZE: usize = 192;
/// Packing width `l = k - sample_size`.
pub const fn packing_size(k: usize) -> usize {
    k - SAMPLE_SIZE
}
/// Encoding width `n = 4k`.
pub const fn encoding_size(k: usize) -> usize {
    k * 4
}

/// Distinct 16-byte IVs per PRG stream, carried verbatim from `params.hpp`
/// (values are insignificant under AES-CTR; only distinctness matters).
pub mod iv {
    pub const CODE: [u8; 16] = [0u8; 16];
    pub const COMMIT: [u8; 16] = {
        let mut v = [0u8; 16];
        v[0] = 1;
        v
    };
    pub const LINEAR: [u8; 16] = {
        let mut v = [0u8; 16];
        v[0] = 2;
        v
    };
    pub const QUADRATIC: [u8; 16] = {
        let mut v = [0u8; 16];
        v[0] = 3;
        v
    };
    pub const RAM: [u8; 16] = {
        let mut v = [0u8; 16];
        v[0] = b'R';
        v[1] = b'A';
        v[2] = b'M';
        v
    };
    pub const ANY: [u8; 16] = [0u8; 16];
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WitnessError {
    #[error("witness slot index {0} out of bounds")]
    BadSlot(u32),
    #[error("quadratic slot index {0} out of bounds")]
    BadQuadraticSlot(u32),
    #[error("quadratic slot offset must be 0, 1, or 2, got {0}")]
    BadOffset(u8),
}

/// Result of notifying a witness that its value has been committed, mirroring
/// `commit_status` in the original backend exactly.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommitStatus {
    NotAWitness,
    LinearReady,
    QuadraticPending,
    QuadraticReady,
}

/// A single arena-indexed witness: a field value plus the randomness mask
/// used to blind it in the committed row.
#[derive(Clone, Copy, Debug)]
pub struct WitnessSlot {
    value: F,
    randomness: F,
    is_witness: bool,
    slot: Option<(u32, u8)>,
}

impl WitnessSlot {
    fn empty() -> Self {
        Self { value: F::from(0u64), randomness: F::from(0u64), is_witness: false, slot: None }
    }

    pub fn val(&self) -> F {
        self.value
    }

    pub fn randomness(&self) -> F {
        self.randomness
    }
}

/// Three witness references bound to one quadratic gate, with a ready bit per
/// leg; `mark_ready` returns whether all three legs are now present.
#[derive(Clone, Copy, Debug, Default)]
pub struct QuadraticSlot {
    witnesses: [Option<u32>; 3],
    ready: [bool; 3],
}

impl QuadraticSlot {
    pub fn is_ready(&self) -> bool {
        self.ready.iter().all(|&r| r)
    }

    fn mark_ready(&mut self, offset: u8) -> Result<bool, WitnessError> {
        let idx = offset as usize;
        if idx >= 3 {
            return Err(WitnessError::BadOffset(offset));
        }
        self.ready[idx] = true;
        Ok(self.is_ready())
    }
}

/// Owns every witness and quadratic slot allocated during one execution,
/// plus the AES-256-CTR randomness streams used to blind them, and the two
/// constraint streams (§3 "linear"/"quadratic" rows) that host-module
/// assertions append to. `code_row`'s entries are the witness values
/// themselves (§4.5 `row_buffer`'s first of three parallel vectors); this
/// type supplies the other two.
pub struct WitnessManager {
    slots: Vec<WitnessSlot>,
    quadratic: Vec<QuadraticSlot>,
    linear_rng: Aes256Ctr,
    quadratic_rng: Aes256Ctr,
    /// Residuals appended by `assert_*`/`_checked` host ops; each entry must
    /// equal zero for the guest's claimed algebraic relations to hold.
    linear_terms: Vec<F>,
    /// `a*b - c` residuals for every quadratic triple that became ready.
    quadratic_terms: Vec<F>,
}

impl WitnessManager {
    /// `seed` is the master key for this execution's AES-256-CTR randomness;
    /// the linear and quadratic streams are derived from it with distinct IVs
    /// (`ivl`, `ivq`) so the two pools never share a keystream position.
    pub fn new(seed: [u8; 32]) -> Self {
        Self {
            slots: Vec::new(),
            quadratic: Vec::new(),
            linear_rng: Aes256Ctr::new(&seed.into(), &iv::LINEAR.into()),
            quadratic_rng: Aes256Ctr::new(&seed.into(), &iv::QUADRATIC.into()),
            linear_terms: Vec::new(),
            quadratic_terms: Vec::new(),
        }
    }

    /// Allocates a new witness slot holding `value`, masked with the next
    /// draw from the linear randomness stream.
    pub fn acquire_witness(&mut self, value: F) -> u32 {
        let randomness = draw_field(&mut self.linear_rng);
        let idx = self.slots.len() as u32;
        self.slots.push(WitnessSlot { value, randomness, is_witness: true, slot: None });
        idx
    }

    /// Allocates a quadratic slot (three witness legs), drawing the blinding
    /// randomness for each leg from the quadratic stream.
    pub fn acquire_quadratic_slot(&mut self) -> u32 {
        let idx = self.quadratic.len() as u32;
        self.quadratic.push(QuadraticSlot::default());
        idx
    }

    pub fn bind_quadratic_leg(
        &mut self,
        quad_idx: u32,
        offset: u8,
        witness_idx: u32,
    ) -> Result<(), WitnessError> {
        let quad = self
            .quadratic
            .get_mut(quad_idx as usize)
            .ok_or(WitnessError::BadQuadraticSlot(quad_idx))?;
        if offset >= 3 {
            return Err(WitnessError::BadOffset(offset));
        }
        quad.witnesses[offset as usize] = Some(witness_idx);
        let slot = self.slots.get_mut(witness_idx as usize).ok_or(WitnessError::BadSlot(witness_idx))?;
        slot.slot = Some((quad_idx, offset));
        Ok(())
    }

    /// Draws a fresh quadratic-randomness mask from the quadratic stream;
    /// used when committing a quadratic row's three legs together.
    pub fn draw_quadratic_randomness(&mut self) -> F {
        draw_field(&mut self.quadratic_rng)
    }

    pub fn slot(&self, idx: u32) -> Result<&WitnessSlot, WitnessError> {
        self.slots.get(idx as usize).ok_or(WitnessError::BadSlot(idx))
    }

    pub fn slot_mut(&mut self, idx: u32) -> Result<&mut WitnessSlot, WitnessError> {
        self.slots.get_mut(idx as usize).ok_or(WitnessError::BadSlot(idx))
    }

    /// Notifies the manager that `idx`'s row has been committed, mirroring
    /// `lazy_witness::commit_notify`. When the notification completes a
    /// quadratic triple (all three legs committed), the `a*b - c` residual
    /// is computed immediately and appended to the quadratic row stream.
    pub fn commit_notify(&mut self, idx: u32) -> Result<CommitStatus, WitnessError> {
        let slot = self.slot(idx)?;
        if !slot.is_witness {
            return Ok(CommitStatus::NotAWitness);
        }
        match slot.slot {
            None => Ok(CommitStatus::LinearReady),
            Some((quad_idx, offset)) => {
                let quad = self
                    .quadratic
                    .get_mut(quad_idx as usize)
                    .ok_or(WitnessError::BadQuadraticSlot(quad_idx))?;
                if quad.mark_ready(offset)? {
                    let legs = quad.witnesses;
                    let (a, b, c) = match legs {
                        [Some(a), Some(b), Some(c)] => (a, b, c),
                        _ => unreachable!("mark_ready only returns true once all three legs are bound"),
                    };
                    let residual = self.slot(a)?.val() * self.slot(b)?.val() - self.slot(c)?.val();
                    self.quadratic_terms.push(residual);
                    Ok(CommitStatus::QuadraticReady)
                } else {
                    Ok(CommitStatus::QuadraticPending)
                }
            }
        }
    }

    /// Appends a residual to the linear constraint stream; callers (the
    /// `assert_*`/`_checked` host ops) push a value that must equal zero for
    /// the relation it encodes to hold.
    pub fn push_linear_term(&mut self, residual: F) {
        self.linear_terms.push(residual);
    }

    pub fn linear_terms(&self) -> &[F] {
        &self.linear_terms
    }

    pub fn quadratic_terms(&self) -> &[F] {
        &self.quadratic_terms
    }

    pub fn reset_slot(&mut self, idx: u32) -> Result<(), WitnessError> {
        let slot = self.slots.get_mut(idx as usize).ok_or(WitnessError::BadSlot(idx))?;
        *slot = WitnessSlot::empty();
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn draw_field(rng: &mut Aes256Ctr) -> F {
    let mut buf = [0u8; 32];
    rng.apply_keystream(&mut buf);
    crate::field::reduce(&buf)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_witness_is_ready_immediately() {
        let mut mgr = WitnessManager::new([7u8; 32]);
        let w = mgr.acquire_witness(F::from(5u64));
        assert_eq!(mgr.commit_notify(w).unwrap(), CommitStatus::LinearReady);
    }

    #[test]
    fn quadratic_slot_ready_only_after_all_three_legs() {
        let mut mgr = WitnessManager::new([9u8; 32]);
        let quad = mgr.acquire_quadratic_slot();
        let legs: Vec<u32> = (0..3).map(|_| mgr.acquire_witness(F::from(1u64))).collect();
        for (offset, &w) in legs.iter().enumerate() {
            mgr.bind_quadratic_leg(quad, offset as u8, w).unwrap();
        }
        assert_eq!(mgr.commit_notify(legs[0]).unwrap(), CommitStatus::QuadraticPending);
        assert_eq!(mgr.commit_notify(legs[1]).unwrap(), CommitStatus::QuadraticPending);
        assert_eq!(mgr.commit_notify(legs[2]).unwrap(), CommitStatus::QuadraticReady);
        assert_eq!(mgr.quadratic_terms(), &[F::from(0u64)]);
    }

    #[test]
    fn quadratic_term_is_nonzero_residual_when_triple_is_inconsistent() {
        let mut mgr = WitnessManager::new([3u8; 32]);
        let quad = mgr.acquire_quadratic_slot();
        let a = mgr.acquire_witness(F::from(2u64));
        let b = mgr.acquire_witness(F::from(3u64));
        let c = mgr.acquire_witness(F::from(100u64)); // should be 6, not 100
        mgr.bind_quadratic_leg(quad, 0, a).unwrap();
        mgr.bind_quadratic_leg(quad, 1, b).unwrap();
        mgr.bind_quadratic_leg(quad, 2, c).unwrap();
        mgr.commit_notify(a).unwrap();
        mgr.commit_notify(b).unwrap();
        mgr.commit_notify(c).unwrap();
        assert_eq!(mgr.quadratic_terms(), &[F::from(2u64) * F::from(3u64) - F::from(100u64)]);
    }

    #[test]
    fn push_linear_term_accumulates() {
        let mut mgr = WitnessManager::new([4u8; 32]);
        mgr.push_linear_term(F::from(0u64));
        mgr.push_linear_term(F::from(5u64));
        assert_eq!(mgr.linear_terms(), &[F::from(0u64), F::from(5u64)]);
    }

    #[test]
    fn randomness_streams_are_deterministic_given_seed() {
        let mut a = WitnessManager::new([1u8; 32]);
        let mut b = WitnessManager::new([1u8; 32]);
        let wa = a.acquire_witness(F::from(42u64));
        let wb = b.acquire_witness(F::from(42u64));
        assert_eq!(a.slot(wa).unwrap().randomness(), b.slot(wb).unwrap().randomness());
    }

    #[test]
    fn bad_slot_index_errs() {
        let mgr = WitnessManager::new([0u8; 32]);
        assert_eq!(mgr.slot(0), Err(WitnessError::BadSlot(0)));
    }
}
