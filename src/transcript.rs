//! Fiat–Shamir transcript with domain separation.
//!
//! A deterministic, label-stable Fiat-Shamir transform over BLAKE3, carried
//! over from the crate's original PLONK transcript: explicit domain
//! separation tags, length-delimited absorbs, and clone-before-challenge XOF
//! derivation so deriving a challenge never mutates the absorb state. Labels
//! are relabeled for this protocol's absorb schedule (Merkle root, sample
//! seed, code/linear/quadratic rows) instead of `(β, γ, α)`.
//!
//! ```
//! use ligero_wasm_iop::transcript::{Transcript, FsLabel};
//!
//! let mut t1 = Transcript::new("example");
//! t1.absorb_bytes_l(FsLabel::MerkleRoot, b"root");
//! let a = t1.challenge_f_l(FsLabel::SampleSeed);
//!
//! let mut t2 = Transcript::new("example");
//! t2.absorb_bytes_l(FsLabel::CodeRow, b"root");
//! let b = t2.challenge_f_l(FsLabel::SampleSeed);
//!
//! assert_ne!(a, b);
//! ```

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use ark_ff::PrimeField;
use ark_serialize::CanonicalSerialize;
use blake3::Hasher;
use std::io::Read;

use crate::F;

/// Canonical labels for this protocol's absorb/challenge schedule.
#[derive(Clone, Copy, Debug)]
pub enum FsLabel {
    ProtocolHeader,
    MerkleRoot,
    SampleSeed,
    CodeRow,
    LinearRow,
    QuadraticRow,
    ColumnIndices,
    PublicInputs,
}

impl FsLabel {
    #[inline]
    pub fn as_str(&self) -> &'static str {
        match self {
            FsLabel::ProtocolHeader => "protocol_header",
            FsLabel::MerkleRoot => "merkle_root",
            FsLabel::SampleSeed => "sample_seed",
            FsLabel::CodeRow => "code_row",
            FsLabel::LinearRow => "linear_row",
            FsLabel::QuadraticRow => "quadratic_row",
            FsLabel::ColumnIndices => "column_indices",
            FsLabel::PublicInputs => "public_inputs",
        }
    }
}

/// Fiat-Shamir transcript with domain separation (BLAKE3-based).
pub struct Transcript {
    label: &'static str,
    hasher: Hasher,
    ctr: u64,
}

impl Transcript {
    /// Creates a new transcript with a domain-separation `label`.
    pub fn new(label: &'static str) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(b"LigeroWasmIOP.transcript.v1");
        hasher.update(label.as_bytes());
        Self { label, hasher, ctr: 0 }
    }

    #[inline]
    pub fn absorb_digest_l(&mut self, label: FsLabel, d: &crate::hash::Digest32) {
        self.absorb_bytes_l(label, d)
    }

    #[inline]
    pub fn absorb_bytes_l(&mut self, label: FsLabel, bytes: &[u8]) {
        self.absorb_bytes(label.as_str(), bytes)
    }

    pub fn absorb_bytes(&mut self, label: &'static str, bytes: &[u8]) {
        self.hasher.update(b"item:");
        self.hasher.update(label.as_bytes());
        self.hasher.update(b":len:");
        self.hasher.update(&(bytes.len() as u64).to_be_bytes());
        self.hasher.update(b":data:");
        self.hasher.update(bytes);
    }

    #[inline]
    pub fn absorb_scalar_l(&mut self, label: FsLabel, f: &F) {
        let mut bytes = Vec::new();
        f.serialize_compressed(&mut bytes).expect("serialize field");
        self.absorb_bytes_l(label, &bytes);
    }

    #[inline]
    pub fn absorb_scalars_l(&mut self, label: FsLabel, fs: &[F]) {
        let mut buf = Vec::with_capacity(8 + fs.len() * 32);
        buf.extend_from_slice(&(fs.len() as u64).to_be_bytes());
        for f in fs {
            f.serialize_compressed(&mut buf).expect("serialize field");
        }
        self.absorb_bytes_l(label, &buf);
    }

    #[inline]
    pub fn absorb_counter_l(&mut self, label: FsLabel, ctr: u64) {
        self.absorb_bytes(label.as_str(), &ctr.to_be_bytes());
    }

    /// Derives a single field challenge (enum label).
    #[inline]
    pub fn challenge_f_l(&mut self, label: FsLabel) -> F {
        let out = hash_to_field(&self.hasher, self.label, label.as_str(), self.ctr, 1);
        self.ctr = self.ctr.wrapping_add(1);
        out[0]
    }

    /// Derives `k` field challenges (enum label).
    #[inline]
    pub fn challenge_points_l(&mut self, label: FsLabel, k: usize) -> Vec<F> {
        let out = hash_to_field(&self.hasher, self.label, label.as_str(), self.ctr, k);
        self.ctr = self.ctr.wrapping_add(1);
        out
    }

    /// Derives `count` distinct column indices in `0..range` for the sampling
    /// phase of the verifier's spot-check, rejection-sampling duplicates out
    /// of a single XOF stream keyed by `label`.
    pub fn challenge_indices_l(&mut self, label: FsLabel, range: usize, count: usize) -> Vec<usize> {
        assert!(count <= range, "cannot sample more distinct indices than the range holds");
        let mut h = self.hasher.clone();
        h.update(b"indices:");
        h.update(label.as_str().as_bytes());
        h.update(&self.ctr.to_be_bytes());
        self.ctr = self.ctr.wrapping_add(1);
        let mut xof = h.finalize_xof();

        let mut seen = std::collections::HashSet::with_capacity(count);
        let mut out = Vec::with_capacity(count);
        let mut buf = [0u8; 8];
        while out.len() < count {
            let _ = xof.read(&mut buf);
            let idx = (u64::from_le_bytes(buf) as usize) % range;
            if seen.insert(idx) {
                out.push(idx);
            }
        }
        out
    }
}

fn hash_to_field(base: &Hasher, tlabel: &'static str, label: &'static str, ctr: u64, k: usize) -> Vec<F> {
    let mut h = base.clone();
    h.update(b"challenge:");
    h.update(b"LigeroWasmIOP.v1");
    h.update(b":tlabel:");
    h.update(tlabel.as_bytes());
    h.update(b":label:");
    h.update(label.as_bytes());
    h.update(b":ctr:");
    h.update(&ctr.to_be_bytes());

    let mut xof = h.finalize_xof();
    let mut out = Vec::with_capacity(k);
    let mut buf = [0u8; 64];
    for _ in 0..k {
        let _ = xof.read(&mut buf);
        out.push(F::from_le_bytes_mod_order(&buf));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distinct_labels_diverge() {
        let mut t1 = Transcript::new("t");
        t1.absorb_bytes_l(FsLabel::MerkleRoot, b"x");
        let a = t1.challenge_f_l(FsLabel::SampleSeed);

        let mut t2 = Transcript::new("t");
        t2.absorb_bytes_l(FsLabel::CodeRow, b"x");
        let b = t2.challenge_f_l(FsLabel::SampleSeed);
        assert_ne!(a, b);
    }

    #[test]
    fn same_absorb_schedule_reproduces_challenge() {
        let mut t1 = Transcript::new("t");
        t1.absorb_counter_l(FsLabel::ColumnIndices, 42);
        let a = t1.challenge_f_l(FsLabel::SampleSeed);

        let mut t2 = Transcript::new("t");
        t2.absorb_counter_l(FsLabel::ColumnIndices, 42);
        let b = t2.challenge_f_l(FsLabel::SampleSeed);
        assert_eq!(a, b);
    }

    #[test]
    fn challenge_indices_are_distinct_and_in_range() {
        let mut t = Transcript::new("t");
        let idxs = t.challenge_indices_l(FsLabel::SampleSeed, 100, 20);
        assert_eq!(idxs.len(), 20);
        let unique: std::collections::HashSet<_> = idxs.iter().collect();
        assert_eq!(unique.len(), 20);
        assert!(idxs.iter().all(|&i| i < 100));
    }
}
