//! Crate root: public surface, core aliases, and protocol-wide invariants.
//!
//! This module is the single canonical entry point. It centralizes the
//! scalar field alias and re-exports the submodules that implement the
//! WASM-interpreter-backed Reed-Solomon/Merkle proof system: a guest program
//! is executed under [`interp`], every value that becomes part of the
//! committed trace is tracked by [`witness`], rows of that trace are
//! Reed-Solomon encoded by [`ntt`] and column-committed by [`hash`], and
//! [`zkp`] drives the Fiat-Shamir-sampled consistency check that makes the
//! whole thing a proof rather than a transcript.
//!
//! ## Invariants
//!
//! - **Field.** The scalar field is `ark_bn254::Fr` (`F` in this crate). All
//!   arithmetic is constant-time as provided by Arkworks; this crate
//!   forbids unsafe throughout.
//! - **Packing.** Row width `l = k - 192` (192 sampled columns is fixed);
//!   encoding width `n = 4k`. `k` must be a power of two.
//! - **Fiat-Shamir.** BLAKE3 with explicit domain-separation labels,
//!   length-delimited absorbs, and an XOF to derive challenges. Prover and
//!   verifier must replay the exact same absorb/challenge sequence.
//! - **Streaming discipline.** Row-at-a-time column hashing keeps peak
//!   memory bounded independent of the number of committed rows.
//!
//! Failures are precise errors (see [`error`]), never UB.

#![forbid(unsafe_code)]
#![deny(missing_docs, rust_2018_idioms)]

/// 256-bit big-integer kernel backing the `uint256.*` host imports.
pub mod bigint;
/// CLI configuration schema shared by the `prove`/`verify` binaries.
pub mod config;
/// WASM binary/text decoding into a structured instruction tree.
pub mod decode;
/// Crate-wide error taxonomy.
pub mod error;
/// BN254 scalar field kernel.
pub mod field;
/// GPU device abstraction (CPU fallback always available).
pub mod gpu;
/// Hash & Merkle layer.
pub mod hash;
/// Host module dispatch (`env`, `bn254fr`, `vbn254fr`, `uint256`, WASI subset).
pub mod host;
/// WASM interpreter: value stack, module store, tree-walking executor.
pub mod interp;
/// Elementwise & NTT engine (row Reed-Solomon encoding).
pub mod ntt;
/// Streaming/blocking utilities and O(b_blk) workspace.
pub mod stream;
/// Fiat-Shamir transcript (domain-separated hashing, hash-to-field).
pub mod transcript;
/// Witness manager: arena of committed trace values.
pub mod witness;
/// ZKP context: proof construction and verification.
pub mod zkp;

// ============================================================================
// Canonical aliases and root-level re-exports
// ============================================================================

/// Scalar field used across the crate (BN254).
pub type F = ark_bn254::Fr;

/// Security parameter λ (number of spot-checked columns is derived from this
/// via [`witness::SAMPLE_SIZE`] rather than hardwired here).
pub const SECURITY_LAMBDA: usize = 128;

/// Centralized index newtypes used by the streaming layer, re-exported at
/// the crate root so downstream code can `use ligero_wasm_iop::{BlockIdx, RowIdx, RegIdx};`.
pub use crate::stream::{BlockIdx, RegIdx, RowIdx};

/// Streaming/shape errors shared by helpers across modules.
pub use crate::stream::StreamError;

pub use crate::error::LigeroError;
pub use crate::zkp::{Proof, ProofHeader, ProverConfig, StreamProof, ZkpContext};
