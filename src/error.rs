//! Crate-wide error taxonomy.
//!
//! Four kinds of failure are distinguished, matching the execution model: a
//! [`Trap`] aborts interpretation mid-program, a [`ProofRejection`] is raised
//! by the verifier when a check fails, a [`ConfigError`] is raised before any
//! execution begins (malformed CLI JSON, bad packing width, …), and a
//! [`ResourceError`] covers GPU adapter/device loss. Each module that can fail
//! defines its own narrow `thiserror` enum; this module aggregates them behind
//! one crate-level error so the binaries can use a single `anyhow::Result`.

#![allow(missing_docs)]

use thiserror::Error;

/// Reasons the interpreter can trap.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TrapKind {
    #[error("unreachable instruction executed")]
    Unreachable,
    #[error("integer division by zero")]
    DivideByZero,
    #[error("integer overflow")]
    IntegerOverflow,
    #[error("out-of-bounds memory access at {addr} (len {len})")]
    MemoryOutOfBounds { addr: u64, len: u64 },
    #[error("out-of-bounds table access at index {index}")]
    TableOutOfBounds { index: u32 },
    #[error("call stack exhausted")]
    StackOverflow,
    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,
    #[error("undefined element in table")]
    UninitializedElement,
    #[error("value stack underflow")]
    StackUnderflow,
    #[error("host function `{module}.{name}` not found")]
    UnresolvedImport { module: String, name: String },
    #[error("assertion failed: {0}")]
    AssertionFailed(String),
    #[error("{0}")]
    Other(String),
}

/// Execution-time failure, fatal to the current run.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("trap: {kind}")]
pub struct Trap {
    pub kind: TrapKind,
}

impl Trap {
    pub fn new(kind: TrapKind) -> Self {
        Self { kind }
    }
}

/// Verifier-side rejection. Carries enough context for diagnostics without
/// leaking the witness.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProofRejection {
    #[error("merkle decommitment does not recompute to the committed root")]
    RootMismatch,
    #[error("codeword at sampled column {0} is not a valid Reed-Solomon codeword")]
    BadCodeword(usize),
    #[error("linear-test relation failed at row {0}")]
    LinearTestFailed(usize),
    #[error("quadratic-test relation failed at row {0}")]
    QuadraticTestFailed(usize),
    #[error("public-input row does not match claimed public inputs")]
    PublicInputMismatch,
    #[error("proof stream is malformed: {0}")]
    Malformed(String),
    #[error("transcript replay diverged from the proof's recorded challenges")]
    TranscriptMismatch,
}

/// Startup-time configuration failure (CLI JSON, packing width, program load).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid CLI JSON: {0}")]
    InvalidJson(String),
    #[error("packing width `k` must be a power of two greater than {sample_size}, got {got}", sample_size = crate::witness::SAMPLE_SIZE)]
    BadPacking { got: usize },
    #[error("program file `{0}` could not be read")]
    ProgramUnreadable(String),
    #[error("program could not be decoded: {0}")]
    DecodeFailed(String),
    #[error("argument `{0}` has an unsupported shape")]
    BadArgument(String),
}

/// GPU adapter/device failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    #[error("no compatible GPU adapter found")]
    NoAdapter,
    #[error("GPU device request failed: {0}")]
    DeviceRequestFailed(String),
    #[error("GPU device was lost: {0}")]
    DeviceLost(String),
    #[error("shader module at `{0}` failed to compile")]
    BadShader(String),
}

/// Crate-level aggregate error surfacing to the CLI binaries.
#[derive(Error, Debug)]
pub enum LigeroError {
    #[error(transparent)]
    Trap(#[from] Trap),
    #[error(transparent)]
    ProofRejection(#[from] ProofRejection),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Resource(#[from] ResourceError),
    #[error(transparent)]
    Stream(#[from] crate::stream::StreamError),
}
