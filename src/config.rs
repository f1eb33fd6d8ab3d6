//! CLI configuration schema.
//!
//! Both `prove` and `verify` take a single JSON document on the command
//! line (or `--config <path>`), matching the source project's own
//! single-document CLI contract rather than a sprawling flag surface.

#![allow(missing_docs)]

use crate::error::ConfigError;
use crate::host::GuestContext;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::PathBuf;

fn default_packing() -> usize {
    crate::witness::DEFAULT_ROW_SIZE
}

/// Arguments shared by `prove`/`verify`: which guest program to run/check
/// and how it should be packed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunConfig {
    /// Path to a `.wasm` or `.wat` guest program.
    pub program: PathBuf,
    /// Guest-visible CLI arguments (becomes argv-equivalent private input).
    #[serde(default)]
    pub args: Vec<String>,
    /// Indices of `args` that must stay private (not absorbed into the
    /// public-input transcript entry).
    #[serde(default)]
    pub private_indices: Vec<usize>,
    /// Row-packing width `k`; must be a power of two greater than the fixed
    /// 192-column sample size.
    #[serde(default = "default_packing")]
    pub packing: usize,
    /// Number of worker threads dispatching GPU work (0 disables the GPU
    /// path even if the `gpu` feature is compiled in).
    #[serde(default)]
    pub gpu_threads: usize,
    /// Path to an externally supplied WGSL shader module.
    #[serde(default)]
    pub shader_path: Option<String>,
    /// `trace`/`debug`/`info`/`warn`/`error`, forwarded to
    /// `tracing_subscriber::EnvFilter`.
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Output path for the produced/consumed proof.
    pub proof_path: PathBuf,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl RunConfig {
    pub fn from_json(s: &str) -> Result<Self, ConfigError> {
        serde_json::from_str(s).map_err(|e| ConfigError::InvalidJson(e.to_string()))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.packing.is_power_of_two() || self.packing <= crate::witness::SAMPLE_SIZE {
            return Err(ConfigError::BadPacking { got: self.packing });
        }
        for &idx in &self.private_indices {
            if idx >= self.args.len() {
                return Err(ConfigError::BadArgument(format!(
                    "private_indices entry {idx} is out of range for {} args",
                    self.args.len()
                )));
            }
        }
        Ok(())
    }

    fn private_set(&self) -> HashSet<usize> {
        self.private_indices.iter().copied().collect()
    }

    /// Builds the full prover-side guest context: every `args` entry present
    /// as its raw UTF-8 bytes, `private_indices` marked private, seeded from
    /// `seed`.
    pub fn to_guest_context(&self, seed: [u8; 32]) -> GuestContext {
        let args = self.args.iter().map(|a| a.as_bytes().to_vec()).collect();
        GuestContext::new(args, self.private_set(), Vec::new(), seed)
    }

    /// Builds the restricted, public-only guest context a verifier replays
    /// with: private arguments keep their real length (needed so the
    /// replay's element counts can still match the prover's) but their bytes
    /// are zeroed, since the verifier must never see real secret input.
    pub fn to_public_guest_context(&self) -> GuestContext {
        let private = self.private_set();
        let args = self
            .args
            .iter()
            .enumerate()
            .map(|(i, a)| if private.contains(&i) { vec![0u8; a.len()] } else { a.as_bytes().to_vec() })
            .collect();
        GuestContext::new(args, private, Vec::new(), [0u8; 32])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_json() {
        let json = r#"{"program": "demo.wasm", "proof_path": "out.proof"}"#;
        let cfg = RunConfig::from_json(json).unwrap();
        assert_eq!(cfg.packing, crate::witness::DEFAULT_ROW_SIZE);
        assert_eq!(cfg.log_level, "info");
        cfg.validate().unwrap();
    }

    #[test]
    fn rejects_bad_packing() {
        let json = r#"{"program": "demo.wasm", "proof_path": "out.proof", "packing": 100}"#;
        let cfg = RunConfig::from_json(json).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_private_index() {
        let json = r#"{"program": "demo.wasm", "proof_path": "out.proof", "args": ["a"], "private_indices": [5]}"#;
        let cfg = RunConfig::from_json(json).unwrap();
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn public_guest_context_zeroes_private_bytes_but_keeps_length() {
        let json = r#"{"program": "demo.wasm", "proof_path": "out.proof", "args": ["visible", "secret"], "private_indices": [1]}"#;
        let cfg = RunConfig::from_json(json).unwrap();
        let full = cfg.to_guest_context([9u8; 32]);
        let public = cfg.to_public_guest_context();
        assert_eq!(full.args[1], b"secret".to_vec());
        assert_eq!(public.args[1], vec![0u8; 6]);
        assert_eq!(public.args[0], b"visible".to_vec());
        assert!(public.is_private(1));
    }
}
