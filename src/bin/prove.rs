//! `prove` — runs a guest program under the WASM interpreter, committing its
//! arithmetic trace and producing a Reed-Solomon/Merkle proof.
//!
//! Takes a single JSON document, either inline as the first argument or via
//! `--config <path>`, matching [`ligero_wasm_iop::config::RunConfig`].

#![forbid(unsafe_code)]

use ligero_wasm_iop::config::RunConfig;
use ligero_wasm_iop::decode;
use ligero_wasm_iop::zkp::{ProverConfig, ZkpContext};
use std::fs;

fn load_config() -> anyhow::Result<RunConfig> {
    let mut args = std::env::args().skip(1);
    let first = args.next().ok_or_else(|| anyhow::anyhow!("usage: prove <json> | prove --config <path>"))?;
    let json = if first == "--config" {
        let path = args.next().ok_or_else(|| anyhow::anyhow!("--config requires a path"))?;
        fs::read_to_string(&path).map_err(|e| anyhow::anyhow!("reading {path}: {e}"))?
    } else {
        first
    };
    Ok(RunConfig::from_json(&json)?)
}

fn main() -> anyhow::Result<()> {
    let config = load_config()?;

    let filter = tracing_subscriber::EnvFilter::try_new(&config.log_level)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).json().init();

    config.validate()?;

    let bytes = fs::read(&config.program)
        .map_err(|_| ligero_wasm_iop::error::ConfigError::ProgramUnreadable(config.program.display().to_string()))?;
    let program = decode::decode_program(&bytes)
        .map_err(|e| ligero_wasm_iop::error::ConfigError::DecodeFailed(e.to_string()))?;

    tracing::info!(program = %config.program.display(), packing = config.packing, "decoded guest program");

    let prover_config = ProverConfig::new(config.packing)?;
    let ctx = ZkpContext::new(prover_config);

    let seed = *blake3::hash(config.program.display().to_string().as_bytes()).as_bytes();
    let guest_ctx = config.to_guest_context(seed);
    let proof = ctx.prove(&program, 0, seed, guest_ctx)?;

    tracing::info!(
        num_code_rows = proof.header.num_code_rows,
        num_linear_rows = proof.header.num_linear_rows,
        num_quadratic_rows = proof.header.num_quadratic_rows,
        n = proof.header.n,
        root = %hex::encode(proof.code_root()),
        "proof generated"
    );

    let encoded = serde_json::to_vec(&ProofDto::from(&proof))?;
    fs::write(&config.proof_path, encoded)?;
    tracing::info!(path = %config.proof_path.display(), "wrote proof");
    Ok(())
}

/// JSON-serializable mirror of one [`ligero_wasm_iop::zkp::StreamProof`];
/// field elements are hex-encoded canonical little-endian bytes.
#[derive(serde::Serialize, serde::Deserialize)]
struct StreamProofDto {
    root: String,
    combination_row: Vec<String>,
    opened_columns: Vec<Vec<String>>,
    decommitment_total_count: usize,
    decommitment_known_index: Vec<usize>,
    decommitment_nodes: Vec<(usize, String)>,
}

impl From<&ligero_wasm_iop::zkp::StreamProof> for StreamProofDto {
    fn from(s: &ligero_wasm_iop::zkp::StreamProof) -> Self {
        let field_hex = |f: &ligero_wasm_iop::F| hex::encode(ligero_wasm_iop::field::to_bytes_le(f));
        Self {
            root: hex::encode(s.root),
            combination_row: s.combination_row.iter().map(field_hex).collect(),
            opened_columns: s.opened_columns.iter().map(|c| c.iter().map(field_hex).collect()).collect(),
            decommitment_total_count: s.decommitment.total_count,
            decommitment_known_index: s.decommitment.known_index.clone(),
            decommitment_nodes: s.decommitment.nodes.iter().map(|(&k, v)| (k, hex::encode(v))).collect(),
        }
    }
}

/// JSON-serializable mirror of [`ligero_wasm_iop::zkp::Proof`].
#[derive(serde::Serialize, serde::Deserialize)]
struct ProofDto {
    k: usize,
    n: usize,
    sample_size: usize,
    num_code_rows: usize,
    num_linear_rows: usize,
    num_quadratic_rows: usize,
    num_code_values: usize,
    num_linear_terms: usize,
    num_quadratic_terms: usize,
    code: StreamProofDto,
    linear: StreamProofDto,
    quadratic: StreamProofDto,
    sampled_indices: Vec<usize>,
}

impl From<&ligero_wasm_iop::Proof> for ProofDto {
    fn from(p: &ligero_wasm_iop::Proof) -> Self {
        Self {
            k: p.header.k,
            n: p.header.n,
            sample_size: p.header.sample_size,
            num_code_rows: p.header.num_code_rows,
            num_linear_rows: p.header.num_linear_rows,
            num_quadratic_rows: p.header.num_quadratic_rows,
            num_code_values: p.header.num_code_values,
            num_linear_terms: p.header.num_linear_terms,
            num_quadratic_terms: p.header.num_quadratic_terms,
            code: StreamProofDto::from(&p.code),
            linear: StreamProofDto::from(&p.linear),
            quadratic: StreamProofDto::from(&p.quadratic),
            sampled_indices: p.sampled_indices.clone(),
        }
    }
}
