//! `verify` — checks a proof produced by `prove` against the recorded
//! transcript and Reed-Solomon/Merkle consistency relations.
//!
//! Re-decodes and re-executes the same guest program `prove` ran, under a
//! restricted [`ligero_wasm_iop::host::GuestContext`] built from `RunConfig`
//! (private argv entries present but zeroed), so acceptance actually depends
//! on running the committed program rather than trusting the proof's header.

#![forbid(unsafe_code)]

use ligero_wasm_iop::config::RunConfig;
use ligero_wasm_iop::decode;
use ligero_wasm_iop::hash::Decommitment;
use ligero_wasm_iop::zkp::{Proof, ProofHeader, ProverConfig, StreamProof, ZkpContext};
use std::collections::HashMap;
use std::fs;

fn load_config() -> anyhow::Result<RunConfig> {
    let mut args = std::env::args().skip(1);
    let first = args.next().ok_or_else(|| anyhow::anyhow!("usage: verify <json> | verify --config <path>"))?;
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

    let raw = fs::read(&config.proof_path)
        .map_err(|e| anyhow::anyhow!("reading proof at {}: {e}", config.proof_path.display()))?;
    let dto: ProofDto = serde_json::from_slice(&raw)?;
    let proof: Proof = dto.try_into()?;

    let prover_config = ProverConfig::new(proof.header.k)?;
    let ctx = ZkpContext::new(prover_config);
    let guest_ctx = config.to_public_guest_context();

    match ctx.verify(&program, 0, guest_ctx, &proof) {
        Ok(()) => {
            tracing::info!(root = %hex::encode(proof.code_root()), "proof accepted");
            println!("ACCEPT");
            Ok(())
        }
        Err(e) => {
            tracing::warn!(error = %e, "proof rejected");
            println!("REJECT: {e}");
            std::process::exit(1);
        }
    }
}

#[derive(serde::Serialize, serde::Deserialize)]
struct StreamProofDto {
    root: String,
    combination_row: Vec<String>,
    opened_columns: Vec<Vec<String>>,
    decommitment_total_count: usize,
    decommitment_known_index: Vec<usize>,
    decommitment_nodes: Vec<(usize, String)>,
}

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

fn decode_digest(s: &str) -> anyhow::Result<[u8; 32]> {
    let bytes = hex::decode(s)?;
    bytes.try_into().map_err(|_| anyhow::anyhow!("digest is not 32 bytes"))
}

fn decode_field(s: &str) -> anyhow::Result<ligero_wasm_iop::F> {
    let bytes = hex::decode(s)?;
    Ok(ligero_wasm_iop::field::reduce(&bytes))
}

impl TryFrom<StreamProofDto> for StreamProof {
    type Error = anyhow::Error;

    fn try_from(dto: StreamProofDto) -> anyhow::Result<Self> {
        let mut nodes = HashMap::new();
        for (idx, hex_digest) in dto.decommitment_nodes {
            nodes.insert(idx, decode_digest(&hex_digest)?);
        }
        let combination_row =
            dto.combination_row.iter().map(|s| decode_field(s)).collect::<anyhow::Result<Vec<_>>>()?;
        let opened_columns = dto
            .opened_columns
            .iter()
            .map(|col| col.iter().map(|s| decode_field(s)).collect::<anyhow::Result<Vec<_>>>())
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(StreamProof {
            root: decode_digest(&dto.root)?,
            combination_row,
            opened_columns,
            decommitment: Decommitment {
                total_count: dto.decommitment_total_count,
                known_index: dto.decommitment_known_index,
                nodes,
            },
        })
    }
}

impl TryFrom<ProofDto> for Proof {
    type Error = anyhow::Error;

    fn try_from(dto: ProofDto) -> anyhow::Result<Self> {
        Ok(Proof {
            header: ProofHeader {
                k: dto.k,
                n: dto.n,
                sample_size: dto.sample_size,
                num_code_rows: dto.num_code_rows,
                num_linear_rows: dto.num_linear_rows,
                num_quadratic_rows: dto.num_quadratic_rows,
                num_code_values: dto.num_code_values,
                num_linear_terms: dto.num_linear_terms,
                num_quadratic_terms: dto.num_quadratic_terms,
            },
            code: dto.code.try_into()?,
            linear: dto.linear.try_into()?,
            quadratic: dto.quadratic.try_into()?,
            sampled_indices: dto.sampled_indices,
        })
    }
}
