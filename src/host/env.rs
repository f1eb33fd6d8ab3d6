//! `env` host module: assertions over committed witnesses, I/O and debug
//! helpers, and private-input injection. Grounded on `host_modules/env.hpp`.
//!
//! The `assert_*` family never trap on a failed relation: a prover who
//! controls witness values could simply dodge the trap by never calling them
//! with bad inputs, so the check must live in the committed trace instead of
//! the host process. Each `assert_*` call appends a residual to the witness
//! manager's linear constraint stream (§3's "linear row"); the relation holds
//! iff every residual the guest ever pushed sums to zero, which `zkp::verify`
//! checks cryptographically over the committed rows.

#![allow(missing_docs)]

use crate::error::Trap;
use crate::host::{pop_i32, pop_i64, pop_witness, GuestContext};
use crate::interp::store::Store;
use crate::interp::value::Value;
use crate::witness::WitnessManager;

fn witness_val(witness: &WitnessManager, idx: u32) -> Result<crate::F, Trap> {
    witness.slot(idx).map(|s| s.val()).map_err(|e| Trap::new(crate::error::TrapKind::Other(e.to_string())))
}

pub fn assert_zero(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let w = pop_witness(stack)?;
    let residual = witness_val(witness, w)?;
    witness.push_linear_term(residual);
    Ok(vec![])
}

pub fn assert_one(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let w = pop_witness(stack)?;
    let residual = witness_val(witness, w)? - crate::F::from(1u64);
    witness.push_linear_term(residual);
    Ok(vec![])
}

pub fn assert_equal(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let b = pop_witness(stack)?;
    let a = pop_witness(stack)?;
    let residual = witness_val(witness, a)? - witness_val(witness, b)?;
    witness.push_linear_term(residual);
    Ok(vec![])
}

pub fn assert_constant(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let k = pop_i64(stack)? as u64;
    let w = pop_witness(stack)?;
    let residual = witness_val(witness, w)? - crate::F::from(k);
    witness.push_linear_term(residual);
    Ok(vec![])
}

/// Allocates a fresh witness slot from a plain i64, used at the
/// guest/host boundary to lift an arithmetic value into the committed trace.
pub fn witness_cast(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let v = pop_i64(stack)?;
    let idx = witness.acquire_witness(crate::F::from(v as u64));
    Ok(vec![Value::Witness(idx)])
}

pub fn print_str(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let len = pop_i32(stack)? as u64;
    let ptr = pop_i32(stack)? as u64;
    let bytes = store.read(ptr, len)?;
    let s = String::from_utf8_lossy(bytes);
    tracing::info!(target: "guest", "{s}");
    Ok(vec![])
}

pub fn dump_memory(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let len = pop_i32(stack)? as u64;
    let ptr = pop_i32(stack)? as u64;
    let bytes = store.read(ptr, len)?;
    tracing::debug!(target: "guest", bytes = %hex::encode(bytes), "dump_memory");
    Ok(vec![])
}

/// Reports the size of the `index`-th private input file (private inputs are
/// fed to the guest the way WASI would feed file contents); backed by the
/// same `GuestContext::args` buffer `wasi.args_get` reads from.
pub fn file_size_get(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    _witness: &mut WitnessManager,
    ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let index = pop_i32(stack)? as usize;
    let len = ctx.args.get(index).map(|a| a.len()).unwrap_or(0);
    Ok(vec![Value::i64(len as i64)])
}

pub fn file_get(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let len = pop_i32(stack)? as u64;
    let ptr = pop_i32(stack)? as u64;
    let index = pop_i32(stack)? as usize;
    let bytes = ctx.args.get(index).cloned().unwrap_or_default();
    let n = (len as usize).min(bytes.len());
    let mut buf = vec![0u8; len as usize];
    buf[..n].copy_from_slice(&bytes[..n]);
    store.write(ptr, &buf)?;
    Ok(vec![Value::i32(n as i32)])
}

pub fn i32_private_const(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let v = pop_i32(stack)?;
    Ok(vec![Value::i32(v)])
}

pub fn i64_private_const(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let v = pop_i64(stack)?;
    Ok(vec![Value::i64(v)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Program;

    #[test]
    fn assert_zero_on_zero_witness_pushes_zero_residual() {
        let program = Program::default();
        let mut store = Store::new(&program, 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut ctx = GuestContext::empty();
        let idx = witness.acquire_witness(crate::F::from(0u64));
        let mut stack = vec![Value::Witness(idx)];
        assert_zero(&mut stack, &mut store, &mut witness, &mut ctx).unwrap();
        assert_eq!(witness.linear_terms(), &[crate::F::from(0u64)]);
    }

    #[test]
    fn assert_zero_on_nonzero_witness_pushes_nonzero_residual() {
        let program = Program::default();
        let mut store = Store::new(&program, 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut ctx = GuestContext::empty();
        let idx = witness.acquire_witness(crate::F::from(3u64));
        let mut stack = vec![Value::Witness(idx)];
        assert_zero(&mut stack, &mut store, &mut witness, &mut ctx).unwrap();
        assert_eq!(witness.linear_terms(), &[crate::F::from(3u64)]);
    }

    #[test]
    fn assert_equal_pushes_difference() {
        let program = Program::default();
        let mut store = Store::new(&program, 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut ctx = GuestContext::empty();
        let a = witness.acquire_witness(crate::F::from(5u64));
        let b = witness.acquire_witness(crate::F::from(5u64));
        let mut stack = vec![Value::Witness(a), Value::Witness(b)];
        assert_equal(&mut stack, &mut store, &mut witness, &mut ctx).unwrap();
        assert_eq!(witness.linear_terms(), &[crate::F::from(0u64)]);
    }

    #[test]
    fn file_get_reads_private_argument() {
        let program = Program::default();
        let mut store = Store::new(&program, 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut ctx = GuestContext::new(vec![b"hello".to_vec()], Default::default(), Vec::new(), [0u8; 32]);
        let mut stack = vec![Value::i32(0), Value::i32(0), Value::i32(5)];
        file_get(&mut stack, &mut store, &mut witness, &mut ctx).unwrap();
        assert_eq!(store.read(0, 5).unwrap(), b"hello");
    }
}
