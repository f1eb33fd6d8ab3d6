//! `wasi_snapshot_preview1` subset: just enough for guest programs compiled
//! against a standard WASI toolchain to read argv/env, exit, read/write, and
//! draw randomness (no filesystem beyond stdio, no clocks).
//!
//! `args_get` is the mechanism behind the CLI's `private-indices` option: a
//! private argv entry is still written into guest memory like any other (the
//! guest needs the bytes to compute), but it is additionally lifted into the
//! committed trace as managed witnesses, the same way `env::witness_cast`
//! lifts any other host-visible value. A verifier replaying only public
//! inputs sees a [`crate::host::GuestContext`] with those indices absent, so
//! it never reconstructs the private bytes themselves.

#![allow(missing_docs)]

use crate::error::{Trap, TrapKind};
use crate::host::{pop_i32, GuestContext};
use crate::interp::store::Store;
use crate::interp::value::Value;
use crate::witness::WitnessManager;

pub fn proc_exit(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let code = pop_i32(stack)?;
    Err(Trap::new(TrapKind::Other(format!("proc_exit({code})"))))
}

/// `fd_write(fd, iovs_ptr, iovs_len, nwritten_ptr) -> errno`. Only `fd == 1`
/// (stdout) is supported; iovecs are `(ptr: i32, len: i32)` pairs.
pub fn fd_write(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let nwritten_ptr = pop_i32(stack)? as u64;
    let iovs_len = pop_i32(stack)? as u64;
    let iovs_ptr = pop_i32(stack)? as u64;
    let fd = pop_i32(stack)?;

    let mut total = 0u32;
    for i in 0..iovs_len {
        let entry = store.read(iovs_ptr + i * 8, 8)?;
        let ptr = u32::from_le_bytes(entry[0..4].try_into().unwrap()) as u64;
        let len = u32::from_le_bytes(entry[4..8].try_into().unwrap());
        if fd == 1 || fd == 2 {
            let bytes = store.read(ptr, len as u64)?;
            tracing::info!(target: "guest-stdout", "{}", String::from_utf8_lossy(bytes));
        }
        total += len;
    }
    store.write(nwritten_ptr, &total.to_le_bytes())?;
    Ok(vec![Value::i32(0)])
}

/// `fd_read(fd, iovs_ptr, iovs_len, nread_ptr) -> errno`. No stdin is wired
/// up; every read reports zero bytes (immediate EOF), matching the
/// integer/memory-subset scope's no-filesystem stance.
pub fn fd_read(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let nread_ptr = pop_i32(stack)? as u64;
    let _iovs_len = pop_i32(stack)?;
    let _iovs_ptr = pop_i32(stack)?;
    let _fd = pop_i32(stack)?;
    store.write(nread_ptr, &0u32.to_le_bytes())?;
    Ok(vec![Value::i32(0)])
}

/// `args_sizes_get(argc_ptr, argv_buf_size_ptr) -> errno`.
pub fn args_sizes_get(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let argv_buf_size_ptr = pop_i32(stack)? as u64;
    let argc_ptr = pop_i32(stack)? as u64;
    let argc = ctx.args.len() as u32;
    let buf_size: u32 = ctx.args.iter().map(|a| a.len() as u32 + 1).sum();
    store.write(argc_ptr, &argc.to_le_bytes())?;
    store.write(argv_buf_size_ptr, &buf_size.to_le_bytes())?;
    Ok(vec![Value::i32(0)])
}

/// `args_get(argv_ptr, argv_buf_ptr) -> errno`: writes `argc` pointers into
/// `argv_ptr` and the NUL-terminated argv bytes into `argv_buf_ptr`, mirroring
/// the standard WASI layout.
pub fn args_get(
    stack: &mut Vec<Value>,
    store: &mut Store,
    witness: &mut WitnessManager,
    ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let argv_buf_ptr = pop_i32(stack)? as u64;
    let argv_ptr = pop_i32(stack)? as u64;

    let mut cursor = argv_buf_ptr;
    let mut entry_ptrs = Vec::with_capacity(ctx.args.len());
    for (i, arg) in ctx.args.iter().enumerate() {
        entry_ptrs.push(cursor as u32);
        let mut bytes = arg.clone();
        bytes.push(0);
        store.write(cursor, &bytes)?;
        cursor += bytes.len() as u64;

        if ctx.is_private(i) {
            for chunk in arg.chunks(32) {
                let mut buf = [0u8; 32];
                buf[..chunk.len()].copy_from_slice(chunk);
                witness.acquire_witness(crate::field::reduce(&buf));
            }
        }
    }
    for (i, &ptr) in entry_ptrs.iter().enumerate() {
        store.write(argv_ptr + (i as u64) * 4, &ptr.to_le_bytes())?;
    }
    Ok(vec![Value::i32(0)])
}

/// `environ_sizes_get(count_ptr, buf_size_ptr) -> errno`.
pub fn environ_sizes_get(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let buf_size_ptr = pop_i32(stack)? as u64;
    let count_ptr = pop_i32(stack)? as u64;
    let count = ctx.env.len() as u32;
    let buf_size: u32 = ctx.env.iter().map(|(k, v)| (k.len() + 1 + v.len() + 1) as u32).sum();
    store.write(count_ptr, &count.to_le_bytes())?;
    store.write(buf_size_ptr, &buf_size.to_le_bytes())?;
    Ok(vec![Value::i32(0)])
}

/// `environ_get(environ_ptr, environ_buf_ptr) -> errno`: each entry is
/// written as `KEY=VALUE\0`, matching `args_get`'s pointer-table layout.
pub fn environ_get(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let environ_buf_ptr = pop_i32(stack)? as u64;
    let environ_ptr = pop_i32(stack)? as u64;

    let mut cursor = environ_buf_ptr;
    let mut entry_ptrs = Vec::with_capacity(ctx.env.len());
    for (k, v) in &ctx.env {
        entry_ptrs.push(cursor as u32);
        let mut bytes = format!("{k}={v}").into_bytes();
        bytes.push(0);
        store.write(cursor, &bytes)?;
        cursor += bytes.len() as u64;
    }
    for (i, &ptr) in entry_ptrs.iter().enumerate() {
        store.write(environ_ptr + (i as u64) * 4, &ptr.to_le_bytes())?;
    }
    Ok(vec![Value::i32(0)])
}

/// `random_get(buf_ptr, buf_len) -> errno`: fills `buf_len` bytes from this
/// run's dedicated randomness stream.
pub fn random_get(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let buf_len = pop_i32(stack)? as usize;
    let buf_ptr = pop_i32(stack)? as u64;
    let mut buf = vec![0u8; buf_len];
    ctx.fill_random(&mut buf);
    store.write(buf_ptr, &buf)?;
    Ok(vec![Value::i32(0)])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Program;
    use std::collections::HashSet;

    #[test]
    fn proc_exit_traps() {
        let mut store = Store::new(&Program::default(), 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut ctx = GuestContext::empty();
        let mut stack = vec![Value::i32(0)];
        assert!(proc_exit(&mut stack, &mut store, &mut witness, &mut ctx).is_err());
    }

    #[test]
    fn args_sizes_get_reports_argc_and_buffer_size() {
        let mut store = Store::new(&Program::default(), 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut ctx = GuestContext::new(vec![b"ab".to_vec(), b"cde".to_vec()], HashSet::new(), Vec::new(), [0u8; 32]);
        let mut stack = vec![Value::i32(0), Value::i32(4)];
        args_sizes_get(&mut stack, &mut store, &mut witness, &mut ctx).unwrap();
        assert_eq!(u32::from_le_bytes(store.read(0, 4).unwrap().try_into().unwrap()), 2);
        assert_eq!(u32::from_le_bytes(store.read(4, 4).unwrap().try_into().unwrap()), 3 + 4);
    }

    #[test]
    fn args_get_writes_argv_table_and_bytes() {
        let mut store = Store::new(&Program::default(), 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut ctx = GuestContext::new(vec![b"hi".to_vec()], HashSet::new(), Vec::new(), [0u8; 32]);
        let mut stack = vec![Value::i32(100), Value::i32(0)];
        args_get(&mut stack, &mut store, &mut witness, &mut ctx).unwrap();
        let ptr0 = u32::from_le_bytes(store.read(0, 4).unwrap().try_into().unwrap());
        assert_eq!(ptr0, 100);
        assert_eq!(store.read(100, 3).unwrap(), b"hi\0");
    }

    #[test]
    fn args_get_lifts_private_argument_into_witnesses() {
        let mut store = Store::new(&Program::default(), 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut private = HashSet::new();
        private.insert(0);
        let mut ctx = GuestContext::new(vec![b"secret".to_vec()], private, Vec::new(), [0u8; 32]);
        assert!(witness.is_empty());
        let mut stack = vec![Value::i32(100), Value::i32(0)];
        args_get(&mut stack, &mut store, &mut witness, &mut ctx).unwrap();
        assert_eq!(witness.len(), 1);
    }

    #[test]
    fn random_get_fills_buffer_deterministically_from_seed() {
        let mut store = Store::new(&Program::default(), 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut ctx_a = GuestContext::new(Vec::new(), HashSet::new(), Vec::new(), [5u8; 32]);
        let mut ctx_b = GuestContext::new(Vec::new(), HashSet::new(), Vec::new(), [5u8; 32]);
        let mut stack = vec![Value::i32(16), Value::i32(0)];
        random_get(&mut stack, &mut store, &mut witness, &mut ctx_a).unwrap();
        let first = store.read(0, 16).unwrap().to_vec();
        let mut store2 = Store::new(&Program::default(), 1, None);
        let mut stack2 = vec![Value::i32(16), Value::i32(0)];
        random_get(&mut stack2, &mut store2, &mut witness, &mut ctx_b).unwrap();
        assert_eq!(first, store2.read(0, 16).unwrap());
    }
}
