//! Host module dispatch.
//!
//! Reproduces `host_modules/env.hpp`'s shape: a lookup table mapping
//! `(module, name)` to a function pointer, populated once and consulted on
//! every `call`/`call_indirect` that resolves to an import rather than a
//! guest function. The original's `call_cache_` (per call-site address
//! memoization) is unnecessary here since Rust's `HashMap` lookup is already
//! O(1) amortized and call sites aren't re-resolved across executions.

#![allow(missing_docs)]

pub mod bn254fr;
pub mod env;
pub mod uint256;
pub mod vbn254fr;
pub mod wasi;

use crate::error::{Trap, TrapKind};
use crate::interp::store::Store;
use crate::interp::value::Value;
use crate::witness::WitnessManager;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::collections::{HashMap, HashSet};

/// Per-run guest-visible environment: argv bytes, which argv indices are
/// private (fed to the guest but never absorbed into the public-input
/// transcript), environment variables, and a dedicated randomness stream for
/// `wasi_snapshot_preview1.random_get`. Threaded through every host call so
/// `wasi`'s `args_get`/`environ_get`/`random_get` can see it without the
/// interpreter's core loop knowing anything about argv shape.
pub struct GuestContext {
    pub args: Vec<Vec<u8>>,
    pub private_args: HashSet<usize>,
    pub env: Vec<(String, String)>,
    rng: StdRng,
}

impl GuestContext {
    pub fn new(args: Vec<Vec<u8>>, private_args: HashSet<usize>, env: Vec<(String, String)>, seed: [u8; 32]) -> Self {
        Self { args, private_args, env, rng: StdRng::from_seed(seed) }
    }

    /// No argv, no env, a fixed randomness seed; used by binaries/tests that
    /// run a guest with nothing but its own computation.
    pub fn empty() -> Self {
        Self::new(Vec::new(), HashSet::new(), Vec::new(), [0u8; 32])
    }

    pub fn is_private(&self, arg_index: usize) -> bool {
        self.private_args.contains(&arg_index)
    }

    pub fn fill_random(&mut self, buf: &mut [u8]) {
        self.rng.fill_bytes(buf);
    }
}

/// Signature every host function implements: pop its own arguments off
/// `stack`, mutate `store`/`witness`/`ctx` as needed, push its results.
pub type HostFn =
    fn(&mut Vec<Value>, &mut Store, &mut WitnessManager, &mut GuestContext) -> Result<Vec<Value>, Trap>;

/// Resolves `(module, name)` import references to a host function and
/// invokes it; implemented by [`HostModules`] and mockable in tests.
pub trait HostDispatch {
    fn call(
        &mut self,
        module: &str,
        name: &str,
        stack: &mut Vec<Value>,
        store: &mut Store,
        witness: &mut WitnessManager,
        ctx: &mut GuestContext,
    ) -> Result<Vec<Value>, Trap>;
}

/// The full set of host modules available to a running guest program.
pub struct HostModules {
    table: HashMap<(String, String), HostFn>,
}

impl Default for HostModules {
    fn default() -> Self {
        Self::new()
    }
}

impl HostModules {
    pub fn new() -> Self {
        let mut table: HashMap<(String, String), HostFn> = HashMap::new();
        macro_rules! register {
            ($module:expr, $name:expr, $f:expr) => {
                table.insert(($module.to_string(), $name.to_string()), $f as HostFn);
            };
        }

        register!("env", "assert_zero", env::assert_zero);
        register!("env", "assert_one", env::assert_one);
        register!("env", "assert_equal", env::assert_equal);
        register!("env", "assert_constant", env::assert_constant);
        register!("env", "witness_cast", env::witness_cast);
        register!("env", "print_str", env::print_str);
        register!("env", "dump_memory", env::dump_memory);
        register!("env", "file_size_get", env::file_size_get);
        register!("env", "file_get", env::file_get);
        register!("env", "i32_private_const", env::i32_private_const);
        register!("env", "i64_private_const", env::i64_private_const);

        register!("bn254fr", "add", bn254fr::add);
        register!("bn254fr", "sub", bn254fr::sub);
        register!("bn254fr", "mul", bn254fr::mul);
        register!("bn254fr", "set_u64", bn254fr::set_u64);
        register!("bn254fr", "add_checked", bn254fr::add_checked);
        register!("bn254fr", "sub_checked", bn254fr::sub_checked);
        register!("bn254fr", "mul_checked", bn254fr::mul_checked);
        register!("bn254fr", "div_checked", bn254fr::div_checked);

        register!("vbn254fr", "add", vbn254fr::add);
        register!("vbn254fr", "mul", vbn254fr::mul);
        register!("vbn254fr", "add_const", vbn254fr::add_const);
        register!("vbn254fr", "mul_const", vbn254fr::mul_const);

        register!("uint256", "set_bytes_little", uint256::set_bytes_little);
        register!("uint256", "set_bytes_big", uint256::set_bytes_big);
        register!("uint256", "set_str", uint256::set_str);
        register!("uint256", "invmod", uint256::invmod);
        register!("uint256", "div_qr", uint256::div_qr);
        register!("uint256", "div_qr_wide", uint256::div_qr_wide);
        register!("uint256", "compose_bn254", uint256::compose_bn254);
        register!("uint256", "decompose_bn254", uint256::decompose_bn254);

        register!("wasi_snapshot_preview1", "proc_exit", wasi::proc_exit);
        register!("wasi_snapshot_preview1", "fd_write", wasi::fd_write);
        register!("wasi_snapshot_preview1", "fd_read", wasi::fd_read);
        register!("wasi_snapshot_preview1", "args_sizes_get", wasi::args_sizes_get);
        register!("wasi_snapshot_preview1", "args_get", wasi::args_get);
        register!("wasi_snapshot_preview1", "environ_sizes_get", wasi::environ_sizes_get);
        register!("wasi_snapshot_preview1", "environ_get", wasi::environ_get);
        register!("wasi_snapshot_preview1", "random_get", wasi::random_get);

        Self { table }
    }
}

impl HostDispatch for HostModules {
    fn call(
        &mut self,
        module: &str,
        name: &str,
        stack: &mut Vec<Value>,
        store: &mut Store,
        witness: &mut WitnessManager,
        ctx: &mut GuestContext,
    ) -> Result<Vec<Value>, Trap> {
        let f = self
            .table
            .get(&(module.to_string(), name.to_string()))
            .copied()
            .ok_or(Trap::new(TrapKind::UnresolvedImport { module: module.to_string(), name: name.to_string() }))?;
        f(stack, store, witness, ctx)
    }
}

pub(crate) fn pop(stack: &mut Vec<Value>) -> Result<Value, Trap> {
    stack.pop().ok_or(Trap::new(TrapKind::StackUnderflow))
}

pub(crate) fn pop_i32(stack: &mut Vec<Value>) -> Result<i32, Trap> {
    pop(stack)?.as_i32().ok_or(Trap::new(TrapKind::Other("expected i32".into())))
}

pub(crate) fn pop_i64(stack: &mut Vec<Value>) -> Result<i64, Trap> {
    pop(stack)?.as_i64().ok_or(Trap::new(TrapKind::Other("expected i64".into())))
}

pub(crate) fn pop_witness(stack: &mut Vec<Value>) -> Result<u32, Trap> {
    pop(stack)?.get_if_witness().ok_or(Trap::new(TrapKind::Other("expected managed witness".into())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Program;

    #[test]
    fn unresolved_import_traps() {
        let mut modules = HostModules::new();
        let program = Program::default();
        let mut store = Store::new(&program, 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut ctx = GuestContext::empty();
        let mut stack = Vec::new();
        let result = modules.call("nope", "nope", &mut stack, &mut store, &mut witness, &mut ctx);
        assert!(matches!(result, Err(Trap { kind: TrapKind::UnresolvedImport { .. } })));
    }
}
