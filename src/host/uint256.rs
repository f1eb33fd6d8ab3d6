//! `uint256` host module: generic 256-bit big-integer operations over guest
//! memory buffers, independent of the scalar field's modulus. Grounded on
//! `host_modules/uint256.hpp`'s `set_bytes_little`/`set_bytes_big`/`set_str`/
//! `invmod` family, extended with the 512-by-256 division and bn254-limb
//! compose/decompose entry points §4.8 calls out by name.

#![allow(missing_docs)]

use crate::bigint::U256;
use crate::error::Trap;
use crate::host::{pop_i32, pop_witness, GuestContext};
use crate::interp::store::Store;
use crate::interp::value::Value;
use crate::witness::WitnessManager;

/// Reads 32 bytes from guest memory at `ptr` (little-endian limb order) into
/// a [`U256`].
fn read_u256_le(store: &Store, ptr: u64) -> Result<U256, Trap> {
    let bytes = store.read(ptr, 32)?;
    Ok(U256::from_bytes_le(bytes))
}

fn write_u256_le(store: &mut Store, ptr: u64, v: &U256) -> Result<(), Trap> {
    store.write(ptr, &v.to_bytes_le())
}

pub fn set_bytes_little(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let len = pop_i32(stack)? as u64;
    let src = pop_i32(stack)? as u64;
    let dst = pop_i32(stack)? as u64;
    let mut buf = [0u8; 32];
    let n = (len as usize).min(32);
    buf[..n].copy_from_slice(store.read(src, n as u64)?);
    write_u256_le(store, dst, &U256::from_bytes_le(&buf))?;
    Ok(vec![])
}

pub fn set_bytes_big(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let len = pop_i32(stack)? as u64;
    let src = pop_i32(stack)? as u64;
    let dst = pop_i32(stack)? as u64;
    let n = (len as usize).min(32);
    let mut be = store.read(src, n as u64)?.to_vec();
    be.reverse();
    let mut buf = [0u8; 32];
    buf[..n].copy_from_slice(&be);
    write_u256_le(store, dst, &U256::from_bytes_le(&buf))?;
    Ok(vec![])
}

/// Parses a decimal string at `ptr`/`len` into a 256-bit value, mirroring the
/// original's `set_str` entry point used to load large test constants.
pub fn set_str(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let len = pop_i32(stack)? as u64;
    let src = pop_i32(stack)? as u64;
    let dst = pop_i32(stack)? as u64;
    let bytes = store.read(src, len)?;
    let s = std::str::from_utf8(bytes).map_err(|e| Trap::new(crate::error::TrapKind::Other(e.to_string())))?;
    let mut acc = U256::ZERO;
    let ten = U256::from_u64(10);
    for c in s.chars() {
        let d = c.to_digit(10).ok_or(Trap::new(crate::error::TrapKind::Other(format!("bad digit `{c}`"))))?;
        acc = acc.mul_wide(&ten).0;
        acc = acc.add_cc(&U256::from_u64(d as u64)).0;
    }
    write_u256_le(store, dst, &acc)?;
    Ok(vec![])
}

/// Computes `a^-1 mod m` and writes it to `dst`; traps if `a` has no inverse
/// modulo `m` (matches the original's behavior of treating that as a fatal
/// configuration error rather than a recoverable guest-visible condition).
pub fn invmod(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let m_ptr = pop_i32(stack)? as u64;
    let a_ptr = pop_i32(stack)? as u64;
    let dst = pop_i32(stack)? as u64;
    let a = read_u256_le(store, a_ptr)?;
    let m = read_u256_le(store, m_ptr)?;
    let inv = a
        .invmod(&m)
        .map_err(|e| Trap::new(crate::error::TrapKind::Other(format!("uint256.invmod: {e}"))))?;
    write_u256_le(store, dst, &inv)?;
    Ok(vec![])
}

/// `div_qr(q, r, a, b)`: 256-by-256 division, `q = a / b`, `r = a % b`.
pub fn div_qr(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let b_ptr = pop_i32(stack)? as u64;
    let a_ptr = pop_i32(stack)? as u64;
    let r_ptr = pop_i32(stack)? as u64;
    let q_ptr = pop_i32(stack)? as u64;
    let a = read_u256_le(store, a_ptr)?;
    let b = read_u256_le(store, b_ptr)?;
    let (q, r) = a.div_qr(&b).map_err(|e| Trap::new(crate::error::TrapKind::Other(format!("uint256.div_qr: {e}"))))?;
    write_u256_le(store, q_ptr, &q)?;
    write_u256_le(store, r_ptr, &r)?;
    Ok(vec![])
}

/// `div_qr_wide(q_lo, q_hi, r, lo, hi, divisor)`: the 512-by-256 division
/// needed by guest big-integer routines whose dividend spans two 256-bit
/// words (e.g. Barrett/Montgomery reduction steps).
pub fn div_qr_wide(
    stack: &mut Vec<Value>,
    store: &mut Store,
    _witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let divisor_ptr = pop_i32(stack)? as u64;
    let hi_ptr = pop_i32(stack)? as u64;
    let lo_ptr = pop_i32(stack)? as u64;
    let r_ptr = pop_i32(stack)? as u64;
    let q_hi_ptr = pop_i32(stack)? as u64;
    let q_lo_ptr = pop_i32(stack)? as u64;
    let lo = read_u256_le(store, lo_ptr)?;
    let hi = read_u256_le(store, hi_ptr)?;
    let divisor = read_u256_le(store, divisor_ptr)?;
    let (q_lo, q_hi, r) = U256::div_qr_wide(&lo, &hi, &divisor)
        .map_err(|e| Trap::new(crate::error::TrapKind::Other(format!("uint256.div_qr_wide: {e}"))))?;
    write_u256_le(store, q_lo_ptr, &q_lo)?;
    write_u256_le(store, q_hi_ptr, &q_hi)?;
    write_u256_le(store, r_ptr, &r)?;
    Ok(vec![])
}

/// `compose_bn254(src) -> witness`: reduces the 256-bit value at `src` modulo
/// the scalar field and lifts it into a managed witness, the bridge from
/// generic big-integer memory back into the committed trace.
pub fn compose_bn254(
    stack: &mut Vec<Value>,
    store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let src_ptr = pop_i32(stack)? as u64;
    let bytes = store.read(src_ptr, 32)?;
    let idx = witness.acquire_witness(crate::field::reduce(bytes));
    Ok(vec![Value::Witness(idx)])
}

/// `decompose_bn254(dst, witness)`: writes a managed witness's canonical
/// little-endian 256-bit encoding to `dst`, the inverse of `compose_bn254`.
pub fn decompose_bn254(
    stack: &mut Vec<Value>,
    store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let w = pop_witness(stack)?;
    let dst_ptr = pop_i32(stack)? as u64;
    let val = witness.slot(w).map_err(|e| Trap::new(crate::error::TrapKind::Other(e.to_string())))?.val();
    store.write(dst_ptr, &crate::field::to_bytes_le(&val))?;
    Ok(vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::Program;

    fn ctx() -> GuestContext {
        GuestContext::empty()
    }

    #[test]
    fn set_bytes_little_round_trips() {
        let program = Program::default();
        let mut store = Store::new(&program, 1, None);
        store.write(0, &[7u8; 32]).unwrap();
        let mut stack = vec![Value::i32(64), Value::i32(0), Value::i32(32)];
        set_bytes_little(&mut stack, &mut store, &mut WitnessManager::new([0u8; 32]), &mut ctx()).unwrap();
        let out = store.read(64, 32).unwrap();
        assert_eq!(out, &[7u8; 32]);
    }

    #[test]
    fn div_qr_divides_evenly() {
        let program = Program::default();
        let mut store = Store::new(&program, 1, None);
        write_u256_le(&mut store, 0, &U256::from_u64(100)).unwrap();
        write_u256_le(&mut store, 32, &U256::from_u64(7)).unwrap();
        let mut stack = vec![Value::i32(64), Value::i32(96), Value::i32(0), Value::i32(32)];
        div_qr(&mut stack, &mut store, &mut WitnessManager::new([0u8; 32]), &mut ctx()).unwrap();
        let q = read_u256_le(&store, 64).unwrap();
        let r = read_u256_le(&store, 96).unwrap();
        assert_eq!(q.to_bytes_le(), U256::from_u64(14).to_bytes_le());
        assert_eq!(r.to_bytes_le(), U256::from_u64(2).to_bytes_le());
    }

    #[test]
    fn compose_then_decompose_round_trips() {
        let program = Program::default();
        let mut store = Store::new(&program, 1, None);
        let mut witness = WitnessManager::new([0u8; 32]);
        store.write(0, &crate::field::to_bytes_le(&crate::F::from(42u64))).unwrap();
        let mut stack = vec![Value::i32(0)];
        let result = compose_bn254(&mut stack, &mut store, &mut witness, &mut ctx()).unwrap();
        let w = result[0].get_if_witness().unwrap();
        assert_eq!(witness.slot(w).unwrap().val(), crate::F::from(42u64));

        let mut stack = vec![Value::i32(64), Value::Witness(w)];
        decompose_bn254(&mut stack, &mut store, &mut witness, &mut ctx()).unwrap();
        assert_eq!(store.read(64, 32).unwrap(), &crate::field::to_bytes_le(&crate::F::from(42u64)));
    }
}
