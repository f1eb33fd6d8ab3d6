//! `vbn254fr` host module: vector-of-field arithmetic over packed buffers of
//! `l` managed witnesses at once, mirroring `bn254fr`'s scalar ops but
//! amortizing the call overhead of looping a guest-side scalar op `l` times.
//! Each buffer argument is the base address of `l` little-endian `u32`
//! witness indices; a "constant" operand is instead a single 256-bit
//! immediate broadcast across the vector, supplied as an 8-word (32-byte)
//! buffer the way `uint256`'s byte-oriented entry points read their operands.

#![allow(missing_docs)]

use crate::error::Trap;
use crate::host::{pop_i32, GuestContext};
use crate::interp::store::Store;
use crate::interp::value::Value;
use crate::witness::WitnessManager;

fn slot_val(witness: &WitnessManager, idx: u32) -> Result<crate::F, Trap> {
    witness.slot(idx).map(|s| s.val()).map_err(|e| Trap::new(crate::error::TrapKind::Other(e.to_string())))
}

fn read_witness_buffer(store: &Store, ptr: u64, len: usize) -> Result<Vec<u32>, Trap> {
    let bytes = store.read(ptr, (len * 4) as u64)?;
    Ok(bytes.chunks_exact(4).map(|c| u32::from_le_bytes(c.try_into().unwrap())).collect())
}

fn write_witness_buffer(store: &mut Store, ptr: u64, indices: &[u32]) -> Result<(), Trap> {
    let mut bytes = Vec::with_capacity(indices.len() * 4);
    for &idx in indices {
        bytes.extend_from_slice(&idx.to_le_bytes());
    }
    store.write(ptr, &bytes)
}

fn read_const(store: &Store, ptr: u64) -> Result<crate::F, Trap> {
    let bytes = store.read(ptr, 32)?;
    Ok(crate::field::reduce(bytes))
}

fn vector_binop(
    stack: &mut Vec<Value>,
    store: &mut Store,
    witness: &mut WitnessManager,
    f: impl Fn(crate::F, crate::F) -> crate::F,
) -> Result<(), Trap> {
    let len = pop_i32(stack)? as usize;
    let b_ptr = pop_i32(stack)? as u64;
    let a_ptr = pop_i32(stack)? as u64;
    let dst_ptr = pop_i32(stack)? as u64;
    let a = read_witness_buffer(store, a_ptr, len)?;
    let b = read_witness_buffer(store, b_ptr, len)?;
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let va = slot_val(witness, a[i])?;
        let vb = slot_val(witness, b[i])?;
        out.push(witness.acquire_witness(f(va, vb)));
    }
    write_witness_buffer(store, dst_ptr, &out)
}

fn vector_const_op(
    stack: &mut Vec<Value>,
    store: &mut Store,
    witness: &mut WitnessManager,
    f: impl Fn(crate::F, crate::F) -> crate::F,
) -> Result<(), Trap> {
    let len = pop_i32(stack)? as usize;
    let const_ptr = pop_i32(stack)? as u64;
    let a_ptr = pop_i32(stack)? as u64;
    let dst_ptr = pop_i32(stack)? as u64;
    let a = read_witness_buffer(store, a_ptr, len)?;
    let k = read_const(store, const_ptr)?;
    let mut out = Vec::with_capacity(len);
    for &idx in &a {
        let va = slot_val(witness, idx)?;
        out.push(witness.acquire_witness(f(va, k)));
    }
    write_witness_buffer(store, dst_ptr, &out)
}

/// `vbn254fr.add(dst, a, b, len)`: elementwise sum of two `len`-wide witness
/// buffers, written to a fresh `len`-wide buffer at `dst`.
pub fn add(
    stack: &mut Vec<Value>,
    store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    vector_binop(stack, store, witness, crate::field::add)?;
    Ok(vec![])
}

/// `vbn254fr.mul(dst, a, b, len)`: elementwise product of two `len`-wide
/// witness buffers.
pub fn mul(
    stack: &mut Vec<Value>,
    store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    vector_binop(stack, store, witness, crate::field::mul)?;
    Ok(vec![])
}

/// `vbn254fr.add_const(dst, a, const_buf, len)`: adds the 256-bit immediate
/// at `const_buf` to every element of `a`.
pub fn add_const(
    stack: &mut Vec<Value>,
    store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    vector_const_op(stack, store, witness, crate::field::add)?;
    Ok(vec![])
}

/// `vbn254fr.mul_const(dst, a, const_buf, len)`: multiplies every element of
/// `a` by the 256-bit immediate at `const_buf`.
pub fn mul_const(
    stack: &mut Vec<Value>,
    store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    vector_const_op(stack, store, witness, crate::field::mul)?;
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
    fn add_sums_elementwise() {
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut store = Store::new(&Program::default(), 1, None);
        let a = [witness.acquire_witness(crate::F::from(1u64)), witness.acquire_witness(crate::F::from(2u64))];
        let b = [witness.acquire_witness(crate::F::from(10u64)), witness.acquire_witness(crate::F::from(20u64))];
        write_witness_buffer(&mut store, 0, &a).unwrap();
        write_witness_buffer(&mut store, 8, &b).unwrap();
        let mut stack = vec![Value::i32(16), Value::i32(0), Value::i32(8), Value::i32(2)];
        add(&mut stack, &mut store, &mut witness, &mut ctx()).unwrap();
        let out = read_witness_buffer(&store, 16, 2).unwrap();
        assert_eq!(witness.slot(out[0]).unwrap().val(), crate::F::from(11u64));
        assert_eq!(witness.slot(out[1]).unwrap().val(), crate::F::from(22u64));
    }

    #[test]
    fn mul_const_broadcasts_immediate() {
        let mut witness = WitnessManager::new([0u8; 32]);
        let mut store = Store::new(&Program::default(), 1, None);
        let a = [witness.acquire_witness(crate::F::from(3u64)), witness.acquire_witness(crate::F::from(4u64))];
        write_witness_buffer(&mut store, 0, &a).unwrap();
        let mut k_bytes = [0u8; 32];
        k_bytes[0] = 5;
        store.write(8, &k_bytes).unwrap();
        let mut stack = vec![Value::i32(40), Value::i32(0), Value::i32(8), Value::i32(2)];
        mul_const(&mut stack, &mut store, &mut witness, &mut ctx()).unwrap();
        let out = read_witness_buffer(&store, 40, 2).unwrap();
        assert_eq!(witness.slot(out[0]).unwrap().val(), crate::F::from(15u64));
        assert_eq!(witness.slot(out[1]).unwrap().val(), crate::F::from(20u64));
    }
}
