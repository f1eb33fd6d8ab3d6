//! `bn254fr` host module: scalar-field arithmetic directly on managed
//! witnesses, so guest programs can compute over the committed field without
//! dropping back to `uint256`'s generic big-integer path.
//!
//! The plain `add`/`sub`/`mul` just compute; the `_checked` variants also
//! emit the constraint that ties the result witness to its operands into the
//! committed trace (§4.8), the same way `env::assert_*` does for equality
//! checks. `add_checked`/`sub_checked` push a linear residual; `mul_checked`
//! and `div_checked` open a quadratic triple, since `a * b = c` (and
//! `a / b = c` via `c * b = a`) is not expressible as a linear relation.

#![allow(missing_docs)]

use crate::error::Trap;
use crate::host::{pop_i64, pop_witness, GuestContext};
use crate::interp::store::Store;
use crate::interp::value::Value;
use crate::witness::WitnessManager;

fn slot_val(witness: &WitnessManager, idx: u32) -> Result<crate::F, Trap> {
    witness.slot(idx).map(|s| s.val()).map_err(|e| Trap::new(crate::error::TrapKind::Other(e.to_string())))
}

fn binop(
    stack: &mut Vec<Value>,
    witness: &mut WitnessManager,
    f: impl FnOnce(crate::F, crate::F) -> crate::F,
) -> Result<(u32, u32, u32), Trap> {
    let b = pop_witness(stack)?;
    let a = pop_witness(stack)?;
    let va = slot_val(witness, a)?;
    let vb = slot_val(witness, b)?;
    let idx = witness.acquire_witness(f(va, vb));
    Ok((a, b, idx))
}

pub fn add(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let (.., idx) = binop(stack, witness, crate::field::add)?;
    Ok(vec![Value::Witness(idx)])
}

pub fn sub(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let (.., idx) = binop(stack, witness, crate::field::sub)?;
    Ok(vec![Value::Witness(idx)])
}

pub fn mul(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let (.., idx) = binop(stack, witness, crate::field::mul)?;
    Ok(vec![Value::Witness(idx)])
}

/// Allocates a new witness directly from a u64, bypassing `witness_cast`'s
/// plain-i64 path when the guest already knows it's producing a field value.
pub fn set_u64(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let v = pop_i64(stack)? as u64;
    let idx = witness.acquire_witness(crate::F::from(v));
    Ok(vec![Value::Witness(idx)])
}

/// `a + b`, additionally committing the linear residual `result - (a + b)`
/// (zero iff the addition was performed honestly) to the trace.
pub fn add_checked(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let (a, b, idx) = binop(stack, witness, crate::field::add)?;
    let residual = slot_val(witness, idx)? - (slot_val(witness, a)? + slot_val(witness, b)?);
    witness.push_linear_term(residual);
    Ok(vec![Value::Witness(idx)])
}

pub fn sub_checked(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let (a, b, idx) = binop(stack, witness, crate::field::sub)?;
    let residual = slot_val(witness, idx)? - (slot_val(witness, a)? - slot_val(witness, b)?);
    witness.push_linear_term(residual);
    Ok(vec![Value::Witness(idx)])
}

/// Binds `(a, b, result)` as a quadratic triple so the committed trace proves
/// `a * b = result`.
fn bind_quadratic_triple(witness: &mut WitnessManager, a: u32, b: u32, c: u32) -> Result<(), Trap> {
    let quad = witness.acquire_quadratic_slot();
    let to_trap = |e: crate::witness::WitnessError| Trap::new(crate::error::TrapKind::Other(e.to_string()));
    witness.bind_quadratic_leg(quad, 0, a).map_err(to_trap)?;
    witness.bind_quadratic_leg(quad, 1, b).map_err(to_trap)?;
    witness.bind_quadratic_leg(quad, 2, c).map_err(to_trap)?;
    witness.commit_notify(a).map_err(to_trap)?;
    witness.commit_notify(b).map_err(to_trap)?;
    witness.commit_notify(c).map_err(to_trap)?;
    Ok(())
}

/// `a * b`, additionally opening a quadratic triple `(a, b, result)` so the
/// committed trace proves the product honestly.
pub fn mul_checked(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let (a, b, idx) = binop(stack, witness, crate::field::mul)?;
    bind_quadratic_triple(witness, a, b, idx)?;
    Ok(vec![Value::Witness(idx)])
}

/// `a / b`, computed as `a * b^-1` and checked via the quadratic triple
/// `(result, b, a)` (`result * b = a`); traps if `b` is zero since division
/// by zero has no witness to commit.
pub fn div_checked(
    stack: &mut Vec<Value>,
    _store: &mut Store,
    witness: &mut WitnessManager,
    _ctx: &mut GuestContext,
) -> Result<Vec<Value>, Trap> {
    let b = pop_witness(stack)?;
    let a = pop_witness(stack)?;
    let va = slot_val(witness, a)?;
    let vb = slot_val(witness, b)?;
    let vb_inv = crate::field::invmod_r(vb)
        .map_err(|e| Trap::new(crate::error::TrapKind::Other(format!("bn254fr.div_checked: {e}"))))?;
    let idx = witness.acquire_witness(crate::field::mul(va, vb_inv));
    bind_quadratic_triple(witness, idx, b, a)?;
    Ok(vec![Value::Witness(idx)])
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> GuestContext {
        GuestContext::empty()
    }

    #[test]
    fn add_sums_two_witnesses() {
        let mut witness = WitnessManager::new([0u8; 32]);
        let a = witness.acquire_witness(crate::F::from(3u64));
        let b = witness.acquire_witness(crate::F::from(4u64));
        let mut store = Store::new(&crate::decode::Program::default(), 1, None);
        let mut stack = vec![Value::Witness(a), Value::Witness(b)];
        let result = add(&mut stack, &mut store, &mut witness, &mut ctx()).unwrap();
        let idx = result[0].get_if_witness().unwrap();
        assert_eq!(witness.slot(idx).unwrap().val(), crate::F::from(7u64));
    }

    #[test]
    fn add_checked_pushes_zero_residual_when_honest() {
        let mut witness = WitnessManager::new([0u8; 32]);
        let a = witness.acquire_witness(crate::F::from(3u64));
        let b = witness.acquire_witness(crate::F::from(4u64));
        let mut store = Store::new(&crate::decode::Program::default(), 1, None);
        let mut stack = vec![Value::Witness(a), Value::Witness(b)];
        add_checked(&mut stack, &mut store, &mut witness, &mut ctx()).unwrap();
        assert_eq!(witness.linear_terms(), &[crate::F::from(0u64)]);
    }

    #[test]
    fn mul_checked_records_zero_quadratic_residual() {
        let mut witness = WitnessManager::new([0u8; 32]);
        let a = witness.acquire_witness(crate::F::from(3u64));
        let b = witness.acquire_witness(crate::F::from(4u64));
        let mut store = Store::new(&crate::decode::Program::default(), 1, None);
        let mut stack = vec![Value::Witness(a), Value::Witness(b)];
        let result = mul_checked(&mut stack, &mut store, &mut witness, &mut ctx()).unwrap();
        let idx = result[0].get_if_witness().unwrap();
        assert_eq!(witness.slot(idx).unwrap().val(), crate::F::from(12u64));
        assert_eq!(witness.quadratic_terms(), &[crate::F::from(0u64)]);
    }

    #[test]
    fn div_checked_inverts_and_records_zero_residual() {
        let mut witness = WitnessManager::new([0u8; 32]);
        let a = witness.acquire_witness(crate::F::from(12u64));
        let b = witness.acquire_witness(crate::F::from(4u64));
        let mut store = Store::new(&crate::decode::Program::default(), 1, None);
        let mut stack = vec![Value::Witness(a), Value::Witness(b)];
        let result = div_checked(&mut stack, &mut store, &mut witness, &mut ctx()).unwrap();
        let idx = result[0].get_if_witness().unwrap();
        assert_eq!(witness.slot(idx).unwrap().val(), crate::F::from(3u64));
        assert_eq!(witness.quadratic_terms(), &[crate::F::from(0u64)]);
    }
}
