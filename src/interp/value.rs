//! Interpreter value stack.
//!
//! Mirrors `stack_value.hpp`'s tagged variant: every value living on the
//! operand stack is either a plain numeric, a reference, a block label
//! (carrying its arity for branch unwinding), a nested call frame, a
//! managed-witness handle into the [`crate::witness::WitnessManager`], or a
//! bit-decomposition result used by the big-integer host modules.

#![allow(missing_docs)]

/// i32/i64 numeric payload. Floats are out of scope for this interpreter's
/// integer/memory subset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NativeNumeric {
    I32(i32),
    I64(i64),
}

impl NativeNumeric {
    pub fn as_i32(&self) -> Option<i32> {
        match self {
            NativeNumeric::I32(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            NativeNumeric::I64(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_i32().map(|v| v as u32)
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_i64().map(|v| v as u64)
    }
}

/// Reference value (function or externref index); null is `None`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RefVal(pub Option<u32>);

/// One frame of a nested call; boxed since `Value::Frame` would otherwise
/// make `Value` infinitely sized.
#[derive(Clone, Debug, Default)]
pub struct Frame {
    pub locals: Vec<Value>,
    pub func_index: u32,
}

/// A value living on the interpreter's operand stack.
#[derive(Clone, Debug)]
pub enum Value {
    Num(NativeNumeric),
    Ref(RefVal),
    Label { arity: u32 },
    Frame(Box<Frame>),
    Witness(u32),
    DecomposedBits(Vec<bool>),
}

impl Value {
    pub fn i32(v: i32) -> Self {
        Value::Num(NativeNumeric::I32(v))
    }

    pub fn i64(v: i64) -> Self {
        Value::Num(NativeNumeric::I64(v))
    }

    pub fn is_val(&self) -> bool {
        matches!(self, Value::Num(_))
    }

    pub fn is_ref(&self) -> bool {
        matches!(self, Value::Ref(_))
    }

    pub fn is_label(&self) -> bool {
        matches!(self, Value::Label { .. })
    }

    pub fn is_frame(&self) -> bool {
        matches!(self, Value::Frame(_))
    }

    pub fn is_witness(&self) -> bool {
        matches!(self, Value::Witness(_))
    }

    pub fn is_decomposed_bits(&self) -> bool {
        matches!(self, Value::DecomposedBits(_))
    }

    pub fn as_num(&self) -> Option<NativeNumeric> {
        match self {
            Value::Num(n) => Some(*n),
            _ => None,
        }
    }

    pub fn get_if_witness(&self) -> Option<u32> {
        match self {
            Value::Witness(w) => Some(*w),
            _ => None,
        }
    }

    pub fn as_i32(&self) -> Option<i32> {
        self.as_num().and_then(|n| n.as_i32())
    }

    pub fn as_i64(&self) -> Option<i64> {
        self.as_num().and_then(|n| n.as_i64())
    }

    pub fn as_u32(&self) -> Option<u32> {
        self.as_num().and_then(|n| n.as_u32())
    }

    pub fn as_u64(&self) -> Option<u64> {
        self.as_num().and_then(|n| n.as_u64())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predicates_agree_with_variant() {
        let v = Value::i32(7);
        assert!(v.is_val());
        assert!(!v.is_ref());
        assert_eq!(v.as_i32(), Some(7));
    }

    #[test]
    fn witness_round_trips() {
        let v = Value::Witness(3);
        assert!(v.is_witness());
        assert_eq!(v.get_if_witness(), Some(3));
    }
}
