//! Tree-walking interpreter over the structured instruction tree produced by
//! [`crate::decode`]. Execution threads an explicit [`ExecOutcome`] state
//! machine through every block instead of using native Rust control flow for
//! `br`/`br_if`/`br_table`/`return`, matching the source project's own
//! redesign note that WASM's structured branching is better modeled as data
//! than as host-language `break`/`continue`.

#![allow(missing_docs)]

use crate::decode::{DecodedFunction, Instr, Op, Program};
use crate::error::{Trap, TrapKind};
use crate::host::{GuestContext, HostDispatch};
use crate::interp::store::{FuncRef, Store};
use crate::interp::value::{Frame, NativeNumeric, RefVal, Value};
use crate::witness::WitnessManager;

/// Result of executing one instruction or block.
pub enum ExecOutcome {
    /// Fell through normally.
    Normal,
    /// `return` was hit; the frame's results are already on the stack.
    Return,
    /// A WASI-style explicit process exit.
    Exit(i32),
    /// A branch targeting the `label`-th enclosing scope (0 = innermost)
    /// still needs to unwind `label` more scopes before it is consumed.
    Branch(u32),
    /// Execution trapped.
    Trap(Trap),
}

/// One entry of the committed arithmetic trace: a single host call made
/// during execution, tagged with the witness slots it touched (its operands
/// and results that are managed witnesses, in call order).
#[derive(Clone, Debug)]
pub struct TraceEntry {
    pub op: String,
    pub witnesses: Vec<u32>,
}

pub struct Interpreter<'p, D: HostDispatch> {
    program: &'p Program,
    store: Store,
    witness: WitnessManager,
    dispatcher: D,
    ctx: GuestContext,
    stack: Vec<Value>,
    trace: Vec<TraceEntry>,
    call_depth: u32,
}

const MAX_CALL_DEPTH: u32 = 1024;

impl<'p, D: HostDispatch> Interpreter<'p, D> {
    pub fn new(program: &'p Program, store: Store, witness: WitnessManager, dispatcher: D) -> Self {
        Self::with_context(program, store, witness, dispatcher, GuestContext::empty())
    }

    pub fn with_context(
        program: &'p Program,
        store: Store,
        witness: WitnessManager,
        dispatcher: D,
        ctx: GuestContext,
    ) -> Self {
        Self { program, store, witness, dispatcher, ctx, stack: Vec::new(), trace: Vec::new(), call_depth: 0 }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut Store {
        &mut self.store
    }

    pub fn witness(&self) -> &WitnessManager {
        &self.witness
    }

    pub fn witness_mut(&mut self) -> &mut WitnessManager {
        &mut self.witness
    }

    pub fn trace(&self) -> &[TraceEntry] {
        &self.trace
    }

    /// Runs `func_index` (a guest function) with `args` already pushed in
    /// order, returning its result values.
    pub fn call_guest(&mut self, func_index: u32, args: Vec<Value>) -> Result<Vec<Value>, Trap> {
        self.call_depth += 1;
        if self.call_depth > MAX_CALL_DEPTH {
            self.call_depth -= 1;
            return Err(Trap::new(TrapKind::StackOverflow));
        }

        let func = self
            .program
            .functions
            .get(func_index as usize)
            .ok_or(Trap::new(TrapKind::Other(format!("no such function {func_index}"))))?;

        let mut locals = args;
        locals.resize_with((func.num_params + func.num_locals) as usize, || Value::i64(0));

        let base = self.stack.len();
        self.stack.push(Value::Frame(Box::new(Frame { locals, func_index })));

        let outcome = self.exec_block(&func.body, func_index);
        let result = match outcome {
            Ok(ExecOutcome::Normal) | Ok(ExecOutcome::Return) => {
                let mut results = self.stack.split_off(base + 1);
                // drop the frame marker itself
                self.stack.truncate(base);
                results.retain(|v| !v.is_frame());
                Ok(results)
            }
            Ok(ExecOutcome::Exit(code)) => {
                self.stack.truncate(base);
                Err(Trap::new(TrapKind::Other(format!("process exited with code {code}"))))
            }
            Ok(ExecOutcome::Branch(_)) => {
                self.stack.truncate(base);
                Err(Trap::new(TrapKind::Other("branch escaped function body".into())))
            }
            Ok(ExecOutcome::Trap(t)) | Err(t) => {
                self.stack.truncate(base);
                Err(t)
            }
        };
        self.call_depth -= 1;
        result
    }

    fn current_frame_index(&self) -> usize {
        self.stack.iter().rposition(Value::is_frame).expect("no active frame")
    }

    fn local(&self, func_index: u32, idx: u32) -> &Value {
        let frame_pos = self.current_frame_index();
        match &self.stack[frame_pos] {
            Value::Frame(f) if f.func_index == func_index => &f.locals[idx as usize],
            _ => unreachable!("frame/func_index mismatch"),
        }
    }

    fn set_local(&mut self, func_index: u32, idx: u32, v: Value) {
        let frame_pos = self.current_frame_index();
        match &mut self.stack[frame_pos] {
            Value::Frame(f) if f.func_index == func_index => f.locals[idx as usize] = v,
            _ => unreachable!("frame/func_index mismatch"),
        }
    }

    fn pop(&mut self) -> Result<Value, Trap> {
        self.stack.pop().ok_or(Trap::new(TrapKind::StackUnderflow))
    }

    fn pop_i32(&mut self) -> Result<i32, Trap> {
        self.pop()?.as_i32().ok_or(Trap::new(TrapKind::Other("expected i32".into())))
    }

    fn pop_i64(&mut self) -> Result<i64, Trap> {
        self.pop()?.as_i64().ok_or(Trap::new(TrapKind::Other("expected i64".into())))
    }

    fn exec_block(&mut self, body: &[Instr], func_index: u32) -> Result<ExecOutcome, Trap> {
        for instr in body {
            match self.exec_instr(instr, func_index)? {
                ExecOutcome::Normal => continue,
                other => return Ok(other),
            }
        }
        Ok(ExecOutcome::Normal)
    }

    fn exec_instr(&mut self, instr: &Instr, func_index: u32) -> Result<ExecOutcome, Trap> {
        match instr {
            Instr::BasicBlock { body, .. } => {
                for op in body {
                    self.exec_op(op, func_index)?;
                }
                Ok(ExecOutcome::Normal)
            }
            Instr::ScopedBlock { body, .. } => self.exec_scope(body, func_index),
            Instr::Loop { body, .. } => loop {
                match self.exec_scope(body, func_index)? {
                    ExecOutcome::Branch(0) => continue,
                    ExecOutcome::Branch(n) => return Ok(ExecOutcome::Branch(n - 1)),
                    other => return Ok(other),
                }
            },
            Instr::IfThenElse { then_body, else_body, .. } => {
                let cond = self.pop_i32()?;
                if cond != 0 {
                    self.exec_scope(then_body, func_index)
                } else {
                    self.exec_scope(else_body, func_index)
                }
            }
            Instr::Br { label } => Ok(ExecOutcome::Branch(*label)),
            Instr::BrIf { label } => {
                let cond = self.pop_i32()?;
                if cond != 0 {
                    Ok(ExecOutcome::Branch(*label))
                } else {
                    Ok(ExecOutcome::Normal)
                }
            }
            Instr::BrTable { branches, default } => {
                let idx = self.pop_i32()? as usize;
                let label = branches.get(idx).copied().unwrap_or(*default);
                Ok(ExecOutcome::Branch(label))
            }
            Instr::Call { func } => {
                self.exec_call(*func)?;
                Ok(ExecOutcome::Normal)
            }
            Instr::CallIndirect { table_index: _, type_index: _ } => {
                let table_idx = self.pop_i32()? as u32;
                let target = self.store.table_at(table_idx)?;
                let func_idx = target.0.ok_or(Trap::new(TrapKind::UninitializedElement))?;
                self.exec_call(func_idx)?;
                Ok(ExecOutcome::Normal)
            }
            Instr::Ret => Ok(ExecOutcome::Return),
        }
    }

    fn exec_scope(&mut self, body: &[Instr], func_index: u32) -> Result<ExecOutcome, Trap> {
        match self.exec_block(body, func_index)? {
            ExecOutcome::Branch(n) if n > 0 => Ok(ExecOutcome::Branch(n - 1)),
            other => Ok(other),
        }
    }

    fn exec_call(&mut self, func_idx: u32) -> Result<(), Trap> {
        match self.store.func_at(func_idx)? {
            FuncRef::Guest(g) => {
                // naive fixed-arity convention: callee consumes its declared
                // param count from the caller's stack.
                let func = &self.program.functions[g as usize];
                let nparams = func.num_params as usize;
                let len = self.stack.len();
                if len < nparams {
                    return Err(Trap::new(TrapKind::StackUnderflow));
                }
                let args = self.stack.split_off(len - nparams);
                let results = self.call_guest(g, args)?;
                self.stack.extend(results);
                Ok(())
            }
            FuncRef::Host(h) => {
                let import = &self.program.imports[h as usize];
                let module = import.module.clone();
                let name = import.name.clone();
                let before_len = self.witness.len() as u32;
                let Interpreter { dispatcher, stack, store, witness, ctx, .. } = self;
                let results = dispatcher.call(&module, &name, stack, store, witness, ctx)?;
                let mut touched: Vec<u32> = (before_len..self.witness.len() as u32).collect();
                touched.extend(results.iter().filter_map(Value::get_if_witness).filter(|w| *w < before_len));
                self.trace.push(TraceEntry { op: format!("{module}.{name}"), witnesses: touched });
                self.stack.extend(results);
                Ok(())
            }
        }
    }

    fn exec_op(&mut self, op: &Op, func_index: u32) -> Result<(), Trap> {
        use Op::*;
        match op {
            Nop => {}
            Unreachable => return Err(Trap::new(TrapKind::Unreachable)),
            I32Const(v) => self.stack.push(Value::i32(*v)),
            I64Const(v) => self.stack.push(Value::i64(*v)),
            I32Clz => self.unop_i32(|v| v.leading_zeros() as i32)?,
            I32Ctz => self.unop_i32(|v| v.trailing_zeros() as i32)?,
            I32Popcnt => self.unop_i32(|v| v.count_ones() as i32)?,
            I32Eqz => self.unop_i32(|v| (v == 0) as i32)?,
            I64Eqz => {
                let v = self.pop_i64()?;
                self.stack.push(Value::i32((v == 0) as i32));
            }
            I32Add => self.binop_i32(|a, b| a.wrapping_add(b))?,
            I32Sub => self.binop_i32(|a, b| a.wrapping_sub(b))?,
            I32Mul => self.binop_i32(|a, b| a.wrapping_mul(b))?,
            I32DivS => self.binop_i32_fallible(|a, b| {
                if b == 0 {
                    Err(TrapKind::DivideByZero)
                } else {
                    a.checked_div(b).ok_or(TrapKind::IntegerOverflow)
                }
            })?,
            I32DivU => self.binop_i32_fallible(|a, b| {
                if b == 0 {
                    Err(TrapKind::DivideByZero)
                } else {
                    Ok(((a as u32) / (b as u32)) as i32)
                }
            })?,
            I32RemS => self.binop_i32_fallible(|a, b| {
                if b == 0 {
                    Err(TrapKind::DivideByZero)
                } else {
                    Ok(a.wrapping_rem(b))
                }
            })?,
            I32RemU => self.binop_i32_fallible(|a, b| {
                if b == 0 {
                    Err(TrapKind::DivideByZero)
                } else {
                    Ok(((a as u32) % (b as u32)) as i32)
                }
            })?,
            I32And => self.binop_i32(|a, b| a & b)?,
            I32Or => self.binop_i32(|a, b| a | b)?,
            I32Xor => self.binop_i32(|a, b| a ^ b)?,
            I32Shl => self.binop_i32(|a, b| a.wrapping_shl(b as u32 & 31))?,
            I32ShrS => self.binop_i32(|a, b| a.wrapping_shr(b as u32 & 31))?,
            I32ShrU => self.binop_i32(|a, b| ((a as u32).wrapping_shr(b as u32 & 31)) as i32)?,
            I32Rotl => self.binop_i32(|a, b| (a as u32).rotate_left(b as u32 & 31) as i32)?,
            I32Rotr => self.binop_i32(|a, b| (a as u32).rotate_right(b as u32 & 31) as i32)?,
            I64Add => self.binop_i64(|a, b| a.wrapping_add(b))?,
            I64Sub => self.binop_i64(|a, b| a.wrapping_sub(b))?,
            I64Mul => self.binop_i64(|a, b| a.wrapping_mul(b))?,
            I64DivS => self.binop_i64_fallible(|a, b| {
                if b == 0 {
                    Err(TrapKind::DivideByZero)
                } else {
                    a.checked_div(b).ok_or(TrapKind::IntegerOverflow)
                }
            })?,
            I64DivU => self.binop_i64_fallible(|a, b| {
                if b == 0 {
                    Err(TrapKind::DivideByZero)
                } else {
                    Ok(((a as u64) / (b as u64)) as i64)
                }
            })?,
            I64RemS => self.binop_i64_fallible(|a, b| {
                if b == 0 {
                    Err(TrapKind::DivideByZero)
                } else {
                    Ok(a.wrapping_rem(b))
                }
            })?,
            I64RemU => self.binop_i64_fallible(|a, b| {
                if b == 0 {
                    Err(TrapKind::DivideByZero)
                } else {
                    Ok(((a as u64) % (b as u64)) as i64)
                }
            })?,
            I64And => self.binop_i64(|a, b| a & b)?,
            I64Or => self.binop_i64(|a, b| a | b)?,
            I64Xor => self.binop_i64(|a, b| a ^ b)?,
            I64Shl => self.binop_i64(|a, b| a.wrapping_shl(b as u32 & 63))?,
            I64ShrS => self.binop_i64(|a, b| a.wrapping_shr(b as u32 & 63))?,
            I64ShrU => self.binop_i64(|a, b| ((a as u64).wrapping_shr(b as u32 & 63)) as i64)?,
            I32Eq => self.cmp_i32(|a, b| a == b)?,
            I32Ne => self.cmp_i32(|a, b| a != b)?,
            I32LtS => self.cmp_i32(|a, b| a < b)?,
            I32LtU => self.cmp_i32(|a, b| (a as u32) < (b as u32))?,
            I32GtS => self.cmp_i32(|a, b| a > b)?,
            I32GtU => self.cmp_i32(|a, b| (a as u32) > (b as u32))?,
            I32LeS => self.cmp_i32(|a, b| a <= b)?,
            I32LeU => self.cmp_i32(|a, b| (a as u32) <= (b as u32))?,
            I32GeS => self.cmp_i32(|a, b| a >= b)?,
            I32GeU => self.cmp_i32(|a, b| (a as u32) >= (b as u32))?,
            I64Eq => self.cmp_i64(|a, b| a == b)?,
            I64Ne => self.cmp_i64(|a, b| a != b)?,
            I64LtS => self.cmp_i64(|a, b| a < b)?,
            I64LtU => self.cmp_i64(|a, b| (a as u64) < (b as u64))?,
            I64GtS => self.cmp_i64(|a, b| a > b)?,
            I64GtU => self.cmp_i64(|a, b| (a as u64) > (b as u64))?,
            I64LeS => self.cmp_i64(|a, b| a <= b)?,
            I64LeU => self.cmp_i64(|a, b| (a as u64) <= (b as u64))?,
            I64GeS => self.cmp_i64(|a, b| a >= b)?,
            I64GeU => self.cmp_i64(|a, b| (a as u64) >= (b as u64))?,
            I32WrapI64 => {
                let v = self.pop_i64()?;
                self.stack.push(Value::i32(v as i32));
            }
            I64ExtendI32S => {
                let v = self.pop_i32()?;
                self.stack.push(Value::i64(v as i64));
            }
            I64ExtendI32U => {
                let v = self.pop_i32()?;
                self.stack.push(Value::i64(v as u32 as i64));
            }
            I32Extend8S => self.unop_i32(|v| (v as i8) as i32)?,
            I32Extend16S => self.unop_i32(|v| (v as i16) as i32)?,
            I32Load { offset } => {
                let addr = self.pop_addr(*offset)?;
                let bytes = self.store.read(addr, 4)?;
                self.stack.push(Value::i32(i32::from_le_bytes(bytes.try_into().unwrap())));
            }
            I64Load { offset } => {
                let addr = self.pop_addr(*offset)?;
                let bytes = self.store.read(addr, 8)?;
                self.stack.push(Value::i64(i64::from_le_bytes(bytes.try_into().unwrap())));
            }
            I32Load8S { offset } => self.load_narrow_i32(*offset, 1, true)?,
            I32Load8U { offset } => self.load_narrow_i32(*offset, 1, false)?,
            I32Load16S { offset } => self.load_narrow_i32(*offset, 2, true)?,
            I32Load16U { offset } => self.load_narrow_i32(*offset, 2, false)?,
            I64Load8S { offset } => self.load_narrow_i64(*offset, 1, true)?,
            I64Load8U { offset } => self.load_narrow_i64(*offset, 1, false)?,
            I64Load16S { offset } => self.load_narrow_i64(*offset, 2, true)?,
            I64Load16U { offset } => self.load_narrow_i64(*offset, 2, false)?,
            I64Load32S { offset } => self.load_narrow_i64(*offset, 4, true)?,
            I64Load32U { offset } => self.load_narrow_i64(*offset, 4, false)?,
            I32Store { offset } => {
                let v = self.pop_i32()?;
                let addr = self.pop_addr(*offset)?;
                self.store.write(addr, &v.to_le_bytes())?;
            }
            I64Store { offset } => {
                let v = self.pop_i64()?;
                let addr = self.pop_addr(*offset)?;
                self.store.write(addr, &v.to_le_bytes())?;
            }
            I32Store8 { offset } => {
                let v = self.pop_i32()?;
                let addr = self.pop_addr(*offset)?;
                self.store.write(addr, &(v as u8).to_le_bytes())?;
            }
            I32Store16 { offset } => {
                let v = self.pop_i32()?;
                let addr = self.pop_addr(*offset)?;
                self.store.write(addr, &(v as u16).to_le_bytes())?;
            }
            I64Store8 { offset } => {
                let v = self.pop_i64()?;
                let addr = self.pop_addr(*offset)?;
                self.store.write(addr, &(v as u8).to_le_bytes())?;
            }
            I64Store16 { offset } => {
                let v = self.pop_i64()?;
                let addr = self.pop_addr(*offset)?;
                self.store.write(addr, &(v as u16).to_le_bytes())?;
            }
            I64Store32 { offset } => {
                let v = self.pop_i64()?;
                let addr = self.pop_addr(*offset)?;
                self.store.write(addr, &(v as u32).to_le_bytes())?;
            }
            MemorySize => self.stack.push(Value::i32(self.store.pages() as i32)),
            MemoryGrow => {
                let delta = self.pop_i32()? as u32;
                let result = self.store.grow(delta).map(|p| p as i32).unwrap_or(-1);
                self.stack.push(Value::i32(result));
            }
            MemoryFill => {
                let len = self.pop_i32()? as u64;
                let val = self.pop_i32()? as u8;
                let addr = self.pop_i32()? as u64;
                for i in 0..len {
                    self.store.write(addr + i, &[val])?;
                }
            }
            MemoryCopy => {
                let len = self.pop_i32()? as u64;
                let src = self.pop_i32()? as u64;
                let dst = self.pop_i32()? as u64;
                let bytes = self.store.read(src, len)?.to_vec();
                self.store.write(dst, &bytes)?;
            }
            Drop => {
                self.pop()?;
            }
            Select => {
                let cond = self.pop_i32()?;
                let b = self.pop()?;
                let a = self.pop()?;
                self.stack.push(if cond != 0 { a } else { b });
            }
            LocalGet(idx) => {
                let v = self.local(func_index, *idx).clone();
                self.stack.push(v);
            }
            LocalSet(idx) => {
                let v = self.pop()?;
                self.set_local(func_index, *idx, v);
            }
            LocalTee(idx) => {
                let v = self.pop()?;
                self.stack.push(v.clone());
                self.set_local(func_index, *idx, v);
            }
            GlobalGet(idx) => {
                let v = self
                    .store
                    .globals
                    .get(*idx as usize)
                    .ok_or(Trap::new(TrapKind::Other(format!("no such global {idx}"))))?
                    .clone();
                self.stack.push(v);
            }
            GlobalSet(idx) => {
                let v = self.pop()?;
                let slot = self
                    .store
                    .globals
                    .get_mut(*idx as usize)
                    .ok_or(Trap::new(TrapKind::Other(format!("no such global {idx}"))))?;
                *slot = v;
            }
        }
        Ok(())
    }

    fn pop_addr(&mut self, offset: u64) -> Result<u64, Trap> {
        let base = self.pop_i32()? as u32 as u64;
        Ok(base + offset)
    }

    fn load_narrow_i32(&mut self, offset: u64, width: u64, signed: bool) -> Result<(), Trap> {
        let addr = self.pop_addr(offset)?;
        let bytes = self.store.read(addr, width)?;
        let mut buf = [0u8; 4];
        buf[..width as usize].copy_from_slice(bytes);
        let unsigned = u32::from_le_bytes(buf);
        let v = if signed {
            let shift = 32 - width * 8;
            ((unsigned << shift) as i32) >> shift
        } else {
            unsigned as i32
        };
        self.stack.push(Value::i32(v));
        Ok(())
    }

    fn load_narrow_i64(&mut self, offset: u64, width: u64, signed: bool) -> Result<(), Trap> {
        let addr = self.pop_addr(offset)?;
        let bytes = self.store.read(addr, width)?;
        let mut buf = [0u8; 8];
        buf[..width as usize].copy_from_slice(bytes);
        let unsigned = u64::from_le_bytes(buf);
        let v = if signed {
            let shift = 64 - width * 8;
            ((unsigned << shift) as i64) >> shift
        } else {
            unsigned as i64
        };
        self.stack.push(Value::i64(v));
        Ok(())
    }

    fn unop_i32(&mut self, f: impl FnOnce(i32) -> i32) -> Result<(), Trap> {
        let v = self.pop_i32()?;
        self.stack.push(Value::i32(f(v)));
        Ok(())
    }

    fn binop_i32(&mut self, f: impl FnOnce(i32, i32) -> i32) -> Result<(), Trap> {
        let b = self.pop_i32()?;
        let a = self.pop_i32()?;
        self.stack.push(Value::i32(f(a, b)));
        Ok(())
    }

    fn binop_i32_fallible(&mut self, f: impl FnOnce(i32, i32) -> Result<i32, TrapKind>) -> Result<(), Trap> {
        let b = self.pop_i32()?;
        let a = self.pop_i32()?;
        self.stack.push(Value::i32(f(a, b).map_err(Trap::new)?));
        Ok(())
    }

    fn binop_i64(&mut self, f: impl FnOnce(i64, i64) -> i64) -> Result<(), Trap> {
        let b = self.pop_i64()?;
        let a = self.pop_i64()?;
        self.stack.push(Value::i64(f(a, b)));
        Ok(())
    }

    fn binop_i64_fallible(&mut self, f: impl FnOnce(i64, i64) -> Result<i64, TrapKind>) -> Result<(), Trap> {
        let b = self.pop_i64()?;
        let a = self.pop_i64()?;
        self.stack.push(Value::i64(f(a, b).map_err(Trap::new)?));
        Ok(())
    }

    fn cmp_i32(&mut self, f: impl FnOnce(i32, i32) -> bool) -> Result<(), Trap> {
        let b = self.pop_i32()?;
        let a = self.pop_i32()?;
        self.stack.push(Value::i32(f(a, b) as i32));
        Ok(())
    }

    fn cmp_i64(&mut self, f: impl FnOnce(i64, i64) -> bool) -> Result<(), Trap> {
        let b = self.pop_i64()?;
        let a = self.pop_i64()?;
        self.stack.push(Value::i32(f(a, b) as i32));
        Ok(())
    }
}
