//! WASM binary/text -> structured instruction tree.
//!
//! Binary decoding itself is delegated to `wasmparser` (the decoder is an
//! explicitly out-of-scope "thin external collaborator" per the integer/
//! memory-subset design); `.wat` text is converted to binary via `wat`
//! first. `wasmparser` yields a flat operator stream per function body, so
//! this module recovers the nested block/loop/if structure described by
//! `include/opcode.hpp`'s `structured_instr` hierarchy (`basic_block`,
//! `scoped_block`, `loop`, `if_then_else`, `br`, `br_if`, `br_table`, `call`,
//! `call_indirect`, `ret`).

#![forbid(unsafe_code)]
#![allow(missing_docs)]

use thiserror::Error;
use wasmparser::{FunctionBody, Operator, Parser, Payload};

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("wat->wasm conversion failed: {0}")]
    Wat(String),
    #[error("wasm parser error: {0}")]
    Parser(String),
    #[error("unsupported operator: {0}")]
    Unsupported(String),
    #[error("malformed control-flow nesting")]
    BadNesting,
}

/// A straight-line run of numeric/memory/variable operators, the leaves of
/// the structured instruction tree.
#[derive(Clone, Debug)]
pub enum Op {
    Nop,
    I32Const(i32),
    I64Const(i64),
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Eqz,
    I64Eqz,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Or,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rotl,
    I32Rotr,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Or,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
    I32WrapI64,
    I64ExtendI32S,
    I64ExtendI32U,
    I32Extend8S,
    I32Extend16S,
    I32Load { offset: u64 },
    I64Load { offset: u64 },
    I32Load8S { offset: u64 },
    I32Load8U { offset: u64 },
    I32Load16S { offset: u64 },
    I32Load16U { offset: u64 },
    I64Load8S { offset: u64 },
    I64Load8U { offset: u64 },
    I64Load16S { offset: u64 },
    I64Load16U { offset: u64 },
    I64Load32S { offset: u64 },
    I64Load32U { offset: u64 },
    I32Store { offset: u64 },
    I64Store { offset: u64 },
    I32Store8 { offset: u64 },
    I32Store16 { offset: u64 },
    I64Store8 { offset: u64 },
    I64Store16 { offset: u64 },
    I64Store32 { offset: u64 },
    MemorySize,
    MemoryGrow,
    MemoryFill,
    MemoryCopy,
    Drop,
    Select,
    LocalGet(u32),
    LocalSet(u32),
    LocalTee(u32),
    GlobalGet(u32),
    GlobalSet(u32),
    Unreachable,
}

/// Tagged instruction tree node; mirrors `structured_instr` exactly.
#[derive(Clone, Debug)]
pub enum Instr {
    BasicBlock { id: usize, body: Vec<Op> },
    ScopedBlock { label: String, body: Vec<Instr> },
    Loop { label: String, body: Vec<Instr> },
    IfThenElse { label: String, then_body: Vec<Instr>, else_body: Vec<Instr> },
    Br { label: u32 },
    BrIf { label: u32 },
    BrTable { branches: Vec<u32>, default: u32 },
    Call { func: u32 },
    CallIndirect { table_index: u32, type_index: u32 },
    Ret,
}

/// One decoded function: its structured body plus the (locals, imports)
/// metadata the interpreter's store needs to set up a frame.
#[derive(Clone, Debug)]
pub struct DecodedFunction {
    pub name: Option<String>,
    pub num_params: u32,
    pub num_locals: u32,
    pub body: Vec<Instr>,
}

/// An import the interpreter must resolve to a host module function before
/// execution (module name, function name).
#[derive(Clone, Debug)]
pub struct ImportedFunction {
    pub module: String,
    pub name: String,
}

/// A fully decoded program: its functions in index order (imports first,
/// matching the WASM function-index space) and which indices are imports.
#[derive(Clone, Debug, Default)]
pub struct Program {
    pub imports: Vec<ImportedFunction>,
    pub functions: Vec<DecodedFunction>,
    pub start: Option<u32>,
}

/// Converts `.wat`/`.wast` text to binary, then decodes; binary inputs are
/// decoded directly.
pub fn decode_program(bytes: &[u8]) -> Result<Program, DecodeError> {
    let wasm: Vec<u8> = if bytes.starts_with(b"\0asm") {
        bytes.to_vec()
    } else {
        wat::parse_bytes(bytes).map_err(|e| DecodeError::Wat(e.to_string()))?.into_owned()
    };
    decode_binary(&wasm)
}

fn decode_binary(wasm: &[u8]) -> Result<Program, DecodeError> {
    let mut program = Program::default();
    let mut func_type_indices = Vec::new();
    let mut bodies: Vec<FunctionBody> = Vec::new();

    for payload in Parser::new(0).parse_all(wasm) {
        let payload = payload.map_err(|e| DecodeError::Parser(e.to_string()))?;
        match payload {
            Payload::ImportSection(reader) => {
                for import in reader {
                    let import = import.map_err(|e| DecodeError::Parser(e.to_string()))?;
                    if matches!(import.ty, wasmparser::TypeRef::Func(_)) {
                        program.imports.push(ImportedFunction {
                            module: import.module.to_string(),
                            name: import.name.to_string(),
                        });
                    }
                }
            }
            Payload::FunctionSection(reader) => {
                for ty in reader {
                    func_type_indices.push(ty.map_err(|e| DecodeError::Parser(e.to_string()))?);
                }
            }
            Payload::StartSection { func, .. } => {
                program.start = Some(func);
            }
            Payload::CodeSectionEntry(body) => {
                bodies.push(body);
            }
            _ => {}
        }
    }

    for body in bodies {
        program.functions.push(decode_function(body)?);
    }

    Ok(program)
}

fn decode_function(body: FunctionBody) -> Result<DecodedFunction, DecodeError> {
    let mut num_locals = 0u32;
    for local in body.get_locals_reader().map_err(|e| DecodeError::Parser(e.to_string()))? {
        let (count, _ty) = local.map_err(|e| DecodeError::Parser(e.to_string()))?;
        num_locals += count;
    }

    let reader = body.get_operators_reader().map_err(|e| DecodeError::Parser(e.to_string()))?;
    let ops: Vec<Operator> = reader.into_iter().collect::<Result<_, _>>().map_err(|e| DecodeError::Parser(e.to_string()))?;

    let mut builder = TreeBuilder::new();
    builder.run(&ops)?;
    let body = builder.finish()?;

    Ok(DecodedFunction { name: None, num_params: 0, num_locals, body })
}

/// Recovers nested block/loop/if structure from a flat `Operator` stream by
/// walking a stack of open scopes, closing one on every matching `End`.
struct TreeBuilder {
    scopes: Vec<(ScopeKind, Vec<Instr>)>,
    block_counter: usize,
    current_basic: Vec<Op>,
}

enum ScopeKind {
    Function,
    Block,
    Loop,
    IfThen,
    IfElse,
}

impl TreeBuilder {
    fn new() -> Self {
        Self { scopes: vec![(ScopeKind::Function, Vec::new())], block_counter: 0, current_basic: Vec::new() }
    }

    fn flush_basic(&mut self) {
        if !self.current_basic.is_empty() {
            let id = self.block_counter;
            self.block_counter += 1;
            let body = std::mem::take(&mut self.current_basic);
            self.scopes.last_mut().unwrap().1.push(Instr::BasicBlock { id, body });
        }
    }

    fn push_op(&mut self, op: Op) {
        self.current_basic.push(op);
    }

    fn run(&mut self, ops: &[Operator]) -> Result<(), DecodeError> {
        for op in ops {
            self.step(op)?;
        }
        Ok(())
    }

    fn step(&mut self, op: &Operator) -> Result<(), DecodeError> {
        match op {
            Operator::Block { .. } => {
                self.flush_basic();
                self.scopes.push((ScopeKind::Block, Vec::new()));
            }
            Operator::Loop { .. } => {
                self.flush_basic();
                self.scopes.push((ScopeKind::Loop, Vec::new()));
            }
            Operator::If { .. } => {
                self.flush_basic();
                self.scopes.push((ScopeKind::IfThen, Vec::new()));
            }
            Operator::Else => {
                self.flush_basic();
                let (kind, body) = self.scopes.pop().ok_or(DecodeError::BadNesting)?;
                if !matches!(kind, ScopeKind::IfThen) {
                    return Err(DecodeError::BadNesting);
                }
                self.scopes.push((ScopeKind::IfElse, body));
                // stash the then-body in a temp scope entry so `End` can pair it
                self.scopes.push((ScopeKind::Block, Vec::new()));
            }
            Operator::End => {
                self.flush_basic();
                let (kind, body) = self.scopes.pop().ok_or(DecodeError::BadNesting)?;
                match kind {
                    ScopeKind::Function => {
                        self.scopes.push((ScopeKind::Function, body));
                        return Ok(());
                    }
                    ScopeKind::Block => {
                        self.scopes
                            .last_mut()
                            .ok_or(DecodeError::BadNesting)?
                            .1
                            .push(Instr::ScopedBlock { label: String::new(), body });
                    }
                    ScopeKind::Loop => {
                        self.scopes
                            .last_mut()
                            .ok_or(DecodeError::BadNesting)?
                            .1
                            .push(Instr::Loop { label: String::new(), body });
                    }
                    ScopeKind::IfThen => {
                        self.scopes
                            .last_mut()
                            .ok_or(DecodeError::BadNesting)?
                            .1
                            .push(Instr::IfThenElse { label: String::new(), then_body: body, else_body: Vec::new() });
                    }
                    ScopeKind::IfElse => {
                        // top of stack (just popped) is the else-body; below it
                        // sits the then-body stashed when `Else` was seen.
                        let else_body = body;
                        let (then_kind, then_body) = self.scopes.pop().ok_or(DecodeError::BadNesting)?;
                        if !matches!(then_kind, ScopeKind::IfElse) {
                            return Err(DecodeError::BadNesting);
                        }
                        self.scopes
                            .last_mut()
                            .ok_or(DecodeError::BadNesting)?
                            .1
                            .push(Instr::IfThenElse { label: String::new(), then_body, else_body });
                    }
                }
            }
            Operator::Br { relative_depth } => {
                self.flush_basic();
                self.scopes.last_mut().unwrap().1.push(Instr::Br { label: *relative_depth });
            }
            Operator::BrIf { relative_depth } => {
                self.flush_basic();
                self.scopes.last_mut().unwrap().1.push(Instr::BrIf { label: *relative_depth });
            }
            Operator::BrTable { targets } => {
                self.flush_basic();
                let default = targets.default();
                let branches: Vec<u32> = targets.targets().collect::<Result<_, _>>().map_err(|e| DecodeError::Parser(e.to_string()))?;
                self.scopes.last_mut().unwrap().1.push(Instr::BrTable { branches, default });
            }
            Operator::Call { function_index } => {
                self.flush_basic();
                self.scopes.last_mut().unwrap().1.push(Instr::Call { func: *function_index });
            }
            Operator::CallIndirect { type_index, table_index, .. } => {
                self.flush_basic();
                self.scopes
                    .last_mut()
                    .unwrap()
                    .1
                    .push(Instr::CallIndirect { table_index: *table_index, type_index: *type_index });
            }
            Operator::Return => {
                self.flush_basic();
                self.scopes.last_mut().unwrap().1.push(Instr::Ret);
            }
            Operator::Unreachable => self.push_op(Op::Unreachable),
            Operator::Nop => self.push_op(Op::Nop),
            Operator::I32Const { value } => self.push_op(Op::I32Const(*value)),
            Operator::I64Const { value } => self.push_op(Op::I64Const(*value)),
            Operator::I32Clz => self.push_op(Op::I32Clz),
            Operator::I32Ctz => self.push_op(Op::I32Ctz),
            Operator::I32Popcnt => self.push_op(Op::I32Popcnt),
            Operator::I32Eqz => self.push_op(Op::I32Eqz),
            Operator::I64Eqz => self.push_op(Op::I64Eqz),
            Operator::I32Add => self.push_op(Op::I32Add),
            Operator::I32Sub => self.push_op(Op::I32Sub),
            Operator::I32Mul => self.push_op(Op::I32Mul),
            Operator::I32DivS => self.push_op(Op::I32DivS),
            Operator::I32DivU => self.push_op(Op::I32DivU),
            Operator::I32RemS => self.push_op(Op::I32RemS),
            Operator::I32RemU => self.push_op(Op::I32RemU),
            Operator::I32And => self.push_op(Op::I32And),
            Operator::I32Or => self.push_op(Op::I32Or),
            Operator::I32Xor => self.push_op(Op::I32Xor),
            Operator::I32Shl => self.push_op(Op::I32Shl),
            Operator::I32ShrS => self.push_op(Op::I32ShrS),
            Operator::I32ShrU => self.push_op(Op::I32ShrU),
            Operator::I32Rotl => self.push_op(Op::I32Rotl),
            Operator::I32Rotr => self.push_op(Op::I32Rotr),
            Operator::I64Add => self.push_op(Op::I64Add),
            Operator::I64Sub => self.push_op(Op::I64Sub),
            Operator::I64Mul => self.push_op(Op::I64Mul),
            Operator::I64DivS => self.push_op(Op::I64DivS),
            Operator::I64DivU => self.push_op(Op::I64DivU),
            Operator::I64RemS => self.push_op(Op::I64RemS),
            Operator::I64RemU => self.push_op(Op::I64RemU),
            Operator::I64And => self.push_op(Op::I64And),
            Operator::I64Or => self.push_op(Op::I64Or),
            Operator::I64Xor => self.push_op(Op::I64Xor),
            Operator::I64Shl => self.push_op(Op::I64Shl),
            Operator::I64ShrS => self.push_op(Op::I64ShrS),
            Operator::I64ShrU => self.push_op(Op::I64ShrU),
            Operator::I32Eq => self.push_op(Op::I32Eq),
            Operator::I32Ne => self.push_op(Op::I32Ne),
            Operator::I32LtS => self.push_op(Op::I32LtS),
            Operator::I32LtU => self.push_op(Op::I32LtU),
            Operator::I32GtS => self.push_op(Op::I32GtS),
            Operator::I32GtU => self.push_op(Op::I32GtU),
            Operator::I32LeS => self.push_op(Op::I32LeS),
            Operator::I32LeU => self.push_op(Op::I32LeU),
            Operator::I32GeS => self.push_op(Op::I32GeS),
            Operator::I32GeU => self.push_op(Op::I32GeU),
            Operator::I64Eq => self.push_op(Op::I64Eq),
            Operator::I64Ne => self.push_op(Op::I64Ne),
            Operator::I64LtS => self.push_op(Op::I64LtS),
            Operator::I64LtU => self.push_op(Op::I64LtU),
            Operator::I64GtS => self.push_op(Op::I64GtS),
            Operator::I64GtU => self.push_op(Op::I64GtU),
            Operator::I64LeS => self.push_op(Op::I64LeS),
            Operator::I64LeU => self.push_op(Op::I64LeU),
            Operator::I64GeS => self.push_op(Op::I64GeS),
            Operator::I64GeU => self.push_op(Op::I64GeU),
            Operator::I32WrapI64 => self.push_op(Op::I32WrapI64),
            Operator::I64ExtendI32S => self.push_op(Op::I64ExtendI32S),
            Operator::I64ExtendI32U => self.push_op(Op::I64ExtendI32U),
            Operator::I32Extend8S => self.push_op(Op::I32Extend8S),
            Operator::I32Extend16S => self.push_op(Op::I32Extend16S),
            Operator::I32Load { memarg } => self.push_op(Op::I32Load { offset: memarg.offset }),
            Operator::I64Load { memarg } => self.push_op(Op::I64Load { offset: memarg.offset }),
            Operator::I32Load8S { memarg } => self.push_op(Op::I32Load8S { offset: memarg.offset }),
            Operator::I32Load8U { memarg } => self.push_op(Op::I32Load8U { offset: memarg.offset }),
            Operator::I32Load16S { memarg } => self.push_op(Op::I32Load16S { offset: memarg.offset }),
            Operator::I32Load16U { memarg } => self.push_op(Op::I32Load16U { offset: memarg.offset }),
            Operator::I64Load8S { memarg } => self.push_op(Op::I64Load8S { offset: memarg.offset }),
            Operator::I64Load8U { memarg } => self.push_op(Op::I64Load8U { offset: memarg.offset }),
            Operator::I64Load16S { memarg } => self.push_op(Op::I64Load16S { offset: memarg.offset }),
            Operator::I64Load16U { memarg } => self.push_op(Op::I64Load16U { offset: memarg.offset }),
            Operator::I64Load32S { memarg } => self.push_op(Op::I64Load32S { offset: memarg.offset }),
            Operator::I64Load32U { memarg } => self.push_op(Op::I64Load32U { offset: memarg.offset }),
            Operator::I32Store { memarg } => self.push_op(Op::I32Store { offset: memarg.offset }),
            Operator::I64Store { memarg } => self.push_op(Op::I64Store { offset: memarg.offset }),
            Operator::I32Store8 { memarg } => self.push_op(Op::I32Store8 { offset: memarg.offset }),
            Operator::I32Store16 { memarg } => self.push_op(Op::I32Store16 { offset: memarg.offset }),
            Operator::I64Store8 { memarg } => self.push_op(Op::I64Store8 { offset: memarg.offset }),
            Operator::I64Store16 { memarg } => self.push_op(Op::I64Store16 { offset: memarg.offset }),
            Operator::I64Store32 { memarg } => self.push_op(Op::I64Store32 { offset: memarg.offset }),
            Operator::MemorySize { .. } => self.push_op(Op::MemorySize),
            Operator::MemoryGrow { .. } => self.push_op(Op::MemoryGrow),
            Operator::MemoryFill { .. } => self.push_op(Op::MemoryFill),
            Operator::MemoryCopy { .. } => self.push_op(Op::MemoryCopy),
            Operator::Drop => self.push_op(Op::Drop),
            Operator::Select => self.push_op(Op::Select),
            Operator::LocalGet { local_index } => self.push_op(Op::LocalGet(*local_index)),
            Operator::LocalSet { local_index } => self.push_op(Op::LocalSet(*local_index)),
            Operator::LocalTee { local_index } => self.push_op(Op::LocalTee(*local_index)),
            Operator::GlobalGet { global_index } => self.push_op(Op::GlobalGet(*global_index)),
            Operator::GlobalSet { global_index } => self.push_op(Op::GlobalSet(*global_index)),
            other => return Err(DecodeError::Unsupported(format!("{other:?}"))),
        }
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Instr>, DecodeError> {
        self.flush_basic();
        if self.scopes.len() != 1 {
            return Err(DecodeError::BadNesting);
        }
        Ok(self.scopes.pop().unwrap().1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_straight_line_function() {
        let wat = r#"
            (module
              (func (export "add") (param i32 i32) (result i32)
                local.get 0
                local.get 1
                i32.add))
        "#;
        let program = decode_program(wat.as_bytes()).unwrap();
        assert_eq!(program.functions.len(), 1);
        match &program.functions[0].body[0] {
            Instr::BasicBlock { body, .. } => assert_eq!(body.len(), 3),
            other => panic!("expected a basic block, got {other:?}"),
        }
    }

    #[test]
    fn decodes_if_then_else() {
        let wat = r#"
            (module
              (func (param i32) (result i32)
                local.get 0
                (if (result i32)
                  (then i32.const 1)
                  (else i32.const 0))))
        "#;
        let program = decode_program(wat.as_bytes()).unwrap();
        let body = &program.functions[0].body;
        assert!(body.iter().any(|i| matches!(i, Instr::IfThenElse { .. })));
    }

    #[test]
    fn decodes_loop_with_branch() {
        let wat = r#"
            (module
              (func
                (loop
                  br 0)))
        "#;
        let program = decode_program(wat.as_bytes()).unwrap();
        let body = &program.functions[0].body;
        assert!(matches!(body[0], Instr::Loop { .. }));
    }
}
