use corvid_ir::{BlockType, GlobalIdx, Instr, LabelIdx, LocalIdx, MemIdx, TableIdx};
use smallvec::SmallVec;

use crate::function::FuncInst;
use crate::numerics;
use crate::stack::Stack;
use crate::{Config, FuncAddr, GlobalInst, MemInst, ModuleInstance, Store, TableInst, Trap, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LabelKind {
    Block,
    Loop,
    Func,
}

#[derive(Debug, Clone, Copy)]
struct Label<'s> {
    kind: LabelKind,
    // values carried by a branch to this label
    branch_arity: usize,
    // values left behind when the body runs to completion
    end_arity: usize,
    height: usize,
    instrs: &'s [Instr],
    pc: usize,
}

#[derive(Debug)]
struct Frame<'s> {
    locals: SmallVec<[Value; 8]>,
    instance: &'s ModuleInstance,
    // position of the function body's label in `labels`
    label_base: usize,
}

/// Execution state for one invocation. Function code is borrowed from the
/// store while memories and globals are mutated in place.
struct Machine<'s> {
    funcs: &'s [FuncInst],
    tables: &'s [TableInst],
    memories: &'s mut [MemInst],
    globals: &'s mut [GlobalInst],
    config: &'s Config,
    fuel: Option<u64>,
    stack: Stack,
    labels: Vec<Label<'s>>,
    frames: Vec<Frame<'s>>,
}

macro_rules! unop {
    ($self:ident, $t:ty, |$a:ident| $body:expr) => {{
        let $a = $self.stack.pop::<$t>()?;
        $self.stack.push($body);
    }};
}

macro_rules! binop {
    ($self:ident, $t:ty, |$a:ident, $b:ident| $body:expr) => {{
        let $b = $self.stack.pop::<$t>()?;
        let $a = $self.stack.pop::<$t>()?;
        $self.stack.push($body);
    }};
}

macro_rules! testop {
    ($self:ident, $t:ty, |$a:ident| $body:expr) => {{
        let $a = $self.stack.pop::<$t>()?;
        $self.stack.push(i32::from($body));
    }};
}

macro_rules! relop {
    ($self:ident, $t:ty, |$a:ident, $b:ident| $body:expr) => {{
        let $b = $self.stack.pop::<$t>()?;
        let $a = $self.stack.pop::<$t>()?;
        $self.stack.push(i32::from($body));
    }};
}

macro_rules! load {
    ($self:ident, $memarg:expr, $n:literal, $conv:expr) => {{
        let addr = $self.stack.pop::<i32>()? as u32;
        let bytes = $self.memory()?.load::<$n>(addr, $memarg.offset())?;
        $self.stack.push($conv(bytes));
    }};
}

macro_rules! store {
    ($self:ident, $memarg:expr, $t:ty, $conv:expr) => {{
        let value = $self.stack.pop::<$t>()?;
        let addr = $self.stack.pop::<i32>()? as u32;
        $self.memory()?.store(addr, $memarg.offset(), $conv(value))?;
    }};
}

/// Invoke the function at `addr`. Arguments are checked against its
/// parameter types before anything runs.
pub(crate) fn invoke(store: &mut Store, addr: FuncAddr, args: &[Value]) -> Result<Vec<Value>, Trap> {
    let ty = store.func_type(addr).ok_or(Trap::UndefinedFunction(addr))?;
    if args.len() != ty.params().len() {
        return Err(Trap::ArgumentCount {
            expected: ty.params().len(),
            received: args.len(),
        });
    }
    for (index, (expected, arg)) in ty.params().iter().zip(args).enumerate() {
        if arg.ty() != *expected {
            return Err(Trap::TypeMismatch {
                index,
                expected: *expected,
                received: arg.ty(),
            });
        }
    }
    log::debug!("invoking function {addr} {ty}");

    let fuel = store.config.fuel;
    let Store {
        funcs,
        tables,
        memories,
        globals,
        config,
    } = store;
    let mut machine = Machine {
        funcs,
        tables,
        memories,
        globals,
        config,
        fuel,
        stack: Stack::new(),
        labels: Vec::new(),
        frames: Vec::new(),
    };
    for arg in args {
        machine.stack.push_value(*arg);
    }

    if let Err(trap) = machine.call(addr).and_then(|()| machine.run()) {
        log::debug!("function {addr} trapped: {trap}");
        return Err(trap);
    }

    let results = machine.stack.into_values();
    log::debug!("function {addr} returned {} values", results.len());
    Ok(results)
}

impl<'s> Machine<'s> {
    fn call(&mut self, addr: FuncAddr) -> Result<(), Trap> {
        let funcs = self.funcs;
        let func = funcs.get(addr.0).ok_or(Trap::UndefinedFunction(addr))?;
        match func {
            FuncInst::Module { ty, instance, code } => {
                if self.frames.len() >= self.config.max_call_depth {
                    return Err(Trap::CallStackExhausted);
                }
                let mut locals: SmallVec<[Value; 8]> =
                    self.stack.pop_n(ty.params().len())?.into_iter().collect();
                locals.extend(code.expanded_locals().map(Value::default_for));
                log::trace!("call {addr} (depth {})", self.frames.len() + 1);

                self.frames.push(Frame {
                    locals,
                    instance,
                    label_base: self.labels.len(),
                });
                self.labels.push(Label {
                    kind: LabelKind::Func,
                    branch_arity: ty.output_arity(),
                    end_arity: ty.output_arity(),
                    height: self.stack.len(),
                    instrs: code.body.instrs(),
                    pc: 0,
                });
            }

            FuncInst::Host { ty, func } => {
                let args = self.stack.pop_n(ty.params().len())?;
                let mut results: SmallVec<[Value; 2]> =
                    ty.results().iter().copied().map(Value::default_for).collect();
                log::trace!("call host function {addr}");
                (**func)(&args, &mut results).map_err(Trap::Host)?;

                for (index, (expected, result)) in ty.results().iter().zip(&results).enumerate() {
                    if result.ty() != *expected {
                        return Err(Trap::HostResultMismatch {
                            index,
                            expected: *expected,
                            received: result.ty(),
                        });
                    }
                }
                for result in results {
                    self.stack.push_value(result);
                }
            }
        }
        Ok(())
    }

    fn run(&mut self) -> Result<(), Trap> {
        while let Some(label) = self.labels.last_mut() {
            if label.pc >= label.instrs.len() {
                let Label {
                    kind,
                    end_arity,
                    height,
                    ..
                } = *label;
                self.labels.pop();
                self.stack.unwind(height, end_arity)?;
                if kind == LabelKind::Func {
                    self.frames.pop();
                }
                continue;
            }

            let instrs = label.instrs;
            let instr = &instrs[label.pc];
            label.pc += 1;

            if let Some(fuel) = self.fuel.as_mut() {
                if *fuel == 0 {
                    return Err(Trap::OutOfFuel);
                }
                *fuel -= 1;
            }

            self.step(instr)?;
        }
        Ok(())
    }

    #[inline]
    fn instance(&self) -> Result<&'s ModuleInstance, Trap> {
        self.frames
            .last()
            .map(|frame| frame.instance)
            .ok_or(Trap::StackUnderflow)
    }

    fn local_mut(&mut self, LocalIdx(idx): LocalIdx) -> Result<&mut Value, Trap> {
        self.frames
            .last_mut()
            .and_then(|frame| frame.locals.get_mut(idx as usize))
            .ok_or(Trap::InvalidIndex {
                space: "local",
                index: idx,
            })
    }

    fn global_mut(&mut self, idx: GlobalIdx) -> Result<&mut GlobalInst, Trap> {
        let addr = self.instance()?.global(idx)?;
        self.globals.get_mut(addr.0).ok_or(Trap::InvalidIndex {
            space: "global",
            index: idx.0,
        })
    }

    fn memory(&mut self) -> Result<&mut MemInst, Trap> {
        let addr = self.instance()?.memory(MemIdx(0))?;
        self.memories.get_mut(addr.0).ok_or(Trap::InvalidIndex {
            space: "memory",
            index: 0,
        })
    }

    fn enter(&mut self, kind: LabelKind, block_type: &BlockType, instrs: &'s [Instr]) {
        let arity = block_type.arity();
        self.labels.push(Label {
            kind,
            // MVP loops take no parameters
            branch_arity: if kind == LabelKind::Loop { 0 } else { arity },
            end_arity: arity,
            height: self.stack.len(),
            instrs,
            pc: 0,
        });
    }

    fn branch(&mut self, LabelIdx(depth): LabelIdx) -> Result<(), Trap> {
        let target = self
            .labels
            .len()
            .checked_sub(depth as usize + 1)
            .ok_or(Trap::InvalidIndex {
                space: "label",
                index: depth,
            })?;
        self.labels.truncate(target + 1);
        let Some(label) = self.labels.last_mut() else {
            return Err(Trap::StackUnderflow);
        };
        self.stack.unwind(label.height, label.branch_arity)?;
        label.pc = if label.kind == LabelKind::Loop {
            0
        } else {
            label.instrs.len()
        };
        Ok(())
    }

    fn step(&mut self, instr: &'s Instr) -> Result<(), Trap> {
        match instr {
            Instr::Unreachable => return Err(Trap::Unreachable),
            Instr::Nop => {}
            Instr::Block(block_type, body) => self.enter(LabelKind::Block, block_type, body),
            Instr::Loop(block_type, body) => self.enter(LabelKind::Loop, block_type, body),
            Instr::If(block_type, consequent) => {
                if self.stack.pop::<i32>()? != 0 {
                    self.enter(LabelKind::Block, block_type, consequent);
                }
            }
            Instr::IfElse(block_type, consequent, alternate) => {
                let body = if self.stack.pop::<i32>()? != 0 {
                    consequent
                } else {
                    alternate
                };
                self.enter(LabelKind::Block, block_type, body);
            }
            Instr::Br(label) => self.branch(*label)?,
            Instr::BrIf(label) => {
                if self.stack.pop::<i32>()? != 0 {
                    self.branch(*label)?;
                }
            }
            Instr::BrTable(labels, default) => {
                let idx = self.stack.pop::<i32>()? as u32 as usize;
                self.branch(*labels.get(idx).unwrap_or(default))?;
            }
            Instr::Return => {
                let base = self
                    .frames
                    .last()
                    .map(|frame| frame.label_base)
                    .ok_or(Trap::StackUnderflow)?;
                let depth = self.labels.len() - 1 - base;
                self.branch(LabelIdx(depth as u32))?;
            }
            Instr::Call(idx) => {
                let addr = self.instance()?.func(*idx)?;
                self.call(addr)?;
            }
            Instr::CallIndirect(type_idx) => {
                let instance = self.instance()?;
                let expected = instance.type_at(*type_idx)?;
                let table_addr = instance.table(TableIdx(0))?;
                let elem = self.stack.pop::<i32>()? as u32;
                let table = self.tables.get(table_addr.0).ok_or(Trap::InvalidIndex {
                    space: "table",
                    index: 0,
                })?;
                let addr = table.get(elem)?;
                let callee = self.funcs.get(addr.0).ok_or(Trap::UndefinedFunction(addr))?;
                if callee.ty() != expected {
                    return Err(Trap::IndirectCallTypeMismatch);
                }
                self.call(addr)?;
            }

            Instr::Drop => {
                self.stack.pop_value()?;
            }
            Instr::Select => {
                let cond = self.stack.pop::<i32>()?;
                let b = self.stack.pop_value()?;
                let a = self.stack.pop_value()?;
                self.stack.push_value(if cond != 0 { a } else { b });
            }

            Instr::LocalGet(idx) => {
                let value = *self.local_mut(*idx)?;
                self.stack.push_value(value);
            }
            Instr::LocalSet(idx) => {
                let value = self.stack.pop_value()?;
                *self.local_mut(*idx)? = value;
            }
            Instr::LocalTee(idx) => {
                let value = self.stack.pop_value()?;
                *self.local_mut(*idx)? = value;
                self.stack.push_value(value);
            }
            Instr::GlobalGet(idx) => {
                let value = self.global_mut(*idx)?.value();
                self.stack.push_value(value);
            }
            Instr::GlobalSet(idx) => {
                let value = self.stack.pop_value()?;
                self.global_mut(*idx)?.set(value);
            }

            Instr::I32Load(m) => load!(self, m, 4, i32::from_le_bytes),
            Instr::I64Load(m) => load!(self, m, 8, i64::from_le_bytes),
            Instr::F32Load(m) => load!(self, m, 4, f32::from_le_bytes),
            Instr::F64Load(m) => load!(self, m, 8, f64::from_le_bytes),
            Instr::I32Load8S(m) => load!(self, m, 1, |b: [u8; 1]| b[0] as i8 as i32),
            Instr::I32Load8U(m) => load!(self, m, 1, |b: [u8; 1]| b[0] as i32),
            Instr::I32Load16S(m) => load!(self, m, 2, |b| i16::from_le_bytes(b) as i32),
            Instr::I32Load16U(m) => load!(self, m, 2, |b| u16::from_le_bytes(b) as i32),
            Instr::I64Load8S(m) => load!(self, m, 1, |b: [u8; 1]| b[0] as i8 as i64),
            Instr::I64Load8U(m) => load!(self, m, 1, |b: [u8; 1]| b[0] as i64),
            Instr::I64Load16S(m) => load!(self, m, 2, |b| i16::from_le_bytes(b) as i64),
            Instr::I64Load16U(m) => load!(self, m, 2, |b| u16::from_le_bytes(b) as i64),
            Instr::I64Load32S(m) => load!(self, m, 4, |b| i32::from_le_bytes(b) as i64),
            Instr::I64Load32U(m) => load!(self, m, 4, |b| u32::from_le_bytes(b) as i64),
            Instr::I32Store(m) => store!(self, m, i32, i32::to_le_bytes),
            Instr::I64Store(m) => store!(self, m, i64, i64::to_le_bytes),
            Instr::F32Store(m) => store!(self, m, f32, f32::to_le_bytes),
            Instr::F64Store(m) => store!(self, m, f64, f64::to_le_bytes),
            Instr::I32Store8(m) => store!(self, m, i32, |v: i32| [v as u8]),
            Instr::I32Store16(m) => store!(self, m, i32, |v: i32| (v as u16).to_le_bytes()),
            Instr::I64Store8(m) => store!(self, m, i64, |v: i64| [v as u8]),
            Instr::I64Store16(m) => store!(self, m, i64, |v: i64| (v as u16).to_le_bytes()),
            Instr::I64Store32(m) => store!(self, m, i64, |v: i64| (v as u32).to_le_bytes()),
            Instr::MemorySize => {
                let pages = self.memory()?.pages();
                self.stack.push(pages as i32);
            }
            Instr::MemoryGrow => {
                let delta = self.stack.pop::<i32>()? as u32;
                let cap = self.config.max_memory_pages;
                let result = self
                    .memory()?
                    .grow(delta, cap)
                    .map_or(-1, |old| old as i32);
                self.stack.push(result);
            }

            Instr::I32Const(v) => self.stack.push(*v),
            Instr::I64Const(v) => self.stack.push(*v),
            Instr::F32Const(bits) => self.stack.push(f32::from_bits(*bits)),
            Instr::F64Const(bits) => self.stack.push(f64::from_bits(*bits)),

            Instr::I32Eqz => testop!(self, i32, |a| a == 0),
            Instr::I32Eq => relop!(self, i32, |a, b| a == b),
            Instr::I32Ne => relop!(self, i32, |a, b| a != b),
            Instr::I32LtS => relop!(self, i32, |a, b| a < b),
            Instr::I32LtU => relop!(self, i32, |a, b| (a as u32) < (b as u32)),
            Instr::I32GtS => relop!(self, i32, |a, b| a > b),
            Instr::I32GtU => relop!(self, i32, |a, b| (a as u32) > (b as u32)),
            Instr::I32LeS => relop!(self, i32, |a, b| a <= b),
            Instr::I32LeU => relop!(self, i32, |a, b| (a as u32) <= (b as u32)),
            Instr::I32GeS => relop!(self, i32, |a, b| a >= b),
            Instr::I32GeU => relop!(self, i32, |a, b| (a as u32) >= (b as u32)),

            Instr::I64Eqz => testop!(self, i64, |a| a == 0),
            Instr::I64Eq => relop!(self, i64, |a, b| a == b),
            Instr::I64Ne => relop!(self, i64, |a, b| a != b),
            Instr::I64LtS => relop!(self, i64, |a, b| a < b),
            Instr::I64LtU => relop!(self, i64, |a, b| (a as u64) < (b as u64)),
            Instr::I64GtS => relop!(self, i64, |a, b| a > b),
            Instr::I64GtU => relop!(self, i64, |a, b| (a as u64) > (b as u64)),
            Instr::I64LeS => relop!(self, i64, |a, b| a <= b),
            Instr::I64LeU => relop!(self, i64, |a, b| (a as u64) <= (b as u64)),
            Instr::I64GeS => relop!(self, i64, |a, b| a >= b),
            Instr::I64GeU => relop!(self, i64, |a, b| (a as u64) >= (b as u64)),

            Instr::F32Eq => relop!(self, f32, |a, b| a == b),
            Instr::F32Ne => relop!(self, f32, |a, b| a != b),
            Instr::F32Lt => relop!(self, f32, |a, b| a < b),
            Instr::F32Gt => relop!(self, f32, |a, b| a > b),
            Instr::F32Le => relop!(self, f32, |a, b| a <= b),
            Instr::F32Ge => relop!(self, f32, |a, b| a >= b),

            Instr::F64Eq => relop!(self, f64, |a, b| a == b),
            Instr::F64Ne => relop!(self, f64, |a, b| a != b),
            Instr::F64Lt => relop!(self, f64, |a, b| a < b),
            Instr::F64Gt => relop!(self, f64, |a, b| a > b),
            Instr::F64Le => relop!(self, f64, |a, b| a <= b),
            Instr::F64Ge => relop!(self, f64, |a, b| a >= b),

            Instr::I32Clz => unop!(self, i32, |a| a.leading_zeros() as i32),
            Instr::I32Ctz => unop!(self, i32, |a| a.trailing_zeros() as i32),
            Instr::I32Popcnt => unop!(self, i32, |a| a.count_ones() as i32),
            Instr::I32Add => binop!(self, i32, |a, b| a.wrapping_add(b)),
            Instr::I32Sub => binop!(self, i32, |a, b| a.wrapping_sub(b)),
            Instr::I32Mul => binop!(self, i32, |a, b| a.wrapping_mul(b)),
            Instr::I32DivS => binop!(self, i32, |a, b| numerics::div_s(a, b)?),
            Instr::I32DivU => binop!(self, i32, |a, b| numerics::div_u(a as u32, b as u32)? as i32),
            Instr::I32RemS => binop!(self, i32, |a, b| numerics::rem_s(a, b)?),
            Instr::I32RemU => binop!(self, i32, |a, b| numerics::rem_u(a as u32, b as u32)? as i32),
            Instr::I32And => binop!(self, i32, |a, b| a & b),
            Instr::I32Ior => binop!(self, i32, |a, b| a | b),
            Instr::I32Xor => binop!(self, i32, |a, b| a ^ b),
            Instr::I32Shl => binop!(self, i32, |a, b| a.wrapping_shl(b as u32)),
            Instr::I32ShrS => binop!(self, i32, |a, b| a.wrapping_shr(b as u32)),
            Instr::I32ShrU => binop!(self, i32, |a, b| (a as u32).wrapping_shr(b as u32) as i32),
            Instr::I32Rol => binop!(self, i32, |a, b| a.rotate_left(b as u32 % 32)),
            Instr::I32Ror => binop!(self, i32, |a, b| a.rotate_right(b as u32 % 32)),

            Instr::I64Clz => unop!(self, i64, |a| a.leading_zeros() as i64),
            Instr::I64Ctz => unop!(self, i64, |a| a.trailing_zeros() as i64),
            Instr::I64Popcnt => unop!(self, i64, |a| a.count_ones() as i64),
            Instr::I64Add => binop!(self, i64, |a, b| a.wrapping_add(b)),
            Instr::I64Sub => binop!(self, i64, |a, b| a.wrapping_sub(b)),
            Instr::I64Mul => binop!(self, i64, |a, b| a.wrapping_mul(b)),
            Instr::I64DivS => binop!(self, i64, |a, b| numerics::div_s(a, b)?),
            Instr::I64DivU => binop!(self, i64, |a, b| numerics::div_u(a as u64, b as u64)? as i64),
            Instr::I64RemS => binop!(self, i64, |a, b| numerics::rem_s(a, b)?),
            Instr::I64RemU => binop!(self, i64, |a, b| numerics::rem_u(a as u64, b as u64)? as i64),
            Instr::I64And => binop!(self, i64, |a, b| a & b),
            Instr::I64Ior => binop!(self, i64, |a, b| a | b),
            Instr::I64Xor => binop!(self, i64, |a, b| a ^ b),
            Instr::I64Shl => binop!(self, i64, |a, b| a.wrapping_shl(b as u32)),
            Instr::I64ShrS => binop!(self, i64, |a, b| a.wrapping_shr(b as u32)),
            Instr::I64ShrU => binop!(self, i64, |a, b| (a as u64).wrapping_shr(b as u32) as i64),
            Instr::I64Rol => binop!(self, i64, |a, b| a.rotate_left(b as u32 % 64)),
            Instr::I64Ror => binop!(self, i64, |a, b| a.rotate_right(b as u32 % 64)),

            Instr::F32Abs => unop!(self, f32, |a| a.abs()),
            Instr::F32Neg => unop!(self, f32, |a| -a),
            Instr::F32Ceil => unop!(self, f32, |a| a.ceil()),
            Instr::F32Floor => unop!(self, f32, |a| a.floor()),
            Instr::F32Trunc => unop!(self, f32, |a| a.trunc()),
            Instr::F32NearestInt => unop!(self, f32, |a| numerics::nearest(a)),
            Instr::F32Sqrt => unop!(self, f32, |a| a.sqrt()),
            Instr::F32Add => binop!(self, f32, |a, b| a + b),
            Instr::F32Sub => binop!(self, f32, |a, b| a - b),
            Instr::F32Mul => binop!(self, f32, |a, b| a * b),
            Instr::F32Div => binop!(self, f32, |a, b| a / b),
            Instr::F32Min => binop!(self, f32, |a, b| numerics::fmin(a, b)),
            Instr::F32Max => binop!(self, f32, |a, b| numerics::fmax(a, b)),
            Instr::F32CopySign => binop!(self, f32, |a, b| a.copysign(b)),

            Instr::F64Abs => unop!(self, f64, |a| a.abs()),
            Instr::F64Neg => unop!(self, f64, |a| -a),
            Instr::F64Ceil => unop!(self, f64, |a| a.ceil()),
            Instr::F64Floor => unop!(self, f64, |a| a.floor()),
            Instr::F64Trunc => unop!(self, f64, |a| a.trunc()),
            Instr::F64NearestInt => unop!(self, f64, |a| numerics::nearest(a)),
            Instr::F64Sqrt => unop!(self, f64, |a| a.sqrt()),
            Instr::F64Add => binop!(self, f64, |a, b| a + b),
            Instr::F64Sub => binop!(self, f64, |a, b| a - b),
            Instr::F64Mul => binop!(self, f64, |a, b| a * b),
            Instr::F64Div => binop!(self, f64, |a, b| a / b),
            Instr::F64Min => binop!(self, f64, |a, b| numerics::fmin(a, b)),
            Instr::F64Max => binop!(self, f64, |a, b| numerics::fmax(a, b)),
            Instr::F64CopySign => binop!(self, f64, |a, b| a.copysign(b)),

            Instr::I32ConvertI64 => unop!(self, i64, |a| a as i32),
            Instr::I32SConvertF32 => unop!(self, f32, |a| numerics::i32_trunc_f32(a)?),
            Instr::I32UConvertF32 => unop!(self, f32, |a| numerics::u32_trunc_f32(a)? as i32),
            Instr::I32SConvertF64 => unop!(self, f64, |a| numerics::i32_trunc_f64(a)?),
            Instr::I32UConvertF64 => unop!(self, f64, |a| numerics::u32_trunc_f64(a)? as i32),
            Instr::I64SConvertI32 => unop!(self, i32, |a| a as i64),
            Instr::I64UConvertI32 => unop!(self, i32, |a| a as u32 as i64),
            Instr::I64SConvertF32 => unop!(self, f32, |a| numerics::i64_trunc_f32(a)?),
            Instr::I64UConvertF32 => unop!(self, f32, |a| numerics::u64_trunc_f32(a)? as i64),
            Instr::I64SConvertF64 => unop!(self, f64, |a| numerics::i64_trunc_f64(a)?),
            Instr::I64UConvertF64 => unop!(self, f64, |a| numerics::u64_trunc_f64(a)? as i64),
            Instr::F32SConvertI32 => unop!(self, i32, |a| a as f32),
            Instr::F32UConvertI32 => unop!(self, i32, |a| a as u32 as f32),
            Instr::F32SConvertI64 => unop!(self, i64, |a| a as f32),
            Instr::F32UConvertI64 => unop!(self, i64, |a| a as u64 as f32),
            Instr::F32ConvertF64 => unop!(self, f64, |a| a as f32),
            Instr::F64SConvertI32 => unop!(self, i32, |a| a as f64),
            Instr::F64UConvertI32 => unop!(self, i32, |a| a as u32 as f64),
            Instr::F64SConvertI64 => unop!(self, i64, |a| a as f64),
            Instr::F64UConvertI64 => unop!(self, i64, |a| a as u64 as f64),
            Instr::F64ConvertF32 => unop!(self, f32, |a| a as f64),
            Instr::I32ReinterpretF32 => unop!(self, f32, |a| a.to_bits() as i32),
            Instr::I64ReinterpretF64 => unop!(self, f64, |a| a.to_bits() as i64),
            Instr::F32ReinterpretI32 => unop!(self, i32, |a| f32::from_bits(a as u32)),
            Instr::F64ReinterpretI64 => unop!(self, i64, |a| f64::from_bits(a as u64)),
        }
        Ok(())
    }
}
