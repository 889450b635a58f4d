use std::collections::LinkedList;

use crate::validate::{Context, ValidationError};
use crate::{BlockType, FuncIdx, GlobalIdx, Instr, LabelIdx, LocalIdx, MemArg, ValType};

#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Val {
    Unknown,
    Typed(ValType),
}

impl std::fmt::Display for Val {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unknown => f.write_str("unknown"),
            Self::Typed(t) => write!(f, "{t}"),
        }
    }
}

impl From<ValType> for Val {
    fn from(value: ValType) -> Self {
        Self::Typed(value)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum BlockKind {
    Func,
    Block,
    Loop,
    If,
    Else,
    ConstantExpression,
}

#[derive(Clone, Debug)]
pub(crate) struct CtrlFrame {
    kind: BlockKind,
    start_types: Box<[ValType]>,
    end_types: Box<[ValType]>,
    height: usize,
    unreachable: bool,
}

// A body being walked, with the `else` arm still to come for `if ... else`.
struct Body<'i> {
    instrs: &'i [Instr],
    pc: usize,
    alternate: Option<&'i [Instr]>,
}

const I32: Val = Val::Typed(ValType::I32);

macro_rules! conv {
    (@in F64) => { Val::Typed(ValType::F64) };
    (@in F32) => { Val::Typed(ValType::F32) };
    (@in I64) => { Val::Typed(ValType::I64) };
    (@in I32) => { Val::Typed(ValType::I32) };

    ($self:ident, () -> ($($result:ident),* $(,)?)) => {{
        $self.push_vals([
            $(conv!(@in $result),)*
        ].iter().copied());
    }};

    ($self:ident, ($($param:ident),* $(,)?) -> ()) => {{
        $self.pop_vals(&[
            $(conv!(@in $param),)*
        ])?;
    }};

    ($self:ident, ($($param:ident),* $(,)?) -> ($($result:ident),* $(,)?)) => {{
        $self.pop_vals(&[
            $(conv!(@in $param),)*
        ])?;
        $self.push_vals([
            $(conv!(@in $result),)*
        ].iter().copied());
    }};
}

/// Abstract interpreter over operand types. One checker is built per function
/// body or constant expression and discarded afterwards.
pub(crate) struct TypeChecker<'a> {
    ctx: &'a Context<'a>,
    locals: Box<[ValType]>,
    // Globals below this index may be read from a constant expression.
    visible_globals: usize,
    vals: Vec<Val>,
    ctrls: LinkedList<CtrlFrame>,
}

impl<'a> TypeChecker<'a> {
    pub(crate) fn new(ctx: &'a Context<'a>, locals: Box<[ValType]>) -> Self {
        Self {
            ctx,
            locals,
            visible_globals: 0,
            vals: Vec::new(),
            ctrls: LinkedList::new(),
        }
    }

    pub(crate) fn check_function(
        mut self,
        results: &[ValType],
        body: &[Instr],
    ) -> Result<(), ValidationError> {
        self.push_ctrl(BlockKind::Func, Box::new([]), results.into());
        self.check_instrs(body)?;
        self.pop_ctrl()?;
        Ok(())
    }

    pub(crate) fn check_constant_expr(
        mut self,
        expected: ValType,
        visible_globals: usize,
        body: &[Instr],
    ) -> Result<(), ValidationError> {
        self.visible_globals = visible_globals;
        self.push_ctrl(BlockKind::ConstantExpression, Box::new([]), Box::new([expected]));
        self.check_instrs(body)?;
        self.pop_ctrl()?;
        Ok(())
    }

    pub(crate) fn push_val(&mut self, val: impl Into<Val>) {
        let val = val.into();
        self.vals.push(val);
    }

    pub(crate) fn pop_val(&mut self, expect: Option<Val>) -> Result<Val, ValidationError> {
        let Some(head) = self.ctrls.front() else {
            return Err(ValidationError::BlockUnderflow);
        };

        if self.vals.len() == head.height {
            return if head.unreachable {
                Ok(expect.unwrap_or(Val::Unknown))
            } else {
                Err(ValidationError::StackUnderflow)
            };
        }

        let actual = self.vals.pop().ok_or(ValidationError::StackUnderflow)?;

        if let Some(expected) = expect {
            if expected != actual && expected != Val::Unknown && actual != Val::Unknown {
                return Err(ValidationError::TypeMismatch {
                    received: actual,
                    expected,
                });
            }
            if actual == Val::Unknown {
                return Ok(expected);
            }
        }
        Ok(actual)
    }

    pub(crate) fn push_vals<T: Into<Val>, I: Iterator<Item = T>>(&mut self, vals: I) {
        for val in vals {
            self.push_val(val)
        }
    }

    pub(crate) fn pop_vals<T: Copy + Into<Val>>(
        &mut self,
        expect: &[T],
    ) -> Result<Box<[Val]>, ValidationError> {
        let mut into = LinkedList::new();
        for expectation in expect.iter().rev().copied() {
            let expectation: Val = expectation.into();
            into.push_front(self.pop_val(Some(expectation))?);
        }
        Ok(into.into_iter().collect())
    }

    pub(crate) fn push_ctrl(
        &mut self,
        kind: BlockKind,
        input_types: Box<[ValType]>,
        output_types: Box<[ValType]>,
    ) {
        let height = self.vals.len();
        self.push_vals(input_types.iter().copied());
        self.ctrls.push_front(CtrlFrame {
            kind,
            start_types: input_types,
            end_types: output_types,
            height,
            unreachable: false,
        });
    }

    pub(crate) fn pop_ctrl(&mut self) -> Result<CtrlFrame, ValidationError> {
        let Some(frame) = self.ctrls.front() else {
            return Err(ValidationError::BlockUnderflow);
        };
        let height = frame.height;
        let vals = frame.end_types.clone();
        self.pop_vals(&vals)?;

        if self.vals.len() != height {
            return Err(ValidationError::UnexpectedTypes(self.vals.len() - height));
        }
        self.ctrls.pop_front().ok_or(ValidationError::BlockUnderflow)
    }

    fn label_types(frame: &CtrlFrame) -> Box<[ValType]> {
        match frame.kind {
            BlockKind::Loop => frame.start_types.clone(),
            _ => frame.end_types.clone(),
        }
    }

    fn label(&self, LabelIdx(idx): LabelIdx) -> Result<Box<[ValType]>, ValidationError> {
        self.ctrls
            .iter()
            .nth(idx as usize)
            .map(Self::label_types)
            .ok_or(ValidationError::InvalidLabelIndex(idx, self.ctrls.len() as u32))
    }

    pub(crate) fn unreachable(&mut self) -> Result<(), ValidationError> {
        let Some(frame) = self.ctrls.front_mut() else {
            return Err(ValidationError::BlockUnderflow);
        };
        self.vals.truncate(frame.height);
        frame.unreachable = true;
        Ok(())
    }

    /// Walks `instrs` and every body nested inside it. Nested bodies are kept
    /// on an explicit stack, so nesting depth costs heap rather than host stack.
    fn check_instrs(&mut self, instrs: &[Instr]) -> Result<(), ValidationError> {
        let mut bodies = vec![Body {
            instrs,
            pc: 0,
            alternate: None,
        }];

        while let Some(body) = bodies.last_mut() {
            let instrs = body.instrs;
            let Some(instr) = instrs.get(body.pc) else {
                let done = bodies.pop();
                if bodies.is_empty() {
                    // The outermost body's frame belongs to the caller.
                    break;
                }
                let frame = self.pop_ctrl()?;
                match done.and_then(|body| body.alternate) {
                    Some(alternate) => {
                        self.push_ctrl(BlockKind::Else, frame.start_types, frame.end_types);
                        bodies.push(Body {
                            instrs: alternate,
                            pc: 0,
                            alternate: None,
                        });
                    }
                    None => {
                        if frame.kind == BlockKind::If
                            && frame.start_types.len() != frame.end_types.len()
                        {
                            return Err(ValidationError::AlternateRequired);
                        }
                        self.push_vals(frame.end_types.iter().copied());
                    }
                }
                continue;
            };
            body.pc += 1;

            if let Some(nested) = self.trace(instr)? {
                bodies.push(nested);
            }
        }
        Ok(())
    }

    fn enter<'i>(
        &mut self,
        kind: BlockKind,
        block_type: &BlockType,
        instrs: &'i [Instr],
        alternate: Option<&'i [Instr]>,
    ) -> Option<Body<'i>> {
        self.push_ctrl(kind, Box::new([]), block_type.results().into());
        Some(Body {
            instrs,
            pc: 0,
            alternate,
        })
    }

    fn local(&self, LocalIdx(idx): LocalIdx) -> Result<ValType, ValidationError> {
        self.locals
            .get(idx as usize)
            .copied()
            .ok_or(ValidationError::UnknownLocal(idx))
    }

    fn memarg(&self, memarg: &MemArg, natural_align: u32) -> Result<(), ValidationError> {
        if self.ctx.memories.is_empty() {
            return Err(ValidationError::UnknownMemory(0));
        }
        if memarg.align() > natural_align {
            return Err(ValidationError::InvalidLoadAlignment(
                memarg.align(),
                natural_align,
            ));
        }
        Ok(())
    }

    fn load(&mut self, memarg: &MemArg, natural_align: u32, result: ValType) -> Result<(), ValidationError> {
        self.memarg(memarg, natural_align)?;
        self.pop_val(Some(I32))?;
        self.push_val(result);
        Ok(())
    }

    fn store(&mut self, memarg: &MemArg, natural_align: u32, operand: ValType) -> Result<(), ValidationError> {
        self.memarg(memarg, natural_align)?;
        self.pop_vals(&[I32, Val::Typed(operand)])?;
        Ok(())
    }

    fn call(&mut self, FuncIdx(idx): FuncIdx) -> Result<(), ValidationError> {
        let ty = self.ctx.func_type(FuncIdx(idx))?;
        self.pop_vals(ty.params())?;
        self.push_vals(ty.results().iter().copied());
        Ok(())
    }

    /// Checks one instruction. Structured instructions open their control frame
    /// and hand back the body to walk next.
    fn trace<'i>(&mut self, instr: &'i Instr) -> Result<Option<Body<'i>>, ValidationError> {
        let block_kind = self.ctrls.front().map(|ctrl| ctrl.kind);
        if block_kind == Some(BlockKind::ConstantExpression) {
            match instr {
                Instr::I32Const(_)
                | Instr::I64Const(_)
                | Instr::F32Const(_)
                | Instr::F64Const(_) => {}
                Instr::GlobalGet(GlobalIdx(idx)) => {
                    let global = self.ctx.global(GlobalIdx(*idx))?;
                    if *idx as usize >= self.visible_globals || global.is_mutable() {
                        return Err(ValidationError::InvalidConstantGlobal(*idx));
                    }
                }
                _ => return Err(ValidationError::ConstantExprRequired(Box::new(instr.clone()))),
            }
        }

        match instr {
            Instr::Unreachable => {
                self.unreachable()?;
            }
            Instr::Nop => {}

            Instr::Block(block_type, instrs) => {
                return Ok(self.enter(BlockKind::Block, block_type, instrs, None));
            }

            Instr::Loop(block_type, instrs) => {
                return Ok(self.enter(BlockKind::Loop, block_type, instrs, None));
            }

            Instr::If(block_type, consequent) => {
                self.pop_val(Some(I32))?;
                return Ok(self.enter(BlockKind::If, block_type, consequent, None));
            }

            Instr::IfElse(block_type, consequent, alternate) => {
                self.pop_val(Some(I32))?;
                return Ok(self.enter(BlockKind::If, block_type, consequent, Some(alternate)));
            }

            Instr::Br(label_idx) => {
                let vals = self.label(*label_idx)?;
                self.pop_vals(&vals)?;
                self.unreachable()?;
            }

            Instr::BrIf(label_idx) => {
                self.pop_val(Some(I32))?;
                // br_if re-pushes the label types, not the popped values: Unknown
                // operands come back out typed.
                let label_vals = self.label(*label_idx)?;
                self.pop_vals(&label_vals)?;
                self.push_vals(label_vals.iter().copied());
            }

            Instr::BrTable(labels, default) => {
                self.pop_val(Some(I32))?;
                let vals = self.label(*default)?;
                let arity = vals.len();
                for label_idx in labels.iter() {
                    let target: Box<[Val]> = self
                        .label(*label_idx)?
                        .iter()
                        .copied()
                        .map(Into::into)
                        .collect();

                    if target.len() != arity {
                        return Err(ValidationError::BrTableArityMismatch(arity, target.len()));
                    }

                    let popped = self.pop_vals(&target)?;
                    self.push_vals(popped.iter().copied());
                }
                self.pop_vals(&vals)?;
                self.unreachable()?;
            }

            Instr::Return => {
                let Some(frame) = self.ctrls.back() else {
                    return Err(ValidationError::BlockUnderflow);
                };
                let vals = Self::label_types(frame);
                self.pop_vals(&vals)?;
                self.unreachable()?;
            }

            Instr::Call(func_idx) => self.call(*func_idx)?,

            Instr::CallIndirect(type_idx) => {
                if self.ctx.tables.is_empty() {
                    return Err(ValidationError::UnknownTable(0));
                }
                let ty = self.ctx.type_at(*type_idx)?;
                self.pop_val(Some(I32))?;
                self.pop_vals(ty.params())?;
                self.push_vals(ty.results().iter().copied());
            }

            Instr::Drop => {
                self.pop_val(None)?;
            }

            Instr::Select => {
                self.pop_val(Some(I32))?;
                let t1 = self.pop_val(None)?;
                let t2 = self.pop_val(Some(t1))?;
                self.push_val(if t1 == Val::Unknown { t2 } else { t1 });
            }

            Instr::LocalGet(local_idx) => {
                let local_type = self.local(*local_idx)?;
                self.push_val(local_type);
            }

            Instr::LocalSet(local_idx) => {
                let local_type = self.local(*local_idx)?;
                self.pop_val(Some(local_type.into()))?;
            }

            Instr::LocalTee(local_idx) => {
                let local_type = self.local(*local_idx)?;
                self.pop_val(Some(local_type.into()))?;
                self.push_val(local_type);
            }

            Instr::GlobalGet(global_idx) => {
                let global = self.ctx.global(*global_idx)?;
                self.push_val(global.0);
            }

            Instr::GlobalSet(global_idx) => {
                let global = self.ctx.global(*global_idx)?;
                if !global.is_mutable() {
                    return Err(ValidationError::AssignmentToImmutableGlobal(global_idx.0));
                }
                self.pop_val(Some(global.0.into()))?;
            }

            Instr::I32Load(memarg) => self.load(memarg, 2, ValType::I32)?,
            Instr::I64Load(memarg) => self.load(memarg, 3, ValType::I64)?,
            Instr::F32Load(memarg) => self.load(memarg, 2, ValType::F32)?,
            Instr::F64Load(memarg) => self.load(memarg, 3, ValType::F64)?,
            Instr::I32Load8S(memarg) | Instr::I32Load8U(memarg) => {
                self.load(memarg, 0, ValType::I32)?
            }
            Instr::I32Load16S(memarg) | Instr::I32Load16U(memarg) => {
                self.load(memarg, 1, ValType::I32)?
            }
            Instr::I64Load8S(memarg) | Instr::I64Load8U(memarg) => {
                self.load(memarg, 0, ValType::I64)?
            }
            Instr::I64Load16S(memarg) | Instr::I64Load16U(memarg) => {
                self.load(memarg, 1, ValType::I64)?
            }
            Instr::I64Load32S(memarg) | Instr::I64Load32U(memarg) => {
                self.load(memarg, 2, ValType::I64)?
            }
            Instr::I32Store(memarg) => self.store(memarg, 2, ValType::I32)?,
            Instr::I64Store(memarg) => self.store(memarg, 3, ValType::I64)?,
            Instr::F32Store(memarg) => self.store(memarg, 2, ValType::F32)?,
            Instr::F64Store(memarg) => self.store(memarg, 3, ValType::F64)?,
            Instr::I32Store8(memarg) => self.store(memarg, 0, ValType::I32)?,
            Instr::I32Store16(memarg) => self.store(memarg, 1, ValType::I32)?,
            Instr::I64Store8(memarg) => self.store(memarg, 0, ValType::I64)?,
            Instr::I64Store16(memarg) => self.store(memarg, 1, ValType::I64)?,
            Instr::I64Store32(memarg) => self.store(memarg, 2, ValType::I64)?,

            Instr::MemorySize => {
                if self.ctx.memories.is_empty() {
                    return Err(ValidationError::UnknownMemory(0));
                }
                conv!(self, () -> (I32))
            }

            Instr::MemoryGrow => {
                if self.ctx.memories.is_empty() {
                    return Err(ValidationError::UnknownMemory(0));
                }
                conv!(self, (I32) -> (I32))
            }

            Instr::I32Const(_) => conv!(self, () -> (I32)),
            Instr::I64Const(_) => conv!(self, () -> (I64)),
            Instr::F32Const(_) => conv!(self, () -> (F32)),
            Instr::F64Const(_) => conv!(self, () -> (F64)),

            Instr::I32Eqz => conv!(self, (I32) -> (I32)),
            Instr::I32Eq
            | Instr::I32Ne
            | Instr::I32LtS
            | Instr::I32LtU
            | Instr::I32GtS
            | Instr::I32GtU
            | Instr::I32LeS
            | Instr::I32LeU
            | Instr::I32GeS
            | Instr::I32GeU => conv!(self, (I32, I32) -> (I32)),

            Instr::I64Eqz => conv!(self, (I64) -> (I32)),
            Instr::I64Eq
            | Instr::I64Ne
            | Instr::I64LtS
            | Instr::I64LtU
            | Instr::I64GtS
            | Instr::I64GtU
            | Instr::I64LeS
            | Instr::I64LeU
            | Instr::I64GeS
            | Instr::I64GeU => conv!(self, (I64, I64) -> (I32)),

            Instr::F32Eq
            | Instr::F32Ne
            | Instr::F32Lt
            | Instr::F32Gt
            | Instr::F32Le
            | Instr::F32Ge => conv!(self, (F32, F32) -> (I32)),

            Instr::F64Eq
            | Instr::F64Ne
            | Instr::F64Lt
            | Instr::F64Gt
            | Instr::F64Le
            | Instr::F64Ge => conv!(self, (F64, F64) -> (I32)),

            Instr::I32Clz | Instr::I32Ctz | Instr::I32Popcnt => conv!(self, (I32) -> (I32)),

            Instr::I32Add
            | Instr::I32Sub
            | Instr::I32Mul
            | Instr::I32DivS
            | Instr::I32DivU
            | Instr::I32RemS
            | Instr::I32RemU
            | Instr::I32And
            | Instr::I32Ior
            | Instr::I32Xor
            | Instr::I32Shl
            | Instr::I32ShrS
            | Instr::I32ShrU
            | Instr::I32Rol
            | Instr::I32Ror => conv!(self, (I32, I32) -> (I32)),

            Instr::I64Clz | Instr::I64Ctz | Instr::I64Popcnt => conv!(self, (I64) -> (I64)),

            Instr::I64Add
            | Instr::I64Sub
            | Instr::I64Mul
            | Instr::I64DivS
            | Instr::I64DivU
            | Instr::I64RemS
            | Instr::I64RemU
            | Instr::I64And
            | Instr::I64Ior
            | Instr::I64Xor
            | Instr::I64Shl
            | Instr::I64ShrS
            | Instr::I64ShrU
            | Instr::I64Rol
            | Instr::I64Ror => conv!(self, (I64, I64) -> (I64)),

            Instr::F32Abs
            | Instr::F32Neg
            | Instr::F32Ceil
            | Instr::F32Floor
            | Instr::F32Trunc
            | Instr::F32NearestInt
            | Instr::F32Sqrt => conv!(self, (F32) -> (F32)),

            Instr::F32Add
            | Instr::F32Sub
            | Instr::F32Mul
            | Instr::F32Div
            | Instr::F32Min
            | Instr::F32Max
            | Instr::F32CopySign => conv!(self, (F32, F32) -> (F32)),

            Instr::F64Abs
            | Instr::F64Neg
            | Instr::F64Ceil
            | Instr::F64Floor
            | Instr::F64Trunc
            | Instr::F64NearestInt
            | Instr::F64Sqrt => conv!(self, (F64) -> (F64)),

            Instr::F64Add
            | Instr::F64Sub
            | Instr::F64Mul
            | Instr::F64Div
            | Instr::F64Min
            | Instr::F64Max
            | Instr::F64CopySign => conv!(self, (F64, F64) -> (F64)),

            Instr::I32ConvertI64 => conv!(self, (I64) -> (I32)),
            Instr::I32SConvertF32 | Instr::I32UConvertF32 => conv!(self, (F32) -> (I32)),
            Instr::I32SConvertF64 | Instr::I32UConvertF64 => conv!(self, (F64) -> (I32)),
            Instr::I64SConvertI32 | Instr::I64UConvertI32 => conv!(self, (I32) -> (I64)),
            Instr::I64SConvertF32 | Instr::I64UConvertF32 => conv!(self, (F32) -> (I64)),
            Instr::I64SConvertF64 | Instr::I64UConvertF64 => conv!(self, (F64) -> (I64)),
            Instr::F32SConvertI32 | Instr::F32UConvertI32 => conv!(self, (I32) -> (F32)),
            Instr::F32SConvertI64 | Instr::F32UConvertI64 => conv!(self, (I64) -> (F32)),
            Instr::F32ConvertF64 => conv!(self, (F64) -> (F32)),
            Instr::F64SConvertI32 | Instr::F64UConvertI32 => conv!(self, (I32) -> (F64)),
            Instr::F64SConvertI64 | Instr::F64UConvertI64 => conv!(self, (I64) -> (F64)),
            Instr::F64ConvertF32 => conv!(self, (F32) -> (F64)),
            Instr::I32ReinterpretF32 => conv!(self, (F32) -> (I32)),
            Instr::I64ReinterpretF64 => conv!(self, (F64) -> (I64)),
            Instr::F32ReinterpretI32 => conv!(self, (I32) -> (F32)),
            Instr::F64ReinterpretI64 => conv!(self, (I64) -> (F64)),
        }
        Ok(None)
    }
}
