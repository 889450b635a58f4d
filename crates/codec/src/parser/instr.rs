use corvid_ir::{
    BlockType, Expr, FuncIdx, GlobalIdx, Instr, LabelIdx, LocalIdx, MemArg, TypeIdx,
};
use nom::number::complete::{le_u32, le_u64, u8 as byte};

use super::{fail, PResult, ParseWasmBinary, Span};
use crate::DecodeErrorKind;

/// Deepest structured-instruction nesting a function body may have.
pub const MAX_NESTING_DEPTH: usize = 1024;

enum Open {
    Block(BlockType),
    Loop(BlockType),
    If(BlockType),
    Else(BlockType, Box<[Instr]>),
}

impl<'a> ParseWasmBinary<'a> for Expr {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        parse_expr(input)
    }
}

// Structured instructions are decoded with an explicit stack of open blocks so
// that deeply nested input can't exhaust the host stack.
fn parse_expr(input: Span<'_>) -> PResult<'_, Expr> {
    let mut open: Vec<(Open, Vec<Instr>)> = Vec::new();
    let mut current = Vec::new();
    let mut input = input;

    loop {
        let at = input;
        let (rest, opcode) = byte(input)?;
        input = rest;

        let instr = match opcode {
            0x02..=0x04 => {
                if open.len() >= MAX_NESTING_DEPTH {
                    return fail(at, DecodeErrorKind::NestingTooDeep(MAX_NESTING_DEPTH));
                }
                let (rest, block_type) = BlockType::from_wasm_bytes(input)?;
                input = rest;
                let kind = match opcode {
                    0x02 => Open::Block(block_type),
                    0x03 => Open::Loop(block_type),
                    _ => Open::If(block_type),
                };
                open.push((kind, std::mem::take(&mut current)));
                continue;
            }

            0x05 => match open.pop() {
                Some((Open::If(block_type), parent)) => {
                    let consequent = std::mem::take(&mut current).into_boxed_slice();
                    open.push((Open::Else(block_type, consequent), parent));
                    continue;
                }
                _ => return fail(at, DecodeErrorKind::UnexpectedElse),
            },

            0x0b => {
                let Some((kind, parent)) = open.pop() else {
                    return Ok((input, Expr(current)));
                };
                let body = std::mem::replace(&mut current, parent).into_boxed_slice();
                match kind {
                    Open::Block(block_type) => Instr::Block(block_type, body),
                    Open::Loop(block_type) => Instr::Loop(block_type, body),
                    Open::If(block_type) => Instr::If(block_type, body),
                    Open::Else(block_type, consequent) => {
                        Instr::IfElse(block_type, consequent, body)
                    }
                }
            }

            opcode => {
                let (rest, instr) = parse_instr(at, opcode, input)?;
                input = rest;
                instr
            }
        };

        current.push(instr);
    }
}

fn zero_byte(input: Span<'_>) -> PResult<'_, ()> {
    let (rest, b) = byte(input)?;
    if b != 0 {
        return fail(input, DecodeErrorKind::ZeroByteExpected(b));
    }
    Ok((rest, ()))
}

/// Decode the immediates of every non-structured instruction. `at` points at
/// the opcode byte, `input` just past it.
fn parse_instr<'a>(at: Span<'a>, opcode: u8, input: Span<'a>) -> PResult<'a, Instr> {
    if let Some(instr) = plain_instr(opcode) {
        return Ok((input, instr));
    }

    Ok(match opcode {
        0x0c => {
            let (input, idx) = LabelIdx::from_wasm_bytes(input)?;
            (input, Instr::Br(idx))
        }
        0x0d => {
            let (input, idx) = LabelIdx::from_wasm_bytes(input)?;
            (input, Instr::BrIf(idx))
        }
        0x0e => {
            let (input, targets) = <Box<[LabelIdx]>>::from_wasm_bytes(input)?;
            let (input, default) = LabelIdx::from_wasm_bytes(input)?;
            (input, Instr::BrTable(targets, default))
        }
        0x10 => {
            let (input, idx) = FuncIdx::from_wasm_bytes(input)?;
            (input, Instr::Call(idx))
        }
        0x11 => {
            let (input, idx) = TypeIdx::from_wasm_bytes(input)?;
            let (input, _) = zero_byte(input)?;
            (input, Instr::CallIndirect(idx))
        }

        0x20..=0x22 => {
            let (input, idx) = LocalIdx::from_wasm_bytes(input)?;
            (
                input,
                match opcode {
                    0x20 => Instr::LocalGet(idx),
                    0x21 => Instr::LocalSet(idx),
                    _ => Instr::LocalTee(idx),
                },
            )
        }
        0x23 | 0x24 => {
            let (input, idx) = GlobalIdx::from_wasm_bytes(input)?;
            (
                input,
                if opcode == 0x23 {
                    Instr::GlobalGet(idx)
                } else {
                    Instr::GlobalSet(idx)
                },
            )
        }

        0x28..=0x3e => {
            let ctor: fn(MemArg) -> Instr = match opcode {
                0x28 => Instr::I32Load,
                0x29 => Instr::I64Load,
                0x2a => Instr::F32Load,
                0x2b => Instr::F64Load,
                0x2c => Instr::I32Load8S,
                0x2d => Instr::I32Load8U,
                0x2e => Instr::I32Load16S,
                0x2f => Instr::I32Load16U,
                0x30 => Instr::I64Load8S,
                0x31 => Instr::I64Load8U,
                0x32 => Instr::I64Load16S,
                0x33 => Instr::I64Load16U,
                0x34 => Instr::I64Load32S,
                0x35 => Instr::I64Load32U,
                0x36 => Instr::I32Store,
                0x37 => Instr::I64Store,
                0x38 => Instr::F32Store,
                0x39 => Instr::F64Store,
                0x3a => Instr::I32Store8,
                0x3b => Instr::I32Store16,
                0x3c => Instr::I64Store8,
                0x3d => Instr::I64Store16,
                _ => Instr::I64Store32,
            };
            let (input, memarg) = MemArg::from_wasm_bytes(input)?;
            (input, ctor(memarg))
        }
        0x3f => {
            let (input, _) = zero_byte(input)?;
            (input, Instr::MemorySize)
        }
        0x40 => {
            let (input, _) = zero_byte(input)?;
            (input, Instr::MemoryGrow)
        }

        0x41 => {
            let (input, value) = i32::from_wasm_bytes(input)?;
            (input, Instr::I32Const(value))
        }
        0x42 => {
            let (input, value) = i64::from_wasm_bytes(input)?;
            (input, Instr::I64Const(value))
        }
        0x43 => {
            let (input, bits) = le_u32(input)?;
            (input, Instr::F32Const(bits))
        }
        0x44 => {
            let (input, bits) = le_u64(input)?;
            (input, Instr::F64Const(bits))
        }

        opcode => return fail(at, DecodeErrorKind::UnknownOpcode(opcode)),
    })
}

/// Instructions without immediates.
fn plain_instr(opcode: u8) -> Option<Instr> {
    Some(match opcode {
        0x00 => Instr::Unreachable,
        0x01 => Instr::Nop,
        0x0f => Instr::Return,
        0x1a => Instr::Drop,
        0x1b => Instr::Select,

        0x45 => Instr::I32Eqz,
        0x46 => Instr::I32Eq,
        0x47 => Instr::I32Ne,
        0x48 => Instr::I32LtS,
        0x49 => Instr::I32LtU,
        0x4a => Instr::I32GtS,
        0x4b => Instr::I32GtU,
        0x4c => Instr::I32LeS,
        0x4d => Instr::I32LeU,
        0x4e => Instr::I32GeS,
        0x4f => Instr::I32GeU,

        0x50 => Instr::I64Eqz,
        0x51 => Instr::I64Eq,
        0x52 => Instr::I64Ne,
        0x53 => Instr::I64LtS,
        0x54 => Instr::I64LtU,
        0x55 => Instr::I64GtS,
        0x56 => Instr::I64GtU,
        0x57 => Instr::I64LeS,
        0x58 => Instr::I64LeU,
        0x59 => Instr::I64GeS,
        0x5a => Instr::I64GeU,

        0x5b => Instr::F32Eq,
        0x5c => Instr::F32Ne,
        0x5d => Instr::F32Lt,
        0x5e => Instr::F32Gt,
        0x5f => Instr::F32Le,
        0x60 => Instr::F32Ge,

        0x61 => Instr::F64Eq,
        0x62 => Instr::F64Ne,
        0x63 => Instr::F64Lt,
        0x64 => Instr::F64Gt,
        0x65 => Instr::F64Le,
        0x66 => Instr::F64Ge,

        0x67 => Instr::I32Clz,
        0x68 => Instr::I32Ctz,
        0x69 => Instr::I32Popcnt,
        0x6a => Instr::I32Add,
        0x6b => Instr::I32Sub,
        0x6c => Instr::I32Mul,
        0x6d => Instr::I32DivS,
        0x6e => Instr::I32DivU,
        0x6f => Instr::I32RemS,
        0x70 => Instr::I32RemU,
        0x71 => Instr::I32And,
        0x72 => Instr::I32Ior,
        0x73 => Instr::I32Xor,
        0x74 => Instr::I32Shl,
        0x75 => Instr::I32ShrS,
        0x76 => Instr::I32ShrU,
        0x77 => Instr::I32Rol,
        0x78 => Instr::I32Ror,

        0x79 => Instr::I64Clz,
        0x7a => Instr::I64Ctz,
        0x7b => Instr::I64Popcnt,
        0x7c => Instr::I64Add,
        0x7d => Instr::I64Sub,
        0x7e => Instr::I64Mul,
        0x7f => Instr::I64DivS,
        0x80 => Instr::I64DivU,
        0x81 => Instr::I64RemS,
        0x82 => Instr::I64RemU,
        0x83 => Instr::I64And,
        0x84 => Instr::I64Ior,
        0x85 => Instr::I64Xor,
        0x86 => Instr::I64Shl,
        0x87 => Instr::I64ShrS,
        0x88 => Instr::I64ShrU,
        0x89 => Instr::I64Rol,
        0x8a => Instr::I64Ror,

        0x8b => Instr::F32Abs,
        0x8c => Instr::F32Neg,
        0x8d => Instr::F32Ceil,
        0x8e => Instr::F32Floor,
        0x8f => Instr::F32Trunc,
        0x90 => Instr::F32NearestInt,
        0x91 => Instr::F32Sqrt,
        0x92 => Instr::F32Add,
        0x93 => Instr::F32Sub,
        0x94 => Instr::F32Mul,
        0x95 => Instr::F32Div,
        0x96 => Instr::F32Min,
        0x97 => Instr::F32Max,
        0x98 => Instr::F32CopySign,

        0x99 => Instr::F64Abs,
        0x9a => Instr::F64Neg,
        0x9b => Instr::F64Ceil,
        0x9c => Instr::F64Floor,
        0x9d => Instr::F64Trunc,
        0x9e => Instr::F64NearestInt,
        0x9f => Instr::F64Sqrt,
        0xa0 => Instr::F64Add,
        0xa1 => Instr::F64Sub,
        0xa2 => Instr::F64Mul,
        0xa3 => Instr::F64Div,
        0xa4 => Instr::F64Min,
        0xa5 => Instr::F64Max,
        0xa6 => Instr::F64CopySign,

        0xa7 => Instr::I32ConvertI64,
        0xa8 => Instr::I32SConvertF32,
        0xa9 => Instr::I32UConvertF32,
        0xaa => Instr::I32SConvertF64,
        0xab => Instr::I32UConvertF64,
        0xac => Instr::I64SConvertI32,
        0xad => Instr::I64UConvertI32,
        0xae => Instr::I64SConvertF32,
        0xaf => Instr::I64UConvertF32,
        0xb0 => Instr::I64SConvertF64,
        0xb1 => Instr::I64UConvertF64,
        0xb2 => Instr::F32SConvertI32,
        0xb3 => Instr::F32UConvertI32,
        0xb4 => Instr::F32SConvertI64,
        0xb5 => Instr::F32UConvertI64,
        0xb6 => Instr::F32ConvertF64,
        0xb7 => Instr::F64SConvertI32,
        0xb8 => Instr::F64UConvertI32,
        0xb9 => Instr::F64SConvertI64,
        0xba => Instr::F64UConvertI64,
        0xbb => Instr::F64ConvertF32,
        0xbc => Instr::I32ReinterpretF32,
        0xbd => Instr::I64ReinterpretF64,
        0xbe => Instr::F32ReinterpretI32,
        0xbf => Instr::F64ReinterpretI64,

        _ => return None,
    })
}
