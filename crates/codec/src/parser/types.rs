use corvid_ir::{
    BlockType, ByteVec, FuncIdx, FuncType, GlobalIdx, GlobalType, LabelIdx, Limits, Local,
    LocalIdx, MemArg, MemIdx, MemType, Mutability, Name, RefType, ResultType, TableIdx, TableType,
    TypeIdx, ValType,
};
use nom::number::complete::u8 as byte;

use super::{fail, impl_parse_for_newtype, PResult, ParseWasmBinary, Span};
use crate::DecodeErrorKind;

impl_parse_for_newtype!(TypeIdx, u32);
impl_parse_for_newtype!(FuncIdx, u32);
impl_parse_for_newtype!(TableIdx, u32);
impl_parse_for_newtype!(MemIdx, u32);
impl_parse_for_newtype!(GlobalIdx, u32);
impl_parse_for_newtype!(LocalIdx, u32);
impl_parse_for_newtype!(LabelIdx, u32);
impl_parse_for_newtype!(MemType, Limits);

impl<'a> ParseWasmBinary<'a> for ResultType {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, types) = <Box<[ValType]>>::from_wasm_bytes(input)?;
        Ok((rest, ResultType(types)))
    }
}

impl<'a> ParseWasmBinary<'a> for ByteVec {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        use nom::bytes::complete::take;
        let (input, sz) = u32::from_wasm_bytes(input)?;
        let (input, span) = take(sz as usize)(input)?;
        Ok((input, ByteVec((*span.fragment()).into())))
    }
}

impl<'a> ParseWasmBinary<'a> for Name {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        use nom::bytes::complete::take;
        let (rest, sz) = u32::from_wasm_bytes(input)?;
        let (rest, span) = take(sz as usize)(rest)?;
        let Ok(xs) = std::str::from_utf8(span.fragment()) else {
            return fail(span, DecodeErrorKind::InvalidName);
        };

        Ok((rest, Name(xs.to_string())))
    }
}

impl<'a> ParseWasmBinary<'a> for ValType {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, tag) = byte(input)?;
        Ok((
            rest,
            match tag {
                0x7f => ValType::I32,
                0x7e => ValType::I64,
                0x7d => ValType::F32,
                0x7c => ValType::F64,
                tag => return fail(input, DecodeErrorKind::BadType(tag)),
            },
        ))
    }
}

impl<'a> ParseWasmBinary<'a> for FuncType {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, prefix) = byte(input)?;
        if prefix != 0x60 {
            return fail(input, DecodeErrorKind::BadTypePrefix(prefix));
        }
        let (rest, params) = ResultType::from_wasm_bytes(rest)?;
        let (rest, results) = ResultType::from_wasm_bytes(rest)?;
        Ok((rest, FuncType(params, results)))
    }
}

impl<'a> ParseWasmBinary<'a> for Limits {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, flag) = byte(input)?;
        match flag {
            0x00 => {
                let (rest, min) = u32::from_wasm_bytes(rest)?;
                Ok((rest, Limits::Min(min)))
            }
            0x01 => {
                let (rest, min) = u32::from_wasm_bytes(rest)?;
                let (rest, max) = u32::from_wasm_bytes(rest)?;
                Ok((rest, Limits::Range(min, max)))
            }
            flag => fail(input, DecodeErrorKind::BadLimits(flag)),
        }
    }
}

impl<'a> ParseWasmBinary<'a> for TableType {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, elem_type) = byte(input)?;
        if elem_type != 0x70 {
            return fail(input, DecodeErrorKind::BadElementType(elem_type));
        }
        let (rest, limits) = Limits::from_wasm_bytes(rest)?;
        Ok((rest, TableType(RefType::FuncRef, limits)))
    }
}

impl<'a> ParseWasmBinary<'a> for Mutability {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, flag) = byte(input)?;
        match flag {
            0x00 => Ok((rest, Mutability::Const)),
            0x01 => Ok((rest, Mutability::Variable)),
            flag => fail(input, DecodeErrorKind::BadMutability(flag)),
        }
    }
}

impl<'a> ParseWasmBinary<'a> for GlobalType {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, val_type) = ValType::from_wasm_bytes(input)?;
        let (rest, mutability) = Mutability::from_wasm_bytes(rest)?;
        Ok((rest, GlobalType(val_type, mutability)))
    }
}

impl<'a> ParseWasmBinary<'a> for BlockType {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, tag) = byte(input)?;
        if tag == 0x40 {
            return Ok((rest, BlockType::Empty));
        }
        let (rest, val_type) = ValType::from_wasm_bytes(input)?;
        Ok((rest, BlockType::Val(val_type)))
    }
}

impl<'a> ParseWasmBinary<'a> for MemArg {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, align) = u32::from_wasm_bytes(input)?;
        let (rest, offset) = u32::from_wasm_bytes(rest)?;
        Ok((rest, MemArg(align, offset)))
    }
}

impl<'a> ParseWasmBinary<'a> for Local {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, count) = u32::from_wasm_bytes(input)?;
        let (rest, val_type) = ValType::from_wasm_bytes(rest)?;
        Ok((rest, Local(count, val_type)))
    }
}
