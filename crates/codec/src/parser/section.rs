use corvid_ir::{
    ByteVec, Data, Elem, Export, ExportDesc, Expr, FuncIdx, Global, GlobalIdx, GlobalType, Import,
    ImportDesc, Local, MemIdx, MemType, Name, TableIdx, TableType, TypeIdx,
};
use nom::bytes::complete::take;
use nom::number::complete::u8 as byte;

use super::{fail, PResult, ParseWasmBinary, Span};
use crate::DecodeErrorKind;

/// Upper bound on the locals one code entry may declare, summed across runs.
pub(crate) const MAX_LOCALS: u64 = 50_000;

impl<'a> ParseWasmBinary<'a> for Import {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (input, module) = Name::from_wasm_bytes(input)?;
        let (input, name) = Name::from_wasm_bytes(input)?;
        let (input, desc) = ImportDesc::from_wasm_bytes(input)?;
        Ok((input, Import::new(module, name, desc)))
    }
}

impl<'a> ParseWasmBinary<'a> for ImportDesc {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, kind) = byte(input)?;
        Ok(match kind {
            0x00 => {
                let (rest, idx) = TypeIdx::from_wasm_bytes(rest)?;
                (rest, ImportDesc::Func(idx))
            }
            0x01 => {
                let (rest, table_type) = TableType::from_wasm_bytes(rest)?;
                (rest, ImportDesc::Table(table_type))
            }
            0x02 => {
                let (rest, mem_type) = MemType::from_wasm_bytes(rest)?;
                (rest, ImportDesc::Mem(mem_type))
            }
            0x03 => {
                let (rest, global_type) = GlobalType::from_wasm_bytes(rest)?;
                (rest, ImportDesc::Global(global_type))
            }
            kind => return fail(input, DecodeErrorKind::BadImportDesc(kind)),
        })
    }
}

impl<'a> ParseWasmBinary<'a> for Export {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (input, Name(name)) = Name::from_wasm_bytes(input)?;
        let (input, desc) = ExportDesc::from_wasm_bytes(input)?;
        Ok((input, Export::new(name, desc)))
    }
}

impl<'a> ParseWasmBinary<'a> for ExportDesc {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (rest, kind) = byte(input)?;
        let (rest, idx) = u32::from_wasm_bytes(rest)?;
        Ok((
            rest,
            match kind {
                0x00 => ExportDesc::Func(FuncIdx(idx)),
                0x01 => ExportDesc::Table(TableIdx(idx)),
                0x02 => ExportDesc::Mem(MemIdx(idx)),
                0x03 => ExportDesc::Global(GlobalIdx(idx)),
                kind => return fail(input, DecodeErrorKind::BadExportDesc(kind)),
            },
        ))
    }
}

impl<'a> ParseWasmBinary<'a> for Global {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (input, global_type) = GlobalType::from_wasm_bytes(input)?;
        let (input, init) = Expr::from_wasm_bytes(input)?;
        Ok((input, Global(global_type, init)))
    }
}

impl<'a> ParseWasmBinary<'a> for Elem {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (input, table) = TableIdx::from_wasm_bytes(input)?;
        let (input, offset) = Expr::from_wasm_bytes(input)?;
        let (input, init) = <Box<[FuncIdx]>>::from_wasm_bytes(input)?;
        Ok((
            input,
            Elem {
                table,
                offset,
                init,
            },
        ))
    }
}

impl<'a> ParseWasmBinary<'a> for Data {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (input, memory) = MemIdx::from_wasm_bytes(input)?;
        let (input, offset) = Expr::from_wasm_bytes(input)?;
        let (input, init) = ByteVec::from_wasm_bytes(input)?;
        Ok((
            input,
            Data {
                memory,
                offset,
                init,
            },
        ))
    }
}

/// One entry of the code section, before it is joined with its type index.
#[derive(Debug, PartialEq)]
pub(crate) struct Code {
    pub(crate) locals: Box<[Local]>,
    pub(crate) body: Expr,
}

impl<'a> ParseWasmBinary<'a> for Code {
    fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
        let (input, size) = u32::from_wasm_bytes(input)?;
        let (rest, entry) = take(size as usize)(input)?;

        let (after_locals, locals) = <Box<[Local]>>::from_wasm_bytes(entry)?;
        let total: u64 = locals.iter().map(|Local(count, _)| *count as u64).sum();
        if total > MAX_LOCALS {
            return fail(entry, DecodeErrorKind::TooManyLocals);
        }

        let (remaining, body) = Expr::from_wasm_bytes(after_locals)?;
        if !remaining.fragment().is_empty() {
            return fail(
                remaining,
                DecodeErrorKind::CodeSizeMismatch {
                    expected: size as usize,
                    actual: size as usize - remaining.fragment().len(),
                },
            );
        }

        Ok((rest, Code { locals, body }))
    }
}
