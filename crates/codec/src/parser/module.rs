use corvid_ir::{
    Data, Elem, Export, Func, FuncIdx, FuncType, Global, Import, MemType, Module, ModuleBuilder,
    Name, TableType, TypeIdx,
};
use nom::bytes::complete::take;
use nom::number::complete::{be_u32, u8 as byte};

use super::section::Code;
use super::{fail, PResult, ParseWasmBinary, Span};
use crate::DecodeErrorKind;

const MAGIC: u32 = 0x0061736D;
const VERSION: u32 = 0x01000000;

const CUSTOM_SECTION: u8 = 0;
const LAST_SECTION: u8 = 11;

/// Parse one section's contents, requiring them to fill the declared size exactly.
fn section_contents<'a, T: ParseWasmBinary<'a>>(id: u8, body: Span<'a>) -> PResult<'a, T> {
    let (rest, contents) = T::from_wasm_bytes(body)?;
    let remaining = rest.fragment().len();
    if remaining != 0 {
        let expected = body.fragment().len();
        return fail(
            rest,
            DecodeErrorKind::SectionSizeMismatch {
                id,
                expected,
                actual: expected - remaining,
            },
        );
    }
    Ok((rest, contents))
}

pub(crate) fn parse_module(input: Span<'_>) -> PResult<'_, Module> {
    let (rest, magic) = be_u32(input)?;
    if magic != MAGIC {
        return fail(input, DecodeErrorKind::BadMagic(magic));
    }
    let version_at = rest;
    let (mut input, version) = be_u32(rest)?;
    if version != VERSION {
        return fail(version_at, DecodeErrorKind::UnexpectedVersion(version));
    }

    let mut builder = ModuleBuilder::new();
    let mut last_id = CUSTOM_SECTION;
    let mut func_types: Box<[TypeIdx]> = Box::default();
    let mut codes: Box<[Code]> = Box::default();

    while !input.fragment().is_empty() {
        let section_at = input;
        let (rest, id) = byte(input)?;
        if id > LAST_SECTION {
            return fail(section_at, DecodeErrorKind::SectionInvalid(id));
        }
        if id != CUSTOM_SECTION {
            if id <= last_id {
                return fail(section_at, DecodeErrorKind::SectionOutOfOrder(id));
            }
            last_id = id;
        }

        let (rest, size) = u32::from_wasm_bytes(rest)?;
        let (rest, body) = take(size as usize)(rest)?;
        input = rest;

        log::trace!(
            "section {} ({} bytes) at offset {:#x}",
            id,
            size,
            section_at.location_offset()
        );

        builder = match id {
            CUSTOM_SECTION => {
                let (rest, Name(name)) = Name::from_wasm_bytes(body)?;
                builder.custom_section(name, (*rest.fragment()).into())
            }
            1 => builder.type_section(section_contents::<Box<[FuncType]>>(id, body)?.1),
            2 => builder.import_section(section_contents::<Box<[Import]>>(id, body)?.1),
            3 => {
                func_types = section_contents(id, body)?.1;
                builder
            }
            4 => builder.table_section(section_contents::<Box<[TableType]>>(id, body)?.1),
            5 => builder.memory_section(section_contents::<Box<[MemType]>>(id, body)?.1),
            6 => builder.global_section(section_contents::<Box<[Global]>>(id, body)?.1),
            7 => builder.export_section(section_contents::<Box<[Export]>>(id, body)?.1),
            8 => builder.start_section(section_contents::<FuncIdx>(id, body)?.1),
            9 => builder.element_section(section_contents::<Box<[Elem]>>(id, body)?.1),
            10 => {
                codes = section_contents(id, body)?.1;
                builder
            }
            _ => builder.data_section(section_contents::<Box<[Data]>>(id, body)?.1),
        };
    }

    if func_types.len() != codes.len() {
        return fail(
            input,
            DecodeErrorKind::FunctionCodeMismatch {
                functions: func_types.len(),
                bodies: codes.len(),
            },
        );
    }

    let funcs = func_types
        .iter()
        .zip(Vec::from(codes))
        .map(|(type_idx, Code { locals, body })| Func {
            type_idx: *type_idx,
            locals,
            body,
        })
        .collect();

    Ok((input, builder.funcs(funcs).build()))
}
