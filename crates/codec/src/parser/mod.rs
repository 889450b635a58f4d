pub(crate) mod instr;
pub(crate) mod leb;
pub(crate) mod module;
pub(crate) mod section;
pub(crate) mod types;

use nom_locate::LocatedSpan;

use crate::{DecodeError, DecodeErrorKind};

pub(crate) type Span<'a> = LocatedSpan<&'a [u8]>;
pub(crate) type PResult<'a, T> = nom::IResult<Span<'a>, T, DecodeError>;

macro_rules! impl_parse_for_newtype {
    ($type:ident, $innertype:ident) => {
        impl<'a> ParseWasmBinary<'a> for $type {
            fn from_wasm_bytes(input: Span<'a>) -> PResult<'a, Self> {
                use nom::combinator::map;
                map($innertype::from_wasm_bytes, $type)(input)
            }
        }
    };
}
pub(crate) use impl_parse_for_newtype;

pub(crate) trait ParseWasmBinary<'a>: Sized {
    fn from_wasm_bytes(b: Span<'a>) -> PResult<'a, Self>;
}

/// Stop decoding at `input` with a non-recoverable error.
pub(crate) fn fail<T>(input: Span<'_>, kind: DecodeErrorKind) -> PResult<'_, T> {
    Err(nom::Err::Failure(DecodeError::at(&input, kind)))
}

impl<'a, T: ParseWasmBinary<'a>> ParseWasmBinary<'a> for Vec<T> {
    fn from_wasm_bytes(b: Span<'a>) -> PResult<'a, Self> {
        let (mut rest, sz) = <u32 as ParseWasmBinary>::from_wasm_bytes(b)?;
        // every item takes at least one byte, so a count past the remaining
        // input is a length lie; don't let it size the allocation.
        let mut v = Vec::with_capacity((sz as usize).min(rest.fragment().len()));
        for _ in 0..sz {
            let (r, item) = <T as ParseWasmBinary>::from_wasm_bytes(rest)?;
            v.push(item);
            rest = r;
        }
        Ok((rest, v))
    }
}

impl<'a, T: ParseWasmBinary<'a>> ParseWasmBinary<'a> for Box<[T]> {
    fn from_wasm_bytes(b: Span<'a>) -> PResult<'a, Self> {
        let (rest, v) = Vec::<T>::from_wasm_bytes(b)?;
        Ok((rest, v.into_boxed_slice()))
    }
}
