pub(crate) mod parser;

use corvid_ir::Module;
use nom::error::ErrorKind;
use thiserror::Error;

use crate::parser::Span;

pub use parser::instr::MAX_NESTING_DEPTH;

/// Why a binary could not be decoded, and the byte offset where decoding stopped.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} (at offset {offset:#x})")]
pub struct DecodeError {
    kind: DecodeErrorKind,
    offset: usize,
}

impl DecodeError {
    pub(crate) fn new(kind: DecodeErrorKind, offset: usize) -> Self {
        Self { kind, offset }
    }

    pub(crate) fn at(input: &Span<'_>, kind: DecodeErrorKind) -> Self {
        Self::new(kind, input.location_offset())
    }

    pub fn kind(&self) -> &DecodeErrorKind {
        &self.kind
    }

    pub fn offset(&self) -> usize {
        self.offset
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeErrorKind {
    #[error("Bad magic number (expected 0061736DH ('\\0asm'), got {0:08X}H)")]
    BadMagic(u32),

    #[error("Unexpected version {0:08X}H")]
    UnexpectedVersion(u32),

    #[error("unexpected end of input")]
    UnexpectedEof,

    #[error("integer representation too long")]
    IntegerTooLong,

    #[error("integer too large")]
    IntegerTooLarge,

    #[error("malformed UTF-8 encoding in name")]
    InvalidName,

    #[error("Bad type prefix (expected 60H, got {0:X}H)")]
    BadTypePrefix(u8),

    #[error("Bad type (got {0:X}H)")]
    BadType(u8),

    #[error("Bad element type (expected 70H, got {0:X}H)")]
    BadElementType(u8),

    #[error("Bad limits flag (got {0:X}H)")]
    BadLimits(u8),

    #[error("Bad mutability (got {0:X}H)")]
    BadMutability(u8),

    #[error("Bad import descriptor type (got {0:X}H)")]
    BadImportDesc(u8),

    #[error("Bad export descriptor type (got {0:X}H)")]
    BadExportDesc(u8),

    #[error("invalid section type {0}")]
    SectionInvalid(u8),

    #[error("section {0} appears out of order or more than once")]
    SectionOutOfOrder(u8),

    #[error("section size mismatch (section {id} declared {expected} bytes, contents used {actual})")]
    SectionSizeMismatch {
        id: u8,
        expected: usize,
        actual: usize,
    },

    #[error("code entry size mismatch (declared {expected} bytes, body used {actual})")]
    CodeSizeMismatch { expected: usize, actual: usize },

    #[error("function and code section have inconsistent lengths ({functions} functions, {bodies} bodies)")]
    FunctionCodeMismatch { functions: usize, bodies: usize },

    #[error("too many locals")]
    TooManyLocals,

    #[error("illegal opcode {0:X}H")]
    UnknownOpcode(u8),

    #[error("zero byte expected (got {0:X}H)")]
    ZeroByteExpected(u8),

    #[error("else outside of if")]
    UnexpectedElse,

    #[error("blocks nested too deeply (limit {0})")]
    NestingTooDeep(usize),

    #[error("parse error ({0:?})")]
    Nom(ErrorKind),
}

impl<'a> nom::error::ParseError<Span<'a>> for DecodeError {
    fn from_error_kind(input: Span<'a>, kind: ErrorKind) -> Self {
        let kind = if kind == ErrorKind::Eof || input.fragment().is_empty() {
            DecodeErrorKind::UnexpectedEof
        } else {
            DecodeErrorKind::Nom(kind)
        };
        Self::at(&input, kind)
    }

    fn append(_input: Span<'a>, _kind: ErrorKind, other: Self) -> Self {
        other
    }
}

/// Decode a binary module. Only structural well-formedness is checked here;
/// run [`corvid_ir::validate`] before instantiating the result.
pub fn decode(bytes: &[u8]) -> Result<Module, DecodeError> {
    match parser::module::parse_module(Span::new(bytes)) {
        Ok((_, module)) => {
            log::debug!(
                "decoded module: {} bytes, {} types, {} imports, {} functions, {} exports",
                bytes.len(),
                module.types().len(),
                module.imports().len(),
                module.funcs().len(),
                module.exports().len()
            );
            Ok(module)
        }
        Err(nom::Err::Error(err) | nom::Err::Failure(err)) => Err(err),
        Err(nom::Err::Incomplete(_)) => Err(DecodeError::new(
            DecodeErrorKind::UnexpectedEof,
            bytes.len(),
        )),
    }
}
