use corvid_codec::DecodeError;
use corvid_ir::{ValType, ValidationError};
use thiserror::Error;

use crate::FuncAddr;

/// A dynamic failure that aborts the current invocation. The store stays usable.
#[derive(Error, Debug)]
pub enum Trap {
    #[error("unreachable")]
    Unreachable,

    #[error("type mismatch: argument {index} should be {expected}, got {received}")]
    TypeMismatch {
        index: usize,
        expected: ValType,
        received: ValType,
    },

    #[error("type mismatch: expected {expected} arguments, got {received}")]
    ArgumentCount { expected: usize, received: usize },

    #[error("integer divide by zero")]
    IntegerDivideByZero,

    #[error("integer overflow")]
    IntegerOverflow,

    #[error("invalid conversion to integer")]
    InvalidConversionToInteger,

    #[error("out of bounds memory access")]
    MemoryOutOfBounds,

    #[error("undefined element")]
    UndefinedElement,

    #[error("uninitialized element {0}")]
    UninitializedElement(u32),

    #[error("indirect call type mismatch")]
    IndirectCallTypeMismatch,

    #[error("call stack exhausted")]
    CallStackExhausted,

    #[error("all fuel consumed")]
    OutOfFuel,

    #[error("host function failed: {0:#}")]
    Host(anyhow::Error),

    #[error("host function result {index} should be {expected}, got {received}")]
    HostResultMismatch {
        index: usize,
        expected: ValType,
        received: ValType,
    },

    #[error("undefined function {0}")]
    UndefinedFunction(FuncAddr),

    #[error("invalid {space} index {index}")]
    InvalidIndex { space: &'static str, index: u32 },

    #[error("value stack underflow")]
    StackUnderflow,

    #[error("value type mismatch (expected {expected}, got {received})")]
    ValueTypeMismatch { expected: ValType, received: ValType },

    #[error("out of bounds table access: element segment does not fit")]
    ElementSegmentOutOfBounds,

    #[error("out of bounds memory access: data segment does not fit")]
    DataSegmentOutOfBounds,
}

/// Any failure from decoding through invocation, for hosts that want one error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Trap(#[from] Trap),

    #[error("incompatible import {index} ({module}/{name}): {reason}")]
    ImportMismatch {
        index: usize,
        module: String,
        name: String,
        reason: String,
    },

    #[error("expected {expected} imports, got {received}")]
    ImportCount { expected: usize, received: usize },

    #[error("no export named {0:?}")]
    InvalidExportName(String),

    #[error("invalid {space} index {index}")]
    InvalidIndex { space: &'static str, index: u32 },

    #[error("memory of {pages} pages exceeds the configured limit of {limit}")]
    MemoryLimit { pages: u32, limit: u32 },

    #[error("table of {elements} elements exceeds the configured limit of {limit}")]
    TableLimit { elements: u32, limit: u32 },

    #[error("global of type {expected} can't hold {received}")]
    GlobalTypeMismatch { expected: ValType, received: ValType },
}
