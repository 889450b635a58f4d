#![allow(dead_code)]

//! A small assembler for hand-written test binaries.

pub const I32: u8 = 0x7f;
pub const I64: u8 = 0x7e;
pub const F32: u8 = 0x7d;
pub const F64: u8 = 0x7c;

pub const TYPE: u8 = 1;
pub const IMPORT: u8 = 2;
pub const FUNCTION: u8 = 3;
pub const MEMORY: u8 = 5;
pub const GLOBAL: u8 = 6;
pub const EXPORT: u8 = 7;
pub const START: u8 = 8;
pub const CODE: u8 = 10;
pub const DATA: u8 = 11;

pub const KIND_FUNC: u8 = 0;
pub const KIND_MEMORY: u8 = 2;
pub const KIND_GLOBAL: u8 = 3;

pub fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn uleb(value: u64) -> Vec<u8> {
    let mut out = Vec::new();
    leb128::write::unsigned(&mut out, value).expect("writing to a Vec cannot fail");
    out
}

pub fn sleb(value: i64) -> Vec<u8> {
    let mut out = Vec::new();
    leb128::write::signed(&mut out, value).expect("writing to a Vec cannot fail");
    out
}

pub fn name(s: &str) -> Vec<u8> {
    let mut out = uleb(s.len() as u64);
    out.extend_from_slice(s.as_bytes());
    out
}

pub fn type_entry(params: &[u8], results: &[u8]) -> Vec<u8> {
    let mut out = vec![0x60];
    out.extend(uleb(params.len() as u64));
    out.extend_from_slice(params);
    out.extend(uleb(results.len() as u64));
    out.extend_from_slice(results);
    out
}

pub fn export(field: &str, kind: u8, idx: u32) -> Vec<u8> {
    let mut out = name(field);
    out.push(kind);
    out.extend(uleb(idx.into()));
    out
}

pub fn import(module: &str, field: &str, desc: &[u8]) -> Vec<u8> {
    let mut out = name(module);
    out.extend(name(field));
    out.extend_from_slice(desc);
    out
}

/// A code entry: `locals` as (count, type) runs, then the body. The trailing
/// `end` is appended.
pub fn code(locals: &[(u32, u8)], body: &[u8]) -> Vec<u8> {
    let mut entry = uleb(locals.len() as u64);
    for (count, ty) in locals {
        entry.extend(uleb((*count).into()));
        entry.push(*ty);
    }
    entry.extend_from_slice(body);
    entry.push(0x0b);

    let mut out = uleb(entry.len() as u64);
    out.extend(entry);
    out
}

/// A constant expression, `end` included.
pub fn i32_const_expr(value: i32) -> Vec<u8> {
    let mut out = vec![0x41];
    out.extend(sleb(value.into()));
    out.push(0x0b);
    out
}

#[derive(Default)]
pub struct WasmBuilder {
    sections: Vec<(u8, Vec<u8>)>,
}

impl WasmBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// A vector section: entry count followed by the entries.
    pub fn section(self, id: u8, entries: &[Vec<u8>]) -> Self {
        let mut body = uleb(entries.len() as u64);
        for entry in entries {
            body.extend_from_slice(entry);
        }
        self.raw_section(id, body)
    }

    pub fn raw_section(mut self, id: u8, body: Vec<u8>) -> Self {
        self.sections.push((id, body));
        self
    }

    pub fn custom_section(self, field: &str, bytes: &[u8]) -> Self {
        let mut body = name(field);
        body.extend_from_slice(bytes);
        self.raw_section(0, body)
    }

    pub fn build(self) -> Vec<u8> {
        let mut out = b"\0asm".to_vec();
        out.extend_from_slice(&[1, 0, 0, 0]);
        for (id, body) in self.sections {
            out.push(id);
            out.extend(uleb(body.len() as u64));
            out.extend(body);
        }
        out
    }
}

// (func (export "add") (param i32 i32) (result i32) local.get 0 local.get 1 i32.add)
pub fn add_module() -> Vec<u8> {
    WasmBuilder::new()
        .section(TYPE, &[type_entry(&[I32, I32], &[I32])])
        .section(FUNCTION, &[uleb(0)])
        .section(EXPORT, &[export("add", KIND_FUNC, 0)])
        .section(CODE, &[code(&[], &[0x20, 0x00, 0x20, 0x01, 0x6a])])
        .build()
}
