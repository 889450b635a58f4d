//! Flat accessors for a host-binding layer.
//!
//! Operations that mutate a [`Store`] take it by value and hand it back
//! alongside their result, so the caller keeps ownership whether or not the
//! operation succeeded.

use std::sync::Arc;

use corvid_codec::DecodeError;
use corvid_ir::{ExternKind, FuncType, Module, ValidationError};

use crate::{
    Error, ExternalValue, FuncAddr, GlobalAddr, MemAddr, ModuleInstance, Store, Trap, Value,
};

pub fn store_init() -> Store {
    Store::new()
}

pub fn module_decode(bytes: &[u8]) -> Result<Module, DecodeError> {
    corvid_codec::decode(bytes)
}

pub fn module_validate(module: &Module) -> Result<(), ValidationError> {
    corvid_ir::validate(module)
}

pub fn module_instantiate(
    store: Store,
    module: &Module,
) -> (Store, Result<Arc<ModuleInstance>, Error>) {
    module_instantiate_with_imports(store, module, &[])
}

pub fn module_instantiate_with_imports(
    mut store: Store,
    module: &Module,
    imports: &[ExternalValue],
) -> (Store, Result<Arc<ModuleInstance>, Error>) {
    let result = crate::instantiate_with_imports(&mut store, module, imports);
    (store, result)
}

/// Export names and kinds, in declaration order.
pub fn module_exports(module: &Module) -> Vec<(&str, ExternKind)> {
    module
        .exports()
        .iter()
        .map(|export| (export.name(), export.desc().kind()))
        .collect()
}

/// `(module, name, kind)` for every import, in declaration order.
pub fn module_imports(module: &Module) -> Vec<(&str, &str, ExternKind)> {
    module
        .imports()
        .iter()
        .map(|import| (import.module(), import.name(), import.desc().kind()))
        .collect()
}

pub fn instance_export(instance: &ModuleInstance, name: &str) -> Result<ExternalValue, Error> {
    instance
        .export(name)
        .ok_or_else(|| Error::InvalidExportName(name.to_string()))
}

pub fn func_type(store: &Store, addr: FuncAddr) -> Result<FuncType, Trap> {
    store
        .func_type(addr)
        .cloned()
        .ok_or(Trap::UndefinedFunction(addr))
}

pub fn func_invoke(
    mut store: Store,
    addr: FuncAddr,
    args: &[Value],
) -> (Store, Result<Vec<Value>, Trap>) {
    let result = crate::invoke(&mut store, addr, args);
    (store, result)
}

pub fn func_alloc<F>(mut store: Store, ty: FuncType, func: F) -> (Store, FuncAddr)
where
    F: Fn(&[Value], &mut [Value]) -> anyhow::Result<()> + Send + Sync + 'static,
{
    let addr = store.alloc_host_func(ty, func);
    (store, addr)
}

pub fn global_read(store: &Store, addr: GlobalAddr) -> Option<Value> {
    store.global(addr).map(|global| global.value())
}

/// Copy `len` bytes out of a memory. An unknown address has no bytes in range.
pub fn mem_read(store: &Store, addr: MemAddr, offset: u32, len: usize) -> Result<Vec<u8>, Trap> {
    let memory = store.memory(addr).ok_or(Trap::MemoryOutOfBounds)?;
    let mut buf = vec![0; len];
    memory.read(offset, &mut buf)?;
    Ok(buf)
}

pub fn mem_write(store: &mut Store, addr: MemAddr, offset: u32, bytes: &[u8]) -> Result<(), Trap> {
    store
        .memory_mut(addr)
        .ok_or(Trap::MemoryOutOfBounds)?
        .write(offset, bytes)
}
