use std::sync::Arc;

use corvid_ir::{
    Expr, ExportDesc, ExternKind, FuncIdx, FuncType, GlobalIdx, ImportDesc, Instr, Limits,
    MemIdx, Module, TableIdx, TypeIdx, ValType, ValidationError,
};

use crate::function::FuncInst;
use crate::{
    machine, Error, FuncAddr, GlobalAddr, GlobalInst, MemAddr, Store, TableAddr, Trap, Value,
};

/// A reference to something a module can import or export.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ExternalValue {
    Func(FuncAddr),
    Table(TableAddr),
    Memory(MemAddr),
    Global(GlobalAddr),
}

impl ExternalValue {
    pub fn kind(&self) -> ExternKind {
        match self {
            ExternalValue::Func(_) => ExternKind::Func,
            ExternalValue::Table(_) => ExternKind::Table,
            ExternalValue::Memory(_) => ExternKind::Memory,
            ExternalValue::Global(_) => ExternKind::Global,
        }
    }

    pub fn as_func(&self) -> Option<FuncAddr> {
        match self {
            ExternalValue::Func(addr) => Some(*addr),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
struct ExportInst {
    name: String,
    value: ExternalValue,
}

/// The runtime view of an instantiated module. Its index spaces map module
/// indices to store addresses, imports first.
#[derive(Debug)]
pub struct ModuleInstance {
    types: Box<[FuncType]>,
    func_addrs: Box<[FuncAddr]>,
    table_addrs: Box<[TableAddr]>,
    mem_addrs: Box<[MemAddr]>,
    global_addrs: Box<[GlobalAddr]>,
    exports: Box<[ExportInst]>,
}

impl ModuleInstance {
    pub fn types(&self) -> &[FuncType] {
        &self.types
    }

    pub fn func_addrs(&self) -> &[FuncAddr] {
        &self.func_addrs
    }

    pub fn table_addrs(&self) -> &[TableAddr] {
        &self.table_addrs
    }

    pub fn mem_addrs(&self) -> &[MemAddr] {
        &self.mem_addrs
    }

    pub fn global_addrs(&self) -> &[GlobalAddr] {
        &self.global_addrs
    }

    /// Exports in declaration order.
    pub fn exports(&self) -> impl Iterator<Item = (&str, ExternalValue)> {
        self.exports
            .iter()
            .map(|export| (export.name.as_str(), export.value))
    }

    pub fn export(&self, name: &str) -> Option<ExternalValue> {
        self.exports
            .iter()
            .find(|export| export.name == name)
            .map(|export| export.value)
    }

    #[inline]
    pub(crate) fn type_at(&self, TypeIdx(idx): TypeIdx) -> Result<&FuncType, Trap> {
        self.types.get(idx as usize).ok_or(Trap::InvalidIndex {
            space: "type",
            index: idx,
        })
    }

    #[inline]
    pub(crate) fn func(&self, FuncIdx(idx): FuncIdx) -> Result<FuncAddr, Trap> {
        self.func_addrs
            .get(idx as usize)
            .copied()
            .ok_or(Trap::InvalidIndex {
                space: "function",
                index: idx,
            })
    }

    #[inline]
    pub(crate) fn table(&self, TableIdx(idx): TableIdx) -> Result<TableAddr, Trap> {
        self.table_addrs
            .get(idx as usize)
            .copied()
            .ok_or(Trap::InvalidIndex {
                space: "table",
                index: idx,
            })
    }

    #[inline]
    pub(crate) fn memory(&self, MemIdx(idx): MemIdx) -> Result<MemAddr, Trap> {
        self.mem_addrs
            .get(idx as usize)
            .copied()
            .ok_or(Trap::InvalidIndex {
                space: "memory",
                index: idx,
            })
    }

    #[inline]
    pub(crate) fn global(&self, GlobalIdx(idx): GlobalIdx) -> Result<GlobalAddr, Trap> {
        self.global_addrs
            .get(idx as usize)
            .copied()
            .ok_or(Trap::InvalidIndex {
                space: "global",
                index: idx,
            })
    }
}

fn limits_match(actual: &Limits, expected: &Limits) -> bool {
    actual.min() >= expected.min()
        && match expected.max() {
            None => true,
            Some(expected_max) => actual.max().is_some_and(|max| max <= expected_max),
        }
}

/// Evaluate a constant expression against the globals allocated so far.
fn eval_const(store: &Store, globals: &[GlobalAddr], expr: &Expr) -> Result<Value, Error> {
    Ok(match expr.instrs() {
        [Instr::I32Const(v)] => Value::I32(*v),
        [Instr::I64Const(v)] => Value::I64(*v),
        [Instr::F32Const(bits)] => Value::F32(f32::from_bits(*bits)),
        [Instr::F64Const(bits)] => Value::F64(f64::from_bits(*bits)),
        [Instr::GlobalGet(GlobalIdx(idx))] => globals
            .get(*idx as usize)
            .and_then(|addr| store.global(*addr))
            .map(GlobalInst::value)
            .ok_or(Error::InvalidIndex {
                space: "global",
                index: *idx,
            })?,
        [instr, ..] => {
            return Err(ValidationError::ConstantExprRequired(Box::new(instr.clone())).into())
        }
        [] => return Err(ValidationError::StackUnderflow.into()),
    })
}

fn eval_offset(store: &Store, globals: &[GlobalAddr], expr: &Expr) -> Result<u32, Error> {
    match eval_const(store, globals, expr)? {
        Value::I32(offset) => Ok(offset as u32),
        value => Err(Trap::ValueTypeMismatch {
            expected: ValType::I32,
            received: value.ty(),
        }
        .into()),
    }
}

/// Instantiate a module that has no imports.
pub fn instantiate(store: &mut Store, module: &Module) -> Result<Arc<ModuleInstance>, Error> {
    instantiate_with_imports(store, module, &[])
}

/// Validate `module`, resolve its imports positionally against `imports`,
/// allocate its functions, tables, memories and globals, write its element
/// and data segments, and run its start function.
///
/// If allocation or a segment bounds check fails, the store is left as it
/// was. A trapping start function leaves the instance allocated.
pub fn instantiate_with_imports(
    store: &mut Store,
    module: &Module,
    imports: &[ExternalValue],
) -> Result<Arc<ModuleInstance>, Error> {
    corvid_ir::validate(module)?;

    if module.imports().len() != imports.len() {
        return Err(Error::ImportCount {
            expected: module.imports().len(),
            received: imports.len(),
        });
    }

    let mut func_addrs = Vec::with_capacity(module.imports().len() + module.funcs().len());
    let mut table_addrs = Vec::new();
    let mut mem_addrs = Vec::new();
    let mut global_addrs = Vec::new();

    for (index, (import, external)) in module.imports().iter().zip(imports).enumerate() {
        let mismatch = |reason: String| Error::ImportMismatch {
            index,
            module: import.module().to_string(),
            name: import.name().to_string(),
            reason,
        };

        match (import.desc(), external) {
            (ImportDesc::Func(type_idx), ExternalValue::Func(addr)) => {
                let expected = module
                    .types()
                    .get(type_idx.as_usize())
                    .ok_or(Error::InvalidIndex {
                        space: "type",
                        index: type_idx.0,
                    })?;
                let actual = store
                    .func_type(*addr)
                    .ok_or_else(|| mismatch(format!("no function at address {addr}")))?;
                if actual != expected {
                    return Err(mismatch(format!(
                        "expected function type {expected}, got {actual}"
                    )));
                }
                func_addrs.push(*addr);
            }

            (ImportDesc::Table(expected), ExternalValue::Table(addr)) => {
                let actual = store
                    .table(*addr)
                    .ok_or_else(|| mismatch(format!("no table at address {addr}")))?
                    .ty();
                if !limits_match(&actual.1, &expected.1) {
                    return Err(mismatch(format!(
                        "table limits {:?} don't satisfy {:?}",
                        actual.1, expected.1
                    )));
                }
                table_addrs.push(*addr);
            }

            (ImportDesc::Mem(expected), ExternalValue::Memory(addr)) => {
                let actual = store
                    .memory(*addr)
                    .ok_or_else(|| mismatch(format!("no memory at address {addr}")))?
                    .ty();
                if !limits_match(&actual.0, &expected.0) {
                    return Err(mismatch(format!(
                        "memory limits {:?} don't satisfy {:?}",
                        actual.0, expected.0
                    )));
                }
                mem_addrs.push(*addr);
            }

            (ImportDesc::Global(expected), ExternalValue::Global(addr)) => {
                let actual = store
                    .global(*addr)
                    .ok_or_else(|| mismatch(format!("no global at address {addr}")))?
                    .ty();
                if actual != *expected {
                    return Err(mismatch(format!(
                        "expected global {expected:?}, got {actual:?}"
                    )));
                }
                global_addrs.push(*addr);
            }

            (desc, external) => {
                return Err(mismatch(format!(
                    "expected {}, got {}",
                    desc.kind(),
                    external.kind()
                )))
            }
        }
    }

    let marks = store.marks();
    let first_func = store.funcs.len();
    let allocated = allocate(
        store,
        module,
        func_addrs,
        table_addrs,
        mem_addrs,
        global_addrs,
    );
    let (instance, segments) = match allocated {
        Ok(allocated) => allocated,
        Err(err) => {
            log::debug!("instantiation failed, rolling back: {err}");
            store.rollback(marks);
            return Err(err);
        }
    };

    for segment in segments {
        match segment {
            Segment::Elem(addr, offset, funcs) => {
                if let Some(table) = store.tables.get_mut(addr.0) {
                    table.init(offset, &funcs)?;
                }
            }
            Segment::Data(addr, offset, bytes) => {
                if let Some(memory) = store.memories.get_mut(addr.0) {
                    memory.write(offset, bytes)?;
                }
            }
        }
    }

    log::debug!(
        "instantiated module: functions {}..{}, {} exports",
        first_func,
        store.funcs.len(),
        instance.exports.len()
    );

    if let Some(start) = module.start() {
        let addr = instance.func(start)?;
        log::trace!("running start function {addr}");
        machine::invoke(store, addr, &[])?;
    }

    Ok(instance)
}

enum Segment<'m> {
    Elem(TableAddr, u32, Vec<FuncAddr>),
    Data(MemAddr, u32, &'m [u8]),
}

/// Allocate every defined entity and bounds-check every segment. Nothing is
/// written to a table or memory here, so the caller can roll back on error.
fn allocate<'m>(
    store: &mut Store,
    module: &'m Module,
    mut func_addrs: Vec<FuncAddr>,
    mut table_addrs: Vec<TableAddr>,
    mut mem_addrs: Vec<MemAddr>,
    mut global_addrs: Vec<GlobalAddr>,
) -> Result<(Arc<ModuleInstance>, Vec<Segment<'m>>), Error> {
    for global in module.globals() {
        let value = eval_const(store, &global_addrs, &global.1)?;
        global_addrs.push(store.alloc_global(global.0, value)?);
    }

    for table_type in module.tables() {
        table_addrs.push(store.alloc_table(*table_type)?);
    }

    for mem_type in module.memories() {
        mem_addrs.push(store.alloc_memory(*mem_type)?);
    }

    let base = store.funcs.len();
    func_addrs.extend((0..module.funcs().len()).map(|idx| FuncAddr(base + idx)));

    let mut instance = ModuleInstance {
        types: module.types().into(),
        func_addrs: func_addrs.into(),
        table_addrs: table_addrs.into(),
        mem_addrs: mem_addrs.into(),
        global_addrs: global_addrs.into(),
        exports: Box::default(),
    };

    instance.exports = module
        .exports()
        .iter()
        .map(|export| {
            let value = match export.desc() {
                ExportDesc::Func(idx) => ExternalValue::Func(instance.func(*idx)?),
                ExportDesc::Table(idx) => ExternalValue::Table(instance.table(*idx)?),
                ExportDesc::Mem(idx) => ExternalValue::Memory(instance.memory(*idx)?),
                ExportDesc::Global(idx) => ExternalValue::Global(instance.global(*idx)?),
            };
            Ok(ExportInst {
                name: export.name().to_string(),
                value,
            })
        })
        .collect::<Result<_, Trap>>()?;

    let mut segments = Vec::with_capacity(module.elems().len() + module.datas().len());
    for elem in module.elems() {
        let addr = instance.table(elem.table)?;
        let offset = eval_offset(store, &instance.global_addrs, &elem.offset)?;
        let funcs = elem
            .init
            .iter()
            .map(|idx| instance.func(*idx))
            .collect::<Result<Vec<_>, _>>()?;
        let fits = store
            .table(addr)
            .is_some_and(|table| table.fits(offset, funcs.len()));
        if !fits {
            return Err(Trap::ElementSegmentOutOfBounds.into());
        }
        segments.push(Segment::Elem(addr, offset, funcs));
    }

    for data in module.datas() {
        let addr = instance.memory(data.memory)?;
        let offset = eval_offset(store, &instance.global_addrs, &data.offset)?;
        let bytes = &*data.init.0;
        let fits = store
            .memory(addr)
            .is_some_and(|memory| memory.fits(offset, bytes.len()));
        if !fits {
            return Err(Trap::DataSegmentOutOfBounds.into());
        }
        segments.push(Segment::Data(addr, offset, bytes));
    }

    let instance = Arc::new(instance);
    for func in module.funcs() {
        let ty = instance.type_at(func.type_idx)?.clone();
        store.push_func(FuncInst::Module {
            ty,
            instance: Arc::clone(&instance),
            code: func.clone(),
        });
    }

    Ok((instance, segments))
}
