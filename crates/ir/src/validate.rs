use std::collections::HashSet;

use thiserror::Error;

use crate::typechecker::{TypeChecker, Val};
use crate::{
    ExportDesc, FuncIdx, FuncType, GlobalIdx, GlobalType, ImportDesc, Instr, Limits, MemType,
    Module, TableType, TypeIdx, ValType,
};

/// The largest number of 64KiB pages a memory may declare.
pub const MAX_MEMORY_PAGES: u32 = 1 << 16;

#[derive(Clone, Debug, PartialEq, Error)]
pub enum ValidationError {
    #[error("type mismatch: stack not empty ({0} values left on stack)")]
    UnexpectedTypes(usize),

    #[error("type mismatch: expected {expected}, got {received}")]
    TypeMismatch { received: Val, expected: Val },

    #[error("type mismatch: br.table arity not uniform (expected {0}; got {1})")]
    BrTableArityMismatch(usize, usize),

    #[error("alignment must not be larger than natural (got {0}; must be <= {1})")]
    InvalidLoadAlignment(u32, u32),

    #[error("global is immutable (global index={0})")]
    AssignmentToImmutableGlobal(u32),

    #[error("unknown label: out of range (got {0}; max is {1})")]
    InvalidLabelIndex(u32, u32),

    #[error("constant expression required (got {0:?})")]
    ConstantExprRequired(Box<Instr>),

    #[error("constant expression may only read an earlier immutable global (global index={0})")]
    InvalidConstantGlobal(u32),

    #[error("type mismatch: stack empty")]
    StackUnderflow,

    #[error("block stack empty")]
    BlockUnderflow,

    #[error(
        "type mismatch (alternate required when 'if' input length is different from result length)"
    )]
    AlternateRequired,

    #[error("unknown type {0}")]
    UnknownType(u32),

    #[error("unknown function {0}")]
    UnknownFunction(u32),

    #[error("unknown table {0}")]
    UnknownTable(u32),

    #[error("unknown memory {0}")]
    UnknownMemory(u32),

    #[error("unknown global {0}")]
    UnknownGlobal(u32),

    #[error("unknown local {0}")]
    UnknownLocal(u32),

    #[error("invalid result arity: functions may return at most one value (got {0})")]
    InvalidResultArity(usize),

    #[error("size minimum must not be greater than maximum (min={0}, max={1})")]
    LimitsMinExceedsMax(u32, u32),

    #[error("memory size must be at most 65536 pages (got {0})")]
    MemorySizeTooLarge(u32),

    #[error("multiple tables (got {0}; at most 1 allowed)")]
    MultipleTables(usize),

    #[error("multiple memories (got {0}; at most 1 allowed)")]
    MultipleMemories(usize),

    #[error("duplicate export name {0:?}")]
    DuplicateExport(String),

    #[error("start function must have type [] -> [] (got {0})")]
    InvalidStartFunction(FuncType),
}

/// The index spaces visible while checking a module: imports first, then
/// definitions.
pub(crate) struct Context<'a> {
    pub(crate) types: &'a [FuncType],
    pub(crate) funcs: Box<[TypeIdx]>,
    pub(crate) tables: Box<[TableType]>,
    pub(crate) memories: Box<[MemType]>,
    pub(crate) globals: Box<[GlobalType]>,
}

impl<'a> Context<'a> {
    pub(crate) fn type_at(&self, TypeIdx(idx): TypeIdx) -> Result<&'a FuncType, ValidationError> {
        self.types
            .get(idx as usize)
            .ok_or(ValidationError::UnknownType(idx))
    }

    pub(crate) fn func_type(&self, FuncIdx(idx): FuncIdx) -> Result<&'a FuncType, ValidationError> {
        let type_idx = self
            .funcs
            .get(idx as usize)
            .ok_or(ValidationError::UnknownFunction(idx))?;
        self.type_at(*type_idx)
    }

    pub(crate) fn global(&self, GlobalIdx(idx): GlobalIdx) -> Result<GlobalType, ValidationError> {
        self.globals
            .get(idx as usize)
            .copied()
            .ok_or(ValidationError::UnknownGlobal(idx))
    }
}

fn validate_limits(limits: &Limits, ceiling: Option<u32>) -> Result<(), ValidationError> {
    if let Some(ceiling) = ceiling {
        for size in [Some(limits.min()), limits.max()].into_iter().flatten() {
            if size > ceiling {
                return Err(ValidationError::MemorySizeTooLarge(size));
            }
        }
    }

    if let Limits::Range(min, max) = limits {
        if min > max {
            return Err(ValidationError::LimitsMinExceedsMax(*min, *max));
        }
    }
    Ok(())
}

// Table limits are u32, which already bounds them below 2^32.
fn validate_table_type(TableType(_, limits): &TableType) -> Result<(), ValidationError> {
    validate_limits(limits, None)
}

fn validate_mem_type(MemType(limits): &MemType) -> Result<(), ValidationError> {
    validate_limits(limits, Some(MAX_MEMORY_PAGES))
}

/// Check that `module` is well-typed and respects every index-space bound.
/// Validation has no side effects; a module that passes may be instantiated.
pub fn validate(module: &Module) -> Result<(), ValidationError> {
    for ty in module.types() {
        if ty.output_arity() > 1 {
            return Err(ValidationError::InvalidResultArity(ty.output_arity()));
        }
    }

    for import in module.imports() {
        match import.desc() {
            ImportDesc::Func(TypeIdx(idx)) => {
                if *idx as usize >= module.types().len() {
                    return Err(ValidationError::UnknownType(*idx));
                }
            }
            ImportDesc::Table(table_type) => validate_table_type(table_type)?,
            ImportDesc::Mem(mem_type) => validate_mem_type(mem_type)?,
            ImportDesc::Global(_) => {}
        }
    }

    let ctx = Context {
        types: module.types(),
        funcs: module.func_type_indices().collect(),
        tables: module.table_types().collect(),
        memories: module.memory_types().collect(),
        globals: module.global_types().collect(),
    };

    for func in module.funcs() {
        ctx.type_at(func.type_idx)?;
    }

    for table_type in module.tables() {
        validate_table_type(table_type)?;
    }

    for mem_type in module.memories() {
        validate_mem_type(mem_type)?;
    }

    if ctx.tables.len() > 1 {
        return Err(ValidationError::MultipleTables(ctx.tables.len()));
    }

    if ctx.memories.len() > 1 {
        return Err(ValidationError::MultipleMemories(ctx.memories.len()));
    }

    let imported_globals = module.import_counts().globals;
    for (idx, global) in module.globals().iter().enumerate() {
        let GlobalType(val_type, _) = global.0;
        TypeChecker::new(&ctx, Box::new([])).check_constant_expr(
            val_type,
            imported_globals + idx,
            global.1.instrs(),
        )?;
    }

    for (idx, func) in module.funcs().iter().enumerate() {
        let ty = ctx.type_at(func.type_idx)?;
        let locals: Box<[ValType]> = ty
            .params()
            .iter()
            .copied()
            .chain(func.expanded_locals())
            .collect();

        log::trace!("validating function {idx} {ty}");
        TypeChecker::new(&ctx, locals).check_function(ty.results(), func.body.instrs())?;
    }

    for elem in module.elems() {
        if elem.table.as_usize() >= ctx.tables.len() {
            return Err(ValidationError::UnknownTable(elem.table.0));
        }

        TypeChecker::new(&ctx, Box::new([])).check_constant_expr(
            ValType::I32,
            ctx.globals.len(),
            elem.offset.instrs(),
        )?;

        for func_idx in elem.init.iter() {
            ctx.func_type(*func_idx)?;
        }
    }

    for data in module.datas() {
        if data.memory.as_usize() >= ctx.memories.len() {
            return Err(ValidationError::UnknownMemory(data.memory.0));
        }

        TypeChecker::new(&ctx, Box::new([])).check_constant_expr(
            ValType::I32,
            ctx.globals.len(),
            data.offset.instrs(),
        )?;
    }

    if let Some(start) = module.start() {
        let ty = ctx.func_type(start)?;
        if ty.input_arity() != 0 || ty.output_arity() != 0 {
            return Err(ValidationError::InvalidStartFunction(ty.clone()));
        }
    }

    let mut seen = HashSet::new();
    for export in module.exports() {
        if !seen.insert(export.name()) {
            return Err(ValidationError::DuplicateExport(export.name().to_string()));
        }

        match *export.desc() {
            ExportDesc::Func(func_idx) => {
                ctx.func_type(func_idx)?;
            }
            ExportDesc::Table(table_idx) => {
                if table_idx.as_usize() >= ctx.tables.len() {
                    return Err(ValidationError::UnknownTable(table_idx.0));
                }
            }
            ExportDesc::Mem(mem_idx) => {
                if mem_idx.as_usize() >= ctx.memories.len() {
                    return Err(ValidationError::UnknownMemory(mem_idx.0));
                }
            }
            ExportDesc::Global(global_idx) => {
                ctx.global(global_idx)?;
            }
        }
    }

    log::debug!(
        "validated module: {} types, {} functions, {} exports",
        module.types().len(),
        ctx.funcs.len(),
        module.exports().len()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        BlockType, Elem, Export, Expr, Func, Global, Import, LabelIdx, Local, LocalIdx, MemArg,
        ModuleBuilder, Mutability, MemIdx, Data, ByteVec, RefType, TableIdx,
    };

    fn func(type_idx: u32, locals: &[Local], body: Vec<Instr>) -> Func {
        Func {
            type_idx: TypeIdx(type_idx),
            locals: locals.into(),
            body: Expr(body),
        }
    }

    fn module_with(types: Vec<FuncType>, funcs: Vec<Func>) -> ModuleBuilder {
        ModuleBuilder::new()
            .type_section(types.into_boxed_slice())
            .funcs(funcs.into_boxed_slice())
    }

    fn add_module() -> Module {
        module_with(
            vec![FuncType::new([ValType::I32, ValType::I32], [ValType::I32])],
            vec![func(
                0,
                &[],
                vec![
                    Instr::LocalGet(LocalIdx(0)),
                    Instr::LocalGet(LocalIdx(1)),
                    Instr::I32Add,
                ],
            )],
        )
        .export_section(Box::new([Export::new("add", ExportDesc::Func(FuncIdx(0)))]))
        .build()
    }

    #[test]
    fn accepts_add() -> anyhow::Result<()> {
        validate(&add_module())?;
        Ok(())
    }

    #[test]
    fn rejects_wrong_result_type() {
        let module = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(0, &[], vec![Instr::I64Const(1)])],
        )
        .build();

        assert_eq!(
            validate(&module),
            Err(ValidationError::TypeMismatch {
                received: Val::Typed(ValType::I64),
                expected: Val::Typed(ValType::I32),
            })
        );
    }

    #[test]
    fn rejects_leftover_values() {
        let module = module_with(
            vec![FuncType::new([], [])],
            vec![func(0, &[], vec![Instr::I32Const(1)])],
        )
        .build();

        assert_eq!(validate(&module), Err(ValidationError::UnexpectedTypes(1)));
    }

    #[test]
    fn rejects_underflow() {
        let module = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(0, &[], vec![Instr::I32Const(1), Instr::I32Add])],
        )
        .build();

        assert_eq!(validate(&module), Err(ValidationError::StackUnderflow));
    }

    #[test]
    fn unreachable_makes_stack_polymorphic() -> anyhow::Result<()> {
        let module = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(
                0,
                &[],
                vec![Instr::Unreachable, Instr::I32Add, Instr::Drop, Instr::F64Const(0)],
            )],
        )
        .build();

        // the trailing f64 is pushed above the polymorphic bottom, so the
        // function result check still sees it.
        assert!(matches!(
            validate(&module),
            Err(ValidationError::TypeMismatch { .. })
        ));

        let module = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(0, &[], vec![Instr::Unreachable, Instr::I32Add])],
        )
        .build();
        validate(&module)?;
        Ok(())
    }

    #[test]
    fn branch_checks_label_arity() -> anyhow::Result<()> {
        let ok = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(
                0,
                &[],
                vec![Instr::Block(
                    BlockType::Val(ValType::I32),
                    Box::new([Instr::I32Const(7), Instr::Br(LabelIdx(0))]),
                )],
            )],
        )
        .build();
        validate(&ok)?;

        let missing_value = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(
                0,
                &[],
                vec![Instr::Block(
                    BlockType::Val(ValType::I32),
                    Box::new([Instr::Br(LabelIdx(0))]),
                )],
            )],
        )
        .build();
        assert_eq!(validate(&missing_value), Err(ValidationError::StackUnderflow));

        let bad_label = module_with(
            vec![FuncType::new([], [])],
            vec![func(0, &[], vec![Instr::Br(LabelIdx(1))])],
        )
        .build();
        assert_eq!(
            validate(&bad_label),
            Err(ValidationError::InvalidLabelIndex(1, 1))
        );
        Ok(())
    }

    #[test]
    fn br_table_targets_must_agree() {
        let module = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(
                0,
                &[],
                vec![Instr::Block(
                    BlockType::Val(ValType::I32),
                    Box::new([Instr::Block(
                        BlockType::Empty,
                        Box::new([
                            Instr::I32Const(1),
                            Instr::I32Const(0),
                            Instr::BrTable(Box::new([LabelIdx(0)]), LabelIdx(1)),
                        ]),
                    )]),
                )],
            )],
        )
        .build();

        assert_eq!(
            validate(&module),
            Err(ValidationError::BrTableArityMismatch(1, 0))
        );
    }

    #[test]
    fn loop_label_takes_no_values() -> anyhow::Result<()> {
        let module = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(
                0,
                &[Local(1, ValType::I32)],
                vec![Instr::Loop(
                    BlockType::Val(ValType::I32),
                    Box::new([
                        Instr::LocalGet(LocalIdx(0)),
                        Instr::BrIf(LabelIdx(0)),
                        Instr::I32Const(3),
                    ]),
                )],
            )],
        )
        .build();
        validate(&module)?;
        Ok(())
    }

    #[test]
    fn if_without_else_cannot_produce_values() {
        let module = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(
                0,
                &[],
                vec![
                    Instr::I32Const(1),
                    Instr::If(BlockType::Val(ValType::I32), Box::new([Instr::I32Const(2)])),
                ],
            )],
        )
        .build();
        assert_eq!(validate(&module), Err(ValidationError::AlternateRequired));
    }

    #[test]
    fn if_else_arms_are_checked_separately() -> anyhow::Result<()> {
        let if_else = |alternate: Instr| {
            module_with(
                vec![FuncType::new([], [ValType::I32])],
                vec![func(
                    0,
                    &[],
                    vec![
                        Instr::I32Const(1),
                        Instr::IfElse(
                            BlockType::Val(ValType::I32),
                            Box::new([Instr::I32Const(2)]),
                            Box::new([alternate]),
                        ),
                    ],
                )],
            )
            .build()
        };

        validate(&if_else(Instr::I32Const(3)))?;
        assert_eq!(
            validate(&if_else(Instr::I64Const(3))),
            Err(ValidationError::TypeMismatch {
                received: Val::Typed(ValType::I64),
                expected: Val::Typed(ValType::I32),
            })
        );
        Ok(())
    }

    fn nested_blocks(depth: usize, innermost: Vec<Instr>) -> Vec<Instr> {
        let mut body = innermost;
        for _ in 0..depth {
            body = vec![Instr::Block(BlockType::Empty, body.into_boxed_slice())];
        }
        body
    }

    #[test]
    fn deep_nesting_is_checked_without_recursion() -> anyhow::Result<()> {
        let module = module_with(
            vec![FuncType::new([], [])],
            vec![func(0, &[], nested_blocks(200_000, vec![Instr::Nop]))],
        )
        .build();
        validate(&module)?;

        let module = module_with(
            vec![FuncType::new([], [])],
            vec![func(0, &[], nested_blocks(200_000, vec![Instr::I32Const(1)]))],
        )
        .build();
        assert_eq!(validate(&module), Err(ValidationError::UnexpectedTypes(1)));

        let module = module_with(
            vec![FuncType::new([], [])],
            vec![func(0, &[], nested_blocks(200_000, vec![Instr::Br(LabelIdx(200_000))]))],
        )
        .build();
        validate(&module)?;
        Ok(())
    }

    #[test]
    fn select_requires_matching_operands() {
        let module = module_with(
            vec![FuncType::new([], [ValType::I32])],
            vec![func(
                0,
                &[],
                vec![
                    Instr::I32Const(1),
                    Instr::I64Const(2),
                    Instr::I32Const(0),
                    Instr::Select,
                ],
            )],
        )
        .build();
        assert!(matches!(
            validate(&module),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn memory_access_requires_memory_and_natural_alignment() {
        let load = |align| {
            module_with(
                vec![FuncType::new([], [ValType::I32])],
                vec![func(
                    0,
                    &[],
                    vec![Instr::I32Const(0), Instr::I32Load(MemArg(align, 0))],
                )],
            )
        };

        assert_eq!(
            validate(&load(2).build()),
            Err(ValidationError::UnknownMemory(0))
        );

        let with_memory = load(3)
            .memory_section(Box::new([MemType(Limits::Min(1))]))
            .build();
        assert_eq!(
            validate(&with_memory),
            Err(ValidationError::InvalidLoadAlignment(3, 2))
        );

        let ok = load(2)
            .memory_section(Box::new([MemType(Limits::Min(1))]))
            .build();
        assert_eq!(validate(&ok), Ok(()));
    }

    #[test]
    fn rejects_multiple_results() {
        let module = ModuleBuilder::new()
            .type_section(Box::new([FuncType::new([], [ValType::I32, ValType::I32])]))
            .build();
        assert_eq!(
            validate(&module),
            Err(ValidationError::InvalidResultArity(2))
        );
    }

    #[test]
    fn rejects_oversized_memory_and_inverted_limits() {
        let module = ModuleBuilder::new()
            .memory_section(Box::new([MemType(Limits::Min(MAX_MEMORY_PAGES + 1))]))
            .build();
        assert_eq!(
            validate(&module),
            Err(ValidationError::MemorySizeTooLarge(MAX_MEMORY_PAGES + 1))
        );

        let module = ModuleBuilder::new()
            .table_section(Box::new([TableType(RefType::FuncRef, Limits::Range(2, 1))]))
            .build();
        assert_eq!(
            validate(&module),
            Err(ValidationError::LimitsMinExceedsMax(2, 1))
        );
    }

    #[test]
    fn counts_imports_against_single_memory_limit() {
        let module = ModuleBuilder::new()
            .import_section(Box::new([Import::new(
                "env".into(),
                "memory".into(),
                ImportDesc::Mem(MemType(Limits::Min(1))),
            )]))
            .memory_section(Box::new([MemType(Limits::Min(1))]))
            .build();
        assert_eq!(validate(&module), Err(ValidationError::MultipleMemories(2)));
    }

    #[test]
    fn rejects_duplicate_exports_of_any_kind() {
        let module = module_with(
            vec![FuncType::new([], [])],
            vec![func(0, &[], vec![])],
        )
        .global_section(Box::new([Global(
            GlobalType(ValType::I32, Mutability::Const),
            Expr(vec![Instr::I32Const(0)]),
        )]))
        .export_section(Box::new([
            Export::new("x", ExportDesc::Func(FuncIdx(0))),
            Export::new("x", ExportDesc::Global(GlobalIdx(0))),
        ]))
        .build();

        assert_eq!(
            validate(&module),
            Err(ValidationError::DuplicateExport("x".to_string()))
        );
    }

    #[test]
    fn start_function_must_be_nullary() {
        let module = add_module();
        let module = ModuleBuilder::new()
            .type_section(module.types().into())
            .funcs(module.funcs().into())
            .start_section(FuncIdx(0))
            .build();

        assert!(matches!(
            validate(&module),
            Err(ValidationError::InvalidStartFunction(_))
        ));
    }

    #[test]
    fn constant_expressions() {
        let global = |init: Vec<Instr>, mutability| {
            ModuleBuilder::new()
                .global_section(Box::new([
                    Global(GlobalType(ValType::I32, mutability), Expr(vec![Instr::I32Const(1)])),
                    Global(GlobalType(ValType::I32, Mutability::Const), Expr(init)),
                ]))
                .build()
        };

        assert_eq!(
            validate(&global(vec![Instr::GlobalGet(GlobalIdx(0))], Mutability::Const)),
            Ok(())
        );
        assert_eq!(
            validate(&global(vec![Instr::GlobalGet(GlobalIdx(0))], Mutability::Variable)),
            Err(ValidationError::InvalidConstantGlobal(0))
        );
        assert_eq!(
            validate(&global(vec![Instr::GlobalGet(GlobalIdx(1))], Mutability::Const)),
            Err(ValidationError::InvalidConstantGlobal(1))
        );
        assert_eq!(
            validate(&global(
                vec![Instr::I32Const(1), Instr::I32Const(2), Instr::I32Add],
                Mutability::Const
            )),
            Err(ValidationError::ConstantExprRequired(Box::new(Instr::I32Add)))
        );
    }

    #[test]
    fn global_set_requires_mutable_global() {
        let module = module_with(
            vec![FuncType::new([], [])],
            vec![func(
                0,
                &[],
                vec![Instr::I32Const(1), Instr::GlobalSet(GlobalIdx(0))],
            )],
        )
        .global_section(Box::new([Global(
            GlobalType(ValType::I32, Mutability::Const),
            Expr(vec![Instr::I32Const(0)]),
        )]))
        .build();
        assert_eq!(
            validate(&module),
            Err(ValidationError::AssignmentToImmutableGlobal(0))
        );
    }

    #[test]
    fn segments_require_their_table_and_memory() {
        let module = module_with(vec![FuncType::new([], [])], vec![func(0, &[], vec![])])
            .element_section(Box::new([Elem {
                table: TableIdx(0),
                offset: Expr(vec![Instr::I32Const(0)]),
                init: Box::new([FuncIdx(0)]),
            }]))
            .build();
        assert_eq!(validate(&module), Err(ValidationError::UnknownTable(0)));

        let module = ModuleBuilder::new()
            .memory_section(Box::new([MemType(Limits::Min(1))]))
            .data_section(Box::new([Data {
                memory: MemIdx(0),
                offset: Expr(vec![Instr::I64Const(0)]),
                init: ByteVec(Box::new([1, 2, 3])),
            }]))
            .build();
        assert!(matches!(
            validate(&module),
            Err(ValidationError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn call_indirect_requires_table() {
        let module = module_with(
            vec![FuncType::new([], [])],
            vec![func(
                0,
                &[],
                vec![Instr::I32Const(0), Instr::CallIndirect(TypeIdx(0))],
            )],
        )
        .build();
        assert_eq!(validate(&module), Err(ValidationError::UnknownTable(0)));
    }
}
