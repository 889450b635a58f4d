#[derive(Debug, PartialEq, Eq, Clone, Default)]
pub struct ByteVec(pub Box<[u8]>);

#[derive(Debug, PartialEq, Eq, Clone, Default, Hash)]
pub struct Name(pub String);

impl Name {
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl From<&str> for Name {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ValType {
    I32,
    I64,
    F32,
    F64,
}

impl std::fmt::Display for ValType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValType::I32 => f.write_str("i32"),
            ValType::I64 => f.write_str("i64"),
            ValType::F32 => f.write_str("f32"),
            ValType::F64 => f.write_str("f64"),
        }
    }
}

/// Table element types. Only function references exist in the MVP binary format.
#[derive(Debug, PartialEq, Eq, Clone, Copy, Default, Hash)]
pub enum RefType {
    #[default]
    FuncRef,
}

#[derive(Debug, PartialEq, Eq, Clone, Default, Hash)]
pub struct ResultType(pub Box<[ValType]>);

impl ResultType {
    pub fn as_slice(&self) -> &[ValType] {
        &self.0
    }
}

impl<const N: usize> From<[ValType; N]> for ResultType {
    fn from(value: [ValType; N]) -> Self {
        Self(Box::new(value))
    }
}

impl From<Vec<ValType>> for ResultType {
    fn from(value: Vec<ValType>) -> Self {
        Self(value.into_boxed_slice())
    }
}

/// A function signature: parameter types followed by result types.
#[derive(Debug, PartialEq, Eq, Clone, Default, Hash)]
pub struct FuncType(pub ResultType, pub ResultType);

impl FuncType {
    pub fn new(
        params: impl IntoIterator<Item = ValType>,
        results: impl IntoIterator<Item = ValType>,
    ) -> Self {
        Self(
            ResultType(params.into_iter().collect()),
            ResultType(results.into_iter().collect()),
        )
    }

    pub fn params(&self) -> &[ValType] {
        self.0.as_slice()
    }

    pub fn results(&self) -> &[ValType] {
        self.1.as_slice()
    }

    pub fn input_arity(&self) -> usize {
        self.0 .0.len()
    }

    pub fn output_arity(&self) -> usize {
        self.1 .0.len()
    }
}

impl std::fmt::Display for FuncType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("[")?;
        for (idx, param) in self.params().iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{param}")?;
        }
        f.write_str("] -> [")?;
        for (idx, result) in self.results().iter().enumerate() {
            if idx > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{result}")?;
        }
        f.write_str("]")
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Limits {
    Min(u32),
    Range(u32, u32),
}

impl Limits {
    pub fn min(&self) -> u32 {
        *match self {
            Limits::Min(min) => min,
            Limits::Range(min, _) => min,
        }
    }

    pub fn max(&self) -> Option<u32> {
        match self {
            Limits::Min(_) => None,
            Limits::Range(_, max) => Some(*max),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct MemType(pub Limits);

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct TableType(pub RefType, pub Limits);

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum Mutability {
    Const,
    Variable,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub struct GlobalType(pub ValType, pub Mutability);

impl GlobalType {
    pub fn is_mutable(&self) -> bool {
        matches!(self.1, Mutability::Variable)
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Global(pub GlobalType, pub Expr);

/// The result type of a structured control instruction: nothing, or a single value.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum BlockType {
    Empty,
    Val(ValType),
}

impl BlockType {
    pub fn results(&self) -> &[ValType] {
        match self {
            BlockType::Empty => &[],
            BlockType::Val(val_type) => std::slice::from_ref(val_type),
        }
    }

    pub fn arity(&self) -> usize {
        self.results().len()
    }
}

/// # MemArg
///
/// A memarg comprises two elements: an alignment exponent and an offset.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct MemArg(pub u32, pub u32);

impl MemArg {
    pub fn align(&self) -> u32 {
        self.0
    }

    pub fn offset(&self) -> u32 {
        self.1
    }
}

#[derive(Debug, PartialEq, Clone)]
pub enum Instr {
    // Control Instructions
    Unreachable,
    Nop,
    Block(BlockType, Box<[Instr]>),
    Loop(BlockType, Box<[Instr]>),
    If(BlockType, Box<[Instr]>),
    IfElse(BlockType, Box<[Instr]>, Box<[Instr]>),
    Br(LabelIdx),
    BrIf(LabelIdx),
    BrTable(Box<[LabelIdx]>, LabelIdx),
    Return,
    Call(FuncIdx),
    CallIndirect(TypeIdx),

    // Parametric Instructions
    Drop,
    Select,

    // Variable Instructions
    LocalGet(LocalIdx),
    LocalSet(LocalIdx),
    LocalTee(LocalIdx),
    GlobalGet(GlobalIdx),
    GlobalSet(GlobalIdx),

    // Memory Instructions
    I32Load(MemArg),
    I64Load(MemArg),
    F32Load(MemArg),
    F64Load(MemArg),
    I32Load8S(MemArg),
    I32Load8U(MemArg),
    I32Load16S(MemArg),
    I32Load16U(MemArg),
    I64Load8S(MemArg),
    I64Load8U(MemArg),
    I64Load16S(MemArg),
    I64Load16U(MemArg),
    I64Load32S(MemArg),
    I64Load32U(MemArg),
    I32Store(MemArg),
    I64Store(MemArg),
    F32Store(MemArg),
    F64Store(MemArg),
    I32Store8(MemArg),
    I32Store16(MemArg),
    I64Store8(MemArg),
    I64Store16(MemArg),
    I64Store32(MemArg),
    MemorySize,
    MemoryGrow,

    // Numeric Instructions
    I32Const(i32),
    I64Const(i64),
    // Floats are kept as raw bits so NaN payloads compare and round-trip exactly.
    F32Const(u32),
    F64Const(u64),
    I32Eqz,
    I32Eq,
    I32Ne,
    I32LtS,
    I32LtU,
    I32GtS,
    I32GtU,
    I32LeS,
    I32LeU,
    I32GeS,
    I32GeU,
    I64Eqz,
    I64Eq,
    I64Ne,
    I64LtS,
    I64LtU,
    I64GtS,
    I64GtU,
    I64LeS,
    I64LeU,
    I64GeS,
    I64GeU,
    F32Eq,
    F32Ne,
    F32Lt,
    F32Gt,
    F32Le,
    F32Ge,
    F64Eq,
    F64Ne,
    F64Lt,
    F64Gt,
    F64Le,
    F64Ge,
    I32Clz,
    I32Ctz,
    I32Popcnt,
    I32Add,
    I32Sub,
    I32Mul,
    I32DivS,
    I32DivU,
    I32RemS,
    I32RemU,
    I32And,
    I32Ior,
    I32Xor,
    I32Shl,
    I32ShrS,
    I32ShrU,
    I32Rol,
    I32Ror,
    I64Clz,
    I64Ctz,
    I64Popcnt,
    I64Add,
    I64Sub,
    I64Mul,
    I64DivS,
    I64DivU,
    I64RemS,
    I64RemU,
    I64And,
    I64Ior,
    I64Xor,
    I64Shl,
    I64ShrS,
    I64ShrU,
    I64Rol,
    I64Ror,
    F32Abs,
    F32Neg,
    F32Ceil,
    F32Floor,
    F32Trunc,
    F32NearestInt,
    F32Sqrt,
    F32Add,
    F32Sub,
    F32Mul,
    F32Div,
    F32Min,
    F32Max,
    F32CopySign,
    F64Abs,
    F64Neg,
    F64Ceil,
    F64Floor,
    F64Trunc,
    F64NearestInt,
    F64Sqrt,
    F64Add,
    F64Sub,
    F64Mul,
    F64Div,
    F64Min,
    F64Max,
    F64CopySign,
    I32ConvertI64,
    I32SConvertF32,
    I32UConvertF32,
    I32SConvertF64,
    I32UConvertF64,
    I64SConvertI32,
    I64UConvertI32,
    I64SConvertF32,
    I64UConvertF32,
    I64SConvertF64,
    I64UConvertF64,
    F32SConvertI32,
    F32UConvertI32,
    F32SConvertI64,
    F32UConvertI64,
    F32ConvertF64,
    F64SConvertI32,
    F64UConvertI32,
    F64SConvertI64,
    F64UConvertI64,
    F64ConvertF32,
    I32ReinterpretF32,
    I64ReinterpretF64,
    F32ReinterpretI32,
    F64ReinterpretI64,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Expr(pub Vec<Instr>);

impl Expr {
    pub fn instrs(&self) -> &[Instr] {
        &self.0
    }
}

// Nested bodies are flattened onto a work list before they drop, so a deeply
// nested expression is released without recursing once per level.
impl Drop for Expr {
    fn drop(&mut self) {
        let mut pending = std::mem::take(&mut self.0);
        while let Some(mut instr) = pending.pop() {
            match &mut instr {
                Instr::Block(_, body) | Instr::Loop(_, body) | Instr::If(_, body) => {
                    pending.extend(std::mem::take(body).into_vec());
                }
                Instr::IfElse(_, consequent, alternate) => {
                    pending.extend(std::mem::take(consequent).into_vec());
                    pending.extend(std::mem::take(alternate).into_vec());
                }
                _ => {}
            }
        }
    }
}

macro_rules! index_newtype {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
            #[repr(transparent)]
            pub struct $name(pub u32);

            impl $name {
                #[inline]
                pub fn as_usize(&self) -> usize {
                    self.0 as usize
                }
            }
        )*
    };
}

index_newtype! {
    TypeIdx,
    /// An index into the function index space: imported functions first, then defined ones.
    FuncIdx,
    TableIdx,
    MemIdx,
    GlobalIdx,
    /// An index into a function's locals: parameters first, then declared locals.
    LocalIdx,
    /// A relative label depth; zero refers to the innermost enclosing block.
    LabelIdx,
}

#[derive(Debug, PartialEq, Eq, Clone, Copy, Hash)]
pub enum ExternKind {
    Func,
    Table,
    Memory,
    Global,
}

impl std::fmt::Display for ExternKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ExternKind::Func => "function",
            ExternKind::Table => "table",
            ExternKind::Memory => "memory",
            ExternKind::Global => "global",
        })
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Import {
    pub(crate) r#mod: Name,
    pub(crate) nm: Name,
    pub(crate) desc: ImportDesc,
}

impl Import {
    pub fn new(module: Name, name: Name, desc: ImportDesc) -> Self {
        Self {
            r#mod: module,
            nm: name,
            desc,
        }
    }

    pub fn module(&self) -> &str {
        &self.r#mod.0
    }

    pub fn name(&self) -> &str {
        &self.nm.0
    }

    pub fn desc(&self) -> &ImportDesc {
        &self.desc
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ImportDesc {
    Func(TypeIdx),
    Table(TableType),
    Mem(MemType),
    Global(GlobalType),
}

impl ImportDesc {
    pub fn kind(&self) -> ExternKind {
        match self {
            ImportDesc::Func(_) => ExternKind::Func,
            ImportDesc::Table(_) => ExternKind::Table,
            ImportDesc::Mem(_) => ExternKind::Memory,
            ImportDesc::Global(_) => ExternKind::Global,
        }
    }
}

#[derive(Debug, PartialEq, Clone)]
pub struct Export {
    pub(crate) nm: Name,
    pub(crate) desc: ExportDesc,
}

impl Export {
    pub fn new(name: impl Into<String>, desc: ExportDesc) -> Self {
        Self {
            nm: Name(name.into()),
            desc,
        }
    }

    pub fn name(&self) -> &str {
        &self.nm.0
    }

    pub fn desc(&self) -> &ExportDesc {
        &self.desc
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum ExportDesc {
    Func(FuncIdx),
    Table(TableIdx),
    Mem(MemIdx),
    Global(GlobalIdx),
}

impl ExportDesc {
    pub fn kind(&self) -> ExternKind {
        match self {
            ExportDesc::Func(_) => ExternKind::Func,
            ExportDesc::Table(_) => ExternKind::Table,
            ExportDesc::Mem(_) => ExternKind::Memory,
            ExportDesc::Global(_) => ExternKind::Global,
        }
    }
}

/// An active element segment: function indices written into a table at `offset`.
#[derive(Debug, PartialEq, Clone)]
pub struct Elem {
    pub table: TableIdx,
    pub offset: Expr,
    pub init: Box<[FuncIdx]>,
}

/// An active data segment: bytes copied into a memory at `offset`.
#[derive(Debug, PartialEq, Clone)]
pub struct Data {
    pub memory: MemIdx,
    pub offset: Expr,
    pub init: ByteVec,
}

/// A run of `count` locals sharing one type, as declared in a code entry.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Local(pub u32, pub ValType);

/// A defined function: the function section's type index joined with the code
/// section's local declarations and body.
#[derive(Debug, PartialEq, Clone)]
pub struct Func {
    pub type_idx: TypeIdx,
    pub locals: Box<[Local]>,
    pub body: Expr,
}

impl Func {
    pub fn local_count(&self) -> usize {
        self.locals.iter().map(|Local(count, _)| *count as usize).sum()
    }

    /// Declared locals, one entry per local.
    pub fn expanded_locals(&self) -> impl Iterator<Item = ValType> + '_ {
        self.locals
            .iter()
            .flat_map(|Local(count, val_type)| std::iter::repeat(*val_type).take(*count as usize))
    }
}

#[derive(Debug, PartialEq, Eq, Clone)]
pub struct CustomSection {
    pub name: String,
    pub bytes: Box<[u8]>,
}

#[derive(Debug, PartialEq, Clone, Default)]
pub struct Module {
    pub(crate) custom_sections: Vec<CustomSection>,
    pub(crate) types: Box<[FuncType]>,
    pub(crate) imports: Box<[Import]>,
    pub(crate) funcs: Box<[Func]>,
    pub(crate) tables: Box<[TableType]>,
    pub(crate) memories: Box<[MemType]>,
    pub(crate) globals: Box<[Global]>,
    pub(crate) exports: Box<[Export]>,
    pub(crate) start: Option<FuncIdx>,
    pub(crate) elems: Box<[Elem]>,
    pub(crate) datas: Box<[Data]>,
}

/// Counts of imported entities per index space.
#[derive(Debug, Default, PartialEq, Eq, Clone, Copy)]
pub struct ImportCounts {
    pub funcs: usize,
    pub tables: usize,
    pub memories: usize,
    pub globals: usize,
}

#[derive(Default, Debug)]
pub struct ModuleBuilder {
    inner: Module,
}

impl ModuleBuilder {
    #[inline]
    pub fn new() -> Self {
        Default::default()
    }

    pub fn custom_section(mut self, name: impl Into<String>, bytes: Box<[u8]>) -> Self {
        self.inner.custom_sections.push(CustomSection {
            name: name.into(),
            bytes,
        });
        self
    }

    pub fn type_section(mut self, xs: Box<[FuncType]>) -> Self {
        self.inner.types = xs;
        self
    }

    pub fn import_section(mut self, xs: Box<[Import]>) -> Self {
        self.inner.imports = xs;
        self
    }

    /// Defined functions. The binary splits these across the function and code
    /// sections; the decoder joins them before building.
    pub fn funcs(mut self, xs: Box<[Func]>) -> Self {
        self.inner.funcs = xs;
        self
    }

    pub fn table_section(mut self, xs: Box<[TableType]>) -> Self {
        self.inner.tables = xs;
        self
    }

    pub fn memory_section(mut self, xs: Box<[MemType]>) -> Self {
        self.inner.memories = xs;
        self
    }

    pub fn global_section(mut self, xs: Box<[Global]>) -> Self {
        self.inner.globals = xs;
        self
    }

    pub fn export_section(mut self, xs: Box<[Export]>) -> Self {
        self.inner.exports = xs;
        self
    }

    pub fn start_section(mut self, xs: FuncIdx) -> Self {
        self.inner.start = Some(xs);
        self
    }

    pub fn element_section(mut self, xs: Box<[Elem]>) -> Self {
        self.inner.elems = xs;
        self
    }

    pub fn data_section(mut self, xs: Box<[Data]>) -> Self {
        self.inner.datas = xs;
        self
    }

    pub fn build(self) -> Module {
        self.inner
    }
}

impl Module {
    pub fn custom_sections(&self) -> impl Iterator<Item = (&str, &[u8])> {
        self.custom_sections
            .iter()
            .map(|xs| (xs.name.as_str(), &*xs.bytes))
    }

    pub fn types(&self) -> &[FuncType] {
        &self.types
    }

    pub fn imports(&self) -> &[Import] {
        &self.imports
    }

    pub fn funcs(&self) -> &[Func] {
        &self.funcs
    }

    pub fn tables(&self) -> &[TableType] {
        &self.tables
    }

    pub fn memories(&self) -> &[MemType] {
        &self.memories
    }

    pub fn globals(&self) -> &[Global] {
        &self.globals
    }

    pub fn exports(&self) -> &[Export] {
        &self.exports
    }

    pub fn start(&self) -> Option<FuncIdx> {
        self.start
    }

    pub fn elems(&self) -> &[Elem] {
        &self.elems
    }

    pub fn datas(&self) -> &[Data] {
        &self.datas
    }

    pub fn import_counts(&self) -> ImportCounts {
        self.imports
            .iter()
            .fold(ImportCounts::default(), |mut counts, imp| {
                match imp.desc {
                    ImportDesc::Func(_) => counts.funcs += 1,
                    ImportDesc::Table(_) => counts.tables += 1,
                    ImportDesc::Mem(_) => counts.memories += 1,
                    ImportDesc::Global(_) => counts.globals += 1,
                }
                counts
            })
    }

    /// Type indices for the whole function index space, imports first.
    pub fn func_type_indices(&self) -> impl Iterator<Item = TypeIdx> + '_ {
        self.imports
            .iter()
            .filter_map(|imp| match imp.desc {
                ImportDesc::Func(type_idx) => Some(type_idx),
                _ => None,
            })
            .chain(self.funcs.iter().map(|func| func.type_idx))
    }

    pub fn global_types(&self) -> impl Iterator<Item = GlobalType> + '_ {
        self.imports
            .iter()
            .filter_map(|imp| match imp.desc {
                ImportDesc::Global(global_type) => Some(global_type),
                _ => None,
            })
            .chain(self.globals.iter().map(|Global(global_type, _)| *global_type))
    }

    pub fn table_types(&self) -> impl Iterator<Item = TableType> + '_ {
        self.imports
            .iter()
            .filter_map(|imp| match imp.desc {
                ImportDesc::Table(table_type) => Some(table_type),
                _ => None,
            })
            .chain(self.tables.iter().copied())
    }

    pub fn memory_types(&self) -> impl Iterator<Item = MemType> + '_ {
        self.imports
            .iter()
            .filter_map(|imp| match imp.desc {
                ImportDesc::Mem(mem_type) => Some(mem_type),
                _ => None,
            })
            .chain(self.memories.iter().copied())
    }
}
