use std::sync::Arc;

use corvid_ir::{FuncType, GlobalType, MemType, TableType, MAX_MEMORY_PAGES};

use crate::function::FuncInst;
use crate::{Config, Error, GlobalInst, MemInst, TableInst, Value};

macro_rules! address_newtype {
    ($($(#[$meta:meta])* $name:ident),* $(,)?) => {
        $(
            $(#[$meta])*
            #[derive(Debug, PartialEq, Eq, PartialOrd, Ord, Clone, Copy, Hash)]
            pub struct $name(pub(crate) usize);

            impl $name {
                pub fn index(&self) -> usize {
                    self.0
                }
            }

            impl std::fmt::Display for $name {
                fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                    write!(f, "{}", self.0)
                }
            }
        )*
    };
}

address_newtype!(
    /// Position of a function instance in its [`Store`].
    FuncAddr,
    TableAddr,
    MemAddr,
    GlobalAddr,
);

/// Lengths of the store's instance vectors, used to undo a failed instantiation.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Marks {
    funcs: usize,
    tables: usize,
    memories: usize,
    globals: usize,
}

/// Every function, table, memory and global allocated so far. Addresses are
/// positions in these vectors and stay valid for the life of the store.
#[derive(Debug, Default)]
pub struct Store {
    pub(crate) funcs: Vec<FuncInst>,
    pub(crate) tables: Vec<TableInst>,
    pub(crate) memories: Vec<MemInst>,
    pub(crate) globals: Vec<GlobalInst>,
    pub(crate) config: Config,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn alloc_host_func<F>(&mut self, ty: FuncType, func: F) -> FuncAddr
    where
        F: Fn(&[Value], &mut [Value]) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.funcs.push(FuncInst::Host {
            ty,
            func: Arc::new(func),
        });
        let addr = FuncAddr(self.funcs.len() - 1);
        log::trace!("allocated host function {addr}");
        addr
    }

    pub fn alloc_table(&mut self, ty: TableType) -> Result<TableAddr, Error> {
        let limit = self.config.max_table_elements;
        if ty.1.min() > limit {
            return Err(Error::TableLimit {
                elements: ty.1.min(),
                limit,
            });
        }
        self.tables.push(TableInst::new(ty));
        Ok(TableAddr(self.tables.len() - 1))
    }

    pub fn alloc_memory(&mut self, ty: MemType) -> Result<MemAddr, Error> {
        let limit = self.config.max_memory_pages.min(MAX_MEMORY_PAGES);
        if ty.0.min() > limit {
            return Err(Error::MemoryLimit {
                pages: ty.0.min(),
                limit,
            });
        }
        self.memories.push(MemInst::new(ty));
        Ok(MemAddr(self.memories.len() - 1))
    }

    pub fn alloc_global(&mut self, ty: GlobalType, value: Value) -> Result<GlobalAddr, Error> {
        self.globals.push(GlobalInst::new(ty, value)?);
        Ok(GlobalAddr(self.globals.len() - 1))
    }

    pub(crate) fn push_func(&mut self, func: FuncInst) -> FuncAddr {
        self.funcs.push(func);
        FuncAddr(self.funcs.len() - 1)
    }

    pub fn func_type(&self, addr: FuncAddr) -> Option<&FuncType> {
        self.funcs.get(addr.0).map(FuncInst::ty)
    }

    pub fn table(&self, addr: TableAddr) -> Option<&TableInst> {
        self.tables.get(addr.0)
    }

    pub fn memory(&self, addr: MemAddr) -> Option<&MemInst> {
        self.memories.get(addr.0)
    }

    pub fn memory_mut(&mut self, addr: MemAddr) -> Option<&mut MemInst> {
        self.memories.get_mut(addr.0)
    }

    pub fn global(&self, addr: GlobalAddr) -> Option<&GlobalInst> {
        self.globals.get(addr.0)
    }

    pub(crate) fn marks(&self) -> Marks {
        Marks {
            funcs: self.funcs.len(),
            tables: self.tables.len(),
            memories: self.memories.len(),
            globals: self.globals.len(),
        }
    }

    pub(crate) fn rollback(&mut self, marks: Marks) {
        self.funcs.truncate(marks.funcs);
        self.tables.truncate(marks.tables);
        self.memories.truncate(marks.memories);
        self.globals.truncate(marks.globals);
    }
}
