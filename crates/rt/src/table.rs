use corvid_ir::{Limits, RefType, TableType};

use crate::{FuncAddr, Trap};

/// A table of function references; empty slots are `None`.
#[derive(Debug)]
pub struct TableInst {
    max: Option<u32>,
    elements: Vec<Option<FuncAddr>>,
}

impl TableInst {
    pub(crate) fn new(TableType(_, limits): TableType) -> Self {
        Self {
            max: limits.max(),
            elements: vec![None; limits.min() as usize],
        }
    }

    pub fn ty(&self) -> TableType {
        let len = self.len() as u32;
        TableType(
            RefType::FuncRef,
            match self.max {
                Some(max) => Limits::Range(len, max),
                None => Limits::Min(len),
            },
        )
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn element(&self, idx: u32) -> Option<FuncAddr> {
        self.elements.get(idx as usize).copied().flatten()
    }

    /// Resolve a `call_indirect` operand.
    pub(crate) fn get(&self, idx: u32) -> Result<FuncAddr, Trap> {
        match self.elements.get(idx as usize) {
            None => Err(Trap::UndefinedElement),
            Some(None) => Err(Trap::UninitializedElement(idx)),
            Some(Some(addr)) => Ok(*addr),
        }
    }

    pub(crate) fn fits(&self, offset: u32, len: usize) -> bool {
        offset as usize + len <= self.elements.len()
    }

    pub(crate) fn init(&mut self, offset: u32, addrs: &[FuncAddr]) -> Result<(), Trap> {
        let start = offset as usize;
        let Some(slots) = self.elements.get_mut(start..start + addrs.len()) else {
            return Err(Trap::ElementSegmentOutOfBounds);
        };
        for (slot, addr) in slots.iter_mut().zip(addrs) {
            *slot = Some(*addr);
        }
        Ok(())
    }
}
