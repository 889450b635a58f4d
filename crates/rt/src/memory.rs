use std::ops::Range;

use corvid_ir::{Limits, MemType, MAX_MEMORY_PAGES};

use crate::Trap;

pub const PAGE_SIZE: usize = 0x10000;

/// A linear memory: little-endian bytes in 64 KiB pages.
pub struct MemInst {
    max: Option<u32>,
    data: Vec<u8>,
}

impl std::fmt::Debug for MemInst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemInst")
            .field("pages", &self.pages())
            .field("max", &self.max)
            .finish()
    }
}

impl MemInst {
    pub(crate) fn new(MemType(limits): MemType) -> Self {
        Self {
            max: limits.max(),
            data: vec![0; limits.min() as usize * PAGE_SIZE],
        }
    }

    /// The memory's current type: its size in pages and declared maximum.
    pub fn ty(&self) -> MemType {
        MemType(match self.max {
            Some(max) => Limits::Range(self.pages(), max),
            None => Limits::Min(self.pages()),
        })
    }

    pub fn pages(&self) -> u32 {
        (self.data.len() / PAGE_SIZE) as u32
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Grow by `delta` pages, returning the previous size, or `None` when the
    /// declared maximum or `cap` would be exceeded.
    pub(crate) fn grow(&mut self, delta: u32, cap: u32) -> Option<u32> {
        let old = self.pages();
        let new = old.checked_add(delta)?;
        let limit = self.max.unwrap_or(MAX_MEMORY_PAGES).min(cap);
        if new > limit {
            return None;
        }
        self.data.resize(new as usize * PAGE_SIZE, 0);
        Some(old)
    }

    fn range(&self, addr: u32, offset: u32, len: usize) -> Result<Range<usize>, Trap> {
        let start = addr as u64 + offset as u64;
        let end = start + len as u64;
        if end > self.data.len() as u64 {
            return Err(Trap::MemoryOutOfBounds);
        }
        Ok(start as usize..end as usize)
    }

    #[inline]
    pub(crate) fn load<const N: usize>(&self, addr: u32, offset: u32) -> Result<[u8; N], Trap> {
        let range = self.range(addr, offset, N)?;
        let mut buf = [0; N];
        buf.copy_from_slice(&self.data[range]);
        Ok(buf)
    }

    #[inline]
    pub(crate) fn store<const N: usize>(
        &mut self,
        addr: u32,
        offset: u32,
        bytes: [u8; N],
    ) -> Result<(), Trap> {
        let range = self.range(addr, offset, N)?;
        self.data[range].copy_from_slice(&bytes);
        Ok(())
    }

    /// Whether `len` bytes starting at `offset` lie inside the memory.
    pub(crate) fn fits(&self, offset: u32, len: usize) -> bool {
        self.range(offset, 0, len).is_ok()
    }

    pub fn read(&self, offset: u32, buf: &mut [u8]) -> Result<(), Trap> {
        let range = self.range(offset, 0, buf.len())?;
        buf.copy_from_slice(&self.data[range]);
        Ok(())
    }

    pub fn write(&mut self, offset: u32, bytes: &[u8]) -> Result<(), Trap> {
        let range = self.range(offset, 0, bytes.len())?;
        self.data[range].copy_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_bounds() -> anyhow::Result<()> {
        let mut mem = MemInst::new(MemType(Limits::Range(1, 2)));
        mem.store(PAGE_SIZE as u32 - 4, 0, 0xdead_beefu32.to_le_bytes())?;
        assert_eq!(
            u32::from_le_bytes(mem.load(PAGE_SIZE as u32 - 8, 4)?),
            0xdead_beef
        );
        assert!(matches!(
            mem.load::<4>(PAGE_SIZE as u32 - 3, 0),
            Err(Trap::MemoryOutOfBounds)
        ));
        // address + offset must not wrap around
        assert!(matches!(
            mem.load::<1>(u32::MAX, 1),
            Err(Trap::MemoryOutOfBounds)
        ));
        Ok(())
    }

    #[test]
    fn test_grow() {
        let mut mem = MemInst::new(MemType(Limits::Range(1, 3)));
        assert_eq!(mem.grow(1, MAX_MEMORY_PAGES), Some(1));
        assert_eq!(mem.grow(2, MAX_MEMORY_PAGES), None);
        assert_eq!(mem.grow(0, MAX_MEMORY_PAGES), Some(2));
        assert_eq!(mem.ty(), MemType(Limits::Range(2, 3)));

        let mut mem = MemInst::new(MemType(Limits::Min(0)));
        assert_eq!(mem.grow(5, 4), None);
        assert_eq!(mem.grow(4, 4), Some(0));
        assert_eq!(mem.data().len(), 4 * PAGE_SIZE);
    }
}
