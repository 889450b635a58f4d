/// Limits applied to a [`Store`](crate::Store) and every invocation against it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Config {
    pub max_call_depth: usize,
    pub fuel: Option<u64>,
    pub max_memory_pages: u32,
    pub max_table_elements: u32,
}

impl Config {
    #[must_use]
    pub fn with_max_call_depth(mut self, depth: usize) -> Self {
        self.max_call_depth = depth;
        self
    }

    /// Instructions each invocation may execute; `None` is unlimited.
    #[must_use]
    pub fn with_fuel(mut self, fuel: Option<u64>) -> Self {
        self.fuel = fuel;
        self
    }

    #[must_use]
    pub fn with_max_memory_pages(mut self, pages: u32) -> Self {
        self.max_memory_pages = pages;
        self
    }

    #[must_use]
    pub fn with_max_table_elements(mut self, elements: u32) -> Self {
        self.max_table_elements = elements;
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_call_depth: 512,
            fuel: None,
            max_memory_pages: corvid_ir::MAX_MEMORY_PAGES,
            max_table_elements: 10_000_000,
        }
    }
}
