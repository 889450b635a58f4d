mod config;
pub mod embedding;
mod error;
mod function;
mod global;
mod instance;
mod machine;
mod memory;
mod numerics;
mod stack;
mod store;
mod table;
mod value;

#[cfg(test)]
mod test_utils;

pub use config::Config;
pub use error::{Error, Trap};
pub use function::HostFunc;
pub use global::GlobalInst;
pub use instance::{instantiate, instantiate_with_imports, ExternalValue, ModuleInstance};
pub use memory::{MemInst, PAGE_SIZE};
pub use store::{FuncAddr, GlobalAddr, MemAddr, Store, TableAddr};
pub use table::TableInst;
pub use value::Value;

/// Run the function at `addr` with `args` and return its results.
///
/// The operand stack, labels and frames are built fresh for this call and
/// dropped when it returns. A trap aborts the call; memories and globals keep
/// whatever was written before it.
pub fn invoke(store: &mut Store, addr: FuncAddr, args: &[Value]) -> Result<Vec<Value>, Trap> {
    machine::invoke(store, addr, args)
}
