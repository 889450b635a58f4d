mod defs;
mod typechecker;
mod validate;

pub use defs::*;
pub use typechecker::Val;
pub use validate::{validate, ValidationError, MAX_MEMORY_PAGES};
