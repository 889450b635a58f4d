use corvid_ir::GlobalType;

use crate::{Error, Value};

#[derive(Debug, Clone)]
pub struct GlobalInst {
    ty: GlobalType,
    value: Value,
}

impl GlobalInst {
    pub(crate) fn new(ty: GlobalType, value: Value) -> Result<Self, Error> {
        if value.ty() != ty.0 {
            return Err(Error::GlobalTypeMismatch {
                expected: ty.0,
                received: value.ty(),
            });
        }
        Ok(Self { ty, value })
    }

    pub fn ty(&self) -> GlobalType {
        self.ty
    }

    pub fn value(&self) -> Value {
        self.value
    }

    // Validation has already checked mutability and type.
    pub(crate) fn set(&mut self, value: Value) {
        self.value = value;
    }
}
