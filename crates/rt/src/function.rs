use std::sync::Arc;

use corvid_ir::{Func, FuncType};

use crate::{ModuleInstance, Value};

/// A host-provided function. Arguments arrive in parameter order; `results`
/// is pre-filled with zero values of the declared result types.
pub type HostFunc = Arc<dyn Fn(&[Value], &mut [Value]) -> anyhow::Result<()> + Send + Sync>;

#[derive(Clone)]
pub(crate) enum FuncInst {
    Module {
        ty: FuncType,
        instance: Arc<ModuleInstance>,
        code: Func,
    },
    Host {
        ty: FuncType,
        func: HostFunc,
    },
}

impl std::fmt::Debug for FuncInst {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FuncInst::Module { ty, code, .. } => f
                .debug_struct("Module")
                .field("ty", ty)
                .field("locals", &code.local_count())
                .finish(),
            FuncInst::Host { ty, .. } => f.debug_struct("Host").field("ty", ty).finish(),
        }
    }
}

impl FuncInst {
    #[inline]
    pub(crate) fn ty(&self) -> &FuncType {
        match self {
            FuncInst::Module { ty, .. } | FuncInst::Host { ty, .. } => ty,
        }
    }
}
