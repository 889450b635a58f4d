#![allow(dead_code)]

use std::sync::Arc;

use corvid_ir::{
    Export, ExportDesc, Expr, Func, FuncIdx, FuncType, Instr, Local, Module, ModuleBuilder,
    TypeIdx, ValType,
};

use crate::{instantiate, Config, ModuleInstance, Store, Trap, Value};

pub(crate) struct TestState {
    pub(crate) store: Store,
    pub(crate) instance: Arc<ModuleInstance>,
}

impl TestState {
    pub(crate) fn new(module: &Module) -> anyhow::Result<Self> {
        Self::with_config(module, Config::default())
    }

    pub(crate) fn with_config(module: &Module, config: Config) -> anyhow::Result<Self> {
        let mut store = Store::with_config(config);
        let instance = instantiate(&mut store, module)
            .map_err(|e| anyhow::anyhow!("could not instantiate module; err={e:?}"))?;
        Ok(Self { store, instance })
    }

    pub(crate) fn call(
        &mut self,
        field: &str,
        args: &[Value],
    ) -> anyhow::Result<Result<Vec<Value>, Trap>> {
        let addr = self
            .instance
            .export(field)
            .and_then(|external| external.as_func())
            .ok_or_else(|| anyhow::anyhow!(r#"no function exported as "{field}""#))?;
        Ok(crate::invoke(&mut self.store, addr, args))
    }
}

pub(crate) fn assert_return(
    state: &mut TestState,
    field: &str,
    args: &[Value],
    expected: &[Value],
) -> anyhow::Result<()> {
    let returned = state
        .call(field, args)?
        .map_err(|e| anyhow::anyhow!(r#"failed to call "{field}"; error="{e}" ({e:?})"#))?;

    if returned != expected {
        anyhow::bail!(r#"result mismatch for "{field}"; returned={returned:?}; expected={expected:?}"#);
    }
    Ok(())
}

pub(crate) fn assert_trap(
    state: &mut TestState,
    field: &str,
    args: &[Value],
    text: &str,
) -> anyhow::Result<()> {
    match state.call(field, args)? {
        Ok(result) => {
            anyhow::bail!(r#"expected "{field}" to trap with "{text}" but got {result:?}"#)
        }
        Err(e) => {
            if !e.to_string().contains(text) {
                anyhow::bail!(r#"expected "{field}" to trap with "{text}" but got "{e}""#)
            }
        }
    }
    Ok(())
}

/// One exported function: its export name, signature, declared locals and body.
pub(crate) struct TestFunc {
    pub(crate) name: &'static str,
    pub(crate) ty: FuncType,
    pub(crate) locals: Vec<ValType>,
    pub(crate) body: Vec<Instr>,
}

impl TestFunc {
    pub(crate) fn new<const P: usize, const R: usize>(
        name: &'static str,
        params: [ValType; P],
        results: [ValType; R],
        body: Vec<Instr>,
    ) -> Self {
        Self {
            name,
            ty: FuncType::new(params, results),
            locals: Vec::new(),
            body,
        }
    }

    pub(crate) fn locals(mut self, locals: impl IntoIterator<Item = ValType>) -> Self {
        self.locals = locals.into_iter().collect();
        self
    }
}

/// Function `i` gets type `i` and is exported under its name. Further
/// sections can be added to the returned builder; setting the export section
/// again replaces these exports.
pub(crate) fn funcs_module(funcs: Vec<TestFunc>) -> ModuleBuilder {
    let types = funcs.iter().map(|func| func.ty.clone()).collect();
    let exports = funcs
        .iter()
        .enumerate()
        .map(|(idx, func)| Export::new(func.name, ExportDesc::Func(FuncIdx(idx as u32))))
        .collect();
    let funcs = funcs
        .into_iter()
        .enumerate()
        .map(|(idx, func)| Func {
            type_idx: TypeIdx(idx as u32),
            locals: func.locals.into_iter().map(|ty| Local(1, ty)).collect(),
            body: Expr(func.body),
        })
        .collect();

    ModuleBuilder::new()
        .type_section(types)
        .funcs(funcs)
        .export_section(exports)
}
