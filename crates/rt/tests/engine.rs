mod common;

use std::sync::{Arc, Mutex};

use common::*;
use corvid_codec::DecodeErrorKind;
use corvid_ir::{
    Export, ExportDesc, Expr, ExternKind, Func, FuncIdx, FuncType, Instr, LocalIdx, ModuleBuilder,
    TypeIdx, ValType, ValidationError,
};
use corvid_rt::embedding::*;
use corvid_rt::{Error, ExternalValue, FuncAddr, Trap, Value};

fn export_func(instance: &corvid_rt::ModuleInstance, field: &str) -> anyhow::Result<FuncAddr> {
    instance_export(instance, field)?
        .as_func()
        .ok_or_else(|| anyhow::anyhow!("{field} is not a function"))
}

#[test]
fn add_fixture_end_to_end() -> anyhow::Result<()> {
    init_logger();
    let module = module_decode(&add_module())?;

    let expected = ModuleBuilder::new()
        .type_section(Box::new([FuncType::new(
            [ValType::I32, ValType::I32],
            [ValType::I32],
        )]))
        .funcs(Box::new([Func {
            type_idx: TypeIdx(0),
            locals: Box::new([]),
            body: Expr(vec![
                Instr::LocalGet(LocalIdx(0)),
                Instr::LocalGet(LocalIdx(1)),
                Instr::I32Add,
            ]),
        }]))
        .export_section(Box::new([Export::new("add", ExportDesc::Func(FuncIdx(0)))]))
        .build();
    assert_eq!(module, expected);

    module_validate(&module)?;
    let (store, instance) = module_instantiate(store_init(), &module);
    let instance = instance?;
    assert_eq!(instance.func_addrs().len(), 1);
    assert_eq!(instance.exports().count(), 1);

    let add = export_func(&instance, "add")?;
    let (_, results) = func_invoke(store, add, &[Value::I32(10), Value::I32(5)]);
    assert_eq!(results?, vec![Value::I32(15)]);
    Ok(())
}

#[test]
fn i32_add_wraps_around() -> anyhow::Result<()> {
    let module = module_decode(&add_module())?;
    let (store, instance) = module_instantiate(store_init(), &module);
    let add = export_func(&*instance?, "add")?;

    let (_, results) = func_invoke(store, add, &[Value::I32(0x7fff_ffff), Value::I32(1)]);
    assert_eq!(results?, vec![Value::I32(-0x8000_0000)]);
    Ok(())
}

#[test]
fn independent_stores_agree() -> anyhow::Result<()> {
    init_logger();
    // acc = acc * 31 + n, counting n down to zero
    let body = [
        0x02, 0x40, 0x03, 0x40, 0x20, 0x00, 0x45, 0x0d, 0x01, 0x20, 0x01, 0x41, 0x1f, 0x6c, 0x20,
        0x00, 0x6a, 0x21, 0x01, 0x20, 0x00, 0x41, 0x01, 0x6b, 0x21, 0x00, 0x0c, 0x00, 0x0b, 0x0b,
        0x20, 0x01,
    ];
    let bytes = WasmBuilder::new()
        .section(TYPE, &[type_entry(&[I32], &[I32])])
        .section(FUNCTION, &[uleb(0)])
        .section(EXPORT, &[export("mix", KIND_FUNC, 0)])
        .section(CODE, &[code(&[(1, I32)], &body)])
        .build();
    let module = module_decode(&bytes)?;

    let expected = (1..=1000).rev().fold(0i32, |acc, n| acc.wrapping_mul(31).wrapping_add(n));

    let mut outcomes = Vec::new();
    for _ in 0..2 {
        let (store, instance) = module_instantiate(store_init(), &module);
        let mix = export_func(&*instance?, "mix")?;
        let (_, results) = func_invoke(store, mix, &[Value::I32(1000)]);
        outcomes.push(results?);
    }
    assert_eq!(outcomes[0], vec![Value::I32(expected)]);
    assert_eq!(outcomes[0], outcomes[1]);
    Ok(())
}

#[test]
fn wrong_arity_is_a_trap() -> anyhow::Result<()> {
    let module = module_decode(&add_module())?;
    let (store, instance) = module_instantiate(store_init(), &module);
    let add = export_func(&*instance?, "add")?;

    let (store, results) = func_invoke(store, add, &[Value::I32(1)]);
    let trap = match results {
        Err(trap) => trap,
        Ok(values) => anyhow::bail!("expected a trap, got {values:?}"),
    };
    assert!(matches!(
        trap,
        Trap::ArgumentCount {
            expected: 2,
            received: 1
        }
    ));
    assert!(matches!(Error::from(trap), Error::Trap(_)));

    // the store is still usable
    let (_, results) = func_invoke(store, add, &[Value::I32(2), Value::I32(3)]);
    assert_eq!(results?, vec![Value::I32(5)]);
    Ok(())
}

#[test]
fn trap_leaves_store_usable() -> anyhow::Result<()> {
    let bytes = WasmBuilder::new()
        .section(TYPE, &[type_entry(&[], &[I32])])
        .section(FUNCTION, &[uleb(0), uleb(0)])
        .section(
            EXPORT,
            &[export("boom", KIND_FUNC, 0), export("answer", KIND_FUNC, 1)],
        )
        .section(CODE, &[code(&[], &[0x00]), code(&[], &[0x41, 0x2a])])
        .build();
    let module = module_decode(&bytes)?;
    let (store, instance) = module_instantiate(store_init(), &module);
    let instance = instance?;

    let (store, results) = func_invoke(store, export_func(&instance, "boom")?, &[]);
    assert!(matches!(results, Err(Trap::Unreachable)));
    let (_, results) = func_invoke(store, export_func(&instance, "answer")?, &[]);
    assert_eq!(results?, vec![Value::I32(42)]);
    Ok(())
}

#[test]
fn duplicate_export_fails_validation() -> anyhow::Result<()> {
    let bytes = WasmBuilder::new()
        .section(TYPE, &[type_entry(&[], &[])])
        .section(FUNCTION, &[uleb(0)])
        .section(MEMORY, &[vec![0x00, 0x01]])
        .section(
            EXPORT,
            &[export("f", KIND_FUNC, 0), export("f", KIND_MEMORY, 0)],
        )
        .section(CODE, &[code(&[], &[])])
        .build();
    let module = module_decode(&bytes)?;

    assert!(matches!(
        module_validate(&module),
        Err(ValidationError::DuplicateExport(name)) if name == "f"
    ));

    let (store, instance) = module_instantiate(store_init(), &module);
    assert!(matches!(instance, Err(Error::Validation(_))));

    // nothing was allocated by the rejected module
    let (_, instance) = module_instantiate(store, &module_decode(&add_module())?);
    assert_eq!(instance?.func_addrs()[0].index(), 0);
    Ok(())
}

#[test]
fn leb128_length_is_bounded() -> anyhow::Result<()> {
    let with_type_index = |index: Vec<u8>| {
        let mut function = uleb(1);
        function.extend(index);
        WasmBuilder::new()
            .section(TYPE, &[type_entry(&[], &[])])
            .raw_section(FUNCTION, function)
            .section(CODE, &[code(&[], &[])])
            .build()
    };

    // five bytes is the longest u32 encoding
    let module = module_decode(&with_type_index(vec![0x80, 0x80, 0x80, 0x80, 0x00]))?;
    assert_eq!(module.funcs()[0].type_idx, TypeIdx(0));

    let err = module_decode(&with_type_index(vec![0x80, 0x80, 0x80, 0x80, 0x80, 0x00]))
        .err()
        .ok_or_else(|| anyhow::anyhow!("six-byte LEB128 decoded"))?;
    assert_eq!(err.kind(), &DecodeErrorKind::IntegerTooLong);
    Ok(())
}

#[test]
fn host_function_import() -> anyhow::Result<()> {
    init_logger();
    // (import "env" "log" (func (param i32)))
    // (func (export "run") (param i32) local.get 0 call 0 local.get 0 i32.const 1 i32.add call 0)
    let bytes = WasmBuilder::new()
        .section(TYPE, &[type_entry(&[I32], &[])])
        .section(IMPORT, &[import("env", "log", &[KIND_FUNC, 0x00])])
        .section(FUNCTION, &[uleb(0)])
        .section(EXPORT, &[export("run", KIND_FUNC, 1)])
        .section(
            CODE,
            &[code(
                &[],
                &[0x20, 0x00, 0x10, 0x00, 0x20, 0x00, 0x41, 0x01, 0x6a, 0x10, 0x00],
            )],
        )
        .build();
    let module = module_decode(&bytes)?;
    assert_eq!(module_imports(&module), vec![("env", "log", ExternKind::Func)]);

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    let (store, log) = func_alloc(
        store_init(),
        FuncType::new([ValType::I32], []),
        move |args, _| {
            let value = args[0]
                .as_i32()
                .ok_or_else(|| anyhow::anyhow!("expected an i32"))?;
            sink.lock()
                .map_err(|_| anyhow::anyhow!("poisoned"))?
                .push(value);
            Ok(())
        },
    );

    let (store, instance) =
        module_instantiate_with_imports(store, &module, &[ExternalValue::Func(log)]);
    let run = export_func(&*instance?, "run")?;
    let (_, results) = func_invoke(store, run, &[Value::I32(41)]);
    assert!(results?.is_empty());
    assert_eq!(*seen.lock().map_err(|_| anyhow::anyhow!("poisoned"))?, vec![41, 42]);
    Ok(())
}

#[test]
fn memory_and_globals() -> anyhow::Result<()> {
    let mut data = uleb(0);
    data.extend(i32_const_expr(16));
    data.extend(name("hi"));

    let mut global = vec![I64, 0x01];
    global.extend([0x42]);
    global.extend(sleb(-7));
    global.push(0x0b);

    let bytes = WasmBuilder::new()
        .section(TYPE, &[type_entry(&[I32], &[I32])])
        .section(FUNCTION, &[uleb(0)])
        .section(MEMORY, &[vec![0x00, 0x01]])
        .section(GLOBAL, &[global])
        .section(
            EXPORT,
            &[
                export("mem", KIND_MEMORY, 0),
                export("g", KIND_GLOBAL, 0),
                export("get", KIND_FUNC, 0),
            ],
        )
        .section(CODE, &[code(&[], &[0x20, 0x00, 0x2d, 0x00, 0x00])])
        .section(DATA, &[data])
        .build();
    let module = module_decode(&bytes)?;
    let (mut store, instance) = module_instantiate(store_init(), &module);
    let instance = instance?;

    let ExternalValue::Memory(mem) = instance_export(&instance, "mem")? else {
        anyhow::bail!("mem is not a memory");
    };
    let ExternalValue::Global(g) = instance_export(&instance, "g")? else {
        anyhow::bail!("g is not a global");
    };
    assert_eq!(global_read(&store, g), Some(Value::I64(-7)));
    assert_eq!(mem_read(&store, mem, 16, 2)?, b"hi");
    assert!(matches!(
        mem_read(&store, mem, 65535, 2),
        Err(Trap::MemoryOutOfBounds)
    ));

    mem_write(&mut store, mem, 0, &[7])?;
    let get = export_func(&instance, "get")?;
    let (store, results) = func_invoke(store, get, &[Value::I32(0)]);
    assert_eq!(results?, vec![Value::I32(7)]);
    let (_, results) = func_invoke(store, get, &[Value::I32(17)]);
    assert_eq!(results?, vec![Value::I32(i32::from(b'i'))]);
    Ok(())
}

#[test]
fn custom_sections_are_inert() -> anyhow::Result<()> {
    let bytes = WasmBuilder::new()
        .custom_section("producers", &[1, 2, 3])
        .section(TYPE, &[type_entry(&[I32, I32], &[I32])])
        .section(FUNCTION, &[uleb(0)])
        .custom_section("name", &[])
        .section(EXPORT, &[export("add", KIND_FUNC, 0)])
        .section(CODE, &[code(&[], &[0x20, 0x00, 0x20, 0x01, 0x6a])])
        .build();
    let module = module_decode(&bytes)?;
    assert_eq!(module.custom_sections().count(), 2);

    let (store, instance) = module_instantiate(store_init(), &module);
    let add = export_func(&*instance?, "add")?;
    let (_, results) = func_invoke(store, add, &[Value::I32(2), Value::I32(2)]);
    assert_eq!(results?, vec![Value::I32(4)]);
    Ok(())
}

#[test]
fn deepest_decodable_nesting_validates_and_runs() -> anyhow::Result<()> {
    let nested = |depth: usize| {
        let mut body = Vec::new();
        for _ in 0..depth {
            body.extend_from_slice(&[0x02, 0x40]);
        }
        body.resize(body.len() + depth, 0x0b);
        WasmBuilder::new()
            .section(TYPE, &[type_entry(&[], &[])])
            .section(FUNCTION, &[uleb(0)])
            .section(EXPORT, &[export("deep", KIND_FUNC, 0)])
            .section(CODE, &[code(&[], &body)])
            .build()
    };

    let module = module_decode(&nested(corvid_codec::MAX_NESTING_DEPTH))?;
    module_validate(&module)?;
    let (store, instance) = module_instantiate(store_init(), &module);
    let deep = export_func(&*instance?, "deep")?;
    let (_, results) = func_invoke(store, deep, &[]);
    assert!(results?.is_empty());

    let err = module_decode(&nested(corvid_codec::MAX_NESTING_DEPTH + 1))
        .err()
        .ok_or_else(|| anyhow::anyhow!("nesting past the limit decoded"))?;
    assert!(matches!(err.kind(), DecodeErrorKind::NestingTooDeep(_)));
    Ok(())
}
