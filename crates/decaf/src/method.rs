//! The method boundary: inputs, outputs, and the pipeline driver.
//!
//! Errors are caught here. A fatal per-method error is downgraded to a
//! `/* decompilation failed: ... */` body unless `fail_on_error` is set,
//! in which case it propagates and aborts the class. Inference warnings
//! always come back on the diagnostics list.

use serde::{Deserialize, Serialize};

use crate::{
    config::Config,
    decompile::Decompiler,
    descriptor::parse_method_descriptor,
    disasm::disassemble,
    error::{DecompResult, Warning},
    insn::{ConstPool, ExceptionEntry, Instruction, LocalVariableEntry},
    stringify::Printer,
    types::{Type, TypeSize, TypeStore, source_name},
    var::{Locals, VarId},
};

/// A pre-parsed method handed over by the class-file parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodInput {
    /// Internal name of the declaring class, e.g. `com/example/Main`.
    pub class_name: String,
    /// Method name; `<init>` and `<clinit>` render specially.
    pub name: String,
    /// Method descriptor, e.g. `(I[J)V`.
    pub descriptor: String,
    pub is_static: bool,
    pub instructions: Vec<Instruction>,
    #[serde(default)]
    pub exception_table: Vec<ExceptionEntry>,
    #[serde(default)]
    pub local_variable_table: Option<Vec<LocalVariableEntry>>,
    #[serde(default)]
    pub const_pool: ConstPool,
}

/// Decompiled method plus its diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodOutput {
    /// Rendered method, signature and body.
    pub source: String,
    pub diagnostics: Vec<Warning>,
}

/// Decompiles one method to source.
pub fn decompile_method(input: &MethodInput, config: &Config) -> DecompResult<MethodOutput> {
    match decompile_inner(input, config) {
        Ok(output) => Ok(output),
        Err(error) if !config.fail_on_error => Ok(MethodOutput {
            source: format!("/* decompilation failed: {error} */\n"),
            diagnostics: Vec::new(),
        }),
        Err(error) => Err(error),
    }
}

fn lvt_name(table: Option<&[LocalVariableEntry]>, slot: u16) -> Option<String> {
    table?.iter().find(|entry| entry.slot == slot).map(|entry| entry.name.clone())
}

fn decompile_inner(input: &MethodInput, config: &Config) -> DecompResult<MethodOutput> {
    let mut store = TypeStore::new();
    let class_id = store.intern_class(&input.class_name)?;
    let signature = parse_method_descriptor(&mut store, &input.descriptor)?;
    let lvt = input.local_variable_table.as_deref();

    let mut locals = Locals::new();
    let mut param_vars: Vec<VarId> = Vec::with_capacity(signature.params.len());
    let mut slot: u16 = 0;
    if !input.is_static {
        locals.define(0, Type::Class(class_id), Some("this".to_owned()), true, true);
        slot = 1;
    }
    for &param in &signature.params {
        let name = lvt_name(lvt, slot);
        param_vars.push(locals.define(slot, param, name, true, true));
        slot += if param.size() == TypeSize::Eight { 2 } else { 1 };
    }
    if let Some(table) = lvt {
        for entry in table {
            if locals.at_slot(entry.slot).is_some() {
                continue;
            }
            let ty = crate::descriptor::parse_type(&mut store, &entry.descriptor)?;
            locals.define(entry.slot, ty, Some(entry.name.clone()), true, false);
        }
    }

    let disasm = disassemble(&input.instructions, &input.exception_table, &mut store)?;
    let mut decompiler = Decompiler::new(
        &input.instructions,
        &input.const_pool,
        disasm,
        store,
        locals,
        signature.ret,
    );
    decompiler.run()?;
    decompiler.settle_types();
    decompiler.locals.assign_names(&decompiler.store);

    let mut printer = Printer::new(
        &decompiler.ops,
        &decompiler.scopes,
        &decompiler.locals,
        &decompiler.store,
        config,
    );
    let body = printer.method_body(decompiler.method_scope);

    let header = render_header(input, &decompiler, &param_vars, signature.ret, class_id);
    let source = format!("{header}{body}\n");
    Ok(MethodOutput {
        source,
        diagnostics: decompiler.warnings.clone(),
    })
}

fn render_header(
    input: &MethodInput,
    decompiler: &Decompiler<'_>,
    param_vars: &[VarId],
    ret: Type,
    class_id: crate::types::ClassId,
) -> String {
    let store = &decompiler.store;
    let params: Vec<String> = param_vars
        .iter()
        .map(|&var| {
            let variable = decompiler.locals.get(var);
            format!(
                "{} {}",
                source_name(variable.ty, store),
                variable.name.as_deref().unwrap_or("arg")
            )
        })
        .collect();
    let params = params.join(", ");
    let modifier = if input.is_static { "static " } else { "" };

    match input.name.as_str() {
        "<clinit>" => "static ".to_owned(),
        "<init>" => {
            let class = store.class(class_id);
            format!("{}({params}) ", class.full_simple_name)
        }
        name => format!("{modifier}{} {name}({params}) ", source_name(ret, store)),
    }
}
