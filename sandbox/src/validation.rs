//! Guest module validation — ABI compatibility checks.
//!
//! Checks a compiled module before it is ever instantiated:
//!
//! 1. A `memory` export is present.
//! 2. A `_start` function export is present, with no params and no
//!    results (the conventional WASI command-module entry point).
//! 3. Every import comes from `wasi_snapshot_preview1` (the ABI surface
//!    this runtime implements) or `env` (the legacy/emscripten
//!    compatibility stubs) — nothing else is wired up, so an import from
//!    any other module would otherwise fail at instantiation with a less
//!    legible error.

use wasmtime::{ExternType, Module, ValType};

use crate::error::SandboxError;

const ALLOWED_IMPORT_MODULES: &[&str] = &["wasi_snapshot_preview1", "env"];

/// Validate that a module meets this runtime's ABI requirements.
pub fn validate_module(module: &Module) -> Result<(), SandboxError> {
    validate_exports(module)?;
    validate_imports(module)?;
    Ok(())
}

fn validate_exports(module: &Module) -> Result<(), SandboxError> {
    let has_memory = module
        .exports()
        .any(|e| e.name() == "memory" && matches!(e.ty(), ExternType::Memory(_)));
    if !has_memory {
        return Err(SandboxError::ValidationError(
            "module must export 'memory'".into(),
        ));
    }

    let start = module
        .exports()
        .find(|e| e.name() == "_start")
        .ok_or_else(|| SandboxError::ValidationError("missing required export: _start".into()))?;

    let func_ty = match start.ty() {
        ExternType::Func(ft) => ft,
        _ => {
            return Err(SandboxError::ValidationError(
                "export '_start' must be a function".into(),
            ));
        }
    };

    if func_ty.params().count() != 0 || func_ty.results().count() != 0 {
        return Err(SandboxError::ValidationError(
            "export '_start' must take no params and return no results".into(),
        ));
    }

    Ok(())
}

fn validate_imports(module: &Module) -> Result<(), SandboxError> {
    for import in module.imports() {
        let module_name = import.module();
        if !ALLOWED_IMPORT_MODULES.contains(&module_name) {
            return Err(SandboxError::ValidationError(format!(
                "import from unsupported module '{}' (only {:?} are wired up): {}",
                module_name,
                ALLOWED_IMPORT_MODULES,
                import.name()
            )));
        }
        if !matches!(import.ty(), ExternType::Func(_)) {
            return Err(SandboxError::ValidationError(format!(
                "non-function import not allowed: {}::{}",
                module_name,
                import.name()
            )));
        }
    }
    Ok(())
}

fn is_i32(vt: &ValType) -> bool {
    matches!(vt, ValType::I32)
}
