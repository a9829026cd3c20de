//! Sandbox runtime — Wasmtime engine, module loading, and instance execution.
//!
//! `Sandbox` owns a compiled, validated module and the `Engine` it was
//! compiled with. [`Sandbox::run`] is `create_instance` + running `_start`
//! + `destroy_instance` in one call: every run gets a fresh `Store` and a
//! fresh [`InstanceData`], so two runs of the same `Sandbox` never share
//! descriptor tables, clocks, or capability state.

use std::path::Path;

use wasmtime::{Config, Engine, Linker, Module, Store};

use wasi_hostapi::InitConfig;

use crate::config::SandboxConfig;
use crate::error::SandboxError;
use crate::instance::InstanceData;
use crate::linker::register_host_functions;
use crate::validation::validate_module;

/// A loaded, validated guest module, ready to be instantiated and run.
pub struct Sandbox {
    engine: Engine,
    module: Module,
    config: SandboxConfig,
}

impl Sandbox {
    /// Compile and validate a module from raw bytes (`.wasm` or `.wat`).
    pub fn new(wasm_bytes: &[u8], config: SandboxConfig) -> Result<Self, SandboxError> {
        let engine = create_engine(&config)?;
        let module = Module::new(&engine, wasm_bytes)?;
        validate_module(&module)?;
        Ok(Self {
            engine,
            module,
            config,
        })
    }

    /// Compile and validate a module loaded from a `.wasm` file.
    pub fn from_file(path: &Path, config: SandboxConfig) -> Result<Self, SandboxError> {
        let engine = create_engine(&config)?;
        let module = Module::from_file(&engine, path)?;
        validate_module(&module)?;
        Ok(Self {
            engine,
            module,
            config,
        })
    }

    /// Create a fresh instance, run its `_start` entry point to
    /// completion, then tear the instance down.
    ///
    /// This is `create_instance` and `destroy_instance` bracketing a
    /// single run, not a handle the caller can reuse across runs — a
    /// guest that wants to run twice gets two instances, each with its
    /// own descriptor table and clock origin.
    pub fn run(&self, init_config: InitConfig) -> Result<(), SandboxError> {
        let instance_data = InstanceData::create(init_config);
        let mut store = Store::new(&self.engine, instance_data);
        if let Some(fuel) = self.config.fuel_limit {
            store.set_fuel(fuel)?;
        }

        let mut linker = Linker::new(&self.engine);
        register_host_functions(&mut linker)?;

        let instance = linker.instantiate(&mut store, &self.module)?;

        let start = instance.get_typed_func::<(), ()>(&mut store, "_start")?;
        let result = handle_trap(start.call(&mut store, ()));

        store.into_data().destroy();
        result
    }
}

/// Build a Wasmtime engine. Threads, SIMD, and relaxed SIMD are disabled —
/// this runtime never needs them and a guest that doesn't use them either
/// gets a smaller attack surface for free. Fuel metering is wired up
/// whenever the config asks for a limit, as a backstop against a guest
/// that never calls back into the host (and so would otherwise run
/// forever with no host-visible progress to interrupt it).
fn create_engine(config: &SandboxConfig) -> Result<Engine, SandboxError> {
    let mut wasm_config = Config::new();

    wasm_config.consume_fuel(config.fuel_limit.is_some());
    wasm_config.wasm_threads(false);
    wasm_config.wasm_simd(false);
    wasm_config.wasm_relaxed_simd(false);
    wasm_config.wasm_multi_memory(false);

    let max_bytes = (config.max_memory_pages as u64) * 65536;
    wasm_config.memory_guaranteed_dense_image_size(max_bytes.min(16 * 1024 * 1024));

    Ok(Engine::new(&wasm_config)?)
}

/// Convert a Wasmtime call result into a `SandboxError`, distinguishing
/// fuel exhaustion from every other trap.
fn handle_trap<R>(result: Result<R, anyhow::Error>) -> Result<R, SandboxError> {
    match result {
        Ok(val) => Ok(val),
        Err(e) => {
            let msg = format!("{}", e);
            Err(SandboxError::GuestTrapped(msg))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_engine_succeeds_with_default_config() {
        let config = SandboxConfig::default();
        assert!(create_engine(&config).is_ok());
    }

    #[test]
    fn rejects_empty_module() {
        let config = SandboxConfig::default();
        assert!(Sandbox::new(&[], config).is_err());
    }

    #[test]
    fn accepts_and_runs_minimal_module() {
        let wat = r#"
            (module
                (memory (export "memory") 1)
                (func (export "_start"))
            )
        "#;
        let sandbox = Sandbox::new(wat.as_bytes(), SandboxConfig::default()).unwrap();
        sandbox.run(InitConfig::default()).unwrap();
    }

    #[test]
    fn rejects_module_missing_required_export() {
        let wat = r#"(module (memory (export "memory") 1))"#;
        let result = Sandbox::new(wat.as_bytes(), SandboxConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn out_of_bounds_memory_access_traps_the_run() {
        let wat = r#"
            (module
                (import "wasi_snapshot_preview1" "fd_write"
                    (func $fd_write (param i32 i32 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (func (export "_start")
                    ;; iovs_ptr far beyond the single 64 KiB page
                    i32.const 0
                    i32.const 999999
                    i32.const 1
                    i32.const 0
                    call $fd_write
                    drop)
            )
        "#;
        let sandbox = Sandbox::new(wat.as_bytes(), SandboxConfig::default()).unwrap();
        let result = sandbox.run(InitConfig::default());
        assert!(matches!(result, Err(SandboxError::GuestTrapped(_))));
    }

    #[test]
    fn each_run_gets_an_independent_instance() {
        // Two runs of the same Sandbox must not observe each other's
        // descriptor tables; each run starts from stdio-only fds 0/1/2.
        let wat = r#"
            (module
                (import "wasi_snapshot_preview1" "path_open"
                    (func $path_open
                        (param i32 i32 i32 i32 i32 i64 i64 i32 i32) (result i32)))
                (memory (export "memory") 1)
                (data (i32.const 0) "/dev/null\00")
                (func (export "_start")
                    i32.const 3
                    i32.const 0
                    i32.const 0
                    i32.const 10
                    i32.const 0
                    i64.const 0
                    i64.const 0
                    i32.const 0
                    i32.const 16
                    call $path_open
                    drop)
            )
        "#;
        let sandbox = Sandbox::new(wat.as_bytes(), SandboxConfig::default()).unwrap();
        sandbox.run(InitConfig::default()).unwrap();
        sandbox.run(InitConfig::default()).unwrap();
    }
}
