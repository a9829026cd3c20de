//! Per-`Sandbox` (not per-instance) configuration: compiled-module-level
//! resource limits that apply to every instance run from it.
//!
//! This is distinct from [`wasi_hostapi::InitConfig`], which configures a
//! single instance's environment (argv, env, netlist). `SandboxConfig`
//! configures the Wasmtime engine the module is compiled and run under.

/// Configuration for a [`crate::runtime::Sandbox`].
#[derive(Debug, Clone)]
pub struct SandboxConfig {
    /// Maximum linear memory pages (1 page = 64 KiB) the engine will
    /// pre-size its dense memory image for.
    pub max_memory_pages: u32,

    /// Wasmtime fuel limit, consumed as the guest executes instructions.
    /// `None` disables fuel metering entirely — useful for guests that are
    /// expected to block on real I/O for a while.
    pub fuel_limit: Option<u64>,

    /// Whether the embedder wants guest-originated log output surfaced
    /// (via `tracing`) during a run.
    pub enable_guest_logs: bool,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            max_memory_pages: 256, // 16 MiB
            fuel_limit: Some(100_000_000),
            enable_guest_logs: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_fuel_metering_enabled() {
        let config = SandboxConfig::default();
        assert_eq!(config.max_memory_pages, 256);
        assert_eq!(config.fuel_limit, Some(100_000_000));
        assert!(!config.enable_guest_logs);
    }

    #[test]
    fn fuel_limit_can_be_disabled() {
        let config = SandboxConfig {
            fuel_limit: None,
            ..SandboxConfig::default()
        };
        assert!(config.fuel_limit.is_none());
    }
}
