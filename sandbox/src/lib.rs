//! `wasi-sandbox` — a Wasmtime-based host runtime implementing a WASI
//! preview1 style ABI for a sandboxed guest module.
//!
//! This crate loads and validates a compiled guest module, then runs it
//! inside Wasmtime with a guest-facing system-call surface registered
//! under `wasi_snapshot_preview1` (plus a small `env` compatibility shim
//! for emscripten-style legacy imports). It enforces:
//!
//! - **Capability confinement:** path access is restricted to the null
//!   device; network access is restricted to a fixed netlist.
//! - **Descriptor isolation:** guest file descriptors never alias host
//!   descriptors directly — every guest `fd` is resolved through a
//!   per-instance table.
//! - **Memory safety:** guest pointers are bounds-checked before every
//!   access; an out-of-bounds access traps the guest rather than
//!   corrupting host memory.
//! - **Resource bounds:** linear memory growth and (optionally)
//!   instruction count are capped per [`SandboxConfig`].
//!
//! Loading the guest module as a shared library and resolving its entry
//! points from outside Wasmtime, and parsing any textual netlist or CLI
//! configuration format, are both the embedder's responsibility, not this
//! crate's.
//!
//! The primary entry point is [`Sandbox::run`].

pub mod config;
pub mod error;
pub mod fdio;
pub mod instance;
pub mod linker;
pub mod memory;
pub mod runtime;
pub mod validation;

pub use config::SandboxConfig;
pub use error::SandboxError;
pub use instance::InstanceData;
pub use runtime::Sandbox;
