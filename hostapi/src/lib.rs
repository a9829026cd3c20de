//! `wasi-hostapi` — host-side types for a WASI preview1 style sandbox ABI.
//!
//! This crate holds everything the guest ABI surface needs that isn't
//! Wasmtime glue: the guest errno table and its translators, the per-instance
//! descriptor table, the capability policy (which paths/endpoints a guest may
//! touch), and the clock service. None of these types know about Wasmtime —
//! the `sandbox` crate wires them to a `Linker<InstanceData>`.

pub mod clock;
pub mod config;
pub mod error;
pub mod fd_table;
pub mod policy;

pub use clock::ClockState;
pub use config::{InitConfig, NetEndpoint, Protocol};
pub use error::GuestErrno;
pub use fd_table::FdTable;
pub use policy::CapabilityPolicy;
