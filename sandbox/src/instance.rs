//! Per-instance runtime state and lifecycle.
//!
//! `InstanceData` lives inside a Wasmtime `Store<InstanceData>` for exactly
//! one guest run. It owns the descriptor table, the capability policy, the
//! clock service, and the scratch fields (`temp_ret0`, argv/env) the guest
//! ABI surface reaches through `Caller::data()`/`data_mut()`. Two instances
//! never share one `InstanceData`: each lives in its own `Store`, so there
//! is nothing to lock.

use std::io;

use wasi_hostapi::{CapabilityPolicy, ClockState, FdTable, InitConfig};

/// Per-instance mutable state, the direct analog of the data model's
/// `Instance` record.
pub struct InstanceData {
    pub fd_table: FdTable,
    pub policy: CapabilityPolicy,
    pub clock: ClockState,
    /// Scratch register used by the legacy `getTempRet0`/`setTempRet0`
    /// emscripten ABI.
    pub temp_ret0: i32,
    pub argv: Vec<String>,
    pub env: Vec<String>,
    pub home_dir: String,
    pub log_path: Option<String>,
    /// The host fd the null device was opened on, lazily populated by the
    /// first successful `path_open`. Every `path_open` call for the
    /// lifetime of the instance reuses this fd rather than opening the
    /// device again, so repeat opens dedup to the same guest descriptor
    /// through `FdTable::allocate`'s host-fd equality check.
    null_device_fd: Option<i32>,
}

impl InstanceData {
    /// Build a fresh instance from its initialization config. This is
    /// `create_instance`: the descriptor table comes up with stdio
    /// pre-installed at guest fds 0/1/2, and the clock is anchored to the
    /// moment of creation.
    pub fn create(init_config: InitConfig) -> Self {
        let mut fd_table = FdTable::new();
        fd_table.initialize();
        Self {
            fd_table,
            policy: CapabilityPolicy::new(init_config.netlist),
            clock: ClockState::new(),
            temp_ret0: 0,
            argv: init_config.argv,
            env: init_config.env,
            home_dir: init_config.home_dir,
            log_path: init_config.log_path,
            null_device_fd: None,
        }
    }

    /// Return the host fd backing the null device, opening it the first
    /// time this is called and caching it for the rest of the instance's
    /// life.
    pub fn null_device_fd(&mut self) -> io::Result<i32> {
        if let Some(fd) = self.null_device_fd {
            return Ok(fd);
        }
        let fd = crate::fdio::open_null_device()?;
        self.null_device_fd = Some(fd);
        Ok(fd)
    }

    /// Tear down an instance. Descriptors the guest opened during its run
    /// are the guest's responsibility and are not closed here; this only
    /// releases the instance's own bookkeeping (clock anchors, scratch
    /// state), matching the original's `destroy_instance` contract.
    pub fn destroy(self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use wasi_hostapi::{NetEndpoint, Protocol};

    #[test]
    fn create_installs_stdio() {
        let instance = InstanceData::create(InitConfig::default());
        assert_eq!(instance.fd_table.resolve(0).unwrap(), 0);
        assert_eq!(instance.fd_table.resolve(1).unwrap(), 1);
        assert_eq!(instance.fd_table.resolve(2).unwrap(), 2);
    }

    #[test]
    fn create_carries_netlist_into_policy() {
        let config = InitConfig::builder()
            .netlist_entry(NetEndpoint {
                protocol: Protocol::Tcp,
                addr_be: 0x0100007f,
                port: 9999,
            })
            .build();
        let instance = InstanceData::create(config);
        assert!(instance
            .policy
            .is_allowed_endpoint(Protocol::Tcp, 0x0100007f, 9999));
    }

    #[test]
    fn destroy_consumes_the_instance() {
        let instance = InstanceData::create(InitConfig::default());
        instance.destroy();
    }

    #[test]
    #[cfg(unix)]
    fn null_device_fd_is_cached_across_calls() {
        let mut instance = InstanceData::create(InitConfig::default());
        let first = instance.null_device_fd().unwrap();
        let second = instance.null_device_fd().unwrap();
        assert_eq!(first, second);
    }
}
