//! Capability policy: what a guest is actually allowed to touch.
//!
//! Three independent checks live here. Path access is restricted to the
//! null device, regardless of what the guest asks to open. Network access is
//! restricted to the instance's netlist — the C reference never checked this
//! at all (`socket`/`sock_connect` are unconditional there); this runtime
//! enforces it, per the redesign flag this policy corrects. `proc_exit` is a
//! no-op unless the `exit-terminates-host` feature is enabled.

use crate::config::{NetEndpoint, Protocol};

#[cfg(unix)]
const NULL_DEVICE: &str = "/dev/null";
#[cfg(windows)]
const NULL_DEVICE: &str = "nul";

/// Fixed mode/flags used whenever the null device is opened, regardless of
/// what the guest requested: `O_CREAT`, owner read/write.
pub const NULL_DEVICE_OPEN_MODE: u32 = 0o600;

/// Capability policy for one instance.
#[derive(Debug, Clone)]
pub struct CapabilityPolicy {
    netlist: [Option<NetEndpoint>; 4],
}

impl CapabilityPolicy {
    pub fn new(netlist: [Option<NetEndpoint>; 4]) -> Self {
        Self { netlist }
    }

    /// True if `path` (as presented by the guest, NUL-terminated string
    /// already stripped) names the null device.
    pub fn is_allowed_path(&self, path: &str) -> bool {
        let allowed = path == NULL_DEVICE;
        if !allowed {
            tracing::warn!(path, "denied path access outside the null device");
        }
        allowed
    }

    /// True if `(protocol, addr_be, port)` appears in the instance's
    /// netlist.
    pub fn is_allowed_endpoint(&self, protocol: Protocol, addr_be: u32, port: u16) -> bool {
        let allowed = self.netlist.iter().flatten().any(|entry| {
            entry.protocol == protocol && entry.addr_be == addr_be && entry.port == port
        });
        if !allowed {
            tracing::warn!(?protocol, addr_be, port, "denied endpoint not in netlist");
        }
        allowed
    }

    /// Handle a guest `proc_exit(code)` call.
    ///
    /// By default this is a no-op: the guest's exit code is observed by the
    /// embedder through the instance's run result, not by tearing down the
    /// host process. Building with the `exit-terminates-host` feature makes
    /// this actually terminate the host process, matching the C reference's
    /// compile-time `WASM2C_WASI_EXIT_HOST_ON_MODULE_EXIT` option.
    pub fn handle_proc_exit(&self, _code: i32) {
        #[cfg(feature = "exit-terminates-host")]
        std::process::exit(_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy_with_one_endpoint() -> CapabilityPolicy {
        let mut netlist = [None; 4];
        netlist[0] = Some(NetEndpoint {
            protocol: Protocol::Tcp,
            addr_be: 0x0100007f, // 127.0.0.1 in network byte order
            port: 8080,
        });
        CapabilityPolicy::new(netlist)
    }

    #[test]
    fn null_device_path_is_allowed() {
        let policy = policy_with_one_endpoint();
        assert!(policy.is_allowed_path(NULL_DEVICE));
    }

    #[test]
    fn arbitrary_path_is_denied() {
        let policy = policy_with_one_endpoint();
        assert!(!policy.is_allowed_path("/etc/passwd"));
        assert!(!policy.is_allowed_path(""));
    }

    #[test]
    fn listed_endpoint_is_allowed() {
        let policy = policy_with_one_endpoint();
        assert!(policy.is_allowed_endpoint(Protocol::Tcp, 0x0100007f, 8080));
    }

    #[test]
    fn unlisted_endpoint_is_denied() {
        let policy = policy_with_one_endpoint();
        assert!(!policy.is_allowed_endpoint(Protocol::Tcp, 0x0100007f, 9090));
        assert!(!policy.is_allowed_endpoint(Protocol::Udp, 0x0100007f, 8080));
    }

    #[test]
    fn empty_netlist_denies_everything() {
        let policy = CapabilityPolicy::new([None; 4]);
        assert!(!policy.is_allowed_endpoint(Protocol::Tcp, 0, 0));
    }
}
