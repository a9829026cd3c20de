//! Instance initialization config — the host-loader contract.
//!
//! This is the Rust-native equivalent of the C reference's
//! `wasm2c_rt_init_data` struct, supplied by whatever embeds this runtime
//! (resolving the guest module itself is out of scope here). Fields carry
//! the capability-policy inputs: the guest's home directory string
//! (compared only for display/logging — path access itself is restricted to
//! the null device regardless of `home_dir`), argv/env, an optional guest
//! log path, and a fixed 4-entry netlist.

use std::fmt;

/// Transport protocol of a netlist entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Protocol {
    Tcp,
    Udp,
}

impl Protocol {
    /// Matches the C reference's wire encoding: `TCP` = 1, `UDP` = 2.
    pub fn from_raw(raw: i32) -> Option<Self> {
        match raw {
            1 => Some(Protocol::Tcp),
            2 => Some(Protocol::Udp),
            _ => None,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Protocol::Tcp => 1,
            Protocol::Udp => 2,
        }
    }
}

/// A single allow-listed network endpoint: protocol, IPv4 address
/// (network byte order, as `inet_addr()` produces), and port (host byte
/// order).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NetEndpoint {
    pub protocol: Protocol,
    pub addr_be: u32,
    pub port: u16,
}

impl fmt::Display for NetEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let octets = self.addr_be.to_be_bytes();
        write!(
            f,
            "{:?}:{}.{}.{}.{}:{}",
            self.protocol, octets[0], octets[1], octets[2], octets[3], self.port
        )
    }
}

/// Maximum number of netlist entries, matching the C reference's
/// `calloc(4, sizeof(net_triple))`.
pub const MAX_NETLIST_ENTRIES: usize = 4;

/// Instance initialization config.
#[derive(Debug, Clone, Default)]
pub struct InitConfig {
    /// Guest-visible home directory string. Not used for path resolution;
    /// the capability policy only ever serves the null device.
    pub home_dir: String,
    /// Guest argv, excluding argv[0].
    pub argv: Vec<String>,
    /// Guest environment, as `KEY=VALUE` strings.
    pub env: Vec<String>,
    /// Optional path the host writes guest diagnostic logs to.
    pub log_path: Option<String>,
    /// Allow-listed network endpoints. Always exactly `MAX_NETLIST_ENTRIES`
    /// slots; unused slots are left as `None`.
    pub netlist: [Option<NetEndpoint>; MAX_NETLIST_ENTRIES],
}

impl InitConfig {
    pub fn builder() -> InitConfigBuilder {
        InitConfigBuilder::default()
    }
}

/// Builder for [`InitConfig`], mirroring the way the C reference's
/// CLI launcher assembles `wasm2c_rt_init_data` field by field (that
/// launcher itself is out of scope; this builder is the Rust-native
/// replacement for it).
#[derive(Debug, Clone, Default)]
pub struct InitConfigBuilder {
    home_dir: String,
    argv: Vec<String>,
    env: Vec<String>,
    log_path: Option<String>,
    netlist: Vec<NetEndpoint>,
}

impl InitConfigBuilder {
    pub fn home_dir(mut self, home_dir: impl Into<String>) -> Self {
        self.home_dir = home_dir.into();
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.argv.push(arg.into());
        self
    }

    pub fn env(mut self, env: impl Into<String>) -> Self {
        self.env.push(env.into());
        self
    }

    pub fn log_path(mut self, path: impl Into<String>) -> Self {
        self.log_path = Some(path.into());
        self
    }

    /// Add a netlist entry. Silently ignored past
    /// [`MAX_NETLIST_ENTRIES`], matching the C reference's truncating
    /// `while (triple != NULL && i < 4)` loop.
    pub fn netlist_entry(mut self, entry: NetEndpoint) -> Self {
        if self.netlist.len() < MAX_NETLIST_ENTRIES {
            self.netlist.push(entry);
        }
        self
    }

    pub fn build(self) -> InitConfig {
        let mut netlist = [None; MAX_NETLIST_ENTRIES];
        for (slot, entry) in netlist.iter_mut().zip(self.netlist.into_iter()) {
            *slot = Some(entry);
        }
        InitConfig {
            home_dir: self.home_dir,
            argv: self.argv,
            env: self.env,
            log_path: self.log_path,
            netlist,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_wire_encoding_matches_reference() {
        assert_eq!(Protocol::from_raw(1), Some(Protocol::Tcp));
        assert_eq!(Protocol::from_raw(2), Some(Protocol::Udp));
        assert_eq!(Protocol::from_raw(3), None);
        assert_eq!(Protocol::Tcp.to_raw(), 1);
    }

    #[test]
    fn builder_truncates_past_four_netlist_entries() {
        let entry = NetEndpoint {
            protocol: Protocol::Tcp,
            addr_be: 0,
            port: 80,
        };
        let config = InitConfig::builder()
            .netlist_entry(entry)
            .netlist_entry(entry)
            .netlist_entry(entry)
            .netlist_entry(entry)
            .netlist_entry(entry)
            .build();
        assert!(config.netlist.iter().all(Option::is_some));
    }

    #[test]
    fn default_config_has_empty_netlist() {
        let config = InitConfig::default();
        assert!(config.netlist.iter().all(Option::is_none));
    }
}
