//! Per-instance descriptor table.
//!
//! Maps small guest-visible integers to host file descriptors. The guest
//! never sees a raw host fd; every ABI entry point that accepts a guest `fd`
//! argument must resolve it through this table first. Re-registering the
//! same host fd returns the existing guest fd rather than allocating a new
//! slot, so two guest-visible descriptors never alias one host resource.

use crate::error::GuestErrno;

/// Upper bound on live descriptors per instance.
pub const MAX_FDS: usize = 64;

/// A raw, host-side file descriptor (or socket handle).
pub type RawHostFd = i32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Slot {
    host_fd: RawHostFd,
    occupied: bool,
}

/// Fixed-capacity guest-fd -> host-fd table.
///
/// `initialize()` pre-installs stdio at guest fds 0/1/2, matching the
/// convention every POSIX-shaped ABI assumes.
#[derive(Debug, Clone)]
pub struct FdTable {
    slots: Vec<Slot>,
}

impl FdTable {
    /// Build an empty table with no descriptors installed.
    pub fn new() -> Self {
        Self {
            slots: vec![
                Slot {
                    host_fd: -1,
                    occupied: false,
                };
                MAX_FDS
            ],
        }
    }

    /// Pre-install stdin/stdout/stderr at guest fds 0/1/2.
    pub fn initialize(&mut self) {
        for (guest_fd, host_fd) in [(0, 0), (1, 1), (2, 2)] {
            self.slots[guest_fd] = Slot {
                host_fd,
                occupied: true,
            };
        }
    }

    /// Register a host fd, returning its guest-visible descriptor.
    ///
    /// If `host_fd` is already registered, returns the existing guest fd
    /// (dedup) instead of allocating a second slot for the same resource.
    pub fn allocate(&mut self, host_fd: RawHostFd) -> Result<i32, GuestErrno> {
        if let Some(existing) = self
            .slots
            .iter()
            .position(|s| s.occupied && s.host_fd == host_fd)
        {
            return Ok(existing as i32);
        }
        match self.slots.iter().position(|s| !s.occupied) {
            Some(idx) => {
                self.slots[idx] = Slot {
                    host_fd,
                    occupied: true,
                };
                Ok(idx as i32)
            }
            None => Err(GuestErrno::Nfile),
        }
    }

    /// Resolve a guest fd to its host fd.
    pub fn resolve(&self, guest_fd: i32) -> Result<RawHostFd, GuestErrno> {
        let idx = self.index_of(guest_fd)?;
        let slot = &self.slots[idx];
        if slot.occupied {
            Ok(slot.host_fd)
        } else {
            Err(GuestErrno::Badf)
        }
    }

    /// Release a guest fd's slot. Idempotent on an already-free slot.
    pub fn release(&mut self, guest_fd: i32) -> Result<RawHostFd, GuestErrno> {
        let idx = self.index_of(guest_fd)?;
        let slot = &mut self.slots[idx];
        if !slot.occupied {
            return Err(GuestErrno::Badf);
        }
        let host_fd = slot.host_fd;
        slot.occupied = false;
        slot.host_fd = -1;
        Ok(host_fd)
    }

    /// Re-point `guest_fd` at the host fd currently held by `from`, then
    /// free `from`'s slot. Implements `fd_renumber`'s dup2-then-close
    /// semantics.
    pub fn renumber(&mut self, from: i32, to: i32) -> Result<(), GuestErrno> {
        let from_host = self.resolve(from)?;
        let to_idx = self.index_of(to)?;
        self.slots[to_idx] = Slot {
            host_fd: from_host,
            occupied: true,
        };
        let from_idx = self.index_of(from)?;
        self.slots[from_idx] = Slot {
            host_fd: -1,
            occupied: false,
        };
        Ok(())
    }

    fn index_of(&self, guest_fd: i32) -> Result<usize, GuestErrno> {
        if guest_fd < 0 || guest_fd as usize >= self.slots.len() {
            return Err(GuestErrno::Badf);
        }
        Ok(guest_fd as usize)
    }
}

impl Default for FdTable {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initialize_installs_stdio_at_fixed_indices() {
        let mut table = FdTable::new();
        table.initialize();
        assert_eq!(table.resolve(0).unwrap(), 0);
        assert_eq!(table.resolve(1).unwrap(), 1);
        assert_eq!(table.resolve(2).unwrap(), 2);
    }

    #[test]
    fn allocate_dedups_same_host_fd() {
        let mut table = FdTable::new();
        table.initialize();
        let a = table.allocate(42).unwrap();
        let b = table.allocate(42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn allocate_assigns_distinct_slots_for_distinct_fds() {
        let mut table = FdTable::new();
        table.initialize();
        let a = table.allocate(10).unwrap();
        let b = table.allocate(11).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn resolve_unknown_fd_is_badf() {
        let table = FdTable::new();
        assert_eq!(table.resolve(5), Err(GuestErrno::Badf));
    }

    #[test]
    fn resolve_out_of_range_is_badf() {
        let table = FdTable::new();
        assert_eq!(table.resolve(-1), Err(GuestErrno::Badf));
        assert_eq!(table.resolve(9999), Err(GuestErrno::Badf));
    }

    #[test]
    fn release_frees_the_slot_for_reuse() {
        let mut table = FdTable::new();
        table.initialize();
        let a = table.allocate(42).unwrap();
        table.release(a).unwrap();
        assert_eq!(table.resolve(a), Err(GuestErrno::Badf));
    }

    #[test]
    fn double_release_is_badf() {
        let mut table = FdTable::new();
        table.initialize();
        let a = table.allocate(42).unwrap();
        table.release(a).unwrap();
        assert_eq!(table.release(a), Err(GuestErrno::Badf));
    }

    #[test]
    fn table_exhausts_after_max_fds_allocations() {
        let mut table = FdTable::new();
        table.initialize();
        for host_fd in 100..(100 + MAX_FDS as i32 - 3) {
            table.allocate(host_fd).unwrap();
        }
        assert_eq!(table.allocate(9999), Err(GuestErrno::Nfile));
    }

    #[test]
    fn renumber_moves_host_fd_and_frees_origin() {
        let mut table = FdTable::new();
        table.initialize();
        let a = table.allocate(42).unwrap();
        let b = table.allocate(43).unwrap();
        table.renumber(a, b).unwrap();
        assert_eq!(table.resolve(b).unwrap(), 42);
        assert_eq!(table.resolve(a), Err(GuestErrno::Badf));
    }
}
