//! Thin wrapper around raw host file descriptors.
//!
//! The descriptor table only ever hands back a raw fd (`i32`); this module
//! is where that raw fd gets turned into a `std::fs::File` just long enough
//! to perform one operation. The `File` is never allowed to run its `Drop`
//! (which would close the fd) — ownership of the fd stays with whatever
//! opened it (typically stdio, inherited by the embedding process, or the
//! null device, opened by `path_open` and owned by the guest for the life
//! of the instance).

use std::fs::File;
use std::io;

#[cfg(unix)]
fn borrow(host_fd: i32) -> File {
    use std::os::fd::FromRawFd;
    unsafe { File::from_raw_fd(host_fd) }
}

#[cfg(unix)]
fn release(file: File) {
    use std::os::fd::IntoRawFd;
    let _ = file.into_raw_fd();
}

#[cfg(unix)]
const NULL_DEVICE_PATH: &str = "/dev/null";
#[cfg(windows)]
const NULL_DEVICE_PATH: &str = "nul";

/// Open the null device with a fixed mode, regardless of whatever the
/// guest originally asked for, and hand back the raw host fd. The
/// returned `File` is never dropped, so ownership of the fd passes
/// entirely to the caller (normally the descriptor table, for the life
/// of the instance).
#[cfg(unix)]
pub fn open_null_device() -> io::Result<i32> {
    use std::os::fd::IntoRawFd;
    let file = std::fs::OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(NULL_DEVICE_PATH)?;
    Ok(file.into_raw_fd())
}

#[cfg(not(unix))]
pub fn open_null_device() -> io::Result<i32> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "raw fd I/O is only implemented on unix targets",
    ))
}

/// Run `op` against the host fd without taking ownership of it.
#[cfg(unix)]
pub fn with_fd<R>(host_fd: i32, op: impl FnOnce(&mut File) -> io::Result<R>) -> io::Result<R> {
    let mut file = borrow(host_fd);
    let result = op(&mut file);
    release(file);
    result
}

#[cfg(not(unix))]
pub fn with_fd<R>(_host_fd: i32, _op: impl FnOnce(&mut File) -> io::Result<R>) -> io::Result<R> {
    Err(io::Error::new(
        io::ErrorKind::Unsupported,
        "raw fd I/O is only implemented on unix targets",
    ))
}

/// Read at most `buf.len()` bytes from `host_fd` at the current position.
pub fn read(host_fd: i32, buf: &mut [u8]) -> io::Result<usize> {
    use std::io::Read;
    with_fd(host_fd, |f| f.read(buf))
}

/// Read at most `buf.len()` bytes from `host_fd` at `offset`, without
/// disturbing the fd's current position.
pub fn pread(host_fd: i32, buf: &mut [u8], offset: u64) -> io::Result<usize> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        with_fd(host_fd, |f| f.read_at(buf, offset))
    }
    #[cfg(not(unix))]
    {
        let _ = (buf, offset);
        with_fd(host_fd, |_| unreachable!())
    }
}

/// Write all of `buf` to `host_fd` at the current position.
pub fn write(host_fd: i32, buf: &[u8]) -> io::Result<usize> {
    use std::io::Write;
    with_fd(host_fd, |f| f.write(buf))
}

/// Write `buf` to `host_fd` at `offset`, without disturbing the fd's
/// current position.
pub fn pwrite(host_fd: i32, buf: &[u8], offset: u64) -> io::Result<usize> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::FileExt;
        with_fd(host_fd, |f| f.write_at(buf, offset))
    }
    #[cfg(not(unix))]
    {
        let _ = (buf, offset);
        with_fd(host_fd, |_| unreachable!())
    }
}

/// Seek `host_fd` and return the new absolute offset.
pub fn seek(host_fd: i32, pos: io::SeekFrom) -> io::Result<u64> {
    use std::io::Seek;
    with_fd(host_fd, |f| f.seek(pos))
}

pub fn sync_all(host_fd: i32) -> io::Result<()> {
    with_fd(host_fd, |f| f.sync_all())
}

pub fn sync_data(host_fd: i32) -> io::Result<()> {
    with_fd(host_fd, |f| f.sync_data())
}

pub fn set_len(host_fd: i32, size: u64) -> io::Result<()> {
    with_fd(host_fd, |f| f.set_len(size))
}

/// `(size, is_dir, atime_ns, mtime_ns, ctime_ns)`.
pub fn stat(host_fd: i32) -> io::Result<(u64, bool, i64, i64, i64)> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::MetadataExt;
        with_fd(host_fd, |f| {
            let meta = f.metadata()?;
            Ok((
                meta.size(),
                meta.is_dir(),
                meta.atime() * 1_000_000_000 + meta.atime_nsec(),
                meta.mtime() * 1_000_000_000 + meta.mtime_nsec(),
                meta.ctime() * 1_000_000_000 + meta.ctime_nsec(),
            ))
        })
    }
    #[cfg(not(unix))]
    {
        with_fd(host_fd, |_| unreachable!())
    }
}
