//! Host function registration via the Wasmtime linker.
//!
//! Registers the guest ABI surface — the `wasi_snapshot_preview1` system
//! calls plus the `env`-module legacy/emscripten compatibility stubs — with
//! a Wasmtime `Linker<InstanceData>`. Every function here follows the same
//! shape:
//!
//! 1. Pull the guest's exported memory out of the `Caller`.
//! 2. Resolve any guest `fd` argument through the descriptor table —
//!    never touch a host resource using the guest's integer directly.
//! 3. Bounds-check and read any pointer/length arguments.
//! 4. Perform the operation and translate the result to a guest errno.
//!
//! Memory-bounds violations and a missing `memory` export are the only
//! things that trap; every other failure (bad fd, permission denied,
//! unsupported call) is a recoverable guest errno returned as an `i32`.

use std::io;

use wasmtime::{Caller, Linker, Memory};

use wasi_hostapi::error::{Advice, FdFlags, OpenFlags, ShutdownFlags, SockDomain, SockType, Whence};
use wasi_hostapi::{GuestErrno, Protocol};

use crate::error::SandboxError;
use crate::fdio;
use crate::instance::InstanceData;
use crate::memory;

fn trap(msg: impl Into<String>) -> anyhow::Error {
    anyhow::anyhow!(msg.into())
}

fn get_memory(caller: &mut Caller<'_, InstanceData>) -> Result<Memory, anyhow::Error> {
    caller
        .get_export("memory")
        .and_then(|e| e.into_memory())
        .ok_or_else(|| trap("guest module has no 'memory' export"))
}

/// Resolve a guest fd. On success, the host fd. On failure, the guest
/// errno this call should return directly (not a trap — an unknown fd is
/// a normal, recoverable ABI misuse).
fn resolve(data: &InstanceData, guest_fd: i32) -> Result<i32, i32> {
    data.fd_table.resolve(guest_fd).map_err(|e| e.raw())
}

/// Register every guest-facing host function.
pub fn register_host_functions(linker: &mut Linker<InstanceData>) -> Result<(), SandboxError> {
    register_program_environment(linker)?;
    register_clock(linker)?;
    register_fd_ops(linker)?;
    register_path_ops(linker)?;
    register_process(linker)?;
    register_random(linker)?;
    register_sockets(linker)?;
    register_legacy_stubs(linker)?;
    Ok(())
}

// ── Program environment ──

fn register_program_environment(linker: &mut Linker<InstanceData>) -> Result<(), SandboxError> {
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "args_get",
        |mut caller: Caller<'_, InstanceData>, argv_ptr: i32, argv_buf_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let argv = caller.data().argv.clone();
            let mut buf_offset = argv_buf_ptr;
            for (i, arg) in argv.iter().enumerate() {
                let entry_ptr = argv_ptr + (i as i32) * 4;
                let data = mem.data_mut(&mut caller);
                memory::write_i32(data, entry_ptr, buf_offset).map_err(|_| trap("bad argv pointer"))?;
                let mut bytes = arg.clone().into_bytes();
                bytes.push(0);
                memory::write_bytes(data, buf_offset, &bytes).map_err(|_| trap("bad argv buffer"))?;
                buf_offset += bytes.len() as i32;
            }
            Ok(GuestErrno::Success.raw())
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "args_sizes_get",
        |mut caller: Caller<'_, InstanceData>, argc_ptr: i32, argv_buf_size_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let argv = caller.data().argv.clone();
            let argc = argv.len() as i32;
            let buf_size: i32 = argv.iter().map(|a| a.len() as i32 + 1).sum();
            let data = mem.data_mut(&mut caller);
            memory::write_i32(data, argc_ptr, argc).map_err(|_| trap("bad argc pointer"))?;
            memory::write_i32(data, argv_buf_size_ptr, buf_size).map_err(|_| trap("bad argv_buf_size pointer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    // environ_get/environ_sizes_get always report an empty environment.
    // InstanceData still carries the parsed env vector for host-side
    // introspection; the guest simply never sees it through this pair.
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "environ_get",
        |_caller: Caller<'_, InstanceData>, _environ_ptr: i32, _environ_buf_ptr: i32| -> i32 {
            GuestErrno::Success.raw()
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "environ_sizes_get",
        |mut caller: Caller<'_, InstanceData>, environc_ptr: i32, environ_buf_size_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let data = mem.data_mut(&mut caller);
            memory::write_i32(data, environc_ptr, 0).map_err(|_| trap("bad environc pointer"))?;
            memory::write_i32(data, environ_buf_size_ptr, 0).map_err(|_| trap("bad environ_buf_size pointer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    Ok(())
}

// ── Clock ──

fn register_clock(linker: &mut Linker<InstanceData>) -> Result<(), SandboxError> {
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "clock_res_get",
        |mut caller: Caller<'_, InstanceData>, id: i32, res_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let clock_id = match wasi_hostapi::clock::ClockId::from_raw(id) {
                Ok(c) => c,
                Err(e) => return Ok(e.raw()),
            };
            let res = match caller.data().clock.res_get(clock_id) {
                Ok(r) => r,
                Err(e) => return Ok(e.raw()),
            };
            let data = mem.data_mut(&mut caller);
            memory::write_u64(data, res_ptr, res).map_err(|_| trap("bad res_get pointer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "clock_time_get",
        |mut caller: Caller<'_, InstanceData>, id: i32, _precision: i64, time_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let clock_id = match wasi_hostapi::clock::ClockId::from_raw(id) {
                Ok(c) => c,
                Err(e) => return Ok(e.raw()),
            };
            let now = match caller.data().clock.time_get(clock_id) {
                Ok(n) => n,
                Err(e) => return Ok(e.raw()),
            };
            let data = mem.data_mut(&mut caller);
            memory::write_u64(data, time_ptr, now).map_err(|_| trap("bad time_get pointer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    Ok(())
}

// ── File descriptor operations ──

fn register_fd_ops(linker: &mut Linker<InstanceData>) -> Result<(), SandboxError> {
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_advise",
        |caller: Caller<'_, InstanceData>, fd: i32, _offset: i64, _len: i64, advice: i32| -> i32 {
            if let Err(e) = Advice::from_raw(advice) {
                return e.raw();
            }
            match resolve(caller.data(), fd) {
                Ok(_) => GuestErrno::Success.raw(),
                Err(code) => code,
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_allocate",
        |caller: Caller<'_, InstanceData>, fd: i32, offset: i64, len: i64| -> i32 {
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return code,
            };
            match fdio::set_len(host_fd, (offset + len) as u64) {
                Ok(()) => GuestErrno::Success.raw(),
                Err(e) => GuestErrno::from_io_error(&e).raw(),
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_close",
        |mut caller: Caller<'_, InstanceData>, fd: i32| -> i32 {
            if fd < 3 {
                return GuestErrno::Perm.raw();
            }
            match caller.data_mut().fd_table.release(fd) {
                Ok(_) => GuestErrno::Success.raw(),
                Err(e) => e.raw(),
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_datasync",
        |caller: Caller<'_, InstanceData>, fd: i32| -> i32 {
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return code,
            };
            match fdio::sync_data(host_fd) {
                Ok(()) => GuestErrno::Success.raw(),
                Err(e) => GuestErrno::from_io_error(&e).raw(),
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_fdstat_get",
        |mut caller: Caller<'_, InstanceData>, fd: i32, out_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            if let Err(code) = resolve(caller.data(), fd) {
                return Ok(code);
            }
            // fs_filetype(1) | fs_flags(2, pad) | fs_rights_base(8) | fs_rights_inheriting(8)
            let data = mem.data_mut(&mut caller);
            memory::write_u8(data, out_ptr, wasi_hostapi::error::FileType::CharacterDevice as u8)
                .map_err(|_| trap("bad fdstat pointer"))?;
            memory::write_u16(data, out_ptr + 2, 0).map_err(|_| trap("bad fdstat pointer"))?;
            memory::write_u64(data, out_ptr + 8, u64::MAX).map_err(|_| trap("bad fdstat pointer"))?;
            memory::write_u64(data, out_ptr + 16, u64::MAX).map_err(|_| trap("bad fdstat pointer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_fdstat_set_flags",
        |caller: Caller<'_, InstanceData>, fd: i32, flags: i32| -> i32 {
            let _ = FdFlags::from_bits(flags);
            match resolve(caller.data(), fd) {
                Ok(_) => GuestErrno::Success.raw(),
                Err(code) => code,
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_fdstat_set_rights",
        |_caller: Caller<'_, InstanceData>, _fd: i32, _base: i64, _inheriting: i64| -> i32 {
            GuestErrno::Notsup.raw()
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_filestat_get",
        |mut caller: Caller<'_, InstanceData>, fd: i32, out_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            let (size, is_dir, atime, mtime, ctime) = match fdio::stat(host_fd) {
                Ok(s) => s,
                Err(e) => return Ok(GuestErrno::from_io_error(&e).raw()),
            };
            write_filestat(&mem, &mut caller, out_ptr, size, is_dir, atime, mtime, ctime)?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_filestat_set_size",
        |caller: Caller<'_, InstanceData>, fd: i32, size: i64| -> i32 {
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return code,
            };
            match fdio::set_len(host_fd, size as u64) {
                Ok(()) => GuestErrno::Success.raw(),
                Err(e) => GuestErrno::from_io_error(&e).raw(),
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_filestat_set_times",
        |_caller: Caller<'_, InstanceData>, _fd: i32, _atim: i64, _mtim: i64, _flags: i32| -> i32 {
            GuestErrno::Notsup.raw()
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_pread",
        |mut caller: Caller<'_, InstanceData>, fd: i32, iovs_ptr: i32, iovs_len: i32, offset: i64, nread_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            read_vectored(&mem, &mut caller, iovs_ptr, iovs_len, nread_ptr, |buf| {
                fdio::pread(host_fd, buf, offset as u64)
            })
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_prestat_get",
        // The C reference returns the bare literal 1 here; this runtime
        // returns a defined errno instead. No fd is ever pre-opened by
        // this runtime, so every call is "not supported".
        |_caller: Caller<'_, InstanceData>, _fd: i32, _out_ptr: i32| -> i32 { GuestErrno::Notsup.raw() },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_prestat_dir_name",
        |_caller: Caller<'_, InstanceData>, _fd: i32, _path_ptr: i32, _path_len: i32| -> i32 {
            GuestErrno::Notsup.raw()
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_pwrite",
        |mut caller: Caller<'_, InstanceData>, fd: i32, iovs_ptr: i32, iovs_len: i32, offset: i64, nwritten_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            write_vectored(&mem, &mut caller, iovs_ptr, iovs_len, nwritten_ptr, |buf| {
                fdio::pwrite(host_fd, buf, offset as u64)
            })
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_read",
        |mut caller: Caller<'_, InstanceData>, fd: i32, iovs_ptr: i32, iovs_len: i32, nread_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            read_vectored(&mem, &mut caller, iovs_ptr, iovs_len, nread_ptr, |buf| {
                fdio::read(host_fd, buf)
            })
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_readdir",
        |_caller: Caller<'_, InstanceData>, _fd: i32, _buf_ptr: i32, _buf_len: i32, _cookie: i64, _bufused_ptr: i32| -> i32 {
            GuestErrno::Notsup.raw()
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_renumber",
        |mut caller: Caller<'_, InstanceData>, fd: i32, to: i32| -> i32 {
            match caller.data_mut().fd_table.renumber(fd, to) {
                Ok(()) => GuestErrno::Success.raw(),
                Err(e) => e.raw(),
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_seek",
        |mut caller: Caller<'_, InstanceData>, fd: i32, offset: i64, whence: i32, newoffset_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            if fd < 3 {
                return Ok(GuestErrno::Perm.raw());
            }
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            let whence = match Whence::from_raw(whence) {
                Ok(w) => w,
                Err(e) => return Ok(e.raw()),
            };
            let pos = match whence {
                Whence::Set => io::SeekFrom::Start(offset as u64),
                Whence::Cur => io::SeekFrom::Current(offset),
                Whence::End => io::SeekFrom::End(offset),
            };
            let new_offset = match fdio::seek(host_fd, pos) {
                Ok(o) => o,
                Err(e) => return Ok(GuestErrno::from_io_error(&e).raw()),
            };
            let data = mem.data_mut(&mut caller);
            memory::write_u64(data, newoffset_ptr, new_offset).map_err(|_| trap("bad newoffset pointer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_sync",
        |caller: Caller<'_, InstanceData>, fd: i32| -> i32 {
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return code,
            };
            match fdio::sync_all(host_fd) {
                Ok(()) => GuestErrno::Success.raw(),
                Err(e) => GuestErrno::from_io_error(&e).raw(),
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_tell",
        |mut caller: Caller<'_, InstanceData>, fd: i32, offset_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            let pos = match fdio::seek(host_fd, io::SeekFrom::Current(0)) {
                Ok(o) => o,
                Err(e) => return Ok(GuestErrno::from_io_error(&e).raw()),
            };
            let data = mem.data_mut(&mut caller);
            memory::write_u64(data, offset_ptr, pos).map_err(|_| trap("bad offset pointer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "fd_write",
        |mut caller: Caller<'_, InstanceData>, fd: i32, iovs_ptr: i32, iovs_len: i32, nwritten_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            write_vectored(&mem, &mut caller, iovs_ptr, iovs_len, nwritten_ptr, |buf| {
                fdio::write(host_fd, buf)
            })
        },
    )?;

    Ok(())
}

/// Walk an iovec array, reading from guest memory and handing each chunk
/// to `op`, stopping (without error) the first time `op` returns fewer
/// bytes than requested. A zero-length iovec array is success with 0
/// transferred.
fn write_vectored(
    mem: &Memory,
    caller: &mut Caller<'_, InstanceData>,
    iovs_ptr: i32,
    iovs_len: i32,
    nwritten_ptr: i32,
    mut op: impl FnMut(&[u8]) -> io::Result<usize>,
) -> Result<i32, anyhow::Error> {
    let mut total: u32 = 0;
    for i in 0..iovs_len {
        let entry_ptr = iovs_ptr + i * 8;
        let (buf_ptr, buf_len) = {
            let data = mem.data(&*caller);
            memory::read_iovec(data, entry_ptr).map_err(|_| trap("bad iovec entry"))?
        };
        if buf_len == 0 {
            continue;
        }
        let bytes = {
            let data = mem.data(&*caller);
            memory::read_bytes(data, buf_ptr, buf_len).map_err(|_| trap("bad iovec buffer"))?
        };
        match op(&bytes) {
            Ok(n) => {
                total += n as u32;
                if n < bytes.len() {
                    break;
                }
            }
            Err(e) => {
                let data = mem.data_mut(caller);
                let _ = memory::write_u32(data, nwritten_ptr, total);
                return Ok(GuestErrno::from_io_error(&e).raw());
            }
        }
    }
    let data = mem.data_mut(caller);
    memory::write_u32(data, nwritten_ptr, total).map_err(|_| trap("bad nwritten pointer"))?;
    Ok(GuestErrno::Success.raw())
}

/// Same short-read semantics as [`write_vectored`], but filling guest
/// buffers from `op` instead of draining them into it.
fn read_vectored(
    mem: &Memory,
    caller: &mut Caller<'_, InstanceData>,
    iovs_ptr: i32,
    iovs_len: i32,
    nread_ptr: i32,
    mut op: impl FnMut(&mut [u8]) -> io::Result<usize>,
) -> Result<i32, anyhow::Error> {
    let mut total: u32 = 0;
    for i in 0..iovs_len {
        let entry_ptr = iovs_ptr + i * 8;
        let (buf_ptr, buf_len) = {
            let data = mem.data(&*caller);
            memory::read_iovec(data, entry_ptr).map_err(|_| trap("bad iovec entry"))?
        };
        if buf_len == 0 {
            continue;
        }
        memory::validate_range(mem.data(&*caller).len(), buf_ptr, buf_len)
            .map_err(|_| trap("bad iovec buffer"))?;
        let mut scratch = vec![0u8; buf_len as usize];
        match op(&mut scratch) {
            Ok(n) => {
                let data = mem.data_mut(caller);
                memory::write_bytes(data, buf_ptr, &scratch[..n]).map_err(|_| trap("bad iovec buffer"))?;
                total += n as u32;
                if n < scratch.len() {
                    break;
                }
            }
            Err(e) => {
                let data = mem.data_mut(caller);
                let _ = memory::write_u32(data, nread_ptr, total);
                return Ok(GuestErrno::from_io_error(&e).raw());
            }
        }
    }
    let data = mem.data_mut(caller);
    memory::write_u32(data, nread_ptr, total).map_err(|_| trap("bad nread pointer"))?;
    Ok(GuestErrno::Success.raw())
}

#[allow(clippy::too_many_arguments)]
fn write_filestat(
    mem: &Memory,
    caller: &mut Caller<'_, InstanceData>,
    out_ptr: i32,
    size: u64,
    is_dir: bool,
    atime_ns: i64,
    mtime_ns: i64,
    ctime_ns: i64,
) -> Result<(), anyhow::Error> {
    let filetype = if is_dir {
        wasi_hostapi::error::FileType::Directory
    } else {
        wasi_hostapi::error::FileType::RegularFile
    } as u8 as u64;
    let data = mem.data_mut(caller);
    memory::write_u64(data, out_ptr, 0).map_err(|_| trap("bad filestat pointer"))?; // device
    memory::write_u64(data, out_ptr + 8, 0).map_err(|_| trap("bad filestat pointer"))?; // inode
    memory::write_u64(data, out_ptr + 16, filetype).map_err(|_| trap("bad filestat pointer"))?;
    memory::write_u64(data, out_ptr + 24, 1).map_err(|_| trap("bad filestat pointer"))?; // link count
    memory::write_u64(data, out_ptr + 32, size).map_err(|_| trap("bad filestat pointer"))?;
    memory::write_i64(data, out_ptr + 40, atime_ns).map_err(|_| trap("bad filestat pointer"))?;
    memory::write_i64(data, out_ptr + 48, mtime_ns).map_err(|_| trap("bad filestat pointer"))?;
    memory::write_i64(data, out_ptr + 56, ctime_ns).map_err(|_| trap("bad filestat pointer"))?;
    Ok(())
}

// ── Path-based operations ──
//
// The capability policy only ever serves the null device, so every path
// operation other than open/stat is unreachable for a conforming guest;
// they are implemented as defined "not supported" responses rather than
// omitted, so a guest probing them gets a real errno instead of a trap.

fn register_path_ops(linker: &mut Linker<InstanceData>) -> Result<(), SandboxError> {
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_open",
        |mut caller: Caller<'_, InstanceData>,
         _fd: i32,
         _dirflags: i32,
         path_ptr: i32,
         path_len: i32,
         oflags: i32,
         _fs_rights_base: i64,
         _fs_rights_inheriting: i64,
         _fdflags: i32,
         opened_fd_ptr: i32|
         -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let path_bytes = {
                let data = mem.data(&caller);
                memory::read_bytes(data, path_ptr, path_len).map_err(|_| trap("bad path pointer"))?
            };
            // The C reference NUL-terminates the path in place at its final
            // byte before treating it as a string; the guest's path_len
            // includes that terminator, so the string itself is the first
            // path_len - 1 bytes.
            if path_len > 0 {
                let data = mem.data_mut(&mut caller);
                memory::write_u8(data, path_ptr + path_len - 1, 0).map_err(|_| trap("bad path pointer"))?;
            }
            let path = match std::str::from_utf8(&path_bytes[..(path_len - 1).max(0) as usize]) {
                Ok(s) => s,
                Err(_) => return Ok(GuestErrno::Ilseq.raw()),
            };
            let _ = OpenFlags::from_bits(oflags);
            if !caller.data().policy.is_allowed_path(path) {
                return Ok(GuestErrno::Notcapable.raw());
            }
            // The null device is opened once per instance and its host fd
            // reused for every subsequent path_open, so repeat opens dedup
            // to the same guest descriptor.
            let host_fd = match caller.data_mut().null_device_fd() {
                Ok(fd) => fd,
                Err(e) => return Ok(GuestErrno::from_io_error(&e).raw()),
            };
            // Descriptor exhaustion is a resource-exhaustion trap, not a
            // recoverable guest errno: the table's capacity is a host-side
            // invariant the guest has no way to negotiate around.
            let guest_fd = match caller.data_mut().fd_table.allocate(host_fd) {
                Ok(fd) => fd,
                Err(_) => return Err(SandboxError::DescriptorsExhausted.into()),
            };
            let data = mem.data_mut(&mut caller);
            memory::write_i32(data, opened_fd_ptr, guest_fd).map_err(|_| trap("bad opened_fd pointer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_filestat_get",
        |mut caller: Caller<'_, InstanceData>,
         _fd: i32,
         _flags: i32,
         path_ptr: i32,
         path_len: i32,
         out_ptr: i32|
         -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let path_bytes = {
                let data = mem.data(&caller);
                memory::read_bytes(data, path_ptr, path_len).map_err(|_| trap("bad path pointer"))?
            };
            if path_len > 0 {
                let data = mem.data_mut(&mut caller);
                memory::write_u8(data, path_ptr + path_len - 1, 0).map_err(|_| trap("bad path pointer"))?;
            }
            let path = match std::str::from_utf8(&path_bytes[..(path_len - 1).max(0) as usize]) {
                Ok(s) => s,
                Err(_) => return Ok(GuestErrno::Ilseq.raw()),
            };
            if !caller.data().policy.is_allowed_path(path) {
                return Ok(GuestErrno::Notcapable.raw());
            }
            let meta = match std::fs::metadata(null_device_path()) {
                Ok(m) => m,
                Err(e) => return Ok(GuestErrno::from_io_error(&e).raw()),
            };
            write_filestat(&mem, &mut caller, out_ptr, meta.len(), meta.is_dir(), 0, 0, 0)?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_filestat_set_times",
        |_caller: Caller<'_, InstanceData>,
         _fd: i32,
         _flags: i32,
         _path_ptr: i32,
         _path_len: i32,
         _atim: i64,
         _mtim: i64,
         _fst_flags: i32|
         -> i32 { GuestErrno::Notsup.raw() },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_create_directory",
        |_caller: Caller<'_, InstanceData>, _fd: i32, _path_ptr: i32, _path_len: i32| -> i32 {
            GuestErrno::Notcapable.raw()
        },
    )?;
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_remove_directory",
        |_caller: Caller<'_, InstanceData>, _fd: i32, _path_ptr: i32, _path_len: i32| -> i32 {
            GuestErrno::Notcapable.raw()
        },
    )?;
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_unlink_file",
        |_caller: Caller<'_, InstanceData>, _fd: i32, _path_ptr: i32, _path_len: i32| -> i32 {
            GuestErrno::Notcapable.raw()
        },
    )?;
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_readlink",
        |_caller: Caller<'_, InstanceData>,
         _fd: i32,
         _path_ptr: i32,
         _path_len: i32,
         _buf_ptr: i32,
         _buf_len: i32,
         _bufused_ptr: i32|
         -> i32 { GuestErrno::Notsup.raw() },
    )?;
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_symlink",
        |_caller: Caller<'_, InstanceData>,
         _old_path_ptr: i32,
         _old_path_len: i32,
         _fd: i32,
         _new_path_ptr: i32,
         _new_path_len: i32|
         -> i32 { GuestErrno::Notsup.raw() },
    )?;
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_link",
        |_caller: Caller<'_, InstanceData>,
         _old_fd: i32,
         _old_flags: i32,
         _old_path_ptr: i32,
         _old_path_len: i32,
         _new_fd: i32,
         _new_path_ptr: i32,
         _new_path_len: i32|
         -> i32 { GuestErrno::Notsup.raw() },
    )?;
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "path_rename",
        |_caller: Caller<'_, InstanceData>,
         _fd: i32,
         _old_path_ptr: i32,
         _old_path_len: i32,
         _new_fd: i32,
         _new_path_ptr: i32,
         _new_path_len: i32|
         -> i32 { GuestErrno::Notsup.raw() },
    )?;

    Ok(())
}

#[cfg(unix)]
fn null_device_path() -> &'static str {
    "/dev/null"
}
#[cfg(windows)]
fn null_device_path() -> &'static str {
    "nul"
}

// ── Process control ──

fn register_process(linker: &mut Linker<InstanceData>) -> Result<(), SandboxError> {
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "proc_exit",
        |caller: Caller<'_, InstanceData>, code: i32| {
            caller.data().policy.handle_proc_exit(code);
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "proc_raise",
        |_caller: Caller<'_, InstanceData>, _sig: i32| -> i32 { GuestErrno::Notsup.raw() },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "sched_yield",
        |_caller: Caller<'_, InstanceData>| -> i32 { GuestErrno::Success.raw() },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "poll_oneoff",
        |_caller: Caller<'_, InstanceData>, _in_ptr: i32, _out_ptr: i32, _nsubscriptions: i32, _nevents_ptr: i32| -> i32 {
            GuestErrno::Notsup.raw()
        },
    )?;

    Ok(())
}

// ── Randomness ──

fn register_random(linker: &mut Linker<InstanceData>) -> Result<(), SandboxError> {
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "random_get",
        |mut caller: Caller<'_, InstanceData>, buf_ptr: i32, buf_len: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let mut bytes = vec![0u8; buf_len.max(0) as usize];
            rand::RngCore::fill_bytes(&mut rand::thread_rng(), &mut bytes);
            let data = mem.data_mut(&mut caller);
            memory::write_bytes(data, buf_ptr, &bytes).map_err(|_| trap("bad random_get buffer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;
    Ok(())
}

// ── Sockets ──
//
// `sock_open`/`sock_connect` are not part of the strict WASI preview1
// table; they mirror the socket extension the C reference exposes under
// the same import module. Every socket that gets this far must still
// clear the netlist check in `sock_connect` — `sock_open` alone never
// talks to the network.

fn register_sockets(linker: &mut Linker<InstanceData>) -> Result<(), SandboxError> {
    linker.func_wrap(
        "wasi_snapshot_preview1",
        "sock_open",
        |mut caller: Caller<'_, InstanceData>, domain: i32, sock_type: i32, out_fd_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            if let Err(e) = SockDomain::from_raw(domain) {
                return Ok(e.raw());
            }
            let sock_type = match SockType::from_raw(sock_type) {
                Ok(t) => t,
                Err(e) => return Ok(e.raw()),
            };
            let std_type = match sock_type {
                SockType::Stream => socket2::Type::STREAM,
                SockType::Dgram => socket2::Type::DGRAM,
            };
            let socket = match socket2::Socket::new(socket2::Domain::IPV4, std_type, None) {
                Ok(s) => s,
                Err(e) => return Ok(GuestErrno::from_io_error(&e).raw()),
            };
            let host_fd = into_raw_fd_socket(socket);
            let guest_fd = match caller.data_mut().fd_table.allocate(host_fd) {
                Ok(fd) => fd,
                Err(_) => return Err(SandboxError::DescriptorsExhausted.into()),
            };
            let data = mem.data_mut(&mut caller);
            memory::write_i32(data, out_fd_ptr, guest_fd).map_err(|_| trap("bad out_fd pointer"))?;
            Ok(GuestErrno::Success.raw())
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "sock_connect",
        |mut caller: Caller<'_, InstanceData>, fd: i32, addr_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            let (_family, port, addr_be) = {
                let data = mem.data(&caller);
                memory::read_sockaddr(data, addr_ptr).map_err(|_| trap("bad sockaddr pointer"))?
            };
            // Every connect is treated as TCP for netlist purposes; a
            // datagram socket that only ever sends is matched the same
            // way the C reference's single netlist table is, by
            // address/port, not by the socket's own type.
            if !caller
                .data()
                .policy
                .is_allowed_endpoint(Protocol::Tcp, addr_be, port)
            {
                return Ok(GuestErrno::Notcapable.raw());
            }
            let octets = addr_be.to_be_bytes();
            let ip = std::net::Ipv4Addr::new(octets[0], octets[1], octets[2], octets[3]);
            let sockaddr: std::net::SocketAddr = (ip, port).into();
            match connect_raw_fd(host_fd, &sockaddr) {
                Ok(()) => Ok(GuestErrno::Success.raw()),
                Err(e) => Ok(GuestErrno::from_io_error(&e).raw()),
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "sock_send",
        |mut caller: Caller<'_, InstanceData>, fd: i32, si_data_ptr: i32, si_data_len: i32, _si_flags: i32, so_datalen_ptr: i32| -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            write_vectored(&mem, &mut caller, si_data_ptr, si_data_len, so_datalen_ptr, |buf| {
                fdio::write(host_fd, buf)
            })
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "sock_recv",
        |mut caller: Caller<'_, InstanceData>,
         fd: i32,
         ri_data_ptr: i32,
         ri_data_len: i32,
         _ri_flags: i32,
         ro_datalen_ptr: i32,
         ro_flags_ptr: i32|
         -> Result<i32, anyhow::Error> {
            let mem = get_memory(&mut caller)?;
            let host_fd = match resolve(caller.data(), fd) {
                Ok(h) => h,
                Err(code) => return Ok(code),
            };
            let result = read_vectored(&mem, &mut caller, ri_data_ptr, ri_data_len, ro_datalen_ptr, |buf| {
                fdio::read(host_fd, buf)
            })?;
            let data = mem.data_mut(&mut caller);
            memory::write_u16(data, ro_flags_ptr, 0).map_err(|_| trap("bad ro_flags pointer"))?;
            Ok(result)
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "sock_shutdown",
        |caller: Caller<'_, InstanceData>, fd: i32, how: i32| -> i32 {
            let _ = ShutdownFlags::from_bits(how);
            match resolve(caller.data(), fd) {
                Ok(_) => GuestErrno::Success.raw(),
                Err(code) => code,
            }
        },
    )?;

    linker.func_wrap(
        "wasi_snapshot_preview1",
        "sock_accept",
        |_caller: Caller<'_, InstanceData>, _fd: i32, _flags: i32, _out_fd_ptr: i32| -> i32 {
            GuestErrno::Notsup.raw()
        },
    )?;

    Ok(())
}

#[cfg(unix)]
fn into_raw_fd_socket(socket: socket2::Socket) -> i32 {
    use std::os::fd::IntoRawFd;
    socket.into_raw_fd()
}
#[cfg(not(unix))]
fn into_raw_fd_socket(_socket: socket2::Socket) -> i32 {
    -1
}

#[cfg(unix)]
fn connect_raw_fd(host_fd: i32, addr: &std::net::SocketAddr) -> io::Result<()> {
    use std::os::fd::FromRawFd;
    let socket = unsafe { socket2::Socket::from_raw_fd(host_fd) };
    let result = socket.connect(&(*addr).into());
    into_raw_fd_socket(socket);
    result
}
#[cfg(not(unix))]
fn connect_raw_fd(_host_fd: i32, _addr: &std::net::SocketAddr) -> io::Result<()> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "sockets are only implemented on unix targets"))
}

// ── Legacy / emscripten compatibility stubs ──
//
// A handful of modules compiled against emscripten's libc import a small
// set of non-WASI helpers from `env`. None of them have meaningful
// behavior in a POSIX-shaped sandbox; they exist so such a module still
// instantiates rather than failing validation outright.

fn register_legacy_stubs(linker: &mut Linker<InstanceData>) -> Result<(), SandboxError> {
    linker.func_wrap(
        "env",
        "getTempRet0",
        |caller: Caller<'_, InstanceData>| -> i32 { caller.data().temp_ret0 },
    )?;
    linker.func_wrap(
        "env",
        "setTempRet0",
        |mut caller: Caller<'_, InstanceData>, value: i32| {
            caller.data_mut().temp_ret0 = value;
        },
    )?;
    linker.func_wrap(
        "env",
        "emscripten_notify_memory_growth",
        |_caller: Caller<'_, InstanceData>, _memory_index: i32| {},
    )?;
    linker.func_wrap(
        "env",
        "__cxa_thread_atexit",
        |_caller: Caller<'_, InstanceData>, _func: i32, _obj: i32, _dso_symbol: i32| -> i32 { 0 },
    )?;
    linker.func_wrap("env", "dlopen", |_caller: Caller<'_, InstanceData>, _path: i32, _flags: i32| -> i32 { 0 })?;
    linker.func_wrap("env", "dlclose", |_caller: Caller<'_, InstanceData>, _handle: i32| -> i32 { 0 })?;
    linker.func_wrap(
        "env",
        "dlsym",
        |_caller: Caller<'_, InstanceData>, _handle: i32, _symbol: i32| -> i32 { 0 },
    )?;
    linker.func_wrap("env", "dlerror", |_caller: Caller<'_, InstanceData>| -> i32 { 0 })?;
    linker.func_wrap(
        "env",
        "signal",
        |_caller: Caller<'_, InstanceData>, _signum: i32, _handler: i32| -> i32 { 0 },
    )?;
    linker.func_wrap(
        "env",
        "system",
        |_caller: Caller<'_, InstanceData>, _command: i32| -> i32 { -1 },
    )?;

    // longjmp genuinely cannot be emulated across a host call boundary;
    // a guest that reaches it traps rather than receiving a stub return.
    linker.func_wrap(
        "env",
        "emscripten_longjmp",
        |_caller: Caller<'_, InstanceData>, _buf: i32, _value: i32| -> Result<(), anyhow::Error> {
            Err(trap("longjmp not supported"))
        },
    )?;
    linker.func_wrap(
        "env",
        "emscripten_setjmp",
        |_caller: Caller<'_, InstanceData>, _buf: i32| -> i32 { 0 },
    )?;
    linker.func_wrap(
        "env",
        "utimes",
        |_caller: Caller<'_, InstanceData>, _path: i32, _times: i32| -> i32 { -1 },
    )?;
    linker.func_wrap(
        "env",
        "pthread_mutexattr_init",
        |_caller: Caller<'_, InstanceData>, _attr: i32| -> i32 { 0 },
    )?;
    linker.func_wrap(
        "env",
        "pthread_mutexattr_settype",
        |_caller: Caller<'_, InstanceData>, _attr: i32, _kind: i32| -> i32 { 0 },
    )?;
    linker.func_wrap(
        "env",
        "pthread_mutexattr_destroy",
        |_caller: Caller<'_, InstanceData>, _attr: i32| -> i32 { 0 },
    )?;
    linker.func_wrap(
        "env",
        "pthread_create",
        |_caller: Caller<'_, InstanceData>, _thread: i32, _attr: i32, _start_routine: i32, _arg: i32| -> i32 { -1 },
    )?;
    linker.func_wrap(
        "env",
        "pthread_join",
        |_caller: Caller<'_, InstanceData>, _thread: i32, _retval: i32| -> i32 { -1 },
    )?;

    Ok(())
}
