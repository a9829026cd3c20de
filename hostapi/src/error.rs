//! Guest-visible errno and the host-errno-to-guest-errno translator.
//!
//! `GuestErrno` is the WASI preview1 errno table: the guest ABI surface
//! always returns one of these as a plain `i32`, never a native `errno`
//! value. [`GuestErrno::from_io_error`] is the single chokepoint that
//! translates a host [`std::io::Error`] into this table; anything it
//! doesn't recognize collapses to [`GuestErrno::Perm`] rather than leaking
//! a host-specific code to the guest.

use std::fmt;
use std::io;

/// WASI preview1 errno values this runtime can emit.
///
/// Numeric values match the WASI preview1 table exactly (`Success` = 0,
/// `Badf` = 8, `Inval` = 28, `Perm` = 63, `Notcapable` = 76, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum GuestErrno {
    Success = 0,
    Toobig = 1,
    Acces = 2,
    Addrinuse = 3,
    Addrnotavail = 4,
    Afnosupport = 5,
    Again = 6,
    Already = 7,
    Badf = 8,
    Badmsg = 9,
    Busy = 10,
    Canceled = 11,
    Child = 12,
    Connaborted = 13,
    Connrefused = 14,
    Connreset = 15,
    Deadlk = 16,
    Destaddrreq = 17,
    Dom = 18,
    Dquot = 19,
    Exist = 20,
    Fault = 21,
    Fbig = 22,
    Hostunreach = 23,
    Idrm = 24,
    Ilseq = 25,
    Inprogress = 26,
    Intr = 27,
    Inval = 28,
    Io = 29,
    Isconn = 30,
    Isdir = 31,
    Loop = 32,
    Mfile = 33,
    Mlink = 34,
    Msgsize = 35,
    Multihop = 36,
    Nametoolong = 37,
    Netdown = 38,
    Netreset = 39,
    Netunreach = 40,
    Nfile = 41,
    Nobufs = 42,
    Nodev = 43,
    Noent = 44,
    Noexec = 45,
    Nolck = 46,
    Nolink = 47,
    Nomem = 48,
    Nomsg = 49,
    Noprotoopt = 50,
    Nospc = 51,
    Nosys = 52,
    Notconn = 53,
    Notdir = 54,
    Notempty = 55,
    Notrecoverable = 56,
    Notsock = 57,
    Notsup = 58,
    Notty = 59,
    Nxio = 60,
    Overflow = 61,
    Ownerdead = 62,
    Perm = 63,
    Pipe = 64,
    Proto = 65,
    Protonosupport = 66,
    Prototype = 67,
    Range = 68,
    Rofs = 69,
    Spipe = 70,
    Srch = 71,
    Stale = 72,
    Timedout = 73,
    Txtbsy = 74,
    Xdev = 75,
    Notcapable = 76,
}

impl GuestErrno {
    /// The raw i32 this runtime returns to the guest.
    pub fn raw(self) -> i32 {
        self as i32
    }

    /// Translate a host I/O error into a guest errno.
    ///
    /// Unrecognized host errors collapse to [`GuestErrno::Perm`] rather than
    /// leaking host-specific detail across the sandbox boundary.
    pub fn from_io_error(err: &io::Error) -> Self {
        use io::ErrorKind::*;
        match err.kind() {
            NotFound => GuestErrno::Noent,
            PermissionDenied => GuestErrno::Acces,
            AlreadyExists => GuestErrno::Exist,
            InvalidInput | InvalidData => GuestErrno::Inval,
            TimedOut => GuestErrno::Timedout,
            WouldBlock => GuestErrno::Again,
            Interrupted => GuestErrno::Intr,
            UnexpectedEof => GuestErrno::Io,
            ConnectionRefused => GuestErrno::Connrefused,
            ConnectionReset => GuestErrno::Connreset,
            ConnectionAborted => GuestErrno::Connaborted,
            NotConnected => GuestErrno::Notconn,
            AddrInUse => GuestErrno::Addrinuse,
            AddrNotAvailable => GuestErrno::Addrnotavail,
            BrokenPipe => GuestErrno::Pipe,
            _ => GuestErrno::Perm,
        }
    }
}

impl fmt::Display for GuestErrno {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?} ({})", self, self.raw())
    }
}

/// `O_*`-style open flags, decoded from the guest's `oflags` bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OpenFlags {
    pub creat: bool,
    pub directory: bool,
    pub excl: bool,
    pub trunc: bool,
}

impl OpenFlags {
    pub fn from_bits(bits: i32) -> Self {
        Self {
            creat: bits & 0x1 != 0,
            directory: bits & 0x2 != 0,
            excl: bits & 0x4 != 0,
            trunc: bits & 0x8 != 0,
        }
    }
}

/// `FDFLAGS_*`, decoded from the guest's `fdflags` bitfield.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FdFlags {
    pub append: bool,
    pub dsync: bool,
    pub nonblock: bool,
    pub rsync: bool,
    pub sync: bool,
}

impl FdFlags {
    pub fn from_bits(bits: i32) -> Self {
        Self {
            append: bits & 0x1 != 0,
            dsync: bits & 0x2 != 0,
            nonblock: bits & 0x4 != 0,
            rsync: bits & 0x8 != 0,
            sync: bits & 0x10 != 0,
        }
    }
}

/// `LOOKUPFLAGS_*`. Only `SYMLINK_FOLLOW` (bit 0) is defined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LookupFlags {
    pub symlink_follow: bool,
}

impl LookupFlags {
    pub fn from_bits(bits: i32) -> Self {
        Self {
            symlink_follow: bits & 0x1 != 0,
        }
    }
}

/// `whence` argument of `fd_seek`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Whence {
    Set,
    Cur,
    End,
}

impl Whence {
    pub fn from_raw(raw: i32) -> Result<Self, GuestErrno> {
        match raw {
            0 => Ok(Whence::Set),
            1 => Ok(Whence::Cur),
            2 => Ok(Whence::End),
            _ => Err(GuestErrno::Inval),
        }
    }
}

/// `filetype` values written into a guest `filestat`/`prestat` struct.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum FileType {
    Unknown = 0,
    BlockDevice = 1,
    CharacterDevice = 2,
    Directory = 3,
    RegularFile = 4,
    SocketDgram = 5,
    SocketStream = 6,
    SymbolicLink = 7,
}

/// Socket `af_*` domain, decoded from `sock_open`'s `domain` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SockDomain {
    Inet4,
    Inet6,
}

impl SockDomain {
    pub fn from_raw(raw: i32) -> Result<Self, GuestErrno> {
        match raw {
            0 => Ok(SockDomain::Inet4),
            1 => Ok(SockDomain::Inet6),
            _ => Err(GuestErrno::Afnosupport),
        }
    }
}

/// Socket `sock_*` type, decoded from `sock_open`'s `sock_type` argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SockType {
    Stream,
    Dgram,
}

impl SockType {
    pub fn from_raw(raw: i32) -> Result<Self, GuestErrno> {
        match raw {
            0 => Ok(SockType::Stream),
            1 => Ok(SockType::Dgram),
            _ => Err(GuestErrno::Protonosupport),
        }
    }
}

/// `sdflags` argument of `sock_shutdown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ShutdownFlags {
    pub rd: bool,
    pub wr: bool,
}

impl ShutdownFlags {
    pub fn from_bits(bits: i32) -> Self {
        Self {
            rd: bits & 0x1 != 0,
            wr: bits & 0x2 != 0,
        }
    }
}

/// `advice` argument of `fd_advise`. All values are accepted; the host
/// implementation treats every one as a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advice {
    Normal,
    Sequential,
    Random,
    WillNeed,
    DontNeed,
    NoReuse,
}

impl Advice {
    pub fn from_raw(raw: i32) -> Result<Self, GuestErrno> {
        match raw {
            0 => Ok(Advice::Normal),
            1 => Ok(Advice::Sequential),
            2 => Ok(Advice::Random),
            3 => Ok(Advice::WillNeed),
            4 => Ok(Advice::DontNeed),
            5 => Ok(Advice::NoReuse),
            _ => Err(GuestErrno::Inval),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_values_match_wasi_table() {
        assert_eq!(GuestErrno::Success.raw(), 0);
        assert_eq!(GuestErrno::Badf.raw(), 8);
        assert_eq!(GuestErrno::Inval.raw(), 28);
        assert_eq!(GuestErrno::Perm.raw(), 63);
        assert_eq!(GuestErrno::Notcapable.raw(), 76);
    }

    #[test]
    fn unrecognized_io_error_collapses_to_perm() {
        let err = io::Error::new(io::ErrorKind::Other, "mystery failure");
        assert_eq!(GuestErrno::from_io_error(&err), GuestErrno::Perm);
    }

    #[test]
    fn known_io_errors_translate() {
        assert_eq!(
            GuestErrno::from_io_error(&io::Error::from(io::ErrorKind::NotFound)),
            GuestErrno::Noent
        );
        assert_eq!(
            GuestErrno::from_io_error(&io::Error::from(io::ErrorKind::PermissionDenied)),
            GuestErrno::Acces
        );
        assert_eq!(
            GuestErrno::from_io_error(&io::Error::from(io::ErrorKind::AlreadyExists)),
            GuestErrno::Exist
        );
    }

    #[test]
    fn open_flags_decode_each_bit_independently() {
        let flags = OpenFlags::from_bits(0b1010);
        assert!(!flags.creat);
        assert!(flags.directory);
        assert!(!flags.excl);
        assert!(flags.trunc);
    }

    #[test]
    fn whence_rejects_unknown_value() {
        assert_eq!(Whence::from_raw(0), Ok(Whence::Set));
        assert_eq!(Whence::from_raw(3), Err(GuestErrno::Inval));
    }

    #[test]
    fn sock_domain_and_type_decode() {
        assert_eq!(SockDomain::from_raw(0), Ok(SockDomain::Inet4));
        assert_eq!(SockDomain::from_raw(9), Err(GuestErrno::Afnosupport));
        assert_eq!(SockType::from_raw(1), Ok(SockType::Dgram));
        assert_eq!(SockType::from_raw(9), Err(GuestErrno::Protonosupport));
    }

    #[test]
    fn shutdown_flags_decode() {
        let flags = ShutdownFlags::from_bits(0b11);
        assert!(flags.rd);
        assert!(flags.wr);
    }
}
