//! Errors from building, compiling, and sending gumps.

use std::fmt::{self, Formatter, Display};


pub type Result<I> = std::result::Result<I, Error>;

/// Failure of a gump operation. These are all defects in the calling code or
/// hard protocol limits, never a consequence of what a client sent.
#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: String,
}

#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum ErrorKind {
    /// The caller performed an operation that would never be valid, such as
    /// compiling a detached entry, attaching to a node that isn't a
    /// container, or supplying an explicit entry id that is already taken.
    ///
    /// The gump is left unchanged.
    ApiUsage,

    /// An entry's payload cannot be represented on the wire, such as a
    /// negative entry id or a reply button without an id.
    ///
    /// Nothing is emitted for the compile that hit it.
    MalformedEntry,

    /// Bytes being read back as a packet are truncated or otherwise not a
    /// packet this crate writes.
    MalformedPacket,

    /// The id allocator could not find a free entry id within its bounded
    /// number of attempts.
    IdsExhausted,

    /// The compiled dialog exceeds a protocol limit (packet length, string
    /// count, string length, or declared reply counts).
    Capacity,

    /// A session membership change would put a session into both the user
    /// and viewer set of one shared instance, or referenced an unknown
    /// session or instance.
    Membership,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Error {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.write_str(match *self {
            ErrorKind::ApiUsage => "API usage error",
            ErrorKind::MalformedEntry => "malformed entry",
            ErrorKind::MalformedPacket => "malformed packet",
            ErrorKind::IdsExhausted => "entry ids exhausted",
            ErrorKind::Capacity => "protocol capacity exceeded",
            ErrorKind::Membership => "session membership error",
        })
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        Display::fmt(&self.kind, f)?;
        f.write_str(", ")?;
        f.write_str(&self.message)
    }
}

impl std::error::Error for Error {}


macro_rules! err {
    ($k:ident, $($e:tt)*)=>{
        $crate::error::Error::new(
            $crate::error::ErrorKind::$k,
            format!($($e)*),
        )
    };
}

macro_rules! bail {
    ($($e:tt)*)=>{ return Err($crate::error::err!($($e)*)) };
}

macro_rules! ensure {
    ($c:expr, $($e:tt)*)=>{
        if !$c {
            $crate::error::bail!($($e)*);
        }
    };
}

pub(crate) use err;
pub(crate) use bail;
pub(crate) use ensure;
