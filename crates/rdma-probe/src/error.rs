use std::error;
use std::fmt;
use std::io;

/// Result type of fallible operations in this crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced by directory construction, opening and queries.
///
/// A lookup miss is not an error: the lookups return [`Option`]. Only
/// [`DeviceDescriptor::open`](crate::device::DeviceDescriptor::open)
/// hardens a miss into [`Error::NotFound`], because opening demands a
/// resource that is no longer there.
#[derive(Debug)]
#[non_exhaustive]
pub enum Error {
    /// The enumeration primitive reported an error.
    Enumerate(io::Error),
    /// Opening a device resource failed.
    Open(io::Error),
    /// A device-wide or per-port attribute query failed.
    Query {
        /// The 1-based port number for port queries, `None` for
        /// device-wide queries.
        port_num: Option<u8>,
        source: io::Error,
    },
    /// Re-resolution of a retained descriptor found no matching adapter.
    NotFound,
    /// Out-of-bounds indexed access into a device list.
    IndexOutOfRange { index: usize, len: usize },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            Error::Enumerate(_) => f.write_str("failed to enumerate devices"),
            Error::Open(_) => f.write_str("failed to open device"),
            Error::Query { port_num: None, .. } => {
                f.write_str("failed to query device attributes")
            }
            Error::Query {
                port_num: Some(port_num),
                ..
            } => write!(f, "failed to query port {port_num}"),
            Error::NotFound => f.write_str("device not found"),
            Error::IndexOutOfRange { index, len } => {
                write!(f, "device index {index} out of range (len {len})")
            }
        }
    }
}

impl error::Error for Error {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match *self {
            Error::Enumerate(ref source)
            | Error::Open(ref source)
            | Error::Query { ref source, .. } => Some(source),
            Error::NotFound | Error::IndexOutOfRange { .. } => None,
        }
    }
}
