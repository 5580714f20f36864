use std::fmt;

/// tpm12-ref errors
///
/// These are the conditions for which no trustworthy TPM response exists.
/// Protocol level failures are reported in-band through [`crate::TpmRc`].
#[derive(Debug)]
pub enum Error {
    /// Error when calling platform callback
    PlatformCallback(Box<dyn std::error::Error + Send + Sync>),
    /// Ordinal table entry carries a permission bit outside of a 32 bit block
    InvalidPermissionBit {
        /// The offending ordinal
        ordinal: u32,
        /// The out-of-range bit position
        bit: u32,
    },
    /// Ordinal table entry carries an unsupported key handle count
    InvalidKeyHandleCount {
        /// The offending ordinal
        ordinal: u32,
        /// The unsupported count
        count: u32,
    },
    /// Response does not fit the 32 bit paramSize field
    ResponseTooLarge(usize),
    /// Error restoring TPM state
    FailedStateRestore(postcard::Error),
    /// Error serializing TPM state
    FailedStateSave(postcard::Error),
    /// Error calling nvmem platform API
    NvMem(NvError),
}

/// Errors encountered while loading the non volatile state blob
#[derive(Debug)]
pub enum NvError {
    /// The nvmem blob could not be decoded
    InvalidBlob(postcard::Error),
    /// The nvmem blob was written by an incompatible layout revision
    MismatchedRevision {
        /// Revision found in the blob
        found: u16,
    },
}

impl From<NvError> for Error {
    fn from(e: NvError) -> Error {
        Error::NvMem(e)
    }
}

/// Alias for `Result<T, Box<dyn std::error::Error + Send + Sync>>`
pub type DynResult<T> = Result<T, Box<dyn std::error::Error + Send + Sync>>;

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use self::Error::*;
        match self {
            PlatformCallback(e) => write!(f, "error when calling platform callback: {}", e),
            InvalidPermissionBit { ordinal, bit } => write!(
                f,
                "ordinal {:#010x} has permission bit {} out of range",
                ordinal, bit
            ),
            InvalidKeyHandleCount { ordinal, count } => write!(
                f,
                "ordinal {:#010x} has unsupported key handle count {:#x}",
                ordinal, count
            ),
            ResponseTooLarge(len) => write!(f, "response of {} bytes cannot be encoded", len),
            FailedStateRestore(e) => write!(f, "failed restore: {}", e),
            FailedStateSave(e) => write!(f, "failed save: {}", e),
            NvMem(e) => write!(f, "nvmem error: {:?}", e),
        }
    }
}

impl std::error::Error for Error {}

/// Failure of a single command: either an in-band return code, or a fatal
/// condition that aborts response generation altogether.
#[derive(Debug)]
pub(crate) enum CmdError {
    Rc(crate::rc::TpmRc),
    Fatal(Error),
}

pub(crate) type CmdResult<T> = Result<T, CmdError>;

impl From<crate::rc::TpmRc> for CmdError {
    fn from(rc: crate::rc::TpmRc) -> CmdError {
        CmdError::Rc(rc)
    }
}

impl From<Error> for CmdError {
    fn from(e: Error) -> CmdError {
        CmdError::Fatal(e)
    }
}
