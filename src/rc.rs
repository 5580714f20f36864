//! TPM_RESULT return codes.

use std::fmt;

/// A TPM 1.2 protocol return code (`TPM_RESULT`).
///
/// Every value other than [`TpmRc::SUCCESS`] is carried in-band by a well
/// formed response; they are never fatal for the caller.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TpmRc(pub u32);

macro_rules! return_codes {
    ($($name:ident = $value:expr,)*) => {
        #[allow(missing_docs)]
        impl TpmRc {
            $(pub const $name: TpmRc = TpmRc($value);)*

            /// Symbolic name of the return code, if it is a known one.
            pub fn name(self) -> Option<&'static str> {
                match self {
                    $(TpmRc::$name => Some(stringify!($name)),)*
                    _ => None,
                }
            }
        }
    };
}

const NON_FATAL: u32 = 0x800;

return_codes! {
    SUCCESS = 0x00,
    AUTHFAIL = 0x01,
    BADINDEX = 0x02,
    BAD_PARAMETER = 0x03,
    AUDITFAILURE = 0x04,
    CLEAR_DISABLED = 0x05,
    DEACTIVATED = 0x06,
    DISABLED = 0x07,
    DISABLED_CMD = 0x08,
    FAIL = 0x09,
    BAD_ORDINAL = 0x0A,
    INSTALL_DISABLED = 0x0B,
    INVALID_KEYHANDLE = 0x0C,
    KEYNOTFOUND = 0x0D,
    INAPPROPRIATE_ENC = 0x0E,
    MIGRATEFAIL = 0x0F,
    INVALID_PCR_INFO = 0x10,
    NOSPACE = 0x11,
    NOSRK = 0x12,
    NOTSEALED_BLOB = 0x13,
    OWNER_SET = 0x14,
    RESOURCES = 0x15,
    SHORTRANDOM = 0x16,
    SIZE = 0x17,
    WRONGPCRVAL = 0x18,
    BAD_PARAM_SIZE = 0x19,
    SHA_THREAD = 0x1A,
    SHA_ERROR = 0x1B,
    FAILEDSELFTEST = 0x1C,
    AUTH2FAIL = 0x1D,
    BADTAG = 0x1E,
    IOERROR = 0x1F,
    ENCRYPT_ERROR = 0x20,
    DECRYPT_ERROR = 0x21,
    INVALID_AUTHHANDLE = 0x22,
    NO_ENDORSEMENT = 0x23,
    INVALID_KEYUSAGE = 0x24,
    WRONG_ENTITYTYPE = 0x25,
    INVALID_POSTINIT = 0x26,
    INAPPROPRIATE_SIG = 0x27,
    BAD_KEY_PROPERTY = 0x28,
    BAD_MIGRATION = 0x29,
    BAD_SCHEME = 0x2A,
    BAD_DATASIZE = 0x2B,
    BAD_MODE = 0x2C,
    BAD_PRESENCE = 0x2D,
    BAD_VERSION = 0x2E,
    NO_WRAP_TRANSPORT = 0x2F,
    AUDITFAIL_UNSUCCESSFUL = 0x30,
    AUDITFAIL_SUCCESSFUL = 0x31,
    NOTRESETABLE = 0x32,
    NOTLOCAL = 0x33,
    BAD_TYPE = 0x34,
    INVALID_RESOURCE = 0x35,
    NOTFIPS = 0x36,
    INVALID_FAMILY = 0x37,
    NO_NV_PERMISSION = 0x38,
    REQUIRES_SIGN = 0x39,
    KEY_NOTSUPPORTED = 0x3A,
    AUTH_CONFLICT = 0x3B,
    AREA_LOCKED = 0x3C,
    BAD_LOCALITY = 0x3D,
    READ_ONLY = 0x3E,
    PER_NOWRITE = 0x3F,
    FAMILYCOUNT = 0x40,
    WRITE_LOCKED = 0x41,
    BAD_ATTRIBUTES = 0x42,
    INVALID_STRUCTURE = 0x43,
    KEY_OWNER_CONTROL = 0x44,
    BAD_COUNTER = 0x45,
    NOT_FULLWRITE = 0x46,
    CONTEXT_GAP = 0x47,
    MAXNVWRITES = 0x48,
    NOOPERATOR = 0x49,
    RESOURCEMISSING = 0x4A,
    DELEGATE_LOCK = 0x4B,
    DELEGATE_FAMILY = 0x4C,
    DELEGATE_ADMIN = 0x4D,
    TRANSPORT_NOTEXCLUSIVE = 0x4E,
    OWNER_CONTROL = 0x4F,
    BADCONTEXT = 0x5A,
    RETRY = NON_FATAL,
    NEEDS_SELFTEST = NON_FATAL + 1,
    DOING_SELFTEST = NON_FATAL + 2,
    DEFEND_LOCK_RUNNING = NON_FATAL + 3,
}

impl TpmRc {
    /// Returns `true` for [`TpmRc::SUCCESS`]
    pub fn is_success(self) -> bool {
        self == TpmRc::SUCCESS
    }
}

impl From<TpmRc> for u32 {
    fn from(rc: TpmRc) -> u32 {
        rc.0
    }
}

impl fmt::Debug for TpmRc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "TPM_{}", name),
            None => write!(f, "TpmRc({:#x})", self.0),
        }
    }
}

impl fmt::Display for TpmRc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_values() {
        assert_eq!(TpmRc::BAD_PARAM_SIZE.0, 0x19);
        assert_eq!(TpmRc::AUDITFAIL_SUCCESSFUL.0, 0x31);
        assert_eq!(TpmRc::DEFEND_LOCK_RUNNING.0, 0x803);
    }

    #[test]
    fn symbolic_names() {
        assert_eq!(format!("{}", TpmRc::NOSRK), "TPM_NOSRK");
        assert_eq!(TpmRc(0x801).name(), Some("NEEDS_SELFTEST"));
        assert_eq!(TpmRc::DEFEND_LOCK_RUNNING.name(), Some("DEFEND_LOCK_RUNNING"));
        assert_eq!(format!("{}", TpmRc(0x1234)), "TpmRc(0x1234)");
    }
}
