//! TPM 1.2 wire constants.
//!
//! Grouped the same way the TPM 1.2 structures specification groups them, so
//! that a value can be looked up by the name a TSS would use.

#![allow(missing_docs)]

/// Command and response tags (`TPM_TAG`)
pub mod tag {
    pub const RQU_COMMAND: u16 = 0x00C1;
    pub const RQU_AUTH1_COMMAND: u16 = 0x00C2;
    pub const RQU_AUTH2_COMMAND: u16 = 0x00C3;
    pub const RSP_COMMAND: u16 = 0x00C4;
    pub const RSP_AUTH1_COMMAND: u16 = 0x00C5;
    pub const RSP_AUTH2_COMMAND: u16 = 0x00C6;
}

/// Structure tags (`TPM_STRUCTURE_TAG`)
pub mod structure_tag {
    pub const COUNTER_VALUE: u16 = 0x000E;
    pub const TRANSPORT_LOG_IN: u16 = 0x0010;
    pub const TRANSPORT_LOG_OUT: u16 = 0x0011;
    pub const CURRENT_TICKS: u16 = 0x0014;
    pub const TRANSPORT_AUTH: u16 = 0x001D;
    pub const TRANSPORT_PUBLIC: u16 = 0x001E;
    pub const PERMANENT_FLAGS: u16 = 0x001F;
    pub const STCLEAR_FLAGS: u16 = 0x0020;
    pub const STANY_FLAGS: u16 = 0x0021;
    pub const CAP_VERSION_INFO: u16 = 0x0030;
    pub const DA_INFO: u16 = 0x0037;
    pub const DA_INFO_LIMITED: u16 = 0x0038;
    pub const DA_ACTION_TYPE: u16 = 0x0039;
}

/// Command ordinals (`TPM_ORD` and `TSC_ORD`)
pub mod ord {
    pub const OIAP: u32 = 0x0000000a;
    pub const OSAP: u32 = 0x0000000b;
    pub const CHANGE_AUTH: u32 = 0x0000000c;
    pub const TAKE_OWNERSHIP: u32 = 0x0000000d;
    pub const CHANGE_AUTH_ASYM_START: u32 = 0x0000000e;
    pub const CHANGE_AUTH_ASYM_FINISH: u32 = 0x0000000f;
    pub const CHANGE_AUTH_OWNER: u32 = 0x00000010;
    pub const DSAP: u32 = 0x00000011;
    pub const CMK_CREATE_TICKET: u32 = 0x00000012;
    pub const CMK_CREATE_KEY: u32 = 0x00000013;
    pub const EXTEND: u32 = 0x00000014;
    pub const PCR_READ: u32 = 0x00000015;
    pub const QUOTE: u32 = 0x00000016;
    pub const SEAL: u32 = 0x00000017;
    pub const UNSEAL: u32 = 0x00000018;
    pub const DIR_WRITE_AUTH: u32 = 0x00000019;
    pub const DIR_READ: u32 = 0x0000001a;
    pub const CMK_CREATE_BLOB: u32 = 0x0000001b;
    pub const CMK_SET_RESTRICTIONS: u32 = 0x0000001c;
    pub const CMK_APPROVE_MA: u32 = 0x0000001d;
    pub const UNBIND: u32 = 0x0000001e;
    pub const CREATE_WRAP_KEY: u32 = 0x0000001f;
    pub const LOAD_KEY: u32 = 0x00000020;
    pub const GET_PUB_KEY: u32 = 0x00000021;
    pub const EVICT_KEY: u32 = 0x00000022;
    pub const KEY_CONTROL_OWNER: u32 = 0x00000023;
    pub const CMK_CONVERT_MIGRATION: u32 = 0x00000024;
    pub const MIGRATE_KEY: u32 = 0x00000025;
    pub const CREATE_MIGRATION_BLOB: u32 = 0x00000028;
    pub const DAA_JOIN: u32 = 0x00000029;
    pub const CONVERT_MIGRATION_BLOB: u32 = 0x0000002a;
    pub const AUTHORIZE_MIGRATION_KEY: u32 = 0x0000002b;
    pub const CREATE_MAINTENANCE_ARCHIVE: u32 = 0x0000002c;
    pub const LOAD_MAINTENANCE_ARCHIVE: u32 = 0x0000002d;
    pub const KILL_MAINTENANCE_FEATURE: u32 = 0x0000002e;
    pub const LOAD_MANU_MAINT_PUB: u32 = 0x0000002f;
    pub const READ_MANU_MAINT_PUB: u32 = 0x00000030;
    pub const DAA_SIGN: u32 = 0x00000031;
    pub const CERTIFY_KEY: u32 = 0x00000032;
    pub const CERTIFY_KEY2: u32 = 0x00000033;
    pub const SIGN: u32 = 0x0000003c;
    pub const SEALX: u32 = 0x0000003d;
    pub const QUOTE2: u32 = 0x0000003e;
    pub const SET_CAPABILITY: u32 = 0x0000003f;
    pub const RESET_LOCK_VALUE: u32 = 0x00000040;
    pub const LOAD_KEY2: u32 = 0x00000041;
    pub const GET_RANDOM: u32 = 0x00000046;
    pub const STIR_RANDOM: u32 = 0x00000047;
    pub const SELF_TEST_FULL: u32 = 0x00000050;
    pub const CERTIFY_SELF_TEST: u32 = 0x00000052;
    pub const CONTINUE_SELF_TEST: u32 = 0x00000053;
    pub const GET_TEST_RESULT: u32 = 0x00000054;
    pub const RESET: u32 = 0x0000005a;
    pub const OWNER_CLEAR: u32 = 0x0000005b;
    pub const DISABLE_OWNER_CLEAR: u32 = 0x0000005c;
    pub const FORCE_CLEAR: u32 = 0x0000005d;
    pub const DISABLE_FORCE_CLEAR: u32 = 0x0000005e;
    pub const GET_CAPABILITY_SIGNED: u32 = 0x00000064;
    pub const GET_CAPABILITY: u32 = 0x00000065;
    pub const GET_CAPABILITY_OWNER: u32 = 0x00000066;
    pub const OWNER_SET_DISABLE: u32 = 0x0000006e;
    pub const PHYSICAL_ENABLE: u32 = 0x0000006f;
    pub const PHYSICAL_DISABLE: u32 = 0x00000070;
    pub const SET_OWNER_INSTALL: u32 = 0x00000071;
    pub const PHYSICAL_SET_DEACTIVATED: u32 = 0x00000072;
    pub const SET_TEMP_DEACTIVATED: u32 = 0x00000073;
    pub const SET_OPERATOR_AUTH: u32 = 0x00000074;
    pub const SET_OWNER_POINTER: u32 = 0x00000075;
    pub const CREATE_ENDORSEMENT_KEY_PAIR: u32 = 0x00000078;
    pub const MAKE_IDENTITY: u32 = 0x00000079;
    pub const ACTIVATE_IDENTITY: u32 = 0x0000007a;
    pub const READ_PUBEK: u32 = 0x0000007c;
    pub const OWNER_READ_PUBEK: u32 = 0x0000007d;
    pub const DISABLE_PUBEK_READ: u32 = 0x0000007e;
    pub const CREATE_REVOCABLE_EK: u32 = 0x0000007f;
    pub const REVOKE_TRUST: u32 = 0x00000080;
    pub const OWNER_READ_INTERNAL_PUB: u32 = 0x00000081;
    pub const GET_AUDIT_EVENT: u32 = 0x00000082;
    pub const GET_AUDIT_EVENT_SIGNED: u32 = 0x00000083;
    pub const GET_AUDIT_DIGEST: u32 = 0x00000085;
    pub const GET_AUDIT_DIGEST_SIGNED: u32 = 0x00000086;
    pub const GET_ORDINAL_AUDIT_STATUS: u32 = 0x0000008c;
    pub const SET_ORDINAL_AUDIT_STATUS: u32 = 0x0000008d;
    pub const TERMINATE_HANDLE: u32 = 0x00000096;
    pub const INIT: u32 = 0x00000097;
    pub const SAVE_STATE: u32 = 0x00000098;
    pub const STARTUP: u32 = 0x00000099;
    pub const SET_REDIRECTION: u32 = 0x0000009a;
    pub const SHA1_START: u32 = 0x000000a0;
    pub const SHA1_UPDATE: u32 = 0x000000a1;
    pub const SHA1_COMPLETE: u32 = 0x000000a2;
    pub const SHA1_COMPLETE_EXTEND: u32 = 0x000000a3;
    pub const FIELD_UPGRADE: u32 = 0x000000aa;
    pub const SAVE_KEY_CONTEXT: u32 = 0x000000b4;
    pub const LOAD_KEY_CONTEXT: u32 = 0x000000b5;
    pub const SAVE_AUTH_CONTEXT: u32 = 0x000000b6;
    pub const LOAD_AUTH_CONTEXT: u32 = 0x000000b7;
    pub const SAVE_CONTEXT: u32 = 0x000000b8;
    pub const LOAD_CONTEXT: u32 = 0x000000b9;
    pub const FLUSH_SPECIFIC: u32 = 0x000000ba;
    pub const PCR_RESET: u32 = 0x000000c8;
    pub const NV_DEFINE_SPACE: u32 = 0x000000cc;
    pub const NV_WRITE_VALUE: u32 = 0x000000cd;
    pub const NV_WRITE_VALUE_AUTH: u32 = 0x000000ce;
    pub const NV_READ_VALUE: u32 = 0x000000cf;
    pub const NV_READ_VALUE_AUTH: u32 = 0x000000d0;
    pub const DELEGATE_UPDATE_VERIFICATION: u32 = 0x000000d1;
    pub const DELEGATE_MANAGE: u32 = 0x000000d2;
    pub const DELEGATE_CREATE_KEY_DELEGATION: u32 = 0x000000d4;
    pub const DELEGATE_CREATE_OWNER_DELEGATION: u32 = 0x000000d5;
    pub const DELEGATE_VERIFY_DELEGATION: u32 = 0x000000d6;
    pub const DELEGATE_LOAD_OWNER_DELEGATION: u32 = 0x000000d8;
    pub const DELEGATE_READ_TABLE: u32 = 0x000000db;
    pub const CREATE_COUNTER: u32 = 0x000000dc;
    pub const INCREMENT_COUNTER: u32 = 0x000000dd;
    pub const READ_COUNTER: u32 = 0x000000de;
    pub const RELEASE_COUNTER: u32 = 0x000000df;
    pub const RELEASE_COUNTER_OWNER: u32 = 0x000000e0;
    pub const ESTABLISH_TRANSPORT: u32 = 0x000000e6;
    pub const EXECUTE_TRANSPORT: u32 = 0x000000e7;
    pub const RELEASE_TRANSPORT_SIGNED: u32 = 0x000000e8;
    pub const GET_TICKS: u32 = 0x000000f1;
    pub const TICK_STAMP_BLOB: u32 = 0x000000f2;
    pub const TSC_PHYSICAL_PRESENCE: u32 = 0x4000000a;
    pub const TSC_RESET_ESTABLISHMENT_BIT: u32 = 0x4000000b;
}

/// Capability areas (`TPM_CAPABILITY_AREA`)
pub mod cap {
    pub const ORD: u32 = 0x01;
    pub const ALG: u32 = 0x02;
    pub const PID: u32 = 0x03;
    pub const FLAG: u32 = 0x04;
    pub const PROPERTY: u32 = 0x05;
    pub const VERSION: u32 = 0x06;
    pub const KEY_HANDLE: u32 = 0x07;
    pub const CHECK_LOADED: u32 = 0x08;
    pub const SYM_MODE: u32 = 0x09;
    pub const KEY_STATUS: u32 = 0x0C;
    pub const NV_LIST: u32 = 0x0D;
    pub const MFR: u32 = 0x10;
    pub const NV_INDEX: u32 = 0x11;
    pub const TRANS_ALG: u32 = 0x12;
    pub const HANDLE: u32 = 0x14;
    pub const TRANS_ES: u32 = 0x15;
    pub const AUTH_ENCRYPT: u32 = 0x17;
    pub const SELECT_SIZE: u32 = 0x18;
    pub const DA_LOGIC: u32 = 0x19;
    pub const VERSION_VAL: u32 = 0x1A;

    pub const FLAG_PERMANENT: u32 = 0x108;
    pub const FLAG_VOLATILE: u32 = 0x109;

    /// `TPM_CAP_MFR` subcap returning the process id of the TPM
    pub const PROCESS_ID: u32 = 0x20;
}

/// `TPM_CAP_PROPERTY` subcaps
pub mod cap_prop {
    pub const PCR: u32 = 0x101;
    pub const DIR: u32 = 0x102;
    pub const MANUFACTURER: u32 = 0x103;
    pub const KEYS: u32 = 0x104;
    pub const MIN_COUNTER: u32 = 0x107;
    pub const AUTHSESS: u32 = 0x10A;
    pub const TRANSESS: u32 = 0x10B;
    pub const COUNTERS: u32 = 0x10C;
    pub const MAX_AUTHSESS: u32 = 0x10D;
    pub const MAX_TRANSESS: u32 = 0x10E;
    pub const MAX_COUNTERS: u32 = 0x10F;
    pub const MAX_KEYS: u32 = 0x110;
    pub const OWNER: u32 = 0x111;
    pub const CONTEXT: u32 = 0x112;
    pub const MAX_CONTEXT: u32 = 0x113;
    pub const FAMILYROWS: u32 = 0x114;
    pub const TIS_TIMEOUT: u32 = 0x115;
    pub const STARTUP_EFFECT: u32 = 0x116;
    pub const DELEGATE_ROW: u32 = 0x117;
    pub const MAX_DAASESS: u32 = 0x119;
    pub const DAASESS: u32 = 0x11A;
    pub const CONTEXT_DIST: u32 = 0x11B;
    pub const DAA_INTERRUPT: u32 = 0x11C;
    pub const SESSIONS: u32 = 0x11D;
    pub const MAX_SESSIONS: u32 = 0x11E;
    pub const CMK_RESTRICTION: u32 = 0x11F;
    pub const DURATION: u32 = 0x120;
    pub const ACTIVE_COUNTER: u32 = 0x122;
    pub const MAX_NV_AVAILABLE: u32 = 0x123;
    pub const INPUT_BUFFER: u32 = 0x124;
}

/// SetCapability areas (`TPM_CAPABILITY_AREA` for TPM_SetCapability)
pub mod set {
    pub const PERM_FLAGS: u32 = 0x01;
    pub const PERM_DATA: u32 = 0x02;
    pub const STCLEAR_FLAGS: u32 = 0x03;
    pub const STCLEAR_DATA: u32 = 0x04;
    pub const STANY_FLAGS: u32 = 0x05;
    pub const STANY_DATA: u32 = 0x06;
    pub const VENDOR: u32 = 0x07;
}

/// `TPM_PERMANENT_FLAGS` subcaps
pub mod pf {
    pub const DISABLE: u32 = 1;
    pub const OWNERSHIP: u32 = 2;
    pub const DEACTIVATED: u32 = 3;
    pub const READPUBEK: u32 = 4;
    pub const DISABLEOWNERCLEAR: u32 = 5;
    pub const ALLOWMAINTENANCE: u32 = 6;
    pub const PHYSICALPRESENCELIFETIMELOCK: u32 = 7;
    pub const PHYSICALPRESENCEHWENABLE: u32 = 8;
    pub const PHYSICALPRESENCECMDENABLE: u32 = 9;
    pub const CEKPUSED: u32 = 10;
    pub const TPMPOST: u32 = 11;
    pub const TPMPOSTLOCK: u32 = 12;
    pub const FIPS: u32 = 13;
    pub const OPERATOR: u32 = 14;
    pub const ENABLEREVOKEEK: u32 = 15;
    pub const NV_LOCKED: u32 = 16;
    pub const READSRKPUB: u32 = 17;
    pub const TPMESTABLISHED: u32 = 18;
    pub const MAINTENANCEDONE: u32 = 19;
    pub const DISABLEFULLDALOGICINFO: u32 = 20;
}

/// `TPM_STCLEAR_FLAGS` subcaps
pub mod sf {
    pub const DEACTIVATED: u32 = 1;
    pub const DISABLEFORCECLEAR: u32 = 2;
    pub const PHYSICALPRESENCE: u32 = 3;
    pub const PHYSICALPRESENCELOCK: u32 = 4;
    pub const BGLOBALLOCK: u32 = 5;
}

/// `TPM_STANY_FLAGS` subcaps
pub mod af {
    pub const POSTINITIALISE: u32 = 1;
    pub const LOCALITYMODIFIER: u32 = 2;
    pub const TRANSPORTEXCLUSIVE: u32 = 3;
    pub const TOSPRESENT: u32 = 4;
}

/// `TPM_PERMANENT_DATA` subcaps
pub mod pd {
    pub const RESTRICTDELEGATE: u32 = 23;
    pub const DAAPROOF: u32 = 25;
}

/// `TPM_STCLEAR_DATA` subcaps
pub mod sd {
    pub const CONTEXTNONCEKEY: u32 = 1;
    pub const COUNTID: u32 = 2;
    pub const OWNERREFERENCE: u32 = 3;
    pub const DISABLERESETLOCK: u32 = 4;
    pub const PCR: u32 = 5;
    pub const DEFERREDPHYSICALPRESENCE: u32 = 6;
}

/// Protocol ids (`TPM_PROTOCOL_ID`)
pub mod pid {
    pub const NONE: u16 = 0x0000;
    pub const OIAP: u16 = 0x0001;
    pub const OSAP: u16 = 0x0002;
    pub const ADIP: u16 = 0x0003;
    pub const ADCP: u16 = 0x0004;
    pub const OWNER: u16 = 0x0005;
    pub const DSAP: u16 = 0x0006;
    pub const TRANSPORT: u16 = 0x0007;
}

/// Resource types (`TPM_RESOURCE_TYPE`)
pub mod rt {
    pub const KEY: u32 = 0x01;
    pub const AUTH: u32 = 0x02;
    pub const HASH: u32 = 0x03;
    pub const TRANS: u32 = 0x04;
    pub const CONTEXT: u32 = 0x05;
    pub const COUNTER: u32 = 0x06;
    pub const DELEGATE: u32 = 0x07;
    pub const DAA_TPM: u32 = 0x08;
}

/// Algorithm ids (`TPM_ALGORITHM_ID`)
pub mod alg {
    pub const RSA: u32 = 0x01;
    pub const SHA: u32 = 0x04;
    pub const HMAC: u32 = 0x05;
    pub const AES128: u32 = 0x06;
    pub const MGF1: u32 = 0x07;
    pub const AES192: u32 = 0x08;
    pub const AES256: u32 = 0x09;
    pub const XOR: u32 = 0x0A;
}

/// Encryption schemes (`TPM_ENC_SCHEME`)
pub mod es {
    pub const NONE: u16 = 0x0001;
    pub const RSAESPKCSV15: u16 = 0x0002;
    pub const RSAESOAEP_SHA1_MGF1: u16 = 0x0003;
    pub const SYM_CTR: u16 = 0x0004;
    pub const SYM_OFB: u16 = 0x0005;
}

/// Signature schemes (`TPM_SIG_SCHEME`)
pub mod ss {
    pub const NONE: u16 = 0x0001;
    pub const RSASSAPKCS1V15_SHA1: u16 = 0x0002;
    pub const RSASSAPKCS1V15_DER: u16 = 0x0003;
    pub const RSASSAPKCS1V15_INFO: u16 = 0x0004;
}

/// Key usage (`TPM_KEY_USAGE`)
pub mod key_usage {
    pub const SIGNING: u16 = 0x0010;
    pub const STORAGE: u16 = 0x0011;
    pub const IDENTITY: u16 = 0x0012;
    pub const AUTHCHANGE: u16 = 0x0013;
    pub const BIND: u16 = 0x0014;
    pub const LEGACY: u16 = 0x0015;
    pub const MIGRATE: u16 = 0x0016;
}

/// Key authorization usage (`TPM_AUTH_DATA_USAGE`)
pub mod auth_usage {
    pub const NEVER: u8 = 0x00;
    pub const ALWAYS: u8 = 0x01;
}

/// Startup types (`TPM_STARTUP_TYPE`)
pub mod st {
    pub const CLEAR: u16 = 0x0001;
    pub const STATE: u16 = 0x0002;
    pub const DEACTIVATED: u16 = 0x0003;
}

/// Transport session attributes (`TPM_TRANSPORT_ATTRIBUTES`)
pub mod transport {
    pub const ENCRYPT: u32 = 0x0000_0001;
    pub const LOG: u32 = 0x0000_0002;
    pub const EXCLUSIVE: u32 = 0x0000_0004;
}

/// Locality selection bits (`TPM_LOCALITY_SELECTION`)
pub mod loc {
    pub const ZERO: u8 = 0x01;
    pub const ONE: u8 = 0x02;
    pub const TWO: u8 = 0x04;
    pub const THREE: u8 = 0x08;
    pub const FOUR: u8 = 0x10;
    pub const ALL: u8 = 0x1F;
}

/// `TSC_PhysicalPresence` bits (`TPM_PHYSICAL_PRESENCE`)
pub mod physical_presence {
    pub const HW_DISABLE: u16 = 0x0200;
    pub const CMD_DISABLE: u16 = 0x0100;
    pub const LIFETIME_LOCK: u16 = 0x0080;
    pub const HW_ENABLE: u16 = 0x0040;
    pub const CMD_ENABLE: u16 = 0x0020;
    pub const NOTPRESENT: u16 = 0x0010;
    pub const PRESENT: u16 = 0x0008;
    pub const LOCK: u16 = 0x0004;
    pub const MASK: u16 = 0xFC03;
}

/// Reserved key handles (`TPM_KEY_HANDLE`)
pub mod kh {
    pub const SRK: u32 = 0x4000_0000;
    pub const OWNER: u32 = 0x4000_0001;
    pub const REVOKE: u32 = 0x4000_0002;
    pub const TRANSPORT: u32 = 0x4000_0003;
    pub const OPERATOR: u32 = 0x4000_0004;
    pub const ADMIN: u32 = 0x4000_0005;
    pub const EK: u32 = 0x4000_0006;
}

/// Dictionary attack reporting (`TPM_DA_STATE`, `TPM_DA_ACTION_TYPE`)
pub mod da {
    pub const STATE_INACTIVE: u8 = 0x00;
    pub const STATE_ACTIVE: u8 = 0x01;
    pub const ACTION_TIMEOUT: u32 = 0x0000_0001;
}

/// Sizes and limits of this implementation
pub mod limits {
    pub const DIGEST_SIZE: usize = 20;
    pub const NONCE_SIZE: usize = 20;

    /// Size of the command header: tag, paramSize and ordinal
    pub const COMMAND_HEADER_SIZE: usize = 10;
    /// Size of a command authorization block
    pub const AUTH_IN_SIZE: usize = 4 + NONCE_SIZE + 1 + DIGEST_SIZE;
    /// Size of a response authorization block
    pub const AUTH_OUT_SIZE: usize = NONCE_SIZE + 1 + DIGEST_SIZE;

    pub const BUFFER_MAX: usize = 0x1000;
    pub const SHA1_MAX_NUM_BYTES: u32 = (BUFFER_MAX - 64) as u32;

    pub const NUM_PCR: usize = 24;
    pub const AUTHDIR_SIZE: u32 = 1;
    pub const KEY_HANDLES: usize = 20;
    pub const MIN_AUTH_SESSIONS: usize = 16;
    pub const MIN_TRANS_SESSIONS: usize = 16;
    pub const MIN_DAA_SESSIONS: u32 = 1;
    pub const MIN_SESSION_LIST: u32 = 16;
    pub const MIN_COUNTERS: u32 = 4;
    pub const NUM_FAMILY_TABLE_ENTRY_MIN: u32 = 8;
    pub const NUM_DELEGATE_TABLE_ENTRY_MIN: u32 = 2;
    pub const COUNT_ID_NULL: u32 = 0xFFFF_FFFF;

    /// Failed authorizations tolerated before the lockout engages
    pub const LOCKOUT_THRESHOLD: u32 = 5;

    pub const TIMEOUT_A: u32 = 1_000_000;
    pub const TIMEOUT_B: u32 = 1_000_000;
    pub const TIMEOUT_C: u32 = 1_000_000;
    pub const TIMEOUT_D: u32 = 1_000_000;
    pub const SMALL_DURATION: u32 = 2_000_000;
    pub const MEDIUM_DURATION: u32 = 5_000_000;
    pub const LONG_DURATION: u32 = 60_000_000;

    /// `TPM_STARTUP_EFFECTS` reported through `TPM_CAP_PROP_STARTUP_EFFECT`
    pub const STARTUP_EFFECTS: u32 = 0x0000_0054;

    pub const MANUFACTURER: [u8; 4] = *b"IBM\0";
    pub const SPEC_LEVEL: u16 = 0x0002;
    pub const REV_MAJOR: u8 = 1;
    pub const REV_MINOR: u8 = 16;
    pub const ERRATA_REV: u8 = 0x03;
    pub const VENDOR_ID: [u8; 4] = *b"IBM\0";
}
