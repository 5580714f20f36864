//! Static ordinal table and the lookups built on top of it.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::codec::parse_command_header;
use crate::codec::parse_response_header;
use crate::constants::limits::AUTH_IN_SIZE;
use crate::constants::limits::AUTH_OUT_SIZE;
use crate::constants::limits::COMMAND_HEADER_SIZE;
use crate::constants::ord::*;
use crate::constants::tag;
use crate::error::CmdError;
use crate::error::CmdResult;
use crate::error::Error;
use crate::rc::TpmRc;
use crate::SpecRevision;

/// `keyHandles` value for commands whose handle type is only known after
/// parsing (FlushSpecific).
pub(crate) const KEY_HANDLES_VARIABLE: u32 = 0xFFFF_FFFF;

/// Command handlers implemented by this TPM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Handler {
    /// Returns `TPM_BAD_ORDINAL`
    Unused,
    ContinueSelfTest,
    EstablishTransport,
    ExecuteTransport,
    Extend,
    FlushSpecific,
    ForceClear,
    GetAuditDigest,
    GetCapability,
    GetCapabilityOwner,
    GetCapabilitySigned,
    GetRandom,
    GetTestResult,
    GetTicks,
    Init,
    Oiap,
    OwnerSetDisable,
    PcrRead,
    PhysicalDisable,
    PhysicalEnable,
    PhysicalSetDeactivated,
    SaveState,
    SelfTestFull,
    SetCapability,
    SetOrdinalAuditStatus,
    Sha1Complete,
    Sha1CompleteExtend,
    Sha1Start,
    Sha1Update,
    Startup,
    TerminateHandle,
    TscPhysicalPresence,
    TscResetEstablishmentBit,
}

/// Delegation permission bit: `block` selects per1/per2, `position` the bit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Permission {
    pub block: u16,
    pub position: u32,
}

#[derive(Debug)]
pub(crate) struct OrdinalEntry {
    pub ordinal: u32,
    pub handler_v11: Handler,
    pub handler_v12: Handler,
    pub auditable: bool,
    pub audit_default: bool,
    pub owner_permission: Permission,
    pub key_permission: Permission,
    /// Bytes of handles between the header and the dataW area
    pub input_handle_size: u32,
    /// 0, 1, 2 or [`KEY_HANDLES_VARIABLE`]
    pub key_handles: u32,
    pub output_handle_size: u32,
    pub transport_wrappable: bool,
}

impl OrdinalEntry {
    pub fn handler(&self, revision: SpecRevision) -> Handler {
        match revision {
            SpecRevision::V1_1 => self.handler_v11,
            SpecRevision::V1_2 => self.handler_v12,
        }
    }
}

macro_rules! entry {
    (
        $ord:ident, $v11:ident, $v12:ident, $auditable:expr, $audit_default:expr,
        ($owner_block:expr, $owner_pos:expr), ($key_block:expr, $key_pos:expr),
        $in_handles:expr, $key_handles:expr, $out_handles:expr,
        $transport:expr
    ) => {
        OrdinalEntry {
            ordinal: $ord,
            handler_v11: Handler::$v11,
            handler_v12: Handler::$v12,
            auditable: $auditable,
            audit_default: $audit_default,
            owner_permission: Permission {
                block: $owner_block,
                position: $owner_pos,
            },
            key_permission: Permission {
                block: $key_block,
                position: $key_pos,
            },
            input_handle_size: $in_handles,
            key_handles: $key_handles,
            output_handle_size: $out_handles,
            transport_wrappable: $transport,
        }
    };
}

// ordinal, v1.1 handler, v1.2 handler, auditable, audit default,
// (owner permission block, bit), (key permission block, bit),
// input handle bytes, key handles, output handle bytes,
// transport wrappable
#[rustfmt::skip]
static ORDINAL_TABLE: &[OrdinalEntry] = &[
    entry!(ACTIVATE_IDENTITY, Unused, Unused, true, true, (1, 10), (1, 16), 4, 1, 0, true),
    entry!(AUTHORIZE_MIGRATION_KEY, Unused, Unused, true, true, (1, 22), (0, 0), 0, 0, 0, true),
    entry!(CERTIFY_KEY, Unused, Unused, true, false, (0, 0), (1, 12), 8, 2, 0, true),
    entry!(CERTIFY_KEY2, Unused, Unused, true, false, (0, 0), (1, 13), 8, 2, 0, true),
    entry!(CERTIFY_SELF_TEST, Unused, Unused, true, false, (0, 0), (0, 0), 4, 1, 0, true),
    entry!(CHANGE_AUTH, Unused, Unused, true, false, (0, 0), (1, 6), 4, 1, 0, true),
    entry!(CHANGE_AUTH_ASYM_FINISH, Unused, Unused, true, false, (0, 0), (1, 25), 4, 1, 0, true),
    entry!(CHANGE_AUTH_ASYM_START, Unused, Unused, true, false, (0, 0), (1, 26), 4, 1, 0, true),
    entry!(CHANGE_AUTH_OWNER, Unused, Unused, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(CMK_APPROVE_MA, Unused, Unused, true, false, (1, 28), (0, 0), 0, 0, 0, true),
    entry!(CMK_CONVERT_MIGRATION, Unused, Unused, true, false, (1, 28), (0, 0), 4, 1, 0, true),
    entry!(CMK_CREATE_BLOB, Unused, Unused, true, false, (0, 0), (1, 10), 4, 1, 0, true),
    entry!(CMK_CREATE_KEY, Unused, Unused, true, false, (0, 0), (1, 24), 4, 1, 0, true),
    entry!(CMK_CREATE_TICKET, Unused, Unused, true, false, (1, 26), (0, 0), 0, 0, 0, true),
    entry!(CMK_SET_RESTRICTIONS, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(CONTINUE_SELF_TEST, ContinueSelfTest, ContinueSelfTest, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(CONVERT_MIGRATION_BLOB, Unused, Unused, true, true, (0, 0), (1, 8), 4, 1, 0, true),
    entry!(CREATE_COUNTER, Unused, Unused, true, false, (1, 4), (0, 0), 0, 0, 0, true),
    entry!(CREATE_ENDORSEMENT_KEY_PAIR, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(CREATE_MAINTENANCE_ARCHIVE, Unused, Unused, true, true, (1, 21), (0, 0), 0, 0, 0, true),
    entry!(CREATE_MIGRATION_BLOB, Unused, Unused, true, true, (0, 0), (1, 9), 4, 1, 0, true),
    entry!(CREATE_REVOCABLE_EK, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(CREATE_WRAP_KEY, Unused, Unused, true, true, (0, 0), (1, 11), 4, 1, 0, true),
    entry!(DAA_JOIN, Unused, Unused, true, false, (1, 23), (0, 0), 4, 0, 0, true),
    entry!(DAA_SIGN, Unused, Unused, true, false, (1, 0), (0, 0), 4, 0, 0, true),
    entry!(DELEGATE_CREATE_KEY_DELEGATION, Unused, Unused, true, false, (0, 0), (1, 7), 4, 1, 0, true),
    entry!(DELEGATE_CREATE_OWNER_DELEGATION, Unused, Unused, true, false, (1, 1), (0, 0), 0, 0, 0, true),
    entry!(DELEGATE_LOAD_OWNER_DELEGATION, Unused, Unused, true, false, (1, 24), (0, 0), 0, 0, 0, true),
    entry!(DELEGATE_MANAGE, Unused, Unused, true, false, (1, 2), (0, 0), 0, 0, 0, true),
    entry!(DELEGATE_READ_TABLE, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(DELEGATE_UPDATE_VERIFICATION, Unused, Unused, true, false, (1, 5), (0, 0), 0, 0, 0, true),
    entry!(DELEGATE_VERIFY_DELEGATION, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(DIR_READ, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(DIR_WRITE_AUTH, Unused, Unused, true, false, (1, 29), (0, 0), 0, 0, 0, true),
    entry!(DISABLE_FORCE_CLEAR, Unused, Unused, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(DISABLE_OWNER_CLEAR, Unused, Unused, true, true, (1, 15), (0, 0), 0, 0, 0, true),
    entry!(DISABLE_PUBEK_READ, Unused, Unused, true, true, (1, 8), (0, 0), 0, 0, 0, true),
    entry!(DSAP, Unused, Unused, true, false, (0, 0), (0, 0), 30, KEY_HANDLES_VARIABLE, 44, true),
    entry!(ESTABLISH_TRANSPORT, Unused, EstablishTransport, true, false, (0, 0), (1, 21), 4, 1, 0, false),
    entry!(EVICT_KEY, Unused, Unused, true, false, (0, 0), (0, 0), 4, 1, 0, true),
    entry!(EXECUTE_TRANSPORT, Unused, ExecuteTransport, true, false, (0, 0), (0, 0), 0, 0, 0, false),
    entry!(EXTEND, Extend, Extend, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(FIELD_UPGRADE, Unused, Unused, true, false, (1, 6), (0, 0), 0, 0, 0, true),
    entry!(FLUSH_SPECIFIC, Unused, FlushSpecific, true, false, (0, 0), (0, 0), 4, KEY_HANDLES_VARIABLE, 0, true),
    entry!(FORCE_CLEAR, ForceClear, ForceClear, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(GET_AUDIT_DIGEST, Unused, GetAuditDigest, false, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(GET_AUDIT_DIGEST_SIGNED, Unused, Unused, false, false, (0, 0), (1, 15), 4, 1, 0, true),
    entry!(GET_AUDIT_EVENT, Unused, Unused, false, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(GET_AUDIT_EVENT_SIGNED, Unused, Unused, false, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(GET_CAPABILITY, GetCapability, GetCapability, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(GET_CAPABILITY_OWNER, GetCapabilityOwner, GetCapabilityOwner, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(GET_CAPABILITY_SIGNED, GetCapabilitySigned, Unused, true, false, (0, 0), (0, 0), 4, 1, 0, true),
    entry!(GET_ORDINAL_AUDIT_STATUS, Unused, Unused, false, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(GET_PUB_KEY, Unused, Unused, true, false, (0, 0), (1, 5), 4, 1, 0, true),
    entry!(GET_RANDOM, GetRandom, GetRandom, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(GET_TEST_RESULT, GetTestResult, GetTestResult, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(GET_TICKS, Unused, GetTicks, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(INCREMENT_COUNTER, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(INIT, Init, Init, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(KEY_CONTROL_OWNER, Unused, Unused, true, false, (1, 31), (0, 0), 4, 1, 0, true),
    entry!(KILL_MAINTENANCE_FEATURE, Unused, Unused, true, true, (1, 19), (0, 0), 0, 0, 0, true),
    entry!(LOAD_AUTH_CONTEXT, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 4, true),
    entry!(LOAD_CONTEXT, Unused, Unused, true, false, (0, 0), (0, 0), 4, 0, 4, true),
    entry!(LOAD_KEY, Unused, Unused, true, false, (0, 0), (1, 0), 4, 1, 0, true),
    entry!(LOAD_KEY2, Unused, Unused, true, false, (0, 0), (1, 22), 4, 1, 4, true),
    entry!(LOAD_KEY_CONTEXT, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 4, true),
    entry!(LOAD_MAINTENANCE_ARCHIVE, Unused, Unused, true, true, (1, 20), (0, 0), 0, 0, 0, true),
    entry!(LOAD_MANU_MAINT_PUB, Unused, Unused, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(MAKE_IDENTITY, Unused, Unused, true, true, (1, 11), (1, 17), 0, 0, 0, true),
    entry!(MIGRATE_KEY, Unused, Unused, true, false, (0, 0), (1, 23), 4, 1, 0, true),
    entry!(NV_DEFINE_SPACE, Unused, Unused, true, false, (1, 14), (0, 0), 0, 0, 0, true),
    entry!(NV_READ_VALUE, Unused, Unused, true, false, (1, 25), (0, 0), 0, 0, 0, true),
    entry!(NV_READ_VALUE_AUTH, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(NV_WRITE_VALUE, Unused, Unused, true, false, (1, 27), (0, 0), 0, 0, 0, true),
    entry!(NV_WRITE_VALUE_AUTH, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(OIAP, Oiap, Oiap, true, false, (0, 0), (0, 0), 0, 0, 24, true),
    entry!(OSAP, Unused, Unused, true, false, (0, 0), (0, 0), 26, 0, 44, true),
    entry!(OWNER_CLEAR, Unused, Unused, true, true, (1, 16), (0, 0), 0, 0, 0, true),
    entry!(OWNER_READ_INTERNAL_PUB, Unused, Unused, true, false, (1, 18), (0, 0), 0, 1, 0, true),
    entry!(OWNER_READ_PUBEK, Unused, Unused, true, true, (1, 9), (0, 0), 0, 0, 0, true),
    entry!(OWNER_SET_DISABLE, OwnerSetDisable, OwnerSetDisable, true, true, (1, 13), (0, 0), 0, 0, 0, true),
    entry!(PCR_RESET, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(PCR_READ, PcrRead, PcrRead, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(PHYSICAL_DISABLE, PhysicalDisable, PhysicalDisable, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(PHYSICAL_ENABLE, PhysicalEnable, PhysicalEnable, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(PHYSICAL_SET_DEACTIVATED, PhysicalSetDeactivated, PhysicalSetDeactivated, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(QUOTE, Unused, Unused, true, false, (0, 0), (1, 3), 4, 1, 0, true),
    entry!(QUOTE2, Unused, Unused, true, false, (0, 0), (1, 19), 4, 1, 0, true),
    entry!(READ_COUNTER, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(READ_MANU_MAINT_PUB, Unused, Unused, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(READ_PUBEK, Unused, Unused, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(RELEASE_COUNTER, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(RELEASE_COUNTER_OWNER, Unused, Unused, true, false, (1, 3), (0, 0), 0, 0, 0, true),
    entry!(RELEASE_TRANSPORT_SIGNED, Unused, Unused, true, false, (0, 0), (1, 20), 0, 0, 0, false),
    entry!(RESET, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(RESET_LOCK_VALUE, Unused, Unused, true, false, (1, 17), (0, 0), 0, 0, 0, true),
    entry!(REVOKE_TRUST, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SAVE_AUTH_CONTEXT, Unused, Unused, true, false, (0, 0), (0, 0), 4, 0, 0, true),
    entry!(SAVE_CONTEXT, Unused, Unused, true, false, (0, 0), (0, 0), 4, KEY_HANDLES_VARIABLE, 0, true),
    entry!(SAVE_KEY_CONTEXT, Unused, Unused, true, false, (0, 0), (0, 0), 4, 1, 0, true),
    entry!(SAVE_STATE, SaveState, SaveState, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SEAL, Unused, Unused, true, false, (0, 0), (1, 1), 4, 1, 0, true),
    entry!(SEALX, Unused, Unused, true, false, (0, 0), (1, 18), 4, 1, 0, true),
    entry!(SELF_TEST_FULL, SelfTestFull, SelfTestFull, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SET_CAPABILITY, Unused, SetCapability, true, false, (1, 12), (0, 0), 0, 0, 0, true),
    entry!(SET_OPERATOR_AUTH, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SET_ORDINAL_AUDIT_STATUS, SetOrdinalAuditStatus, SetOrdinalAuditStatus, true, true, (1, 30), (0, 0), 0, 0, 0, true),
    entry!(SET_OWNER_INSTALL, Unused, Unused, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SET_OWNER_POINTER, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SET_REDIRECTION, Unused, Unused, true, false, (1, 7), (0, 0), 4, 1, 0, true),
    entry!(SET_TEMP_DEACTIVATED, Unused, Unused, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SHA1_COMPLETE, Sha1Complete, Sha1Complete, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SHA1_COMPLETE_EXTEND, Sha1CompleteExtend, Sha1CompleteExtend, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SHA1_START, Sha1Start, Sha1Start, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SHA1_UPDATE, Sha1Update, Sha1Update, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(SIGN, Unused, Unused, true, false, (0, 0), (1, 14), 4, 1, 0, true),
    entry!(STARTUP, Startup, Startup, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(STIR_RANDOM, Unused, Unused, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(TAKE_OWNERSHIP, Unused, Unused, true, true, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(TERMINATE_HANDLE, TerminateHandle, TerminateHandle, true, false, (0, 0), (0, 0), 4, 0, 0, true),
    entry!(TICK_STAMP_BLOB, Unused, Unused, true, false, (0, 0), (1, 27), 4, 1, 0, true),
    entry!(UNBIND, Unused, Unused, true, false, (0, 0), (1, 4), 4, 1, 0, true),
    entry!(UNSEAL, Unused, Unused, true, false, (0, 0), (1, 2), 4, 1, 0, true),
    entry!(TSC_PHYSICAL_PRESENCE, TscPhysicalPresence, TscPhysicalPresence, true, false, (0, 0), (0, 0), 0, 0, 0, true),
    entry!(TSC_RESET_ESTABLISHMENT_BIT, Unused, TscResetEstablishmentBit, true, false, (0, 0), (0, 0), 0, 0, 0, true),
];

static ORDINAL_INDEX: Lazy<HashMap<u32, &'static OrdinalEntry>> =
    Lazy::new(|| ORDINAL_TABLE.iter().map(|e| (e.ordinal, e)).collect());

/// All entries, in table order.
pub(crate) fn entries() -> impl Iterator<Item = &'static OrdinalEntry> {
    ORDINAL_TABLE.iter()
}

pub(crate) fn get_entry(ordinal: u32) -> Result<&'static OrdinalEntry, TpmRc> {
    ORDINAL_INDEX
        .get(&ordinal)
        .copied()
        .ok_or(TpmRc::BAD_ORDINAL)
}

/// Never fails: an ordinal missing from the table resolves to
/// [`Handler::Unused`].
pub(crate) fn get_process_function(ordinal: u32, revision: SpecRevision) -> Handler {
    match get_entry(ordinal) {
        Ok(entry) => entry.handler(revision),
        Err(_) => Handler::Unused,
    }
}

/// Whether the ordinal may ever be audited. Unknown and unimplemented
/// ordinals are not.
pub(crate) fn get_auditable(ordinal: u32, revision: SpecRevision) -> bool {
    match get_entry(ordinal) {
        Ok(entry) if entry.handler(revision) != Handler::Unused => entry.auditable,
        _ => false,
    }
}

pub(crate) fn get_audit_default(ordinal: u32) -> bool {
    get_entry(ordinal).map(|e| e.audit_default).unwrap_or(false)
}

fn checked_permission(ordinal: u32, permission: Permission) -> CmdResult<Permission> {
    if permission.position >= u32::BITS {
        return Err(Error::InvalidPermissionBit {
            ordinal,
            bit: permission.position,
        }
        .into());
    }
    Ok(permission)
}

pub(crate) fn get_owner_permission(ordinal: u32) -> CmdResult<Permission> {
    let entry = get_entry(ordinal)?;
    checked_permission(ordinal, entry.owner_permission)
}

pub(crate) fn get_key_permission(ordinal: u32) -> CmdResult<Permission> {
    let entry = get_entry(ordinal)?;
    checked_permission(ordinal, entry.key_permission)
}

/// Sanity check of the compiled-in table, run when an instance is created.
pub(crate) fn validate() -> Result<(), Error> {
    let lookups: [fn(u32) -> CmdResult<Permission>; 2] = [get_owner_permission, get_key_permission];
    for entry in ORDINAL_TABLE {
        for lookup in lookups.iter() {
            if let Err(CmdError::Fatal(e)) = lookup(entry.ordinal) {
                return Err(e);
            }
        }
        match entry.key_handles {
            0 | 1 | 2 | KEY_HANDLES_VARIABLE => {}
            count => {
                return Err(Error::InvalidKeyHandleCount {
                    ordinal: entry.ordinal,
                    count,
                })
            }
        }
    }
    Ok(())
}

/// Layout of a command wrapped by ExecuteTransport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WrappedCmdLayout {
    pub ordinal: u32,
    pub data_w_start: usize,
    pub data_w_len: usize,
    pub key_handles: u32,
    /// Offsets of the key handles, which are never encrypted
    pub key_handle_offsets: Vec<usize>,
    pub transport_wrappable: bool,
}

/// Locate the dataW area of a wrapped command.
///
/// For a variable handle count the resource type that decides it sits at the
/// start of dataW, so it can only be read once dataW has been decrypted.
pub(crate) fn parse_wrapped_cmd(wrapped: &[u8]) -> CmdResult<WrappedCmdLayout> {
    let (header, _) = parse_command_header(wrapped)?;
    let entry = get_entry(header.ordinal)?;

    let data_w_start = COMMAND_HEADER_SIZE + entry.input_handle_size as usize;
    let auth_len = match header.tag {
        tag::RQU_AUTH1_COMMAND => AUTH_IN_SIZE,
        tag::RQU_AUTH2_COMMAND => 2 * AUTH_IN_SIZE,
        // an illegal tag is treated as having no trailer
        _ => 0,
    };
    let param_size = header.param_size as usize;
    if param_size < data_w_start + auth_len {
        tracing::debug!(
            "wrapped paramSize {} smaller than {} + {}",
            param_size,
            data_w_start,
            auth_len
        );
        return Err(TpmRc::BAD_PARAM_SIZE.into());
    }

    let key_handle_offsets = match entry.key_handles {
        0 => Vec::new(),
        1 | KEY_HANDLES_VARIABLE => vec![COMMAND_HEADER_SIZE],
        2 => vec![COMMAND_HEADER_SIZE, COMMAND_HEADER_SIZE + 4],
        count => {
            return Err(Error::InvalidKeyHandleCount {
                ordinal: header.ordinal,
                count,
            }
            .into())
        }
    };

    Ok(WrappedCmdLayout {
        ordinal: header.ordinal,
        data_w_start,
        data_w_len: param_size - data_w_start - auth_len,
        key_handles: entry.key_handles,
        key_handle_offsets,
        transport_wrappable: entry.transport_wrappable,
    })
}

/// Layout of a response produced by a wrapped command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct WrappedRspLayout {
    pub data_w_start: usize,
    pub data_w_len: usize,
    pub return_code: TpmRc,
}

pub(crate) fn parse_wrapped_rsp(ordinal: u32, wrapped: &[u8]) -> CmdResult<WrappedRspLayout> {
    let (header, _) = parse_response_header(wrapped)?;
    let entry = get_entry(ordinal)?;

    if !header.return_code.is_success() {
        return Ok(WrappedRspLayout {
            data_w_start: COMMAND_HEADER_SIZE,
            data_w_len: 0,
            return_code: header.return_code,
        });
    }

    let data_w_start = COMMAND_HEADER_SIZE + entry.output_handle_size as usize;
    let auth_len = match header.tag {
        tag::RSP_AUTH1_COMMAND => AUTH_OUT_SIZE,
        tag::RSP_AUTH2_COMMAND => 2 * AUTH_OUT_SIZE,
        _ => 0,
    };
    let param_size = header.param_size as usize;
    if param_size < data_w_start + auth_len {
        return Err(TpmRc::BAD_PARAM_SIZE.into());
    }

    Ok(WrappedRspLayout {
        data_w_start,
        data_w_len: param_size - data_w_start - auth_len,
        return_code: header.return_code,
    })
}
