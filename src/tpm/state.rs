//! TPM_PERMANENT_*, TPM_STCLEAR_* and TPM_STANY_* structures.

use std::collections::BTreeSet;

use serde::Deserialize;
use serde::Serialize;

use crate::codec::WriteBe;
use crate::constants::limits::NUM_PCR;
use crate::constants::structure_tag;
use crate::crypto::Digest;
use crate::ordinal;

use super::session::AuthSessions;
use super::transport::TransportSessions;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct PermanentFlags {
    pub disable: bool,
    pub ownership: bool,
    pub deactivated: bool,
    pub read_pubek: bool,
    pub disable_owner_clear: bool,
    pub allow_maintenance: bool,
    pub physical_presence_lifetime_lock: bool,
    pub physical_presence_hw_enable: bool,
    pub physical_presence_cmd_enable: bool,
    pub cekp_used: bool,
    pub tpm_post: bool,
    pub tpm_post_lock: bool,
    pub fips: bool,
    pub operator: bool,
    pub enable_revoke_ek: bool,
    pub nv_locked: bool,
    pub read_srk_pub: bool,
    pub tpm_established: bool,
    pub maintenance_done: bool,
    pub disable_full_da_logic_info: bool,
}

impl PermanentFlags {
    /// Flags as they leave the factory.
    pub fn manufacture() -> PermanentFlags {
        PermanentFlags {
            disable: false,
            ownership: true,
            deactivated: false,
            read_pubek: true,
            disable_owner_clear: false,
            allow_maintenance: true,
            physical_presence_lifetime_lock: false,
            physical_presence_hw_enable: false,
            physical_presence_cmd_enable: true,
            cekp_used: false,
            tpm_post: false,
            tpm_post_lock: false,
            fips: false,
            operator: false,
            enable_revoke_ek: false,
            nv_locked: false,
            read_srk_pub: false,
            tpm_established: false,
            maintenance_done: false,
            disable_full_da_logic_info: false,
        }
    }

    /// In `TPM_PERMANENT_FLAGS` field order.
    fn as_array(&self) -> [bool; 20] {
        [
            self.disable,
            self.ownership,
            self.deactivated,
            self.read_pubek,
            self.disable_owner_clear,
            self.allow_maintenance,
            self.physical_presence_lifetime_lock,
            self.physical_presence_hw_enable,
            self.physical_presence_cmd_enable,
            self.cekp_used,
            self.tpm_post,
            self.tpm_post_lock,
            self.fips,
            self.operator,
            self.enable_revoke_ek,
            self.nv_locked,
            self.read_srk_pub,
            self.tpm_established,
            self.maintenance_done,
            self.disable_full_da_logic_info,
        ]
    }

    pub fn store(&self, out: &mut Vec<u8>) {
        out.put_u16(structure_tag::PERMANENT_FLAGS);
        for flag in self.as_array().iter() {
            out.put_bool(*flag);
        }
    }

    /// Bit n holds the flag with subcap n; bit 0 stands for the tag.
    pub fn bitmap(&self) -> u32 {
        bitmap(&self.as_array())
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) struct StClearFlags {
    pub deactivated: bool,
    pub disable_force_clear: bool,
    pub physical_presence: bool,
    pub physical_presence_lock: bool,
    pub b_global_lock: bool,
}

impl StClearFlags {
    fn as_array(&self) -> [bool; 5] {
        [
            self.deactivated,
            self.disable_force_clear,
            self.physical_presence,
            self.physical_presence_lock,
            self.b_global_lock,
        ]
    }

    pub fn store(&self, out: &mut Vec<u8>) {
        out.put_u16(structure_tag::STCLEAR_FLAGS);
        for flag in self.as_array().iter() {
            out.put_bool(*flag);
        }
    }

    pub fn bitmap(&self) -> u32 {
        bitmap(&self.as_array())
    }
}

fn bitmap(flags: &[bool]) -> u32 {
    flags
        .iter()
        .enumerate()
        .filter(|(_, set)| **set)
        .fold(0, |acc, (i, _)| acc | (1 << (i + 1)))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct PermanentData {
    pub owner_auth: Option<Digest>,
    pub restrict_delegate: u32,
    pub daa_proof: Digest,
    pub audit_monotonic_counter: u32,
    /// Ordinals whose audit status is set
    pub ordinal_audit_status: BTreeSet<u32>,
    /// Latched by an audit failure, cleared only by remanufacturing
    pub audit_failure: bool,
    /// Written by TPM_SaveState, consumed by TPM_Startup(ST_STATE)
    pub saved_state: Option<SavedState>,
}

impl PermanentData {
    pub fn manufacture() -> PermanentData {
        PermanentData {
            owner_auth: None,
            restrict_delegate: 0,
            daa_proof: [0; 20],
            audit_monotonic_counter: 0,
            ordinal_audit_status: ordinal::entries()
                .map(|e| e.ordinal)
                .filter(|o| ordinal::get_audit_default(*o))
                .collect(),
            audit_failure: false,
            saved_state: None,
        }
    }

    pub fn owner_installed(&self) -> bool {
        self.owner_auth.is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StClearData {
    pub pcrs: Vec<Digest>,
    pub audit_digest: Digest,
    pub count_id: u32,
    pub deferred_physical_presence: u32,
    pub disable_reset_lock: bool,
    /// Failed authorizations since the last successful owner authorization
    pub auth_fail_count: u32,
    /// Timer value (ms) of the most recent failed authorization
    pub auth_fail_time: u64,
}

impl StClearData {
    pub fn new() -> StClearData {
        StClearData {
            pcrs: vec![[0; 20]; NUM_PCR],
            audit_digest: [0; 20],
            count_id: crate::constants::limits::COUNT_ID_NULL,
            deferred_physical_presence: 0,
            disable_reset_lock: false,
            auth_fail_count: 0,
            auth_fail_time: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct StAnyFlags {
    pub post_initialise: bool,
    pub locality_modifier: u32,
    /// Handle of the exclusive transport session, 0 if there is none
    pub transport_exclusive: u32,
    pub tos_present: bool,
}

impl StAnyFlags {
    pub fn new() -> StAnyFlags {
        StAnyFlags {
            post_initialise: true,
            locality_modifier: 0,
            transport_exclusive: 0,
            tos_present: true,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub(crate) enum TestState {
    /// Only the commands tested at power on may run
    Limited,
    Full,
    Failure,
}

impl TestState {
    /// Encoding used by TPM_GetTestResult
    pub fn code(self) -> u8 {
        match self {
            TestState::Limited => 0,
            TestState::Full => 1,
            TestState::Failure => 2,
        }
    }
}

/// Volatile state preserved across TPM_SaveState / TPM_Startup(ST_STATE).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SavedState {
    pub stclear_flags: StClearFlags,
    pub stclear_data: StClearData,
    pub auth_sessions: AuthSessions,
    pub transport_sessions: TransportSessions,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ord;

    #[test]
    fn manufactured_audit_defaults() {
        let data = PermanentData::manufacture();
        assert!(data.ordinal_audit_status.contains(&ord::PHYSICAL_ENABLE));
        assert!(data.ordinal_audit_status.contains(&ord::FORCE_CLEAR));
        assert!(!data.ordinal_audit_status.contains(&ord::GET_CAPABILITY));
        assert!(!data.owner_installed());
    }

    #[test]
    fn permanent_flags_wire_form() {
        let mut out = Vec::new();
        PermanentFlags::manufacture().store(&mut out);
        assert_eq!(out.len(), 2 + 20);
        assert_eq!(&out[..2], &[0x00, 0x1F]);
        // ownership, readPubek, allowMaintenance, physicalPresenceCMDEnable
        assert_eq!(out[2..6], [0, 1, 0, 1]);
        assert_eq!(out[7], 1);
        assert_eq!(out[10], 1);
    }

    #[test]
    fn flag_bitmaps() {
        let flags = StClearFlags {
            deactivated: true,
            physical_presence_lock: true,
            ..StClearFlags::default()
        };
        assert_eq!(flags.bitmap(), (1 << 1) | (1 << 4));

        let mut pf = PermanentFlags::manufacture();
        pf.disable = true;
        assert_eq!(pf.bitmap() & 0b11, 0b10);
    }
}
