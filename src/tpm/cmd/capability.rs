//! TPM_GetCapability, TPM_GetCapabilityOwner, TPM_GetCapabilitySigned and
//! TPM_SetCapability.

use std::convert::TryFrom;

use crate::codec::Reader;
use crate::codec::WriteBe;
use crate::constants::af;
use crate::constants::alg;
use crate::constants::auth_usage;
use crate::constants::cap;
use crate::constants::cap_prop;
use crate::constants::es;
use crate::constants::key_usage;
use crate::constants::limits::*;
use crate::constants::loc;
use crate::constants::pd;
use crate::constants::pf;
use crate::constants::pid;
use crate::constants::rt;
use crate::constants::sd;
use crate::constants::set;
use crate::constants::sf;
use crate::constants::ss;
use crate::constants::structure_tag;
use crate::constants::tag;
use crate::crypto::sha1;
use crate::error::CmdResult;
use crate::error::Error;
use crate::ordinal::get_process_function;
use crate::ordinal::Handler;
use crate::rc::TpmRc;

use crate::tpm::check::check_request_tag0;
use crate::tpm::check::check_request_tag1;
use crate::tpm::check::check_request_tag10;
use crate::tpm::check::StateCheck;
use crate::tpm::process::Command;
use crate::tpm::process::Exchange;
use crate::tpm::process::Reply;
use crate::tpm::session::Entity;
use crate::tpm::state::TestState;
use crate::tpm::Tpm12;

/// `subCap` as an integer, when it has exactly the integer's size.
fn sub_cap_u32(sub_cap: &[u8]) -> Option<u32> {
    <[u8; 4]>::try_from(sub_cap).ok().map(u32::from_be_bytes)
}

fn sub_cap_u16(sub_cap: &[u8]) -> Option<u16> {
    <[u8; 2]>::try_from(sub_cap).ok().map(u16::from_be_bytes)
}

/// `TPM_STRUCT_VER`, which is always reported as 1.1.0.0.
fn store_struct_ver(out: &mut Vec<u8>) {
    out.put_bytes(&[1, 1, 0, 0]);
}

/// `TPM_VERSION` of this implementation.
fn store_version(out: &mut Vec<u8>) {
    out.put_bytes(&[1, 2, REV_MAJOR, REV_MINOR]);
}

fn store_handle_list(out: &mut Vec<u8>, handles: &[u32]) {
    out.put_u16(handles.len() as u16);
    for handle in handles {
        out.put_u32(*handle);
    }
}

/// Areas that are answered even before the self test has completed.
fn available_untested(cap_area: u32, sub_cap: Option<u32>) -> bool {
    match cap_area {
        cap::VERSION | cap::VERSION_VAL | cap::MFR => true,
        cap::PROPERTY => matches!(
            sub_cap,
            Some(cap_prop::MANUFACTURER | cap_prop::DURATION | cap_prop::TIS_TIMEOUT)
        ),
        _ => false,
    }
}

fn set_value_bool(set_value: &[u8]) -> Result<bool, TpmRc> {
    match set_value {
        [0] => Ok(false),
        [1] => Ok(true),
        [_] => Err(TpmRc::BAD_PARAMETER),
        _ => Err(TpmRc::BAD_PARAM_SIZE),
    }
}

fn set_value_u32(set_value: &[u8]) -> Result<u32, TpmRc> {
    sub_cap_u32(set_value).ok_or(TpmRc::BAD_PARAM_SIZE)
}

/// Update `flag`, reporting whether it changed.
fn set_flag(flag: &mut bool, value: bool) -> bool {
    let altered = *flag != value;
    *flag = value;
    altered
}

impl Tpm12 {
    /// The capability response shared by TPM_GetCapability and
    /// TPM_GetCapabilitySigned.
    pub(crate) fn capability_common(&mut self, cap_area: u32, sub_cap: &[u8]) -> CmdResult<Vec<u8>> {
        let sub32 = sub_cap_u32(sub_cap);
        let mut out = Vec::new();

        match cap_area {
            cap::ORD => {
                let ordinal = sub32.ok_or(TpmRc::BAD_MODE)?;
                let handler = get_process_function(ordinal, self.config.spec_revision);
                out.put_bool(handler != Handler::Unused);
            }
            cap::ALG => {
                let alg_id = sub32.ok_or(TpmRc::BAD_MODE)?;
                out.put_bool(alg_id == alg::RSA);
            }
            cap::PID => {
                let protocol_id = sub_cap_u16(sub_cap).ok_or(TpmRc::BAD_MODE)?;
                out.put_bool(matches!(
                    protocol_id,
                    pid::OIAP | pid::OSAP | pid::ADIP | pid::ADCP | pid::DSAP | pid::TRANSPORT | pid::OWNER
                ));
            }
            cap::FLAG => match sub32.ok_or(TpmRc::BAD_MODE)? {
                cap::FLAG_PERMANENT => self.state.permanent_flags.store(&mut out),
                cap::FLAG_VOLATILE => self.state.stclear_flags.store(&mut out),
                _ => return Err(TpmRc::BAD_MODE.into()),
            },
            cap::PROPERTY => self.capability_property(sub32.ok_or(TpmRc::BAD_MODE)?, &mut out)?,
            cap::VERSION => store_struct_ver(&mut out),
            cap::KEY_HANDLE => store_handle_list(&mut out, &self.keys.handles()),
            cap::CHECK_LOADED => {
                // TPM_KEY_PARMS
                let mut parms = Reader::new(sub_cap);
                let alg_id = parms.u32()?;
                parms.u16()?;
                parms.u16()?;
                parms.sized()?;
                out.put_bool(alg_id == alg::RSA && self.keys.has_space());
            }
            cap::SYM_MODE => {
                sub32.ok_or(TpmRc::BAD_MODE)?;
                out.put_bool(false);
            }
            cap::KEY_STATUS => {
                let handle = sub32.ok_or(TpmRc::BAD_MODE)?;
                let key = self.keys.get(handle).ok_or(TpmRc::INVALID_KEYHANDLE)?;
                out.put_bool(key.owner_evict);
            }
            // no NV indices are ever defined
            cap::NV_LIST => {}
            cap::MFR => {
                if sub_cap.len() < 4 {
                    return Err(TpmRc::BAD_MODE.into());
                }
                match sub32 {
                    Some(cap::PROCESS_ID) => out.put_u32(std::process::id()),
                    _ => return Err(TpmRc::BAD_MODE.into()),
                }
            }
            cap::NV_INDEX => {
                let index = sub32.ok_or(TpmRc::BAD_MODE)?;
                tracing::debug!("NV index {:#010x} is not defined", index);
                return Err(TpmRc::BADINDEX.into());
            }
            cap::TRANS_ALG => {
                let alg_id = sub32.ok_or(TpmRc::BAD_MODE)?;
                out.put_bool(matches!(alg_id, alg::MGF1 | alg::AES128));
            }
            cap::HANDLE => {
                let handles = match sub32.ok_or(TpmRc::BAD_MODE)? {
                    rt::KEY => self.keys.handles(),
                    rt::AUTH => self.state.auth_sessions.handles(),
                    rt::TRANS => self.state.transport_sessions.handles(),
                    rt::CONTEXT | rt::COUNTER | rt::DAA_TPM => Vec::new(),
                    other => {
                        tracing::debug!("no handle list for resource type {:#x}", other);
                        return Err(TpmRc::BAD_PARAMETER.into());
                    }
                };
                store_handle_list(&mut out, &handles);
            }
            cap::TRANS_ES => {
                let scheme = sub_cap_u16(sub_cap).ok_or(TpmRc::BAD_MODE)?;
                out.put_bool(matches!(scheme, es::SYM_CTR | es::SYM_OFB));
            }
            cap::AUTH_ENCRYPT => {
                let alg_id = sub32.ok_or(TpmRc::BAD_MODE)?;
                out.put_bool(matches!(alg_id, alg::XOR | alg::AES128));
            }
            cap::SELECT_SIZE => {
                // TPM_SELECT_SIZE
                let mut select = Reader::new(sub_cap);
                let major = select.u8()?;
                let minor = select.u8()?;
                if major != 1 || !matches!(minor, 1 | 2) {
                    return Err(TpmRc::BAD_PARAMETER.into());
                }
                let req_size = select.u16()?;
                out.put_bool(req_size != 0 && req_size as usize <= NUM_PCR / 8);
            }
            // not tracked per entity type
            cap::DA_LOGIC => self.store_da_info(&mut out),
            cap::VERSION_VAL => {
                out.put_u16(structure_tag::CAP_VERSION_INFO);
                store_version(&mut out);
                out.put_u16(SPEC_LEVEL);
                out.put_u8(ERRATA_REV);
                out.put_bytes(&VENDOR_ID);
                out.put_u16(0);
            }
            other => {
                tracing::debug!("unknown capability area {:#x}", other);
                return Err(TpmRc::BAD_MODE.into());
            }
        }
        Ok(out)
    }

    fn capability_property(&mut self, property: u32, out: &mut Vec<u8>) -> CmdResult<()> {
        let auth_free = self.state.auth_sessions.free_slots() as u32;
        let trans_free = self.state.transport_sessions.free_slots() as u32;

        match property {
            cap_prop::PCR => out.put_u32(NUM_PCR as u32),
            cap_prop::DIR => out.put_u32(AUTHDIR_SIZE),
            cap_prop::MANUFACTURER => out.put_bytes(&MANUFACTURER),
            cap_prop::KEYS => out.put_u32(self.keys.free_slots() as u32),
            cap_prop::MIN_COUNTER => out.put_u32(0),
            cap_prop::AUTHSESS => out.put_u32(auth_free),
            cap_prop::TRANSESS => out.put_u32(trans_free),
            cap_prop::COUNTERS | cap_prop::MAX_COUNTERS => out.put_u32(MIN_COUNTERS),
            cap_prop::MAX_AUTHSESS => out.put_u32(MIN_AUTH_SESSIONS as u32),
            cap_prop::MAX_TRANSESS => out.put_u32(MIN_TRANS_SESSIONS as u32),
            cap_prop::MAX_KEYS => out.put_u32(KEY_HANDLES as u32),
            cap_prop::OWNER => out.put_bool(self.state.permanent_data.owner_installed()),
            cap_prop::CONTEXT | cap_prop::MAX_CONTEXT => out.put_u32(MIN_SESSION_LIST),
            cap_prop::FAMILYROWS => out.put_u32(NUM_FAMILY_TABLE_ENTRY_MIN),
            cap_prop::TIS_TIMEOUT => {
                for timeout in [TIMEOUT_A, TIMEOUT_B, TIMEOUT_C, TIMEOUT_D] {
                    out.put_u32(timeout);
                }
            }
            cap_prop::STARTUP_EFFECT => out.put_u32(STARTUP_EFFECTS),
            cap_prop::DELEGATE_ROW => out.put_u32(NUM_DELEGATE_TABLE_ENTRY_MIN),
            cap_prop::MAX_DAASESS | cap_prop::DAASESS => out.put_u32(MIN_DAA_SESSIONS),
            cap_prop::CONTEXT_DIST => out.put_u32(u32::MAX),
            cap_prop::DAA_INTERRUPT => out.put_bool(true),
            cap_prop::SESSIONS => out.put_u32(auth_free + trans_free),
            cap_prop::MAX_SESSIONS => out.put_u32((MIN_AUTH_SESSIONS + MIN_TRANS_SESSIONS) as u32),
            cap_prop::CMK_RESTRICTION => out.put_u32(self.state.permanent_data.restrict_delegate),
            cap_prop::DURATION => {
                for duration in [SMALL_DURATION, MEDIUM_DURATION, LONG_DURATION] {
                    out.put_u32(duration);
                }
            }
            cap_prop::ACTIVE_COUNTER => out.put_u32(self.state.stclear_data.count_id),
            cap_prop::MAX_NV_AVAILABLE => out.put_u32(0),
            cap_prop::INPUT_BUFFER => out.put_u32(BUFFER_MAX as u32),
            other => {
                tracing::debug!("unknown capability property {:#x}", other);
                return Err(TpmRc::BAD_MODE.into());
            }
        }
        Ok(())
    }

    pub(crate) fn cmd_get_capability(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let cap_area = cmd.params.u32()?;
        let sub_cap = cmd.params.sized()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        if !available_untested(cap_area, sub_cap_u32(sub_cap)) {
            if self.in_failure_mode() {
                tracing::debug!("capability area {:#x} unavailable in failure mode", cap_area);
                return Err(TpmRc::FAILEDSELFTEST.into());
            }
            if self.state.test_state == TestState::Limited {
                self.continue_self_test()?;
            }
        }

        let response = self.capability_common(cap_area, sub_cap)?;
        let mut out = Vec::with_capacity(4 + response.len());
        out.put_sized(&response);
        Ok(Reply::params(out))
    }

    pub(crate) fn cmd_get_capability_owner(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::ALL)?;
        check_request_tag1(cmd.tag)?;
        self.auth_trailer(cmd, ex)?;

        let secret = self.owner_secret()?;
        self.auth_check(ex, &secret, Entity::Owner)?;

        let mut out = Vec::new();
        store_version(&mut out);
        out.put_u32(self.state.permanent_flags.bitmap());
        out.put_u32(self.state.stclear_flags.bitmap());
        Ok(Reply::params(out))
    }

    pub(crate) fn cmd_get_capability_signed(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let key_handle = cmd.params.u32()?;
        let start = cmd.params.position();
        let anti_replay: [u8; 20] = cmd.params.array()?;
        let cap_area = cmd.params.u32()?;
        let sub_cap = cmd.params.sized()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::ALL)?;
        check_request_tag10(cmd.tag)?;
        self.auth_trailer(cmd, ex)?;

        let key = self.keys.get(key_handle).ok_or_else(|| {
            tracing::debug!("no key with handle {:#010x}", key_handle);
            TpmRc::INVALID_KEYHANDLE
        })?;
        let (usage, sig_scheme) = (key.key_usage, key.sig_scheme);
        let (auth_data_usage, usage_auth) = (key.auth_data_usage, key.usage_auth);
        if cmd.tag == tag::RQU_COMMAND {
            if auth_data_usage != auth_usage::NEVER {
                tracing::debug!("key {:#010x} requires authorization", key_handle);
                return Err(TpmRc::AUTHFAIL.into());
            }
        } else {
            self.auth_check(ex, &usage_auth, Entity::Key)?;
        }

        let response = self.capability_common(cap_area, sub_cap)?;
        let s1 = sha1(&[&response, &anti_replay]);

        if !matches!(usage, key_usage::SIGNING | key_usage::IDENTITY | key_usage::LEGACY) {
            tracing::debug!("key usage {:#06x} cannot sign", usage);
            return Err(TpmRc::INVALID_KEYUSAGE.into());
        }
        if sig_scheme != ss::RSASSAPKCS1V15_SHA1 {
            tracing::debug!("signature scheme {:#06x} is not supported", sig_scheme);
            return Err(TpmRc::INAPPROPRIATE_SIG.into());
        }

        let key = self.keys.get_mut(key_handle).ok_or(TpmRc::INVALID_KEYHANDLE)?;
        let sig = key.signer.sign_sha1(&s1).map_err(Error::PlatformCallback)?;

        let mut out = Vec::with_capacity(4 + 4 + response.len() + 4 + sig.len());
        store_version(&mut out);
        out.put_sized(&response);
        out.put_sized(&sig);
        Ok(Reply::params(out))
    }

    pub(crate) fn cmd_set_capability(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let cap_area = cmd.params.u32()?;
        let sub_cap = cmd.params.sized()?;
        let set_value = cmd.params.sized()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag10(cmd.tag)?;
        self.auth_trailer(cmd, ex)?;

        let owner_authorized = cmd.tag == tag::RQU_AUTH1_COMMAND;
        if owner_authorized {
            let secret = self.owner_secret()?;
            self.auth_check(ex, &secret, Entity::Owner)?;
        }
        let presence_authorized = self.physical_presence();

        // anything other than a 4 byte subCap selects nothing
        let sub32 = sub_cap_u32(sub_cap).unwrap_or(0);
        let auth = SetAuth {
            owner: owner_authorized,
            presence: presence_authorized,
        };
        match cap_area {
            set::PERM_FLAGS => self.set_perm_flag(auth, sub32, set_value_bool(set_value)?)?,
            set::PERM_DATA => self.set_perm_data(auth, sub32, set_value)?,
            set::STCLEAR_FLAGS => self.set_stclear_flag(sub32, set_value_bool(set_value)?)?,
            set::STCLEAR_DATA => self.set_stclear_data(auth, sub32, set_value_u32(set_value)?)?,
            set::STANY_FLAGS => self.set_stany_flag(sub32, set_value_bool(set_value)?)?,
            set::STANY_DATA | set::VENDOR => {
                tracing::debug!("area {:#x} has no settable subCap {:#x}", cap_area, sub32);
                return Err(TpmRc::BAD_PARAMETER.into());
            }
            other => {
                tracing::debug!("unknown set capability area {:#x}", other);
                return Err(TpmRc::BAD_MODE.into());
            }
        }
        Ok(Reply::default())
    }

    fn require_enabled_and_active(&self) -> Result<(), TpmRc> {
        if self.state.permanent_flags.disable {
            return Err(TpmRc::DISABLED);
        }
        if self.state.stclear_flags.deactivated {
            return Err(TpmRc::DEACTIVATED);
        }
        Ok(())
    }

    fn set_perm_flag(&mut self, auth: SetAuth, sub_cap: u32, value: bool) -> CmdResult<()> {
        match sub_cap {
            pf::DISABLE => {
                if !auth.owner && !auth.presence {
                    return Err(TpmRc::AUTHFAIL.into());
                }
            }
            pf::OWNERSHIP => {
                if self.state.permanent_data.owner_installed() {
                    return Err(TpmRc::OWNER_SET.into());
                }
                if !auth.presence {
                    return Err(TpmRc::AUTHFAIL.into());
                }
                self.require_enabled_and_active()?;
            }
            pf::DEACTIVATED => {
                if !auth.presence {
                    return Err(TpmRc::AUTHFAIL.into());
                }
                if self.state.permanent_flags.disable {
                    return Err(TpmRc::DISABLED.into());
                }
            }
            pf::READPUBEK | pf::READSRKPUB => {
                auth.require_owner()?;
                self.require_enabled_and_active()?;
            }
            // can only ever be set, ForceClear clears it
            pf::DISABLEOWNERCLEAR => {
                auth.require_owner()?;
                if !value {
                    return Err(TpmRc::BAD_PARAMETER.into());
                }
                self.require_enabled_and_active()?;
            }
            // can only ever be cleared
            pf::ALLOWMAINTENANCE => {
                auth.require_owner()?;
                if value {
                    return Err(TpmRc::BAD_PARAMETER.into());
                }
                self.require_enabled_and_active()?;
            }
            pf::TPMESTABLISHED => {
                self.check_locality(loc::THREE | loc::FOUR)?;
                if value {
                    return Err(TpmRc::BAD_PARAMETER.into());
                }
            }
            pf::DISABLEFULLDALOGICINFO => auth.require_owner()?,
            other => {
                tracing::debug!("permanent flag {} cannot be set", other);
                return Err(TpmRc::BAD_PARAMETER.into());
            }
        }

        let flags = &mut self.state.permanent_flags;
        let flag = match sub_cap {
            pf::DISABLE => &mut flags.disable,
            pf::OWNERSHIP => &mut flags.ownership,
            pf::DEACTIVATED => &mut flags.deactivated,
            pf::READPUBEK => &mut flags.read_pubek,
            pf::READSRKPUB => &mut flags.read_srk_pub,
            pf::DISABLEOWNERCLEAR => &mut flags.disable_owner_clear,
            pf::ALLOWMAINTENANCE => &mut flags.allow_maintenance,
            pf::TPMESTABLISHED => &mut flags.tpm_established,
            _ => &mut flags.disable_full_da_logic_info,
        };
        if set_flag(flag, value) {
            tracing::debug!("permanent flag {} set to {}", sub_cap, value);
            self.nv_commit()?;
        }
        Ok(())
    }

    fn set_perm_data(&mut self, auth: SetAuth, sub_cap: u32, set_value: &[u8]) -> CmdResult<()> {
        match sub_cap {
            pd::RESTRICTDELEGATE => {
                let value = set_value_u32(set_value)?;
                auth.require_owner()?;
                self.require_enabled_and_active()?;
                if self.state.permanent_data.restrict_delegate != value {
                    self.state.permanent_data.restrict_delegate = value;
                    self.nv_commit()?;
                }
            }
            // carries no value, a fresh proof is generated
            pd::DAAPROOF => {
                self.state.permanent_data.daa_proof = self.nonce_generate()?;
                tracing::debug!("regenerated the DAA proof");
                self.nv_commit()?;
            }
            other => {
                tracing::debug!("permanent data {} cannot be set", other);
                return Err(TpmRc::BAD_PARAMETER.into());
            }
        }
        Ok(())
    }

    fn set_stclear_flag(&mut self, sub_cap: u32, value: bool) -> CmdResult<()> {
        if sub_cap != sf::DISABLEFORCECLEAR {
            tracing::debug!("volatile flag {} cannot be set", sub_cap);
            return Err(TpmRc::BAD_PARAMETER.into());
        }
        self.require_enabled_and_active()?;
        if !value {
            return Err(TpmRc::BAD_PARAMETER.into());
        }
        self.state.stclear_flags.disable_force_clear = true;
        Ok(())
    }

    fn set_stclear_data(&mut self, auth: SetAuth, sub_cap: u32, value: u32) -> CmdResult<()> {
        if sub_cap != sd::DEFERREDPHYSICALPRESENCE {
            tracing::debug!("volatile data {} cannot be set", sub_cap);
            return Err(TpmRc::BAD_PARAMETER.into());
        }
        let deferred = &mut self.state.stclear_data.deferred_physical_presence;
        // new bits need physical presence, clearing is always allowed
        if !auth.presence && !*deferred & value != 0 {
            return Err(TpmRc::BAD_PRESENCE.into());
        }
        *deferred = value;
        Ok(())
    }

    fn set_stany_flag(&mut self, sub_cap: u32, value: bool) -> CmdResult<()> {
        if sub_cap != af::TOSPRESENT {
            tracing::debug!("stany flag {} cannot be set", sub_cap);
            return Err(TpmRc::BAD_PARAMETER.into());
        }
        self.check_locality(loc::THREE | loc::FOUR)?;
        self.require_enabled_and_active()?;
        if value {
            return Err(TpmRc::BAD_PARAMETER.into());
        }
        self.state.stany_flags.tos_present = false;
        Ok(())
    }
}

/// How a TPM_SetCapability request was authorized.
#[derive(Debug, Clone, Copy)]
struct SetAuth {
    owner: bool,
    presence: bool,
}

impl SetAuth {
    fn require_owner(self) -> Result<(), TpmRc> {
        if !self.owner {
            return Err(TpmRc::AUTHFAIL);
        }
        Ok(())
    }
}
