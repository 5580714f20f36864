//! State and tag checks run by every handler before it touches any state,
//! plus the dictionary attack lockout they consult.

use std::ops::BitOr;

use crate::codec::WriteBe;
use crate::constants::da;
use crate::constants::limits::LOCKOUT_THRESHOLD;
use crate::constants::structure_tag;
use crate::constants::tag;
use crate::rc::TpmRc;

use super::state::TestState;
use super::Tpm12;

/// Preconditions a command requires of the instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct StateCheck(u32);

impl StateCheck {
    pub const NONE: StateCheck = StateCheck(0);
    pub const NO_LOCKOUT: StateCheck = StateCheck(0x01);
    pub const NOT_SHUTDOWN: StateCheck = StateCheck(0x02);
    pub const ENABLED: StateCheck = StateCheck(0x04);
    pub const ACTIVATED: StateCheck = StateCheck(0x08);
    pub const OWNER: StateCheck = StateCheck(0x10);
    /// Skip the enabled and activated checks while NV is unlocked
    pub const NV_NOAUTH: StateCheck = StateCheck(0x20);
    pub const ALL: StateCheck = StateCheck(0x1F);
    /// Everything in [`StateCheck::ALL`] except an installed owner
    pub const ALLOW_NO_OWNER: StateCheck = StateCheck(0x0F);

    fn contains(self, other: StateCheck) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for StateCheck {
    type Output = StateCheck;

    fn bitor(self, rhs: StateCheck) -> StateCheck {
        StateCheck(self.0 | rhs.0)
    }
}

/// Only `TPM_TAG_RQU_COMMAND`
pub(crate) fn check_request_tag0(request_tag: u16) -> Result<(), TpmRc> {
    if request_tag != tag::RQU_COMMAND {
        tracing::debug!("bad tag {:#06x}, expected no authorization", request_tag);
        return Err(TpmRc::BADTAG);
    }
    Ok(())
}

/// Only `TPM_TAG_RQU_AUTH1_COMMAND`
pub(crate) fn check_request_tag1(request_tag: u16) -> Result<(), TpmRc> {
    if request_tag != tag::RQU_AUTH1_COMMAND {
        tracing::debug!("bad tag {:#06x}, expected one authorization", request_tag);
        return Err(TpmRc::BADTAG);
    }
    Ok(())
}

/// `TPM_TAG_RQU_AUTH1_COMMAND` or `TPM_TAG_RQU_COMMAND`
pub(crate) fn check_request_tag10(request_tag: u16) -> Result<(), TpmRc> {
    if request_tag != tag::RQU_AUTH1_COMMAND && request_tag != tag::RQU_COMMAND {
        tracing::debug!("bad tag {:#06x}, expected zero or one authorization", request_tag);
        return Err(TpmRc::BADTAG);
    }
    Ok(())
}

/// Seconds the lockout lasts after `count` consecutive failures.
fn lockout_seconds(count: u32) -> u64 {
    if count < LOCKOUT_THRESHOLD {
        return 0;
    }
    1 << (count - LOCKOUT_THRESHOLD).min(16)
}

impl Tpm12 {
    /// Checks run in a fixed order, and the first one that fails decides the
    /// return code.
    pub(crate) fn check_state(&mut self, request_tag: u16, checks: StateCheck) -> Result<(), TpmRc> {
        if checks.contains(StateCheck::NO_LOCKOUT) && request_tag != tag::RQU_COMMAND {
            self.da_check_lockout()?;
        }

        if checks.contains(StateCheck::NOT_SHUTDOWN) && self.in_failure_mode() {
            tracing::debug!("TPM is in failure mode");
            return Err(TpmRc::FAILEDSELFTEST);
        }

        if self.state.stany_flags.post_initialise {
            tracing::debug!("only TPM_Startup is allowed after TPM_Init");
            return Err(TpmRc::INVALID_POSTINIT);
        }

        let nv_carve_out =
            checks.contains(StateCheck::NV_NOAUTH) && !self.state.permanent_flags.nv_locked;

        if checks.contains(StateCheck::ENABLED) && !nv_carve_out {
            if self.state.permanent_flags.disable {
                tracing::debug!("TPM is disabled");
                return Err(TpmRc::DISABLED);
            }
        }

        if checks.contains(StateCheck::ACTIVATED) && !nv_carve_out {
            if self.state.stclear_flags.deactivated {
                tracing::debug!("TPM is deactivated");
                return Err(TpmRc::DEACTIVATED);
            }
        }

        if checks.contains(StateCheck::OWNER) && !self.state.permanent_data.owner_installed() {
            tracing::debug!("no owner installed");
            return Err(TpmRc::NOSRK);
        }

        Ok(())
    }

    pub(crate) fn in_failure_mode(&self) -> bool {
        self.state.test_state == TestState::Failure || self.state.permanent_data.audit_failure
    }

    fn da_lockout_remaining(&mut self) -> u64 {
        let count = self.state.stclear_data.auth_fail_count;
        if count < LOCKOUT_THRESHOLD {
            return 0;
        }
        let until = self
            .state
            .stclear_data
            .auth_fail_time
            .saturating_add(lockout_seconds(count) * 1000);
        let remaining_ms = until.saturating_sub(self.timer_ms());
        (remaining_ms + 999) / 1000
    }

    fn da_check_lockout(&mut self) -> Result<(), TpmRc> {
        if self.da_lockout_remaining() != 0 {
            tracing::debug!(
                "dictionary attack lockout after {} failures",
                self.state.stclear_data.auth_fail_count
            );
            return Err(TpmRc::DEFEND_LOCK_RUNNING);
        }
        Ok(())
    }

    /// Called for every failed HMAC check.
    pub(crate) fn da_register_failure(&mut self) {
        let now = self.timer_ms();
        let data = &mut self.state.stclear_data;
        data.auth_fail_count = data.auth_fail_count.saturating_add(1);
        data.auth_fail_time = now;
        tracing::info!("authorization failure #{}", data.auth_fail_count);
    }

    /// Called when the owner authorizes successfully.
    pub(crate) fn da_reset(&mut self) {
        if self.state.stclear_data.auth_fail_count != 0 {
            tracing::debug!("resetting dictionary attack counter");
        }
        self.state.stclear_data.auth_fail_count = 0;
    }

    /// `TPM_DA_INFO`, or `TPM_DA_INFO_LIMITED` when full DA reporting is
    /// disabled.
    pub(crate) fn store_da_info(&mut self, out: &mut Vec<u8>) {
        let remaining = self.da_lockout_remaining();
        let da_state = if remaining != 0 {
            da::STATE_ACTIVE
        } else {
            da::STATE_INACTIVE
        };

        if self.state.permanent_flags.disable_full_da_logic_info {
            out.put_u16(structure_tag::DA_INFO_LIMITED);
            out.put_u8(da_state);
            store_da_action(out);
            out.put_sized(&[]);
            return;
        }

        out.put_u16(structure_tag::DA_INFO);
        out.put_u8(da_state);
        out.put_u16(self.state.stclear_data.auth_fail_count.min(u16::MAX as u32) as u16);
        out.put_u16(LOCKOUT_THRESHOLD as u16);
        store_da_action(out);
        out.put_u32(remaining.min(u32::MAX as u64) as u32);
        out.put_sized(&[]);
    }
}

fn store_da_action(out: &mut Vec<u8>) {
    out.put_u16(structure_tag::DA_ACTION_TYPE);
    out.put_u32(da::ACTION_TIMEOUT);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpm::tests::started_tpm;

    #[test]
    fn tag_checks() {
        assert!(check_request_tag0(tag::RQU_COMMAND).is_ok());
        assert_eq!(check_request_tag0(tag::RQU_AUTH1_COMMAND), Err(TpmRc::BADTAG));
        assert_eq!(check_request_tag1(tag::RQU_COMMAND), Err(TpmRc::BADTAG));
        assert!(check_request_tag10(tag::RQU_COMMAND).is_ok());
        assert!(check_request_tag10(tag::RQU_AUTH1_COMMAND).is_ok());
        assert_eq!(check_request_tag10(tag::RQU_AUTH2_COMMAND), Err(TpmRc::BADTAG));
    }

    #[test]
    fn disabled_wins_over_deactivated() {
        let mut tpm = started_tpm();
        tpm.state.permanent_flags.disable = true;
        tpm.state.stclear_flags.deactivated = true;
        assert_eq!(
            tpm.check_state(tag::RQU_COMMAND, StateCheck::ALL),
            Err(TpmRc::DISABLED)
        );
        tpm.state.permanent_flags.disable = false;
        assert_eq!(
            tpm.check_state(tag::RQU_COMMAND, StateCheck::ALL),
            Err(TpmRc::DEACTIVATED)
        );
        tpm.state.stclear_flags.deactivated = false;
        assert_eq!(
            tpm.check_state(tag::RQU_COMMAND, StateCheck::ALL),
            Err(TpmRc::NOSRK)
        );
        assert!(tpm
            .check_state(tag::RQU_COMMAND, StateCheck::ALLOW_NO_OWNER)
            .is_ok());
    }

    #[test]
    fn nv_noauth_carve_out() {
        let mut tpm = started_tpm();
        tpm.state.permanent_flags.disable = true;
        let checks = StateCheck::ENABLED | StateCheck::NV_NOAUTH;
        assert!(tpm.check_state(tag::RQU_COMMAND, checks).is_ok());
        tpm.state.permanent_flags.nv_locked = true;
        assert_eq!(tpm.check_state(tag::RQU_COMMAND, checks), Err(TpmRc::DISABLED));
    }

    #[test]
    fn failure_mode_before_postinit() {
        let mut tpm = started_tpm();
        tpm.state.stany_flags.post_initialise = true;
        assert_eq!(
            tpm.check_state(tag::RQU_COMMAND, StateCheck::NONE),
            Err(TpmRc::INVALID_POSTINIT)
        );
        tpm.state.test_state = TestState::Failure;
        assert_eq!(
            tpm.check_state(tag::RQU_COMMAND, StateCheck::NOT_SHUTDOWN),
            Err(TpmRc::FAILEDSELFTEST)
        );
    }

    #[test]
    fn lockout_only_for_authorized_commands() {
        let mut tpm = started_tpm();
        for _ in 0..LOCKOUT_THRESHOLD {
            tpm.da_register_failure();
        }
        assert_eq!(
            tpm.check_state(tag::RQU_AUTH1_COMMAND, StateCheck::NO_LOCKOUT),
            Err(TpmRc::DEFEND_LOCK_RUNNING)
        );
        assert!(tpm.check_state(tag::RQU_COMMAND, StateCheck::NO_LOCKOUT).is_ok());

        tpm.da_reset();
        assert!(tpm
            .check_state(tag::RQU_AUTH1_COMMAND, StateCheck::NO_LOCKOUT)
            .is_ok());
    }

    #[test]
    fn lockout_doubles() {
        assert_eq!(lockout_seconds(4), 0);
        assert_eq!(lockout_seconds(5), 1);
        assert_eq!(lockout_seconds(7), 4);
        assert_eq!(lockout_seconds(100), 1 << 16);
    }
}
