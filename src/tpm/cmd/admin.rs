//! Opt-in and clear: the physical presence commands, TPM_OwnerSetDisable,
//! TPM_ForceClear and the TSC ordinals.

use crate::constants::loc;
use crate::constants::physical_presence as pp;
use crate::error::CmdResult;
use crate::ordinal;
use crate::rc::TpmRc;

use crate::tpm::check::check_request_tag0;
use crate::tpm::check::check_request_tag1;
use crate::tpm::check::StateCheck;
use crate::tpm::process::Command;
use crate::tpm::process::Exchange;
use crate::tpm::process::Reply;
use crate::tpm::session::Entity;
use crate::tpm::Tpm12;

const LIFETIME_BITS: u16 =
    pp::LIFETIME_LOCK | pp::HW_ENABLE | pp::CMD_ENABLE | pp::HW_DISABLE | pp::CMD_DISABLE;
const PRESENCE_BITS: u16 = pp::PRESENT | pp::NOTPRESENT | pp::LOCK;

impl Tpm12 {
    fn require_physical_presence(&mut self) -> Result<(), TpmRc> {
        if !self.physical_presence() {
            tracing::debug!("physical presence not asserted");
            return Err(TpmRc::BAD_PRESENCE);
        }
        Ok(())
    }

    /// Set the permanent disable flag, committing only when it changes.
    fn set_disable(&mut self, disable: bool) -> CmdResult<()> {
        if self.state.permanent_flags.disable != disable {
            self.state.permanent_flags.disable = disable;
            tracing::info!("TPM {}", if disable { "disabled" } else { "enabled" });
            self.nv_commit()?;
        }
        Ok(())
    }

    fn physical_enable_common(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
        checks: StateCheck,
    ) -> CmdResult<()> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, checks)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;
        self.require_physical_presence()?;
        Ok(())
    }

    pub(crate) fn cmd_physical_enable(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        self.physical_enable_common(cmd, ex, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        self.set_disable(false)?;
        Ok(Reply::default())
    }

    pub(crate) fn cmd_physical_disable(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        self.physical_enable_common(cmd, ex, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        self.set_disable(true)?;
        Ok(Reply::default())
    }

    pub(crate) fn cmd_physical_set_deactivated(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let deactivated = cmd.params.bool()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(
            cmd.tag,
            StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT | StateCheck::ENABLED,
        )?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;
        self.require_physical_presence()?;

        // takes effect at the next TPM_Startup(ST_CLEAR)
        if self.state.permanent_flags.deactivated != deactivated {
            self.state.permanent_flags.deactivated = deactivated;
            self.nv_commit()?;
        }
        Ok(Reply::default())
    }

    pub(crate) fn cmd_owner_set_disable(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let disable = cmd.params.bool()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(
            cmd.tag,
            StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT | StateCheck::OWNER,
        )?;
        check_request_tag1(cmd.tag)?;
        self.auth_trailer(cmd, ex)?;

        let secret = self.owner_secret()?;
        self.auth_check(ex, &secret, Entity::Owner)?;

        self.set_disable(disable)?;
        Ok(Reply::default())
    }

    pub(crate) fn cmd_force_clear(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;
        self.require_physical_presence()?;

        if self.state.stclear_flags.disable_force_clear {
            tracing::debug!("TPM_ForceClear is disabled until the next startup");
            return Err(TpmRc::CLEAR_DISABLED.into());
        }

        tracing::info!("clearing the owner");
        let daa_proof = self.nonce_generate()?;
        let permanent_flags = &mut self.state.permanent_flags;
        permanent_flags.disable = true;
        permanent_flags.deactivated = true;
        permanent_flags.read_pubek = true;
        permanent_flags.disable_owner_clear = false;
        permanent_flags.operator = false;

        let permanent_data = &mut self.state.permanent_data;
        permanent_data.owner_auth = None;
        permanent_data.restrict_delegate = 0;
        permanent_data.daa_proof = daa_proof;
        permanent_data.ordinal_audit_status = ordinal::entries()
            .filter(|e| e.audit_default)
            .map(|e| e.ordinal)
            .collect();

        self.keys.clear();
        self.nv_commit()?;
        Ok(Reply::default())
    }

    pub(crate) fn cmd_tsc_physical_presence(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let presence = cmd.params.u16()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NONE)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        if presence & pp::MASK != 0 {
            tracing::debug!("reserved physical presence bits {:#06x}", presence);
            return Err(TpmRc::BAD_PARAMETER.into());
        }

        if presence & LIFETIME_BITS != 0 {
            if presence & PRESENCE_BITS != 0 {
                tracing::debug!("lifetime and presence bits mixed");
                return Err(TpmRc::BAD_PARAMETER.into());
            }
            self.physical_presence_lifetime(presence)?;
        } else {
            self.physical_presence_assert(presence)?;
        }
        Ok(Reply::default())
    }

    fn physical_presence_lifetime(&mut self, presence: u16) -> CmdResult<()> {
        let flags = &mut self.state.permanent_flags;
        if flags.physical_presence_lifetime_lock {
            tracing::debug!("physical presence lifetime lock is set");
            return Err(TpmRc::BAD_PARAMETER.into());
        }
        if (presence & pp::HW_ENABLE != 0 && presence & pp::HW_DISABLE != 0)
            || (presence & pp::CMD_ENABLE != 0 && presence & pp::CMD_DISABLE != 0)
        {
            return Err(TpmRc::BAD_PARAMETER.into());
        }

        if presence & pp::HW_ENABLE != 0 {
            flags.physical_presence_hw_enable = true;
        }
        if presence & pp::HW_DISABLE != 0 {
            flags.physical_presence_hw_enable = false;
        }
        if presence & pp::CMD_ENABLE != 0 {
            flags.physical_presence_cmd_enable = true;
        }
        if presence & pp::CMD_DISABLE != 0 {
            flags.physical_presence_cmd_enable = false;
        }
        if presence & pp::LIFETIME_LOCK != 0 {
            flags.physical_presence_lifetime_lock = true;
        }
        self.nv_commit()
    }

    fn physical_presence_assert(&mut self, presence: u16) -> CmdResult<()> {
        if !self.state.permanent_flags.physical_presence_cmd_enable {
            tracing::debug!("command physical presence is not enabled");
            return Err(TpmRc::BAD_PARAMETER.into());
        }
        if presence & pp::PRESENT != 0 && presence & pp::NOTPRESENT != 0 {
            return Err(TpmRc::BAD_PARAMETER.into());
        }

        let flags = &mut self.state.stclear_flags;
        if flags.physical_presence_lock {
            tracing::debug!("physical presence is locked");
            return Err(TpmRc::BAD_PARAMETER.into());
        }
        if presence & pp::LOCK != 0 {
            if presence & pp::PRESENT != 0 {
                return Err(TpmRc::BAD_PARAMETER.into());
            }
            flags.physical_presence = false;
            flags.physical_presence_lock = true;
            return Ok(());
        }
        if presence & pp::PRESENT != 0 {
            flags.physical_presence = true;
        }
        if presence & pp::NOTPRESENT != 0 {
            flags.physical_presence = false;
        }
        Ok(())
    }

    pub(crate) fn cmd_tsc_reset_establishment_bit(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NONE)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;
        self.check_locality(loc::THREE | loc::FOUR)?;

        if self.state.permanent_flags.tpm_established {
            self.state.permanent_flags.tpm_established = false;
            self.nv_commit()?;
        }
        Ok(Reply::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::WriteBe;
    use crate::constants::ord;
    use crate::constants::tag;
    use crate::tpm::tests::owner_command;
    use crate::tpm::tests::started_tpm;

    fn run(tpm: &mut Tpm12, ordinal: u32, body: &[u8]) -> Vec<u8> {
        let mut cmd = Vec::new();
        cmd.put_u16(tag::RQU_COMMAND);
        cmd.put_u32((10 + body.len()) as u32);
        cmd.put_u32(ordinal);
        cmd.put_bytes(body);
        tpm.process(&cmd).unwrap()
    }

    fn rc(rsp: &[u8]) -> TpmRc {
        TpmRc(u32::from_be_bytes([rsp[6], rsp[7], rsp[8], rsp[9]]))
    }

    fn assert_presence(tpm: &mut Tpm12) {
        let rsp = run(tpm, ord::TSC_PHYSICAL_PRESENCE, &pp::PRESENT.to_be_bytes());
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
    }

    #[test]
    fn enable_needs_presence() {
        let mut tpm = started_tpm();
        assert_eq!(rc(&run(&mut tpm, ord::PHYSICAL_DISABLE, &[])), TpmRc::BAD_PRESENCE);

        assert_presence(&mut tpm);
        assert_eq!(rc(&run(&mut tpm, ord::PHYSICAL_DISABLE, &[])), TpmRc::SUCCESS);
        assert!(tpm.state.permanent_flags.disable);
        assert_eq!(rc(&run(&mut tpm, ord::PHYSICAL_ENABLE, &[])), TpmRc::SUCCESS);
        assert!(!tpm.state.permanent_flags.disable);
    }

    #[test]
    fn set_deactivated_needs_enabled_tpm() {
        let mut tpm = started_tpm();
        assert_presence(&mut tpm);
        assert_eq!(
            rc(&run(&mut tpm, ord::PHYSICAL_SET_DEACTIVATED, &[1])),
            TpmRc::SUCCESS
        );
        assert!(tpm.state.permanent_flags.deactivated);
        assert!(!tpm.state.stclear_flags.deactivated);

        tpm.state.permanent_flags.disable = true;
        assert_eq!(
            rc(&run(&mut tpm, ord::PHYSICAL_SET_DEACTIVATED, &[0])),
            TpmRc::DISABLED
        );
    }

    #[test]
    fn presence_lock() {
        let mut tpm = started_tpm();
        let both = pp::PRESENT | pp::NOTPRESENT;
        assert_eq!(
            rc(&run(&mut tpm, ord::TSC_PHYSICAL_PRESENCE, &both.to_be_bytes())),
            TpmRc::BAD_PARAMETER
        );

        assert_presence(&mut tpm);
        let rsp = run(&mut tpm, ord::TSC_PHYSICAL_PRESENCE, &pp::LOCK.to_be_bytes());
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert!(!tpm.state.stclear_flags.physical_presence);
        let rsp = run(&mut tpm, ord::TSC_PHYSICAL_PRESENCE, &pp::PRESENT.to_be_bytes());
        assert_eq!(rc(&rsp), TpmRc::BAD_PARAMETER);
    }

    #[test]
    fn lifetime_bits() {
        let mut tpm = started_tpm();
        let reserved = 0x0001u16;
        assert_eq!(
            rc(&run(&mut tpm, ord::TSC_PHYSICAL_PRESENCE, &reserved.to_be_bytes())),
            TpmRc::BAD_PARAMETER
        );

        let mixed = pp::HW_ENABLE | pp::PRESENT;
        assert_eq!(
            rc(&run(&mut tpm, ord::TSC_PHYSICAL_PRESENCE, &mixed.to_be_bytes())),
            TpmRc::BAD_PARAMETER
        );

        let lock = pp::HW_ENABLE | pp::LIFETIME_LOCK;
        assert_eq!(
            rc(&run(&mut tpm, ord::TSC_PHYSICAL_PRESENCE, &lock.to_be_bytes())),
            TpmRc::SUCCESS
        );
        assert!(tpm.state.permanent_flags.physical_presence_hw_enable);
        assert!(tpm.state.permanent_flags.physical_presence_lifetime_lock);
        assert_eq!(
            rc(&run(&mut tpm, ord::TSC_PHYSICAL_PRESENCE, &pp::CMD_DISABLE.to_be_bytes())),
            TpmRc::BAD_PARAMETER
        );
    }

    #[test]
    fn force_clear_removes_the_owner() {
        let mut tpm = started_tpm();
        tpm.install_owner([1; 20]).unwrap();
        tpm.state.permanent_data.ordinal_audit_status.insert(ord::GET_RANDOM);
        let daa_proof = tpm.state.permanent_data.daa_proof;

        assert_eq!(rc(&run(&mut tpm, ord::FORCE_CLEAR, &[])), TpmRc::BAD_PRESENCE);
        assert_presence(&mut tpm);
        tpm.state.stclear_flags.disable_force_clear = true;
        assert_eq!(rc(&run(&mut tpm, ord::FORCE_CLEAR, &[])), TpmRc::CLEAR_DISABLED);
        tpm.state.stclear_flags.disable_force_clear = false;

        assert_eq!(rc(&run(&mut tpm, ord::FORCE_CLEAR, &[])), TpmRc::SUCCESS);
        assert!(!tpm.state.permanent_data.owner_installed());
        assert!(tpm.state.permanent_flags.disable);
        assert!(tpm.state.permanent_flags.deactivated);
        assert_ne!(tpm.state.permanent_data.daa_proof, daa_proof);
        assert!(!tpm
            .state
            .permanent_data
            .ordinal_audit_status
            .contains(&ord::GET_RANDOM));
    }

    #[test]
    fn owner_set_disable() {
        let mut tpm = started_tpm();
        let owner = [0x11; 20];
        tpm.install_owner(owner).unwrap();

        let rsp = owner_command(&mut tpm, &[0x12; 20], ord::OWNER_SET_DISABLE, &[1]);
        assert_eq!(rc(&rsp), TpmRc::AUTHFAIL);
        assert!(!tpm.state.permanent_flags.disable);

        let rsp = owner_command(&mut tpm, &owner, ord::OWNER_SET_DISABLE, &[1]);
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert_eq!(&rsp[..2], &[0x00, 0xC5]);
        assert_eq!(rsp.len(), 10 + 41);
        assert!(tpm.state.permanent_flags.disable);
    }

    #[test]
    fn establishment_bit_needs_locality_three() {
        let mut tpm = started_tpm();
        tpm.state.permanent_flags.tpm_established = true;
        assert_eq!(
            rc(&run(&mut tpm, ord::TSC_RESET_ESTABLISHMENT_BIT, &[])),
            TpmRc::BAD_LOCALITY
        );
        tpm.set_locality(3);
        assert_eq!(
            rc(&run(&mut tpm, ord::TSC_RESET_ESTABLISHMENT_BIT, &[])),
            TpmRc::SUCCESS
        );
        assert!(!tpm.state.permanent_flags.tpm_established);
    }
}
