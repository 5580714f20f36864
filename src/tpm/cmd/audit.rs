//! TPM_SetOrdinalAuditStatus and TPM_GetAuditDigest.

use crate::codec::WriteBe;
use crate::constants::limits::BUFFER_MAX;
use crate::constants::structure_tag;
use crate::error::CmdResult;
use crate::ordinal::get_auditable;
use crate::rc::TpmRc;

use crate::tpm::check::check_request_tag0;
use crate::tpm::check::check_request_tag1;
use crate::tpm::check::StateCheck;
use crate::tpm::process::Command;
use crate::tpm::process::Exchange;
use crate::tpm::process::Reply;
use crate::tpm::session::Entity;
use crate::tpm::Tpm12;

/// Ordinals that fit into one GetAuditDigest response, after the header,
/// the counter value, the digest, `more` and the list size.
const MAX_AUDIT_LIST: usize = (BUFFER_MAX - 10 - 10 - 20 - 1 - 4) / 4;

impl Tpm12 {
    pub(crate) fn cmd_set_ordinal_audit_status(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let ordinal_to_audit = cmd.params.u32()?;
        let audit_state = cmd.params.bool()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::ALL)?;
        check_request_tag1(cmd.tag)?;
        self.auth_trailer(cmd, ex)?;

        let secret = self.owner_secret()?;
        self.auth_check(ex, &secret, Entity::Owner)?;

        let audit_status = &mut self.state.permanent_data.ordinal_audit_status;
        if audit_state {
            if !get_auditable(ordinal_to_audit, self.config.spec_revision) {
                tracing::debug!("ordinal {:#010x} cannot be audited", ordinal_to_audit);
                return Err(TpmRc::BAD_PARAMETER.into());
            }
            audit_status.insert(ordinal_to_audit);
        } else {
            audit_status.remove(&ordinal_to_audit);
        }
        tracing::debug!("audit of {:#010x} set to {}", ordinal_to_audit, audit_state);
        self.nv_commit()?;
        Ok(Reply::default())
    }

    pub(crate) fn cmd_get_audit_digest(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let start_ordinal = cmd.params.u32()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::ALLOW_NO_OWNER)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let audited: Vec<u32> = self
            .state
            .permanent_data
            .ordinal_audit_status
            .range(start_ordinal..)
            .copied()
            .collect();
        let more = audited.len() > MAX_AUDIT_LIST;

        let mut out = Vec::new();
        out.put_u16(structure_tag::COUNTER_VALUE);
        out.put_bytes(&[0; 4]);
        out.put_u32(self.state.permanent_data.audit_monotonic_counter);
        out.put_bytes(&self.state.stclear_data.audit_digest);
        out.put_bool(more);

        let mut list = Vec::new();
        for ordinal in audited.iter().take(MAX_AUDIT_LIST) {
            list.put_u32(*ordinal);
        }
        out.put_sized(&list);
        Ok(Reply::params(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ord;
    use crate::constants::tag;
    use crate::crypto::sha1;
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

    fn audit_params(ordinal: u32, on: bool) -> Vec<u8> {
        let mut params = ordinal.to_be_bytes().to_vec();
        params.push(on as u8);
        params
    }

    #[test]
    fn enable_and_disable_audit() {
        let mut tpm = started_tpm();
        let owner = [3; 20];
        tpm.install_owner(owner).unwrap();

        let rsp = owner_command(
            &mut tpm,
            &owner,
            ord::SET_ORDINAL_AUDIT_STATUS,
            &audit_params(ord::GET_RANDOM, true),
        );
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert!(tpm.state.permanent_data.ordinal_audit_status.contains(&ord::GET_RANDOM));

        let rsp = owner_command(
            &mut tpm,
            &owner,
            ord::SET_ORDINAL_AUDIT_STATUS,
            &audit_params(ord::GET_RANDOM, false),
        );
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert!(!tpm.state.permanent_data.ordinal_audit_status.contains(&ord::GET_RANDOM));
    }

    #[test]
    fn unimplemented_ordinals_cannot_be_audited() {
        let mut tpm = started_tpm();
        let owner = [3; 20];
        tpm.install_owner(owner).unwrap();
        let rsp = owner_command(
            &mut tpm,
            &owner,
            ord::SET_ORDINAL_AUDIT_STATUS,
            &audit_params(ord::TAKE_OWNERSHIP, true),
        );
        assert_eq!(rc(&rsp), TpmRc::BAD_PARAMETER);
    }

    #[test]
    fn needs_an_owner() {
        let mut tpm = started_tpm();
        let rsp = owner_command(
            &mut tpm,
            &[0; 20],
            ord::SET_ORDINAL_AUDIT_STATUS,
            &audit_params(ord::GET_RANDOM, true),
        );
        assert_eq!(rc(&rsp), TpmRc::NOSRK);
    }

    #[test]
    fn audit_digest_tracks_audited_commands() {
        let mut tpm = started_tpm();
        tpm.state.permanent_data.ordinal_audit_status.insert(ord::PCR_READ);

        let rsp = run(&mut tpm, ord::PCR_READ, &0u32.to_be_bytes());
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);

        let in_digest = sha1(&[&ord::PCR_READ.to_be_bytes(), &0u32.to_be_bytes()]);
        let out_digest = sha1(&[&0u32.to_be_bytes(), &ord::PCR_READ.to_be_bytes(), &[0; 20]]);
        let expected = sha1(&[&sha1(&[&[0; 20], &in_digest]), &out_digest]);

        let rsp = run(&mut tpm, ord::GET_AUDIT_DIGEST, &ord::PCR_READ.to_be_bytes());
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        let body = &rsp[10..];
        assert_eq!(&body[..2], &[0x00, 0x0E]);
        assert_eq!(&body[6..10], &1u32.to_be_bytes());
        assert_eq!(&body[10..30], &expected);
        assert_eq!(body[30], 0);

        let list_len = u32::from_be_bytes([body[31], body[32], body[33], body[34]]) as usize;
        assert_eq!(body.len(), 35 + list_len);
        let list: Vec<u32> = body[35..]
            .chunks(4)
            .map(|c| u32::from_be_bytes([c[0], c[1], c[2], c[3]]))
            .collect();
        assert_eq!(list[0], ord::PCR_READ);
        assert!(list.iter().all(|o| *o >= ord::PCR_READ));
    }
}
