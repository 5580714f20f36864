//! TPM_OIAP, TPM_Terminate_Handle and TPM_FlushSpecific.

use crate::codec::WriteBe;
use crate::constants::pid;
use crate::constants::rt;
use crate::error::CmdResult;
use crate::rc::TpmRc;

use crate::tpm::check::check_request_tag0;
use crate::tpm::check::StateCheck;
use crate::tpm::process::Command;
use crate::tpm::process::Exchange;
use crate::tpm::process::Reply;
use crate::tpm::session::AuthSession;
use crate::tpm::Tpm12;

impl Tpm12 {
    pub(crate) fn cmd_oiap(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let nonce_even = self.nonce_generate()?;
        let handle = self
            .state
            .auth_sessions
            .insert(AuthSession {
                protocol_id: pid::OIAP,
                nonce_even,
            })
            .map_err(|rc| {
                tracing::debug!("no free authorization session slot");
                rc
            })?;
        tracing::debug!("opened OIAP session {:#010x}", handle);

        // neither output takes part in the output digest
        let mut handles = Vec::new();
        handles.put_u32(handle);
        handles.put_bytes(&nonce_even);
        Ok(Reply {
            handles,
            params: Vec::new(),
        })
    }

    pub(crate) fn cmd_terminate_handle(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let handle = cmd.params.u32()?;
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        if !self.state.auth_sessions.contains(handle) {
            tracing::debug!("no session with handle {:#010x}", handle);
            return Err(TpmRc::INVALID_AUTHHANDLE.into());
        }
        self.terminate_auth_session(handle);
        Ok(Reply::default())
    }

    pub(crate) fn cmd_flush_specific(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let handle = cmd.params.u32()?;
        let start = cmd.params.position();
        let resource_type = cmd.params.u32()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        match resource_type {
            rt::KEY => {
                let key = self.keys.get(handle).ok_or(TpmRc::INVALID_KEYHANDLE)?;
                if key.owner_evict {
                    tracing::debug!("key {:#010x} is owner evict", handle);
                    return Err(TpmRc::KEY_OWNER_CONTROL.into());
                }
                self.keys.remove(handle);
                tracing::debug!("flushed key {:#010x}", handle);
            }
            rt::AUTH => {
                if !self.state.auth_sessions.contains(handle) {
                    return Err(TpmRc::INVALID_AUTHHANDLE.into());
                }
                self.terminate_auth_session(handle);
            }
            rt::TRANS => {
                if !self.state.transport_sessions.contains(handle) {
                    return Err(TpmRc::INVALID_AUTHHANDLE.into());
                }
                self.transport_terminate(handle);
            }
            other => {
                tracing::debug!("cannot flush resource type {:#x}", other);
                return Err(TpmRc::INVALID_RESOURCE.into());
            }
        }
        Ok(Reply::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::limits::MIN_AUTH_SESSIONS;
    use crate::constants::ord;
    use crate::constants::tag;
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

    fn oiap(tpm: &mut Tpm12) -> u32 {
        let rsp = run(tpm, ord::OIAP, &[]);
        assert_eq!(rsp.len(), 10 + 4 + 20);
        let handle = u32::from_be_bytes([rsp[10], rsp[11], rsp[12], rsp[13]]);
        assert_eq!(
            &tpm.state.auth_sessions.get(handle).unwrap().nonce_even[..],
            &rsp[14..34]
        );
        handle
    }

    #[test]
    fn oiap_then_terminate() {
        let mut tpm = started_tpm();
        let handle = oiap(&mut tpm);
        assert!(tpm.state.auth_sessions.contains(handle));

        let rsp = run(&mut tpm, ord::TERMINATE_HANDLE, &handle.to_be_bytes());
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert!(!tpm.state.auth_sessions.contains(handle));

        let rsp = run(&mut tpm, ord::TERMINATE_HANDLE, &handle.to_be_bytes());
        assert_eq!(rc(&rsp), TpmRc::INVALID_AUTHHANDLE);
    }

    #[test]
    fn session_table_fills_up() {
        let mut tpm = started_tpm();
        for _ in 0..MIN_AUTH_SESSIONS {
            oiap(&mut tpm);
        }
        assert_eq!(rc(&run(&mut tpm, ord::OIAP, &[])), TpmRc::RESOURCES);
    }

    #[test]
    fn flush_specific_by_type() {
        let mut tpm = started_tpm();
        let handle = oiap(&mut tpm);

        let mut body = handle.to_be_bytes().to_vec();
        body.extend_from_slice(&rt::KEY.to_be_bytes());
        assert_eq!(rc(&run(&mut tpm, ord::FLUSH_SPECIFIC, &body)), TpmRc::INVALID_KEYHANDLE);

        let mut body = handle.to_be_bytes().to_vec();
        body.extend_from_slice(&rt::COUNTER.to_be_bytes());
        assert_eq!(rc(&run(&mut tpm, ord::FLUSH_SPECIFIC, &body)), TpmRc::INVALID_RESOURCE);

        let mut body = handle.to_be_bytes().to_vec();
        body.extend_from_slice(&rt::AUTH.to_be_bytes());
        assert_eq!(rc(&run(&mut tpm, ord::FLUSH_SPECIFIC, &body)), TpmRc::SUCCESS);
        assert!(!tpm.state.auth_sessions.contains(handle));

        let mut body = 0x0300_0001u32.to_be_bytes().to_vec();
        body.extend_from_slice(&rt::TRANS.to_be_bytes());
        assert_eq!(rc(&run(&mut tpm, ord::FLUSH_SPECIFIC, &body)), TpmRc::INVALID_AUTHHANDLE);
    }
}
