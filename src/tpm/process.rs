//! The command pipeline: header parse, preprocessing, dispatch and response
//! finalization.

use crate::codec::parse_command_header;
use crate::codec::Reader;
use crate::codec::ResponseBuffer;
use crate::codec::WriteBe;
use crate::constants::ord;
use crate::constants::tag;
use crate::crypto::Digest;
use crate::error::CmdError;
use crate::error::CmdResult;
use crate::error::Error;
use crate::ordinal::get_process_function;
use crate::ordinal::Handler;
use crate::rc::TpmRc;

use super::digest::get_out_param_digest;
use super::digest::InParamDigest;
use super::session::auth_params_get;
use super::session::AuthParams;
use super::state::TestState;
use super::Tpm12;

/// Ordinals allowed to run before the self test has completed.
const LIMITED_MODE_ORDINALS: &[u32] = &[
    ord::STARTUP,
    ord::SHA1_START,
    ord::SHA1_UPDATE,
    ord::SHA1_COMPLETE,
    ord::SHA1_COMPLETE_EXTEND,
    ord::EXTEND,
    ord::CONTINUE_SELF_TEST,
    ord::GET_CAPABILITY,
    ord::SELF_TEST_FULL,
    ord::GET_TEST_RESULT,
    ord::TSC_PHYSICAL_PRESENCE,
    ord::TSC_RESET_ESTABLISHMENT_BIT,
];

/// The transport session a wrapped command is executing under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransportCtx {
    pub handle: u32,
    pub encrypt: bool,
}

/// A parsed command header, and a cursor over everything that follows it.
pub(crate) struct Command<'a> {
    pub tag: u16,
    pub ordinal: u32,
    pub params: Reader<'a>,
    pub transport: Option<TransportCtx>,
}

impl<'a> Command<'a> {
    /// The "above the line" parameters consumed since `start`.
    pub fn consumed_since(&self, start: usize) -> &'a [u8] {
        self.params.span(start, self.params.position())
    }
}

/// Which table the authorization handle of an [`Exchange`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SessionKind {
    Auth,
    Transport,
}

/// Per-command bookkeeping shared between a handler and the finalization
/// phase.
#[derive(Debug)]
pub(crate) struct Exchange {
    pub tag: u16,
    pub ordinal: u32,
    pub in_digest: InParamDigest,
    pub session_kind: SessionKind,
    /// Set as soon as a handle has been parsed, even if the rest of the
    /// authorization block is not
    pub auth_handle: Option<u32>,
    pub auth: Option<AuthParams>,
    /// Secret that keys the response HMAC, known once authorization passed
    pub hmac_key: Option<Digest>,
    /// Overrides the output digest computed from the response parameters
    pub out_digest: Option<Digest>,
    /// Overrides the freshly generated response nonce
    pub nonce_even: Option<Digest>,
    /// Overrides the (input, output) digests handed to the audit log
    pub audit_digests: Option<(Digest, Digest)>,
}

impl Exchange {
    pub fn new(tag: u16, ordinal: u32) -> Exchange {
        Exchange {
            tag,
            ordinal,
            in_digest: InParamDigest::default(),
            session_kind: SessionKind::Auth,
            auth_handle: None,
            auth: None,
            hmac_key: None,
            out_digest: None,
            nonce_even: None,
            audit_digests: None,
        }
    }
}

/// Handler output, split at the point where the output digest starts.
#[derive(Debug, Default)]
pub(crate) struct Reply {
    pub handles: Vec<u8>,
    pub params: Vec<u8>,
}

impl Reply {
    pub fn params(params: Vec<u8>) -> Reply {
        Reply {
            handles: Vec::new(),
            params,
        }
    }
}

impl Tpm12 {
    /// Execute one serialized command, returning the serialized response.
    ///
    /// Protocol failures are reported through the response's return code.
    /// `Err` is only returned when no trustworthy response could be built.
    pub fn process(&mut self, command: &[u8]) -> Result<Vec<u8>, Error> {
        self.process_command(command, None)
    }

    /// Execute a command unwrapped by TPM_ExecuteTransport.
    pub(crate) fn process_wrapped(
        &mut self,
        command: &[u8],
        transport: TransportCtx,
    ) -> Result<Vec<u8>, Error> {
        self.process_command(command, Some(transport))
    }

    #[tracing::instrument(level = "trace", skip(self, command))]
    fn process_command(
        &mut self,
        command: &[u8],
        transport: Option<TransportCtx>,
    ) -> Result<Vec<u8>, Error> {
        let (header, params) = match parse_command_header(command) {
            Ok(parsed) => parsed,
            Err(rc) => {
                tracing::debug!("rejecting command header: {}", rc);
                return self.error_response(rc);
            }
        };
        tracing::debug!(
            "ordinal {:#010x} tag {:#06x} size {}",
            header.ordinal,
            header.tag,
            header.param_size
        );

        match self.preprocess(header.ordinal, transport) {
            Ok(()) => {}
            Err(CmdError::Rc(rc)) => return self.error_response(rc),
            Err(CmdError::Fatal(e)) => return Err(e),
        }

        let handler = get_process_function(header.ordinal, self.config.spec_revision);
        let mut cmd = Command {
            tag: header.tag,
            ordinal: header.ordinal,
            params,
            transport,
        };
        let mut ex = Exchange::new(header.tag, header.ordinal);
        let result = self.dispatch(handler, &mut cmd, &mut ex);
        self.finish(ex, result)
    }

    /// The bare {tag, paramSize, returnCode} response for a command that
    /// never reached its handler.
    fn error_response(&mut self, rc: TpmRc) -> Result<Vec<u8>, Error> {
        if rc == TpmRc::FAIL {
            self.enter_failure_mode();
        }
        ResponseBuffer::store_initial_response(tag::RSP_COMMAND, rc).store_final_response(rc)
    }

    fn preprocess(&mut self, ordinal: u32, transport: Option<TransportCtx>) -> CmdResult<()> {
        if self.state.test_state == TestState::Limited && !LIMITED_MODE_ORDINALS.contains(&ordinal) {
            tracing::debug!("ordinal {:#010x} needs the full self test", ordinal);
            self.continue_self_test()?;
        }

        if ordinal != ord::EXECUTE_TRANSPORT {
            let continues_thread = matches!(
                ordinal,
                ord::SHA1_UPDATE | ord::SHA1_COMPLETE | ord::SHA1_COMPLETE_EXTEND
            ) && self
                .sha1_thread
                .as_ref()
                .map_or(false, |t| t.transport_handle == transport.map(|t| t.handle));
            if !continues_thread && self.sha1_thread.take().is_some() {
                tracing::debug!("SHA-1 thread invalidated by {:#010x}", ordinal);
            }
        }

        if self.state.permanent_data.saved_state.is_some()
            && ordinal != ord::STARTUP
            && ordinal != ord::INIT
        {
            tracing::debug!("discarding saved state");
            self.state.permanent_data.saved_state = None;
            self.nv_commit()?;
        }

        if transport.is_none() {
            let exclusive = self.state.stany_flags.transport_exclusive;
            if exclusive != 0
                && ordinal != ord::EXECUTE_TRANSPORT
                && ordinal != ord::RELEASE_TRANSPORT_SIGNED
            {
                tracing::debug!("{:#010x} preempts exclusive transport {:#010x}", ordinal, exclusive);
                self.transport_terminate(exclusive);
            }

            self.state.stany_flags.locality_modifier = self.state.locality.locality as u32;
        }

        Ok(())
    }

    fn dispatch(&mut self, handler: Handler, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        match handler {
            Handler::Unused => {
                tracing::debug!("ordinal {:#010x} is not implemented", cmd.ordinal);
                Err(TpmRc::BAD_ORDINAL.into())
            }
            Handler::ContinueSelfTest => self.cmd_continue_self_test(cmd, ex),
            Handler::EstablishTransport => self.cmd_establish_transport(cmd, ex),
            Handler::ExecuteTransport => self.cmd_execute_transport(cmd, ex),
            Handler::Extend => self.cmd_extend(cmd, ex),
            Handler::FlushSpecific => self.cmd_flush_specific(cmd, ex),
            Handler::ForceClear => self.cmd_force_clear(cmd, ex),
            Handler::GetAuditDigest => self.cmd_get_audit_digest(cmd, ex),
            Handler::GetCapability => self.cmd_get_capability(cmd, ex),
            Handler::GetCapabilityOwner => self.cmd_get_capability_owner(cmd, ex),
            Handler::GetCapabilitySigned => self.cmd_get_capability_signed(cmd, ex),
            Handler::GetRandom => self.cmd_get_random(cmd, ex),
            Handler::GetTestResult => self.cmd_get_test_result(cmd, ex),
            Handler::GetTicks => self.cmd_get_ticks(cmd, ex),
            Handler::Init => self.cmd_init(cmd, ex),
            Handler::Oiap => self.cmd_oiap(cmd, ex),
            Handler::OwnerSetDisable => self.cmd_owner_set_disable(cmd, ex),
            Handler::PcrRead => self.cmd_pcr_read(cmd, ex),
            Handler::PhysicalDisable => self.cmd_physical_disable(cmd, ex),
            Handler::PhysicalEnable => self.cmd_physical_enable(cmd, ex),
            Handler::PhysicalSetDeactivated => self.cmd_physical_set_deactivated(cmd, ex),
            Handler::SaveState => self.cmd_save_state(cmd, ex),
            Handler::SelfTestFull => self.cmd_self_test_full(cmd, ex),
            Handler::SetCapability => self.cmd_set_capability(cmd, ex),
            Handler::SetOrdinalAuditStatus => self.cmd_set_ordinal_audit_status(cmd, ex),
            Handler::Sha1Complete => self.cmd_sha1_complete(cmd, ex),
            Handler::Sha1CompleteExtend => self.cmd_sha1_complete_extend(cmd, ex),
            Handler::Sha1Start => self.cmd_sha1_start(cmd, ex),
            Handler::Sha1Update => self.cmd_sha1_update(cmd, ex),
            Handler::Startup => self.cmd_startup(cmd, ex),
            Handler::TerminateHandle => self.cmd_terminate_handle(cmd, ex),
            Handler::TscPhysicalPresence => self.cmd_tsc_physical_presence(cmd, ex),
            Handler::TscResetEstablishmentBit => self.cmd_tsc_reset_establishment_bit(cmd, ex),
        }
    }

    /// Digest the parameters consumed since `start`.
    pub(crate) fn digest_inputs(&self, cmd: &Command<'_>, ex: &mut Exchange, start: usize) {
        ex.in_digest =
            self.get_in_param_digest(cmd.tag, cmd.ordinal, cmd.consumed_since(start), cmd.transport);
    }

    /// Parse the trailing authorization block, if the tag announces one, and
    /// make sure nothing follows it.
    pub(crate) fn auth_trailer(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<()> {
        if cmd.tag == tag::RQU_AUTH1_COMMAND {
            auth_params_get(&mut cmd.params, ex)?;
        }
        cmd.params.finish()?;
        Ok(())
    }

    fn emit(&mut self, ex: &Exchange, reply: Reply) -> CmdResult<ResponseBuffer> {
        let mut response = ResponseBuffer::store_initial_response(ex.tag, TpmRc::SUCCESS);
        response.body().put_bytes(&reply.handles);
        response.body().put_bytes(&reply.params);

        let out_digest = match ex.out_digest {
            Some(digest) => digest,
            None => get_out_param_digest(
                ex.in_digest.audit_status,
                ex.in_digest.transport_encrypt,
                ex.tag,
                TpmRc::SUCCESS,
                ex.ordinal,
                &reply.params,
            ),
        };

        if ex.auth.is_some() {
            self.auth_params_set(ex, &out_digest, response.body())?;
        }

        if ex.in_digest.audit_status {
            let (in_digest, out_digest) = ex
                .audit_digests
                .unwrap_or((ex.in_digest.digest, out_digest));
            self.process_audit(ex.in_digest.transport_encrypt, &in_digest, &out_digest, ex.ordinal)?;
        }

        Ok(response)
    }

    fn finish(&mut self, ex: Exchange, result: CmdResult<Reply>) -> Result<Vec<u8>, Error> {
        let outcome = result.and_then(|reply| self.emit(&ex, reply));
        let (rc, response) = match outcome {
            Ok(response) => (TpmRc::SUCCESS, response),
            Err(CmdError::Rc(rc)) => (rc, ResponseBuffer::store_initial_response(ex.tag, rc)),
            Err(CmdError::Fatal(e)) => {
                tracing::error!("ordinal {:#010x} failed: {}", ex.ordinal, e);
                return Err(e);
            }
        };

        if let Some(handle) = ex.auth_handle {
            let continue_session = ex.auth.as_ref().map_or(false, |a| a.continue_auth_session);
            if (!rc.is_success() && rc != TpmRc::DEFEND_LOCK_RUNNING) || !continue_session {
                match ex.session_kind {
                    SessionKind::Auth => self.terminate_auth_session(handle),
                    SessionKind::Transport => self.transport_terminate(handle),
                }
            }
        }

        if rc == TpmRc::FAIL {
            self.enter_failure_mode();
        }
        if !rc.is_success() {
            tracing::debug!("ordinal {:#010x} returned {}", ex.ordinal, rc);
        }
        response.store_final_response(rc)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpm::tests::started_tpm;
    use crate::tpm::tests::FailingNv;

    fn command(tag: u16, ordinal: u32, body: &[u8]) -> Vec<u8> {
        let mut cmd = Vec::new();
        cmd.put_u16(tag);
        cmd.put_u32((10 + body.len()) as u32);
        cmd.put_u32(ordinal);
        cmd.put_bytes(body);
        cmd
    }

    fn rc(rsp: &[u8]) -> TpmRc {
        TpmRc(u32::from_be_bytes([rsp[6], rsp[7], rsp[8], rsp[9]]))
    }

    #[test]
    fn unknown_ordinal() {
        let mut tpm = started_tpm();
        let rsp = tpm
            .process(&command(tag::RQU_COMMAND, ord::TAKE_OWNERSHIP, &[]))
            .unwrap();
        assert_eq!(rsp, vec![0x00, 0xC4, 0, 0, 0, 10, 0, 0, 0, 0x0A]);
    }

    #[test]
    fn truncated_header() {
        let mut tpm = started_tpm();
        let rsp = tpm.process(&[0x00, 0xC1, 0, 0]).unwrap();
        assert_eq!(rc(&rsp), TpmRc::BAD_PARAM_SIZE);
    }

    #[test]
    fn limited_mode_runs_the_self_test() {
        let mut tpm = started_tpm();
        assert_eq!(tpm.state.test_state, TestState::Limited);
        tpm.process(&command(tag::RQU_COMMAND, ord::GET_TEST_RESULT, &[]))
            .unwrap();
        assert_eq!(tpm.state.test_state, TestState::Limited);
        tpm.process(&command(tag::RQU_COMMAND, ord::PCR_READ, &[0, 0, 0, 0]))
            .unwrap();
        assert_eq!(tpm.state.test_state, TestState::Full);
    }

    #[test]
    fn saved_state_is_discarded() {
        let mut tpm = started_tpm();
        let rsp = tpm
            .process(&command(tag::RQU_COMMAND, ord::SAVE_STATE, &[]))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert!(tpm.state.permanent_data.saved_state.is_some());
        tpm.process(&command(tag::RQU_COMMAND, ord::GET_TEST_RESULT, &[]))
            .unwrap();
        assert!(tpm.state.permanent_data.saved_state.is_none());
    }

    #[test]
    fn locality_is_latched() {
        let mut tpm = started_tpm();
        tpm.set_locality(3);
        tpm.process(&command(tag::RQU_COMMAND, ord::GET_TEST_RESULT, &[]))
            .unwrap();
        assert_eq!(tpm.locality(), 3);
    }

    #[test]
    fn tpm_fail_enters_failure_mode() {
        let (mut tpm, fail) = FailingNv::started_tpm();
        tpm.process(&command(tag::RQU_COMMAND, ord::SAVE_STATE, &[]))
            .unwrap();
        fail.set(true);
        let rsp = tpm
            .process(&command(tag::RQU_COMMAND, ord::GET_TEST_RESULT, &[]))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::FAIL);
        assert!(tpm.in_failure_mode());
    }
}
