//! TPM_Startup, TPM_SaveState, TPM_Init and the self test commands.

use crate::codec::WriteBe;
use crate::constants::st;
use crate::error::CmdResult;
use crate::rc::TpmRc;

use crate::tpm::check::check_request_tag0;
use crate::tpm::check::StateCheck;
use crate::tpm::process::Command;
use crate::tpm::process::Exchange;
use crate::tpm::process::Reply;
use crate::tpm::state::SavedState;
use crate::tpm::state::StClearData;
use crate::tpm::state::StClearFlags;
use crate::tpm::state::TestState;
use crate::tpm::Tpm12;

impl Tpm12 {
    pub(crate) fn cmd_startup(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let startup_type = cmd.params.u16()?;
        self.digest_inputs(cmd, ex, start);

        if !self.state.stany_flags.post_initialise {
            tracing::debug!("TPM_Startup is only allowed once after TPM_Init");
            return Err(TpmRc::INVALID_POSTINIT.into());
        }
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        match startup_type {
            st::CLEAR => self.startup_clear(false)?,
            st::DEACTIVATED => self.startup_clear(true)?,
            st::STATE => self.startup_state()?,
            other => {
                tracing::debug!("unknown startup type {:#06x}", other);
                return Err(TpmRc::BAD_PARAMETER.into());
            }
        }

        self.state.stany_flags.post_initialise = false;
        tracing::info!("TPM started with type {:#06x}", startup_type);
        Ok(Reply::default())
    }

    fn startup_clear(&mut self, deactivated: bool) -> CmdResult<()> {
        self.state.stclear_flags = StClearFlags {
            deactivated: deactivated || self.state.permanent_flags.deactivated,
            ..StClearFlags::default()
        };
        self.state.stclear_data = StClearData::new();
        self.state.auth_sessions.clear();
        self.state.transport_sessions.clear();
        self.keys.retain(|key| key.owner_evict);
        self.sha1_thread = None;
        self.tick_session_reset()?;

        if self.state.permanent_data.saved_state.take().is_some() {
            self.nv_commit()?;
        }
        Ok(())
    }

    fn startup_state(&mut self) -> CmdResult<()> {
        let saved = self.state.permanent_data.saved_state.take().ok_or_else(|| {
            tracing::error!("TPM_Startup(ST_STATE) without saved state");
            TpmRc::FAIL
        })?;
        let SavedState {
            stclear_flags,
            stclear_data,
            auth_sessions,
            transport_sessions,
        } = saved;

        self.state.stclear_flags = stclear_flags;
        self.state.stclear_data = stclear_data;
        self.state.auth_sessions = auth_sessions;
        self.state.transport_sessions = transport_sessions;
        self.sha1_thread = None;
        self.tick_session_reset()?;
        self.nv_commit()
    }

    pub(crate) fn cmd_save_state(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        self.state.permanent_data.saved_state = Some(SavedState {
            stclear_flags: self.state.stclear_flags.clone(),
            stclear_data: self.state.stclear_data.clone(),
            auth_sessions: self.state.auth_sessions.clone(),
            transport_sessions: self.state.transport_sessions.clone(),
        });
        self.nv_commit()?;
        tracing::debug!("state saved");
        Ok(Reply::default())
    }

    pub(crate) fn cmd_init(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        self.init()?;
        Ok(Reply::default())
    }

    pub(crate) fn cmd_self_test_full(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NONE)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        self.continue_self_test()?;
        Ok(Reply::default())
    }

    pub(crate) fn cmd_continue_self_test(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NONE)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        if self.state.test_state == TestState::Limited {
            self.continue_self_test()?;
        }
        Ok(Reply::default())
    }

    pub(crate) fn cmd_get_test_result(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NONE)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let result = if self.in_failure_mode() {
            TestState::Failure
        } else {
            self.state.test_state
        };
        let mut out = Vec::new();
        out.put_sized(&[result.code()]);
        Ok(Reply::params(out))
    }
}
