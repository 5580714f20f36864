//! Authorization sessions and the authorization block protocol.
//!
//! Command side: `authHandle || nonceOdd || continueAuthSession || authData`,
//! where `authData = HMAC(secret, inParamDigest || nonceEven || nonceOdd ||
//! continueAuthSession)`.
//!
//! Response side: `nonceEven || continueAuthSession || resAuth`, with
//! `resAuth` keyed the same way over the output digest and a freshly rolled
//! `nonceEven`.

use serde::Deserialize;
use serde::Serialize;

use crate::codec::Reader;
use crate::codec::WriteBe;
use crate::constants::limits::MIN_AUTH_SESSIONS;
use crate::constants::pid;
use crate::crypto::digest_eq;
use crate::crypto::hmac_sha1;
use crate::crypto::Digest;
use crate::error::CmdResult;
use crate::rc::TpmRc;

use super::handles::base;
use super::handles::HandleTable;
use super::process::Exchange;
use super::process::SessionKind;
use super::Tpm12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct AuthSession {
    pub protocol_id: u16,
    pub nonce_even: Digest,
}

pub(crate) type AuthSessions = HandleTable<AuthSession>;

pub(crate) fn new_auth_sessions() -> AuthSessions {
    HandleTable::new(base::AUTH, MIN_AUTH_SESSIONS)
}

/// One authorization block as sent by the caller.
#[derive(Debug, Clone)]
pub(crate) struct AuthParams {
    pub handle: u32,
    pub nonce_odd: Digest,
    pub continue_auth_session: bool,
    pub auth: Digest,
}

/// Whose secret keys the HMAC. Owner authorization also clears the
/// dictionary attack counter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Entity {
    Owner,
    Key,
}

/// Parse an authorization block. The handle is recorded in `ex` as soon as
/// it has been read, so that the session is cleaned up even if the rest of
/// the block is malformed.
pub(crate) fn auth_params_get(params: &mut Reader<'_>, ex: &mut Exchange) -> Result<(), TpmRc> {
    let handle = params.u32()?;
    ex.auth_handle = Some(handle);
    let nonce_odd = params.array()?;
    let continue_auth_session = params.bool()?;
    let auth = params.array()?;
    ex.auth = Some(AuthParams {
        handle,
        nonce_odd,
        continue_auth_session,
        auth,
    });
    Ok(())
}

fn auth_hmac(key: &Digest, param_digest: &Digest, nonce_even: &Digest, auth: &AuthParams) -> Digest {
    hmac_sha1(
        key,
        &[
            param_digest,
            nonce_even,
            &auth.nonce_odd,
            &[auth.continue_auth_session as u8],
        ],
    )
}

impl Tpm12 {
    /// Verify the command's HMAC against the OIAP session named by its
    /// authorization block.
    pub(crate) fn auth_check(&mut self, ex: &mut Exchange, secret: &Digest, entity: Entity) -> CmdResult<()> {
        let auth = ex.auth.as_ref().ok_or(TpmRc::AUTHFAIL)?;
        let session = self
            .state
            .auth_sessions
            .get(auth.handle)
            .ok_or_else(|| {
                tracing::debug!("no session with handle {:#010x}", auth.handle);
                TpmRc::INVALID_AUTHHANDLE
            })?;
        if session.protocol_id != pid::OIAP {
            return Err(TpmRc::INVALID_AUTHHANDLE.into());
        }

        let expected = auth_hmac(secret, &ex.in_digest.digest, &session.nonce_even, auth);
        if !digest_eq(&expected, &auth.auth) {
            tracing::debug!("HMAC mismatch for session {:#010x}", auth.handle);
            self.da_register_failure();
            return Err(TpmRc::AUTHFAIL.into());
        }

        if entity == Entity::Owner {
            self.da_reset();
        }
        ex.hmac_key = Some(*secret);
        Ok(())
    }

    /// Append the response authorization block, rolling the session's
    /// nonceEven.
    pub(crate) fn auth_params_set(
        &mut self,
        ex: &Exchange,
        out_digest: &Digest,
        out: &mut Vec<u8>,
    ) -> CmdResult<()> {
        let auth = ex.auth.as_ref().ok_or(TpmRc::FAIL)?;
        let key = ex.hmac_key.ok_or(TpmRc::FAIL)?;

        let nonce_even = match ex.nonce_even {
            Some(nonce) => nonce,
            None => self.nonce_generate()?,
        };

        match ex.session_kind {
            SessionKind::Auth => {
                let session = self
                    .state
                    .auth_sessions
                    .get_mut(auth.handle)
                    .ok_or(TpmRc::INVALID_AUTHHANDLE)?;
                session.nonce_even = nonce_even;
            }
            // the wrapped command may have flushed its own transport session
            SessionKind::Transport => {
                if let Some(session) = self.state.transport_sessions.get_mut(auth.handle) {
                    session.nonce_even = nonce_even;
                }
            }
        }

        out.put_bytes(&nonce_even);
        out.put_bool(auth.continue_auth_session);
        out.put_bytes(&auth_hmac(&key, out_digest, &nonce_even, auth));
        Ok(())
    }

    pub(crate) fn terminate_auth_session(&mut self, handle: u32) {
        if self.state.auth_sessions.remove(handle).is_some() {
            tracing::debug!("terminated authorization session {:#010x}", handle);
        }
    }

    pub(crate) fn owner_secret(&self) -> Result<Digest, TpmRc> {
        self.state.permanent_data.owner_auth.ok_or_else(|| {
            tracing::debug!("owner authorization requested but no owner is installed");
            TpmRc::AUTHFAIL
        })
    }
}
