//! TPM_EstablishTransport and TPM_ExecuteTransport.

use crate::codec::Reader;
use crate::codec::WriteBe;
use crate::constants::auth_usage;
use crate::constants::key_usage;
use crate::constants::kh;
use crate::constants::rt;
use crate::constants::structure_tag;
use crate::constants::tag;
use crate::constants::transport;
use crate::crypto::digest_eq;
use crate::crypto::hmac_sha1;
use crate::crypto::sha1;
use crate::crypto::Digest;
use crate::error::CmdResult;
use crate::ordinal::parse_wrapped_cmd;
use crate::ordinal::parse_wrapped_rsp;
use crate::ordinal::WrappedCmdLayout;
use crate::ordinal::KEY_HANDLES_VARIABLE;
use crate::rc::TpmRc;

use crate::tpm::check::check_request_tag1;
use crate::tpm::check::check_request_tag10;
use crate::tpm::check::StateCheck;
use crate::tpm::digest::InParamDigest;
use crate::tpm::process::Command;
use crate::tpm::process::Exchange;
use crate::tpm::process::Reply;
use crate::tpm::process::SessionKind;
use crate::tpm::process::TransportCtx;
use crate::tpm::session::Entity;
use crate::tpm::transport::check_enc_scheme;
use crate::tpm::transport::TransportPublic;
use crate::tpm::transport::TransportSession;
use crate::tpm::Tpm12;

/// Key handles of a decrypted wrapped command, in command order.
fn wrapped_key_handles(layout: &WrappedCmdLayout, command: &[u8]) -> Result<Vec<u32>, TpmRc> {
    let read_u32 = |offset: usize| -> Result<u32, TpmRc> {
        let mut reader = Reader::new(command.get(offset..).unwrap_or(&[]));
        reader.u32()
    };

    if layout.key_handles == KEY_HANDLES_VARIABLE {
        // the resource type directly follows the handle
        let handle_offset = layout.key_handle_offsets.first().copied().ok_or(TpmRc::FAIL)?;
        if read_u32(handle_offset + 4)? != rt::KEY {
            return Ok(Vec::new());
        }
        return Ok(vec![read_u32(handle_offset)?]);
    }

    layout
        .key_handle_offsets
        .iter()
        .map(|offset| read_u32(*offset))
        .collect()
}

impl Tpm12 {
    /// `pubKeyHash` of a TPM_TRANSPORT_LOG_IN entry.
    fn wrapped_pub_key_hash(&self, handles: &[u32]) -> Result<Digest, TpmRc> {
        let mut digests = Vec::with_capacity(handles.len());
        for handle in handles {
            let key = self.keys.get(*handle).ok_or_else(|| {
                tracing::debug!("wrapped command names unloaded key {:#010x}", handle);
                TpmRc::INVALID_KEYHANDLE
            })?;
            digests.push(key.pubkey_digest);
        }
        Ok(match digests.as_slice() {
            [] => [0; 20],
            [k2] => sha1(&[k2]),
            [k2, k3, ..] => sha1(&[k2, k3]),
        })
    }

    /// The session secret `A1`, decrypted with the key at `enc_handle`.
    fn transport_secret_from_key(
        &mut self,
        cmd: &Command<'_>,
        ex: &mut Exchange,
        enc_handle: u32,
        secret: &[u8],
    ) -> CmdResult<Digest> {
        let key = self.keys.get(enc_handle).ok_or_else(|| {
            tracing::debug!("no key with handle {:#010x}", enc_handle);
            TpmRc::INVALID_KEYHANDLE
        })?;
        if !matches!(key.key_usage, key_usage::STORAGE | key_usage::LEGACY) {
            tracing::debug!("key usage {:#06x} cannot wrap a transport secret", key.key_usage);
            return Err(TpmRc::INVALID_KEYUSAGE.into());
        }
        let usage_auth = key.usage_auth;
        if cmd.tag != tag::RQU_AUTH1_COMMAND {
            if key.auth_data_usage != auth_usage::NEVER {
                tracing::debug!("key {:#010x} requires authorization", enc_handle);
                return Err(TpmRc::AUTHFAIL.into());
            }
        } else {
            self.auth_check(ex, &usage_auth, Entity::Key)?;
        }

        let key = self.keys.get_mut(enc_handle).ok_or(TpmRc::INVALID_KEYHANDLE)?;
        let decrypted = key.signer.decrypt_oaep(secret).map_err(|e| {
            tracing::debug!("transport secret did not decrypt: {}", e);
            TpmRc::DECRYPT_ERROR
        })?;

        // TPM_TRANSPORT_AUTH
        let mut auth = Reader::new(&decrypted);
        if auth.u16()? != structure_tag::TRANSPORT_AUTH {
            return Err(TpmRc::INVALID_STRUCTURE.into());
        }
        Ok(auth.array()?)
    }

    pub(crate) fn cmd_establish_transport(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let enc_handle = cmd.params.u32()?;
        let start = cmd.params.position();
        let trans_public = TransportPublic::parse(&mut cmd.params)?;
        let secret = cmd.params.sized()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::ALL)?;
        check_request_tag10(cmd.tag)?;
        self.auth_trailer(cmd, ex)?;

        let encrypt = trans_public.attributes & transport::ENCRYPT != 0;
        let auth_data = if enc_handle == kh::TRANSPORT {
            if cmd.tag != tag::RQU_COMMAND {
                return Err(TpmRc::BADTAG.into());
            }
            if encrypt {
                tracing::debug!("a clear text secret cannot key an encrypting session");
                return Err(TpmRc::BAD_SCHEME.into());
            }
            if secret.len() != 20 {
                tracing::debug!("clear text secret of {} bytes", secret.len());
                return Err(TpmRc::BAD_PARAM_SIZE.into());
            }
            let mut auth_data = [0; 20];
            auth_data.copy_from_slice(secret);
            auth_data
        } else {
            self.transport_secret_from_key(cmd, ex, enc_handle, secret)?
        };

        if encrypt {
            check_enc_scheme(
                trans_public.alg_id,
                trans_public.enc_scheme,
                self.state.permanent_flags.fips,
            )?;
        }

        let nonce_even = self.nonce_generate()?;
        let mut session = TransportSession {
            attributes: trans_public.attributes,
            alg_id: trans_public.alg_id,
            enc_scheme: trans_public.enc_scheme,
            auth_data,
            nonce_even,
            trans_digest: [0; 20],
        };

        let locality = self.state.stany_flags.locality_modifier;
        let mut current_ticks = Vec::new();
        self.store_current_ticks(&mut current_ticks);

        if session.logging() {
            let mut public = Vec::new();
            trans_public.store(&mut public);
            let parameters = sha1(&[
                &cmd.ordinal.to_be_bytes(),
                &public,
                &(secret.len() as u32).to_be_bytes(),
                secret,
            ]);
            session.log_in(&parameters, &[0; 20]);

            let parameters = sha1(&[
                &TpmRc::SUCCESS.0.to_be_bytes(),
                &cmd.ordinal.to_be_bytes(),
                &locality.to_be_bytes(),
                &current_ticks,
                &nonce_even,
            ]);
            session.log_out(&current_ticks, &parameters, locality);
        }

        let exclusive = session.exclusive();
        let trans_handle = self.state.transport_sessions.insert(session)?;
        if exclusive {
            self.state.stany_flags.transport_exclusive = trans_handle;
        }
        tracing::debug!(
            "established transport session {:#010x} with attributes {:#x}",
            trans_handle,
            trans_public.attributes
        );

        let mut handles = Vec::with_capacity(4);
        handles.put_u32(trans_handle);
        let mut params = Vec::with_capacity(4 + current_ticks.len() + 20);
        params.put_u32(locality);
        params.put_bytes(&current_ticks);
        params.put_bytes(&nonce_even);
        Ok(Reply { handles, params })
    }

    pub(crate) fn cmd_execute_transport(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let wrapped_cmd = cmd.params.sized()?;
        // the input digest covers the decrypted command, see below
        let audit_status = self.ordinal_audit_status(cmd.ordinal);
        self.check_state(cmd.tag, StateCheck::ALL)?;
        check_request_tag1(cmd.tag)?;
        ex.session_kind = SessionKind::Transport;
        self.auth_trailer(cmd, ex)?;
        let auth = ex.auth.clone().ok_or(TpmRc::AUTHFAIL)?;
        let trans_handle = auth.handle;

        let exclusive = self.state.stany_flags.transport_exclusive;
        if exclusive != 0 && exclusive != trans_handle {
            tracing::debug!("transport {:#010x} preempts exclusive {:#010x}", trans_handle, exclusive);
            self.transport_terminate(exclusive);
        }

        // Worked on as a copy: the wrapped command may flush the session.
        let mut session = self
            .state
            .transport_sessions
            .get(trans_handle)
            .cloned()
            .ok_or_else(|| {
                tracing::debug!("no transport session with handle {:#010x}", trans_handle);
                TpmRc::INVALID_AUTHHANDLE
            })?;

        let layout = parse_wrapped_cmd(wrapped_cmd)?;
        let data_w = layout.data_w_start..layout.data_w_start + layout.data_w_len;
        let mut command = wrapped_cmd.to_vec();
        if session.encrypt() && !data_w.is_empty() {
            let region = command.get_mut(data_w.clone()).ok_or(TpmRc::FAIL)?;
            session.crypt(&auth.nonce_odd, b"in", region)?;
        }
        let key_handles = wrapped_key_handles(&layout, &command)?;

        let ordw = layout.ordinal.to_be_bytes();
        let h1 = sha1(&[&ordw, &command[data_w]]);
        let in_param_digest = sha1(&[
            &cmd.ordinal.to_be_bytes(),
            &(wrapped_cmd.len() as u32).to_be_bytes(),
            &h1,
        ]);
        ex.in_digest = InParamDigest {
            digest: in_param_digest,
            audit_status,
            transport_encrypt: false,
        };

        let expected = hmac_sha1(
            &session.auth_data,
            &[
                &in_param_digest,
                &session.nonce_even,
                &auth.nonce_odd,
                &[auth.continue_auth_session as u8],
            ],
        );
        if !digest_eq(&expected, &auth.auth) {
            tracing::debug!("HMAC mismatch for transport session {:#010x}", trans_handle);
            return Err(TpmRc::AUTH2FAIL.into());
        }
        ex.hmac_key = Some(session.auth_data);

        if !layout.transport_wrappable {
            tracing::debug!("ordinal {:#010x} cannot be wrapped", layout.ordinal);
            return Err(TpmRc::NO_WRAP_TRANSPORT.into());
        }

        if session.logging() {
            let pub_key_hash = self.wrapped_pub_key_hash(&key_handles)?;
            session.log_in(&h1, &pub_key_hash);
        }

        let ctx = TransportCtx {
            handle: trans_handle,
            encrypt: session.encrypt(),
        };
        let mut response = self.process_wrapped(&command, ctx)?;

        let mut current_ticks = Vec::new();
        let ticks = self.store_current_ticks(&mut current_ticks);
        let locality = self.state.stany_flags.locality_modifier;

        let rsp_layout = parse_wrapped_rsp(layout.ordinal, &response)?;
        let s2 = rsp_layout.data_w_start..rsp_layout.data_w_start + rsp_layout.data_w_len;
        let h2 = sha1(&[
            &rsp_layout.return_code.0.to_be_bytes(),
            &ordw,
            response.get(s2.clone()).ok_or(TpmRc::FAIL)?,
        ]);

        session.nonce_even = self.nonce_generate()?;
        let out_param_digest = sha1(&[
            &TpmRc::SUCCESS.0.to_be_bytes(),
            &cmd.ordinal.to_be_bytes(),
            &ticks.to_be_bytes(),
            &locality.to_be_bytes(),
            &(response.len() as u32).to_be_bytes(),
            &h2,
        ]);

        if session.logging() {
            session.log_out(&current_ticks, &h2, locality);
        }

        if session.encrypt() && !s2.is_empty() {
            let region = response.get_mut(s2).ok_or(TpmRc::FAIL)?;
            session.crypt(&auth.nonce_odd, b"out", region)?;
        }

        ex.nonce_even = Some(session.nonce_even);
        ex.out_digest = Some(out_param_digest);
        ex.audit_digests = Some((h1, h2));
        match self.state.transport_sessions.get_mut(trans_handle) {
            Some(live) => *live = session,
            None => {
                tracing::debug!("wrapped command ended transport {:#010x}", trans_handle);
                if let Some(auth) = ex.auth.as_mut() {
                    auth.continue_auth_session = false;
                }
            }
        }

        let mut params = Vec::with_capacity(8 + 4 + 4 + response.len());
        params.put_u64(ticks);
        params.put_u32(locality);
        params.put_sized(&response);
        Ok(Reply::params(params))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::alg;
    use crate::constants::es;
    use crate::constants::ord;
    use crate::crypto::mgf1;
    use crate::crypto::xor_region;
    use crate::tpm::tests::started_tpm;
    use crate::DynResult;
    use crate::KeySigner;
    use crate::LoadedKey;

    const SECRET: Digest = [0x33; 20];
    const NONCE_ODD: Digest = [0x71; 20];

    fn owned_tpm() -> Tpm12 {
        let mut tpm = started_tpm();
        tpm.install_owner([0x0A; 20]).unwrap();
        tpm
    }

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

    fn public(attributes: u32, alg_id: u32, enc_scheme: u16) -> TransportPublic {
        TransportPublic {
            attributes,
            alg_id,
            enc_scheme,
        }
    }

    fn establish_body(enc_handle: u32, public: TransportPublic, secret: &[u8]) -> Vec<u8> {
        let mut body = Vec::new();
        body.put_u32(enc_handle);
        public.store(&mut body);
        body.put_sized(secret);
        body
    }

    /// Open a session keyed by [`SECRET`], returning its handle and nonceEven.
    fn establish(tpm: &mut Tpm12, attributes: u32) -> (u32, Digest) {
        let body = establish_body(kh::TRANSPORT, public(attributes, alg::MGF1, es::NONE), &SECRET);
        let rsp = tpm
            .process(&command(tag::RQU_COMMAND, ord::ESTABLISH_TRANSPORT, &body))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        let handle = u32::from_be_bytes([rsp[10], rsp[11], rsp[12], rsp[13]]);
        let mut nonce_even = [0; 20];
        nonce_even.copy_from_slice(&rsp[rsp.len() - 20..]);
        (handle, nonce_even)
    }

    /// Wrap `inner` in TPM_ExecuteTransport, encrypting dataW from
    /// `data_w_start` on when `encrypt` is set.
    fn execute(
        handle: u32,
        nonce_even: &Digest,
        inner: &[u8],
        data_w_start: usize,
        encrypt: bool,
    ) -> Vec<u8> {
        let plain_data_w = &inner[data_w_start..];
        let mut wrapped = inner.to_vec();
        if encrypt {
            let pad = mgf1(&[nonce_even, &NONCE_ODD, b"in", &SECRET], plain_data_w.len());
            xor_region(&mut wrapped, data_w_start, &pad);
        }

        let h1 = sha1(&[&inner[6..10], plain_data_w]);
        let in_digest = sha1(&[
            &ord::EXECUTE_TRANSPORT.to_be_bytes(),
            &(wrapped.len() as u32).to_be_bytes(),
            &h1,
        ]);
        let auth = hmac_sha1(&SECRET, &[&in_digest, nonce_even, &NONCE_ODD, &[1]]);

        let mut body = Vec::new();
        body.put_sized(&wrapped);
        body.put_u32(handle);
        body.put_bytes(&NONCE_ODD);
        body.put_u8(1);
        body.put_bytes(&auth);
        command(tag::RQU_AUTH1_COMMAND, ord::EXECUTE_TRANSPORT, &body)
    }

    #[test]
    fn establish_clear_text_session() {
        let mut tpm = owned_tpm();
        let body = establish_body(kh::TRANSPORT, public(transport::LOG, alg::MGF1, es::NONE), &SECRET);
        let rsp = tpm
            .process(&command(tag::RQU_COMMAND, ord::ESTABLISH_TRANSPORT, &body))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert_eq!(rsp.len(), 10 + 4 + 4 + 32 + 20);

        let handle = u32::from_be_bytes([rsp[10], rsp[11], rsp[12], rsp[13]]);
        let session = tpm.state.transport_sessions.get(handle).unwrap().clone();
        assert_eq!(session.auth_data, SECRET);
        assert_eq!(&session.nonce_even[..], &rsp[50..70]);

        let mut expected = session.clone();
        expected.trans_digest = [0; 20];
        let public_bytes = &body[4..16];
        expected.log_in(
            &sha1(&[
                &ord::ESTABLISH_TRANSPORT.to_be_bytes(),
                public_bytes,
                &20u32.to_be_bytes(),
                &SECRET,
            ]),
            &[0; 20],
        );
        let ticks = &rsp[18..50];
        expected.log_out(
            ticks,
            &sha1(&[&[0; 4], &ord::ESTABLISH_TRANSPORT.to_be_bytes(), &[0; 4], ticks, &rsp[50..70]]),
            0,
        );
        assert_eq!(session.trans_digest, expected.trans_digest);
    }

    #[test]
    fn clear_text_secret_rules() {
        let mut tpm = owned_tpm();
        let encrypting = establish_body(kh::TRANSPORT, public(transport::ENCRYPT, alg::MGF1, es::NONE), &SECRET);
        let rsp = tpm
            .process(&command(tag::RQU_COMMAND, ord::ESTABLISH_TRANSPORT, &encrypting))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::BAD_SCHEME);

        let short = establish_body(kh::TRANSPORT, public(0, alg::MGF1, es::NONE), &[0x33; 19]);
        let rsp = tpm
            .process(&command(tag::RQU_COMMAND, ord::ESTABLISH_TRANSPORT, &short))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::BAD_PARAM_SIZE);

        let mut bad_tag = establish_body(kh::TRANSPORT, public(0, alg::MGF1, es::NONE), &SECRET);
        bad_tag[4] = 0x7F;
        let rsp = tpm
            .process(&command(tag::RQU_COMMAND, ord::ESTABLISH_TRANSPORT, &bad_tag))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::INVALID_STRUCTURE);
    }

    #[test]
    fn encrypted_pcr_read() {
        let mut tpm = owned_tpm();
        let (handle, nonce_even) = establish(&mut tpm, transport::LOG);
        // a clear text secret cannot establish an encrypting session
        tpm.state.transport_sessions.get_mut(handle).unwrap().attributes =
            transport::ENCRYPT | transport::LOG;

        let inner = command(tag::RQU_COMMAND, ord::PCR_READ, &0u32.to_be_bytes());
        let rsp = tpm.process(&execute(handle, &nonce_even, &inner, 10, true)).unwrap();
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert_eq!(&rsp[..2], &[0x00, 0xC5]);

        let ticks = &rsp[10..18];
        let locality = &rsp[18..22];
        let wrapped_len = u32::from_be_bytes([rsp[22], rsp[23], rsp[24], rsp[25]]) as usize;
        assert_eq!(wrapped_len, 30);
        let mut wrapped = rsp[26..26 + wrapped_len].to_vec();
        let new_nonce = &rsp[56..76];
        assert_eq!(rsp[76], 1);
        assert_eq!(rsp.len(), 97);

        let pad = mgf1(&[new_nonce, &NONCE_ODD, b"out", &SECRET], 20);
        xor_region(&mut wrapped, 10, &pad);
        assert_eq!(&wrapped[..10], &[0x00, 0xC4, 0, 0, 0, 30, 0, 0, 0, 0]);
        assert_eq!(&wrapped[10..], &[0; 20]);

        let h2 = sha1(&[&[0; 4], &ord::PCR_READ.to_be_bytes(), &wrapped[10..]]);
        let out_digest = sha1(&[
            &[0; 4],
            &ord::EXECUTE_TRANSPORT.to_be_bytes(),
            ticks,
            locality,
            &30u32.to_be_bytes(),
            &h2,
        ]);
        let res_auth = hmac_sha1(&SECRET, &[&out_digest, new_nonce, &NONCE_ODD, &[1]]);
        assert_eq!(&rsp[77..97], &res_auth);
        assert_eq!(&tpm.state.transport_sessions.get(handle).unwrap().nonce_even[..], new_nonce);
    }

    #[test]
    fn bad_transport_hmac_ends_the_session() {
        let mut tpm = owned_tpm();
        let (handle, _) = establish(&mut tpm, 0);
        let inner = command(tag::RQU_COMMAND, ord::PCR_READ, &0u32.to_be_bytes());
        let rsp = tpm.process(&execute(handle, &[0; 20], &inner, 10, false)).unwrap();
        assert_eq!(rc(&rsp), TpmRc::AUTH2FAIL);
        assert!(!tpm.state.transport_sessions.contains(handle));
    }

    #[test]
    fn transport_commands_cannot_be_wrapped() {
        let mut tpm = owned_tpm();
        let (handle, nonce_even) = establish(&mut tpm, 0);
        let body = establish_body(kh::TRANSPORT, public(0, alg::MGF1, es::NONE), &SECRET);
        let inner = command(tag::RQU_COMMAND, ord::ESTABLISH_TRANSPORT, &body);
        let rsp = tpm.process(&execute(handle, &nonce_even, &inner, 14, false)).unwrap();
        assert_eq!(rc(&rsp), TpmRc::NO_WRAP_TRANSPORT);
    }

    #[test]
    fn exclusive_session_is_preempted() {
        let mut tpm = owned_tpm();
        let (handle, _) = establish(&mut tpm, transport::EXCLUSIVE);
        assert_eq!(tpm.state.stany_flags.transport_exclusive, handle);

        tpm.process(&command(tag::RQU_COMMAND, ord::PCR_READ, &0u32.to_be_bytes()))
            .unwrap();
        assert_eq!(tpm.state.stany_flags.transport_exclusive, 0);
        assert!(!tpm.state.transport_sessions.contains(handle));
    }

    #[test]
    fn wrapped_flush_of_its_own_session() {
        let mut tpm = owned_tpm();
        let (handle, nonce_even) = establish(&mut tpm, 0);
        let mut body = Vec::new();
        body.put_u32(handle);
        body.put_u32(rt::TRANS);
        let inner = command(tag::RQU_COMMAND, ord::FLUSH_SPECIFIC, &body);
        let rsp = tpm.process(&execute(handle, &nonce_even, &inner, 14, false)).unwrap();
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        // continueTransSession is reported as cleared
        assert_eq!(rsp[rsp.len() - 21], 0);
        assert!(!tpm.state.transport_sessions.contains(handle));
    }

    struct TransportKey(Option<Digest>);

    impl KeySigner for TransportKey {
        fn sign_sha1(&mut self, _digest: &[u8; 20]) -> DynResult<Vec<u8>> {
            Err("not a signing key".into())
        }

        fn decrypt_oaep(&mut self, _ciphertext: &[u8]) -> DynResult<Vec<u8>> {
            let secret = self.0.ok_or("bad padding")?;
            let mut plain = Vec::new();
            plain.put_u16(structure_tag::TRANSPORT_AUTH);
            plain.put_bytes(&secret);
            Ok(plain)
        }
    }

    fn storage_key(usage: u16, secret: Option<Digest>) -> LoadedKey {
        LoadedKey {
            key_usage: usage,
            sig_scheme: crate::constants::ss::NONE,
            enc_scheme: es::RSAESOAEP_SHA1_MGF1,
            auth_data_usage: auth_usage::NEVER,
            usage_auth: [0; 20],
            pubkey_digest: [0x12; 20],
            owner_evict: false,
            signer: Box::new(TransportKey(secret)),
        }
    }

    #[test]
    fn key_encrypted_secret() {
        let mut tpm = owned_tpm();
        let key = tpm.load_key(storage_key(key_usage::STORAGE, Some([0x5C; 20]))).unwrap();
        let aes = public(transport::ENCRYPT, alg::AES128, es::SYM_CTR);
        let rsp = tpm
            .process(&command(
                tag::RQU_COMMAND,
                ord::ESTABLISH_TRANSPORT,
                &establish_body(key, aes, &[0xEE; 256]),
            ))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        let handle = u32::from_be_bytes([rsp[10], rsp[11], rsp[12], rsp[13]]);
        assert_eq!(tpm.state.transport_sessions.get(handle).unwrap().auth_data, [0x5C; 20]);

        let broken = tpm.load_key(storage_key(key_usage::STORAGE, None)).unwrap();
        let rsp = tpm
            .process(&command(
                tag::RQU_COMMAND,
                ord::ESTABLISH_TRANSPORT,
                &establish_body(broken, aes, &[0xEE; 256]),
            ))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::DECRYPT_ERROR);

        let signing = tpm.load_key(storage_key(key_usage::SIGNING, Some([0; 20]))).unwrap();
        let rsp = tpm
            .process(&command(
                tag::RQU_COMMAND,
                ord::ESTABLISH_TRANSPORT,
                &establish_body(signing, aes, &[0xEE; 256]),
            ))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::INVALID_KEYUSAGE);
    }

    #[test]
    fn unsupported_algorithm() {
        let mut tpm = owned_tpm();
        let key = tpm.load_key(storage_key(key_usage::STORAGE, Some([0x5C; 20]))).unwrap();
        let xor = public(transport::ENCRYPT, alg::XOR, es::NONE);
        let rsp = tpm
            .process(&command(
                tag::RQU_COMMAND,
                ord::ESTABLISH_TRANSPORT,
                &establish_body(key, xor, &[0xEE; 256]),
            ))
            .unwrap();
        assert_eq!(rc(&rsp), TpmRc::BAD_KEY_PROPERTY);
    }
}
