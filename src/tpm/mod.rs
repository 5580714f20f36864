// Copyright (C) Microsoft Corporation. All rights reserved.

//! The TPM instance and its host facing API.

use serde::Deserialize;
use serde::Serialize;

use crate::constants::limits::KEY_HANDLES;
use crate::crypto::hmac_sha1;
use crate::crypto::sha1;
use crate::crypto::Digest;
use crate::crypto::Sha1;
use crate::error::Error;
use crate::ordinal;
use crate::rc::TpmRc;
use crate::Config;
use crate::InitKind;
use crate::LoadedKey;
use crate::PlatformCallbacks;

mod audit;
mod check;
mod cmd;
mod digest;
mod handles;
mod locality;
mod nv;
mod process;
mod session;
mod state;
mod ticks;
mod transport;

use handles::base;
use handles::HandleTable;
use locality::LocalityState;
use session::new_auth_sessions;
use session::AuthSessions;
use state::PermanentData;
use state::PermanentFlags;
use state::StAnyFlags;
use state::StClearData;
use state::StClearFlags;
use state::TestState;
use ticks::TickState;
use transport::new_transport_sessions;
use transport::TransportSessions;

/// Everything that makes up a running TPM apart from its loaded keys.
#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct TpmState {
    pub permanent_flags: PermanentFlags,
    pub permanent_data: PermanentData,
    pub stclear_flags: StClearFlags,
    pub stclear_data: StClearData,
    pub stany_flags: StAnyFlags,
    pub auth_sessions: AuthSessions,
    pub transport_sessions: TransportSessions,
    pub test_state: TestState,
    pub locality: LocalityState,
    pub ticks: TickState,
}

impl TpmState {
    fn new(permanent_flags: PermanentFlags, permanent_data: PermanentData) -> TpmState {
        TpmState {
            stclear_flags: StClearFlags {
                deactivated: permanent_flags.deactivated,
                ..StClearFlags::default()
            },
            permanent_flags,
            permanent_data,
            stclear_data: StClearData::new(),
            stany_flags: StAnyFlags::new(),
            auth_sessions: new_auth_sessions(),
            transport_sessions: new_transport_sessions(),
            test_state: TestState::Limited,
            locality: LocalityState::new(),
            ticks: TickState::new(),
        }
    }
}

/// The context opened by TPM_SHA1Start.
pub(crate) struct Sha1Thread {
    pub ctx: Sha1,
    /// Transport session the thread was started in
    pub transport_handle: Option<u32>,
}

/// A single TPM 1.2 instance.
///
/// Instances are independent of each other. Each one processes a single
/// command at a time; the only re-entrancy is TPM_ExecuteTransport running
/// its wrapped command.
pub struct Tpm12 {
    callbacks: Box<dyn PlatformCallbacks + Send>,
    config: Config,
    state: TpmState,
    keys: HandleTable<LoadedKey>,
    sha1_thread: Option<Sha1Thread>,
}

impl core::fmt::Debug for Tpm12 {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tpm12")
            .field("config", &self.config)
            .field("test_state", &self.state.test_state)
            .finish_non_exhaustive()
    }
}

impl Tpm12 {
    /// Create an instance with the given implementation-specific callbacks.
    ///
    /// A cold init manufactures fresh permanent state and hands it to
    /// [`PlatformCallbacks::commit_nv_state`] before returning.
    ///
    /// NOTE: This method will NOT send TPM_Startup.
    pub fn initialize(
        callbacks: Box<dyn PlatformCallbacks + Send>,
        init_kind: InitKind<'_>,
        config: Config,
    ) -> Result<Tpm12, Error> {
        tracing::trace!("Initializing TPM 1.2 instance...");
        ordinal::validate()?;

        let (permanent_flags, permanent_data) = match &init_kind {
            InitKind::ColdInit => (PermanentFlags::manufacture(), PermanentData::manufacture()),
            InitKind::ColdInitWithPersistentState { nvmem_blob } => nv::nv_load(nvmem_blob)?,
        };

        let mut tpm = Tpm12 {
            callbacks,
            config,
            state: TpmState::new(permanent_flags, permanent_data),
            keys: HandleTable::new(base::KEY, KEY_HANDLES),
            sha1_thread: None,
        };

        if matches!(&init_kind, InitKind::ColdInit) {
            tpm.state.permanent_data.daa_proof = tpm.nonce_generate()?;
            tpm.nv_store()?;
            tracing::trace!("permanent state manufactured");
        }

        tpm.init()?;
        if tpm.state.permanent_data.audit_failure {
            tracing::warn!("permanent state carries an audit failure, TPM stays in failure mode");
        }

        tracing::info!("TPM 1.2 instance initialized");
        Ok(tpm)
    }

    /// TPM_Init: everything but the permanent state is reset, and the TPM
    /// waits for TPM_Startup.
    fn init(&mut self) -> Result<(), Error> {
        tracing::trace!("TPM_Init");
        self.state.stany_flags = StAnyFlags::new();
        self.state.stclear_flags = StClearFlags {
            deactivated: self.state.permanent_flags.deactivated,
            ..StClearFlags::default()
        };
        self.state.stclear_data = StClearData::new();
        self.state.auth_sessions.clear();
        self.state.transport_sessions.clear();
        self.sha1_thread = None;
        self.keys.retain(|key| key.owner_evict);
        self.state.test_state = TestState::Limited;
        self.tick_session_reset()
    }

    /// Reset the TPM device (i.e: simulate power off + power on).
    ///
    /// A physical reset is the only way out of an audit failure.
    pub fn reset(&mut self, with_new_nvmem_blob: Option<&[u8]>) -> Result<(), Error> {
        tracing::trace!("Resetting TPM...");
        if let Some(nvmem_blob) = with_new_nvmem_blob {
            let (flags, data) = nv::nv_load(nvmem_blob)?;
            self.state.permanent_flags = flags;
            self.state.permanent_data = data;
        }

        if self.state.permanent_data.audit_failure {
            tracing::info!("clearing the audit failure latch");
            self.state.permanent_data.audit_failure = false;
            self.nv_store()?;
        }

        self.init()?;
        tracing::trace!("TPM Reset");
        Ok(())
    }

    /// Save the instance's complete runtime state into an opaque blob.
    ///
    /// Loaded keys and an open SHA-1 thread are not part of the blob.
    pub fn save_state(&self) -> Result<Vec<u8>, Error> {
        postcard::to_stdvec(&self.state).map_err(Error::FailedStateSave)
    }

    /// Restore the instance from a blob produced by [`Tpm12::save_state`].
    pub fn restore_state(&mut self, state: &[u8]) -> Result<(), Error> {
        let mut state: TpmState = postcard::from_bytes(state).map_err(Error::FailedStateRestore)?;

        if self.state.permanent_data.audit_failure {
            state.permanent_data.audit_failure = true;
            state.test_state = TestState::Failure;
        }

        self.state = state;
        self.sha1_thread = None;
        tracing::debug!("runtime state restored");
        Ok(())
    }

    /// Install an owner with the given authorization secret.
    pub fn install_owner(&mut self, owner_auth: [u8; 20]) -> Result<(), Error> {
        self.state.permanent_data.owner_auth = Some(owner_auth);
        self.nv_store()?;
        tracing::info!("owner installed");
        Ok(())
    }

    /// Make a key available to commands, returning its handle.
    pub fn load_key(&mut self, key: LoadedKey) -> Result<u32, TpmRc> {
        let handle = self.keys.insert(key)?;
        tracing::debug!("loaded key {:#010x}", handle);
        Ok(handle)
    }

    pub(crate) fn random_fill(&mut self, buf: &mut [u8]) -> Result<(), Error> {
        let mut filled = 0;
        while filled < buf.len() {
            let len = self
                .callbacks
                .get_crypt_random(&mut buf[filled..])
                .map_err(Error::PlatformCallback)?;
            if len == 0 {
                return Err(Error::PlatformCallback("platform returned no entropy".into()));
            }
            filled += len.min(buf.len() - filled);
        }
        Ok(())
    }

    pub(crate) fn nonce_generate(&mut self) -> Result<Digest, Error> {
        let mut nonce = [0; 20];
        self.random_fill(&mut nonce)?;
        Ok(nonce)
    }

    /// Asserted either by the hardware signal or by TSC_PhysicalPresence,
    /// whichever the permanent flags enable.
    pub(crate) fn physical_presence(&mut self) -> bool {
        let flags = &self.state.permanent_flags;
        let (hw_enable, cmd_enable) = (
            flags.physical_presence_hw_enable,
            flags.physical_presence_cmd_enable,
        );
        (hw_enable && self.callbacks.physical_presence_asserted())
            || (cmd_enable && self.state.stclear_flags.physical_presence)
    }

    pub(crate) fn enter_failure_mode(&mut self) {
        if self.state.test_state != TestState::Failure {
            tracing::error!("TPM entering failure mode");
        }
        self.state.test_state = TestState::Failure;
    }

    /// Run the known answer tests that gate full operation.
    pub(crate) fn continue_self_test(&mut self) -> Result<(), TpmRc> {
        const SHA1_ABC: Digest = [
            0xa9, 0x99, 0x3e, 0x36, 0x47, 0x06, 0x81, 0x6a, 0xba, 0x3e, 0x25, 0x71, 0x78, 0x50,
            0xc2, 0x6c, 0x9c, 0xd0, 0xd8, 0x9d,
        ];
        // RFC 2202 test case 2
        const HMAC_JEFE: Digest = [
            0xef, 0xfc, 0xdf, 0x6a, 0xe5, 0xeb, 0x2f, 0xa2, 0xd2, 0x74, 0x16, 0xd5, 0xf1, 0x84,
            0xdf, 0x9c, 0x25, 0x9a, 0x7c, 0x79,
        ];

        let passed = sha1(&[b"abc"]) == SHA1_ABC
            && hmac_sha1(b"Jefe", &[b"what do ya want for nothing?"]) == HMAC_JEFE;
        if !passed {
            self.enter_failure_mode();
            return Err(TpmRc::FAILEDSELFTEST);
        }

        if self.state.test_state == TestState::Limited {
            tracing::debug!("self test passed");
            self.state.test_state = TestState::Full;
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::sync::atomic::AtomicBool;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;
    use std::time::Duration;

    use super::*;
    use crate::codec::WriteBe;
    use crate::constants::ord;
    use crate::constants::st;
    use crate::constants::tag;
    use crate::DynResult;

    /// Shared on/off switch for fault injection.
    #[derive(Clone, Default)]
    pub(crate) struct Switch(Arc<AtomicBool>);

    impl Switch {
        pub fn set(&self, on: bool) {
            self.0.store(on, Ordering::SeqCst)
        }

        fn get(&self) -> bool {
            self.0.load(Ordering::SeqCst)
        }
    }

    /// Deterministic entropy, a clock that never moves and an NV store that
    /// can be told to fail.
    struct TestPlatform {
        counter: u8,
        fail_commit: Switch,
    }

    impl PlatformCallbacks for TestPlatform {
        fn commit_nv_state(&mut self, _state: &[u8]) -> DynResult<()> {
            if self.fail_commit.get() {
                return Err("injected nv failure".into());
            }
            Ok(())
        }

        fn get_crypt_random(&mut self, buf: &mut [u8]) -> DynResult<usize> {
            for b in buf.iter_mut() {
                self.counter = self.counter.wrapping_add(1);
                *b = self.counter;
            }
            Ok(buf.len())
        }

        fn monotonic_timer(&mut self) -> Duration {
            Duration::from_secs(1)
        }

        fn physical_presence_asserted(&mut self) -> bool {
            false
        }
    }

    pub(crate) struct FailingNv;

    impl FailingNv {
        /// A started TPM whose NV commits fail while the switch is on.
        pub fn started_tpm() -> (Tpm12, Switch) {
            Self::started_tpm_with(Config::default())
        }

        pub fn started_tpm_with(config: Config) -> (Tpm12, Switch) {
            let fail_commit = Switch::default();
            let platform = TestPlatform {
                counter: 0,
                fail_commit: fail_commit.clone(),
            };
            let mut tpm = Tpm12::initialize(Box::new(platform), InitKind::ColdInit, config).unwrap();

            let mut startup = Vec::new();
            startup.put_u16(tag::RQU_COMMAND);
            startup.put_u32(12);
            startup.put_u32(ord::STARTUP);
            startup.put_u16(st::CLEAR);
            let rsp = tpm.process(&startup).unwrap();
            assert_eq!(rsp, vec![0x00, 0xC4, 0, 0, 0, 10, 0, 0, 0, 0]);
            (tpm, fail_commit)
        }
    }

    /// Cold initialized and started with ST_CLEAR, no owner installed.
    pub(crate) fn started_tpm() -> Tpm12 {
        FailingNv::started_tpm().0
    }

    /// Run `ordinal` with owner authorization through a fresh OIAP session
    /// that is closed by the command.
    pub(crate) fn owner_command(tpm: &mut Tpm12, owner: &Digest, ordinal: u32, params: &[u8]) -> Vec<u8> {
        let mut oiap = Vec::new();
        oiap.put_u16(tag::RQU_COMMAND);
        oiap.put_u32(10);
        oiap.put_u32(ord::OIAP);
        let rsp = tpm.process(&oiap).unwrap();
        let handle = &rsp[10..14];
        let nonce_even = &rsp[14..34];
        let nonce_odd = [0x5A; 20];

        let in_digest = sha1(&[&ordinal.to_be_bytes(), params]);
        let auth = hmac_sha1(owner, &[&in_digest, nonce_even, &nonce_odd, &[0]]);

        let mut cmd = Vec::new();
        cmd.put_u16(tag::RQU_AUTH1_COMMAND);
        cmd.put_u32((10 + params.len() + 45) as u32);
        cmd.put_u32(ordinal);
        cmd.put_bytes(params);
        cmd.put_bytes(handle);
        cmd.put_bytes(&nonce_odd);
        cmd.put_u8(0);
        cmd.put_bytes(&auth);
        tpm.process(&cmd).unwrap()
    }

    #[test]
    fn cold_init_waits_for_startup() {
        let platform = TestPlatform {
            counter: 0,
            fail_commit: Switch::default(),
        };
        let tpm = Tpm12::initialize(Box::new(platform), InitKind::ColdInit, Config::default()).unwrap();
        assert!(tpm.state.stany_flags.post_initialise);
        assert_eq!(tpm.state.test_state, TestState::Limited);
        assert_ne!(tpm.state.permanent_data.daa_proof, [0; 20]);
    }

    #[test]
    fn state_roundtrip() {
        let mut tpm = started_tpm();
        tpm.state.stclear_data.pcrs[3] = [9; 20];
        let blob = tpm.save_state().unwrap();
        tpm.state.stclear_data.pcrs[3] = [0; 20];
        tpm.restore_state(&blob).unwrap();
        assert_eq!(tpm.state.stclear_data.pcrs[3], [9; 20]);
        assert!(matches!(
            tpm.restore_state(&[0xff; 3]),
            Err(Error::FailedStateRestore(_))
        ));
    }

    #[test]
    fn restore_keeps_audit_latch() {
        let mut tpm = started_tpm();
        let blob = tpm.save_state().unwrap();
        tpm.state.permanent_data.audit_failure = true;
        tpm.restore_state(&blob).unwrap();
        assert!(tpm.in_failure_mode());
        assert_eq!(tpm.state.test_state, TestState::Failure);

        tpm.reset(None).unwrap();
        assert!(!tpm.in_failure_mode());
        assert!(tpm.state.stany_flags.post_initialise);
    }

    #[test]
    fn self_test_passes() {
        let mut tpm = started_tpm();
        tpm.continue_self_test().unwrap();
        assert_eq!(tpm.state.test_state, TestState::Full);
    }

    #[test]
    fn nonces_come_from_the_platform() {
        let mut tpm = started_tpm();
        let a = tpm.nonce_generate().unwrap();
        let b = tpm.nonce_generate().unwrap();
        assert_ne!(a, b);
    }
}
