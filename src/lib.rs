// Copyright (C) Microsoft Corporation. All rights reserved.

//! A software TPM 1.2 command processor.
//!
//! [`Tpm12`] consumes serialized TPM 1.2 command blobs and produces
//! serialized response blobs, byte-exact per the TPM 1.2 specification.
//! Platform services (non volatile storage, entropy, time, physical presence)
//! are injected through [`PlatformCallbacks`].

#![warn(missing_docs)]

mod codec;
pub mod constants;
mod crypto;
mod error;
mod ordinal;
mod rc;
mod tpm;

pub use error::DynResult;
pub use error::Error;
pub use error::NvError;
pub use rc::TpmRc;
pub use tpm::Tpm12;

use std::borrow::Cow;

/// Various library initialization modes
pub enum InitKind<'a> {
    /// Initialize the TPM entirely from scratch, having it manufacture an
    /// initial nvmem blob.
    ColdInit,
    /// Initialize the TPM from an existing saved nvmem blob.
    ColdInitWithPersistentState {
        /// Opaque nvmem blob
        nvmem_blob: Cow<'a, [u8]>,
    },
}

impl core::fmt::Debug for InitKind<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InitKind::ColdInit => write!(f, "ColdInit"),
            InitKind::ColdInitWithPersistentState { .. } => {
                write!(f, "ColdInitWithPersistentState {{ .. }}")
            }
        }
    }
}

/// Which column of the ordinal table is used to dispatch commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecRevision {
    /// TPM 1.1b command set
    V1_1,
    /// TPM 1.2 command set
    V1_2,
}

/// Per-instance configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Command set revision
    pub spec_revision: SpecRevision,
}

impl Default for Config {
    fn default() -> Config {
        Config {
            spec_revision: SpecRevision::V1_2,
        }
    }
}

/// Implementation-specific platform callbacks.
pub trait PlatformCallbacks {
    /// Persist the provided non volatile state.
    ///
    /// The TPM only reports success for a command that changed its permanent
    /// state once this returns `Ok`.
    fn commit_nv_state(&mut self, state: &[u8]) -> DynResult<()>;

    /// Write cryptographically secure random bytes into `buf`.
    ///
    /// Returns the number of bytes written into `buf`.
    fn get_crypt_random(&mut self, buf: &mut [u8]) -> DynResult<usize>;

    /// Return a monotonically increasing duration.
    ///
    /// A simple implementation can simply initialize a [`std::time::Instant`],
    /// and then call `.elapsed()` on it.
    fn monotonic_timer(&mut self) -> std::time::Duration;

    /// Return whether the hardware physical presence signal is asserted.
    fn physical_presence_asserted(&mut self) -> bool;
}

/// Sample platform callback implementation that simply logs invocations +
/// returns dummy data.
pub struct DummyPlatformCallbacks;

impl PlatformCallbacks for DummyPlatformCallbacks {
    fn commit_nv_state(&mut self, state: &[u8]) -> DynResult<()> {
        tracing::info!("committing nv state with len {}", state.len());
        Ok(())
    }

    fn get_crypt_random(&mut self, buf: &mut [u8]) -> DynResult<usize> {
        tracing::info!("returning dummy entropy into buf of len {}", buf.len());
        if let Some(b) = buf.get_mut(0) {
            *b = 1;
        }

        Ok(buf.len())
    }

    fn monotonic_timer(&mut self) -> std::time::Duration {
        tracing::info!("checking time from the platform");
        std::time::Duration::ZERO
    }

    fn physical_presence_asserted(&mut self) -> bool {
        tracing::info!("checking physical presence from the platform");
        false
    }
}

/// Private key operations backing a key loaded through [`Tpm12::load_key`].
pub trait KeySigner {
    /// Produce a signature over a SHA-1 digest, using the key's signature
    /// scheme.
    fn sign_sha1(&mut self, digest: &[u8; 20]) -> DynResult<Vec<u8>>;

    /// Decrypt an RSAES-OAEP (SHA-1, MGF1, "TCPA" label) encrypted blob.
    fn decrypt_oaep(&mut self, ciphertext: &[u8]) -> DynResult<Vec<u8>> {
        let _ = ciphertext;
        Err("key does not support decryption".into())
    }
}

/// A key made available to commands that take a key handle.
pub struct LoadedKey {
    /// `TPM_KEY_USAGE`
    pub key_usage: u16,
    /// `TPM_SIG_SCHEME`
    pub sig_scheme: u16,
    /// `TPM_ENC_SCHEME`
    pub enc_scheme: u16,
    /// `TPM_AUTH_DATA_USAGE`
    pub auth_data_usage: u8,
    /// Usage authorization secret
    pub usage_auth: [u8; 20],
    /// SHA-1 digest of the key's `TPM_PUBKEY`
    pub pubkey_digest: [u8; 20],
    /// Whether the key survives `TPM_Startup(ST_CLEAR)`
    pub owner_evict: bool,
    /// Private key operations
    pub signer: Box<dyn KeySigner + Send>,
}

impl core::fmt::Debug for LoadedKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedKey")
            .field("key_usage", &self.key_usage)
            .field("sig_scheme", &self.sig_scheme)
            .field("enc_scheme", &self.enc_scheme)
            .field("auth_data_usage", &self.auth_data_usage)
            .field("owner_evict", &self.owner_evict)
            .finish_non_exhaustive()
    }
}
