//! Transport sessions: the table, the running transport log and the MGF1
//! stream cipher used by encrypting sessions.

use serde::Deserialize;
use serde::Serialize;

use crate::codec::Reader;
use crate::codec::WriteBe;
use crate::constants::alg;
use crate::constants::es;
use crate::constants::limits::MIN_TRANS_SESSIONS;
use crate::constants::structure_tag;
use crate::constants::transport;
use crate::crypto::aes128_stream;
use crate::crypto::mgf1;
use crate::crypto::sha1;
use crate::crypto::xor_region;
use crate::crypto::Digest;
use crate::crypto::SymMode;
use crate::crypto::AES_BLOCK_SIZE;
use crate::rc::TpmRc;

use super::handles::base;
use super::handles::HandleTable;
use super::Tpm12;

/// `TPM_TRANSPORT_PUBLIC`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct TransportPublic {
    pub attributes: u32,
    pub alg_id: u32,
    pub enc_scheme: u16,
}

impl TransportPublic {
    pub fn parse(params: &mut Reader<'_>) -> Result<TransportPublic, TpmRc> {
        if params.u16()? != structure_tag::TRANSPORT_PUBLIC {
            return Err(TpmRc::INVALID_STRUCTURE);
        }
        Ok(TransportPublic {
            attributes: params.u32()?,
            alg_id: params.u32()?,
            enc_scheme: params.u16()?,
        })
    }

    pub fn store(&self, out: &mut Vec<u8>) {
        out.put_u16(structure_tag::TRANSPORT_PUBLIC);
        out.put_u32(self.attributes);
        out.put_u32(self.alg_id);
        out.put_u16(self.enc_scheme);
    }
}

/// Validate the algorithm of an encrypting session.
pub(crate) fn check_enc_scheme(alg_id: u32, enc_scheme: u16, fips: bool) -> Result<(), TpmRc> {
    match alg_id {
        alg::MGF1 => {
            if fips || enc_scheme != es::NONE {
                return Err(TpmRc::INAPPROPRIATE_ENC);
            }
            Ok(())
        }
        alg::AES128 => match enc_scheme {
            es::SYM_CTR | es::SYM_OFB => Ok(()),
            _ => Err(TpmRc::INAPPROPRIATE_ENC),
        },
        _ => Err(TpmRc::BAD_KEY_PROPERTY),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct TransportSession {
    /// `TPM_TRANSPORT_ATTRIBUTES`
    pub attributes: u32,
    pub alg_id: u32,
    pub enc_scheme: u16,
    pub auth_data: Digest,
    pub nonce_even: Digest,
    /// Running digest of the transport log
    pub trans_digest: Digest,
}

impl TransportSession {
    pub fn encrypt(&self) -> bool {
        self.attributes & transport::ENCRYPT != 0
    }

    pub fn logging(&self) -> bool {
        self.attributes & transport::LOG != 0
    }

    pub fn exclusive(&self) -> bool {
        self.attributes & transport::EXCLUSIVE != 0
    }

    /// Extend a `TPM_TRANSPORT_LOG_IN` entry.
    pub fn log_in(&mut self, parameters: &Digest, pub_key_hash: &Digest) {
        let mut entry = Vec::with_capacity(2 + 2 * 20);
        entry.put_u16(structure_tag::TRANSPORT_LOG_IN);
        entry.put_bytes(parameters);
        entry.put_bytes(pub_key_hash);
        self.extend_log(&entry);
    }

    /// Extend a `TPM_TRANSPORT_LOG_OUT` entry. `current_ticks` is a complete
    /// `TPM_CURRENT_TICKS` structure.
    pub fn log_out(&mut self, current_ticks: &[u8], parameters: &Digest, locality: u32) {
        let mut entry = Vec::with_capacity(2 + current_ticks.len() + 20 + 4);
        entry.put_u16(structure_tag::TRANSPORT_LOG_OUT);
        entry.put_bytes(current_ticks);
        entry.put_bytes(parameters);
        entry.put_u32(locality);
        self.extend_log(&entry);
    }

    fn extend_log(&mut self, entry: &[u8]) {
        self.trans_digest = sha1(&[&self.trans_digest, entry]);
    }

    /// MGF1 keystream for one direction of one wrapped command.
    pub fn mask(&self, nonce_odd: &Digest, label: &[u8], len: usize) -> Vec<u8> {
        mgf1(&[&self.nonce_even, nonce_odd, label, &self.auth_data], len)
    }

    /// Encrypt or decrypt the dataW area of one direction ("in" or "out") of
    /// a wrapped command, keyed by the session's current nonceEven.
    pub fn crypt(&self, nonce_odd: &Digest, label: &[u8], data: &mut [u8]) -> Result<(), TpmRc> {
        let mode = match (self.alg_id, self.enc_scheme) {
            (alg::MGF1, _) => {
                let pad = self.mask(nonce_odd, label, data.len());
                xor_region(data, 0, &pad);
                return Ok(());
            }
            (alg::AES128, es::SYM_CTR) => SymMode::Ctr,
            (alg::AES128, es::SYM_OFB) => SymMode::Ofb,
            _ => return Err(TpmRc::BAD_KEY_PROPERTY),
        };

        let seed = mgf1(&[&self.nonce_even, nonce_odd, label], AES_BLOCK_SIZE);
        let mut iv = [0; AES_BLOCK_SIZE];
        iv.copy_from_slice(&seed);
        let mut key = [0; AES_BLOCK_SIZE];
        key.copy_from_slice(&self.auth_data[..AES_BLOCK_SIZE]);
        aes128_stream(mode, &key, &iv, data)
    }
}

pub(crate) type TransportSessions = HandleTable<TransportSession>;

pub(crate) fn new_transport_sessions() -> TransportSessions {
    HandleTable::new(base::TRANS, MIN_TRANS_SESSIONS)
}

impl Tpm12 {
    pub(crate) fn transport_terminate(&mut self, handle: u32) {
        if self.state.transport_sessions.remove(handle).is_some() {
            tracing::debug!("terminated transport session {:#010x}", handle);
        }
        if self.state.stany_flags.transport_exclusive == handle {
            self.state.stany_flags.transport_exclusive = 0;
        }
    }
}
