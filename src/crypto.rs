//! SHA-1 based primitives on top of libcrypto.

use crate::constants::limits::DIGEST_SIZE;
use crate::rc::TpmRc;

pub(crate) type Digest = [u8; DIGEST_SIZE];

const HMAC_BLOCK_SIZE: usize = 64;

/// Streaming SHA-1 context.
#[derive(Clone)]
pub(crate) struct Sha1 {
    ctx: openssl_sys::SHA_CTX,
}

impl Sha1 {
    pub fn new() -> Sha1 {
        // SAFETY: `SHA_CTX` is a POD C type, and SHA1_Init fully initializes
        // it. SHA1_Init has no failure mode on a valid pointer.
        unsafe {
            let mut ctx = std::mem::zeroed();
            openssl_sys::SHA1_Init(&mut ctx);
            Sha1 { ctx }
        }
    }

    pub fn update(&mut self, data: &[u8]) {
        if data.is_empty() {
            return;
        }
        // SAFETY: the context was initialized by SHA1_Init, and `data` is a
        // valid slice for the duration of the call.
        unsafe {
            openssl_sys::SHA1_Update(&mut self.ctx, data.as_ptr() as *const _, data.len());
        }
    }

    pub fn finish(mut self) -> Digest {
        let mut digest = [0; DIGEST_SIZE];
        // SAFETY: the context was initialized by SHA1_Init, and `digest` is
        // exactly SHA_DIGEST_LENGTH bytes long.
        unsafe {
            openssl_sys::SHA1_Final(digest.as_mut_ptr(), &mut self.ctx);
        }
        digest
    }
}

/// SHA-1 over the concatenation of `parts`.
pub(crate) fn sha1(parts: &[&[u8]]) -> Digest {
    let mut ctx = Sha1::new();
    for part in parts {
        ctx.update(part);
    }
    ctx.finish()
}

/// HMAC-SHA1 (RFC 2104) over the concatenation of `parts`.
pub(crate) fn hmac_sha1(key: &[u8], parts: &[&[u8]]) -> Digest {
    let mut block = [0u8; HMAC_BLOCK_SIZE];
    if key.len() > HMAC_BLOCK_SIZE {
        block[..DIGEST_SIZE].copy_from_slice(&sha1(&[key]));
    } else {
        block[..key.len()].copy_from_slice(key);
    }

    let mut ipad = [0x36u8; HMAC_BLOCK_SIZE];
    let mut opad = [0x5cu8; HMAC_BLOCK_SIZE];
    for ((i, o), k) in ipad.iter_mut().zip(opad.iter_mut()).zip(block.iter()) {
        *i ^= k;
        *o ^= k;
    }

    let mut inner = Sha1::new();
    inner.update(&ipad);
    for part in parts {
        inner.update(part);
    }
    let inner = inner.finish();

    sha1(&[&opad, &inner])
}

/// MGF1 mask generation with SHA-1 (PKCS#1 v2.1 B.2.1).
pub(crate) fn mgf1(seed: &[&[u8]], len: usize) -> Vec<u8> {
    let mut mask = Vec::with_capacity(len + DIGEST_SIZE);
    let mut counter: u32 = 0;
    while mask.len() < len {
        let mut ctx = Sha1::new();
        for part in seed {
            ctx.update(part);
        }
        ctx.update(&counter.to_be_bytes());
        mask.extend_from_slice(&ctx.finish());
        counter = counter.wrapping_add(1);
    }
    mask.truncate(len);
    mask
}

/// XOR `pad` into `data[start..start + pad.len()]`.
pub(crate) fn xor_region(data: &mut [u8], start: usize, pad: &[u8]) {
    if let Some(region) = data.get_mut(start..start + pad.len()) {
        for (d, p) in region.iter_mut().zip(pad) {
            *d ^= p;
        }
    }
}

/// Constant-time comparison for authorization digests.
pub(crate) fn digest_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

pub(crate) const AES_BLOCK_SIZE: usize = 16;

/// AES-128 stream modes offered to encrypting transport sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SymMode {
    /// Only the low 32 bits of the counter block are incremented.
    Ctr,
    Ofb,
}

/// Single block AES-128 encryption under one key.
struct Aes128 {
    ctx: *mut openssl_sys::EVP_CIPHER_CTX,
}

impl Aes128 {
    fn new(key: &[u8; AES_BLOCK_SIZE]) -> Result<Aes128, TpmRc> {
        // SAFETY: a fresh context is only used after a successful init, and
        // is freed by `Drop` on every path.
        unsafe {
            let ctx = openssl_sys::EVP_CIPHER_CTX_new();
            if ctx.is_null() {
                return Err(TpmRc::FAIL);
            }
            let aes = Aes128 { ctx };
            let ok = openssl_sys::EVP_EncryptInit_ex(
                aes.ctx,
                openssl_sys::EVP_aes_128_ecb(),
                std::ptr::null_mut(),
                key.as_ptr(),
                std::ptr::null(),
            );
            if ok != 1 || openssl_sys::EVP_CIPHER_CTX_set_padding(aes.ctx, 0) != 1 {
                return Err(TpmRc::FAIL);
            }
            Ok(aes)
        }
    }

    fn encrypt_block(&mut self, block: &[u8; AES_BLOCK_SIZE]) -> Result<[u8; AES_BLOCK_SIZE], TpmRc> {
        let mut out = [0; AES_BLOCK_SIZE * 2];
        let mut out_len = 0;
        // SAFETY: without padding ECB emits exactly one block per input
        // block, and `out` has room for two.
        let ok = unsafe {
            openssl_sys::EVP_EncryptUpdate(
                self.ctx,
                out.as_mut_ptr(),
                &mut out_len,
                block.as_ptr(),
                AES_BLOCK_SIZE as _,
            )
        };
        if ok != 1 || out_len as usize != AES_BLOCK_SIZE {
            return Err(TpmRc::FAIL);
        }
        let mut cipher = [0; AES_BLOCK_SIZE];
        cipher.copy_from_slice(&out[..AES_BLOCK_SIZE]);
        Ok(cipher)
    }
}

impl Drop for Aes128 {
    fn drop(&mut self) {
        // SAFETY: `ctx` came from EVP_CIPHER_CTX_new and is freed once.
        unsafe { openssl_sys::EVP_CIPHER_CTX_free(self.ctx) }
    }
}

/// Encrypt or decrypt `data` in place with AES-128 in a stream mode. Both
/// directions are the same keystream XOR.
pub(crate) fn aes128_stream(
    mode: SymMode,
    key: &[u8; AES_BLOCK_SIZE],
    iv: &[u8; AES_BLOCK_SIZE],
    data: &mut [u8],
) -> Result<(), TpmRc> {
    let mut aes = Aes128::new(key)?;
    let mut block = *iv;
    for chunk in data.chunks_mut(AES_BLOCK_SIZE) {
        let pad = aes.encrypt_block(&block)?;
        for (d, p) in chunk.iter_mut().zip(pad.iter()) {
            *d ^= p;
        }
        block = match mode {
            SymMode::Ctr => {
                let mut counter = [0; 4];
                counter.copy_from_slice(&block[12..]);
                let next = u32::from_be_bytes(counter).wrapping_add(1);
                block[12..].copy_from_slice(&next.to_be_bytes());
                block
            }
            SymMode::Ofb => pad,
        };
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hex(d: &[u8]) -> String {
        d.iter().map(|b| format!("{:02x}", b)).collect()
    }

    #[test]
    fn sha1_known_answer() {
        assert_eq!(
            hex(&sha1(&[b"abc"])),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(hex(&sha1(&[b"a", b"bc"])), hex(&sha1(&[b"abc"])));
        assert_eq!(
            hex(&sha1(&[])),
            "da39a3ee5e6b4b0d3255bfef95601890afd80709"
        );
    }

    #[test]
    fn hmac_rfc2202_case_2() {
        assert_eq!(
            hex(&hmac_sha1(b"Jefe", &[b"what do ya want ", b"for nothing?"])),
            "effcdf6ae5eb2fa2d27416d5f184df9c259a7c79"
        );
    }

    #[test]
    fn mgf1_length_and_prefix() {
        let long = mgf1(&[b"seed"], 45);
        let short = mgf1(&[b"seed"], 7);
        assert_eq!(long.len(), 45);
        assert_eq!(&long[..7], &short[..]);
        let mut counter0 = b"seed".to_vec();
        counter0.extend_from_slice(&[0, 0, 0, 0]);
        assert_eq!(&long[..20], &sha1(&[&counter0])[..]);
    }

    #[test]
    fn aes128_fips197_block() {
        let key: [u8; 16] = [
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ];
        let iv: [u8; 16] = [
            0x00, 0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb, 0xcc, 0xdd,
            0xee, 0xff,
        ];
        let mut ctr = [0u8; 20];
        aes128_stream(SymMode::Ctr, &key, &iv, &mut ctr).unwrap();
        assert_eq!(hex(&ctr[..16]), "69c4e0d86a7b0430d8cdb78070b4c55a");

        let mut ofb = [0u8; 20];
        aes128_stream(SymMode::Ofb, &key, &iv, &mut ofb).unwrap();
        assert_eq!(ofb[..16], ctr[..16]);
        assert_ne!(ofb[16..], ctr[16..]);

        // stream modes are their own inverse
        aes128_stream(SymMode::Ofb, &key, &iv, &mut ofb).unwrap();
        assert_eq!(ofb, [0; 20]);
    }
}
