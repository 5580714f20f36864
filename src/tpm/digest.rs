//! Digests over the "above the line" input and output parameters.

use crate::constants::tag;
use crate::crypto::sha1;
use crate::crypto::Digest;
use crate::rc::TpmRc;

use super::process::TransportCtx;
use super::Tpm12;

#[derive(Debug, Clone, Copy, Default)]
pub(crate) struct InParamDigest {
    /// All zeros when neither authorization nor audit needs it
    pub digest: Digest,
    pub audit_status: bool,
    pub transport_encrypt: bool,
}

/// SHA1(ordinal || params)
pub(crate) fn in_param_digest(ordinal: u32, params: &[u8]) -> Digest {
    sha1(&[&ordinal.to_be_bytes(), params])
}

/// SHA1(returnCode || ordinal || params), computed under the same condition
/// as the input digest.
pub(crate) fn get_out_param_digest(
    audit_status: bool,
    transport_encrypt: bool,
    request_tag: u16,
    rc: TpmRc,
    ordinal: u32,
    params: &[u8],
) -> Digest {
    if (audit_status && !transport_encrypt) || request_tag != tag::RQU_COMMAND {
        sha1(&[&rc.0.to_be_bytes(), &ordinal.to_be_bytes(), params])
    } else {
        [0; 20]
    }
}

impl Tpm12 {
    pub(crate) fn ordinal_audit_status(&self, ordinal: u32) -> bool {
        self.state
            .permanent_data
            .ordinal_audit_status
            .contains(&ordinal)
    }

    pub(crate) fn get_in_param_digest(
        &self,
        request_tag: u16,
        ordinal: u32,
        params: &[u8],
        transport: Option<TransportCtx>,
    ) -> InParamDigest {
        let audit_status = self.ordinal_audit_status(ordinal);
        let transport_encrypt = transport.map_or(false, |t| t.encrypt);

        let digest = if (audit_status && !transport_encrypt) || request_tag != tag::RQU_COMMAND {
            in_param_digest(ordinal, params)
        } else {
            [0; 20]
        };

        InParamDigest {
            digest,
            audit_status,
            transport_encrypt,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ord;
    use crate::tpm::tests::started_tpm;

    #[test]
    fn empty_params_digest_the_ordinal() {
        assert_eq!(
            in_param_digest(ord::OIAP, &[]),
            sha1(&[&[0, 0, 0, 0x0a]])
        );
    }

    #[test]
    fn digest_is_deterministic() {
        let tpm = started_tpm();
        let params = [0, 0, 0, 1, 0, 0, 0, 4, 0, 0, 0, 0x65];
        let a = tpm.get_in_param_digest(tag::RQU_AUTH1_COMMAND, ord::GET_CAPABILITY, &params, None);
        let b = tpm.get_in_param_digest(tag::RQU_AUTH1_COMMAND, ord::GET_CAPABILITY, &params, None);
        assert_eq!(a.digest, b.digest);
        assert_eq!(a.digest, in_param_digest(ord::GET_CAPABILITY, &params));
    }

    #[test]
    fn digest_skipped_when_not_needed() {
        let tpm = started_tpm();
        let d = tpm.get_in_param_digest(tag::RQU_COMMAND, ord::GET_CAPABILITY, &[1, 2, 3], None);
        assert!(!d.audit_status);
        assert_eq!(d.digest, [0; 20]);

        // audited, but the parameters are hidden by transport encryption
        let encrypted = Some(TransportCtx {
            handle: 1,
            encrypt: true,
        });
        let d = tpm.get_in_param_digest(tag::RQU_COMMAND, ord::PHYSICAL_ENABLE, &[], encrypted);
        assert!(d.audit_status);
        assert!(d.transport_encrypt);
        assert_eq!(d.digest, [0; 20]);

        let d = tpm.get_in_param_digest(tag::RQU_COMMAND, ord::PHYSICAL_ENABLE, &[], None);
        assert_eq!(d.digest, in_param_digest(ord::PHYSICAL_ENABLE, &[]));
    }

    #[test]
    fn out_digest_folds_in_return_code() {
        let d = get_out_param_digest(false, false, tag::RQU_AUTH1_COMMAND, TpmRc::SUCCESS, 0x65, &[7]);
        assert_eq!(d, sha1(&[&[0, 0, 0, 0], &[0, 0, 0, 0x65], &[7]]));
        let skipped = get_out_param_digest(false, false, tag::RQU_COMMAND, TpmRc::SUCCESS, 0x65, &[7]);
        assert_eq!(skipped, [0; 20]);
    }
}
