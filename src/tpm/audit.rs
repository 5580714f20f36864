//! Running audit digest.

use crate::constants::ord;
use crate::crypto::sha1;
use crate::crypto::Digest;
use crate::error::CmdError;
use crate::error::CmdResult;
use crate::rc::TpmRc;

use super::state::TestState;
use super::Tpm12;

impl Tpm12 {
    /// Fold one audited command into the audit digest.
    ///
    /// Any failure along the way puts the TPM into failure mode and turns the
    /// command's result into `TPM_AUDITFAIL_SUCCESSFUL`, even though the
    /// command itself already took effect.
    pub(crate) fn process_audit(
        &mut self,
        transport_encrypt: bool,
        in_digest: &Digest,
        out_digest: &Digest,
        ordinal: u32,
    ) -> CmdResult<()> {
        match self.extend_audit_digest(transport_encrypt, in_digest, out_digest, ordinal) {
            Ok(()) => Ok(()),
            Err(e) => {
                match &e {
                    CmdError::Rc(rc) => tracing::error!("audit of {:#010x} failed: {}", ordinal, rc),
                    CmdError::Fatal(err) => {
                        tracing::error!("audit of {:#010x} failed: {}", ordinal, err)
                    }
                }
                self.state.test_state = TestState::Failure;
                self.state.permanent_data.audit_failure = true;
                if self.nv_commit().is_err() {
                    tracing::warn!("could not persist the audit failure");
                }
                Err(TpmRc::AUDITFAIL_SUCCESSFUL.into())
            }
        }
    }

    fn extend_audit_digest(
        &mut self,
        transport_encrypt: bool,
        in_digest: &Digest,
        out_digest: &Digest,
        ordinal: u32,
    ) -> CmdResult<()> {
        if self.state.stclear_data.audit_digest == [0; 20] {
            let counter = &mut self.state.permanent_data.audit_monotonic_counter;
            *counter = counter.checked_add(1).ok_or(TpmRc::FAIL)?;
            tracing::debug!("audit counter incremented to {}", counter);
            self.nv_commit()?;
        }

        let in_event = if transport_encrypt {
            sha1(&[&ordinal.to_be_bytes()])
        } else {
            *in_digest
        };
        self.extend_audit(&in_event);

        // state may be gone before the output of SaveState is known
        if ordinal != ord::SAVE_STATE {
            let out_event = if transport_encrypt {
                sha1(&[&TpmRc::SUCCESS.0.to_be_bytes(), &ordinal.to_be_bytes()])
            } else {
                *out_digest
            };
            self.extend_audit(&out_event);
        }

        Ok(())
    }

    fn extend_audit(&mut self, event: &Digest) {
        let digest = &mut self.state.stclear_data.audit_digest;
        *digest = sha1(&[&digest[..], event]);
        tracing::trace!("audit digest extended");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpm::tests::started_tpm;
    use crate::tpm::tests::FailingNv;

    #[test]
    fn counter_increments_once_per_zero_transition() {
        let mut tpm = started_tpm();
        let counter = tpm.state.permanent_data.audit_monotonic_counter;

        tpm.process_audit(false, &[1; 20], &[2; 20], ord::PHYSICAL_ENABLE)
            .unwrap();
        assert_eq!(tpm.state.permanent_data.audit_monotonic_counter, counter + 1);
        let first = tpm.state.stclear_data.audit_digest;
        let expected = sha1(&[&sha1(&[&[0; 20], &[1; 20]]), &[2; 20]]);
        assert_eq!(first, expected);

        tpm.process_audit(false, &[1; 20], &[2; 20], ord::PHYSICAL_ENABLE)
            .unwrap();
        assert_eq!(tpm.state.permanent_data.audit_monotonic_counter, counter + 1);
        assert_ne!(tpm.state.stclear_data.audit_digest, first);
    }

    #[test]
    fn encrypted_transport_hides_parameters() {
        let mut tpm = started_tpm();
        tpm.process_audit(true, &[1; 20], &[2; 20], ord::EXTEND).unwrap();
        let ord_be = ord::EXTEND.to_be_bytes();
        let in_event = sha1(&[&ord_be]);
        let out_event = sha1(&[&[0, 0, 0, 0], &ord_be]);
        let expected = sha1(&[&sha1(&[&[0; 20], &in_event]), &out_event]);
        assert_eq!(tpm.state.stclear_data.audit_digest, expected);
    }

    #[test]
    fn save_state_only_audits_input() {
        let mut tpm = started_tpm();
        tpm.process_audit(false, &[1; 20], &[2; 20], ord::SAVE_STATE)
            .unwrap();
        assert_eq!(
            tpm.state.stclear_data.audit_digest,
            sha1(&[&[0; 20], &[1; 20]])
        );
    }

    #[test]
    fn commit_failure_latches_failure_mode() {
        let (mut tpm, fail) = FailingNv::started_tpm();
        fail.set(true);
        let err = tpm
            .process_audit(false, &[1; 20], &[2; 20], ord::PHYSICAL_ENABLE)
            .unwrap_err();
        assert!(matches!(err, CmdError::Rc(TpmRc::AUDITFAIL_SUCCESSFUL)));
        assert!(tpm.in_failure_mode());
        assert!(tpm.state.permanent_data.audit_failure);
    }
}
