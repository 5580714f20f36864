//! NVMem: the permanent flags and data, handed to the platform as one blob.

use serde::Deserialize;
use serde::Serialize;

use crate::error::CmdResult;
use crate::error::Error;
use crate::error::NvError;
use crate::rc::TpmRc;

use super::state::PermanentData;
use super::state::PermanentFlags;
use super::Tpm12;

const NV_LAYOUT_REVISION: u16 = 1;

#[derive(Serialize)]
struct NvBlobRef<'a> {
    revision: u16,
    flags: &'a PermanentFlags,
    data: &'a PermanentData,
}

#[derive(Deserialize)]
struct NvBlob {
    revision: u16,
    flags: PermanentFlags,
    data: PermanentData,
}

pub(crate) fn nv_load(blob: &[u8]) -> Result<(PermanentFlags, PermanentData), NvError> {
    let blob: NvBlob = postcard::from_bytes(blob).map_err(NvError::InvalidBlob)?;
    if blob.revision != NV_LAYOUT_REVISION {
        return Err(NvError::MismatchedRevision {
            found: blob.revision,
        });
    }
    Ok((blob.flags, blob.data))
}

impl Tpm12 {
    fn nv_serialize(&self) -> Result<Vec<u8>, Error> {
        postcard::to_stdvec(&NvBlobRef {
            revision: NV_LAYOUT_REVISION,
            flags: &self.state.permanent_flags,
            data: &self.state.permanent_data,
        })
        .map_err(Error::FailedStateSave)
    }

    /// Hand the permanent state to the platform.
    pub(crate) fn nv_store(&mut self) -> Result<(), Error> {
        let blob = self.nv_serialize()?;
        tracing::debug!("committing {} bytes of nv state", blob.len());
        self.callbacks
            .commit_nv_state(&blob)
            .map_err(Error::PlatformCallback)
    }

    /// Durably store the permanent state on behalf of a command. A platform
    /// failure is reported as `TPM_FAIL`.
    pub(crate) fn nv_commit(&mut self) -> CmdResult<()> {
        match self.nv_store() {
            Ok(()) => Ok(()),
            Err(Error::PlatformCallback(e)) => {
                tracing::error!("failed to commit nv state: {}", e);
                Err(TpmRc::FAIL.into())
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tpm::tests::started_tpm;
    use crate::tpm::tests::FailingNv;

    #[test]
    fn blob_roundtrip_preserves_state() {
        let mut tpm = started_tpm();
        tpm.state.permanent_flags.disable = true;
        tpm.state.permanent_data.audit_monotonic_counter = 7;
        let blob = tpm.nv_serialize().unwrap();

        let (flags, data) = nv_load(&blob).unwrap();
        assert!(flags.disable);
        assert_eq!(data.audit_monotonic_counter, 7);
    }

    #[test]
    fn platform_failure_is_tpm_fail() {
        let (mut tpm, fail) = FailingNv::started_tpm();
        assert!(tpm.nv_commit().is_ok());
        fail.set(true);
        assert!(matches!(
            tpm.nv_commit(),
            Err(crate::error::CmdError::Rc(TpmRc::FAIL))
        ));
        assert!(matches!(tpm.nv_store(), Err(Error::PlatformCallback(_))));
    }

    #[test]
    fn garbage_is_rejected() {
        assert!(matches!(
            nv_load(&[0xff, 0xff, 0xff]),
            Err(NvError::InvalidBlob(_)) | Err(NvError::MismatchedRevision { .. })
        ));
    }
}
