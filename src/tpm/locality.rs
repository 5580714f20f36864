//! LocalityPlat

use serde::Deserialize;
use serde::Serialize;

use crate::rc::TpmRc;

use super::Tpm12;

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct LocalityState {
    pub locality: u8,
}

impl LocalityState {
    pub fn new() -> LocalityState {
        LocalityState { locality: 0 }
    }
}

impl Tpm12 {
    /// Set the locality of the commands that follow.
    pub fn set_locality(&mut self, mut locality: u8) {
        if locality > 4 {
            tracing::warn!(
                "tried to set invalid locality {}. defaulting to zero...",
                locality
            );
            locality = 0;
        }

        self.state.locality.locality = locality;
    }

    /// Locality latched for the command being processed.
    pub(crate) fn locality(&self) -> u32 {
        self.state.stany_flags.locality_modifier
    }

    /// `allowed` is a `TPM_LOCALITY_SELECTION` bitmap.
    pub(crate) fn check_locality(&self, allowed: u8) -> Result<(), TpmRc> {
        let locality = self.locality();
        if locality > 4 || allowed & (1 << locality) == 0 {
            tracing::debug!("locality {} not in {:#04x}", locality, allowed);
            return Err(TpmRc::BAD_LOCALITY);
        }
        Ok(())
    }
}
