//! Tick counter behind TPM_CURRENT_TICKS.

use serde::Deserialize;
use serde::Serialize;

use crate::codec::WriteBe;
use crate::constants::structure_tag;
use crate::crypto::Digest;
use crate::error::Error;

use super::Tpm12;

/// Microseconds per tick
const TICK_RATE: u16 = 1;

#[derive(Clone, Serialize, Deserialize)]
pub(crate) struct TickState {
    // Platform time (us) observed by the previous read.
    last_system_time: u128,
    current_ticks: u64,
    tick_nonce: Digest,
}

impl TickState {
    pub fn new() -> TickState {
        TickState {
            last_system_time: 0,
            current_ticks: 0,
            tick_nonce: [0; 20],
        }
    }
}

impl Tpm12 {
    /// Start a new tick session: the count restarts from zero under a fresh
    /// nonce.
    pub(crate) fn tick_session_reset(&mut self) -> Result<(), Error> {
        self.state.ticks = TickState::new();
        self.state.ticks.tick_nonce = self.nonce_generate()?;
        Ok(())
    }

    pub(crate) fn ticks_read(&mut self) -> u64 {
        let now = self.callbacks.monotonic_timer().as_micros();
        let TickState {
            last_system_time,
            current_ticks,
            ..
        } = &mut self.state.ticks;

        if *last_system_time == 0 {
            *last_system_time = now;
        }

        // The platform clock may bounce around (e.g. across a state restore).
        // Ticks never go backwards: a clock that appears to have moved back
        // simply becomes the new reference point.
        if now > *last_system_time {
            let delta = now - *last_system_time;
            *current_ticks = current_ticks.saturating_add(delta.min(u64::MAX as u128) as u64);
        }
        *last_system_time = now;

        *current_ticks
    }

    /// Milliseconds since the tick session started.
    pub(crate) fn timer_ms(&mut self) -> u64 {
        self.ticks_read() / 1000
    }

    /// Append a `TPM_CURRENT_TICKS` structure.
    pub(crate) fn store_current_ticks(&mut self, out: &mut Vec<u8>) -> u64 {
        let ticks = self.ticks_read();
        out.put_u16(structure_tag::CURRENT_TICKS);
        out.put_u64(ticks);
        out.put_u16(TICK_RATE);
        out.put_bytes(&self.state.ticks.tick_nonce);
        ticks
    }
}
