// Copyright (C) Microsoft Corporation. All rights reserved.

//! Drives a freshly manufactured TPM 1.2 instance through a short command
//! script and logs every response.
//!
//! Set `RUST_LOG=tpm12_ref=trace` to see the command processor's own events.

use std::error::Error;
use std::time::Duration;
use std::time::Instant;

use tpm12_ref::constants::cap;
use tpm12_ref::constants::ord;
use tpm12_ref::constants::st;
use tpm12_ref::constants::tag;
use tpm12_ref::Config;
use tpm12_ref::DynResult;
use tpm12_ref::InitKind;
use tpm12_ref::PlatformCallbacks;
use tpm12_ref::Tpm12;
use tpm12_ref::TpmRc;
use tracing_subscriber::EnvFilter;

/// Keeps the NV blob in memory and reads time from the host clock.
struct HarnessPlatform {
    start: Instant,
    nvmem: Vec<u8>,
    seed: u64,
}

impl PlatformCallbacks for HarnessPlatform {
    fn commit_nv_state(&mut self, state: &[u8]) -> DynResult<()> {
        tracing::debug!("nv commit of {} bytes", state.len());
        self.nvmem = state.to_vec();
        Ok(())
    }

    // xorshift, good enough for a harness
    fn get_crypt_random(&mut self, buf: &mut [u8]) -> DynResult<usize> {
        for b in buf.iter_mut() {
            self.seed ^= self.seed << 13;
            self.seed ^= self.seed >> 7;
            self.seed ^= self.seed << 17;
            *b = self.seed as u8;
        }
        Ok(buf.len())
    }

    fn monotonic_timer(&mut self) -> Duration {
        self.start.elapsed()
    }

    fn physical_presence_asserted(&mut self) -> bool {
        false
    }
}

fn command(ordinal: u32, body: &[u8]) -> Vec<u8> {
    let mut cmd = Vec::with_capacity(10 + body.len());
    cmd.extend_from_slice(&tag::RQU_COMMAND.to_be_bytes());
    cmd.extend_from_slice(&((10 + body.len()) as u32).to_be_bytes());
    cmd.extend_from_slice(&ordinal.to_be_bytes());
    cmd.extend_from_slice(body);
    cmd
}

fn get_capability(area: u32, sub_cap: &[u8]) -> Vec<u8> {
    let mut body = area.to_be_bytes().to_vec();
    body.extend_from_slice(&(sub_cap.len() as u32).to_be_bytes());
    body.extend_from_slice(sub_cap);
    command(ord::GET_CAPABILITY, &body)
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let platform = HarnessPlatform {
        start: Instant::now(),
        nvmem: Vec::new(),
        seed: 0x2545_F491_4F6C_DD1D,
    };
    let mut tpm = Tpm12::initialize(Box::new(platform), InitKind::ColdInit, Config::default())?;

    let mut extend = 10u32.to_be_bytes().to_vec();
    extend.extend_from_slice(&[0xAB; 20]);

    let script: Vec<(&str, Vec<u8>)> = vec![
        ("Startup(ST_CLEAR)", command(ord::STARTUP, &st::CLEAR.to_be_bytes())),
        ("GetCapability(VERSION_VAL)", get_capability(cap::VERSION_VAL, &[])),
        (
            "GetCapability(ORD, GetCapability)",
            get_capability(cap::ORD, &ord::GET_CAPABILITY.to_be_bytes()),
        ),
        ("ContinueSelfTest", command(ord::CONTINUE_SELF_TEST, &[])),
        ("GetTestResult", command(ord::GET_TEST_RESULT, &[])),
        ("GetRandom(16)", command(ord::GET_RANDOM, &16u32.to_be_bytes())),
        ("Extend(10)", command(ord::EXTEND, &extend)),
        ("PCRRead(10)", command(ord::PCR_READ, &10u32.to_be_bytes())),
        ("GetTicks", command(ord::GET_TICKS, &[])),
        ("GetAuditDigest", command(ord::GET_AUDIT_DIGEST, &0u32.to_be_bytes())),
        ("SaveState", command(ord::SAVE_STATE, &[])),
    ];

    for (name, cmd) in script {
        let rsp = tpm.process(&cmd)?;
        let rc = TpmRc(u32::from_be_bytes([rsp[6], rsp[7], rsp[8], rsp[9]]));
        tracing::info!("{}: {} {}", name, rc, hex(&rsp[10..]));
    }

    tpm.reset(None)?;
    let rsp = tpm.process(&command(ord::STARTUP, &st::STATE.to_be_bytes()))?;
    tracing::info!("Startup(ST_STATE) after reset: {}", hex(&rsp));
    let rsp = tpm.process(&command(ord::PCR_READ, &10u32.to_be_bytes()))?;
    tracing::info!("PCRRead(10) after resume: {}", hex(&rsp[10..]));

    Ok(())
}
