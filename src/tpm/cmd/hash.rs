//! SHA-1 threads, PCRs, random numbers and ticks.

use crate::codec::Reader;
use crate::codec::WriteBe;
use crate::constants::limits::BUFFER_MAX;
use crate::constants::limits::NUM_PCR;
use crate::constants::limits::SHA1_MAX_NUM_BYTES;
use crate::crypto::sha1;
use crate::crypto::Digest;
use crate::crypto::Sha1;
use crate::error::CmdResult;
use crate::rc::TpmRc;

use crate::tpm::check::check_request_tag0;
use crate::tpm::check::StateCheck;
use crate::tpm::process::Command;
use crate::tpm::process::Exchange;
use crate::tpm::process::Reply;
use crate::tpm::Sha1Thread;
use crate::tpm::Tpm12;

const SHA1_BLOCK_SIZE: usize = 64;

/// Room left for random bytes once the response header and size are written.
const MAX_RANDOM_BYTES: u32 = (BUFFER_MAX - 10 - 4) as u32;

fn pcr_index(params: &mut Reader<'_>) -> Result<u32, TpmRc> {
    params.u32()
}

fn check_pcr(index: u32) -> Result<usize, TpmRc> {
    let index = index as usize;
    if index >= NUM_PCR {
        tracing::debug!("PCR {} out of range", index);
        return Err(TpmRc::BADINDEX);
    }
    Ok(index)
}

impl Tpm12 {
    fn pcr_extend(&mut self, index: usize, event: &Digest) -> Digest {
        let pcr = &mut self.state.stclear_data.pcrs[index];
        *pcr = sha1(&[&pcr[..], event]);
        tracing::trace!("extended PCR {}", index);
        *pcr
    }

    /// The value reported back by an extend. A deactivated TPM hides it.
    fn extend_result(&self, value: Digest) -> Digest {
        if self.state.stclear_flags.deactivated {
            [0; 20]
        } else {
            value
        }
    }

    pub(crate) fn cmd_sha1_start(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        self.sha1_thread = Some(Sha1Thread {
            ctx: Sha1::new(),
            transport_handle: cmd.transport.map(|t| t.handle),
        });
        tracing::debug!("SHA-1 thread started");

        let mut out = Vec::new();
        out.put_u32(SHA1_MAX_NUM_BYTES);
        Ok(Reply::params(out))
    }

    pub(crate) fn cmd_sha1_update(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let data = cmd.params.sized()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let thread = self.sha1_thread.as_mut().ok_or_else(|| {
            tracing::debug!("no SHA-1 thread");
            TpmRc::SHA_THREAD
        })?;
        if data.len() % SHA1_BLOCK_SIZE != 0 {
            tracing::debug!("SHA-1 update of {} bytes is not block aligned", data.len());
            self.sha1_thread = None;
            return Err(TpmRc::SHA_ERROR.into());
        }
        thread.ctx.update(data);
        Ok(Reply::default())
    }

    fn sha1_final(&mut self, data: &[u8]) -> Result<Digest, TpmRc> {
        if data.len() > SHA1_BLOCK_SIZE {
            tracing::debug!("SHA-1 complete with {} bytes", data.len());
            self.sha1_thread = None;
            return Err(TpmRc::SHA_ERROR);
        }
        let mut thread = self.sha1_thread.take().ok_or(TpmRc::SHA_THREAD)?;
        thread.ctx.update(data);
        Ok(thread.ctx.finish())
    }

    pub(crate) fn cmd_sha1_complete(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let data = cmd.params.sized()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let digest = self.sha1_final(data)?;
        Ok(Reply::params(digest.to_vec()))
    }

    pub(crate) fn cmd_sha1_complete_extend(
        &mut self,
        cmd: &mut Command<'_>,
        ex: &mut Exchange,
    ) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let index = pcr_index(&mut cmd.params)?;
        let data = cmd.params.sized()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let index = check_pcr(index)?;
        let digest = self.sha1_final(data)?;
        let value = self.pcr_extend(index, &digest);

        let mut out = Vec::new();
        out.put_bytes(&digest);
        out.put_bytes(&self.extend_result(value));
        Ok(Reply::params(out))
    }

    pub(crate) fn cmd_extend(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let index = pcr_index(&mut cmd.params)?;
        let event: Digest = cmd.params.array()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::NOT_SHUTDOWN | StateCheck::NO_LOCKOUT)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let index = check_pcr(index)?;
        let value = self.pcr_extend(index, &event);
        Ok(Reply::params(self.extend_result(value).to_vec()))
    }

    pub(crate) fn cmd_pcr_read(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let index = pcr_index(&mut cmd.params)?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::ALLOW_NO_OWNER)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let index = check_pcr(index)?;
        Ok(Reply::params(self.state.stclear_data.pcrs[index].to_vec()))
    }

    pub(crate) fn cmd_get_random(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        let requested = cmd.params.u32()?;
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::ALLOW_NO_OWNER)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let mut bytes = vec![0; requested.min(MAX_RANDOM_BYTES) as usize];
        self.random_fill(&mut bytes)?;

        let mut out = Vec::with_capacity(4 + bytes.len());
        out.put_sized(&bytes);
        Ok(Reply::params(out))
    }

    pub(crate) fn cmd_get_ticks(&mut self, cmd: &mut Command<'_>, ex: &mut Exchange) -> CmdResult<Reply> {
        let start = cmd.params.position();
        self.digest_inputs(cmd, ex, start);
        self.check_state(cmd.tag, StateCheck::ALLOW_NO_OWNER)?;
        check_request_tag0(cmd.tag)?;
        cmd.params.finish()?;

        let mut out = Vec::new();
        self.store_current_ticks(&mut out);
        Ok(Reply::params(out))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ord;
    use crate::constants::tag;
    use crate::tpm::tests::started_tpm;

    fn run(tpm: &mut Tpm12, ordinal: u32, body: &[u8]) -> Vec<u8> {
        let mut cmd = Vec::new();
        cmd.put_u16(tag::RQU_COMMAND);
        cmd.put_u32((10 + body.len()) as u32);
        cmd.put_u32(ordinal);
        cmd.put_bytes(body);
        tpm.process(&cmd).unwrap()
    }

    fn rc(rsp: &[u8]) -> TpmRc {
        TpmRc(u32::from_be_bytes([rsp[6], rsp[7], rsp[8], rsp[9]]))
    }

    fn sized(data: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.put_sized(data);
        out
    }

    #[test]
    fn sha1_thread_matches_one_shot_digest() {
        let mut tpm = started_tpm();
        let rsp = run(&mut tpm, ord::SHA1_START, &[]);
        assert_eq!(&rsp[10..], &SHA1_MAX_NUM_BYTES.to_be_bytes());

        let block = [0x61; 64];
        assert_eq!(rc(&run(&mut tpm, ord::SHA1_UPDATE, &sized(&block))), TpmRc::SUCCESS);
        let rsp = run(&mut tpm, ord::SHA1_COMPLETE, &sized(b"tail"));
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert_eq!(&rsp[10..], &sha1(&[&block, b"tail"]));

        // the thread is gone
        let rsp = run(&mut tpm, ord::SHA1_COMPLETE, &sized(b""));
        assert_eq!(rc(&rsp), TpmRc::SHA_THREAD);
    }

    #[test]
    fn unaligned_update() {
        let mut tpm = started_tpm();
        run(&mut tpm, ord::SHA1_START, &[]);
        let rsp = run(&mut tpm, ord::SHA1_UPDATE, &sized(&[0; 10]));
        assert_eq!(rc(&rsp), TpmRc::SHA_ERROR);
    }

    #[test]
    fn other_commands_invalidate_the_thread() {
        let mut tpm = started_tpm();
        run(&mut tpm, ord::SHA1_START, &[]);
        run(&mut tpm, ord::PCR_READ, &[0, 0, 0, 0]);
        let rsp = run(&mut tpm, ord::SHA1_UPDATE, &sized(&[0; 64]));
        assert_eq!(rc(&rsp), TpmRc::SHA_THREAD);
    }

    #[test]
    fn complete_extend() {
        let mut tpm = started_tpm();
        run(&mut tpm, ord::SHA1_START, &[]);
        let mut body = 10u32.to_be_bytes().to_vec();
        body.extend_from_slice(&sized(b"event"));
        let rsp = run(&mut tpm, ord::SHA1_COMPLETE_EXTEND, &body);
        let event = sha1(&[b"event"]);
        assert_eq!(&rsp[10..30], &event);
        assert_eq!(&rsp[30..50], &sha1(&[&[0; 20], &event]));
        assert_eq!(tpm.state.stclear_data.pcrs[10], sha1(&[&[0; 20], &event]));
    }

    #[test]
    fn extend_and_read() {
        let mut tpm = started_tpm();
        let mut body = 7u32.to_be_bytes().to_vec();
        body.extend_from_slice(&[0xAB; 20]);
        let rsp = run(&mut tpm, ord::EXTEND, &body);
        let expected = sha1(&[&[0; 20], &[0xAB; 20]]);
        assert_eq!(&rsp[10..], &expected);

        let rsp = run(&mut tpm, ord::PCR_READ, &7u32.to_be_bytes());
        assert_eq!(&rsp[10..], &expected);

        let rsp = run(&mut tpm, ord::PCR_READ, &24u32.to_be_bytes());
        assert_eq!(rc(&rsp), TpmRc::BADINDEX);
    }

    #[test]
    fn deactivated_extend_hides_the_value() {
        let mut tpm = started_tpm();
        tpm.state.stclear_flags.deactivated = true;
        let mut body = 1u32.to_be_bytes().to_vec();
        body.extend_from_slice(&[1; 20]);
        let rsp = run(&mut tpm, ord::EXTEND, &body);
        assert_eq!(&rsp[10..], &[0; 20]);
        assert_ne!(tpm.state.stclear_data.pcrs[1], [0; 20]);
    }

    #[test]
    fn random_bytes() {
        let mut tpm = started_tpm();
        let rsp = run(&mut tpm, ord::GET_RANDOM, &16u32.to_be_bytes());
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert_eq!(&rsp[10..14], &16u32.to_be_bytes());
        assert_eq!(rsp.len(), 10 + 4 + 16);

        let rsp = run(&mut tpm, ord::GET_RANDOM, &u32::MAX.to_be_bytes());
        assert_eq!(rsp.len(), BUFFER_MAX);
    }

    #[test]
    fn ticks_structure() {
        let mut tpm = started_tpm();
        let rsp = run(&mut tpm, ord::GET_TICKS, &[]);
        assert_eq!(rc(&rsp), TpmRc::SUCCESS);
        assert_eq!(&rsp[10..12], &[0x00, 0x14]);
        assert_eq!(rsp.len(), 10 + 2 + 8 + 2 + 20);
    }
}
