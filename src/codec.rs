//! Big-endian parameter codec shared by every command handler.

use std::convert::TryFrom;
use std::convert::TryInto;

use crate::constants::limits::COMMAND_HEADER_SIZE;
use crate::constants::tag;
use crate::error::Error;
use crate::rc::TpmRc;

/// Bounds-checked cursor over a command (or wrapped response) byte stream.
///
/// Running out of bytes is always reported as `TPM_BAD_PARAM_SIZE`: the
/// declared paramSize promised more data than was delivered.
#[derive(Clone, Debug)]
pub(crate) struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Reader<'a> {
        Reader { buf, pos: 0 }
    }

    /// Offset of the cursor from the start of the underlying buffer.
    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Bytes between two offsets previously returned by [`Reader::position`].
    pub fn span(&self, start: usize, end: usize) -> &'a [u8] {
        self.buf.get(start..end).unwrap_or(&[])
    }

    pub fn take(&mut self, len: usize) -> Result<&'a [u8], TpmRc> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.buf.len())
            .ok_or(TpmRc::BAD_PARAM_SIZE)?;
        let bytes = &self.buf[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    pub fn array<const N: usize>(&mut self) -> Result<[u8; N], TpmRc> {
        let bytes = self.take(N)?;
        // length is guaranteed by `take`
        Ok(bytes.try_into().unwrap_or([0; N]))
    }

    pub fn u8(&mut self) -> Result<u8, TpmRc> {
        Ok(self.array::<1>()?[0])
    }

    pub fn u16(&mut self) -> Result<u16, TpmRc> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    pub fn u32(&mut self) -> Result<u32, TpmRc> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    /// A `TPM_BOOL`, which must be exactly 0 or 1.
    pub fn bool(&mut self) -> Result<bool, TpmRc> {
        match self.u8()? {
            0 => Ok(false),
            1 => Ok(true),
            other => {
                tracing::debug!("invalid TPM_BOOL value {:#x}", other);
                Err(TpmRc::BAD_PARAMETER)
            }
        }
    }

    /// A `u32` length prefixed buffer (`TPM_SIZED_BUFFER` and friends).
    pub fn sized(&mut self) -> Result<&'a [u8], TpmRc> {
        let len = self.u32()?;
        self.take(len as usize)
    }

    /// Fails with `TPM_BAD_PARAM_SIZE` if any unconsumed bytes remain.
    pub fn finish(&self) -> Result<(), TpmRc> {
        if self.remaining() != 0 {
            tracing::debug!("{} extra bytes at end of command", self.remaining());
            return Err(TpmRc::BAD_PARAM_SIZE);
        }
        Ok(())
    }
}

/// Appends big-endian encoded values onto a byte vector.
pub(crate) trait WriteBe {
    fn put_u8(&mut self, v: u8);
    fn put_u16(&mut self, v: u16);
    fn put_u32(&mut self, v: u32);
    fn put_u64(&mut self, v: u64);
    fn put_bool(&mut self, v: bool);
    fn put_bytes(&mut self, v: &[u8]);
    /// `u32` length followed by the bytes
    fn put_sized(&mut self, v: &[u8]);
}

impl WriteBe for Vec<u8> {
    fn put_u8(&mut self, v: u8) {
        self.push(v)
    }

    fn put_u16(&mut self, v: u16) {
        self.extend_from_slice(&v.to_be_bytes())
    }

    fn put_u32(&mut self, v: u32) {
        self.extend_from_slice(&v.to_be_bytes())
    }

    fn put_u64(&mut self, v: u64) {
        self.extend_from_slice(&v.to_be_bytes())
    }

    fn put_bool(&mut self, v: bool) {
        self.push(v as u8)
    }

    fn put_bytes(&mut self, v: &[u8]) {
        self.extend_from_slice(v)
    }

    fn put_sized(&mut self, v: &[u8]) {
        self.put_u32(v.len() as u32);
        self.extend_from_slice(v)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct CommandHeader {
    pub tag: u16,
    pub param_size: u32,
    pub ordinal: u32,
}

/// Parse the fixed command header and verify that paramSize matches the
/// number of bytes actually delivered.
pub(crate) fn parse_command_header(command: &[u8]) -> Result<(CommandHeader, Reader<'_>), TpmRc> {
    let mut reader = Reader::new(command);
    let tag = reader.u16()?;
    let param_size = reader.u32()?;
    let ordinal = reader.u32()?;

    if param_size as usize != command.len() {
        tracing::debug!(
            "paramSize {} does not match command length {}",
            param_size,
            command.len()
        );
        return Err(TpmRc::BAD_PARAM_SIZE);
    }

    Ok((
        CommandHeader {
            tag,
            param_size,
            ordinal,
        },
        reader,
    ))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ResponseHeader {
    pub tag: u16,
    pub param_size: u32,
    pub return_code: TpmRc,
}

/// Response side mirror of [`parse_command_header`].
pub(crate) fn parse_response_header(
    response: &[u8],
) -> Result<(ResponseHeader, Reader<'_>), TpmRc> {
    let mut reader = Reader::new(response);
    let tag = reader.u16()?;
    let param_size = reader.u32()?;
    let return_code = TpmRc(reader.u32()?);

    if param_size as usize != response.len() {
        return Err(TpmRc::BAD_PARAM_SIZE);
    }

    Ok((
        ResponseHeader {
            tag,
            param_size,
            return_code,
        },
        reader,
    ))
}

/// Map a request tag onto the matching response tag.
pub(crate) fn response_tag(request_tag: u16, rc: TpmRc) -> u16 {
    if !rc.is_success() {
        return tag::RSP_COMMAND;
    }
    match request_tag {
        tag::RQU_AUTH1_COMMAND => tag::RSP_AUTH1_COMMAND,
        tag::RQU_AUTH2_COMMAND => tag::RSP_AUTH2_COMMAND,
        _ => tag::RSP_COMMAND,
    }
}

/// An outgoing response, assembled front to back.
pub(crate) struct ResponseBuffer {
    buf: Vec<u8>,
}

impl ResponseBuffer {
    /// Writes the response tag, a paramSize placeholder and the return code.
    pub fn store_initial_response(request_tag: u16, rc: TpmRc) -> ResponseBuffer {
        let mut buf = Vec::with_capacity(COMMAND_HEADER_SIZE);
        buf.put_u16(response_tag(request_tag, rc));
        buf.put_u32(0);
        buf.put_u32(rc.0);
        ResponseBuffer { buf }
    }

    pub fn body(&mut self) -> &mut Vec<u8> {
        &mut self.buf
    }

    /// Patch paramSize. An error return code discards everything written so
    /// far in favor of the bare {tag, paramSize, returnCode} form.
    pub fn store_final_response(mut self, rc: TpmRc) -> Result<Vec<u8>, Error> {
        if !rc.is_success() {
            self = ResponseBuffer::store_initial_response(tag::RSP_COMMAND, rc);
        }

        let len = self.buf.len();
        let param_size = u32::try_from(len).map_err(|_| Error::ResponseTooLarge(len))?;
        self.buf[2..6].copy_from_slice(&param_size.to_be_bytes());
        Ok(self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_size_must_match() {
        let cmd = [0x00, 0xC1, 0, 0, 0, 10, 0, 0, 0, 0x65];
        let (hdr, reader) = parse_command_header(&cmd).unwrap();
        assert_eq!(hdr.ordinal, 0x65);
        assert_eq!(reader.remaining(), 0);

        let short = [0x00, 0xC1, 0, 0, 0, 11, 0, 0, 0, 0x65];
        assert_eq!(
            parse_command_header(&short).unwrap_err(),
            TpmRc::BAD_PARAM_SIZE
        );
        assert_eq!(
            parse_command_header(&cmd[..6]).unwrap_err(),
            TpmRc::BAD_PARAM_SIZE
        );
    }

    #[test]
    fn reader_bounds() {
        let data = [0, 0, 0, 3, 0xAA, 0xBB];
        let mut reader = Reader::new(&data);
        assert_eq!(reader.sized().unwrap_err(), TpmRc::BAD_PARAM_SIZE);

        let mut reader = Reader::new(&data[..]);
        assert_eq!(reader.u16().unwrap(), 0);
        assert_eq!(reader.u16().unwrap(), 3);
        assert!(reader.finish().is_err());
        assert_eq!(reader.take(2).unwrap(), &[0xAA, 0xBB]);
        assert!(reader.finish().is_ok());
    }

    #[test]
    fn strict_bool() {
        assert_eq!(Reader::new(&[1]).bool(), Ok(true));
        assert_eq!(Reader::new(&[2]).bool(), Err(TpmRc::BAD_PARAMETER));
    }

    #[test]
    fn error_response_is_rewritten() {
        let mut rsp = ResponseBuffer::store_initial_response(tag::RQU_AUTH1_COMMAND, TpmRc::SUCCESS);
        rsp.body().put_u32(0xdead_beef);
        let out = rsp.store_final_response(TpmRc::AUTHFAIL).unwrap();
        assert_eq!(out, vec![0x00, 0xC4, 0, 0, 0, 10, 0, 0, 0, 1]);
    }

    #[test]
    fn success_response_tag() {
        let mut rsp = ResponseBuffer::store_initial_response(tag::RQU_AUTH1_COMMAND, TpmRc::SUCCESS);
        rsp.body().put_u8(7);
        let out = rsp.store_final_response(TpmRc::SUCCESS).unwrap();
        assert_eq!(out, vec![0x00, 0xC5, 0, 0, 0, 11, 0, 0, 0, 0, 7]);
    }
}
