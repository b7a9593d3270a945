// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TPKT (RFC 1006) framing of COTP transport PDUs.

use byteorder::{BigEndian, ByteOrder as _};
use bytes::{Buf as _, BufMut as _, Bytes, BytesMut};
use tokio_util::codec::{Decoder, Encoder};

use crate::{
    codec::{decode_response_adu, encode_request_pdu, u16_len},
    frame::tpkt::*,
    Error, FramingError, ProtocolError,
};

const TPKT_VERSION: u8 = 0x03;
const TPKT_HEADER_LEN: usize = 4;

const COTP_CR: u8 = 0xE0;
const COTP_CC: u8 = 0xD0;
const COTP_DR: u8 = 0x80;
const COTP_DT: u8 = 0xF0;

/// Last data unit flag of a DT TPDU.
const COTP_EOT: u8 = 0x80;

/// TPDU size parameter value for 1024 bytes.
const COTP_TPDU_SIZE_1024: u8 = 0x0A;

/// Reassembles DT fragments into complete S7 PDUs.
#[derive(Debug)]
pub(crate) struct ClientCodec {
    fragments: BytesMut,
    max_pdu_length: usize,
}

impl ClientCodec {
    pub(crate) fn new(max_pdu_length: u16) -> Self {
        Self {
            fragments: BytesMut::new(),
            max_pdu_length: max_pdu_length.into(),
        }
    }

    /// Limits the size of reassembled PDUs, e.g. after the negotiation.
    pub(crate) fn set_max_pdu_length(&mut self, max_pdu_length: u16) {
        self.max_pdu_length = max_pdu_length.into();
    }

    fn check_pdu_length(&self, len: usize) -> Result<(), FramingError> {
        if len > self.max_pdu_length {
            return Err(FramingError::PduLength {
                max: self.max_pdu_length,
                actual: len,
            });
        }
        Ok(())
    }
}

/// Splits off the COTP part of the next complete TPKT frame.
fn decode_tpkt(buf: &mut BytesMut) -> Result<Option<Bytes>, Error> {
    if buf.len() < TPKT_HEADER_LEN {
        return Ok(None);
    }
    if buf[0] != TPKT_VERSION {
        return Err(FramingError::TpktVersion(buf[0]).into());
    }
    let len = usize::from(BigEndian::read_u16(&buf[2..4]));
    // The COTP header has at least a length indicator and a PDU type
    if len < TPKT_HEADER_LEN + 2 {
        return Err(FramingError::TpktLength(len).into());
    }
    if buf.len() < len {
        buf.reserve(len - buf.len());
        return Ok(None);
    }
    let mut frame = buf.split_to(len);
    frame.advance(TPKT_HEADER_LEN);
    Ok(Some(frame.freeze()))
}

/// Returns the PDU type and the user data following the COTP header.
fn split_cotp(cotp: Bytes) -> Result<(u8, Bytes, Bytes), FramingError> {
    let header_len = usize::from(cotp[0]) + 1;
    if header_len < 2 || cotp.len() < header_len {
        return Err(FramingError::truncated("COTP header", header_len, cotp.len()));
    }
    let pdu_type = cotp[1];
    let header = cotp.slice(..header_len);
    let payload = cotp.slice(header_len..);
    Ok((pdu_type, header, payload))
}

fn decode_connect_confirm(header: &[u8]) -> Result<ConnectConfirm, FramingError> {
    if header.len() < 7 {
        return Err(FramingError::truncated("COTP connection confirm", 7, header.len()));
    }
    Ok(ConnectConfirm {
        dst_ref: BigEndian::read_u16(&header[2..4]),
        src_ref: BigEndian::read_u16(&header[4..6]),
    })
}

impl Decoder for ClientCodec {
    type Item = Tpdu;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<Tpdu>, Error> {
        while let Some(cotp) = decode_tpkt(buf)? {
            let (pdu_type, header, payload) = split_cotp(cotp)?;
            match pdu_type {
                COTP_CC => {
                    let confirm = decode_connect_confirm(&header)?;
                    return Ok(Some(Tpdu::ConnectConfirm(confirm)));
                }
                COTP_DT => {
                    if header.len() < 3 {
                        return Err(FramingError::truncated("COTP data", 3, header.len()).into());
                    }
                    let eot = header[2] & COTP_EOT != 0;
                    self.check_pdu_length(self.fragments.len() + payload.len())?;
                    if !eot {
                        log::trace!("Received fragment with {} bytes", payload.len());
                        self.fragments.extend_from_slice(&payload);
                        continue;
                    }
                    let pdu = if self.fragments.is_empty() {
                        payload
                    } else {
                        self.fragments.extend_from_slice(&payload);
                        self.fragments.split().freeze()
                    };
                    return decode_response_adu(pdu).map(|adu| Some(Tpdu::Data(adu)));
                }
                COTP_DR => {
                    return Err(ProtocolError::ConnectionRejected("disconnect request").into());
                }
                other => return Err(FramingError::CotpPduType(other).into()),
            }
        }
        Ok(None)
    }
}

impl<'a, 'b> Encoder<&'b RequestAdu<'a>> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, adu: &'b RequestAdu<'a>, buf: &mut BytesMut) -> Result<(), Error> {
        let RequestAdu { hdr, pdu } = adu;
        let start = buf.len();
        buf.put_u8(TPKT_VERSION);
        buf.put_u8(0x00);
        buf.put_u16(0);
        buf.put_slice(&[0x02, COTP_DT, COTP_EOT]);
        encode_request_pdu(buf, *hdr, &pdu.0);
        let len = buf.len() - start;
        BigEndian::write_u16(&mut buf[start + 2..start + 4], u16_len(len));
        Ok(())
    }
}

impl Encoder<ConnectRequest> for ClientCodec {
    type Error = Error;

    fn encode(&mut self, req: ConnectRequest, buf: &mut BytesMut) -> Result<(), Error> {
        buf.reserve(22);
        buf.put_slice(&[TPKT_VERSION, 0x00, 0x00, 0x16]);
        buf.put_slice(&[0x11, COTP_CR, 0x00, 0x00, 0x00, 0x01, 0x00]);
        buf.put_slice(&[0xC0, 0x01, COTP_TPDU_SIZE_1024]);
        buf.put_slice(&[0xC1, 0x02]);
        buf.put_u16(req.local_tsap);
        buf.put_slice(&[0xC2, 0x02]);
        buf.put_u16(req.remote_tsap);
        Ok(())
    }
}

/// Frames received by a PLC.
#[cfg(test)]
#[derive(Debug)]
pub(crate) enum ServerFrame {
    Connect(ConnectRequest),
    Data(RequestAdu<'static>),
}

/// The PLC side of the framing, only used for testing.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct ServerCodec {
    /// Maximum payload of a DT TPDU sent by the server.
    pub(crate) max_fragment_len: Option<usize>,
}

#[cfg(test)]
impl Decoder for ServerCodec {
    type Item = ServerFrame;
    type Error = Error;

    fn decode(&mut self, buf: &mut BytesMut) -> Result<Option<ServerFrame>, Error> {
        let Some(cotp) = decode_tpkt(buf)? else {
            return Ok(None);
        };
        let (pdu_type, header, payload) = split_cotp(cotp)?;
        match pdu_type {
            COTP_CR => {
                let mut local_tsap = 0;
                let mut remote_tsap = 0;
                let mut offset = 7;
                while offset + 2 <= header.len() {
                    let code = header[offset];
                    let len = usize::from(header[offset + 1]);
                    let value = &header[offset + 2..offset + 2 + len];
                    match code {
                        0xC1 => local_tsap = BigEndian::read_u16(value),
                        0xC2 => remote_tsap = BigEndian::read_u16(value),
                        _ => {}
                    }
                    offset += 2 + len;
                }
                Ok(Some(ServerFrame::Connect(ConnectRequest {
                    local_tsap,
                    remote_tsap,
                })))
            }
            COTP_DT => {
                let adu = crate::codec::decode_request_adu(&payload)?;
                Ok(Some(ServerFrame::Data(adu)))
            }
            other => Err(FramingError::CotpPduType(other).into()),
        }
    }
}

#[cfg(test)]
impl Encoder<ConnectConfirm> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, cc: ConnectConfirm, buf: &mut BytesMut) -> Result<(), Error> {
        buf.put_slice(&[TPKT_VERSION, 0x00, 0x00, 0x16]);
        buf.put_slice(&[0x11, COTP_CC]);
        buf.put_u16(cc.dst_ref);
        buf.put_u16(cc.src_ref);
        buf.put_slice(&[0x00, 0xC0, 0x01, COTP_TPDU_SIZE_1024]);
        buf.put_slice(&[0xC1, 0x02, 0x01, 0x00, 0xC2, 0x02, 0x01, 0x02]);
        Ok(())
    }
}

/// Wraps an encoded S7 PDU into one or more DT TPDUs.
#[cfg(test)]
impl Encoder<Bytes> for ServerCodec {
    type Error = Error;

    fn encode(&mut self, pdu: Bytes, buf: &mut BytesMut) -> Result<(), Error> {
        let fragment_len = self.max_fragment_len.unwrap_or(pdu.len()).max(1);
        let mut chunks = pdu.chunks(fragment_len).peekable();
        while let Some(chunk) = chunks.next() {
            let eot = if chunks.peek().is_none() { COTP_EOT } else { 0x00 };
            buf.put_u8(TPKT_VERSION);
            buf.put_u8(0x00);
            buf.put_u16(u16_len(TPKT_HEADER_LEN + 3 + chunk.len()));
            buf.put_slice(&[0x02, COTP_DT, eot]);
            buf.put_slice(chunk);
        }
        Ok(())
    }
}
