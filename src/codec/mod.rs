// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use byteorder::{BigEndian, ByteOrder as _};
use bytes::{BufMut as _, Bytes, BytesMut};

use crate::{
    frame::{tpkt::*, *},
    Error, FramingError,
};

pub(crate) mod tpkt;
pub(crate) mod userdata;

/// Protocol id of every S7 PDU.
const PROTOCOL_ID: u8 = 0x32;

const FN_SETUP_COMMUNICATION: u8 = 0xF0;
const FN_READ_VAR: u8 = 0x04;
const FN_WRITE_VAR: u8 = 0x05;

/// Length of the header of a job request.
pub(crate) const REQUEST_HEADER_LEN: usize = 10;

/// Length of the header of an acknowledgement with data.
pub(crate) const RESPONSE_HEADER_LEN: usize = 12;

/// Function code and item count.
pub(crate) const VAR_PARAM_HEADER_LEN: usize = 2;

/// Length of a single variable specification.
pub(crate) const VAR_SPEC_LEN: usize = 12;

/// Return code, transport size and length preceding item data.
pub(crate) const DATA_ITEM_HEADER_LEN: usize = 4;

const USER_DATA_METHOD_REQUEST: u8 = 0x11;
const USER_DATA_METHOD_RESPONSE: u8 = 0x12;
const USER_DATA_TYPE_REQUEST: u8 = 0x40;
#[cfg(test)]
const USER_DATA_TYPE_RESPONSE: u8 = 0x80;

#[allow(clippy::cast_possible_truncation)]
pub(crate) fn u16_len(len: usize) -> u16 {
    // This type conversion should always be safe, because the
    // lengths are bounded by the negotiated PDU size.
    debug_assert!(len <= u16::MAX.into());
    len as u16
}

#[allow(clippy::cast_possible_truncation)]
fn u8_len(len: usize) -> u8 {
    debug_assert!(len <= u8::MAX.into());
    len as u8
}

/// Odd-sized item data is followed by a fill byte.
pub(crate) const fn padded_len(len: usize) -> usize {
    len + (len & 1)
}

/// Bytes a read item adds to the response data section.
pub(crate) const fn read_response_item_len(byte_len: usize) -> usize {
    DATA_ITEM_HEADER_LEN + padded_len(byte_len)
}

/// Bytes a write item adds to the request parameters and data.
pub(crate) const fn write_request_item_len(byte_len: usize) -> usize {
    VAR_SPEC_LEN + DATA_ITEM_HEADER_LEN + padded_len(byte_len)
}

fn ensure_len(what: &'static str, bytes: &[u8], expected: usize) -> Result<(), FramingError> {
    if bytes.len() < expected {
        return Err(FramingError::truncated(what, expected, bytes.len()));
    }
    Ok(())
}

pub(crate) fn encode_request_pdu(buf: &mut BytesMut, hdr: Header, request: &Request<'_>) {
    let pdu_type = if request.user_function().is_some() {
        PduType::UserData
    } else {
        PduType::Job
    };
    let start = buf.len();
    buf.put_u8(PROTOCOL_ID);
    buf.put_u8(pdu_type.value());
    buf.put_u16(0x0000);
    buf.put_u16(hdr.pdu_ref);
    // Parameter and data lengths are patched below
    buf.put_u16(0);
    buf.put_u16(0);

    let param_start = buf.len();
    encode_request_params(buf, request);
    let data_start = buf.len();
    encode_request_data(buf, request);
    let param_len = data_start - param_start;
    let data_len = buf.len() - data_start;
    BigEndian::write_u16(&mut buf[start + 6..start + 8], u16_len(param_len));
    BigEndian::write_u16(&mut buf[start + 8..start + 10], u16_len(data_len));
}

fn encode_var_spec(buf: &mut BytesMut, item: &DataItem) {
    buf.put_u8(0x12);
    buf.put_u8(0x0A);
    buf.put_u8(0x10);
    buf.put_u8(item.word_len.value());
    buf.put_u16(item.amount);
    buf.put_u16(item.db_number);
    buf.put_u8(item.area.value());
    let address = item.wire_address();
    buf.put_u8((address >> 16) as u8);
    buf.put_u16((address & 0xFFFF) as u16);
}

fn encode_request_params(buf: &mut BytesMut, request: &Request<'_>) {
    use Request::*;
    if let Some(function) = request.user_function() {
        if let Continue { sequence, .. } = request {
            buf.put_slice(&[0x00, 0x01, 0x12, 0x08, USER_DATA_METHOD_RESPONSE]);
            buf.put_u8(USER_DATA_TYPE_REQUEST | function.group());
            buf.put_u8(function.subfunction());
            buf.put_u8(*sequence);
            buf.put_u32(0);
        } else {
            buf.put_slice(&[0x00, 0x01, 0x12, 0x04, USER_DATA_METHOD_REQUEST]);
            buf.put_u8(USER_DATA_TYPE_REQUEST | function.group());
            buf.put_u8(function.subfunction());
            buf.put_u8(0x00);
        }
        return;
    }
    match request {
        SetupCommunication {
            max_amq_calling,
            max_amq_called,
            pdu_length,
        } => {
            buf.put_u8(FN_SETUP_COMMUNICATION);
            buf.put_u8(0x00);
            buf.put_u16(*max_amq_calling);
            buf.put_u16(*max_amq_called);
            buf.put_u16(*pdu_length);
        }
        ReadVar(items) => {
            buf.put_u8(FN_READ_VAR);
            buf.put_u8(u8_len(items.len()));
            for item in items.iter() {
                encode_var_spec(buf, item);
            }
        }
        WriteVar(items) => {
            buf.put_u8(FN_WRITE_VAR);
            buf.put_u8(u8_len(items.len()));
            for write in items.iter() {
                encode_var_spec(buf, &write.item);
            }
        }
        ReadSzl { .. } | ListBlocks | ListBlocksOfType(_) | BlockInfo { .. } | Continue { .. } => {}
    }
}

fn encode_request_data(buf: &mut BytesMut, request: &Request<'_>) {
    use Request::*;
    match request {
        SetupCommunication { .. } | ReadVar(_) => {}
        WriteVar(items) => {
            let count = items.len();
            for (i, write) in items.iter().enumerate() {
                let payload = write.payload();
                let transport_size = write.item.word_len.write_transport_size();
                buf.put_u8(0x00);
                buf.put_u8(transport_size.value());
                buf.put_u16(transport_size.len_field(payload.len()));
                buf.put_slice(payload);
                if payload.len() % 2 == 1 && i + 1 < count {
                    buf.put_u8(0x00);
                }
            }
        }
        ReadSzl { id, index } => {
            buf.put_slice(&[0xFF, TransportSize::OctetString.value(), 0x00, 0x04]);
            buf.put_u16(*id);
            buf.put_u16(*index);
        }
        ListBlocks | Continue { .. } => {
            buf.put_slice(&[ReturnCode::ObjectDoesNotExist.value(), 0x00, 0x00, 0x00]);
        }
        ListBlocksOfType(block_type) => {
            buf.put_slice(&[0xFF, TransportSize::OctetString.value(), 0x00, 0x02, 0x30]);
            buf.put_u8(block_type.value());
        }
        BlockInfo { block_type, number } => {
            buf.put_slice(&[0xFF, TransportSize::OctetString.value(), 0x00, 0x08, 0x30]);
            buf.put_u8(block_type.value());
            buf.put_slice(format!("{number:05}").as_bytes());
            buf.put_u8(0x41);
        }
    }
}

/// Decodes a complete S7 PDU received from the PLC.
pub(crate) fn decode_response_adu(bytes: Bytes) -> Result<ResponseAdu, Error> {
    ensure_len("S7 header", &bytes, REQUEST_HEADER_LEN)?;
    if bytes[0] != PROTOCOL_ID {
        return Err(FramingError::ProtocolId(bytes[0]).into());
    }
    let pdu_type = match PduType::new(bytes[1]) {
        Some(PduType::Job) | None => return Err(FramingError::PduType(bytes[1]).into()),
        Some(pdu_type) => pdu_type,
    };
    let header_len = pdu_type.header_len();
    ensure_len("S7 header", &bytes, header_len)?;
    let hdr = Header {
        pdu_ref: BigEndian::read_u16(&bytes[4..6]),
    };
    let param_len = usize::from(BigEndian::read_u16(&bytes[6..8]));
    let data_len = usize::from(BigEndian::read_u16(&bytes[8..10]));
    ensure_len("S7 PDU", &bytes, header_len + param_len + data_len)?;

    let params = bytes.slice(header_len..header_len + param_len);
    let data = bytes.slice(header_len + param_len..header_len + param_len + data_len);

    if pdu_type == PduType::UserData {
        let pdu = decode_user_data(&params, &data)?;
        return Ok(ResponseAdu { hdr, pdu });
    }

    let error = ErrorCode::new(BigEndian::read_u16(&bytes[10..12]));
    if error != ErrorCode::NONE {
        return Ok(ResponseAdu {
            hdr,
            pdu: error.into(),
        });
    }
    let Some(&function) = params.first() else {
        return Err(FramingError::UnexpectedResponse("acknowledgement without parameters").into());
    };
    let rsp = match function {
        FN_SETUP_COMMUNICATION => {
            ensure_len("setup communication parameters", &params, 8)?;
            Response::SetupCommunication {
                max_amq_calling: BigEndian::read_u16(&params[2..4]),
                max_amq_called: BigEndian::read_u16(&params[4..6]),
                pdu_length: BigEndian::read_u16(&params[6..8]),
            }
        }
        FN_READ_VAR => {
            ensure_len("read var parameters", &params, VAR_PARAM_HEADER_LEN)?;
            Response::ReadVar(decode_read_var_items(usize::from(params[1]), &data)?)
        }
        FN_WRITE_VAR => {
            ensure_len("write var parameters", &params, VAR_PARAM_HEADER_LEN)?;
            let count = usize::from(params[1]);
            ensure_len("write var data", &data, count)?;
            Response::WriteVar(data[..count].iter().copied().map(ReturnCode::new).collect())
        }
        other => return Err(FramingError::Function(other).into()),
    };
    Ok(ResponseAdu {
        hdr,
        pdu: rsp.into(),
    })
}

fn decode_read_var_items(count: usize, data: &Bytes) -> Result<Vec<ReadVarItem>, FramingError> {
    let mut items = Vec::with_capacity(count);
    let mut offset = 0;
    for i in 0..count {
        ensure_len("read var item", data, offset + DATA_ITEM_HEADER_LEN)?;
        let return_code = ReturnCode::new(data[offset]);
        if !return_code.is_success() {
            items.push(Err(return_code));
            offset += DATA_ITEM_HEADER_LEN;
            continue;
        }
        let transport_size = TransportSize::new(data[offset + 1])
            .ok_or(FramingError::TransportSize(data[offset + 1]))?;
        let len = transport_size.byte_len(BigEndian::read_u16(&data[offset + 2..offset + 4]));
        let start = offset + DATA_ITEM_HEADER_LEN;
        ensure_len("read var item data", data, start + len)?;
        items.push(Ok(data.slice(start..start + len)));
        offset = start + len;
        if len % 2 == 1 && i + 1 < count {
            offset += 1;
        }
    }
    Ok(items)
}

fn decode_user_data(params: &[u8], data: &Bytes) -> Result<ResponsePdu, FramingError> {
    ensure_len("user data parameters", params, 12)?;
    let group = params[5] & 0x0F;
    let subfunction = params[6];
    let function =
        UserFunction::new(group, subfunction).ok_or(FramingError::Function(subfunction))?;
    let error = ErrorCode::new(BigEndian::read_u16(&params[10..12]));
    if error != ErrorCode::NONE {
        return Ok(error.into());
    }
    ensure_len("user data", data, DATA_ITEM_HEADER_LEN)?;
    let len = usize::from(BigEndian::read_u16(&data[2..4]));
    ensure_len("user data payload", data, DATA_ITEM_HEADER_LEN + len)?;
    Ok(Response::UserData(UserData {
        function,
        sequence: params[7],
        last: params[9] == 0x00,
        return_code: ReturnCode::new(data[0]),
        payload: data.slice(DATA_ITEM_HEADER_LEN..DATA_ITEM_HEADER_LEN + len),
    })
    .into())
}

/// Decodes a request as received by a PLC.
#[cfg(test)]
pub(crate) fn decode_request_adu(bytes: &[u8]) -> Result<RequestAdu<'static>, Error> {
    use std::borrow::Cow;

    ensure_len("S7 header", bytes, REQUEST_HEADER_LEN)?;
    if bytes[0] != PROTOCOL_ID {
        return Err(FramingError::ProtocolId(bytes[0]).into());
    }
    let hdr = Header {
        pdu_ref: BigEndian::read_u16(&bytes[4..6]),
    };
    let param_len = usize::from(BigEndian::read_u16(&bytes[6..8]));
    let data_len = usize::from(BigEndian::read_u16(&bytes[8..10]));
    ensure_len("S7 PDU", bytes, REQUEST_HEADER_LEN + param_len + data_len)?;
    let params = &bytes[REQUEST_HEADER_LEN..REQUEST_HEADER_LEN + param_len];
    let data = &bytes[REQUEST_HEADER_LEN + param_len..REQUEST_HEADER_LEN + param_len + data_len];

    let decode_spec = |spec: &[u8]| -> Result<DataItem, FramingError> {
        let word_len = WordLen::new(spec[3]).ok_or(FramingError::TransportSize(spec[3]))?;
        let area = Area::new(spec[8]).ok_or(FramingError::UnexpectedResponse("unknown area"))?;
        let address = (u32::from(spec[9]) << 16) | u32::from(BigEndian::read_u16(&spec[10..12]));
        let start = if word_len.is_element_addressed() {
            address
        } else {
            address >> 3
        };
        Ok(DataItem::new(
            area,
            word_len,
            BigEndian::read_u16(&spec[6..8]),
            start,
            BigEndian::read_u16(&spec[4..6]),
        ))
    };

    let request = match PduType::new(bytes[1]) {
        Some(PduType::Job) => {
            ensure_len("job parameters", params, VAR_PARAM_HEADER_LEN)?;
            let count = usize::from(params[1]);
            match params[0] {
                FN_SETUP_COMMUNICATION => {
                    ensure_len("setup communication parameters", params, 8)?;
                    Request::SetupCommunication {
                        max_amq_calling: BigEndian::read_u16(&params[2..4]),
                        max_amq_called: BigEndian::read_u16(&params[4..6]),
                        pdu_length: BigEndian::read_u16(&params[6..8]),
                    }
                }
                FN_READ_VAR => {
                    ensure_len("read var specs", params, 2 + count * VAR_SPEC_LEN)?;
                    let items = params[2..2 + count * VAR_SPEC_LEN]
                        .chunks(VAR_SPEC_LEN)
                        .map(decode_spec)
                        .collect::<Result<Vec<_>, _>>()?;
                    Request::ReadVar(Cow::Owned(items))
                }
                FN_WRITE_VAR => {
                    ensure_len("write var specs", params, 2 + count * VAR_SPEC_LEN)?;
                    let mut items = Vec::with_capacity(count);
                    let mut offset = 0;
                    for (i, spec) in params[2..2 + count * VAR_SPEC_LEN]
                        .chunks(VAR_SPEC_LEN)
                        .enumerate()
                    {
                        let item = decode_spec(spec)?;
                        ensure_len("write var item", data, offset + DATA_ITEM_HEADER_LEN)?;
                        let transport_size = TransportSize::new(data[offset + 1])
                            .ok_or(FramingError::TransportSize(data[offset + 1]))?;
                        let len = transport_size
                            .byte_len(BigEndian::read_u16(&data[offset + 2..offset + 4]));
                        let start = offset + DATA_ITEM_HEADER_LEN;
                        ensure_len("write var item data", data, start + len)?;
                        items.push(WriteItem::new(item, data[start..start + len].to_vec()));
                        offset = start + len;
                        if len % 2 == 1 && i + 1 < count {
                            offset += 1;
                        }
                    }
                    Request::WriteVar(Cow::Owned(items))
                }
                other => return Err(FramingError::Function(other).into()),
            }
        }
        Some(PduType::UserData) => {
            ensure_len("user data parameters", params, 8)?;
            let function = UserFunction::new(params[5] & 0x0F, params[6])
                .ok_or(FramingError::Function(params[6]))?;
            if params[4] == USER_DATA_METHOD_RESPONSE {
                Request::Continue {
                    function,
                    sequence: params[7],
                }
            } else {
                ensure_len("user data", data, DATA_ITEM_HEADER_LEN)?;
                let payload = &data[DATA_ITEM_HEADER_LEN..];
                match function {
                    UserFunction::ListBlocks => Request::ListBlocks,
                    UserFunction::ReadSzl => {
                        ensure_len("SZL request", payload, 4)?;
                        Request::ReadSzl {
                            id: BigEndian::read_u16(&payload[0..2]),
                            index: BigEndian::read_u16(&payload[2..4]),
                        }
                    }
                    UserFunction::ListBlocksOfType => {
                        ensure_len("list blocks request", payload, 2)?;
                        Request::ListBlocksOfType(
                            BlockType::new(payload[1])
                                .ok_or(FramingError::UnexpectedResponse("unknown block type"))?,
                        )
                    }
                    UserFunction::BlockInfo => {
                        ensure_len("block info request", payload, 8)?;
                        let block_type = BlockType::new(payload[1])
                            .ok_or(FramingError::UnexpectedResponse("unknown block type"))?;
                        let number = std::str::from_utf8(&payload[2..7])
                            .ok()
                            .and_then(|digits| digits.parse().ok())
                            .ok_or(FramingError::UnexpectedResponse("invalid block number"))?;
                        Request::BlockInfo { block_type, number }
                    }
                }
            }
        }
        _ => return Err(FramingError::PduType(bytes[1]).into()),
    };
    Ok(RequestAdu {
        hdr,
        pdu: request.into(),
    })
}

/// Encodes a response as sent by a PLC.
#[cfg(test)]
pub(crate) fn encode_response_adu(buf: &mut BytesMut, adu: &ResponseAdu) {
    let start = buf.len();
    let pdu_type = match &adu.pdu.0 {
        Ok(Response::UserData(_)) => PduType::UserData,
        _ => PduType::AckData,
    };
    buf.put_u8(PROTOCOL_ID);
    buf.put_u8(pdu_type.value());
    buf.put_u16(0x0000);
    buf.put_u16(adu.hdr.pdu_ref);
    buf.put_u16(0);
    buf.put_u16(0);
    if pdu_type == PduType::AckData {
        let error = adu.pdu.0.as_ref().err().copied().unwrap_or(ErrorCode::NONE);
        buf.put_u16(error.value());
    }
    let param_start = buf.len();
    let mut data = BytesMut::new();
    match &adu.pdu.0 {
        Err(_) => {}
        Ok(Response::SetupCommunication {
            max_amq_calling,
            max_amq_called,
            pdu_length,
        }) => {
            buf.put_u8(FN_SETUP_COMMUNICATION);
            buf.put_u8(0x00);
            buf.put_u16(*max_amq_calling);
            buf.put_u16(*max_amq_called);
            buf.put_u16(*pdu_length);
        }
        Ok(Response::ReadVar(items)) => {
            buf.put_u8(FN_READ_VAR);
            buf.put_u8(u8_len(items.len()));
            for (i, item) in items.iter().enumerate() {
                match item {
                    Ok(bytes) => {
                        data.put_u8(ReturnCode::Success.value());
                        data.put_u8(TransportSize::Byte.value());
                        data.put_u16(TransportSize::Byte.len_field(bytes.len()));
                        data.put_slice(bytes);
                        if bytes.len() % 2 == 1 && i + 1 < items.len() {
                            data.put_u8(0x00);
                        }
                    }
                    Err(code) => {
                        data.put_u8(code.value());
                        data.put_slice(&[0x00, 0x00, 0x00]);
                    }
                }
            }
        }
        Ok(Response::WriteVar(codes)) => {
            buf.put_u8(FN_WRITE_VAR);
            buf.put_u8(u8_len(codes.len()));
            for code in codes {
                data.put_u8(code.value());
            }
        }
        Ok(Response::UserData(user_data)) => {
            encode_user_data_params(
                buf,
                user_data.function,
                user_data.sequence,
                user_data.last,
                ErrorCode::NONE,
            );
            data.put_u8(user_data.return_code.value());
            data.put_u8(TransportSize::OctetString.value());
            data.put_u16(u16_len(user_data.payload.len()));
            data.put_slice(&user_data.payload);
        }
    }
    let param_len = buf.len() - param_start;
    buf.put_slice(&data);
    BigEndian::write_u16(&mut buf[start + 6..start + 8], u16_len(param_len));
    BigEndian::write_u16(&mut buf[start + 8..start + 10], u16_len(data.len()));
}

/// Encodes a user data response carrying an error code.
#[cfg(test)]
pub(crate) fn encode_user_data_error(
    buf: &mut BytesMut,
    hdr: Header,
    function: UserFunction,
    error: ErrorCode,
) {
    buf.put_u8(PROTOCOL_ID);
    buf.put_u8(PduType::UserData.value());
    buf.put_u16(0x0000);
    buf.put_u16(hdr.pdu_ref);
    buf.put_u16(12);
    buf.put_u16(4);
    encode_user_data_params(buf, function, 0, true, error);
    buf.put_slice(&[ReturnCode::ObjectDoesNotExist.value(), 0x00, 0x00, 0x00]);
}

#[cfg(test)]
fn encode_user_data_params(
    buf: &mut BytesMut,
    function: UserFunction,
    sequence: u8,
    last: bool,
    error: ErrorCode,
) {
    buf.put_slice(&[0x00, 0x01, 0x12, 0x08, USER_DATA_METHOD_RESPONSE]);
    buf.put_u8(USER_DATA_TYPE_RESPONSE | function.group());
    buf.put_u8(function.subfunction());
    buf.put_u8(sequence);
    buf.put_u8(0x00);
    buf.put_u8(u8::from(!last));
    buf.put_u16(error.value());
}
