// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Payloads of user data responses: system status lists and block directories.

use byteorder::{BigEndian, ByteOrder as _};
use bytes::Bytes;
use chrono::{Days, NaiveDate};

use crate::{
    frame::{BlockInfo, BlockList, BlockType, CpuInfo, PlcStatus, Szl},
    FramingError,
};

use super::ensure_len;

/// SZL id of the component identification.
pub(crate) const SZL_ID_COMPONENT_IDENTIFICATION: u16 = 0x001C;

/// SZL id of the CPU operating status.
pub(crate) const SZL_ID_CPU_STATUS: u16 = 0x0424;

const SZL_HEADER_LEN: usize = 8;
const BLOCK_COUNT_ENTRY_LEN: usize = 4;
const BLOCK_NUMBER_ENTRY_LEN: usize = 4;
const BLOCK_INFO_LEN: usize = 70;

/// Decodes the first fragment of an SZL response.
///
/// Records of subsequent fragments are appended by the caller.
pub(crate) fn decode_szl_header(payload: &Bytes) -> Result<(Szl, Bytes), FramingError> {
    ensure_len("SZL header", payload, SZL_HEADER_LEN)?;
    let szl = Szl {
        id: BigEndian::read_u16(&payload[0..2]),
        index: BigEndian::read_u16(&payload[2..4]),
        record_len: BigEndian::read_u16(&payload[4..6]),
        record_count: BigEndian::read_u16(&payload[6..8]),
        data: Bytes::new(),
    };
    Ok((szl, payload.slice(SZL_HEADER_LEN..)))
}

/// Decodes the entries `0x30 <type> <count>` of a block directory.
pub(crate) fn decode_block_counts(payload: &[u8]) -> BlockList {
    let mut list = BlockList::default();
    for entry in payload.chunks_exact(BLOCK_COUNT_ENTRY_LEN) {
        match BlockType::new(entry[1]) {
            Some(block_type) => *list.count_mut(block_type) = BigEndian::read_u16(&entry[2..4]),
            None => log::debug!("Ignoring count of unknown block type 0x{:02X}", entry[1]),
        }
    }
    list
}

/// Appends the numbers of the entries `<number> <flags> <language>`.
pub(crate) fn decode_block_numbers(payload: &[u8], numbers: &mut Vec<u16>) {
    numbers.extend(
        payload
            .chunks_exact(BLOCK_NUMBER_ENTRY_LEN)
            .map(|entry| BigEndian::read_u16(&entry[0..2])),
    );
}

/// Text of a fixed-width field without its space or NUL padding.
fn decode_text(bytes: &[u8]) -> String {
    let end = bytes
        .iter()
        .rposition(|&b| b != b' ' && b != 0x00)
        .map_or(0, |pos| pos + 1);
    bytes[..end].iter().map(|&b| char::from(b)).collect()
}

/// Dates are counted in days since 1984-01-01.
fn decode_date(days: u16) -> NaiveDate {
    let epoch = NaiveDate::from_ymd_opt(1984, 1, 1).unwrap_or_default();
    epoch
        .checked_add_days(Days::new(u64::from(days)))
        .unwrap_or(epoch)
}

pub(crate) fn decode_block_info(payload: &[u8]) -> Result<BlockInfo, FramingError> {
    ensure_len("block info", payload, BLOCK_INFO_LEN)?;
    let block_type = BlockType::from_sub_block_type(payload[11])
        .ok_or(FramingError::UnexpectedResponse("unknown sub block type"))?;
    Ok(BlockInfo {
        block_type,
        number: BigEndian::read_u16(&payload[12..14]),
        language: payload[10],
        flags: payload[9],
        load_size: BigEndian::read_u32(&payload[14..18]),
        code_date: decode_date(BigEndian::read_u16(&payload[26..28])),
        interface_date: decode_date(BigEndian::read_u16(&payload[32..34])),
        sbb_length: BigEndian::read_u16(&payload[34..36]),
        local_data: BigEndian::read_u16(&payload[38..40]),
        mc7_size: BigEndian::read_u16(&payload[40..42]),
        author: decode_text(&payload[42..50]),
        family: decode_text(&payload[50..58]),
        header: decode_text(&payload[58..66]),
        version: payload[66],
        checksum: BigEndian::read_u16(&payload[68..70]),
    })
}

/// Decodes the records of SZL 0x001C.
pub(crate) fn decode_cpu_info(szl: &Szl) -> CpuInfo {
    let mut info = CpuInfo::default();
    for record in szl.records() {
        if record.len() < 2 {
            continue;
        }
        let text = decode_text(&record[2..]);
        match BigEndian::read_u16(&record[0..2]) {
            0x0001 => info.as_name = text,
            0x0002 => info.module_name = text,
            0x0003 => info.plant_id = text,
            0x0004 => info.copyright = text,
            0x0005 => info.serial_number = text,
            0x0007 => info.module_type_name = text,
            _ => {}
        }
    }
    info
}

/// Decodes the operating status from SZL 0x0424.
pub(crate) fn decode_status(szl: &Szl) -> PlcStatus {
    szl.data
        .get(3)
        .copied()
        .map_or(PlcStatus::Unknown, PlcStatus::new)
}
