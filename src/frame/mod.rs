// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

pub(crate) mod tpkt;

use std::{borrow::Cow, fmt};

use bytes::Bytes;
use chrono::NaiveDate;

/// Memory area of a PLC.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Area {
    /// Process inputs (PE), 0x81
    ProcessInputs,
    /// Process outputs (PA), 0x82
    ProcessOutputs,
    /// Merkers/flags (MK), 0x83
    Merkers,
    /// Data blocks (DB), 0x84
    DataBlocks,
    /// Counters (CT), 0x1C
    Counters,
    /// Timers (TM), 0x1D
    Timers,
}

impl Area {
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        use Area::*;
        let area = match value {
            0x81 => ProcessInputs,
            0x82 => ProcessOutputs,
            0x83 => Merkers,
            0x84 => DataBlocks,
            0x1C => Counters,
            0x1D => Timers,
            _ => return None,
        };
        Some(area)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        use Area::*;
        match self {
            ProcessInputs => 0x81,
            ProcessOutputs => 0x82,
            Merkers => 0x83,
            DataBlocks => 0x84,
            Counters => 0x1C,
            Timers => 0x1D,
        }
    }
}

/// Word length (transport size) of the elements of a data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum WordLen {
    Bit,
    Byte,
    Char,
    Word,
    Int,
    DWord,
    DInt,
    Real,
    Counter,
    Timer,
}

impl WordLen {
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        use WordLen::*;
        let word_len = match value {
            0x01 => Bit,
            0x02 => Byte,
            0x03 => Char,
            0x04 => Word,
            0x05 => Int,
            0x06 => DWord,
            0x07 => DInt,
            0x08 => Real,
            0x1C => Counter,
            0x1D => Timer,
            _ => return None,
        };
        Some(word_len)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        use WordLen::*;
        match self {
            Bit => 0x01,
            Byte => 0x02,
            Char => 0x03,
            Word => 0x04,
            Int => 0x05,
            DWord => 0x06,
            DInt => 0x07,
            Real => 0x08,
            Counter => 0x1C,
            Timer => 0x1D,
        }
    }

    /// Number of bytes a single element occupies on the wire.
    #[must_use]
    pub const fn size(self) -> usize {
        use WordLen::*;
        match self {
            Bit | Byte | Char => 1,
            Word | Int | Counter | Timer => 2,
            DWord | DInt | Real => 4,
        }
    }

    /// Whether the start offset is an element index instead of a byte offset.
    pub(crate) const fn is_element_addressed(self) -> bool {
        matches!(self, Self::Bit | Self::Counter | Self::Timer)
    }

    /// Transport size used in the data section of a write request.
    pub(crate) const fn write_transport_size(self) -> TransportSize {
        match self {
            Self::Bit => TransportSize::Bit,
            Self::Counter | Self::Timer => TransportSize::OctetString,
            _ => TransportSize::Byte,
        }
    }
}

/// Transport size of the data section of read/write items.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum TransportSize {
    Null,
    Bit,
    Byte,
    Int,
    Real,
    OctetString,
}

impl TransportSize {
    pub(crate) const fn new(value: u8) -> Option<Self> {
        use TransportSize::*;
        let ts = match value {
            0x00 => Null,
            0x03 => Bit,
            0x04 => Byte,
            0x05 => Int,
            0x07 => Real,
            0x09 => OctetString,
            _ => return None,
        };
        Some(ts)
    }

    pub(crate) const fn value(self) -> u8 {
        use TransportSize::*;
        match self {
            Null => 0x00,
            Bit => 0x03,
            Byte => 0x04,
            Int => 0x05,
            Real => 0x07,
            OctetString => 0x09,
        }
    }

    /// Converts the length field of a data item into a number of bytes.
    pub(crate) const fn byte_len(self, len: u16) -> usize {
        match self {
            Self::Byte | Self::Int => (len as usize + 7) / 8,
            _ => len as usize,
        }
    }

    /// Converts a number of bytes into the length field of a data item.
    #[allow(clippy::cast_possible_truncation)]
    pub(crate) const fn len_field(self, byte_len: usize) -> u16 {
        match self {
            Self::Byte | Self::Int => (byte_len * 8) as u16,
            _ => byte_len as u16,
        }
    }
}

/// Return code of a single data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReturnCode {
    /// 0xFF
    Success,
    /// 0x01
    HardwareFault,
    /// 0x03
    AccessDenied,
    /// 0x05
    AddressOutOfRange,
    /// 0x06
    DataTypeNotSupported,
    /// 0x07
    DataSizeMismatch,
    /// 0x0A
    ObjectDoesNotExist,
    /// None of the above.
    Custom(u8),
}

impl ReturnCode {
    #[must_use]
    pub const fn new(value: u8) -> Self {
        use ReturnCode::*;
        match value {
            0xFF => Success,
            0x01 => HardwareFault,
            0x03 => AccessDenied,
            0x05 => AddressOutOfRange,
            0x06 => DataTypeNotSupported,
            0x07 => DataSizeMismatch,
            0x0A => ObjectDoesNotExist,
            other => Custom(other),
        }
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        use ReturnCode::*;
        match self {
            Success => 0xFF,
            HardwareFault => 0x01,
            AccessDenied => 0x03,
            AddressOutOfRange => 0x05,
            DataTypeNotSupported => 0x06,
            DataSizeMismatch => 0x07,
            ObjectDoesNotExist => 0x0A,
            Custom(code) => code,
        }
    }

    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success)
    }

    pub(crate) fn description(&self) -> &str {
        use ReturnCode::*;
        match *self {
            Success => "Success",
            HardwareFault => "Hardware fault",
            AccessDenied => "Access to object not allowed",
            AddressOutOfRange => "Address out of range",
            DataTypeNotSupported => "Data type not supported",
            DataSizeMismatch => "Data size mismatch",
            ObjectDoesNotExist => "Object does not exist",
            Custom(_) => "Unknown item error",
        }
    }
}

impl fmt::Display for ReturnCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:02X})", self.description(), self.value())
    }
}

/// Error class and code of a response header or of user data parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode(u16);

impl ErrorCode {
    pub const NONE: Self = Self(0x0000);
    pub const DATA_EXCEEDS_PDU: Self = Self(0x8500);
    pub const FUNCTION_NOT_AVAILABLE: Self = Self(0x8104);
    pub const ITEM_NOT_AVAILABLE: Self = Self(0xD209);
    pub const INVALID_SZL_ID: Self = Self(0xD401);

    #[must_use]
    pub const fn new(value: u16) -> Self {
        Self(value)
    }

    #[must_use]
    pub const fn value(self) -> u16 {
        self.0
    }

    /// Whether the code names a missing block, item or list.
    #[must_use]
    pub const fn is_not_found(self) -> bool {
        matches!(self.0, 0x0114 | 0x810A | 0xD209 | 0xD20E | 0xD401 | 0xD402)
    }

    pub(crate) fn description(&self) -> &str {
        match self.0 {
            0x0000 => "No error",
            0x0110 => "Invalid block number",
            0x0111 => "Invalid request length",
            0x0112 => "Invalid parameter",
            0x0113 => "Invalid block type",
            0x0114 => "Block not found",
            0x0115 => "Block already exists",
            0x0116 => "Block is write-protected",
            0x0117 => "Block too large",
            0x0140 => "Coordination rules violated",
            0x8000 => "Function already occupied",
            0x8001 => "Not allowed in current operating status",
            0x8101 => "Hardware fault",
            0x8103 => "Object access not allowed",
            0x8104 => "Function not available",
            0x8105 => "Invalid address",
            0x8106 => "Data type not supported",
            0x8107 => "Data type inconsistent",
            0x810A => "Object does not exist",
            0x8500 => "Data exceeds PDU size",
            0x8702 => "Invalid address",
            0xD201 => "Syntax error in block name",
            0xD202 => "Syntax error in function parameter",
            0xD203 => "Syntax error in block type",
            0xD204 => "No linked block in storage medium",
            0xD205 => "Object already exists",
            0xD206 => "Object already exists",
            0xD207 => "Block exists in EPROM",
            0xD209 => "Item not available",
            0xD20E => "No block present",
            0xD210 => "Invalid block number",
            0xD241 => "Need password",
            0xD401 => "Invalid SZL ID",
            0xD402 => "Invalid SZL index",
            0xD602 => "Invalid password",
            0xD604 => "No password to clear",
            0xD605 => "No password to clear",
            0xDC01 => "Invalid value",
            _ => "Function refused",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (0x{:04X})", self.description(), self.0)
    }
}

/// S7 PDU (ROSCTR) type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum PduType {
    Job,
    Ack,
    AckData,
    UserData,
}

impl PduType {
    pub(crate) const fn new(value: u8) -> Option<Self> {
        let pdu_type = match value {
            0x01 => Self::Job,
            0x02 => Self::Ack,
            0x03 => Self::AckData,
            0x07 => Self::UserData,
            _ => return None,
        };
        Some(pdu_type)
    }

    pub(crate) const fn value(self) -> u8 {
        match self {
            Self::Job => 0x01,
            Self::Ack => 0x02,
            Self::AckData => 0x03,
            Self::UserData => 0x07,
        }
    }

    /// Length of the S7 header of this PDU type.
    pub(crate) const fn header_len(self) -> usize {
        match self {
            Self::Ack | Self::AckData => 12,
            Self::Job | Self::UserData => 10,
        }
    }
}

/// Kind of a program block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum BlockType {
    OB,
    DB,
    SDB,
    FC,
    SFC,
    FB,
    SFB,
}

impl BlockType {
    pub const ALL: [Self; 7] = [
        Self::OB,
        Self::FB,
        Self::FC,
        Self::DB,
        Self::SDB,
        Self::SFC,
        Self::SFB,
    ];

    /// Block type from its ASCII code, e.g. `0x41` for `DB`.
    #[must_use]
    pub const fn new(value: u8) -> Option<Self> {
        use BlockType::*;
        let block_type = match value {
            0x38 => OB,
            0x41 => DB,
            0x42 => SDB,
            0x43 => FC,
            0x44 => SFC,
            0x45 => FB,
            0x46 => SFB,
            _ => return None,
        };
        Some(block_type)
    }

    #[must_use]
    pub const fn value(self) -> u8 {
        use BlockType::*;
        match self {
            OB => 0x38,
            DB => 0x41,
            SDB => 0x42,
            FC => 0x43,
            SFC => 0x44,
            FB => 0x45,
            SFB => 0x46,
        }
    }

    /// Block type from the sub block type reported in block info.
    pub(crate) const fn from_sub_block_type(value: u8) -> Option<Self> {
        use BlockType::*;
        let block_type = match value {
            0x08 => OB,
            0x0A => DB,
            0x0B => SDB,
            0x0C => FC,
            0x0D => SFC,
            0x0E => FB,
            0x0F => SFB,
            _ => return None,
        };
        Some(block_type)
    }

    #[cfg(test)]
    pub(crate) const fn sub_block_type(self) -> u8 {
        use BlockType::*;
        match self {
            OB => 0x08,
            DB => 0x0A,
            SDB => 0x0B,
            FC => 0x0C,
            SFC => 0x0D,
            FB => 0x0E,
            SFB => 0x0F,
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Largest value of the address field of a variable specification.
const MAX_WIRE_ADDRESS: u32 = 0x00FF_FFFF;

/// Largest item count of a read or write request.
pub(crate) const MAX_ITEM_COUNT: usize = u8::MAX as usize;

/// Address of a contiguous range of elements in a memory area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DataItem {
    pub area: Area,
    pub word_len: WordLen,
    /// Only relevant for [`Area::DataBlocks`].
    pub db_number: u16,
    /// Byte offset, or element index for bits, counters and timers.
    pub start: u32,
    /// Number of elements of `word_len`.
    pub amount: u16,
}

impl DataItem {
    #[must_use]
    pub const fn new(area: Area, word_len: WordLen, db_number: u16, start: u32, amount: u16) -> Self {
        Self {
            area,
            word_len,
            db_number,
            start,
            amount,
        }
    }

    /// `amount` bytes of data block `db_number` starting at byte `start`.
    #[must_use]
    pub const fn db_bytes(db_number: u16, start: u32, amount: u16) -> Self {
        Self::new(Area::DataBlocks, WordLen::Byte, db_number, start, amount)
    }

    /// Number of bytes transferred for this item.
    #[must_use]
    pub const fn byte_len(&self) -> usize {
        self.amount as usize * self.word_len.size()
    }

    /// Whether every element of the item can be addressed on the wire.
    ///
    /// The address field holds 24 bits, i.e. byte offsets up to
    /// `0x1F_FFFF` or element indices up to `0xFF_FFFF`.
    #[must_use]
    pub const fn is_addressable(&self) -> bool {
        let (max_start, len) = if self.word_len.is_element_addressed() {
            (MAX_WIRE_ADDRESS, self.amount as u32)
        } else {
            (MAX_WIRE_ADDRESS >> 3, self.byte_len() as u32)
        };
        match self.start.checked_add(len.saturating_sub(1)) {
            Some(last) => last <= max_start,
            None => false,
        }
    }

    /// 24-bit address as encoded in a variable specification.
    ///
    /// Only valid for addressable items.
    pub(crate) const fn wire_address(&self) -> u32 {
        let address = if self.word_len.is_element_addressed() {
            self.start
        } else {
            self.start << 3
        };
        debug_assert!(address <= MAX_WIRE_ADDRESS);
        address & MAX_WIRE_ADDRESS
    }
}

/// A data item and the buffer that receives its bytes.
#[derive(Debug)]
pub struct ReadItem<'a> {
    pub item: DataItem,
    pub buf: &'a mut [u8],
}

impl<'a> ReadItem<'a> {
    pub fn new(item: DataItem, buf: &'a mut [u8]) -> Self {
        Self { item, buf }
    }
}

/// A data item and the bytes to write into it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WriteItem<'a> {
    pub item: DataItem,
    pub data: Cow<'a, [u8]>,
}

impl<'a> WriteItem<'a> {
    pub fn new(item: DataItem, data: impl Into<Cow<'a, [u8]>>) -> Self {
        Self {
            item,
            data: data.into(),
        }
    }

    /// The bytes actually transferred, i.e. the first `item.byte_len()`.
    pub(crate) fn payload(&self) -> &[u8] {
        let len = self.item.byte_len().min(self.data.len());
        &self.data[..len]
    }

    pub(crate) fn into_owned(self) -> WriteItem<'static> {
        WriteItem {
            item: self.item,
            data: Cow::Owned(self.data.into_owned()),
        }
    }
}

/// Outcome of one item of a multi-item read or write.
pub type ItemResult = crate::Result<()>;

/// Function of a user data exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserFunction {
    ListBlocks,
    ListBlocksOfType,
    BlockInfo,
    ReadSzl,
}

impl UserFunction {
    pub(crate) const fn new(group: u8, subfunction: u8) -> Option<Self> {
        let function = match (group, subfunction) {
            (0x03, 0x01) => Self::ListBlocks,
            (0x03, 0x02) => Self::ListBlocksOfType,
            (0x03, 0x03) => Self::BlockInfo,
            (0x04, 0x01) => Self::ReadSzl,
            _ => return None,
        };
        Some(function)
    }

    pub(crate) const fn group(self) -> u8 {
        match self {
            Self::ListBlocks | Self::ListBlocksOfType | Self::BlockInfo => 0x03,
            Self::ReadSzl => 0x04,
        }
    }

    pub(crate) const fn subfunction(self) -> u8 {
        match self {
            Self::ListBlocks | Self::ReadSzl => 0x01,
            Self::ListBlocksOfType => 0x02,
            Self::BlockInfo => 0x03,
        }
    }
}

fn check_items<'i>(items: impl ExactSizeIterator<Item = &'i DataItem>) -> crate::Result<()> {
    let count = items.len();
    if count > MAX_ITEM_COUNT {
        return Err(crate::Error::TooManyItems(count));
    }
    for item in items {
        if !item.is_addressable() {
            return Err(crate::Error::address_range(item));
        }
    }
    Ok(())
}

/// A request sent to the PLC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request<'a> {
    /// Negotiation of the PDU length.
    SetupCommunication {
        max_amq_calling: u16,
        max_amq_called: u16,
        pdu_length: u16,
    },

    /// Read one or more data items.
    ReadVar(Cow<'a, [DataItem]>),

    /// Write one or more data items.
    WriteVar(Cow<'a, [WriteItem<'a>]>),

    /// Read the system status list `id` at `index`.
    ReadSzl { id: u16, index: u16 },

    /// Count the blocks of every kind.
    ListBlocks,

    /// List the numbers of all blocks of a kind.
    ListBlocksOfType(BlockType),

    /// Read the metadata of a block.
    BlockInfo { block_type: BlockType, number: u16 },

    /// Fetch the next fragment of a user data response.
    Continue { function: UserFunction, sequence: u8 },
}

impl<'a> Request<'a> {
    /// Converts the request into an owned instance with `'static'` lifetime.
    #[must_use]
    pub fn into_owned(self) -> Request<'static> {
        use Request::*;
        match self {
            SetupCommunication {
                max_amq_calling,
                max_amq_called,
                pdu_length,
            } => SetupCommunication {
                max_amq_calling,
                max_amq_called,
                pdu_length,
            },
            ReadVar(items) => ReadVar(Cow::Owned(items.into_owned())),
            WriteVar(items) => WriteVar(Cow::Owned(
                items
                    .into_owned()
                    .into_iter()
                    .map(WriteItem::into_owned)
                    .collect(),
            )),
            ReadSzl { id, index } => ReadSzl { id, index },
            ListBlocks => ListBlocks,
            ListBlocksOfType(block_type) => ListBlocksOfType(block_type),
            BlockInfo { block_type, number } => BlockInfo { block_type, number },
            Continue { function, sequence } => Continue { function, sequence },
        }
    }

    /// Rejects requests that cannot be encoded faithfully.
    pub(crate) fn check(&self) -> crate::Result<()> {
        match self {
            Request::ReadVar(items) => check_items(items.iter()),
            Request::WriteVar(items) => check_items(items.iter().map(|write| &write.item)),
            _ => Ok(()),
        }
    }

    pub(crate) fn user_function(&self) -> Option<UserFunction> {
        use Request::*;
        match self {
            ReadSzl { .. } => Some(UserFunction::ReadSzl),
            ListBlocks => Some(UserFunction::ListBlocks),
            ListBlocksOfType(_) => Some(UserFunction::ListBlocksOfType),
            BlockInfo { .. } => Some(UserFunction::BlockInfo),
            Continue { function, .. } => Some(*function),
            SetupCommunication { .. } | ReadVar(_) | WriteVar(_) => None,
        }
    }

    /// Checks that `response` answers this request.
    pub(crate) fn verify_response(&self, response: &Response) -> Result<(), crate::FramingError> {
        use crate::FramingError;
        match (self, response) {
            (Request::SetupCommunication { .. }, Response::SetupCommunication { .. }) => Ok(()),
            (Request::ReadVar(items), Response::ReadVar(results)) => {
                verify_item_count(items.len(), results.len())
            }
            (Request::WriteVar(items), Response::WriteVar(results)) => {
                verify_item_count(items.len(), results.len())
            }
            (request, Response::UserData(user_data))
                if request.user_function() == Some(user_data.function) =>
            {
                Ok(())
            }
            _ => Err(FramingError::UnexpectedResponse(
                "function does not match request",
            )),
        }
    }
}

fn verify_item_count(request: usize, response: usize) -> Result<(), crate::FramingError> {
    if request != response {
        return Err(crate::FramingError::ItemCount { request, response });
    }
    Ok(())
}

/// Bytes of a successfully read item, or its return code.
pub type ReadVarItem = Result<Bytes, ReturnCode>;

/// A response received from the PLC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    SetupCommunication {
        max_amq_calling: u16,
        max_amq_called: u16,
        pdu_length: u16,
    },
    ReadVar(Vec<ReadVarItem>),
    WriteVar(Vec<ReturnCode>),
    UserData(UserData),
}

/// One fragment of a user data response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserData {
    pub function: UserFunction,
    pub sequence: u8,
    /// No further fragments follow.
    pub last: bool,
    pub return_code: ReturnCode,
    pub payload: Bytes,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestPdu<'a>(pub(crate) Request<'a>);

impl<'a> From<Request<'a>> for RequestPdu<'a> {
    fn from(from: Request<'a>) -> Self {
        RequestPdu(from)
    }
}

impl<'a> From<RequestPdu<'a>> for Request<'a> {
    fn from(from: RequestPdu<'a>) -> Self {
        from.0
    }
}

/// A response or the error code of its header/parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponsePdu(pub(crate) Result<Response, ErrorCode>);

impl From<Response> for ResponsePdu {
    fn from(from: Response) -> Self {
        ResponsePdu(Ok(from))
    }
}

impl From<ErrorCode> for ResponsePdu {
    fn from(from: ErrorCode) -> Self {
        ResponsePdu(Err(from))
    }
}

/// A system status list (SZL) as returned by the PLC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Szl {
    pub id: u16,
    pub index: u16,
    /// Length of a single record in bytes.
    pub record_len: u16,
    pub record_count: u16,
    /// Concatenated records.
    pub data: Bytes,
}

impl Szl {
    /// Iterates over the complete records.
    pub fn records(&self) -> impl Iterator<Item = &[u8]> {
        let len = usize::from(self.record_len).max(1);
        self.data
            .chunks(len)
            .filter(move |record| record.len() == len)
    }
}

/// Number of blocks per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockList {
    pub ob_count: u16,
    pub fb_count: u16,
    pub fc_count: u16,
    pub db_count: u16,
    pub sdb_count: u16,
    pub sfc_count: u16,
    pub sfb_count: u16,
}

impl BlockList {
    #[must_use]
    pub const fn count(&self, block_type: BlockType) -> u16 {
        match block_type {
            BlockType::OB => self.ob_count,
            BlockType::FB => self.fb_count,
            BlockType::FC => self.fc_count,
            BlockType::DB => self.db_count,
            BlockType::SDB => self.sdb_count,
            BlockType::SFC => self.sfc_count,
            BlockType::SFB => self.sfb_count,
        }
    }

    pub(crate) fn count_mut(&mut self, block_type: BlockType) -> &mut u16 {
        match block_type {
            BlockType::OB => &mut self.ob_count,
            BlockType::FB => &mut self.fb_count,
            BlockType::FC => &mut self.fc_count,
            BlockType::DB => &mut self.db_count,
            BlockType::SDB => &mut self.sdb_count,
            BlockType::SFC => &mut self.sfc_count,
            BlockType::SFB => &mut self.sfb_count,
        }
    }
}

/// Identification of the CPU module.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct CpuInfo {
    pub module_type_name: String,
    pub serial_number: String,
    pub as_name: String,
    pub module_name: String,
    pub plant_id: String,
    pub copyright: String,
}

/// Metadata of a program block.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BlockInfo {
    pub block_type: BlockType,
    pub number: u16,
    /// Programming language code, e.g. 0x01 for STL.
    pub language: u8,
    pub flags: u8,
    pub mc7_size: u16,
    pub load_size: u32,
    pub local_data: u16,
    pub sbb_length: u16,
    pub checksum: u16,
    pub version: u8,
    pub code_date: NaiveDate,
    pub interface_date: NaiveDate,
    pub author: String,
    pub family: String,
    pub header: String,
}

/// Operating state of the CPU.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum PlcStatus {
    Running,
    Stopped,
    Unknown,
}

impl PlcStatus {
    #[must_use]
    pub const fn new(value: u8) -> Self {
        match value {
            0x08 => Self::Running,
            0x04 => Self::Stopped,
            _ => Self::Unknown,
        }
    }
}
