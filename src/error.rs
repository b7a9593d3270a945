// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types.

use std::io;

use thiserror::Error;

use crate::frame::{BlockType, DataItem, ErrorCode, ReturnCode};

/// Error type of all client operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The socket failed, timed out, or is not connected.
    #[error(transparent)]
    Transport(#[from] io::Error),

    /// The received bytes do not form a valid TPKT/COTP/S7 message.
    #[error(transparent)]
    Framing(#[from] FramingError),

    /// The PLC answered with an error code.
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// The caller's buffer cannot hold the requested item.
    ///
    /// Detected before anything is sent.
    #[error("buffer too small: {required} bytes required, {actual} available")]
    ItemSize { required: usize, actual: usize },

    /// The item reaches beyond the 24-bit address range of a request.
    ///
    /// Detected before anything is sent.
    #[error("address out of range: start = {start}, amount = {amount}")]
    AddressRange { start: u32, amount: u16 },

    /// More items than the item count of a single request can express.
    #[error("too many items in a single request: {0}")]
    TooManyItems(usize),
}

impl Error {
    /// Whether the error invalidates the connection.
    ///
    /// After a fatal error the connection is dropped and must be
    /// re-established explicitly.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Transport(_) | Self::Framing(_) => true,
            Self::Protocol(err) => matches!(err, ProtocolError::ConnectionRejected(_)),
            Self::ItemSize { .. } | Self::AddressRange { .. } | Self::TooManyItems(_) => false,
        }
    }

    pub(crate) fn item_size(required: usize, actual: usize) -> Self {
        Self::ItemSize { required, actual }
    }

    pub(crate) fn address_range(item: &DataItem) -> Self {
        Self::AddressRange {
            start: item.start,
            amount: item.amount,
        }
    }

    /// Duplicates an error that leaves the connection intact.
    pub(crate) fn try_clone(&self) -> Option<Self> {
        match self {
            Self::Transport(_) | Self::Framing(_) => None,
            Self::Protocol(err) => Some(Self::Protocol(err.clone())),
            Self::ItemSize { required, actual } => Some(Self::item_size(*required, *actual)),
            Self::AddressRange { start, amount } => Some(Self::AddressRange {
                start: *start,
                amount: *amount,
            }),
            Self::TooManyItems(count) => Some(Self::TooManyItems(*count)),
        }
    }
}

/// Malformed or unexpected bytes on the wire.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FramingError {
    #[error("invalid TPKT version: 0x{0:02X}")]
    TpktVersion(u8),

    #[error("invalid TPKT length: {0}")]
    TpktLength(usize),

    #[error("unexpected COTP PDU type: 0x{0:02X}")]
    CotpPduType(u8),

    #[error("invalid protocol id: 0x{0:02X}")]
    ProtocolId(u8),

    #[error("unexpected S7 PDU type: 0x{0:02X}")]
    PduType(u8),

    #[error("unexpected function: 0x{0:02X}")]
    Function(u8),

    #[error("unexpected transport size: 0x{0:02X}")]
    TransportSize(u8),

    #[error("truncated {what}: {expected} bytes expected, {actual} available")]
    Truncated {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("PDU exceeds the negotiated length: {actual} > {max}")]
    PduLength { max: usize, actual: usize },

    #[error("PDU reference mismatch: request = {request}, response = {response}")]
    PduRefMismatch { request: u16, response: u16 },

    #[error("item count mismatch: {request} requested, {response} returned")]
    ItemCount { request: usize, response: usize },

    #[error("unexpected response: {0}")]
    UnexpectedResponse(&'static str),
}

impl FramingError {
    pub(crate) fn truncated(what: &'static str, expected: usize, actual: usize) -> Self {
        Self::Truncated {
            what,
            expected,
            actual,
        }
    }
}

/// Well-formed response carrying an error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolError {
    /// The connection or PDU negotiation was refused.
    #[error("connection rejected: {0}")]
    ConnectionRejected(&'static str),

    /// Error class and code of a response header or user data parameter.
    #[error("request rejected: {0}")]
    Rejected(ErrorCode),

    /// Return code of a single data item.
    #[error("item error: {0}")]
    Item(ReturnCode),

    #[error("block {block_type} {number} not found")]
    BlockNotFound { block_type: BlockType, number: u16 },

    /// The response is well-formed but its payload cannot be decoded.
    ///
    /// The exchange itself completed, so the connection stays usable.
    #[error("malformed payload: {0}")]
    Payload(FramingError),
}

impl ProtocolError {
    /// Whether the PLC reported a missing object.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::Rejected(code) => code.is_not_found(),
            Self::Item(code) => *code == ReturnCode::ObjectDoesNotExist,
            Self::BlockNotFound { .. } => true,
            Self::ConnectionRejected(_) | Self::Payload(_) => false,
        }
    }
}
