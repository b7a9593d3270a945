// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::*;

pub(crate) type PduRef = u16;

pub(crate) type Tsap = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Header {
    pub(crate) pdu_ref: PduRef,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RequestAdu<'a> {
    pub(crate) hdr: Header,
    pub(crate) pdu: RequestPdu<'a>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct ResponseAdu {
    pub(crate) hdr: Header,
    pub(crate) pdu: ResponsePdu,
}

impl<'a> From<RequestAdu<'a>> for Request<'a> {
    fn from(from: RequestAdu<'a>) -> Self {
        from.pdu.into()
    }
}

/// COTP connection request (CR).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConnectRequest {
    pub(crate) local_tsap: Tsap,
    pub(crate) remote_tsap: Tsap,
}

/// COTP connection confirm (CC).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ConnectConfirm {
    pub(crate) dst_ref: u16,
    pub(crate) src_ref: u16,
}

/// A transport PDU received from the PLC.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Tpdu {
    ConnectConfirm(ConnectConfirm),
    Data(ResponseAdu),
}
