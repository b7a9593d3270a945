// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::sync::atomic::{AtomicU8, Ordering};

use crate::{frame::tpkt::Header, FramingError};

pub(crate) mod tcp;

/// Connection state of a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// No transport, e.g. after a failed exchange or an idle timeout.
    Disconnected,
    /// Waiting for the COTP connection confirm.
    Connecting,
    /// Waiting for the negotiated PDU length.
    NegotiatingPdu,
    /// Idle and ready for the next request.
    Ready,
    /// A request is in flight.
    Busy,
    /// Closed explicitly.
    Closed,
}

impl State {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Disconnected,
            1 => Self::Connecting,
            2 => Self::NegotiatingPdu,
            3 => Self::Ready,
            4 => Self::Busy,
            _ => Self::Closed,
        }
    }

    const fn to_u8(self) -> u8 {
        match self {
            Self::Disconnected => 0,
            Self::Connecting => 1,
            Self::NegotiatingPdu => 2,
            Self::Ready => 3,
            Self::Busy => 4,
            Self::Closed => 5,
        }
    }
}

/// State shared between a client and its idle watchdog.
///
/// [`State::Closed`] is terminal.
#[derive(Debug)]
pub(crate) struct SharedState(AtomicU8);

impl SharedState {
    pub(crate) fn new(state: State) -> Self {
        Self(AtomicU8::new(state.to_u8()))
    }

    pub(crate) fn get(&self) -> State {
        State::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: State) {
        let closed = State::Closed.to_u8();
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                (current != closed).then_some(state.to_u8())
            });
    }

    pub(crate) fn close(&self) {
        self.0.store(State::Closed.to_u8(), Ordering::Release);
    }
}

/// Check that `req_hdr` is the same `Header` as `rsp_hdr`.
fn verify_response_header(req_hdr: &Header, rsp_hdr: &Header) -> Result<(), FramingError> {
    if req_hdr != rsp_hdr {
        return Err(FramingError::PduRefMismatch {
            request: req_hdr.pdu_ref,
            response: rsp_hdr.pdu_ref,
        });
    }
    Ok(())
}
