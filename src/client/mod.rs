// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! S7 clients

use std::{fmt::Debug, io};

use async_trait::async_trait;
use bytes::BytesMut;

use crate::{
    codec::userdata::{
        decode_block_counts, decode_block_info, decode_block_numbers, decode_cpu_info,
        decode_status, decode_szl_header, SZL_ID_COMPONENT_IDENTIFICATION, SZL_ID_CPU_STATUS,
    },
    frame::*,
    Error, FramingError, ProtocolError, Result, State,
};

pub mod batch;

#[cfg(feature = "tcp")]
pub mod tcp;

pub mod util;

#[cfg(feature = "sync")]
pub mod sync;

use self::batch::{BatchPolicy, Greedy};

/// Upper bound for the fragments of a single user data response.
const MAX_FRAGMENTS: usize = 256;

/// Transport independent asynchronous client trait
#[async_trait]
pub trait Client: Send + Debug {
    /// Sends a single request and awaits its response.
    async fn call(&mut self, request: Request<'_>) -> Result<Response>;

    /// PDU length negotiated with the PLC.
    fn pdu_length(&self) -> u16;

    /// Current connection state.
    fn state(&self) -> State;

    /// Disconnects the client.
    ///
    /// Permanently disconnects the client by shutting down the
    /// underlying stream in a graceful manner. Disconnecting an
    /// already closed client succeeds without effect.
    async fn disconnect(&mut self) -> io::Result<()>;
}

/// Asynchronous reader of PLC memory
#[async_trait]
pub trait Reader: Client {
    /// Reads `item` into `buf`, split into as many requests as needed.
    async fn read_area(&mut self, item: DataItem, buf: &mut [u8]) -> Result<()>;

    /// Reads `size` bytes from data block `db_number` starting at `start`.
    async fn read_db(
        &mut self,
        db_number: u16,
        start: u32,
        size: u16,
        buf: &mut [u8],
    ) -> Result<()>;

    /// Reads several items with as few requests as possible.
    ///
    /// Returns one result per item in input order. The outer result
    /// fails only if the connection failed.
    async fn read_multi(&mut self, items: &mut [ReadItem<'_>]) -> Result<Vec<ItemResult>>;
}

/// Asynchronous writer of PLC memory
#[async_trait]
pub trait Writer: Client {
    /// Writes `data` into `item`, split into as many requests as needed.
    async fn write_area(&mut self, item: DataItem, data: &[u8]) -> Result<()>;

    /// Writes `size` bytes into data block `db_number` starting at `start`.
    async fn write_db(&mut self, db_number: u16, start: u32, size: u16, data: &[u8])
        -> Result<()>;

    /// Writes several items with as few requests as possible.
    ///
    /// Returns one result per item in input order. The outer result
    /// fails only if the connection failed.
    async fn write_multi(&mut self, items: &[WriteItem<'_>]) -> Result<Vec<ItemResult>>;
}

/// Asynchronous access to blocks and system status lists
#[async_trait]
pub trait Diagnostics: Client {
    /// Counts the blocks of every kind.
    async fn list_blocks(&mut self) -> Result<BlockList>;

    /// Lists the numbers of all blocks of a kind.
    ///
    /// Returns an empty list if the PLC holds no such blocks.
    async fn list_blocks_of_type(&mut self, block_type: BlockType) -> Result<Vec<u16>>;

    /// Reads a system status list, collecting all of its fragments.
    async fn read_szl(&mut self, id: u16, index: u16) -> Result<Szl>;

    /// Reads the identification of the CPU module.
    async fn get_cpu_info(&mut self) -> Result<CpuInfo>;

    /// Reads the metadata of a block.
    async fn get_block_info(&mut self, block_type: BlockType, number: u16) -> Result<BlockInfo>;

    /// Reads the operating state of the CPU.
    ///
    /// A PLC that refuses to report its state yields [`PlcStatus::Unknown`].
    async fn get_status(&mut self) -> Result<PlcStatus>;
}

/// Asynchronous S7 client context
#[derive(Debug)]
pub struct Context {
    client: Box<dyn Client>,
    policy: Box<dyn BatchPolicy>,
}

impl Context {
    /// Replaces the policy that groups items of multi-item operations.
    pub fn set_batch_policy(&mut self, policy: Box<dyn BatchPolicy>) {
        self.policy = policy;
    }

    /// Sends `request` and collects the fragments of the user data response.
    async fn user_data(&mut self, request: Request<'_>) -> Result<Vec<UserData>> {
        let mut fragments = Vec::new();
        let mut request = request;
        loop {
            let rsp = self.client.call(request).await?;
            let Response::UserData(fragment) = rsp else {
                unreachable!("call() should reject mismatching responses");
            };
            let last = fragment.last;
            let next = Request::Continue {
                function: fragment.function,
                sequence: fragment.sequence,
            };
            log::trace!(
                "Received fragment {} of {:?} (last: {last})",
                fragments.len() + 1,
                fragment.function
            );
            fragments.push(fragment);
            if last {
                return Ok(fragments);
            }
            if fragments.len() >= MAX_FRAGMENTS {
                return Err(payload_error(FramingError::UnexpectedResponse(
                    "too many fragments",
                )));
            }
            request = next;
        }
    }
}

/// Malformed user data leaves the connection intact.
fn payload_error(err: FramingError) -> Error {
    ProtocolError::Payload(err).into()
}

/// Fails on the first fragment with an unsuccessful return code.
fn check_fragments(fragments: &[UserData]) -> Result<()> {
    match fragments.iter().find(|f| !f.return_code.is_success()) {
        Some(fragment) => Err(ProtocolError::Item(fragment.return_code).into()),
        None => Ok(()),
    }
}

impl From<Box<dyn Client>> for Context {
    fn from(client: Box<dyn Client>) -> Self {
        Self {
            client,
            policy: Box::new(Greedy),
        }
    }
}

impl From<Context> for Box<dyn Client> {
    fn from(val: Context) -> Self {
        val.client
    }
}

#[async_trait]
impl Client for Context {
    async fn call(&mut self, request: Request<'_>) -> Result<Response> {
        self.client.call(request).await
    }

    fn pdu_length(&self) -> u16 {
        self.client.pdu_length()
    }

    fn state(&self) -> State {
        self.client.state()
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        self.client.disconnect().await
    }
}

#[async_trait]
impl Reader for Context {
    async fn read_area(&mut self, item: DataItem, buf: &mut [u8]) -> Result<()> {
        batch::read_chunked(self.client.as_mut(), item, buf).await
    }

    async fn read_db(
        &mut self,
        db_number: u16,
        start: u32,
        size: u16,
        buf: &mut [u8],
    ) -> Result<()> {
        self.read_area(DataItem::db_bytes(db_number, start, size), buf)
            .await
    }

    async fn read_multi(&mut self, items: &mut [ReadItem<'_>]) -> Result<Vec<ItemResult>> {
        batch::read_multi(self.client.as_mut(), self.policy.as_ref(), items).await
    }
}

#[async_trait]
impl Writer for Context {
    async fn write_area(&mut self, item: DataItem, data: &[u8]) -> Result<()> {
        batch::write_chunked(self.client.as_mut(), item, data).await
    }

    async fn write_db(
        &mut self,
        db_number: u16,
        start: u32,
        size: u16,
        data: &[u8],
    ) -> Result<()> {
        self.write_area(DataItem::db_bytes(db_number, start, size), data)
            .await
    }

    async fn write_multi(&mut self, items: &[WriteItem<'_>]) -> Result<Vec<ItemResult>> {
        batch::write_multi(self.client.as_mut(), self.policy.as_ref(), items).await
    }
}

#[async_trait]
impl Diagnostics for Context {
    async fn list_blocks(&mut self) -> Result<BlockList> {
        let fragments = self.user_data(Request::ListBlocks).await?;
        check_fragments(&fragments)?;
        let mut payload = BytesMut::new();
        for fragment in &fragments {
            payload.extend_from_slice(&fragment.payload);
        }
        Ok(decode_block_counts(&payload))
    }

    async fn list_blocks_of_type(&mut self, block_type: BlockType) -> Result<Vec<u16>> {
        let fragments = match self.user_data(Request::ListBlocksOfType(block_type)).await {
            Ok(fragments) => fragments,
            Err(Error::Protocol(ProtocolError::Rejected(code))) if code.is_not_found() => {
                log::debug!("No blocks of type {block_type}: {code}");
                return Ok(Vec::new());
            }
            Err(err) => return Err(err),
        };
        if fragments
            .first()
            .is_some_and(|f| f.return_code == ReturnCode::ObjectDoesNotExist)
        {
            return Ok(Vec::new());
        }
        check_fragments(&fragments)?;
        let mut numbers = Vec::new();
        for fragment in &fragments {
            decode_block_numbers(&fragment.payload, &mut numbers);
        }
        Ok(numbers)
    }

    async fn read_szl(&mut self, id: u16, index: u16) -> Result<Szl> {
        let fragments = self.user_data(Request::ReadSzl { id, index }).await?;
        check_fragments(&fragments)?;
        let Some((first, rest)) = fragments.split_first() else {
            unreachable!("user_data() returns at least one fragment");
        };
        let (mut szl, records) = decode_szl_header(&first.payload).map_err(payload_error)?;
        if rest.is_empty() {
            szl.data = records;
        } else {
            let mut data = BytesMut::from(&records[..]);
            for fragment in rest {
                data.extend_from_slice(&fragment.payload);
            }
            szl.data = data.freeze();
        }
        Ok(szl)
    }

    async fn get_cpu_info(&mut self) -> Result<CpuInfo> {
        let szl = self.read_szl(SZL_ID_COMPONENT_IDENTIFICATION, 0).await?;
        Ok(decode_cpu_info(&szl))
    }

    async fn get_block_info(&mut self, block_type: BlockType, number: u16) -> Result<BlockInfo> {
        let not_found = || Error::from(ProtocolError::BlockNotFound { block_type, number });
        let fragments = match self.user_data(Request::BlockInfo { block_type, number }).await {
            Ok(fragments) => fragments,
            Err(Error::Protocol(ProtocolError::Rejected(code))) if code.is_not_found() => {
                return Err(not_found());
            }
            Err(err) => return Err(err),
        };
        if let Err(err) = check_fragments(&fragments) {
            return match err {
                Error::Protocol(ref err) if err.is_not_found() => Err(not_found()),
                err => Err(err),
            };
        }
        let mut payload = BytesMut::new();
        for fragment in &fragments {
            payload.extend_from_slice(&fragment.payload);
        }
        decode_block_info(&payload).map_err(payload_error)
    }

    async fn get_status(&mut self) -> Result<PlcStatus> {
        match self.read_szl(SZL_ID_CPU_STATUS, 0).await {
            Ok(szl) => Ok(decode_status(&szl)),
            Err(Error::Protocol(err)) => {
                log::debug!("PLC refused to report its status: {err}");
                Ok(PlcStatus::Unknown)
            }
            Err(err) => Err(err),
        }
    }
}
