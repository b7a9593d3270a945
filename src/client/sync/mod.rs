// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Synchronous S7 context access

#[cfg(feature = "tcp")]
pub mod tcp;

use std::io;

use crate::{frame::*, Result, State};

use super::{
    Client as AsyncClient, Context as AsyncContext, Diagnostics as AsyncDiagnostics,
    Reader as AsyncReader, Writer as AsyncWriter,
};

/// A transport independent synchronous client trait.
pub trait Client {
    fn call(&mut self, request: Request<'_>) -> Result<Response>;
    fn pdu_length(&self) -> u16;
    fn state(&self) -> State;
    fn disconnect(&mut self) -> io::Result<()>;
}

/// A transport independent synchronous reader trait.
pub trait Reader: Client {
    fn read_area(&mut self, item: DataItem, buf: &mut [u8]) -> Result<()>;
    fn read_db(&mut self, db_number: u16, start: u32, size: u16, buf: &mut [u8]) -> Result<()>;
    fn read_multi(&mut self, items: &mut [ReadItem<'_>]) -> Result<Vec<ItemResult>>;
}

/// A transport independent synchronous writer trait.
pub trait Writer: Client {
    fn write_area(&mut self, item: DataItem, data: &[u8]) -> Result<()>;
    fn write_db(&mut self, db_number: u16, start: u32, size: u16, data: &[u8]) -> Result<()>;
    fn write_multi(&mut self, items: &[WriteItem<'_>]) -> Result<Vec<ItemResult>>;
}

/// Synchronous access to blocks and system status lists.
pub trait Diagnostics: Client {
    fn list_blocks(&mut self) -> Result<BlockList>;
    fn list_blocks_of_type(&mut self, block_type: BlockType) -> Result<Vec<u16>>;
    fn read_szl(&mut self, id: u16, index: u16) -> Result<Szl>;
    fn get_cpu_info(&mut self) -> Result<CpuInfo>;
    fn get_block_info(&mut self, block_type: BlockType, number: u16) -> Result<BlockInfo>;
    fn get_status(&mut self) -> Result<PlcStatus>;
}

/// A synchronous S7 client context.
#[derive(Debug)]
pub struct Context {
    core: tokio::runtime::Runtime,
    async_ctx: AsyncContext,
}

impl Context {
    #[cfg_attr(not(feature = "tcp"), allow(dead_code))]
    pub(crate) fn new(core: tokio::runtime::Runtime, async_ctx: AsyncContext) -> Self {
        Self { core, async_ctx }
    }
}

impl Client for Context {
    fn call(&mut self, request: Request<'_>) -> Result<Response> {
        self.core.block_on(self.async_ctx.call(request))
    }

    fn pdu_length(&self) -> u16 {
        self.async_ctx.pdu_length()
    }

    fn state(&self) -> State {
        self.async_ctx.state()
    }

    fn disconnect(&mut self) -> io::Result<()> {
        self.core.block_on(self.async_ctx.disconnect())
    }
}

impl Reader for Context {
    fn read_area(&mut self, item: DataItem, buf: &mut [u8]) -> Result<()> {
        self.core.block_on(self.async_ctx.read_area(item, buf))
    }

    fn read_db(&mut self, db_number: u16, start: u32, size: u16, buf: &mut [u8]) -> Result<()> {
        self.core
            .block_on(self.async_ctx.read_db(db_number, start, size, buf))
    }

    fn read_multi(&mut self, items: &mut [ReadItem<'_>]) -> Result<Vec<ItemResult>> {
        self.core.block_on(self.async_ctx.read_multi(items))
    }
}

impl Writer for Context {
    fn write_area(&mut self, item: DataItem, data: &[u8]) -> Result<()> {
        self.core.block_on(self.async_ctx.write_area(item, data))
    }

    fn write_db(&mut self, db_number: u16, start: u32, size: u16, data: &[u8]) -> Result<()> {
        self.core
            .block_on(self.async_ctx.write_db(db_number, start, size, data))
    }

    fn write_multi(&mut self, items: &[WriteItem<'_>]) -> Result<Vec<ItemResult>> {
        self.core.block_on(self.async_ctx.write_multi(items))
    }
}

impl Diagnostics for Context {
    fn list_blocks(&mut self) -> Result<BlockList> {
        self.core.block_on(self.async_ctx.list_blocks())
    }

    fn list_blocks_of_type(&mut self, block_type: BlockType) -> Result<Vec<u16>> {
        self.core
            .block_on(self.async_ctx.list_blocks_of_type(block_type))
    }

    fn read_szl(&mut self, id: u16, index: u16) -> Result<Szl> {
        self.core.block_on(self.async_ctx.read_szl(id, index))
    }

    fn get_cpu_info(&mut self) -> Result<CpuInfo> {
        self.core.block_on(self.async_ctx.get_cpu_info())
    }

    fn get_block_info(&mut self, block_type: BlockType, number: u16) -> Result<BlockInfo> {
        self.core
            .block_on(self.async_ctx.get_block_info(block_type, number))
    }

    fn get_status(&mut self) -> Result<PlcStatus> {
        self.core.block_on(self.async_ctx.get_status())
    }
}
