// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::net::SocketAddr;

use crate::{client::tcp::connect_with as async_connect_with, Config, Result};

use super::Context;

/// Establish a connection to a PLC with the default [`Config`].
pub fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_with(socket_addr, Config::default())
}

/// Establish a connection to a PLC.
///
/// The context owns a single-threaded runtime that drives all requests.
pub fn connect_with(socket_addr: SocketAddr, config: Config) -> Result<Context> {
    let core = tokio::runtime::Builder::new_current_thread()
        .enable_io()
        .enable_time()
        .build()?;
    let async_ctx = core.block_on(async_connect_with(socket_addr, config))?;
    Ok(Context::new(core, async_ctx))
}
