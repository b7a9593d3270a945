// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! TCP client connections

use std::{fmt, future::Future, io, net::SocketAddr, pin::Pin};

use tokio::{
    io::{AsyncRead, AsyncWrite},
    net::TcpStream,
};

use crate::{service, Config, Result};

use super::{util::NewContext, Context};

/// Establish a connection to a PLC with the default [`Config`].
pub async fn connect(socket_addr: SocketAddr) -> Result<Context> {
    connect_with(socket_addr, Config::default()).await
}

/// Establish a connection to a PLC.
///
/// The connect timeout applies to the TCP connection and to the
/// COTP handshake separately.
pub async fn connect_with(socket_addr: SocketAddr, config: Config) -> Result<Context> {
    log::debug!("Connecting to {socket_addr}");
    let transport = tokio::time::timeout(config.connect_timeout, TcpStream::connect(socket_addr))
        .await
        .map_err(|_| io::Error::new(io::ErrorKind::TimedOut, "connect timed out"))??;
    transport.set_nodelay(true)?;
    attach_with(transport, &config).await
}

/// Attach a new client context to a transport connection.
///
/// Performs the COTP handshake and the PDU length negotiation.
pub async fn attach_with<T>(transport: T, config: &Config) -> Result<Context>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + fmt::Debug + 'static,
{
    let client = service::tcp::Client::connect(transport, config).await?;
    Ok(Context::from(Box::new(client) as Box<dyn super::Client>))
}

/// Address and settings for (re-)connecting a context on demand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub socket_addr: SocketAddr,
    pub config: Config,
}

impl Endpoint {
    #[must_use]
    pub fn new(socket_addr: SocketAddr, config: Config) -> Self {
        Self {
            socket_addr,
            config,
        }
    }
}

impl NewContext for Endpoint {
    fn new_context(&self) -> Pin<Box<dyn Future<Output = Result<Context>> + Send>> {
        let Self {
            socket_addr,
            config,
        } = self.clone();
        Box::pin(connect_with(socket_addr, config))
    }
}
