// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! A pure [Rust](https://www.rust-lang.org)
//! [S7comm](https://wiki.wireshark.org/S7comm) client library
//! based on [tokio](https://tokio.rs).
//!
//! S7comm PDUs are transported over ISO-on-TCP (RFC 1006), i.e. wrapped
//! into COTP data units behind a TPKT header. A connection is established
//! in three steps: TCP connect, COTP connection request/confirm, and the
//! negotiation of the maximum PDU length.
//!
//! ## Installation
//!
//! Add this to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! tokio-s7 = "*"
//! ```
//!
//! If you like to use the synchronous client, enable the `tcp-sync` feature:
//!
//! ```toml
//! [dependencies]
//! tokio-s7 = { version = "*", features = ["tcp-sync"] }
//! ```
//!
//! # Examples
//!
//! ## TCP client
//!
//! ```rust,no_run
//! # #[cfg(feature = "tcp")]
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     use tokio_s7::prelude::*;
//!
//!     let socket_addr = "192.168.0.1:102".parse().unwrap();
//!     let config = Config::new(0, 2);
//!
//!     let mut ctx = tcp::connect_with(socket_addr, config).await?;
//!
//!     let mut buf = [0; 4];
//!     ctx.read_db(1, 0, 4, &mut buf).await?;
//!     println!("DB1.DBD0 = {}", u32::from_be_bytes(buf));
//!
//!     println!("Status: {:?}", ctx.get_status().await?);
//!     ctx.disconnect().await?;
//!
//!     Ok(())
//! }
//! # #[cfg(not(feature = "tcp"))]
//! # fn main() {}
//! ```
//!
//! ## Sync TCP client
//!
//! ```rust,no_run
//! # #[cfg(all(feature = "tcp", feature = "sync"))]
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     use tokio_s7::prelude::*;
//!
//!     let socket_addr = "192.168.0.1:102".parse().unwrap();
//!     let mut ctx = sync::tcp::connect(socket_addr)?;
//!     let info = ctx.get_cpu_info()?;
//!     println!("Connected to {} ({})", info.module_type_name, info.serial_number);
//!
//!     Ok(())
//! }
//! # #[cfg(not(all(feature = "tcp", feature = "sync")))]
//! # fn main() {}
//! ```

#![warn(rust_2018_idioms)]
#![warn(missing_debug_implementations)]

pub mod prelude;

pub mod client;

mod codec;

pub mod config;
pub use self::config::{Config, ConnectionType};

mod error;
pub use self::error::{Error, FramingError, ProtocolError};

mod frame;
pub use self::frame::{
    Area, BlockInfo, BlockList, BlockType, CpuInfo, DataItem, ErrorCode, ItemResult, PlcStatus,
    ReadItem, ReadVarItem, Request, Response, ReturnCode, Szl, UserData, UserFunction, WordLen,
    WriteItem,
};

mod service;
pub use self::service::State;

#[cfg(test)]
mod testing;

/// Specialized [`std::result::Result`] type for S7 client operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;
