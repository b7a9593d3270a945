// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Utilities for sharing an S7 context

use std::{
    collections::HashMap,
    fmt,
    future::Future,
    net::SocketAddr,
    pin::Pin,
    sync::{Arc, PoisonError, RwLock},
};

use tokio::sync::Mutex;

use crate::Result;

use super::{Client as _, Context};

/// A context shared between multiple tasks.
///
/// The mutex serializes requests, i.e. at most one request per
/// connection is in flight.
pub type SharedContext = Arc<Mutex<Context>>;

/// Trait for (re-)creating new contexts on demand.
///
/// Implement this trait for reconnecting a [`SharedContext`] on demand.
pub trait NewContext: Send + Sync + fmt::Debug {
    /// Create a new context.
    fn new_context(&self) -> Pin<Box<dyn Future<Output = Result<Context>> + Send>>;
}

/// Wraps an initial context for sharing.
#[must_use]
pub fn share_context(context: Context) -> SharedContext {
    Arc::new(Mutex::new(context))
}

/// Asynchronously disconnect and reconnect the shared context.
///
/// Other tasks waiting for the context continue with the new
/// connection. If connecting fails the old, closed context remains.
pub async fn reconnect_shared_context(
    shared_context: &SharedContext,
    new_context: &dyn NewContext,
) -> Result<()> {
    let mut context = shared_context.lock().await;
    // The existing connection is closed first to release the
    // connection resources of the PLC.
    if let Err(err) = context.disconnect().await {
        log::debug!("Failed to disconnect before reconnecting: {err}");
    }
    *context = new_context.new_context().await?;
    log::debug!("Reconnected shared context");
    Ok(())
}

/// Shared contexts by the address of their PLC.
///
/// Cloning yields another handle to the same registry.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    contexts: Arc<RwLock<HashMap<SocketAddr, SharedContext>>>,
}

impl Registry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, socket_addr: &SocketAddr) -> Option<SharedContext> {
        let contexts = self.contexts.read().unwrap_or_else(PoisonError::into_inner);
        contexts.get(socket_addr).map(Arc::clone)
    }

    /// Registers `context` for `socket_addr` unless another context
    /// has been registered before.
    ///
    /// Returns the registered context. A context that loses the race is
    /// dropped, which closes its connection.
    pub fn register(&self, socket_addr: SocketAddr, context: Context) -> SharedContext {
        let mut contexts = self
            .contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let registered = contexts.entry(socket_addr).or_insert_with(|| {
            log::debug!("Registering context for {socket_addr}");
            share_context(context)
        });
        Arc::clone(registered)
    }

    pub fn remove(&self, socket_addr: &SocketAddr) -> Option<SharedContext> {
        let mut contexts = self
            .contexts
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        contexts.remove(socket_addr)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.contexts
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the registered context of `endpoint` or connects a new one.
    #[cfg(feature = "tcp")]
    pub async fn get_or_connect(&self, endpoint: &super::tcp::Endpoint) -> Result<SharedContext> {
        if let Some(context) = self.get(&endpoint.socket_addr) {
            return Ok(context);
        }
        let context = endpoint.new_context().await?;
        Ok(self.register(endpoint.socket_addr, context))
    }
}
