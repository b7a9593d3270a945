// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

use std::{
    fmt, io,
    sync::{
        atomic::{AtomicU16, Ordering},
        Arc, Weak,
    },
    time::Duration,
};

use futures_util::{SinkExt as _, StreamExt as _};
use tokio::{
    io::{AsyncRead, AsyncWrite, AsyncWriteExt as _},
    sync::Mutex,
    task::JoinHandle,
    time::Instant,
};
use tokio_util::codec::Framed;

use crate::{
    codec::tpkt::ClientCodec,
    frame::{tpkt::*, *},
    service::{verify_response_header, SharedState, State},
    Config, Error, FramingError, ProtocolError, Result,
};

const INITIAL_PDU_REF: PduRef = 1;

/// Number of parallel jobs requested during negotiation.
const MAX_AMQ: u16 = 1;

fn timeout_error() -> Error {
    io::Error::new(io::ErrorKind::TimedOut, "request timed out").into()
}

fn not_connected(state: State) -> Error {
    io::Error::new(
        io::ErrorKind::NotConnected,
        format!("not connected ({state:?})"),
    )
    .into()
}

#[derive(Debug)]
struct Link<T> {
    framed: Option<Framed<T, ClientCodec>>,
    last_activity: Instant,
}

impl<T> Link<T>
where
    T: AsyncWrite + Unpin,
{
    fn is_idle(&self, idle_timeout: Option<Duration>) -> bool {
        idle_timeout.is_some_and(|idle_timeout| self.last_activity.elapsed() >= idle_timeout)
    }

    /// Drops the transport after shutting it down.
    async fn close(&mut self) -> io::Result<()> {
        let Some(framed) = self.framed.take() else {
            return Ok(());
        };
        framed.into_inner().shutdown().await
    }
}

/// S7 client over an ISO-on-TCP transport
#[derive(Debug)]
pub(crate) struct Client<T> {
    link: Arc<Mutex<Link<T>>>,
    state: Arc<SharedState>,
    pdu_ref: AtomicU16,
    pdu_length: u16,
    request_timeout: Duration,
    idle_timeout: Option<Duration>,
    watchdog: Option<JoinHandle<()>>,
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    /// Performs the COTP handshake and negotiates the PDU length.
    pub(crate) async fn connect(transport: T, config: &Config) -> Result<Self> {
        let state = Arc::new(SharedState::new(State::Connecting));
        let mut framed = Framed::new(transport, ClientCodec::new(config.pdu_length));
        let connect_request = ConnectRequest {
            local_tsap: config.local_tsap(),
            remote_tsap: config.remote_tsap(),
        };
        log::debug!(
            "Connecting with local TSAP 0x{:04X} and remote TSAP 0x{:04X}",
            connect_request.local_tsap,
            connect_request.remote_tsap
        );
        let confirm = tokio::time::timeout(config.connect_timeout, async {
            framed.send(connect_request).await?;
            match framed.next().await {
                Some(Ok(Tpdu::ConnectConfirm(confirm))) => Ok(confirm),
                Some(Ok(Tpdu::Data(_))) => {
                    Err(FramingError::UnexpectedResponse("data instead of connection confirm").into())
                }
                Some(Err(err)) => Err(err),
                None => Err(Error::from(io::Error::from(io::ErrorKind::UnexpectedEof))),
            }
        })
        .await
        .map_err(|_| timeout_error())??;
        log::debug!(
            "Connection confirmed: dst_ref = {}, src_ref = {}",
            confirm.dst_ref,
            confirm.src_ref
        );

        state.set(State::NegotiatingPdu);
        let mut client = Self {
            link: Arc::new(Mutex::new(Link {
                framed: Some(framed),
                last_activity: Instant::now(),
            })),
            state,
            pdu_ref: AtomicU16::new(INITIAL_PDU_REF),
            pdu_length: config.pdu_length,
            request_timeout: config.request_timeout,
            idle_timeout: config.idle_timeout,
            watchdog: None,
        };
        let request = Request::SetupCommunication {
            max_amq_calling: MAX_AMQ,
            max_amq_called: MAX_AMQ,
            pdu_length: config.pdu_length,
        };
        let pdu_length = match client.call(request).await? {
            Response::SetupCommunication { pdu_length, .. } => pdu_length,
            _ => unreachable!("call() should reject mismatching responses"),
        };
        if pdu_length == 0 {
            client.disconnect().await?;
            return Err(ProtocolError::ConnectionRejected("PDU length negotiation").into());
        }
        log::debug!(
            "Negotiated PDU length: {pdu_length} (requested: {})",
            config.pdu_length
        );
        client.pdu_length = pdu_length;
        if let Some(framed) = client.link.lock().await.framed.as_mut() {
            framed.codec_mut().set_max_pdu_length(pdu_length);
        }
        if let Some(idle_timeout) = client.idle_timeout {
            client.watchdog = Some(spawn_watchdog(
                Arc::downgrade(&client.link),
                Arc::clone(&client.state),
                idle_timeout,
            ));
        }
        Ok(client)
    }

    fn next_request_hdr(&self) -> Header {
        let pdu_ref = self.pdu_ref.fetch_add(1, Ordering::Relaxed);
        Header { pdu_ref }
    }

    async fn exchange(&self, link: &mut Link<T>, request: Request<'_>) -> Result<Response> {
        let framed = link
            .framed
            .as_mut()
            .ok_or_else(|| not_connected(self.state.get()))?;
        let req_adu = RequestAdu {
            hdr: self.next_request_hdr(),
            pdu: request.into(),
        };

        framed.read_buffer_mut().clear();

        let res_adu = tokio::time::timeout(self.request_timeout, async {
            framed.send(&req_adu).await?;
            framed
                .next()
                .await
                .ok_or_else(|| Error::from(io::Error::from(io::ErrorKind::UnexpectedEof)))?
        })
        .await
        .map_err(|_| timeout_error())??;

        let Tpdu::Data(res_adu) = res_adu else {
            return Err(FramingError::UnexpectedResponse("connection confirm").into());
        };
        verify_response_header(&req_adu.hdr, &res_adu.hdr)?;
        match res_adu.pdu {
            ResponsePdu(Ok(res)) => {
                req_adu.pdu.0.verify_response(&res)?;
                Ok(res)
            }
            ResponsePdu(Err(code)) => Err(ProtocolError::Rejected(code).into()),
        }
    }

    pub(crate) async fn call(&mut self, request: Request<'_>) -> Result<Response> {
        log::debug!("Call {:?}", request);
        request.check()?;
        let mut link = self.link.lock().await;
        if link.framed.is_some() && link.is_idle(self.idle_timeout) {
            log::debug!("Closing idle connection");
            if let Err(err) = link.close().await {
                log::debug!("Failed to shut down idle connection: {err}");
            }
            self.state.set(State::Disconnected);
        }
        if link.framed.is_none() {
            return Err(not_connected(self.state.get()));
        }

        self.state.set(State::Busy);
        let result = self.exchange(&mut link, request).await;
        link.last_activity = Instant::now();
        match &result {
            Err(err) if err.is_fatal() => {
                log::warn!("Dropping connection: {err}");
                link.framed = None;
                self.state.set(State::Disconnected);
            }
            _ => self.state.set(State::Ready),
        }
        result
    }

    pub(crate) async fn disconnect(&mut self) -> io::Result<()> {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
        self.state.close();
        let mut link = self.link.lock().await;
        if link.framed.is_some() {
            log::debug!("Disconnecting");
        }
        link.close().await
    }
}

impl<T> Drop for Client<T> {
    fn drop(&mut self) {
        if let Some(watchdog) = self.watchdog.take() {
            watchdog.abort();
        }
    }
}

/// Closes the transport once no traffic occurred for `idle_timeout`.
fn spawn_watchdog<T>(
    link: Weak<Mutex<Link<T>>>,
    state: Arc<SharedState>,
    idle_timeout: Duration,
) -> JoinHandle<()>
where
    T: AsyncWrite + Send + Unpin + 'static,
{
    tokio::spawn(async move {
        let mut deadline = Instant::now() + idle_timeout;
        loop {
            tokio::time::sleep_until(deadline).await;
            let Some(link) = link.upgrade() else {
                return;
            };
            let mut link = link.lock().await;
            if link.framed.is_none() {
                return;
            }
            let idle_deadline = link.last_activity + idle_timeout;
            if Instant::now() < idle_deadline {
                deadline = idle_deadline;
                continue;
            }
            log::debug!("Closing connection after {idle_timeout:?} without traffic");
            if let Err(err) = link.close().await {
                log::debug!("Failed to shut down idle connection: {err}");
            }
            state.set(State::Disconnected);
            return;
        }
    })
}

#[async_trait::async_trait]
impl<T> crate::client::Client for Client<T>
where
    T: fmt::Debug + AsyncRead + AsyncWrite + Send + Unpin + 'static,
{
    async fn call(&mut self, req: Request<'_>) -> Result<Response> {
        Client::call(self, req).await
    }

    fn pdu_length(&self) -> u16 {
        self.pdu_length
    }

    fn state(&self) -> State {
        self.state.get()
    }

    async fn disconnect(&mut self) -> io::Result<()> {
        Client::disconnect(self).await
    }
}
