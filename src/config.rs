// SPDX-FileCopyrightText: Copyright (c) 2017-2025 slowtec GmbH <post@slowtec.de>
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Connection settings.

use std::time::Duration;

/// PDU length requested during negotiation unless configured otherwise.
pub const DEFAULT_PDU_LENGTH: u16 = 480;

const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(3);
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(1);

/// Local TSAP of the client.
const LOCAL_TSAP: u16 = 0x0100;

/// Role the client connects as.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ConnectionType {
    /// Programming device
    #[default]
    Pg,
    /// Operator panel
    Op,
    /// Basic S7 communication
    S7Basic,
}

impl ConnectionType {
    #[must_use]
    pub const fn value(self) -> u8 {
        match self {
            Self::Pg => 0x01,
            Self::Op => 0x02,
            Self::S7Basic => 0x03,
        }
    }
}

/// Settings of a connection to a PLC.
///
/// ```
/// use std::time::Duration;
/// use tokio_s7::Config;
///
/// let config = Config::new(0, 1)
///     .with_request_timeout(Duration::from_millis(500))
///     .with_idle_timeout(Duration::from_secs(30));
/// assert_eq!(config.remote_tsap(), 0x0101);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct Config {
    pub rack: u16,
    pub slot: u16,
    pub connection_type: ConnectionType,
    /// Overrides the TSAP pair derived from rack, slot and connection type.
    pub tsap: Option<(u16, u16)>,
    /// Requested PDU length. The PLC may negotiate a smaller one.
    pub pdu_length: u16,
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub connect_timeout: Duration,
    #[cfg_attr(feature = "serde", serde(with = "millis"))]
    pub request_timeout: Duration,
    /// Closes the connection after this long without traffic.
    #[cfg_attr(feature = "serde", serde(with = "millis::option"))]
    pub idle_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rack: 0,
            slot: 2,
            connection_type: ConnectionType::default(),
            tsap: None,
            pdu_length: DEFAULT_PDU_LENGTH,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            idle_timeout: None,
        }
    }
}

impl Config {
    #[must_use]
    pub fn new(rack: u16, slot: u16) -> Self {
        Self {
            rack,
            slot,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_connection_type(mut self, connection_type: ConnectionType) -> Self {
        self.connection_type = connection_type;
        self
    }

    #[must_use]
    pub fn with_tsap(mut self, local_tsap: u16, remote_tsap: u16) -> Self {
        self.tsap = Some((local_tsap, remote_tsap));
        self
    }

    #[must_use]
    pub fn with_pdu_length(mut self, pdu_length: u16) -> Self {
        self.pdu_length = pdu_length;
        self
    }

    #[must_use]
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    #[must_use]
    pub fn local_tsap(&self) -> u16 {
        self.tsap.map_or(LOCAL_TSAP, |(local, _)| local)
    }

    /// `(connection_type << 8) + rack * 0x20 + slot`
    #[must_use]
    pub fn remote_tsap(&self) -> u16 {
        self.tsap.map_or_else(
            || {
                (u16::from(self.connection_type.value()) << 8)
                    .wrapping_add(self.rack.wrapping_mul(0x20))
                    .wrapping_add(self.slot)
            },
            |(_, remote)| remote,
        )
    }
}

#[cfg(feature = "serde")]
mod millis {
    use std::time::Duration;

    use serde::{Deserialize as _, Deserializer, Serializer};

    #[allow(clippy::cast_possible_truncation)]
    pub(super) fn serialize<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }

    pub(super) mod option {
        use std::time::Duration;

        use serde::{Deserialize as _, Deserializer, Serializer};

        #[allow(clippy::cast_possible_truncation)]
        pub(crate) fn serialize<S: Serializer>(
            duration: &Option<Duration>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match duration {
                Some(duration) => serializer.serialize_some(&(duration.as_millis() as u64)),
                None => serializer.serialize_none(),
            }
        }

        pub(crate) fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Duration>, D::Error> {
            Option::<u64>::deserialize(deserializer).map(|millis| millis.map(Duration::from_millis))
        }
    }
}
