//! Topic and delivery-quality value types.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Suffix appended to an inbound topic name to build its default reply topic.
pub const RESPONSE_SUFFIX: &str = "/_response";

/// Delivery-quality level of a topic.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum QoS {
    /// Fire and forget.
    #[default]
    AtMostOnce = 0,
    /// Acknowledged delivery, duplicates possible.
    AtLeastOnce = 1,
    /// Assured single delivery.
    ExactlyOnce = 2,
}

impl QoS {
    /// Returns the numeric level.
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Converts a raw byte, degrading anything above 2 to [`QoS::AtMostOnce`].
    ///
    /// Used for levels carried inside payloads, where the sender is not
    /// trusted to stay in range.
    pub fn from_byte_lossy(level: u8) -> Self {
        Self::try_from(level).unwrap_or_default()
    }
}

impl TryFrom<u8> for QoS {
    type Error = CoreError;

    fn try_from(level: u8) -> CoreResult<Self> {
        match level {
            0 => Ok(Self::AtMostOnce),
            1 => Ok(Self::AtLeastOnce),
            2 => Ok(Self::ExactlyOnce),
            other => Err(CoreError::InvalidQos(other)),
        }
    }
}

impl From<QoS> for u8 {
    fn from(qos: QoS) -> Self {
        qos.as_u8()
    }
}

impl fmt::Display for QoS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_u8())
    }
}

/// A named destination on the pub/sub transport plus its delivery level.
///
/// Topics are immutable once built and cheap to clone.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Topic {
    name: String,
    qos: QoS,
}

impl Topic {
    /// Creates a new topic.
    pub fn new(name: impl Into<String>, qos: QoS) -> Self {
        Self {
            name: name.into(),
            qos,
        }
    }

    /// The conventional reply destination for a message received on `inbound`:
    /// `<inbound>/_response` at the inbound QoS.
    pub fn response_for(inbound: &Topic) -> Self {
        Self {
            name: format!("{}{RESPONSE_SUFFIX}", inbound.name),
            qos: inbound.qos,
        }
    }

    /// Returns the topic name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the delivery level.
    pub fn qos(&self) -> QoS {
        self.qos
    }

    /// Returns `true` if the name is empty.
    ///
    /// An empty-named topic means "not configured" wherever a topic is optional.
    pub fn is_empty(&self) -> bool {
        self.name.is_empty()
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (qos {})", self.name, self.qos)
    }
}
