//! Close codes carried by a connection's final frame.

use std::fmt;

/// Status code attached to a connection close.
///
/// Only [`CloseCode::Normal`] means "intentional"; every other code is
/// treated as an abnormal closure by the reconnection logic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CloseCode {
    /// 1000: the purpose of the connection was fulfilled.
    Normal,
    /// 1001: the endpoint is going away.
    GoingAway,
    /// 1002: protocol error.
    ProtocolError,
    /// 1003: data of an unsupported type was received.
    UnsupportedData,
    /// 1005: no status code was present.
    NoStatusReceived,
    /// 1006: the connection dropped without a close frame.
    Abnormal,
    /// 1007: payload data was inconsistent with the message type.
    InvalidPayload,
    /// 1008: a policy was violated.
    PolicyViolation,
    /// 1009: a message was too big to process.
    MessageTooBig,
    /// 1011: the server hit an unexpected condition.
    InternalError,
    /// Any other code, preserved verbatim.
    Other(u16),
}

impl CloseCode {
    /// Returns `true` for the normal/intentional close code.
    pub fn is_normal(self) -> bool {
        self == Self::Normal
    }
}

impl From<u16> for CloseCode {
    fn from(code: u16) -> Self {
        match code {
            1000 => Self::Normal,
            1001 => Self::GoingAway,
            1002 => Self::ProtocolError,
            1003 => Self::UnsupportedData,
            1005 => Self::NoStatusReceived,
            1006 => Self::Abnormal,
            1007 => Self::InvalidPayload,
            1008 => Self::PolicyViolation,
            1009 => Self::MessageTooBig,
            1011 => Self::InternalError,
            other => Self::Other(other),
        }
    }
}

impl From<CloseCode> for u16 {
    fn from(code: CloseCode) -> Self {
        match code {
            CloseCode::Normal => 1000,
            CloseCode::GoingAway => 1001,
            CloseCode::ProtocolError => 1002,
            CloseCode::UnsupportedData => 1003,
            CloseCode::NoStatusReceived => 1005,
            CloseCode::Abnormal => 1006,
            CloseCode::InvalidPayload => 1007,
            CloseCode::PolicyViolation => 1008,
            CloseCode::MessageTooBig => 1009,
            CloseCode::InternalError => 1011,
            CloseCode::Other(other) => other,
        }
    }
}

impl fmt::Display for CloseCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", u16::from(*self))
    }
}
