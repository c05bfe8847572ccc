//! Error taxonomy shared by the transport and display session.

use std::fmt;

/// Status codes reported by the USB layer, numbered after libusb
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i32)]
pub enum UsbErrorCode {
    Io = -1,
    InvalidParam = -2,
    Access = -3,
    NoDevice = -4,
    NotFound = -5,
    Busy = -6,
    Timeout = -7,
    Overflow = -8,
    Pipe = -9,
    Interrupted = -10,
    NoMem = -11,
    NotSupported = -12,
    Other = -99,
}

impl UsbErrorCode {
    /// Raw libusb status value
    pub fn code(self) -> i32 {
        self as i32
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            UsbErrorCode::Io => "input/output error",
            UsbErrorCode::InvalidParam => "invalid parameter",
            UsbErrorCode::Access => "access denied",
            UsbErrorCode::NoDevice => "no such device",
            UsbErrorCode::NotFound => "entity not found",
            UsbErrorCode::Busy => "resource busy",
            UsbErrorCode::Timeout => "operation timed out",
            UsbErrorCode::Overflow => "overflow",
            UsbErrorCode::Pipe => "pipe error",
            UsbErrorCode::Interrupted => "system call interrupted",
            UsbErrorCode::NoMem => "insufficient memory",
            UsbErrorCode::NotSupported => "operation not supported",
            UsbErrorCode::Other => "other error",
        }
    }
}

impl fmt::Display for UsbErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.as_str(), self.code())
    }
}

/// Failure reported by the USB layer, tagged with the step that failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{context}: {code}")]
pub struct TransportError {
    pub code: UsbErrorCode,
    pub context: &'static str,
}

impl TransportError {
    pub fn new(code: UsbErrorCode, context: &'static str) -> Self {
        Self { code, context }
    }
}

/// Errors that can occur during display operations
#[derive(Debug, thiserror::Error)]
pub enum DisplayError {
    /// Any USB-layer failure: enumeration, descriptor read, open, claim, transfer
    #[error("usb error: {0}")]
    Transport(#[from] TransportError),

    /// Enumeration succeeded but no device matched
    #[error("push 2 display device not found")]
    DeviceNotFound,

    /// Operation needs an open session
    #[error("push 2 display has not been opened")]
    NotOpen,

    /// `open` was called on a session that is already open
    #[error("push 2 display is already open")]
    AlreadyOpen,

    /// Caller handed over data that breaks a fixed layout rule
    #[error("invariant violated: {0}")]
    InvariantViolation(&'static str),
}

pub type Result<T> = std::result::Result<T, DisplayError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_error_message() {
        let err = DisplayError::from(TransportError::new(
            UsbErrorCode::Timeout,
            "transfer of frame header failed",
        ));
        assert_eq!(
            err.to_string(),
            "usb error: transfer of frame header failed: operation timed out (-7)"
        );
    }
}
