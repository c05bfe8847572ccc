//! Core traits and types for push2 display access.
//!
//! This crate provides:
//! - The `Transport` capability trait the display session is written against
//! - Generic adapter operations (device search, open + claim, bulk writes)
//! - The shared error taxonomy

mod error;
mod transport;

pub use error::{DisplayError, Result, TransportError, UsbErrorCode};
pub use transport::{
    bulk_transfer, close, find_by_identity, list_devices, open_and_claim, DeviceDescriptor,
    DeviceIdentity, Transport, CLASS_PER_INTERFACE,
};
