//! USB capability trait and the adapter operations built on top of it.
//!
//! The display session never talks to libusb directly. Everything goes through
//! [`Transport`], which keeps the lifecycle testable with a scripted double.

use std::time::Duration;

use crate::error::{TransportError, UsbErrorCode};

/// `bDeviceClass` value meaning "class is defined per interface"
pub const CLASS_PER_INTERFACE: u8 = 0x00;

/// Subset of a USB device descriptor needed for device matching
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceDescriptor {
    pub vendor_id: u16,
    pub product_id: u16,
    pub class: u8,
}

/// Fixed identity of a target device
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceIdentity {
    pub vendor_id: u16,
    pub product_id: u16,
    pub class: Option<u8>,
}

impl DeviceIdentity {
    /// Check if a descriptor matches this identity
    pub fn matches(&self, descriptor: &DeviceDescriptor) -> bool {
        descriptor.vendor_id == self.vendor_id
            && descriptor.product_id == self.product_id
            && self.class.is_none_or(|c| descriptor.class == c)
    }
}

/// Narrow USB capability consumed by the display session
///
/// Implementations own the library context. `init` and `exit` bracket every
/// other call; using a device method outside of that window must fail with a
/// [`TransportError`] instead of touching released resources.
pub trait Transport {
    type Device;
    type Handle;

    /// Initialize the library context
    fn init(&mut self) -> Result<(), TransportError>;
    /// Tear down the library context. Outstanding handles become invalid.
    fn exit(&mut self);

    /// Enumerate attached devices. The underlying list is released before returning.
    fn devices(&mut self) -> Result<Vec<Self::Device>, TransportError>;
    fn descriptor(&mut self, device: &Self::Device) -> Result<DeviceDescriptor, TransportError>;

    fn open(&mut self, device: &Self::Device) -> Result<Self::Handle, TransportError>;
    fn close(&mut self, handle: Self::Handle);
    fn claim_interface(&mut self, handle: &mut Self::Handle, interface: u8)
        -> Result<(), TransportError>;
    fn release_interface(
        &mut self,
        handle: &mut Self::Handle,
        interface: u8,
    ) -> Result<(), TransportError>;

    /// Blocking bulk OUT write, returning the number of bytes the device accepted
    fn write_bulk(
        &mut self,
        handle: &mut Self::Handle,
        endpoint: u8,
        buf: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError>;
}

/// Enumerate all attached devices
pub fn list_devices<T: Transport>(transport: &mut T) -> Result<Vec<T::Device>, TransportError> {
    transport.devices()
}

/// Find the first device matching `identity`.
///
/// A descriptor that cannot be read aborts the search: a broken device list is
/// an error, not a missing device.
pub fn find_by_identity<T: Transport>(
    transport: &mut T,
    devices: Vec<T::Device>,
    identity: DeviceIdentity,
) -> Result<Option<T::Device>, TransportError> {
    for device in devices {
        let descriptor = transport.descriptor(&device).map_err(|e| {
            TransportError::new(e.code, "unable to read device descriptor")
        })?;
        if identity.matches(&descriptor) {
            tracing::debug!(
                "found device {:04x}:{:04x}",
                descriptor.vendor_id,
                descriptor.product_id
            );
            return Ok(Some(device));
        }
    }
    Ok(None)
}

/// Open a device and claim one of its interfaces.
///
/// If the claim fails the freshly opened handle is closed before returning.
pub fn open_and_claim<T: Transport>(
    transport: &mut T,
    device: &T::Device,
    interface: u8,
) -> Result<T::Handle, TransportError> {
    let mut handle = transport
        .open(device)
        .map_err(|e| TransportError::new(e.code, "unable to open usb device"))?;
    if let Err(e) = transport.claim_interface(&mut handle, interface) {
        transport.close(handle);
        return Err(TransportError::new(e.code, "unable to claim display interface"));
    }
    Ok(handle)
}

/// Write all of `bytes` to `endpoint`. Short writes count as failures. Never retries.
pub fn bulk_transfer<T: Transport>(
    transport: &mut T,
    handle: &mut T::Handle,
    endpoint: u8,
    bytes: &[u8],
    timeout: Duration,
    context: &'static str,
) -> Result<usize, TransportError> {
    let sent = transport
        .write_bulk(handle, endpoint, bytes, timeout)
        .map_err(|e| TransportError::new(e.code, context))?;
    if sent != bytes.len() {
        return Err(TransportError::new(UsbErrorCode::Io, context));
    }
    Ok(sent)
}

/// Release the claimed interface and close the handle
pub fn close<T: Transport>(transport: &mut T, mut handle: T::Handle, interface: u8) {
    if let Err(e) = transport.release_interface(&mut handle, interface) {
        tracing::warn!("failed to release interface {interface}: {e}");
    }
    transport.close(handle);
}
