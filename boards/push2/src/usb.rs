//! libusb backed transport.

use std::time::Duration;

use push2_core::{DeviceDescriptor, Transport, TransportError, UsbErrorCode};
use rusb::{Context, Device, DeviceHandle, UsbContext};

/// Map a rusb error onto the libusb status it came from
fn code(err: rusb::Error) -> UsbErrorCode {
    match err {
        rusb::Error::Io => UsbErrorCode::Io,
        rusb::Error::InvalidParam => UsbErrorCode::InvalidParam,
        rusb::Error::Access => UsbErrorCode::Access,
        rusb::Error::NoDevice => UsbErrorCode::NoDevice,
        rusb::Error::NotFound => UsbErrorCode::NotFound,
        rusb::Error::Busy => UsbErrorCode::Busy,
        rusb::Error::Timeout => UsbErrorCode::Timeout,
        rusb::Error::Overflow => UsbErrorCode::Overflow,
        rusb::Error::Pipe => UsbErrorCode::Pipe,
        rusb::Error::Interrupted => UsbErrorCode::Interrupted,
        rusb::Error::NoMem => UsbErrorCode::NoMem,
        rusb::Error::NotSupported => UsbErrorCode::NotSupported,
        _ => UsbErrorCode::Other,
    }
}

fn usb_err(context: &'static str) -> impl Fn(rusb::Error) -> TransportError {
    move |e| TransportError::new(code(e), context)
}

/// Transport over a private libusb context
#[derive(Default)]
pub struct UsbTransport {
    context: Option<Context>,
}

impl UsbTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn context(&self) -> Result<&Context, TransportError> {
        self.context.as_ref().ok_or(TransportError::new(
            UsbErrorCode::NotFound,
            "usb context is not initialized",
        ))
    }
}

impl Transport for UsbTransport {
    type Device = Device<Context>;
    type Handle = DeviceHandle<Context>;

    fn init(&mut self) -> Result<(), TransportError> {
        if self.context.is_none() {
            self.context = Some(Context::new().map_err(usb_err("unable to initialize libusb"))?);
        }
        Ok(())
    }

    fn exit(&mut self) {
        self.context = None;
    }

    fn devices(&mut self) -> Result<Vec<Self::Device>, TransportError> {
        let list = self
            .context()?
            .devices()
            .map_err(usb_err("unable to get device list"))?;
        Ok(list.iter().collect())
    }

    fn descriptor(&mut self, device: &Self::Device) -> Result<DeviceDescriptor, TransportError> {
        self.context()?;
        let desc = device
            .device_descriptor()
            .map_err(usb_err("unable to read device descriptor"))?;
        Ok(DeviceDescriptor {
            vendor_id: desc.vendor_id(),
            product_id: desc.product_id(),
            class: desc.class_code(),
        })
    }

    fn open(&mut self, device: &Self::Device) -> Result<Self::Handle, TransportError> {
        self.context()?;
        device.open().map_err(usb_err("unable to open usb device"))
    }

    fn close(&mut self, handle: Self::Handle) {
        drop(handle);
    }

    fn claim_interface(
        &mut self,
        handle: &mut Self::Handle,
        interface: u8,
    ) -> Result<(), TransportError> {
        self.context()?;
        handle
            .claim_interface(interface)
            .map_err(usb_err("unable to claim interface"))
    }

    fn release_interface(
        &mut self,
        handle: &mut Self::Handle,
        interface: u8,
    ) -> Result<(), TransportError> {
        self.context()?;
        handle
            .release_interface(interface)
            .map_err(usb_err("unable to release interface"))
    }

    fn write_bulk(
        &mut self,
        handle: &mut Self::Handle,
        endpoint: u8,
        buf: &[u8],
        timeout: Duration,
    ) -> Result<usize, TransportError> {
        self.context()?;
        handle
            .write_bulk(endpoint, buf, timeout)
            .map_err(usb_err("bulk transfer failed"))
    }
}
