//! libusb driver for the Ableton Push 2 graphical display.
//!
//! The display is a 960x160 panel fed over a single bulk OUT endpoint. Each
//! frame is a 16 byte header followed by 20 transfers of 16KiB of masked,
//! row-padded pixel data. See [`abi`] for the wire layout.
//!
//! [`Display`] is an explicit session over any [`Transport`]. This crate also
//! keeps one process-wide session on [`UsbTransport`] behind [`open`],
//! [`draw`], [`send_frame`] and [`close`], since only one physical display is
//! ever driven at a time.

use std::sync::{LazyLock, Mutex, MutexGuard, Once, TryLockError};

pub use push2_core::{DisplayError, Result, Transport, TransportError, UsbErrorCode};

pub mod abi;
pub mod encoder;
pub mod session;
pub mod surface;
pub mod usb;

pub use session::Display;
pub use surface::{pack_rgb888, unpack_rgb888, Surface};
pub use usb::UsbTransport;

pub mod consts {
    use std::time::Duration;

    use push2_core::{DeviceIdentity, CLASS_PER_INTERFACE};

    pub const PUSH2_VENDOR_ID: u16 = 0x2982;
    pub const PUSH2_PRODUCT_ID: u16 = 0x1967;
    /// Interface carrying the display endpoint
    pub const DISPLAY_INTERFACE: u8 = 0;
    /// Bulk OUT endpoint for frame data
    pub const DISPLAY_ENDPOINT: u8 = 0x01;
    /// Default timeout for each bulk transfer
    pub const TRANSFER_TIMEOUT: Duration = Duration::from_millis(1000);

    pub const PUSH2: DeviceIdentity = DeviceIdentity {
        vendor_id: PUSH2_VENDOR_ID,
        product_id: PUSH2_PRODUCT_ID,
        class: Some(CLASS_PER_INTERFACE),
    };
}

/// Screen dimensions
pub const SCREEN_WIDTH: u32 = 960;
pub const SCREEN_HEIGHT: u32 = 160;

/// Process-wide session on the real device
static DISPLAY: LazyLock<Mutex<Display<UsbTransport>>> =
    LazyLock::new(|| Mutex::new(Display::new(UsbTransport::new())));

static EXIT_HOOK: Once = Once::new();

fn lock() -> MutexGuard<'static, Display<UsbTransport>> {
    // a panic while drawing must not make the device unreachable for close
    DISPLAY.lock().unwrap_or_else(|e| e.into_inner())
}

extern "C" fn close_at_exit() {
    let mut display = match DISPLAY.try_lock() {
        Ok(display) => display,
        Err(TryLockError::Poisoned(e)) => e.into_inner(),
        Err(TryLockError::WouldBlock) => return,
    };
    display.close();
}

/// Open the process-wide display session.
///
/// The first call registers an exit handler that closes the session when the
/// process exits normally.
pub fn open() -> Result<()> {
    EXIT_HOOK.call_once(|| {
        // SAFETY: `close_at_exit` is a plain `extern "C"` fn that never unwinds
        if unsafe { libc::atexit(close_at_exit) } != 0 {
            tracing::warn!("failed to register display exit handler");
        }
    });
    lock().open().map(|_| ())
}

/// Draw on the process-wide session's surface
pub fn draw<R>(f: impl FnOnce(&mut Surface) -> R) -> Result<R> {
    Ok(f(lock().surface_mut()?))
}

/// Send the process-wide session's surface to the display
pub fn send_frame() -> Result<()> {
    lock().send_frame()
}

/// Set the per transfer timeout of the process-wide session
pub fn set_timeout(timeout: std::time::Duration) {
    lock().set_timeout(timeout);
}

/// Close the process-wide session. Safe to call when already closed.
pub fn close() {
    lock().close();
}

pub fn is_open() -> bool {
    lock().is_open()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn process_session_starts_closed() {
        assert!(!is_open());
        assert!(matches!(send_frame().unwrap_err(), DisplayError::NotOpen));
        assert!(matches!(draw(|s| s.width()), Err(DisplayError::NotOpen)));
        close();
        assert!(!is_open());
    }
}
