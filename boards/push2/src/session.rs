//! Open/send/close lifecycle of the display.

use std::time::Duration;

use push2_core::{
    bulk_transfer, find_by_identity, list_devices, open_and_claim, DisplayError, Result,
    Transport,
};
use tracing::{debug, trace};

use crate::abi::{CHUNKS_PER_FRAME, CHUNK_BYTES, FRAME_HEADER, ROWS_PER_CHUNK};
use crate::consts::{DISPLAY_ENDPOINT, DISPLAY_INTERFACE, PUSH2, TRANSFER_TIMEOUT};
use crate::encoder::encode_chunk_into;
use crate::surface::Surface;

/// Long lived transfer buffers, reused across chunks and frames
struct Buffers {
    header: Box<[u8; 16]>,
    chunk: Box<[u8]>,
}

impl Buffers {
    fn new() -> Self {
        Self {
            header: Box::new(FRAME_HEADER),
            chunk: vec![0u8; CHUNK_BYTES].into_boxed_slice(),
        }
    }
}

/// A display session over some [`Transport`].
///
/// The session is `Open` while it holds a claimed device handle. Every resource
/// acquired by [`Display::open`] is tracked on its own so that [`Display::close`]
/// releases exactly what exists, in handle-then-context order. Dropping the
/// session closes it.
pub struct Display<T: Transport> {
    transport: T,
    timeout: Duration,
    context: bool,
    buffers: Option<Buffers>,
    handle: Option<T::Handle>,
    surface: Option<Surface>,
}

impl<T: Transport> Display<T> {
    /// Create a closed session
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            timeout: TRANSFER_TIMEOUT,
            context: false,
            buffers: None,
            handle: None,
            surface: None,
        }
    }

    /// Override the per transfer timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn is_open(&self) -> bool {
        self.handle.is_some()
    }

    /// Find the display, claim it, and hand out the surface to draw on.
    ///
    /// Any failure releases everything acquired so far before returning, leaving
    /// the session closed.
    pub fn open(&mut self) -> Result<&mut Surface> {
        if self.is_open() {
            return Err(DisplayError::AlreadyOpen);
        }

        self.transport.init()?;
        self.context = true;
        self.buffers = Some(Buffers::new());

        if let Err(e) = self.connect() {
            debug!("failed to open display: {e}");
            self.close();
            return Err(e);
        }

        debug!("opened display interface {DISPLAY_INTERFACE}");
        Ok(self.surface.insert(Surface::default()))
    }

    fn connect(&mut self) -> Result<()> {
        let devices = list_devices(&mut self.transport)?;
        let device = find_by_identity(&mut self.transport, devices, PUSH2)?
            .ok_or(DisplayError::DeviceNotFound)?;
        self.handle = Some(open_and_claim(
            &mut self.transport,
            &device,
            DISPLAY_INTERFACE,
        )?);
        Ok(())
    }

    pub fn surface(&self) -> Result<&Surface> {
        self.surface.as_ref().ok_or(DisplayError::NotOpen)
    }

    pub fn surface_mut(&mut self) -> Result<&mut Surface> {
        self.surface.as_mut().ok_or(DisplayError::NotOpen)
    }

    /// Send whatever is currently drawn on the surface.
    ///
    /// Writes the header, then one chunk per 8 rows. The first failed transfer
    /// aborts the frame. The session stays open either way.
    pub fn send_frame(&mut self) -> Result<()> {
        let (Some(handle), Some(buffers), Some(surface)) = (
            self.handle.as_mut(),
            self.buffers.as_mut(),
            self.surface.as_ref(),
        ) else {
            return Err(DisplayError::NotOpen);
        };

        let sent = bulk_transfer(
            &mut self.transport,
            handle,
            DISPLAY_ENDPOINT,
            &buffers.header[..],
            self.timeout,
            "transfer of frame header failed",
        )?;
        trace!("{sent} header bytes sent");

        let width = surface.width() as usize;
        for i in 0..CHUNKS_PER_FRAME {
            let rows = surface.rows((i * ROWS_PER_CHUNK) as u32, ROWS_PER_CHUNK as u32);
            encode_chunk_into(rows, ROWS_PER_CHUNK, width, &mut buffers.chunk)?;
            let sent = bulk_transfer(
                &mut self.transport,
                handle,
                DISPLAY_ENDPOINT,
                &buffers.chunk,
                self.timeout,
                "transfer of frame chunk failed",
            )?;
            trace!("{sent} bytes sent for chunk {i}");
        }
        Ok(())
    }

    /// Release the device and the usb context. Safe to call in any state.
    pub fn close(&mut self) {
        if let Some(handle) = self.handle.take() {
            push2_core::close(&mut self.transport, handle, DISPLAY_INTERFACE);
            debug!("closed display interface {DISPLAY_INTERFACE}");
        }
        self.surface = None;
        if self.context {
            self.transport.exit();
            self.context = false;
        }
        self.buffers = None;
    }
}

impl<T: Transport> Drop for Display<T> {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use push2_core::{DeviceDescriptor, TransportError, UsbErrorCode, CLASS_PER_INTERFACE};

    use super::*;
    use crate::abi::{ROW_STRIDE, SHAPING_MASK};
    use crate::consts::{PUSH2_PRODUCT_ID, PUSH2_VENDOR_ID};

    /// Scripted transport that records every primitive it is asked to run
    #[derive(Default)]
    struct FakeTransport {
        devices: Vec<DeviceDescriptor>,
        fail_init: bool,
        fail_descriptor: bool,
        fail_claim: bool,
        /// Index of the bulk write to fail, counting the header as 0
        fail_write: Option<usize>,

        inits: usize,
        exits: usize,
        opens: usize,
        claims: usize,
        releases: usize,
        closes: usize,
        writes: Vec<(u8, Vec<u8>, Duration)>,
        /// Handle and context lifecycle calls, in order
        events: Vec<&'static str>,
    }

    impl FakeTransport {
        fn with_push() -> Self {
            Self {
                devices: vec![
                    DeviceDescriptor {
                        vendor_id: 0x046d,
                        product_id: 0xc52b,
                        class: 0,
                    },
                    DeviceDescriptor {
                        vendor_id: PUSH2_VENDOR_ID,
                        product_id: PUSH2_PRODUCT_ID,
                        class: CLASS_PER_INTERFACE,
                    },
                ],
                ..Default::default()
            }
        }
    }

    impl Transport for FakeTransport {
        type Device = usize;
        type Handle = u8;

        fn init(&mut self) -> std::result::Result<(), TransportError> {
            if self.fail_init {
                return Err(TransportError::new(UsbErrorCode::Other, "init"));
            }
            self.inits += 1;
            Ok(())
        }

        fn exit(&mut self) {
            self.exits += 1;
            self.events.push("exit");
        }

        fn devices(&mut self) -> std::result::Result<Vec<usize>, TransportError> {
            Ok((0..self.devices.len()).collect())
        }

        fn descriptor(
            &mut self,
            device: &usize,
        ) -> std::result::Result<DeviceDescriptor, TransportError> {
            if self.fail_descriptor {
                return Err(TransportError::new(UsbErrorCode::Io, "descriptor"));
            }
            Ok(self.devices[*device])
        }

        fn open(&mut self, device: &usize) -> std::result::Result<u8, TransportError> {
            self.opens += 1;
            self.events.push("open");
            Ok(*device as u8)
        }

        fn close(&mut self, _: u8) {
            self.closes += 1;
            self.events.push("close");
        }

        fn claim_interface(
            &mut self,
            _: &mut u8,
            interface: u8,
        ) -> std::result::Result<(), TransportError> {
            assert_eq!(interface, 0);
            if self.fail_claim {
                return Err(TransportError::new(UsbErrorCode::Busy, "claim"));
            }
            self.claims += 1;
            Ok(())
        }

        fn release_interface(
            &mut self,
            _: &mut u8,
            _: u8,
        ) -> std::result::Result<(), TransportError> {
            self.releases += 1;
            self.events.push("release");
            Ok(())
        }

        fn write_bulk(
            &mut self,
            _: &mut u8,
            endpoint: u8,
            buf: &[u8],
            timeout: Duration,
        ) -> std::result::Result<usize, TransportError> {
            let index = self.writes.len();
            self.writes.push((endpoint, buf.to_vec(), timeout));
            if self.fail_write == Some(index) {
                return Err(TransportError::new(UsbErrorCode::Timeout, "write"));
            }
            Ok(buf.len())
        }
    }

    fn assert_fully_closed(display: &Display<FakeTransport>) {
        assert!(!display.is_open());
        assert!(!display.context);
        assert!(display.buffers.is_none());
        assert!(display.surface.is_none());
    }

    #[test]
    fn open_without_device_unwinds() {
        let mut display = Display::new(FakeTransport::default());
        let err = display.open().unwrap_err();
        assert!(matches!(err, DisplayError::DeviceNotFound));
        assert_fully_closed(&display);
        assert_eq!(display.transport().inits, 1);
        assert_eq!(display.transport().exits, 1);
        assert_eq!(display.transport().opens, 0);
    }

    #[test]
    fn failed_init_leaves_nothing_to_release() {
        let mut display = Display::new(FakeTransport {
            fail_init: true,
            ..FakeTransport::with_push()
        });
        let err = display.open().unwrap_err();
        assert!(matches!(err, DisplayError::Transport(_)));
        assert_fully_closed(&display);
        assert_eq!(display.transport().exits, 0);
    }

    #[test]
    fn descriptor_failure_aborts_open() {
        let mut display = Display::new(FakeTransport {
            fail_descriptor: true,
            ..FakeTransport::with_push()
        });
        match display.open().unwrap_err() {
            DisplayError::Transport(e) => assert_eq!(e.code, UsbErrorCode::Io),
            e => panic!("unexpected error: {e}"),
        }
        assert_fully_closed(&display);
        assert_eq!(display.transport().exits, 1);
    }

    #[test]
    fn claim_failure_closes_handle_and_context() {
        let mut display = Display::new(FakeTransport {
            fail_claim: true,
            ..FakeTransport::with_push()
        });
        match display.open().unwrap_err() {
            DisplayError::Transport(e) => {
                assert_eq!(e.code, UsbErrorCode::Busy);
                assert_eq!(e.context, "unable to claim display interface");
            },
            e => panic!("unexpected error: {e}"),
        }
        assert_fully_closed(&display);
        let fake = display.transport();
        assert_eq!((fake.opens, fake.closes, fake.releases, fake.exits), (1, 1, 0, 1));
        assert_eq!(fake.events, ["open", "close", "exit"]);
    }

    #[test]
    fn open_twice_is_rejected() {
        let mut display = Display::new(FakeTransport::with_push());
        display.open().unwrap();
        assert!(matches!(display.open().unwrap_err(), DisplayError::AlreadyOpen));
        assert!(display.is_open());
        assert_eq!(display.transport().inits, 1);
    }

    #[test]
    fn send_before_open_does_nothing() {
        let mut display = Display::new(FakeTransport::with_push());
        assert!(matches!(display.send_frame().unwrap_err(), DisplayError::NotOpen));
        assert!(matches!(display.surface().unwrap_err(), DisplayError::NotOpen));
        assert!(display.transport().writes.is_empty());
    }

    #[test]
    fn close_is_idempotent() {
        let mut display = Display::new(FakeTransport::with_push());
        display.open().unwrap();
        display.close();
        display.close();
        assert_fully_closed(&display);
        let fake = display.transport();
        assert_eq!((fake.releases, fake.closes, fake.exits), (1, 1, 1));
    }

    #[test]
    fn close_releases_handle_before_context() {
        let mut display = Display::new(FakeTransport::with_push());
        display.open().unwrap();
        display.close();
        assert_eq!(display.transport().events, ["open", "release", "close", "exit"]);
    }

    #[test]
    fn close_when_never_opened() {
        let mut display = Display::new(FakeTransport::with_push());
        display.close();
        assert_eq!(display.transport().exits, 0);
        assert_eq!(display.transport().closes, 0);
    }

    #[test]
    fn sends_header_then_twenty_chunks() {
        let mut display = Display::new(FakeTransport::with_push());
        display.open().unwrap();
        display.send_frame().unwrap();

        let writes = &display.transport().writes;
        assert_eq!(writes.len(), 21);
        assert!(writes.iter().all(|(ep, _, t)| *ep == 0x01 && *t == Duration::from_millis(1000)));
        assert_eq!(writes[0].1, FRAME_HEADER);
        for (_, chunk, _) in &writes[1..] {
            assert_eq!(chunk.len(), 16384);
            for row in chunk.chunks(ROW_STRIDE) {
                assert!(row[..1920].chunks(4).all(|b| b == SHAPING_MASK));
                assert!(row[1920..].iter().all(|b| *b == 0));
            }
        }
    }

    #[test]
    fn drawn_pixels_reach_the_right_chunk() {
        let mut display = Display::new(FakeTransport::with_push());
        display.open().unwrap().set(2, 9, 0x1234);
        display.send_frame().unwrap();

        // row 9 is the second row of chunk 1, pixel 2 starts a pair
        let chunk = &display.transport().writes[2].1;
        let at = ROW_STRIDE + 4;
        assert_eq!(&chunk[at..at + 2], &[0x34 ^ 0xe7, 0x12 ^ 0xf3]);
    }

    #[test]
    fn failed_chunk_aborts_frame_but_stays_open() {
        let mut display = Display::new(FakeTransport {
            fail_write: Some(5),
            ..FakeTransport::with_push()
        });
        display.open().unwrap();
        match display.send_frame().unwrap_err() {
            DisplayError::Transport(e) => {
                assert_eq!(e.code, UsbErrorCode::Timeout);
                assert_eq!(e.context, "transfer of frame chunk failed");
            },
            e => panic!("unexpected error: {e}"),
        }
        assert_eq!(display.transport().writes.len(), 6);
        assert!(display.is_open());
        assert_eq!(display.transport().closes, 0);

        // next frame goes through untouched
        display.send_frame().unwrap();
        assert_eq!(display.transport().writes.len(), 27);
    }

    #[test]
    fn failed_header_sends_no_chunks() {
        let mut display = Display::new(FakeTransport {
            fail_write: Some(0),
            ..FakeTransport::with_push()
        });
        display.open().unwrap();
        assert!(display.send_frame().is_err());
        assert_eq!(display.transport().writes.len(), 1);
        assert!(display.is_open());
    }

    #[test]
    fn timeout_override_is_used() {
        let mut display =
            Display::new(FakeTransport::with_push()).with_timeout(Duration::from_millis(250));
        display.open().unwrap();
        display.send_frame().unwrap();
        assert!(display
            .transport()
            .writes
            .iter()
            .all(|(_, _, t)| *t == Duration::from_millis(250)));
    }

    #[test]
    fn reopen_after_close() {
        let mut display = Display::new(FakeTransport::with_push());
        display.open().unwrap().fill(0xffff);
        display.close();
        let surface = display.open().unwrap();
        assert!(surface.pixels().iter().all(|p| *p == 0));
        assert_eq!(display.transport().inits, 2);
    }
}
