//! Re-send the current frame on an interval until interrupted.
//!
//! The panel goes dark when it stops receiving frames, so a static image has
//! to be pushed repeatedly to stay visible.

use std::error::Error;
use std::future::Future;
use std::io;
use std::time::Duration;

use tokio::time::MissedTickBehavior;
use tracing::{debug, warn};

/// Consecutive failed frames tolerated before giving up
const MAX_FAILURES: usize = 10;

/// Block on a runtime that sends frames every `interval` until ctrl-c
pub fn run(interval: Duration) -> Result<u64, Box<dyn Error>> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(keep_alive(interval, push2::send_frame, tokio::signal::ctrl_c()))
}

/// Call `send` on a blocking thread every `interval` until `shutdown` resolves.
///
/// Returns the number of frames sent, or the last error once [`MAX_FAILURES`]
/// sends in a row have failed.
async fn keep_alive<F>(
    interval: Duration,
    send: F,
    shutdown: impl Future<Output = io::Result<()>>,
) -> Result<u64, Box<dyn Error>>
where
    F: Fn() -> push2::Result<()> + Clone + Send + 'static,
{
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tokio::pin!(shutdown);

    let mut frames = 0u64;
    let mut failures = 0usize;
    loop {
        tokio::select! {
            res = &mut shutdown => {
                res?;
                println!("\ninterrupted after {frames} frames");
                return Ok(frames);
            }
            _ = ticker.tick() => {
                match tokio::task::spawn_blocking(send.clone()).await? {
                    Ok(()) => {
                        frames += 1;
                        failures = 0;
                        debug!("sent frame {frames}");
                    },
                    Err(e) if failures + 1 < MAX_FAILURES => {
                        failures += 1;
                        warn!("failed to send frame ({failures}/{MAX_FAILURES}): {e}");
                    },
                    Err(e) => return Err(e.into()),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use push2::{DisplayError, TransportError, UsbErrorCode};

    use super::*;

    const TICK: Duration = Duration::from_millis(1);

    fn timeout() -> DisplayError {
        TransportError::new(UsbErrorCode::Timeout, "transfer of frame chunk failed").into()
    }

    /// Sender that fails on the calls for which `fails(call)` is true
    fn scripted(
        fails: impl Fn(usize) -> bool + Send + Sync + 'static,
    ) -> (Arc<AtomicUsize>, impl Fn() -> push2::Result<()> + Clone + Send + 'static) {
        let calls = Arc::new(AtomicUsize::new(0));
        let fails = Arc::new(fails);
        let counter = calls.clone();
        let send = move || {
            let call = counter.fetch_add(1, Ordering::SeqCst);
            if fails(call) {
                Err(timeout())
            } else {
                Ok(())
            }
        };
        (calls, send)
    }

    #[tokio::test]
    async fn gives_up_after_consecutive_failures() {
        let (calls, send) = scripted(|_| true);
        let err = keep_alive(TICK, send, std::future::pending()).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), MAX_FAILURES);
        assert!(err.to_string().contains("operation timed out"));
    }

    #[tokio::test]
    async fn success_resets_failure_count() {
        // 9 failures, one good frame, then failures until giving up
        let (calls, send) = scripted(|call| call != MAX_FAILURES - 1);
        keep_alive(TICK, send, std::future::pending()).await.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 2 * MAX_FAILURES);
    }

    #[tokio::test]
    async fn shutdown_returns_frame_count() {
        let (calls, send) = scripted(|_| false);
        let shutdown = async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            Ok(())
        };
        let frames = keep_alive(TICK, send, shutdown).await.unwrap();
        assert!(frames > 0);
        assert_eq!(frames as usize, calls.load(Ordering::SeqCst));
    }
}
