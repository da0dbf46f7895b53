use std::sync::Arc;

use tokio::sync::watch;
use tokio::time::{Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::models::Frame;

use super::device::VideoStream;
use super::session::CaptureStatus;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_info, log_warn};

/// Pull frames from `stream` at `frame_interval` and publish the newest one.
///
/// Owns the stream for its whole life and stops it on every exit path, so the
/// device is released once the token is cancelled or the stream fails.
pub(crate) async fn preview_loop(
    mut stream: Box<dyn VideoStream>,
    frame_tx: watch::Sender<Option<Arc<Frame>>>,
    status_tx: Arc<watch::Sender<CaptureStatus>>,
    frame_interval: Duration,
    cancel_token: CancellationToken,
) {
    let mut ticker = tokio::time::interval(frame_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut frames: u64 = 0;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("preview loop cancelled after {} frames", frames);
                break;
            }
            _ = ticker.tick() => {
                let next = tokio::select! {
                    biased;
                    _ = cancel_token.cancelled() => break,
                    next = stream.next_frame() => next,
                };

                match next {
                    Ok(frame) => {
                        frames = frames.wrapping_add(1);
                        frame_tx.send_replace(Some(Arc::new(frame)));
                    }
                    Err(err) => {
                        log_warn!("camera stream {} failed: {err}", stream.label());
                        status_tx.send_if_modified(|status| {
                            if *status == CaptureStatus::Streaming {
                                *status = CaptureStatus::Failed(err.clone());
                                true
                            } else {
                                false
                            }
                        });
                        break;
                    }
                }
            }
        }
    }

    stream.stop();
}
