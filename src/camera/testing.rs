//! In-memory camera used by unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::DeviceAccessError;
use crate::models::{Frame, PixelFormat};

use super::device::{StreamConstraints, VideoDevice, VideoStream};

#[derive(Debug, Clone, Copy)]
pub enum FakeFailure {
    Denied,
    Missing,
    Busy,
}

#[derive(Default)]
struct Counters {
    acquisitions: AtomicUsize,
    stops: AtomicUsize,
    last_constraints: Mutex<Option<StreamConstraints>>,
}

pub struct FakeCamera {
    width: u32,
    height: u32,
    failure: Option<FakeFailure>,
    fail_after: Option<usize>,
    stalled: bool,
    counters: Arc<Counters>,
}

impl FakeCamera {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            failure: None,
            fail_after: None,
            stalled: false,
            counters: Arc::new(Counters::default()),
        }
    }

    pub fn failing(failure: FakeFailure) -> Self {
        Self {
            failure: Some(failure),
            ..Self::new(1, 1)
        }
    }

    /// Stream errors once `frames` frames have been served.
    pub fn fail_after(mut self, frames: usize) -> Self {
        self.fail_after = Some(frames);
        self
    }

    /// Stream is granted but never produces a frame.
    pub fn stalled(mut self) -> Self {
        self.stalled = true;
        self
    }

    pub fn device(&self) -> Arc<dyn VideoDevice> {
        Arc::new(FakeDevice {
            width: self.width,
            height: self.height,
            failure: self.failure,
            fail_after: self.fail_after,
            stalled: self.stalled,
            counters: self.counters.clone(),
        })
    }

    pub fn acquisitions(&self) -> usize {
        self.counters.acquisitions.load(Ordering::SeqCst)
    }

    pub fn stops(&self) -> usize {
        self.counters.stops.load(Ordering::SeqCst)
    }

    pub fn last_constraints(&self) -> Option<StreamConstraints> {
        *self.counters.last_constraints.lock().unwrap()
    }
}

struct FakeDevice {
    width: u32,
    height: u32,
    failure: Option<FakeFailure>,
    fail_after: Option<usize>,
    stalled: bool,
    counters: Arc<Counters>,
}

#[async_trait]
impl VideoDevice for FakeDevice {
    async fn acquire(
        &self,
        constraints: StreamConstraints,
    ) -> Result<Box<dyn VideoStream>, DeviceAccessError> {
        *self.counters.last_constraints.lock().unwrap() = Some(constraints);
        match self.failure {
            Some(FakeFailure::Denied) => {
                return Err(DeviceAccessError::PermissionDenied("NotAllowedError".into()))
            }
            Some(FakeFailure::Missing) => return Err(DeviceAccessError::NotFound),
            Some(FakeFailure::Busy) => return Err(DeviceAccessError::Busy("in use".into())),
            None => {}
        }
        self.counters.acquisitions.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeStream {
            width: self.width,
            height: self.height,
            fail_after: self.fail_after,
            stalled: self.stalled,
            served: 0,
            counters: self.counters.clone(),
        }))
    }
}

struct FakeStream {
    width: u32,
    height: u32,
    fail_after: Option<usize>,
    stalled: bool,
    served: usize,
    counters: Arc<Counters>,
}

#[async_trait]
impl VideoStream for FakeStream {
    fn label(&self) -> &str {
        "fake back camera"
    }

    async fn next_frame(&mut self) -> Result<Frame, DeviceAccessError> {
        if self.stalled {
            std::future::pending::<()>().await;
        }
        if self.fail_after.is_some_and(|limit| self.served >= limit) {
            return Err(DeviceAccessError::Stream("device unplugged".into()));
        }
        self.served += 1;
        let len = (self.width * self.height * 3) as usize;
        let data = (0..len).map(|i| (i % 251) as u8).collect();
        Ok(Frame::new(data, self.width, self.height, PixelFormat::Rgb8))
    }

    fn stop(&mut self) {
        self.counters.stops.fetch_add(1, Ordering::SeqCst);
    }
}
