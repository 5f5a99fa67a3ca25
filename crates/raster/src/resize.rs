use crossbeam_channel::{bounded, select, Receiver, Sender};

use crate::error::RasterError;
use crate::spec::Geometry;

/// Outstanding resize requests the render thread has not picked up yet.
pub(crate) const RESIZE_QUEUE_DEPTH: usize = 1;

#[derive(Debug)]
pub(crate) struct ResizeRequest {
    pub geometry: Geometry,
    pub reply: Sender<Result<(), RasterError>>,
}

/// Emulation-thread half: request queue plus a liveness signal from the stager.
#[derive(Debug)]
pub(crate) struct ResizeClient {
    requests: Sender<ResizeRequest>,
    shutdown: Receiver<()>,
}

/// Render-thread half. Dropping it wakes any requester still waiting for a reply.
#[derive(Debug)]
pub(crate) struct ResizeInbox {
    pub requests: Receiver<ResizeRequest>,
    _alive: Sender<()>,
}

pub(crate) fn resize_channel() -> (ResizeClient, ResizeInbox) {
    let (requests, inbox) = bounded(RESIZE_QUEUE_DEPTH);
    let (alive, shutdown) = bounded(0);
    (
        ResizeClient { requests, shutdown },
        ResizeInbox {
            requests: inbox,
            _alive: alive,
        },
    )
}

impl ResizeClient {
    /// Sends `geometry` to the render thread and blocks until it has been applied.
    pub fn request(&self, geometry: Geometry) -> Result<(), RasterError> {
        let (reply, response) = bounded(1);
        self.requests
            .send(ResizeRequest { geometry, reply })
            .map_err(|_| RasterError::Closed)?;

        // A request left queued when the stager shuts down is never answered,
        // so the liveness channel has to be watched as well.
        select! {
            recv(response) -> result => result.unwrap_or(Err(RasterError::Closed)),
            recv(self.shutdown) -> _ => response.try_recv().unwrap_or(Err(RasterError::Closed)),
        }
    }
}
