//! Background render passes for the GUI.
//!
//! Each request starts a new generation and runs on the rayon pool; finished
//! surfaces come back over an mpsc channel that the UI drains once per frame.
//! Results from superseded generations are dropped on both sides.

use std::sync::Arc;
use std::sync::mpsc;
use std::time::{Duration, Instant};

use image::RgbaImage;

use crate::compositor::{Compositor, PassOutcome, RenderRequest};
use crate::{log_err, log_info};

/// A completed pass.
pub struct RenderResult {
    pub generation: u64,
    pub image: RgbaImage,
    pub elapsed: Duration,
}

pub struct RenderWorker {
    compositor: Arc<Compositor>,
    sender: mpsc::Sender<RenderResult>,
    receiver: mpsc::Receiver<RenderResult>,
}

impl RenderWorker {
    pub fn new(compositor: Arc<Compositor>) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self { compositor, sender, receiver }
    }

    pub fn compositor(&self) -> &Arc<Compositor> {
        &self.compositor
    }

    /// Whether any pass is still running.
    pub fn is_loading(&self) -> bool {
        self.compositor.loading().is_loading()
    }

    /// Queue a full pass for `request`, superseding any pass still in flight.
    /// Returns the new generation.
    pub fn request(&self, request: RenderRequest) -> u64 {
        let ticket = self.compositor.begin_pass();
        let generation = ticket.generation();
        // Cover the gap between queueing and the pass actually starting.
        let busy = self.compositor.loading().begin();
        let compositor = Arc::clone(&self.compositor);
        let sender = self.sender.clone();

        rayon::spawn(move || {
            let _busy = busy;
            let start = Instant::now();
            let mut surface = compositor.new_surface();
            match compositor.render_pass(&request, &mut surface, &ticket) {
                PassOutcome::Completed => {
                    let result = RenderResult {
                        generation,
                        image: surface,
                        elapsed: start.elapsed(),
                    };
                    if sender.send(result).is_err() {
                        log_err!("Render pass {} finished after the UI went away", generation);
                    }
                }
                PassOutcome::Superseded => {}
                PassOutcome::NoSurface => {
                    log_info!("Render pass {} skipped: zero-size canvas", generation);
                }
            }
        });

        generation
    }

    /// Newest finished result that is still current, if any.
    pub fn poll(&self) -> Option<RenderResult> {
        let mut newest = None;
        while let Ok(result) = self.receiver.try_recv() {
            newest = Some(result);
        }
        newest.filter(|r| r.generation == self.compositor.generations().latest())
    }

    /// Block until the current generation finishes or `timeout` passes.
    pub fn wait(&self, timeout: Duration) -> Option<RenderResult> {
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline.checked_duration_since(Instant::now())?;
            match self.receiver.recv_timeout(remaining) {
                Ok(result) if result.generation == self.compositor.generations().latest() => {
                    return Some(result);
                }
                Ok(_) => continue,
                Err(_) => return None,
            }
        }
    }
}
