//! Dedicated worker thread for a carousel run.
//!
//! The worker owns all session state; the caller keeps only the cancel flag
//! and the receiving end of the notification bus.
use anyhow::{anyhow, Result};
use std::io;
use std::thread::{self, JoinHandle};

use crate::cancel::CancelToken;
use crate::session::{Carousel, RunOutcome};

pub struct CarouselWorker {
    handle: JoinHandle<RunOutcome>,
    cancel: CancelToken,
}

/// Start `carousel` on a thread named `carousel`.
pub fn spawn(carousel: Carousel) -> io::Result<CarouselWorker> {
    let cancel = carousel.cancel_token();
    let handle = thread::Builder::new()
        .name("carousel".into())
        .spawn(move || carousel.run())?;
    Ok(CarouselWorker { handle, cancel })
}

impl CarouselWorker {
    /// Request cooperative cancellation. Returns immediately; the run still
    /// publishes its terminal event.
    pub fn stop(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Wait for the run to end.
    pub fn join(self) -> Result<RunOutcome> {
        self.handle
            .join()
            .map_err(|_| anyhow!("carousel worker panicked outside the run guard"))
    }
}
