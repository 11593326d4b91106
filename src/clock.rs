use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{self as channel, select};
use tracing::{debug, trace, warn};

use crate::error::Result;
use crate::sample::Sample;
use crate::state::Buckets;

/// Background thread that runs a tick callback once per granularity.
///
/// Dropping the stop sender disconnects the stop channel, which wakes the
/// thread whether it is waiting on a tick or not.
pub(crate) struct Clock {
    stop_tx: Option<channel::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl Clock {
    /// Clock that advances a single bucket ring.
    pub(crate) fn start<T: Sample>(
        state: Arc<Mutex<Buckets<T>>>,
        granularity: Duration,
    ) -> Result<Self> {
        Self::every(granularity, move || {
            let mut buckets = state.lock().unwrap_or_else(PoisonError::into_inner);
            buckets.advance();
            trace!(cursor = buckets.cursor(), "Tick");
        })
    }

    /// Clock that calls `on_tick` once per `granularity` until stopped.
    pub(crate) fn every<F>(granularity: Duration, mut on_tick: F) -> Result<Self>
    where
        F: FnMut() + Send + 'static,
    {
        let (stop_tx, stop_rx) = channel::bounded::<()>(0);
        let ticker = channel::tick(granularity);

        let handle = thread::Builder::new()
            .name("sliding-window-clock".into())
            .spawn(move || {
                debug!(?granularity, "Clock started");
                loop {
                    let stopped = select! {
                        recv(ticker) -> _ => false,
                        recv(stop_rx) -> _ => true,
                    };
                    if stopped {
                        break;
                    }
                    on_tick();
                }
                debug!("Clock stopped");
            })?;

        Ok(Self {
            stop_tx: Some(stop_tx),
            handle: Some(handle),
        })
    }

    pub(crate) fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Signals the thread and waits for it. Later calls do nothing.
    pub(crate) fn stop(&mut self) {
        drop(self.stop_tx.take());
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Clock thread panicked");
            }
        }
    }
}

impl Drop for Clock {
    fn drop(&mut self) {
        self.stop();
    }
}
