use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex};

/// Cooperative stop flag with a cancellable timed wait.
///
/// The media sender sleeps on [`wait`](Self::wait) between ticks so a PAUSE
/// or TEARDOWN wakes it immediately instead of after a full tick.
#[derive(Debug, Default)]
pub struct StopSignal {
    stopped: Mutex<bool>,
    cond: Condvar,
}

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        *self.stopped.lock() = true;
        self.cond.notify_all();
    }

    pub fn is_stopped(&self) -> bool {
        *self.stopped.lock()
    }

    /// Block for up to `timeout`. Returns `true` if stopped.
    pub fn wait(&self, timeout: Duration) -> bool {
        let mut stopped = self.stopped.lock();
        if !*stopped {
            self.cond.wait_for(&mut stopped, timeout);
        }
        *stopped
    }
}

/// A media loop running on its own thread.
///
/// The loop owns its state `T` while running and hands it back from
/// [`stop`](Self::stop), which signals and then joins the thread, so two
/// loops of one session never overlap.
pub struct MediaTask<T> {
    signal: Arc<StopSignal>,
    thread: JoinHandle<T>,
}

impl<T: Send + 'static> MediaTask<T> {
    pub fn spawn<F>(name: &str, f: F) -> std::io::Result<Self>
    where
        F: FnOnce(Arc<StopSignal>) -> T + Send + 'static,
    {
        let signal = Arc::new(StopSignal::new());
        let loop_signal = signal.clone();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || f(loop_signal))?;
        Ok(Self { signal, thread })
    }

    /// Whether the loop has returned on its own (e.g. end of stream).
    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Signal the loop, wait for it to exit and take back its state.
    ///
    /// Returns `None` if the loop panicked.
    pub fn stop(self) -> Option<T> {
        self.signal.stop();
        match self.thread.join() {
            Ok(state) => Some(state),
            Err(_) => {
                tracing::error!("media task panicked");
                None
            }
        }
    }
}
