//! Background loop pulling spectrum frames at a fixed rate.

use std::sync::{Arc, Mutex, TryLockError};
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::{AudioSpectrumController, SpectrumState};

/// Repeating task that hands each frame to a callback.
///
/// Ticks that land while the device is still opening deliver nothing. The
/// loop ends by itself once the controller is disabled, and is aborted when
/// the poller is cancelled or dropped.
#[must_use = "dropping the poller cancels it"]
pub struct FrequencyPoller {
    task: JoinHandle<()>,
}

impl FrequencyPoller {
    /// Spawn on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics when called outside a runtime.
    pub fn spawn<F>(
        controller: Arc<Mutex<AudioSpectrumController>>,
        period: Duration,
        on_frame: F,
    ) -> Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        Self::spawn_on(&Handle::current(), controller, period, on_frame)
    }

    pub fn spawn_on<F>(
        handle: &Handle,
        controller: Arc<Mutex<AudioSpectrumController>>,
        period: Duration,
        mut on_frame: F,
    ) -> Self
    where
        F: FnMut(&[u8]) + Send + 'static,
    {
        let task = handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                interval.tick().await;

                let mut controller = match controller.try_lock() {
                    Ok(guard) => guard,
                    Err(TryLockError::WouldBlock) => continue,
                    Err(TryLockError::Poisoned(_)) => break,
                };
                match controller.frequency_data() {
                    Some(data) => on_frame(data),
                    None => {
                        if controller.state() == SpectrumState::Starting {
                            continue;
                        }
                        break;
                    }
                }
            }
            tracing::debug!("frequency polling finished");
        });

        Self { task }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    pub fn cancel(self) {
        // Drop does the abort.
    }
}

impl Drop for FrequencyPoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
