//! Collapses a rapidly changing value into a stable one.
//!
//! Every observed value restarts the quiet period; only a value that survives
//! the whole period is emitted. Superseded values are dropped, never queued.

use std::time::Duration;
use tokio::{sync::watch, task::JoinHandle};

#[derive(Debug)]
pub struct Debouncer<T> {
    input: watch::Sender<(T, Duration)>,
    output: watch::Receiver<T>,
    task: JoinHandle<()>,
}

impl<T> Debouncer<T>
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    /// Starts with `initial` already stable. Must be called inside a tokio runtime.
    pub fn new(initial: T, delay: Duration) -> Self {
        let (input, input_rx) = watch::channel((initial.clone(), delay));
        let (output_tx, output) = watch::channel(initial);
        let task = tokio::spawn(run(input_rx, output_tx));

        Self { input, output, task }
    }

    /// Feed a new raw value, restarting the countdown with `delay`.
    pub fn observe(&self, value: T, delay: Duration) {
        self.input.send_replace((value, delay));
    }

    /// Feed a new raw value using the most recent delay.
    pub fn set(&self, value: T) {
        self.input.send_modify(|(current, _)| *current = value);
    }

    /// Latest stable value.
    pub fn current(&self) -> T {
        self.output.borrow().clone()
    }

    /// Receiver notified on every emission. The current value counts as seen.
    pub fn subscribe(&self) -> watch::Receiver<T> {
        let mut rx = self.output.clone();
        rx.borrow_and_update();
        rx
    }
}

impl<T> Drop for Debouncer<T> {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn run<T>(mut input: watch::Receiver<(T, Duration)>, output: watch::Sender<T>)
where
    T: Clone + PartialEq + Send + Sync + 'static,
{
    loop {
        if input.changed().await.is_err() {
            return;
        }

        loop {
            let (value, delay) = input.borrow_and_update().clone();

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    output.send_if_modified(|current| {
                        if *current == value {
                            false
                        } else {
                            *current = value;
                            true
                        }
                    });
                    break;
                }
                changed = input.changed() => {
                    if changed.is_err() {
                        return;
                    }
                }
            }
        }
    }
}
