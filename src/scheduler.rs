//! Periodic task scheduling.
//!
//! Timer-driven progress polling runs on an injectable scheduler so tests
//! can drive ticks by hand instead of sleeping.

use std::thread;
use std::time::Duration;

/// A periodic tick; return `false` to cancel the task.
pub type RepeatingTask = Box<dyn FnMut() -> bool + Send>;

pub trait Scheduler: Send + Sync {
    /// Run `tick` every `every` until it returns `false`.
    fn repeat(&self, every: Duration, tick: RepeatingTask);
}

/// Production scheduler: one sleeper thread per task.
///
/// Tasks hold only weak references into the engine, so a task whose engine
/// is gone cancels itself on its next tick.
#[derive(Debug, Default)]
pub struct ThreadScheduler;

impl Scheduler for ThreadScheduler {
    fn repeat(&self, every: Duration, mut tick: RepeatingTask) {
        thread::spawn(move || {
            loop {
                thread::sleep(every);
                if !tick() {
                    break;
                }
            }
        });
    }
}
