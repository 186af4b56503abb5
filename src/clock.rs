//! Animation-frame and timer scheduling.
//!
//! Transitions suspend twice: once for the next animation frame and once for their duration.
//! Both waits go through a [`Clock`] so that headless runs and tests do not sleep.

use futures::future::{self, FutureExt, LocalBoxFuture};
use std::cell::Cell;
use std::time::Duration;

/// Source of animation frames and timers.
pub trait Clock {
    /// Resolves on the next animation frame.
    fn next_frame(&self) -> LocalBoxFuture<'static, ()>;

    /// Resolves once `duration` has elapsed.
    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()>;
}

/// Clock that resolves every wait immediately and records virtual time.
#[derive(Debug, Default)]
pub struct VirtualClock {
    frames: Cell<u64>,
    elapsed: Cell<Duration>,
}

impl VirtualClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of animation frames requested so far.
    pub fn frames(&self) -> u64 {
        self.frames.get()
    }

    /// Sum of every requested sleep.
    pub fn elapsed(&self) -> Duration {
        self.elapsed.get()
    }
}

impl Clock for VirtualClock {
    fn next_frame(&self) -> LocalBoxFuture<'static, ()> {
        self.frames.set(self.frames.get() + 1);
        future::ready(()).boxed_local()
    }

    fn sleep(&self, duration: Duration) -> LocalBoxFuture<'static, ()> {
        self.elapsed.set(self.elapsed.get() + duration);
        future::ready(()).boxed_local()
    }
}
