// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Clocks used to time invocations.

use core::fmt;
use core::time::Duration;
use std::time::Instant;

/// Brackets a single call into WebAssembly code and reports how long it took.
///
/// The timer sees nothing but the call itself: argument marshalling happens before and result
/// conversion after.
pub trait CallTimer: fmt::Debug + Send + Sync {
    /// Runs `call` exactly once and returns the time it took.
    fn measure(&self, call: &mut dyn FnMut()) -> Duration;
}

/// Measures calls with the monotonic system clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct WallClock;

impl CallTimer for WallClock {
    fn measure(&self, call: &mut dyn FnMut()) -> Duration {
        let start = Instant::now();
        call();
        start.elapsed()
    }
}

/// Runs calls without measuring them, always reporting [`Duration::ZERO`].
#[derive(Debug, Default, Clone, Copy)]
pub struct Disabled;

impl CallTimer for Disabled {
    fn measure(&self, call: &mut dyn FnMut()) -> Duration {
        call();
        Duration::ZERO
    }
}
