//! # weft
//!
//! A cyclic-time pattern engine for live-coded sequencing.
//!
//! Patterns are values that vary over a repeating *cycle*. They can be
//! shifted, reversed, sped up and rewritten, then sampled at any time to
//! drive sound, light or OSC messages.
//!
//! ## Core Concepts
//!
//! - **Fraction** / **Interval**: exact rational cycle time, so transforms
//!   compose without drift.
//! - **Event**: a value held over an interval. A digit string like `"1101"`
//!   describes one cycle of equal slots.
//! - **ContinuousFunction**: a value defined at every instant, such as a sine
//!   wave or a one-shot trigger.
//! - **Pattern**: samples events or a function through a pipeline of
//!   transforms, and maps the result to outputs.
//! - **Loom**: binds patterns to a clock and dispatches callbacks, edge
//!   watchers and OSC bundles on every tick.
//!
//! ## Example
//!
//! ```rust
//! use weft::prelude::*;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let scheduler = OfflineScheduler::new(LoomConfig::default());
//! let pattern = Pattern::from_digits(scheduler.loom(), "1101").unwrap();
//!
//! let onsets = Arc::new(AtomicUsize::new(0));
//! let counter = Arc::clone(&onsets);
//! pattern
//!     .on_onset(vec![callback(move || {
//!         counter.fetch_add(1, Ordering::SeqCst);
//!     })])
//!     .unwrap();
//!
//! scheduler.play();
//! scheduler.set_elapsed_millis(999);
//! assert_eq!(onsets.load(Ordering::SeqCst), 3);
//! ```
//!
//! ## Playing in real time
//!
//! ```rust,no_run
//! use weft::prelude::*;
//!
//! let handle = RealtimeScheduler::start(LoomConfig::default());
//! let pattern = Pattern::from_digits(handle.loom(), "1010").unwrap();
//! pattern.loop_cycle();
//! handle.play();
//! ```

// Time and events
pub mod event;
pub mod fraction;
pub mod interval;

// Sources and transforms
pub mod continuous;
pub mod rewrite;
pub mod transform;

// Patterns and outputs
pub mod color;
pub mod edge;
pub mod mapping;
pub mod pattern;

// Clocks, sinks and import
pub mod clock;
pub mod notation;
pub mod osc;
pub mod scheduler;

// Ambient
pub mod config;
pub mod error;
mod shared;

// Re-export core types
pub use clock::{Clock, Loom, ManualClock, OfflineScheduler};
pub use color::Color;
pub use config::LoomConfig;
pub use continuous::{
    Constant, ContinuousFunction, Delay, Follower, Match, Periodic, Signal, StatefulSignal,
    Threshold, Trigger, Waveform,
};
pub use error::{CallbackError, LoomError, Result};
pub use event::{Event, EventCollection, EventId};
pub use fraction::Fraction;
pub use interval::{Interval, Window};
pub use mapping::{callback, try_callback, Callback, Mapping, MappingKind, Object};
pub use osc::{OscRecorder, OscSink, UdpOscSender};
pub use pattern::{Affine, Pattern, Source};
pub use rewrite::{BoundaryRewriter, MatchRewriter, Rewriter};
pub use scheduler::{RealtimeScheduler, SchedulerHandle, SystemClock};
pub use transform::{Pipeline, Stage, Transform};

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::clock::{Clock, Loom, OfflineScheduler};
    pub use crate::color::Color;
    pub use crate::config::LoomConfig;
    pub use crate::continuous::{ContinuousFunction, Periodic, Signal, Trigger, Waveform};
    pub use crate::error::LoomError;
    pub use crate::event::{Event, EventCollection};
    pub use crate::fraction::Fraction;
    pub use crate::interval::Interval;
    pub use crate::mapping::{callback, try_callback, Callback, MappingKind};
    pub use crate::pattern::Pattern;
    pub use crate::rewrite::{BoundaryRewriter, MatchRewriter};
    pub use crate::scheduler::RealtimeScheduler;
    pub use crate::transform::Transform;
}
