//! Real-time playback.
//!
//! [`RealtimeScheduler::start`] spawns a background thread that ticks a
//! [`Loom`] every `tick_millis` of wall time. The thread is only a clock
//! driver: patterns are sampled synchronously inside each tick, exactly as
//! the offline scheduler does it. The returned handle controls the thread
//! through a message channel.

use crossbeam_channel::{bounded, Receiver, Sender};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::clock::{Clock, Loom};
use crate::config::LoomConfig;
use crate::fraction::Fraction;
use crate::interval::Interval;

struct ClockState {
    cycle_millis: i64,
    /// Play time accumulated before the current run.
    banked: Duration,
    /// When the current run started, if playing.
    started: Option<Instant>,
    disposed: bool,
}

impl ClockState {
    fn elapsed(&self) -> Duration {
        match self.started {
            Some(started) => self.banked + started.elapsed(),
            None => self.banked,
        }
    }
}

/// A clock that advances with wall time while playing.
pub struct SystemClock {
    state: Mutex<ClockState>,
}

impl SystemClock {
    /// A paused clock at time zero.
    pub fn new(cycle_millis: i64) -> Self {
        SystemClock {
            state: Mutex::new(ClockState {
                cycle_millis: cycle_millis.max(1),
                banked: Duration::ZERO,
                started: None,
                disposed: false,
            }),
        }
    }

    pub fn elapsed_millis(&self) -> i64 {
        self.state.lock().elapsed().as_millis() as i64
    }

    /// Change the tempo. Elapsed time is kept, so the cycle position jumps.
    pub fn set_cycle_millis(&self, cycle_millis: i64) {
        self.state.lock().cycle_millis = cycle_millis.max(1);
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Interval {
        let state = self.state.lock();
        let millis = state.elapsed().as_millis() as i64;
        Interval::point(Fraction::from_millis(millis, state.cycle_millis))
    }

    fn play(&self) {
        let mut state = self.state.lock();
        if state.started.is_none() && !state.disposed {
            state.started = Some(Instant::now());
        }
    }

    fn pause(&self) {
        let mut state = self.state.lock();
        if let Some(started) = state.started.take() {
            state.banked += started.elapsed();
        }
    }

    fn is_playing(&self) -> bool {
        self.state.lock().started.is_some()
    }

    fn dispose(&self) {
        self.pause();
        self.state.lock().disposed = true;
    }
}

/// Messages sent to the scheduler thread.
enum SchedulerMessage {
    Play,
    Pause,
    SetCycleMillis(i64),
    Stop,
}

/// Handle to a running real-time scheduler. Dropping it stops the thread.
pub struct SchedulerHandle {
    sender: Sender<SchedulerMessage>,
    running: Arc<AtomicBool>,
    loom: Loom,
    clock: Arc<SystemClock>,
    thread: Option<JoinHandle<()>>,
}

impl SchedulerHandle {
    /// The loom to create patterns in.
    pub fn loom(&self) -> &Loom {
        &self.loom
    }

    pub fn clock(&self) -> &Arc<SystemClock> {
        &self.clock
    }

    pub fn play(&self) {
        let _ = self.sender.send(SchedulerMessage::Play);
    }

    pub fn pause(&self) {
        let _ = self.sender.send(SchedulerMessage::Pause);
    }

    pub fn set_cycle_millis(&self, cycle_millis: i64) {
        let _ = self.sender.send(SchedulerMessage::SetCycleMillis(cycle_millis));
    }

    /// Stop the thread and wait for it to finish.
    pub fn stop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
        let _ = self.sender.send(SchedulerMessage::Stop);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::warn!("scheduler thread panicked");
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

impl Drop for SchedulerHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct RealtimeScheduler;

impl RealtimeScheduler {
    /// Spawn the scheduler thread. The clock starts paused; call
    /// [`SchedulerHandle::play`] to start it.
    pub fn start(config: LoomConfig) -> SchedulerHandle {
        let clock = Arc::new(SystemClock::new(config.cycle_millis()));
        let tick = Duration::from_millis(config.tick_millis() as u64);
        let loom = Loom::new(Arc::clone(&clock) as Arc<dyn Clock>, config);

        let (tx, rx) = bounded::<SchedulerMessage>(64);
        let running = Arc::new(AtomicBool::new(true));

        let thread = {
            let loom = loom.clone();
            let clock = Arc::clone(&clock);
            let running = Arc::clone(&running);
            thread::spawn(move || scheduler_loop(loom, clock, tick, rx, running))
        };

        SchedulerHandle {
            sender: tx,
            running,
            loom,
            clock,
            thread: Some(thread),
        }
    }
}

fn scheduler_loop(
    loom: Loom,
    clock: Arc<SystemClock>,
    tick: Duration,
    rx: Receiver<SchedulerMessage>,
    running: Arc<AtomicBool>,
) {
    while running.load(Ordering::SeqCst) {
        while let Ok(msg) = rx.try_recv() {
            match msg {
                SchedulerMessage::Play => clock.play(),
                SchedulerMessage::Pause => clock.pause(),
                SchedulerMessage::SetCycleMillis(ms) => clock.set_cycle_millis(ms),
                SchedulerMessage::Stop => {
                    running.store(false, Ordering::SeqCst);
                    clock.dispose();
                    return;
                }
            }
        }

        loom.tick();
        thread::sleep(tick);
    }
    clock.dispose();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::callback;
    use crate::pattern::Pattern;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn test_system_clock_pauses() {
        let clock = SystemClock::new(1000);
        assert_eq!(clock.now(), Interval::point(Fraction::zero()));
        clock.play();
        thread::sleep(Duration::from_millis(20));
        clock.pause();
        let paused_at = clock.elapsed_millis();
        assert!(paused_at >= 20);
        thread::sleep(Duration::from_millis(20));
        assert_eq!(clock.elapsed_millis(), paused_at);
    }

    #[test]
    fn test_scheduler_drives_onsets() {
        let config = LoomConfig {
            cycle_millis: 100,
            tick_millis: 1,
            ..LoomConfig::default()
        };
        let mut handle = RealtimeScheduler::start(config);
        let onsets = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&onsets);

        let pattern = Pattern::from_digits(handle.loom(), "10").unwrap();
        pattern.loop_cycle();
        pattern
            .on_onset(vec![callback(move || {
                counter.fetch_add(1, Ordering::SeqCst);
            })])
            .unwrap();

        handle.play();
        thread::sleep(Duration::from_millis(350));
        handle.stop();

        assert!(!handle.is_running());
        assert!(onsets.load(Ordering::SeqCst) >= 2);
    }
}
