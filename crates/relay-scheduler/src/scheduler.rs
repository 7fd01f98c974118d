//! Retry scheduler state machine.
//!
//! ```text
//! Idle --begin--> InFlight --Ok--> Done
//!                    |  ^   \--Error--> Failed
//!           AllLimited  |deadline
//!                    v  |
//!                CountingDown
//! ```
//!
//! Each `begin_*` call starts a new cycle identified by an epoch number and
//! owning a cancellation token. While counting down, a one-second tick task
//! and the retry deadline run under a child token of the cycle, so they are
//! always started and cancelled as a pair. Every state mutation happens under
//! one mutex that re-checks the epoch, so ticks and responses from a
//! superseded cycle are never observed.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use relay_core::{Course, DispatchResult, build_prompt, can_generate};
use tokio::sync::broadcast;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::state::{Phase, RetryState};
use crate::transport::DispatchTransport;

const TICK: Duration = Duration::from_secs(1);
const EVENT_CAPACITY: usize = 64;

/// Observable transitions, in the order they happen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchedulerEvent {
    Dispatching { attempt: u32 },
    CountdownStarted { attempt: u32, wait_seconds: u64 },
    Tick { remaining_seconds: u64, wait_seconds: u64 },
    Completed { text: String },
    Failed { message: String },
    Cancelled,
}

struct Shared {
    epoch: u64,
    cycle: Option<CancellationToken>,
    countdown: Option<CancellationToken>,
    state: RetryState,
}

struct Inner<T> {
    transport: T,
    shared: Mutex<Shared>,
    events: broadcast::Sender<SchedulerEvent>,
}

/// Single-flight retry scheduler. Dropping it cancels any running cycle.
pub struct RetryScheduler<T: DispatchTransport> {
    inner: Arc<Inner<T>>,
}

impl<T: DispatchTransport> RetryScheduler<T> {
    pub fn new(transport: T) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                transport,
                shared: Mutex::new(Shared {
                    epoch: 0,
                    cycle: None,
                    countdown: None,
                    state: RetryState::idle(),
                }),
                events,
            }),
        }
    }

    pub fn transport(&self) -> &T {
        &self.inner.transport
    }

    /// Current state snapshot.
    pub fn state(&self) -> RetryState {
        self.inner.lock().state.clone()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SchedulerEvent> {
        self.inner.events.subscribe()
    }

    /// Whether a countdown tick/deadline pair is currently armed.
    pub fn has_pending_timers(&self) -> bool {
        self.inner
            .lock()
            .countdown
            .as_ref()
            .is_some_and(|token| !token.is_cancelled())
    }

    /// Start generation for a course selection.
    ///
    /// Returns false, leaving any running cycle untouched, unless the
    /// selection holds 2 to 4 courses. Must be called inside a tokio runtime.
    pub fn begin_generation(&self, courses: &[Course]) -> bool {
        if !can_generate(courses.len()) {
            debug!(courses = courses.len(), "Ignoring generation request outside 2..=4 courses");
            return false;
        }
        self.begin_with_prompt(build_prompt(courses));
        true
    }

    /// Start a new cycle for `prompt`, superseding any running one.
    pub fn begin_with_prompt(&self, prompt: impl Into<String>) {
        let prompt = prompt.into();
        let (epoch, cycle) = {
            let mut shared = self.inner.lock();
            shared.epoch += 1;
            if let Some(previous) = shared.cycle.take() {
                previous.cancel();
            }
            shared.countdown = None;
            let cycle = CancellationToken::new();
            shared.cycle = Some(cycle.clone());
            shared.state = RetryState::in_flight(1);
            self.inner.emit(SchedulerEvent::Dispatching { attempt: 1 });
            (shared.epoch, cycle)
        };
        info!(epoch, "Generation cycle started");
        tokio::spawn(drive(self.inner.clone(), epoch, cycle, prompt));
    }

    /// Cancel the running cycle (if any) and reset to Idle.
    pub fn cancel(&self) {
        let mut shared = self.inner.lock();
        shared.epoch += 1;
        let had_cycle = shared.cycle.is_some();
        if let Some(cycle) = shared.cycle.take() {
            cycle.cancel();
        }
        shared.countdown = None;
        shared.state = RetryState::idle();
        if had_cycle {
            self.inner.emit(SchedulerEvent::Cancelled);
        }
    }

    /// Wait until the current cycle reaches Done or Failed and return the
    /// final state. Returns the current state right away if it is already
    /// settled or idle.
    pub async fn wait_until_settled(&self) -> RetryState {
        let mut events = self.subscribe();
        loop {
            let state = self.state();
            if state.is_settled() || state.phase == Phase::Idle {
                return state;
            }
            match events.recv().await {
                Ok(_) | Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return self.state(),
            }
        }
    }
}

impl<T: DispatchTransport> Drop for RetryScheduler<T> {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl<T> Inner<T> {
    fn lock(&self) -> MutexGuard<'_, Shared> {
        self.shared.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: SchedulerEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Apply a terminal dispatch result if `epoch` is still current.
    fn finish(&self, epoch: u64, attempt: u32, result: Result<String, String>) {
        let mut shared = self.lock();
        if shared.epoch != epoch {
            debug!(epoch, "Dropping response from superseded cycle");
            return;
        }
        shared.countdown = None;
        match result {
            Ok(text) => {
                info!(attempt, "Generation completed");
                shared.state = RetryState::done(attempt, text.clone());
                self.emit(SchedulerEvent::Completed { text });
            }
            Err(message) => {
                warn!(attempt, error = %message, "Generation failed");
                shared.state = RetryState::failed(attempt, message.clone());
                self.emit(SchedulerEvent::Failed { message });
            }
        }
    }

    /// Enter CountingDown and arm a countdown token, a child of the cycle.
    fn start_countdown(&self, epoch: u64, attempt: u32, wait: u64) -> Option<CancellationToken> {
        let mut shared = self.lock();
        if shared.epoch != epoch {
            return None;
        }
        let countdown = shared.cycle.as_ref()?.child_token();
        shared.countdown = Some(countdown.clone());
        shared.state = RetryState::counting_down(attempt, wait);
        info!(attempt, wait_secs = wait, "All credentials limited, counting down");
        self.emit(SchedulerEvent::CountdownStarted {
            attempt,
            wait_seconds: wait,
        });
        Some(countdown)
    }

    /// One display tick. Returns false once the tick task should stop.
    fn tick(&self, epoch: u64, countdown: &CancellationToken) -> bool {
        let mut shared = self.lock();
        if shared.epoch != epoch || countdown.is_cancelled() {
            return false;
        }
        let state = &mut shared.state;
        let (Phase::CountingDown, Some(wait), Some(remaining)) =
            (state.phase, state.wait_seconds, state.remaining_seconds)
        else {
            return false;
        };
        let remaining = remaining.saturating_sub(1);
        state.remaining_seconds = Some(remaining);
        self.emit(SchedulerEvent::Tick {
            remaining_seconds: remaining,
            wait_seconds: wait,
        });
        remaining > 0
    }

    /// Deadline reached: settle the display at 0, disarm both timers and move
    /// back to InFlight. Returns false if the cycle was superseded.
    fn deadline_fired(&self, epoch: u64, countdown: &CancellationToken, next_attempt: u32) -> bool {
        let mut shared = self.lock();
        if shared.epoch != epoch || countdown.is_cancelled() {
            return false;
        }
        if let (Some(wait), Some(remaining)) =
            (shared.state.wait_seconds, shared.state.remaining_seconds)
            && remaining > 0
        {
            shared.state.remaining_seconds = Some(0);
            self.emit(SchedulerEvent::Tick {
                remaining_seconds: 0,
                wait_seconds: wait,
            });
        }
        countdown.cancel();
        shared.countdown = None;
        shared.state = RetryState::in_flight(next_attempt);
        self.emit(SchedulerEvent::Dispatching {
            attempt: next_attempt,
        });
        true
    }
}

/// Body of one cycle: dispatch, and while limited, count down and retry.
/// There is no attempt cap.
async fn drive<T: DispatchTransport>(
    inner: Arc<Inner<T>>,
    epoch: u64,
    cycle: CancellationToken,
    prompt: String,
) {
    let mut attempt: u32 = 1;
    loop {
        let result = tokio::select! {
            _ = cycle.cancelled() => return,
            result = inner.transport.dispatch(&prompt) => result,
        };

        let wait = match result {
            DispatchResult::Ok { text } => {
                inner.finish(epoch, attempt, Ok(text));
                return;
            }
            DispatchResult::Error { message } => {
                inner.finish(epoch, attempt, Err(message));
                return;
            }
            DispatchResult::AllLimited {
                retry_after_seconds,
            } => retry_after_seconds.max(1),
        };

        let Some(countdown) = inner.start_countdown(epoch, attempt, wait) else {
            return;
        };
        let ticker = tokio::spawn(run_ticker(inner.clone(), epoch, countdown.clone()));

        let deadline_reached = tokio::select! {
            _ = countdown.cancelled() => false,
            _ = tokio::time::sleep(Duration::from_secs(wait)) => true,
        };
        if !deadline_reached || !inner.deadline_fired(epoch, &countdown, attempt + 1) {
            countdown.cancel();
            return;
        }
        if let Err(error) = ticker.await {
            debug!(error = %error, "Countdown tick task join failed");
        }
        attempt += 1;
    }
}

async fn run_ticker<T>(inner: Arc<Inner<T>>, epoch: u64, countdown: CancellationToken) {
    let mut interval = tokio::time::interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            _ = countdown.cancelled() => return,
            _ = interval.tick() => {
                if !inner.tick(epoch, &countdown) {
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
