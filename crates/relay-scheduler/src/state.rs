use serde::Serialize;

/// Where a generation cycle currently stands.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    #[default]
    Idle,
    InFlight,
    CountingDown,
    Done,
    Failed,
}

/// Snapshot of one scheduler's retry state, suitable for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RetryState {
    /// 1-based dispatch attempt within the current cycle.
    pub attempt: u32,
    /// Length of the current countdown, set only while counting down.
    pub wait_seconds: Option<u64>,
    /// Seconds left on the countdown (display only; floored at 0).
    pub remaining_seconds: Option<u64>,
    pub phase: Phase,
    pub result: Option<String>,
    pub error: Option<String>,
}

impl Default for RetryState {
    fn default() -> Self {
        Self::idle()
    }
}

impl RetryState {
    pub fn idle() -> Self {
        Self {
            attempt: 1,
            wait_seconds: None,
            remaining_seconds: None,
            phase: Phase::Idle,
            result: None,
            error: None,
        }
    }

    pub fn in_flight(attempt: u32) -> Self {
        Self {
            attempt,
            phase: Phase::InFlight,
            ..Self::idle()
        }
    }

    pub fn counting_down(attempt: u32, wait_seconds: u64) -> Self {
        Self {
            attempt,
            wait_seconds: Some(wait_seconds),
            remaining_seconds: Some(wait_seconds),
            phase: Phase::CountingDown,
            ..Self::idle()
        }
    }

    pub fn done(attempt: u32, text: String) -> Self {
        Self {
            attempt,
            phase: Phase::Done,
            result: Some(text),
            ..Self::idle()
        }
    }

    pub fn failed(attempt: u32, message: String) -> Self {
        Self {
            attempt,
            phase: Phase::Failed,
            error: Some(message),
            ..Self::idle()
        }
    }

    /// Done or Failed: nothing further will happen without a new trigger.
    pub fn is_settled(&self) -> bool {
        matches!(self.phase, Phase::Done | Phase::Failed)
    }

    /// Countdown progress from 100 down to 0, or 0 when not counting down.
    pub fn progress_percent(&self) -> u8 {
        match (self.phase, self.wait_seconds, self.remaining_seconds) {
            (Phase::CountingDown, Some(wait), Some(remaining)) if wait > 0 => {
                let percent = (remaining as f64 / wait as f64 * 100.0).round();
                percent.clamp(0.0, 100.0) as u8
            }
            _ => 0,
        }
    }
}
