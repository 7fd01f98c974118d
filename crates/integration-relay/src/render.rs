//! Terminal rendering for `relay generate`.

use relay_scheduler::SchedulerEvent;

pub(crate) const BAR_WIDTH: usize = 30;

/// `[#######-------] 12s`, full at the start of a countdown and empty at 0.
pub(crate) fn progress_bar(remaining: u64, wait: u64, width: usize) -> String {
    let filled = if wait == 0 {
        0
    } else {
        let ratio = remaining.min(wait) as f64 / wait as f64;
        (ratio * width as f64).round() as usize
    };
    format!(
        "[{}{}] {remaining}s",
        "#".repeat(filled),
        "-".repeat(width - filled)
    )
}

/// Status line for a progress event. Terminal events return None.
pub(crate) fn status_line(event: &SchedulerEvent) -> Option<String> {
    match event {
        SchedulerEvent::Dispatching { attempt: 1 } => Some("Generating connections...".into()),
        SchedulerEvent::Dispatching { attempt } => {
            Some(format!("Retrying (attempt {attempt})..."))
        }
        SchedulerEvent::CountdownStarted { wait_seconds, .. } => Some(format!(
            "All API keys are rate-limited. Retrying in {wait_seconds}s."
        )),
        SchedulerEvent::Tick {
            remaining_seconds,
            wait_seconds,
        } => Some(progress_bar(*remaining_seconds, *wait_seconds, BAR_WIDTH)),
        SchedulerEvent::Completed { .. }
        | SchedulerEvent::Failed { .. }
        | SchedulerEvent::Cancelled => None,
    }
}

pub(crate) fn error_block(message: &str) -> String {
    format!("Error: could not generate connections.\n  {message}\n  Please try again later.")
}
