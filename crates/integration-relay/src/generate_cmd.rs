use std::future::Future;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result, bail};
use relay_config::RelayConfig;
use relay_core::{Course, MAX_COURSES, MIN_COURSES, RelayError, can_generate};
use relay_scheduler::{DispatchTransport, HttpDispatchClient, RetryScheduler, SchedulerEvent};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::debug;

use crate::render::{error_block, status_line};

pub(crate) async fn handle_generate(
    config_path: Option<&Path>,
    courses_path: &Path,
    endpoint: Option<String>,
) -> Result<()> {
    let config = RelayConfig::load(config_path)?;
    let courses = read_courses(courses_path)?;
    if !can_generate(courses.len()) {
        return Err(RelayError::InvalidCourseSelection {
            count: courses.len(),
            min: MIN_COURSES,
            max: MAX_COURSES,
        }
        .into());
    }

    let endpoint = endpoint.unwrap_or_else(|| config.client.endpoint.clone());
    let transport = HttpDispatchClient::new(endpoint, config.client.fallback_retry_secs)?;
    debug!(endpoint = %transport.endpoint(), courses = courses.len(), "Starting generation");
    let scheduler = RetryScheduler::new(transport);
    let mut events = scheduler.subscribe();
    scheduler.begin_generation(&courses);

    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };
    let text = follow_events(&scheduler, &mut events, ctrl_c).await?;
    println!("{text}");
    Ok(())
}

/// Render scheduler events to stderr until the cycle settles, returning the
/// generated text. Resolving `cancel` stops the cycle at any point.
async fn follow_events<T: DispatchTransport>(
    scheduler: &RetryScheduler<T>,
    events: &mut broadcast::Receiver<SchedulerEvent>,
    cancel: impl Future<Output = ()>,
) -> Result<String> {
    tokio::pin!(cancel);
    let mut counting_down = false;
    loop {
        let event = tokio::select! {
            _ = &mut cancel => {
                scheduler.cancel();
                end_countdown_line(&mut counting_down);
                bail!("Generation cancelled");
            }
            event = events.recv() => event,
        };
        let event = match event {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Renderer fell behind scheduler events");
                continue;
            }
            Err(RecvError::Closed) => bail!("Scheduler stopped unexpectedly"),
        };

        match &event {
            SchedulerEvent::Completed { text } => {
                end_countdown_line(&mut counting_down);
                return Ok(text.clone());
            }
            SchedulerEvent::Failed { message } => {
                end_countdown_line(&mut counting_down);
                eprintln!("{}", error_block(message));
                bail!("Generation failed");
            }
            SchedulerEvent::Tick { .. } => {
                if let Some(line) = status_line(&event) {
                    eprint!("\r{line}   ");
                    std::io::stderr().flush().ok();
                    counting_down = true;
                }
            }
            _ => {
                end_countdown_line(&mut counting_down);
                if let Some(line) = status_line(&event) {
                    eprintln!("{line}");
                }
            }
        }
    }
}

fn read_courses(path: &Path) -> Result<Vec<Course>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read courses file: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse courses file: {}", path.display()))
}

fn end_countdown_line(counting_down: &mut bool) {
    if std::mem::take(counting_down) {
        eprintln!();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::Json;
    use axum::http::{StatusCode, header};
    use axum::routing::post;
    use relay_scheduler::Phase;
    use std::time::Duration;

    /// Serve a dispatch endpoint that always reports every key as limited.
    async fn always_limited_endpoint() -> String {
        let app = axum::Router::new().route(
            "/api/gemini",
            post(|| async {
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    [(header::RETRY_AFTER, "30")],
                    Json(serde_json::json!({
                        "error": "All API keys are rate-limited.",
                        "retryDelay": 30
                    })),
                )
            }),
        );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}/api/gemini")
    }

    #[test]
    fn test_read_courses_accepts_catalog_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("courses.json");
        std::fs::write(
            &path,
            r#"[
                {"CourseID": "CS101", "CourseName": "Systems", "RationaleAbstract": "Kernels.", "Credits": 6},
                {"CourseName": "Ethics", "RationaleAbstract": "Moral theory."}
            ]"#,
        )
        .unwrap();

        let courses = read_courses(&path).unwrap();

        assert_eq!(courses.len(), 2);
        assert_eq!(courses[0].course_id.as_deref(), Some("CS101"));
        assert_eq!(courses[1].course_name, "Ethics");
    }

    #[test]
    fn test_read_courses_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.json");
        std::fs::write(&path, "{not json").unwrap();

        let err = read_courses(&path).unwrap_err();

        assert!(format!("{err}").contains("Failed to parse courses file"));
    }

    #[tokio::test]
    async fn test_rejects_single_course_before_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        let courses = dir.path().join("one.json");
        std::fs::write(&courses, r#"[{"CourseName": "Only", "RationaleAbstract": "x"}]"#).unwrap();
        let config = dir.path().join("config.toml");
        std::fs::write(&config, "").unwrap();

        let err = handle_generate(
            Some(config.as_path()),
            &courses,
            Some("http://127.0.0.1:9/none".into()),
        )
        .await
        .unwrap_err();

        assert_eq!(
            err.downcast_ref::<RelayError>(),
            Some(&RelayError::InvalidCourseSelection {
                count: 1,
                min: 2,
                max: 4
            })
        );
    }

    #[tokio::test]
    async fn test_cancel_lands_while_countdown_ticks() {
        let transport = HttpDispatchClient::new(always_limited_endpoint().await, 20).unwrap();
        let scheduler = RetryScheduler::new(transport);
        let mut events = scheduler.subscribe();
        scheduler.begin_with_prompt("prompt");

        // Ticks arrive every second, so the cancel deadline must survive
        // several loop turns to fire.
        let cancel = tokio::time::sleep(Duration::from_millis(2500));
        let err = tokio::time::timeout(
            Duration::from_secs(10),
            follow_events(&scheduler, &mut events, cancel),
        )
        .await
        .expect("cancel should end the countdown")
        .unwrap_err();

        assert_eq!(err.to_string(), "Generation cancelled");
        assert_eq!(scheduler.state().phase, Phase::Idle);
        assert!(!scheduler.has_pending_timers());
    }
}
