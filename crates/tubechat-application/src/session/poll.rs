//! Status poll loop.
//!
//! Watches one video's server-side processing until it ends in success or
//! failure. Ticks are strictly sequential: the next status query is not
//! issued before the previous one has been handled, so a slow backend can
//! never cause overlapping transitions.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tubechat_core::{ChatMessage, Phase, RemoteState, VideoId, VideoQueryService};

use super::controller::SharedState;

/// Tunables for the poll loop.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between consecutive status queries.
    pub interval: Duration,
    /// Upper bound on queries before the loop gives up and allows a retry.
    /// `None` polls until the backend answers in ready or failure form.
    pub max_attempts: Option<u32>,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: Some(600),
        }
    }
}

/// Handle to one running poll loop.
///
/// At most one handle is live per session. Dropping the handle does not stop
/// the loop; [`PollHandle::cancel`] does, idempotently.
pub struct PollHandle {
    token: CancellationToken,
    task: JoinHandle<()>,
}

impl PollHandle {
    /// Requests cancellation. Safe to call repeatedly or after the loop has
    /// already terminated on its own.
    pub fn cancel(&self) {
        self.token.cancel();
    }

    /// Waits for the loop task to terminate.
    pub async fn join(self) {
        let _ = self.task.await;
    }
}

/// Spawns the poll loop for `video_id` and returns its handle.
pub(crate) fn spawn(
    state: Arc<SharedState>,
    service: Arc<dyn VideoQueryService>,
    video_id: VideoId,
    config: PollConfig,
) -> PollHandle {
    let token = CancellationToken::new();
    let loop_token = token.clone();

    let task = tokio::spawn(async move {
        run(state, service, video_id, config, loop_token).await;
    });

    PollHandle { token, task }
}

async fn run(
    state: Arc<SharedState>,
    service: Arc<dyn VideoQueryService>,
    video_id: VideoId,
    config: PollConfig,
    token: CancellationToken,
) {
    let mut attempts: u32 = 0;

    loop {
        tokio::select! {
            biased;
            _ = token.cancelled() => {
                tracing::debug!(video_id = %video_id, "poll loop cancelled");
                return;
            }
            _ = tokio::time::sleep(config.interval) => {}
        }

        attempts += 1;
        let outcome = service.status(&video_id).await;

        // A newer loop may have replaced this one while the query was in
        // flight. Terminal transitions go through `finish_poll`, which
        // re-checks the token under the session lock, so a cancelled loop
        // never applies a stale transition.
        match outcome {
            Ok(status) if status.failed => {
                tracing::info!(
                    video_id = %video_id,
                    detail = status.detail.as_deref().unwrap_or(""),
                    "backend reported processing failure"
                );
                if !state
                    .finish_poll(
                        &token,
                        ChatMessage::system("Processing failed on server."),
                        Phase::Uninitialized,
                        status.detail,
                    )
                    .await
                {
                    tracing::debug!(video_id = %video_id, "poll loop cancelled mid-tick");
                }
                return;
            }
            Ok(status) if status.state == RemoteState::Ready => {
                tracing::info!(video_id = %video_id, attempts, "video is ready");
                if !state
                    .finish_poll(
                        &token,
                        ChatMessage::assistant("Processing complete! I'm ready."),
                        Phase::Ready,
                        None,
                    )
                    .await
                {
                    tracing::debug!(video_id = %video_id, "poll loop cancelled mid-tick");
                }
                return;
            }
            Ok(_) => {
                // Still processing.
            }
            Err(err) => {
                // Transient connectivity trouble during a long job is
                // expected; only an explicit failure flag stops the loop.
                tracing::debug!(video_id = %video_id, error = %err, "poll tick failed, retrying");
            }
        }

        if let Some(max) = config.max_attempts {
            if attempts >= max {
                tracing::warn!(video_id = %video_id, attempts, "giving up on poll loop");
                state
                    .finish_poll(
                        &token,
                        ChatMessage::system(
                            "Gave up waiting for the backend. You can retry processing.",
                        ),
                        Phase::Uninitialized,
                        Some("poll limit reached".to_string()),
                    )
                    .await;
                return;
            }
        }
    }
}
