//! Session controller.
//!
//! Owns the one session behind the surface and every network-facing
//! operation on it: activation/resolution, begin-processing, the poll loop
//! handle, and the ask exchange. All failure paths end in a stable phase
//! plus a chat message; no error escapes to the surface as a fault.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock, mpsc};
use tokio_util::sync::CancellationToken;
use tubechat_core::{
    ChatMessage, Phase, RemoteState, Session, VideoId, VideoQueryService, extract_video_id,
};

use super::event::SessionEvent;
use super::poll::{self, PollConfig, PollHandle};

/// What the host surface knows about the current page.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// Fully-qualified page URL. Not required to be well-formed.
    pub url: String,
    /// Best-effort display title.
    pub title: Option<String>,
}

impl PageContext {
    pub fn new(url: impl Into<String>, title: Option<String>) -> Self {
        Self {
            url: url.into(),
            title,
        }
    }
}

/// Session state shared between the controller and its poll loop task.
pub(crate) struct SharedState {
    session: RwLock<Option<Session>>,
    events: mpsc::Sender<SessionEvent>,
}

impl SharedState {
    /// Appends a message to the transcript and forwards it to the surface.
    pub(crate) async fn push(&self, message: ChatMessage) {
        {
            let mut guard = self.session.write().await;
            if let Some(session) = guard.as_mut() {
                session.messages.push(message.clone());
            }
        }
        let _ = self.events.send(SessionEvent::Message(message)).await;
    }

    /// Sets the phase and failure reason in one step.
    ///
    /// The phase change event is only emitted on an actual transition, so
    /// re-applying the current phase never produces surface noise.
    pub(crate) async fn set_phase(&self, phase: Phase, error: Option<String>) {
        let changed = {
            let mut guard = self.session.write().await;
            match guard.as_mut() {
                Some(session) => {
                    session.last_error = error;
                    if session.phase != phase {
                        session.phase = phase;
                        true
                    } else {
                        false
                    }
                }
                None => false,
            }
        };
        if changed {
            let _ = self.events.send(SessionEvent::PhaseChanged(phase)).await;
        }
    }

    /// Applies a terminal poll transition (message + phase) in one step,
    /// unless `token` has been cancelled.
    ///
    /// The token is checked while the session write lock is held, so a
    /// cancellation racing with an in-flight tick can never apply a stale
    /// transition after the session has been reset or rebound.
    ///
    /// Returns whether the transition was applied.
    pub(crate) async fn finish_poll(
        &self,
        token: &CancellationToken,
        message: ChatMessage,
        phase: Phase,
        error: Option<String>,
    ) -> bool {
        let phase_changed = {
            let mut guard = self.session.write().await;
            if token.is_cancelled() {
                return false;
            }
            let Some(session) = guard.as_mut() else {
                return false;
            };
            session.messages.push(message.clone());
            session.last_error = error;
            if session.phase != phase {
                session.phase = phase;
                true
            } else {
                false
            }
        };
        let _ = self.events.send(SessionEvent::Message(message)).await;
        if phase_changed {
            let _ = self.events.send(SessionEvent::PhaseChanged(phase)).await;
        }
        true
    }
}

/// Drives one session against the backend.
///
/// Single-owner by design: the surface holds one controller and queries it
/// for snapshots; all mutation happens inside. Activating a new page on the
/// same controller replaces the session and cancels any stale poll loop.
pub struct SessionController {
    service: Arc<dyn VideoQueryService>,
    poll_config: PollConfig,
    state: Arc<SharedState>,
    poll: Mutex<Option<PollHandle>>,
    ask_gate: Mutex<()>,
}

impl SessionController {
    /// Creates a controller that reports changes on `events`.
    pub fn new(
        service: Arc<dyn VideoQueryService>,
        poll_config: PollConfig,
        events: mpsc::Sender<SessionEvent>,
    ) -> Self {
        Self {
            service,
            poll_config,
            state: Arc::new(SharedState {
                session: RwLock::new(None),
                events,
            }),
            poll: Mutex::new(None),
            ask_gate: Mutex::new(()),
        }
    }

    /// Returns a snapshot of the current session, if any.
    pub async fn session(&self) -> Option<Session> {
        self.state.session.read().await.clone()
    }

    /// Returns the current phase, if a session exists.
    pub async fn phase(&self) -> Option<Phase> {
        self.state
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.phase)
    }

    /// Activates a session for the given page and resolves its remote state.
    ///
    /// Cancels any poll loop left over from a previous activation first. A
    /// page without a derivable identifier yields an `Errored` session right
    /// away, without touching the network.
    pub async fn activate(&self, page: PageContext) {
        self.cancel_poll().await;

        match extract_video_id(&page.url) {
            Some(video_id) => {
                tracing::info!(video_id = %video_id, url = %page.url, "session activated");
                {
                    let mut guard = self.state.session.write().await;
                    *guard = Some(Session::new(video_id, page.url, page.title));
                }
                let _ = self
                    .state
                    .events
                    .send(SessionEvent::PhaseChanged(Phase::Uninitialized))
                    .await;
                self.resolve().await;
            }
            None => {
                tracing::warn!(url = %page.url, "page does not identify a video");
                {
                    let mut guard = self.state.session.write().await;
                    *guard = Some(Session::without_identifier(
                        page.url,
                        page.title,
                        "Not a supported video URL",
                    ));
                }
                let _ = self
                    .state
                    .events
                    .send(SessionEvent::PhaseChanged(Phase::Errored))
                    .await;
            }
        }
    }

    /// Queries the backend once and maps its answer onto the session phase.
    ///
    /// Safe to call repeatedly: an unchanged remote status resolves to the
    /// same phase and appends no duplicate messages. Transport failure is a
    /// normal outcome here and lands the session in `Errored`, never in a
    /// propagated fault.
    pub async fn resolve(&self) {
        let (video_id, current_phase) = {
            let guard = self.state.session.read().await;
            match guard.as_ref() {
                Some(session) => (session.video_id.clone(), session.phase),
                None => return,
            }
        };
        let Some(video_id) = video_id else {
            return;
        };

        match self.service.status(&video_id).await {
            Ok(status) if status.known && status.state == RemoteState::Ready => {
                if current_phase != Phase::Ready {
                    self.state
                        .push(ChatMessage::assistant(
                            "Welcome back! I remember this video. Ask me anything.",
                        ))
                        .await;
                }
                self.state.set_phase(Phase::Ready, None).await;
            }
            Ok(status) if status.known && status.state == RemoteState::Processing => {
                self.state.set_phase(Phase::Processing, None).await;
                self.start_polling(video_id).await;
            }
            Ok(_) => {
                // Unknown to the backend: ready for the user to initialize.
                self.state.set_phase(Phase::Uninitialized, None).await;
            }
            Err(err) => {
                tracing::warn!(video_id = %video_id, error = %err, "backend status check failed");
                self.state
                    .set_phase(Phase::Errored, Some("server unreachable".to_string()))
                    .await;
            }
        }
    }

    /// Asks the backend to start processing the current page's video.
    ///
    /// Optimistically enters `Processing` before the request resolves. The
    /// identifier the backend returns is authoritative: if it differs from
    /// the client-derived one, the session is rebound to it and earlier
    /// messages are discarded. On failure the phase falls back to
    /// `Uninitialized` so the user can retry, and the identifier of record
    /// is left untouched.
    pub async fn begin_processing(&self) {
        let source_url = {
            let guard = self.state.session.read().await;
            match guard.as_ref() {
                Some(session) => session.source_url.clone(),
                None => return,
            }
        };

        // A loop for a stale identifier must never outlive this request.
        self.cancel_poll().await;

        self.state.set_phase(Phase::Processing, None).await;
        self.state
            .push(ChatMessage::system("Initializing AI for this video..."))
            .await;

        match self.service.begin_processing(&source_url).await {
            Ok(server_id) => {
                self.adopt_identifier(&server_id).await;
                self.start_polling(server_id).await;
            }
            Err(err) => {
                tracing::warn!(error = %err, "begin-processing request failed");
                self.state
                    .push(ChatMessage::system(format!("Error: {err}")))
                    .await;
                self.state
                    .set_phase(Phase::Uninitialized, Some(err.to_string()))
                    .await;
            }
        }
    }

    /// Rebinds the session to the identifier the backend derived.
    ///
    /// When the backend disagrees with the client-side extraction, its id
    /// wins and the transcript of the old identifier is dropped. The
    /// just-appended initialization notice belongs to the new run and stays.
    async fn adopt_identifier(&self, server_id: &VideoId) {
        let mut guard = self.state.session.write().await;
        let Some(session) = guard.as_mut() else {
            return;
        };
        if session.video_id.as_ref() == Some(server_id) {
            return;
        }

        tracing::info!(
            client_id = session.video_id.as_ref().map(|id| id.as_str()).unwrap_or(""),
            server_id = %server_id,
            "adopting backend-derived video id"
        );
        let notice = session.messages.pop();
        session.messages.clear();
        if let Some(notice) = notice {
            session.messages.push(notice);
        }
        session.video_id = Some(server_id.clone());
    }

    /// Asks one question about the current video.
    ///
    /// Silent no-op (returns `None` without any network call) for blank
    /// questions or when the session is not `Ready`. At most one ask is in
    /// flight per session; concurrent calls queue behind the gate. The gate
    /// is released on success and failure alike.
    pub async fn ask(&self, question: &str) -> Option<String> {
        let question = question.trim();
        if question.is_empty() {
            return None;
        }

        let _gate = self.ask_gate.lock().await;

        let video_id = {
            let guard = self.state.session.read().await;
            match guard.as_ref() {
                Some(session) if session.phase == Phase::Ready => session.video_id.clone()?,
                _ => return None,
            }
        };

        self.state.push(ChatMessage::user(question)).await;

        match self.service.ask(&video_id, question).await {
            Ok(answer) => {
                self.state.push(ChatMessage::assistant(answer.clone())).await;
                Some(answer)
            }
            Err(err) => {
                tracing::warn!(video_id = %video_id, error = %err, "ask request failed");
                self.state
                    .push(ChatMessage::system(
                        "Failed to get answer. Is the backend running?",
                    ))
                    .await;
                None
            }
        }
    }

    /// Starts the poll loop for `video_id`, replacing any running loop.
    async fn start_polling(&self, video_id: VideoId) {
        let mut guard = self.poll.lock().await;
        if let Some(stale) = guard.take() {
            stale.cancel();
        }
        *guard = Some(poll::spawn(
            Arc::clone(&self.state),
            Arc::clone(&self.service),
            video_id,
            self.poll_config.clone(),
        ));
    }

    /// Cancels the active poll loop, if any. Idempotent.
    pub async fn cancel_poll(&self) {
        if let Some(handle) = self.poll.lock().await.take() {
            handle.cancel();
        }
    }

    /// Waits for the active poll loop to terminate on its own.
    pub async fn await_poll(&self) {
        let handle = self.poll.lock().await.take();
        if let Some(handle) = handle {
            handle.join().await;
        }
    }

    /// Tears the controller down: cancels and joins the poll loop.
    pub async fn shutdown(&self) {
        let handle = self.poll.lock().await.take();
        if let Some(handle) = handle {
            handle.cancel();
            handle.join().await;
        }
    }
}

#[cfg(test)]
#[path = "controller_test.rs"]
mod tests;
