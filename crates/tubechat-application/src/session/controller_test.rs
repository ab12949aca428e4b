#[cfg(test)]
mod tests {
    use crate::session::controller::{PageContext, SessionController};
    use crate::session::event::SessionEvent;
    use crate::session::poll::PollConfig;
    use async_trait::async_trait;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tubechat_core::{
        MessageRole, Phase, Result, TubechatError, VideoId, VideoQueryService, VideoStatus,
    };

    const WATCH_URL: &str = "https://www.youtube.com/watch?v=abc123";

    // Mock backend with per-video scripted status responses.
    struct MockBackend {
        // Scripted status responses, consumed front to back; when a video's
        // script runs dry the fallback (still processing) is returned.
        statuses: Mutex<HashMap<String, VecDeque<Result<VideoStatus>>>>,
        status_log: Mutex<Vec<String>>,
        process_results: Mutex<VecDeque<Result<VideoId>>>,
        ask_results: Mutex<VecDeque<Result<String>>>,
        ask_calls: AtomicU32,
    }

    impl MockBackend {
        fn new() -> Self {
            Self {
                statuses: Mutex::new(HashMap::new()),
                status_log: Mutex::new(Vec::new()),
                process_results: Mutex::new(VecDeque::new()),
                ask_results: Mutex::new(VecDeque::new()),
                ask_calls: AtomicU32::new(0),
            }
        }

        fn script_statuses(&self, video_id: &str, responses: Vec<Result<VideoStatus>>) {
            self.statuses
                .lock()
                .unwrap()
                .insert(video_id.to_string(), responses.into());
        }

        fn script_process(&self, result: Result<VideoId>) {
            self.process_results.lock().unwrap().push_back(result);
        }

        fn script_ask(&self, result: Result<String>) {
            self.ask_results.lock().unwrap().push_back(result);
        }

        fn status_calls_for(&self, video_id: &str) -> usize {
            self.status_log
                .lock()
                .unwrap()
                .iter()
                .filter(|id| id.as_str() == video_id)
                .count()
        }

        fn total_status_calls(&self) -> usize {
            self.status_log.lock().unwrap().len()
        }
    }

    #[async_trait]
    impl VideoQueryService for MockBackend {
        async fn status(&self, id: &VideoId) -> Result<VideoStatus> {
            self.status_log.lock().unwrap().push(id.as_str().to_string());
            let mut statuses = self.statuses.lock().unwrap();
            match statuses.get_mut(id.as_str()).and_then(VecDeque::pop_front) {
                Some(response) => response,
                None => Ok(VideoStatus::processing()),
            }
        }

        async fn begin_processing(&self, _video_url: &str) -> Result<VideoId> {
            self.process_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TubechatError::internal("no scripted process result")))
        }

        async fn ask(&self, _id: &VideoId, _question: &str) -> Result<String> {
            self.ask_calls.fetch_add(1, Ordering::SeqCst);
            self.ask_results
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(TubechatError::internal("no scripted ask result")))
        }
    }

    fn fast_poll() -> PollConfig {
        PollConfig {
            interval: Duration::from_millis(5),
            max_attempts: Some(200),
        }
    }

    fn controller(
        backend: &Arc<MockBackend>,
        config: PollConfig,
    ) -> (SessionController, mpsc::Receiver<SessionEvent>) {
        let (tx, rx) = mpsc::channel(64);
        let service: Arc<dyn VideoQueryService> = Arc::clone(backend) as Arc<dyn VideoQueryService>;
        (SessionController::new(service, config, tx), rx)
    }

    #[tokio::test]
    async fn page_without_identifier_errors_without_network() {
        let backend = Arc::new(MockBackend::new());
        let (controller, _rx) = controller(&backend, fast_poll());

        controller
            .activate(PageContext::new("https://example.com/video", None))
            .await;

        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Errored);
        assert!(session.video_id.is_none());
        assert!(session.last_error.is_some());
        assert_eq!(backend.total_status_calls(), 0);
    }

    #[tokio::test]
    async fn resolving_a_ready_video_welcomes_back_once() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses(
            "abc123",
            vec![Ok(VideoStatus::ready()), Ok(VideoStatus::ready())],
        );
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;

        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, MessageRole::Assistant);

        // Resolving again with an unchanged remote status is idempotent.
        controller.resolve().await;
        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(session.messages.len(), 1);
    }

    #[tokio::test]
    async fn activation_records_the_page_title() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::unknown())]);
        let (controller, _rx) = controller(&backend, fast_poll());

        controller
            .activate(PageContext::new(WATCH_URL, Some("Intro to Rust".to_string())))
            .await;

        let session = controller.session().await.unwrap();
        assert_eq!(session.title.as_deref(), Some("Intro to Rust"));
        assert_eq!(session.source_url, WATCH_URL);
    }

    #[tokio::test]
    async fn unknown_video_resolves_to_uninitialized() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::unknown())]);
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;

        assert_eq!(controller.phase().await, Some(Phase::Uninitialized));
        assert_eq!(backend.total_status_calls(), 1);
    }

    #[tokio::test]
    async fn unreachable_backend_resolves_to_errored() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses(
            "abc123",
            vec![Err(TubechatError::transport("connection refused"))],
        );
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;

        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Errored);
        assert_eq!(session.last_error.as_deref(), Some("server unreachable"));
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn poll_loop_stops_on_tick_where_ready_appears() {
        let backend = Arc::new(MockBackend::new());
        // One status for the resolver, then processing on ticks 1-2 and
        // ready on tick 3.
        backend.script_statuses(
            "abc123",
            vec![
                Ok(VideoStatus::processing()),
                Ok(VideoStatus::processing()),
                Ok(VideoStatus::processing()),
                Ok(VideoStatus::ready()),
            ],
        );
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        controller.await_poll().await;

        // 1 resolver query + exactly 3 poll ticks.
        assert_eq!(backend.total_status_calls(), 4);
        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Ready);
        let assistant_messages: Vec<_> = session
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::Assistant)
            .collect();
        assert_eq!(assistant_messages.len(), 1);
        assert_eq!(assistant_messages[0].content, "Processing complete! I'm ready.");
    }

    #[tokio::test]
    async fn poll_loop_swallows_transient_transport_errors() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses(
            "abc123",
            vec![
                Ok(VideoStatus::processing()),
                Err(TubechatError::transport("flaky network")),
                Err(TubechatError::transport("flaky network")),
                Ok(VideoStatus::ready()),
            ],
        );
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        controller.await_poll().await;

        assert_eq!(controller.phase().await, Some(Phase::Ready));
        assert_eq!(backend.total_status_calls(), 4);
    }

    #[tokio::test]
    async fn poll_loop_stops_on_server_failure_flag() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses(
            "abc123",
            vec![
                Ok(VideoStatus::processing()),
                Ok(VideoStatus::processing()),
                Ok(VideoStatus::processing()),
                Ok(VideoStatus::failed("Transcript not available")),
            ],
        );
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        controller.await_poll().await;

        // Resolver query + 3 poll ticks, failure on the third tick.
        assert_eq!(backend.total_status_calls(), 4);
        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Uninitialized);
        let failures: Vec<_> = session
            .messages
            .iter()
            .filter(|m| m.role == MessageRole::System)
            .collect();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].content, "Processing failed on server.");
    }

    #[tokio::test]
    async fn poll_loop_gives_up_after_max_attempts() {
        let backend = Arc::new(MockBackend::new());
        // No script: the mock keeps answering "processing" forever.
        let (controller, _rx) = controller(
            &backend,
            PollConfig {
                interval: Duration::from_millis(2),
                max_attempts: Some(3),
            },
        );

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        controller.await_poll().await;

        assert_eq!(backend.total_status_calls(), 4);
        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Uninitialized);
        assert!(session.messages.iter().any(|m| m.role == MessageRole::System));
    }

    #[tokio::test]
    async fn begin_processing_adopts_the_server_identifier() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::unknown())]);
        backend.script_process(Ok(VideoId::new("server-id").unwrap()));
        backend.script_statuses("server-id", vec![Ok(VideoStatus::ready())]);
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        assert_eq!(controller.phase().await, Some(Phase::Uninitialized));

        controller.begin_processing().await;
        controller.await_poll().await;

        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Ready);
        assert_eq!(
            session.video_id.as_ref().map(|id| id.as_str()),
            Some("server-id")
        );
        // Polling was bound to the adopted identifier.
        assert_eq!(backend.status_calls_for("server-id"), 1);
        // Rebinding discarded prior transcript except the init notice.
        assert_eq!(session.messages[0].content, "Initializing AI for this video...");
    }

    #[tokio::test]
    async fn failed_begin_processing_allows_retry() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::unknown())]);
        backend.script_process(Err(TubechatError::server(500, "boom")));
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        controller.begin_processing().await;

        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Uninitialized);
        // The client-derived identifier survives the failure.
        assert_eq!(session.video_id.as_ref().map(|id| id.as_str()), Some("abc123"));
        let last = session.messages.last().unwrap();
        assert_eq!(last.role, MessageRole::System);
        assert!(last.content.starts_with("Error:"));
        // No poll loop was started.
        assert_eq!(backend.total_status_calls(), 1);
    }

    #[tokio::test]
    async fn starting_new_processing_cancels_the_stale_loop() {
        let backend = Arc::new(MockBackend::new());
        // Resolver sees "processing"; afterwards the unscripted fallback
        // keeps the stale loop polling abc123 forever.
        backend.script_statuses("abc123", vec![Ok(VideoStatus::processing())]);
        backend.script_process(Ok(VideoId::new("fresh-id").unwrap()));
        backend.script_statuses("fresh-id", vec![Ok(VideoStatus::ready())]);
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        assert_eq!(controller.phase().await, Some(Phase::Processing));

        controller.begin_processing().await;
        controller.await_poll().await;
        assert_eq!(controller.phase().await, Some(Phase::Ready));

        // The stale loop is dead: its query count stops moving and no late
        // transition flips the session out of Ready.
        let stale_calls = backend.status_calls_for("abc123");
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(backend.status_calls_for("abc123"), stale_calls);
        assert_eq!(controller.phase().await, Some(Phase::Ready));
    }

    // Backend whose second status query (the first poll tick) parks until
    // released, so a test can cancel the loop while that tick is in flight.
    struct ParkedTickBackend {
        status_calls: AtomicU32,
        tick_in_flight: tokio::sync::Notify,
        release_tick: tokio::sync::Notify,
    }

    impl ParkedTickBackend {
        fn new() -> Self {
            Self {
                status_calls: AtomicU32::new(0),
                tick_in_flight: tokio::sync::Notify::new(),
                release_tick: tokio::sync::Notify::new(),
            }
        }
    }

    #[async_trait]
    impl VideoQueryService for ParkedTickBackend {
        async fn status(&self, _id: &VideoId) -> Result<VideoStatus> {
            let call = self.status_calls.fetch_add(1, Ordering::SeqCst);
            if call == 0 {
                // Resolver query: send the controller into the poll loop.
                return Ok(VideoStatus::processing());
            }
            self.tick_in_flight.notify_one();
            self.release_tick.notified().await;
            Ok(VideoStatus::ready())
        }

        async fn begin_processing(&self, _video_url: &str) -> Result<VideoId> {
            Err(TubechatError::internal("not scripted"))
        }

        async fn ask(&self, _id: &VideoId, _question: &str) -> Result<String> {
            Err(TubechatError::internal("not scripted"))
        }
    }

    #[tokio::test]
    async fn cancel_during_inflight_tick_applies_no_transition() {
        let backend = Arc::new(ParkedTickBackend::new());
        let service: Arc<dyn VideoQueryService> = Arc::clone(&backend) as Arc<dyn VideoQueryService>;
        let (tx, _rx) = mpsc::channel(64);
        let controller = SessionController::new(service, fast_poll(), tx);

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        assert_eq!(controller.phase().await, Some(Phase::Processing));

        // Wait until tick 1 is blocked inside the status call, then cancel
        // the loop and let the tick come back with "ready".
        backend.tick_in_flight.notified().await;
        controller.cancel_poll().await;
        backend.release_tick.notify_one();
        tokio::time::sleep(Duration::from_millis(50)).await;

        // The cancelled tick must not have applied its terminal transition.
        let session = controller.session().await.unwrap();
        assert_eq!(session.phase, Phase::Processing);
        assert!(session.messages.is_empty());
    }

    #[tokio::test]
    async fn cancelling_twice_is_a_no_op() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::processing())]);
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        controller.cancel_poll().await;
        controller.cancel_poll().await;
        controller.shutdown().await;

        assert_eq!(controller.phase().await, Some(Phase::Processing));
    }

    #[tokio::test]
    async fn ask_appends_the_answer_verbatim() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::ready())]);
        backend.script_ask(Ok("Topic X".to_string()));
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        let answer = controller.ask("What is discussed?").await;

        assert_eq!(answer.as_deref(), Some("Topic X"));
        let session = controller.session().await.unwrap();
        let last = session.messages.last().unwrap();
        assert_eq!(last.role, MessageRole::Assistant);
        assert_eq!(last.content, "Topic X");
        let user_echo = &session.messages[session.messages.len() - 2];
        assert_eq!(user_echo.role, MessageRole::User);
        assert_eq!(user_echo.content, "What is discussed?");
    }

    #[tokio::test]
    async fn failed_ask_reports_and_stays_usable() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::ready())]);
        backend.script_ask(Err(TubechatError::transport("connection reset")));
        backend.script_ask(Ok("Second try".to_string()));
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;

        assert_eq!(controller.ask("First question").await, None);
        let session = controller.session().await.unwrap();
        let last = session.messages.last().unwrap();
        assert_eq!(last.role, MessageRole::System);
        assert_eq!(last.content, "Failed to get answer. Is the backend running?");

        // The gate was released; the next ask goes through.
        let answer = controller.ask("Second question").await;
        assert_eq!(answer.as_deref(), Some("Second try"));
        assert_eq!(controller.phase().await, Some(Phase::Ready));
    }

    #[tokio::test]
    async fn blank_question_is_silently_ignored() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::ready())]);
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        let before = controller.session().await.unwrap().messages;

        assert_eq!(controller.ask("").await, None);
        assert_eq!(controller.ask("   \t ").await, None);

        let session = controller.session().await.unwrap();
        assert_eq!(session.messages, before);
        assert_eq!(backend.ask_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn ask_is_ignored_unless_ready() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::unknown())]);
        let (controller, _rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;
        assert_eq!(controller.phase().await, Some(Phase::Uninitialized));

        assert_eq!(controller.ask("Anything?").await, None);
        assert_eq!(backend.ask_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn events_mirror_phase_changes_and_messages() {
        let backend = Arc::new(MockBackend::new());
        backend.script_statuses("abc123", vec![Ok(VideoStatus::ready())]);
        let (controller, mut rx) = controller(&backend, fast_poll());

        controller.activate(PageContext::new(WATCH_URL, None)).await;

        let mut saw_ready = false;
        let mut saw_welcome = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                SessionEvent::PhaseChanged(Phase::Ready) => saw_ready = true,
                SessionEvent::Message(message) => {
                    saw_welcome |= message.role == MessageRole::Assistant;
                }
                _ => {}
            }
        }
        assert!(saw_ready);
        assert!(saw_welcome);
    }
}
