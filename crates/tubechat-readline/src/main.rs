use std::borrow::Cow::{self, Borrowed, Owned};
use std::sync::Arc;

use anyhow::Result;
use colored::Colorize;
use rustyline::Editor;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Helper};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use tubechat_application::{PageContext, PollConfig, SessionController, SessionEvent};
use tubechat_core::{MessageRole, Phase};
use tubechat_interaction::{BackendApiClient, load_backend_config};

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "/open".to_string(),
                "/process".to_string(),
                "/status".to_string(),
            ],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

fn phase_badge(phase: Phase) -> String {
    match phase {
        Phase::Uninitialized => "[ready to initialize]".yellow().to_string(),
        Phase::Processing => "[processing...]".bright_yellow().to_string(),
        Phase::Ready => "[connected]".bright_green().to_string(),
        Phase::Errored => "[error]".bright_red().to_string(),
    }
}

/// The entry point for the Tubechat terminal surface.
///
/// Activates a session for a video page URL, renders phase changes and chat
/// messages streamed by the controller, and turns free-text input into
/// questions once the video is ready.
#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    // ===== Backend wiring =====
    let config = load_backend_config()?;
    let client = Arc::new(BackendApiClient::from_config(&config));
    tracing::info!(base_url = client.base_url(), "using backend");

    let (event_tx, mut event_rx) = mpsc::channel::<SessionEvent>(32);
    let controller = Arc::new(SessionController::new(
        client,
        PollConfig::default(),
        event_tx,
    ));

    // Render controller events as they arrive. The user's own lines are
    // already on screen, so User messages are not echoed a second time.
    let printer = tokio::spawn(async move {
        while let Some(event) = event_rx.recv().await {
            match event {
                SessionEvent::PhaseChanged(phase) => {
                    println!("{}", phase_badge(phase));
                }
                SessionEvent::Message(message) => match message.role {
                    MessageRole::User => {}
                    MessageRole::Assistant => {
                        for line in message.content.lines() {
                            println!("{}", line.bright_blue());
                        }
                    }
                    MessageRole::System => {
                        println!("{}", message.content.yellow());
                    }
                },
            }
        }
    });

    // ===== REPL Setup =====
    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== Tubechat ===".bright_magenta().bold());
    println!(
        "{}",
        "Use '/open <url> [title]' to pick a video, '/process' to start processing, '/status' to check, or 'quit' to exit."
            .bright_black()
    );
    println!();

    // Page URL and best-effort title from the command line.
    let mut args = std::env::args().skip(1);
    if let Some(url) = args.next() {
        let title: Vec<String> = args.collect();
        let title = (!title.is_empty()).then(|| title.join(" "));
        controller.activate(PageContext::new(url, title)).await;
    }

    // ===== Main REPL Loop =====
    loop {
        let readline = rl.readline(">> ");

        match readline {
            Ok(line) => {
                let trimmed = line.trim();

                if trimmed == "quit" || trimmed == "exit" {
                    println!("{}", "Goodbye!".bright_green());
                    break;
                }

                if trimmed.is_empty() {
                    continue;
                }

                let _ = rl.add_history_entry(&line);

                if trimmed == "/open" || trimmed.starts_with("/open ") {
                    let rest = trimmed["/open".len()..].trim();
                    if rest.is_empty() {
                        println!("{}", "Usage: /open <url> [title]".yellow());
                        continue;
                    }
                    let (url, title) = match rest.split_once(' ') {
                        Some((url, title)) => (url, Some(title.trim().to_string())),
                        None => (rest, None),
                    };
                    controller.activate(PageContext::new(url, title)).await;
                } else if trimmed == "/process" {
                    match controller.phase().await {
                        Some(Phase::Uninitialized) => controller.begin_processing().await,
                        Some(Phase::Processing) => {
                            println!("{}", "Already processing.".bright_black());
                        }
                        Some(Phase::Ready) => {
                            println!("{}", "Video is already processed.".bright_black());
                        }
                        Some(Phase::Errored) | None => {
                            println!("{}", "Open a valid video page first.".bright_black());
                        }
                    }
                } else if trimmed == "/status" {
                    match controller.session().await {
                        Some(session) => {
                            let video = session
                                .video_id
                                .map(|id| id.to_string())
                                .unwrap_or_else(|| "-".to_string());
                            println!("{} video: {}", phase_badge(session.phase), video.cyan());
                            if let Some(title) = session.title {
                                println!("{}", title.bright_white());
                            }
                            if let Some(reason) = session.last_error {
                                println!("{}", format!("last error: {reason}").bright_red());
                            }
                        }
                        None => println!("{}", "No session. Use '/open <url>'.".bright_black()),
                    }
                } else if trimmed.starts_with('/') {
                    println!("{}", "Unknown command".bright_black());
                } else {
                    match controller.phase().await {
                        Some(Phase::Ready) => {
                            // The answer arrives through the event printer.
                            let _ = controller.ask(trimmed).await;
                        }
                        _ => println!(
                            "{}",
                            "The video is not ready for questions yet.".bright_black()
                        ),
                    }
                }
            }
            Err(rustyline::error::ReadlineError::Interrupted) => {
                println!("{}", "CTRL-C detected. Type 'quit' to exit.".yellow());
            }
            Err(rustyline::error::ReadlineError::Eof) => {
                println!("{}", "CTRL-D detected. Exiting...".bright_green());
                break;
            }
            Err(err) => {
                eprintln!("{}", format!("Error: {:?}", err).red());
                break;
            }
        }
    }

    // Stop any live poll loop before tearing the surface down.
    controller.shutdown().await;
    drop(controller);

    let _ = printer.await;

    Ok(())
}
