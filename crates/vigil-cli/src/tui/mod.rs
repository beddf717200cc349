//! Interactive operator console: single-threaded event loop multiplexing
//! the approval poll, the agent stream, key input, and the voice debounce
//! deadline over one `select!`.

mod app;
mod ui;

use std::io;
use std::time::{Duration, Instant};

use crossterm::event::{Event, KeyEventKind};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use vigil_approvals::POLL_INTERVAL;
use vigil_client::{ClientError, ConsoleClient, StreamEvent};
use vigil_gate::ReviewOutcome;
use vigil_stream::{ChunkOutcome, CloseReason};
use vigil_voice::{Speaker, SystemSpeaker};

use crate::config::ConsoleConfig;
use app::{App, UiAction};

/// Cadence for draining key input between polls.
const UI_TICK: Duration = Duration::from_millis(100);

/// One in-flight agent turn. Dropping the token tears the connection down.
struct ActiveStream {
    rx: mpsc::Receiver<StreamEvent>,
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

pub fn run(config: ConsoleConfig, review_incident: bool) -> anyhow::Result<()> {
    let runtime = crate::runtime()?;

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(io::stdout()))?;

    let result = runtime.block_on(event_loop(&mut terminal, config, review_incident));

    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    result
}

async fn event_loop(
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    config: ConsoleConfig,
    review_incident: bool,
) -> anyhow::Result<()> {
    let mut client = config.client();
    let mut app = App::new(SystemSpeaker::detect(), config.muted, client.has_token());
    let mut stream: Option<ActiveStream> = None;

    if !app.authenticated {
        app.push_info("Not logged in; approval polling disabled. Run `vigil login`.");
    }
    if review_incident {
        review_deep_link(&mut app, &mut client).await;
    }
    refresh(&mut app, &mut client).await;

    let mut poll = tokio::time::interval(POLL_INTERVAL);
    poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    let mut ui_tick = tokio::time::interval(UI_TICK);

    loop {
        terminal.draw(|f| ui::render(f, &app))?;
        if app.should_quit {
            break;
        }

        let speech_due = app
            .dispatcher
            .next_deadline()
            .map(tokio::time::Instant::from_std);

        tokio::select! {
            _ = poll.tick() => {
                refresh(&mut app, &mut client).await;
            }
            _ = ui_tick.tick() => {
                while crossterm::event::poll(Duration::ZERO)? {
                    if let Event::Key(key) = crossterm::event::read()? {
                        if key.kind != KeyEventKind::Press {
                            continue;
                        }
                        if let Some(action) = app.handle_key(key) {
                            perform(action, &mut app, &mut client, &mut stream).await;
                        }
                    }
                }
            }
            event = next_stream_event(&mut stream) => {
                on_stream_event(event, &mut app, &mut client, &mut stream).await;
            }
            _ = wake_at(speech_due), if speech_due.is_some() => {
                app.dispatcher.tick(Instant::now());
            }
        }
    }

    if let Some(active) = stream.take() {
        active.cancel.cancel();
        active.handle.abort();
    }
    app.dispatcher.interrupt();
    Ok(())
}

async fn wake_at(deadline: Option<tokio::time::Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Next event from the active stream; pends forever when no turn is open.
async fn next_stream_event(stream: &mut Option<ActiveStream>) -> StreamEvent {
    match stream {
        Some(active) => match active.rx.recv().await {
            Some(event) => event,
            // Sender dropped without a close event; treat as finished.
            None => StreamEvent::Closed,
        },
        None => std::future::pending().await,
    }
}

async fn review_deep_link<S: Speaker>(app: &mut App<S>, client: &mut ConsoleClient) {
    app.push_info("Analyzing incident report...");
    match client.system_status().await {
        Ok(snapshot) => {
            let outcome = app.gate.review_incident(&snapshot);
            app.metrics = Some(snapshot);
            match outcome {
                ReviewOutcome::ConfirmationRequired => {
                    app.push_info("Critical state confirmed. Authorization required.");
                }
                ReviewOutcome::AlreadyResolved => {
                    app.push_info("Incident appears resolved. No action needed.");
                }
            }
        }
        Err(ClientError::AuthRequired) => app.on_auth_lost(),
        Err(e) => app.push_info(format!("Could not verify system status: {e}")),
    }
}

/// One poll round: approvals first (drives the voice delta), then status
/// and workspace files. Suspended entirely while unauthenticated.
async fn refresh<S: Speaker>(app: &mut App<S>, client: &mut ConsoleClient) {
    if !app.authenticated {
        return;
    }
    match client.approvals().await {
        Ok(requests) => {
            app.ingest_poll(requests);
            app.poll_error = None;
        }
        Err(ClientError::AuthRequired) => {
            app.on_auth_lost();
            return;
        }
        Err(e) => {
            app.queue.poll_failed();
            app.poll_error = Some(e.to_string());
            return;
        }
    }
    if let Ok(status) = client.system_status().await {
        app.metrics = Some(status);
    }
    if let Ok(files) = client.list_files().await {
        app.files = files;
    }
}

async fn perform<S: Speaker>(
    action: UiAction,
    app: &mut App<S>,
    client: &mut ConsoleClient,
    stream: &mut Option<ActiveStream>,
) {
    match action {
        UiAction::Submit(command) => start_turn(app, client, stream, &command),
        UiAction::Approve(cmd) => {
            match client.approve(&cmd.id, cmd.content).await {
                Ok(Some(result)) => app.push_info(format!("Approved {}: {result}", cmd.id)),
                Ok(None) => app.push_info(format!("Approved {}.", cmd.id)),
                Err(ClientError::AuthRequired) => {
                    app.on_auth_lost();
                    return;
                }
                Err(e) => {
                    app.push_info(format!("Approve failed: {e}"));
                    return;
                }
            }
            // Re-poll immediately so the pending panel reflects the decision.
            refresh(app, client).await;
        }
        UiAction::Deny(cmd) => {
            match client.deny(&cmd.id).await {
                Ok(()) => app.push_info(format!("Denied {}.", cmd.id)),
                Err(ClientError::AuthRequired) => {
                    app.on_auth_lost();
                    return;
                }
                Err(e) => {
                    app.push_info(format!("Deny failed: {e}"));
                    return;
                }
            }
            refresh(app, client).await;
        }
    }
}

/// Open a new turn. A still-running stream is cancelled first; its session
/// was already finalized by `Transcript::open`.
fn start_turn<S: Speaker>(
    app: &mut App<S>,
    client: &ConsoleClient,
    stream: &mut Option<ActiveStream>,
    command: &str,
) {
    if !app.transcript.open(command) {
        return;
    }
    if let Some(active) = stream.take() {
        active.cancel.cancel();
        active.handle.abort();
    }
    app.dispatcher.interrupt();

    let (tx, rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let handle = client.spawn_stream(command, tx, cancel.clone());
    *stream = Some(ActiveStream { rx, cancel, handle });
}

async fn on_stream_event<S: Speaker>(
    event: StreamEvent,
    app: &mut App<S>,
    client: &mut ConsoleClient,
    stream: &mut Option<ActiveStream>,
) {
    match event {
        StreamEvent::Chunk(chunk) => {
            if app.transcript.append_chunk(&chunk) == ChunkOutcome::MarkerDetected {
                app.gate.on_marker();
            }
            if let Some(text) = app.transcript.current_agent_text() {
                let text = text.to_string();
                app.dispatcher.on_chunk(&text, Instant::now());
            }
        }
        StreamEvent::Closed => {
            app.transcript.close(CloseReason::Finished);
            *stream = None;
        }
        StreamEvent::Failed(message) => {
            app.transcript.close(CloseReason::Error);
            app.push_info(format!("Stream error: {message}"));
            *stream = None;
            // Workspace recovery: the panel may be stale after a dead stream.
            if let Ok(files) = client.list_files().await {
                app.files = files;
            }
        }
    }
}
