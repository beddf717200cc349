use crate::config::ConsoleConfig;

/// Launch the operator console.
///
/// With the `tui` feature (default): the interactive ratatui console.
/// Without: a plain line-oriented fallback on stdin/stdout.
pub fn execute(config: ConsoleConfig, review_incident: bool) -> anyhow::Result<()> {
    #[cfg(feature = "tui")]
    {
        crate::tui::run(config, review_incident)
    }

    #[cfg(not(feature = "tui"))]
    {
        plain(config, review_incident)
    }
}

#[cfg(not(feature = "tui"))]
fn plain(config: ConsoleConfig, review_incident: bool) -> anyhow::Result<()> {
    use std::io::{BufRead, Write};

    use vigil_gate::{ApprovalGate, ReviewOutcome, APPROVE_SENTINEL};

    let runtime = crate::runtime()?;
    let mut client = config.client();
    let mut gate = ApprovalGate::new();

    eprintln!("vigil console (plain mode — rebuild with the `tui` feature for the interactive UI)");
    eprintln!("Type a command for the agent, or /quit to exit.\n");

    if review_incident {
        match runtime.block_on(client.system_status()) {
            Ok(snapshot) => match gate.review_incident(&snapshot) {
                ReviewOutcome::ConfirmationRequired => {
                    eprintln!("ALERT: critical state confirmed; authorization required.");
                    eprintln!("Type {APPROVE_SENTINEL} to authorize the proposed action.");
                }
                ReviewOutcome::AlreadyResolved => {
                    eprintln!("Incident appears resolved. No action needed.");
                }
            },
            Err(e) => eprintln!("Could not verify system status: {e}"),
        }
    }

    let stdin = std::io::stdin();
    loop {
        if client.has_token() {
            if let Ok(requests) = runtime.block_on(client.approvals()) {
                let pending = requests.iter().filter(|r| r.is_pending()).count();
                if pending > 0 {
                    eprintln!("{pending} approval request(s) pending (see `vigil approvals`)");
                }
            }
        }
        eprint!("> ");
        std::io::stderr().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Ok(());
        }
        let command = line.trim();
        if command.is_empty() {
            continue;
        }
        if command == "/quit" || command == "/exit" {
            return Ok(());
        }
        if gate.is_awaiting() && command == APPROVE_SENTINEL {
            gate.confirm();
        }
        runtime.block_on(stream_turn(&mut client, &mut gate, command))?;
    }
}

#[cfg(not(feature = "tui"))]
async fn stream_turn(
    client: &mut vigil_client::ConsoleClient,
    gate: &mut vigil_gate::ApprovalGate,
    prompt: &str,
) -> anyhow::Result<()> {
    use std::io::Write;

    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;
    use vigil_client::StreamEvent;
    use vigil_stream::{ChunkOutcome, CloseReason, Transcript};

    let mut transcript = Transcript::new();
    if !transcript.open(prompt) {
        return Ok(());
    }
    let (tx, mut rx) = mpsc::channel(32);
    let handle = client.spawn_stream(prompt, tx, CancellationToken::new());

    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Chunk(chunk) => {
                if transcript.append_chunk(&chunk) == ChunkOutcome::MarkerDetected {
                    gate.on_marker();
                }
                print!("{chunk}");
                std::io::stdout().flush()?;
            }
            StreamEvent::Closed => {
                transcript.close(CloseReason::Finished);
                break;
            }
            StreamEvent::Failed(message) => {
                transcript.close(CloseReason::Error);
                eprintln!("\nstream error: {message}");
                break;
            }
        }
    }
    handle.await.ok();
    println!();

    if gate.is_awaiting() {
        eprintln!(
            "HIGH RISK ACTION pending: type {} to authorize.",
            vigil_gate::APPROVE_SENTINEL
        );
    }
    Ok(())
}
