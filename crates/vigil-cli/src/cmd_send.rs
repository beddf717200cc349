use std::io::Write;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use vigil_client::StreamEvent;
use vigil_stream::{ChunkOutcome, CloseReason, Transcript};

use crate::config::ConsoleConfig;

/// One-shot turn: stream the agent's reply to stdout and exit.
pub async fn execute(config: ConsoleConfig, prompt: &str) -> anyhow::Result<()> {
    let mut transcript = Transcript::new();
    if !transcript.open(prompt) {
        anyhow::bail!("empty command");
    }

    let mut client = config.client();
    let (tx, mut rx) = mpsc::channel(32);
    let cancel = CancellationToken::new();
    let handle = client.spawn_stream(prompt, tx, cancel.clone());

    let mut marker_seen = false;
    let mut failure: Option<String> = None;
    while let Some(event) = rx.recv().await {
        match event {
            StreamEvent::Chunk(chunk) => {
                if transcript.append_chunk(&chunk) == ChunkOutcome::MarkerDetected {
                    marker_seen = true;
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
                failure = Some(message);
                break;
            }
        }
    }
    handle.await.ok();
    println!();

    if let Some(message) = failure {
        // Recovery probe: report whether the backend is still reachable.
        match client.list_files().await {
            Ok(files) => eprintln!("backend still reachable ({} workspace files)", files.len()),
            Err(e) => eprintln!("backend unreachable: {e}"),
        }
        anyhow::bail!("stream failed: {message}");
    }
    if marker_seen {
        println!("The agent is awaiting authorization.");
        println!("Run `vigil console` to review, or `vigil send APPROVE` to confirm.");
    }
    Ok(())
}
