use std::path::Path;

use anyhow::Context;

use vigil_gate::ApprovalGate;

use crate::config::ConsoleConfig;

pub async fn execute(config: ConsoleConfig, id: &str, file: Option<&Path>) -> anyhow::Result<()> {
    let mut client = config.client();
    let requests = client.approvals().await?;
    let request = requests
        .iter()
        .find(|r| r.id == id)
        .with_context(|| format!("no approval request with id {id}"))?;
    anyhow::ensure!(
        request.is_pending(),
        "request {id} is {:?}, not PENDING",
        request.status
    );

    let edited = match file {
        Some(path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?,
        ),
        None => None,
    };
    if edited.is_some() && !request.is_reviewable() {
        anyhow::bail!("request {id} does not carry reviewable content; --file not applicable");
    }

    let gate = ApprovalGate::new();
    let command = gate.approve(request, edited);
    match client.approve(&command.id, command.content).await? {
        Some(result) => println!("Approved {id}: {result}"),
        None => println!("Approved {id}."),
    }
    Ok(())
}
