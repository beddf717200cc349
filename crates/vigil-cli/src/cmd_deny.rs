use anyhow::Context;

use vigil_gate::ApprovalGate;

use crate::config::ConsoleConfig;

pub async fn execute(config: ConsoleConfig, id: &str) -> anyhow::Result<()> {
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

    let gate = ApprovalGate::new();
    let command = gate.deny(request);
    client.deny(&command.id).await?;
    println!("Denied {id}.");
    Ok(())
}
