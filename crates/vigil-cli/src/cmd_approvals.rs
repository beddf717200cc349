use crate::config::ConsoleConfig;

pub async fn execute(config: ConsoleConfig, all: bool, json: bool) -> anyhow::Result<()> {
    let mut client = config.client();
    let mut requests = client.approvals().await?;
    if !all {
        requests.retain(|r| r.is_pending());
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&requests)?);
        return Ok(());
    }
    if requests.is_empty() {
        println!("No approval requests.");
        return Ok(());
    }
    for request in &requests {
        let kind = if request.is_reviewable() { "script" } else { "action" };
        println!(
            "{}  {:?}  [{kind}] {}  {}",
            request.id, request.status, request.tool, request.description
        );
    }
    Ok(())
}
