use vigil_core::Severity;

use crate::config::ConsoleConfig;

pub async fn execute(config: ConsoleConfig, json: bool) -> anyhow::Result<()> {
    let mut client = config.client();
    let status = client.system_status().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }
    let label = match status.severity() {
        Severity::Critical => "CRITICAL",
        Severity::Nominal => "NOMINAL",
    };
    println!("{label}  {} active connections", status.active_connections);
    Ok(())
}
