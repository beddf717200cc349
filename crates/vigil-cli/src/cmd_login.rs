use std::io::{BufRead, Write};

use anyhow::Context;

use vigil_client::ConsoleClient;

use crate::config::ConsoleConfig;

pub async fn execute(mut config: ConsoleConfig) -> anyhow::Result<()> {
    eprint!("Password: ");
    std::io::stderr().flush()?;
    let mut password = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut password)
        .context("failed to read password")?;
    let password = password.trim_end_matches(['\r', '\n']);

    let mut client = ConsoleClient::new(&config.base_url);
    client.login(password).await.context("login failed")?;

    config.token = client.token().map(str::to_string);
    config.save()?;
    println!("Logged in to {}.", config.base_url);
    Ok(())
}
