//! Exec command implementation.

use crate::net::client::EndpointClient;
use anyhow::{Context, Result};
use clap::Args;

/// Send one request to a partition endpoint.
#[derive(Args, Debug)]
pub struct ExecArgs {
    /// Endpoint address (host:port).
    #[arg(short, long)]
    pub endpoint: String,

    /// Partition id served by the endpoint.
    #[arg(short, long, default_value_t = 1)]
    pub partition: u32,

    /// Send a query instead of a command.
    #[arg(long)]
    pub query: bool,

    /// Request payload.
    #[arg(default_value = "")]
    pub input: String,
}

/// Run the exec command, printing each output chunk on its own line.
pub async fn run_exec(args: ExecArgs) -> Result<()> {
    let mut client = EndpointClient::connect(&args.endpoint, args.partition)
        .await
        .with_context(|| format!("failed to connect to {}", args.endpoint))?;

    let input = args.input.into_bytes();
    let output = if args.query {
        client.execute_query(input).await?
    } else {
        client.execute_command(input).await?
    };

    for chunk in output? {
        println!("{}", String::from_utf8_lossy(&chunk));
    }
    Ok(())
}
