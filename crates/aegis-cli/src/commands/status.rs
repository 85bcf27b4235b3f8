//! `aegis status`: Query the status of a running Aegis node.

use clap::Args;
use serde::Deserialize;

use super::{get_json, DEFAULT_ENDPOINT};

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// API endpoint of the node.
    #[arg(short, long, default_value = DEFAULT_ENDPOINT)]
    pub endpoint: String,
}

#[derive(Deserialize)]
struct StatusResponse {
    version: String,
    started_at: String,
    uptime_secs: u64,
    records: usize,
    events: u64,
}

#[derive(Deserialize)]
struct AuditResponse {
    root: String,
}

pub async fn run(args: &StatusArgs) -> anyhow::Result<()> {
    let client = reqwest::Client::new();
    let status: StatusResponse =
        get_json(&client, &args.endpoint, "/api/v1/status", "status").await?;
    let audit: AuditResponse =
        get_json(&client, &args.endpoint, "/api/v1/registry/audit", "audit").await?;

    println!("Node Status:");
    println!("  Version:     {}", status.version);
    println!("  Started:     {}", status.started_at);
    println!("  Uptime:      {}s", status.uptime_secs);
    println!("  DIDs:        {}", status.records);
    println!("  Events:      {}", status.events);
    println!("  Audit root:  {}", audit.root);

    Ok(())
}
