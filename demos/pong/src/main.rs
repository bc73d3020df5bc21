use std::time::Duration;

use clap::Parser;
use pong::PongBehaviour;
use tidesync::prelude::*;

/// Relay server for two-player Pong sessions.
#[derive(Debug, Parser)]
#[command(name = "pong-server", version)]
struct Args {
    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1:8766")]
    bind: String,

    #[arg(long, default_value_t = 100)]
    max_connections: usize,

    /// Seconds a disconnected player keeps their seat.
    #[arg(long, default_value_t = 30)]
    grace_secs: u64,

    /// Let players without the Source-of-Truth role push updates.
    #[arg(long)]
    allow_not_sot_updates: bool,

    #[arg(long, default_value = "info")]
    log_level: String,

    /// Log one JSON object per line.
    #[arg(long)]
    json_logs: bool,

    /// Launch a session for this host at startup. Repeatable.
    #[arg(long = "host", value_name = "ID")]
    hosts: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    init_logging(&args.log_level, args.json_logs)?;

    let session = SessionConfig {
        disconnection_timeout: Duration::from_secs(args.grace_secs),
        allow_not_sot_updates: args.allow_not_sot_updates,
    };
    let server = TidesyncServer::builder()
        .bind(&args.bind)
        .max_connections(args.max_connections)
        .session_config(session)
        .build(PongBehaviour)
        .await?;

    let control = server.control();
    for host in args.hosts {
        let info = control.launch(host.as_str()).await?;
        tracing::info!(%host, session_id = %info.session_id, "session launched");
        println!("{}", serde_json::to_string(&info)?);
    }

    let stop = control.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            stop.shutdown().await;
        }
    });

    server.run().await?;
    Ok(())
}
