use clap::Parser;
use pdsc::PdsClient;
use pdsc_server::{run_server, DEFAULT_SERVER_HOST, DEFAULT_SERVER_PORT, PORT_VAR, SERVER_VAR};
use std::net::TcpListener;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::info;

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// Network interface to listen on; falls back to PDSC_SERVER_HOST.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on; falls back to PDSC_SERVER_PORT.
    #[arg(short, long)]
    port: Option<u16>,

    /// Index directory; falls back to PDSC_DATABASE_DIR.
    #[arg(short, long)]
    database_dir: Option<PathBuf>,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pdsc_server=info,pdsc=info,info".into()),
        )
        .init();

    let args = Args::parse();

    let host = args
        .host
        .or_else(|| std::env::var(SERVER_VAR).ok())
        .unwrap_or_else(|| DEFAULT_SERVER_HOST.to_string());
    let port = match args.port {
        Some(p) => p,
        None => match std::env::var(PORT_VAR) {
            Ok(v) => v
                .parse()
                .map_err(|_| anyhow::anyhow!("port must be an integer (got \"{v}\")"))?,
            Err(_) => DEFAULT_SERVER_PORT,
        },
    };

    let client = PdsClient::new(args.database_dir.as_deref())?;
    info!(
        "opened index with instruments: {}",
        client.instruments().join(", ")
    );

    let listener = TcpListener::bind((host.as_str(), port))?;
    run_server(listener, Arc::new(client)).await?;
    Ok(())
}
