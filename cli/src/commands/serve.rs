use anyhow::Result;
use modelctl_core::Config;

pub async fn execute(port: Option<u16>) -> Result<()> {
    let mut config = Config::load()?;
    if let Some(port) = port {
        config.daemon.port = port;
    }

    println!("Starting modelctl daemon...");
    println!("Listening on http://{}:{}", config.daemon.host, config.daemon.port);
    println!("Artifact service: {}", config.downloads.service_url);
    println!("Runtime service:  {}", config.runtime.service_url);
    println!("\nAPI endpoints:");
    println!("  GET  /health                         - Health check");
    println!("  GET  /models                         - Model catalog");
    println!("  POST /models/download                - Start a download");
    println!("  POST /models/load, /models/unload    - Load or unload a model");
    println!("  GET  /performance/summary            - Metrics and alerts");
    println!("\nPress Ctrl+C to stop.\n");

    modelctl_daemon::run_server(config).await?;

    Ok(())
}
