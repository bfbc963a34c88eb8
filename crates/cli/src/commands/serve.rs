//! `veritas serve` — Start the HTTP gateway and web UI.

use std::path::Path;

pub async fn run(config_path: Option<&Path>, port: Option<u16>) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = super::load_config(config_path)?;

    if let Some(port) = port {
        config.gateway.port = port;
    }

    let orchestrator = super::build_orchestrator(&config)?;

    println!("🔎 Veritas Gateway");
    println!("   Listening:  http://{}:{}", config.gateway.host, config.gateway.port);
    println!("   Model:      {}", orchestrator.model());
    println!("   Endpoints:");
    println!("     GET    /              — Web UI");
    println!("     GET    /health        — Health check");
    println!("     POST   /v1/chat       — Verify a claim (buffered)");
    println!("     POST   /v1/chat/stream — Verify a claim (SSE)");
    println!("     POST   /v1/sessions   — Create a session");
    println!("     GET    /v1/sessions/{{id}} — Read a transcript");
    println!("     DELETE /v1/sessions/{{id}} — Discard a session");
    println!();
    println!("   Press Ctrl+C to stop.\n");

    veritas_gateway::start(config.gateway, orchestrator).await
}
