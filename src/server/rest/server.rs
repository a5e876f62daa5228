use anyhow::Result;
use std::sync::Arc;
use tracing::info;

use crate::operator::InstanceManager;
use crate::server::rest::{create_router, AppState};
use crate::shared::VpsConfig;

pub async fn run_rest_server(manager: Arc<InstanceManager>, config: &VpsConfig) -> Result<()> {
    info!(
        r#"
                                            
__   ___ __  ___ _ __ ___   __ _ _ __  
\ \ / / '_ \/ __| '_ ` _ \ / _` | '_ \ 
 \ V /| |_) \__ \ | | | | | (_| | | | |
  \_/ | .__/|___/_| |_| |_|\__,_|_| |_|
      |_|                              
Starting vpsman REST API service...
PID: {}
"#,
        std::process::id()
    );

    info!("Building REST API routes...");
    let app = create_router(Arc::new(AppState { manager }));

    let bind_addr = format!("{}:{}", config.host, config.port);
    info!("Binding to: {}", bind_addr);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;

    info!("Server started successfully!");
    info!("REST API Endpoint: http://{}/api/v0", bind_addr);
    info!("OpenAPI JSON: http://{}/api-docs/openapi.json", bind_addr);
    info!("Ready to accept requests...");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Shutting down vpsman server...");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
}
