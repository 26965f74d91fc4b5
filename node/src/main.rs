use std::sync::Arc;

use anyhow::{bail, Context};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use webdir_core::NodeConfig;

use webdir_node::cli::Cli;
use webdir_node::http::AppState;
use webdir_node::transport::HttpTransport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "webdir_node=info,webdir_core=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let bind_addr = if cli.addr.is_empty() { "0.0.0.0:0" } else { cli.addr.as_str() };
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind HTTP listener on {bind_addr}"))?;
    let local_addr = listener.local_addr().context("bound listener has no local address")?;

    let public_addr = if cli.public_addr.is_empty() {
        local_addr.to_string()
    } else {
        cli.public_addr.clone()
    };

    let config = NodeConfig {
        base_path: None,
        public_addr,
        username: cli.name.clone(),
        password: cli.password.clone(),
        mesh_initiator_addr: if cli.mesh.is_empty() { None } else { Some(cli.mesh.clone()) },
    };

    let transport = Arc::new(HttpTransport::new());
    let node = webdir_core::bootstrap::bootstrap(config, transport)
        .await
        .context("node failed to join the mesh")?;

    tracing::info!(
        node = %node.ctx.self_node.oauth.user_name,
        address = %node.ctx.self_node.address,
        initiator = node.ctx.is_mesh_initiator(),
        "node started"
    );

    let state = Arc::new(AppState {
        node,
        http_password: cli.http_password.clone(),
    });
    let cancel = state.node.ctx.cancel.clone();

    let app = webdir_node::http::build_router(state.clone()).layer(TraceLayer::new_for_http());

    let serve_result = axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await;

    if let Err(e) = serve_result {
        bail!("HTTP server error: {e}");
    }

    tracing::info!("HTTP server stopped");
    Ok(())
}
