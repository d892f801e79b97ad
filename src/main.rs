use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use datacloud_gateway::{
    auth::{ReqwestTransport, TokenManager, Transport},
    config::{Config, LogFormat},
    data_cloud::DataCloudService,
    http_client::DataCloudHttpClient,
    middleware,
    routes::{self, AppState},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (for log level)
    let config = Config::load()?;

    init_logging(&config);

    config.validate()?;

    tracing::info!("🚀 Data Cloud Gateway starting...");
    tracing::info!(
        "Server configured: {}:{}",
        config.server_host,
        config.server_port
    );

    // Credential is loaded once; a bad key or missing field stops startup here
    let credential = config
        .credential()
        .context("Failed to load platform credential")?;
    tracing::info!(
        client_id = %credential.client_id,
        username = %credential.username,
        login_url = %credential.login_url,
        "Credential loaded"
    );

    let transport: Arc<dyn Transport> = Arc::new(ReqwestTransport::new(
        Duration::from_secs(config.http_connect_timeout),
        Duration::from_secs(config.http_request_timeout),
    )?);

    let token_manager = Arc::new(TokenManager::new(
        credential,
        config.token_settings(),
        transport.clone(),
    ));

    // Test authentication by getting a token
    match token_manager.get_token().await {
        Ok((token, base_url)) => {
            tracing::info!(
                "✅ Authentication successful (token: {}..., base URL: {})",
                token_preview(&token),
                base_url
            );
        }
        Err(e) => {
            tracing::error!("❌ Authentication failed: {}", e);
            tracing::warn!(
                "Server will start but API requests will fail until authentication succeeds"
            );
        }
    }

    let http_client = Arc::new(DataCloudHttpClient::new(
        transport,
        token_manager.clone(),
        config.http_max_retries,
    ));
    let data_cloud = Arc::new(DataCloudService::new(http_client));

    let app_state = AppState {
        proxy_api_key: config.proxy_api_key.clone(),
        token_manager,
        data_cloud,
    };

    let app = build_app(app_state);

    // Bind to configured host and port
    let addr = format!("{}:{}", config.server_host, config.server_port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    print_startup_banner(&config);

    tracing::info!("🚀 Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("👋 Server shutdown complete");

    Ok(())
}

/// First characters of a token, safe for any UTF-8 content
fn token_preview(token: &str) -> String {
    token.chars().take(12).collect()
}

/// Initialize tracing from RUST_LOG, falling back to the configured level
fn init_logging(config: &Config) {
    let log_level = config.log_level.to_lowercase();
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(true)
        .with_line_number(true);

    match config.log_format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Text => builder.init(),
    }
}

/// Build the application with all routes and middleware
fn build_app(state: AppState) -> axum::Router {
    use axum::Router;

    Router::new()
        .merge(routes::health_routes(state.clone()))
        .merge(routes::data_cloud_routes(state))
        .layer(middleware::cors_layer())
        .layer(TraceLayer::new_for_http())
}

/// Print startup banner
fn print_startup_banner(config: &Config) {
    let banner = r#"
╔═══════════════════════════════════════════════════════════╗
║                                                           ║
║              ☁️  Data Cloud Gateway                        ║
║                                                           ║
║  Authenticated query and metadata proxy for Data Cloud    ║
║                                                           ║
╚═══════════════════════════════════════════════════════════╝
"#;

    println!("{}", banner);
    println!("  Version:     {}", env!("CARGO_PKG_VERSION"));
    println!(
        "  Server:      http://{}:{}",
        config.server_host, config.server_port
    );
    println!("  Login URL:   {}", config.sf_login_url);
    println!(
        "  Dataspace:   {}",
        config.data_cloud_dataspace.as_deref().unwrap_or("default")
    );
    println!("  Log Level:   {}", config.log_level);
    println!();
}

/// Handle graceful shutdown signal
async fn shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received Ctrl+C signal, initiating graceful shutdown...");
        },
        _ = terminate => {
            tracing::info!("Received terminate signal, initiating graceful shutdown...");
        },
    }
}
