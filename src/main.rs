use kb_gateway::modules;
use kb_gateway::proxy;

fn env_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "yes" | "on")
}

#[tokio::main]
async fn main() -> Result<(), String> {
    modules::logger::init_logger();

    let mut config = match modules::config::load_gateway_config() {
        Ok(cfg) => cfg,
        Err(err) => {
            tracing::warn!("failed to load gateway config: {}. using defaults", err);
            let cfg = proxy::GatewayConfig::default();
            let _ = modules::config::save_gateway_config(&cfg);
            cfg
        }
    };

    // Backend origin: API_URL wins over NEXT_PUBLIC_API_URL, both over the file
    if let Ok(value) = std::env::var("API_URL").or_else(|_| std::env::var("NEXT_PUBLIC_API_URL")) {
        if !value.is_empty() {
            config.backend_url = value;
        }
    }

    if let Ok(value) = std::env::var("KB_GATEWAY_ALLOW_LAN") {
        if env_truthy(value.as_str()) {
            config.allow_lan_access = true;
        }
    }

    if let Ok(value) = std::env::var("KB_GATEWAY_SECURE_COOKIES") {
        if env_truthy(value.as_str()) {
            config.secure_cookies = true;
        }
    }

    if let Ok(value) = std::env::var("KB_GATEWAY_ENABLED") {
        if env_truthy(value.as_str()) {
            config.enabled = true;
        }
    }

    let bind_address = if let Ok(addr) = std::env::var("KB_GATEWAY_BIND") {
        if addr != "127.0.0.1" && addr != "localhost" {
            config.allow_lan_access = true;
        }
        addr
    } else {
        config.get_bind_address().to_string()
    };

    config.validate()?;

    if !config.enabled {
        tracing::warn!("gateway disabled in config; set enabled=true or KB_GATEWAY_ENABLED=1");
        return Ok(());
    }

    let port = config.port;
    tracing::info!("forwarding /api/proxy to {}", config.backend_url);

    let (server, handle) = proxy::AxumServer::start(bind_address.clone(), port, config)
        .await
        .map_err(|e| format!("failed to start gateway server: {}", e))?;

    tracing::info!("kb-gateway listening on http://{}:{}", bind_address, port);

    tokio::signal::ctrl_c()
        .await
        .map_err(|e| format!("failed to listen for shutdown signal: {}", e))?;

    tracing::info!("shutdown requested, stopping server...");
    server.stop();
    let _ = handle.await;

    Ok(())
}
