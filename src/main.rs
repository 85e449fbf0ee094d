use dotenvy::dotenv;
use std::net::SocketAddr;
use std::sync::Arc;

use roster::config::RosterConfig;
use roster::services::mutation_engine::MutationEngine;
use roster::services::remote_authority_service::HttpRemoteAuthority;
use roster::services::roster_store::SharedRoster;
use roster::web::{self, binder::RosterBinder, notice::NoticeBoard};

#[tokio::main]
async fn main() {
    // Load .env
    dotenv().ok();

    // 1. Start logging
    tracing_subscriber::fmt::init();

    let config = RosterConfig::from_env();
    tracing::info!(api_url = %config.api_url, precheck = ?config.precheck, "📋 starting roster");

    // 2. Remote registry client + session roster
    let remote = match HttpRemoteAuthority::new(&config.api_url, config.request_timeout) {
        Ok(r) => r,
        Err(e) => {
            eprintln!("roster: invalid ROSTER_API_URL: {}", e);
            std::process::exit(1);
        }
    };
    let engine = MutationEngine::new(SharedRoster::default(), remote, config.precheck);
    let binder = Arc::new(
        RosterBinder::new(engine, NoticeBoard::new(config.notice_ttl))
            .with_build_id(env!("ROSTER_BUILD_ID")),
    );

    // 3. Initial load; on failure the page shows the load error until /reload succeeds
    if let Err(e) = binder.on_page_load().await {
        tracing::warn!("Initial roster load failed: {}", e);
    }

    let app = web::app(binder);

    // 4. Start the server (with fallback port)
    let addr: SocketAddr = match format!("{}:{}", config.host, config.port).parse() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("roster: cannot parse HOST/PORT: {}", e);
            std::process::exit(1);
        }
    };

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            let fallback = SocketAddr::new(addr.ip(), addr.port().wrapping_add(1));
            eprintln!(
                "⚠️  Could not bind {}: {}. Trying fallback {}",
                addr, e, fallback
            );
            match tokio::net::TcpListener::bind(fallback).await {
                Ok(l) => l,
                Err(e) => {
                    eprintln!("roster: cannot bind fallback {}: {}", fallback, e);
                    std::process::exit(1);
                }
            }
        }
    };

    match listener.local_addr() {
        Ok(bound) => println!("🚀 Roster running at http://{}", bound),
        Err(e) => tracing::warn!("local_addr unavailable: {}", e),
    }

    if let Err(e) = axum::serve(listener, app).await {
        eprintln!("roster: server error: {}", e);
        std::process::exit(1);
    }
}
