//! # HTTP Server
//!
//! Binds the query routes behind CORS and serves them. The engine and
//! the serving layer meet only here.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};

use crate::engine::Engine;

use super::config::ServerConfig;
use super::routes::{health_routes, query_routes, ApiState};

/// HTTP server for the query engine
pub struct QueryServer {
    config: ServerConfig,
    router: Router,
}

impl QueryServer {
    /// Build a server around an engine
    pub fn new(config: ServerConfig, engine: Arc<Engine>) -> Self {
        let state = Arc::new(ApiState {
            engine,
            admin_username: config.admin_username.clone(),
        });

        let cors = if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            use tower_http::cors::AllowOrigin;
            let origins: Vec<_> = config
                .cors_origins
                .iter()
                .filter_map(|s| s.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        let router = Router::new()
            .merge(health_routes())
            .nest("/api", query_routes(state))
            .layer(cors);

        Self { config, router }
    }

    /// The router, for tests
    pub fn router(self) -> Router {
        self.router
    }

    /// Bind and serve until shutdown
    pub async fn start(self) -> Result<(), std::io::Error> {
        let addr: SocketAddr = self
            .config
            .socket_addr()
            .parse()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        println!("varmarshal listening on {}", addr);
        println!("  PUT    /api/queries");
        println!("  GET    /api/queries/{{task_id}}?part=record|result|task");
        println!("  DELETE /api/queries/{{task_id}}");

        let listener = TcpListener::bind(addr).await?;
        axum::serve(listener, self.router).await?;
        Ok(())
    }
}
