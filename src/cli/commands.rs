//! CLI command implementations

use std::path::Path;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::engine::Engine;
use crate::http::QueryServer;
use crate::memstore::MemoryStore;
use crate::observability::Logger;
use crate::tasks::FsTaskStore;

use super::errors::CliError;

/// Write a default configuration file
pub fn init(path: &Path) -> Result<(), CliError> {
    if path.exists() {
        return Err(CliError::AlreadyExists(path.display().to_string()));
    }
    AppConfig::default().save(path)?;
    println!("wrote {}", path.display());
    Ok(())
}

/// Load configuration and run the server until shutdown
pub fn serve(path: &Path, bind: Option<String>) -> Result<(), CliError> {
    let mut config = if path.exists() {
        AppConfig::load(path)?
    } else {
        Logger::warn(
            "config_missing",
            &[("path", &path.display().to_string())],
        );
        AppConfig::default()
    };

    if let Some(bind) = bind {
        let (host, port) = bind
            .rsplit_once(':')
            .ok_or_else(|| CliError::Io(bad_bind(&bind)))?;
        config.server.host = host.to_string();
        config.server.port = port.parse().map_err(|_| CliError::Io(bad_bind(&bind)))?;
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    runtime.block_on(async move {
        let store = Arc::new(MemoryStore::new());
        let tasks = Arc::new(FsTaskStore::new(config.engine.queries_path.clone()));
        let engine = Arc::new(Engine::with_bookkeeping(
            config.engine.clone(),
            store,
            tasks,
        ));
        if let Err(e) = engine.ensure_indexes().await {
            Logger::warn("index_provisioning_failed", &[("error", &e.to_string())]);
        }
        QueryServer::new(config.server.clone(), engine).start().await
    })?;

    Ok(())
}

fn bad_bind(bind: &str) -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::InvalidInput,
        format!("bad bind address: {}", bind),
    )
}
