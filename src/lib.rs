pub mod config;
pub mod intake;
pub mod mirror;
pub mod models;
pub mod orchestrator;
pub mod projector;
pub mod remote;
pub mod results;

use tracing_subscriber::EnvFilter;

use mirror::{LocalStateMirror, MirrorError, SqliteMirrorStore};

/// Install the global tracing subscriber. `RUST_LOG` overrides the
/// default filter. Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let initialized = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(config::default_log_filter())),
        )
        .try_init()
        .is_ok();

    if initialized {
        tracing::info!("{} starting v{}", config::APP_NAME, config::APP_VERSION);
    }
}

/// Open the mirror database at its default location under the app data dir.
pub fn open_default_mirror() -> Result<LocalStateMirror<SqliteMirrorStore>, MirrorError> {
    let path = config::mirror_db_path();
    tracing::debug!(path = %path.display(), "Opening local state mirror");
    Ok(LocalStateMirror::new(SqliteMirrorStore::open(&path)?))
}
