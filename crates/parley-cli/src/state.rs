//! Application state wiring the infra implementations together.
//!
//! AppState pins the generic core types (`ChatSessionStore`,
//! `ConversationSyncEngine`) to the concrete SQLite store, in-process change
//! feed, and the configured response generator.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use parley_core::chat::session_store::ChatSessionStore;
use parley_core::llm::box_generator::BoxResponseGenerator;
use parley_core::sync::ConversationSyncEngine;
use parley_infra::config::{load_config, resolve_data_dir};
use parley_infra::llm::canned::CannedGenerator;
use parley_infra::llm::gemini::GeminiGenerator;
use parley_infra::realtime::feed::BroadcastChangeFeed;
use parley_infra::sqlite::chat::SqlitePersistenceClient;
use parley_infra::sqlite::pool::DatabasePool;
use parley_types::config::{GeneratorConfig, GeneratorKind, ParleyConfig};
use secrecy::SecretString;
use tracing::{info, warn};
use uuid::Uuid;

/// Engine pinned to the concrete collaborators.
pub type ConcreteEngine =
    ConversationSyncEngine<SqlitePersistenceClient, BroadcastChangeFeed, BoxResponseGenerator>;

pub type ConcreteSessionStore = ChatSessionStore<SqlitePersistenceClient>;

/// Shared application state.
pub struct AppState {
    pub config: ParleyConfig,
    pub persistence: Arc<SqlitePersistenceClient>,
    pub feed: Arc<BroadcastChangeFeed>,
    pub generator: Arc<BoxResponseGenerator>,
    pub user_id: Uuid,
}

impl AppState {
    /// Initialize the application state: load config, open the DB, wire collaborators.
    pub async fn init(user_override: Option<Uuid>) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        tokio::fs::create_dir_all(&data_dir)
            .await
            .with_context(|| format!("failed to create {}", data_dir.display()))?;

        let config = load_config(&data_dir).await;

        let pool = DatabasePool::open(&data_dir)
            .await
            .context("failed to open database")?;

        let feed = Arc::new(BroadcastChangeFeed::new(config.sync.event_capacity));
        let persistence =
            Arc::new(SqlitePersistenceClient::new(pool).with_change_feed(feed.clone()));
        let generator = Arc::new(build_generator(&config.generator)?);

        let user_id = match user_override {
            Some(id) => id,
            None => local_user_id(&data_dir).await?,
        };

        Ok(Self {
            config,
            persistence,
            feed,
            generator,
            user_id,
        })
    }

    /// Sign the current user in and load their chat list.
    pub async fn sessions(&self) -> anyhow::Result<ConcreteSessionStore> {
        Ok(ChatSessionStore::login(self.persistence.clone(), self.user_id).await?)
    }

    /// A fresh, idle sync engine. Must be called inside the runtime.
    pub fn engine(&self) -> ConcreteEngine {
        ConversationSyncEngine::new(
            self.persistence.clone(),
            self.feed.clone(),
            self.generator.clone(),
            self.config.sync.clone(),
        )
    }
}

/// Pick the response generator named in config.
///
/// A Gemini config without an API key in the environment falls back to the
/// canned generator with a warning.
fn build_generator(config: &GeneratorConfig) -> anyhow::Result<BoxResponseGenerator> {
    match config.provider {
        GeneratorKind::Canned => Ok(BoxResponseGenerator::new(CannedGenerator::new())),
        GeneratorKind::Gemini => match std::env::var(&config.api_key_env) {
            Ok(key) if !key.trim().is_empty() => {
                let gemini = GeminiGenerator::new(SecretString::from(key), config.model.clone())?;
                info!(model = %config.model, "using gemini generator");
                Ok(BoxResponseGenerator::new(gemini))
            }
            _ => {
                warn!(
                    env = %config.api_key_env,
                    "no API key set, using canned replies"
                );
                Ok(BoxResponseGenerator::new(CannedGenerator::new()))
            }
        },
    }
}

/// Stable local identity stored in `{data_dir}/user_id`, created on first run.
async fn local_user_id(data_dir: &Path) -> anyhow::Result<Uuid> {
    let path = data_dir.join("user_id");
    match tokio::fs::read_to_string(&path).await {
        Ok(content) => content
            .trim()
            .parse::<Uuid>()
            .with_context(|| format!("invalid user id in {}", path.display())),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            let id = Uuid::now_v7();
            tokio::fs::write(&path, id.to_string())
                .await
                .with_context(|| format!("failed to write {}", path.display()))?;
            info!(user_id = %id, "created local user");
            Ok(id)
        }
        Err(err) => Err(err).with_context(|| format!("failed to read {}", path.display())),
    }
}
