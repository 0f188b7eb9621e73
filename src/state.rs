use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

use crate::clients::openai::OpenAiClient;
use crate::config::Config;
use crate::db::Store;
use crate::domain::events::AppEvent;
use crate::services::{
    AdminService, AiService, ApiTokenService, AttemptService, AuthService, CatalogService,
    LogService, LoginThrottle, MaintenanceService, QuizService, SeaOrmAiService,
    SeaOrmAttemptService, SeaOrmAuthService, SeaOrmQuizService,
};

/// Services shared by the HTTP API, the scheduler and the CLI.
#[derive(Clone)]
pub struct SharedState {
    pub config: Arc<RwLock<Config>>,

    pub store: Store,

    pub event_bus: broadcast::Sender<AppEvent>,

    pub log_service: Arc<LogService>,

    pub tokens: Arc<ApiTokenService>,

    pub throttle: Arc<LoginThrottle>,

    pub catalog: Arc<CatalogService>,

    pub auth_service: Arc<dyn AuthService>,

    pub quiz_service: Arc<dyn QuizService>,

    pub attempt_service: Arc<dyn AttemptService>,

    pub ai_service: Arc<dyn AiService>,

    pub admin_service: Arc<AdminService>,

    pub maintenance: Arc<MaintenanceService>,
}

impl SharedState {
    pub async fn new(config: Config) -> anyhow::Result<Self> {
        let store = Store::with_pool_options(
            &config.general.database_path,
            config.general.max_db_connections,
            config.general.min_db_connections,
        )
        .await?;

        Self::with_store(config, store)
    }

    /// Wires every service on top of an existing store.
    pub fn with_store(config: Config, store: Store) -> anyhow::Result<Self> {
        let (event_bus, _) = broadcast::channel(config.general.event_bus_buffer_size.max(1));

        let log_service = Arc::new(LogService::new(store.clone(), event_bus.clone()));
        log_service.clone().start_listener();

        let tokens = Arc::new(ApiTokenService::new(
            store.clone(),
            config.security.tokens.clone(),
            event_bus.clone(),
        ));
        let throttle = Arc::new(LoginThrottle::new(config.security.auth_throttle.clone()));

        let catalog = Arc::new(CatalogService::new(
            store.clone(),
            config.general.default_language.clone(),
        ));

        let auth_service = Arc::new(SeaOrmAuthService::new(
            store.clone(),
            tokens.clone(),
            throttle.clone(),
            config.security.clone(),
            event_bus.clone(),
        )) as Arc<dyn AuthService>;

        let quiz_service =
            Arc::new(SeaOrmQuizService::new(store.clone(), catalog.clone())) as Arc<dyn QuizService>;

        let attempt_service = Arc::new(SeaOrmAttemptService::new(store.clone(), catalog.clone()))
            as Arc<dyn AttemptService>;

        let openai = Arc::new(OpenAiClient::new(&config.ai)?);
        let ai_service = Arc::new(SeaOrmAiService::new(
            store.clone(),
            openai,
            config.ai.clone(),
            catalog.clone(),
            quiz_service.clone(),
            event_bus.clone(),
        )) as Arc<dyn AiService>;

        let admin_service = Arc::new(AdminService::new(
            store.clone(),
            tokens.clone(),
            event_bus.clone(),
        ));

        let maintenance = Arc::new(MaintenanceService::new(
            store.clone(),
            tokens.clone(),
            event_bus.clone(),
            config.security.tokens.cleanup_retention_days,
            config.maintenance.log_retention_days,
        ));

        Ok(Self {
            config: Arc::new(RwLock::new(config)),
            store,
            event_bus,
            log_service,
            tokens,
            throttle,
            catalog,
            auth_service,
            quiz_service,
            attempt_service,
            ai_service,
            admin_service,
            maintenance,
        })
    }

    pub async fn config(&self) -> Config {
        self.config.read().await.clone()
    }
}
