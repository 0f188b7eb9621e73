use anyhow::Result;
use sea_orm::{
    ConnectOptions, ConnectionTrait, Database, DatabaseConnection, DatabaseTransaction, Statement,
    TransactionTrait,
};
use std::path::Path;
use std::time::Duration;
use tracing::info;

pub mod migrator;
pub mod repositories;

pub use crate::entities::system_logs::Model as SystemLog;
pub use repositories::ai_request::AiRequestRepository;
pub use repositories::attempt::AttemptRepository;
pub use repositories::catalog::CatalogRepository;
pub use repositories::logs::LogRepository;
pub use repositories::quiz::QuizRepository;
pub use repositories::token::TokenRepository;
pub use repositories::user::{User, UserRepository};

#[derive(Clone)]
pub struct Store {
    pub conn: DatabaseConnection,
}

impl Store {
    pub async fn new(db_url: &str) -> Result<Self> {
        Self::with_pool_options(db_url, 5, 1).await
    }

    pub async fn with_pool_options(
        db_url: &str,
        max_connections: u32,
        min_connections: u32,
    ) -> Result<Self> {
        use sea_orm_migration::MigratorTrait;

        if !db_url.contains(":memory:") {
            let path_str = db_url
                .trim_start_matches("sqlite://")
                .trim_start_matches("sqlite:")
                .split('?')
                .next()
                .unwrap_or_default();
            if let Some(parent) = Path::new(path_str).parent() {
                tokio::fs::create_dir_all(parent).await.ok();
            }
            if !Path::new(path_str).exists() {
                std::fs::File::create(path_str)?;
            }
        }

        let in_memory = db_url.contains(":memory:");
        // Every in-memory connection is a separate database
        let (max_connections, min_connections) = if in_memory {
            (1, 1)
        } else {
            (max_connections, min_connections)
        };

        let mut opt = ConnectOptions::new(db_url.to_string());
        opt.max_connections(max_connections)
            .min_connections(min_connections)
            .connect_timeout(Duration::from_secs(10))
            .acquire_timeout(Duration::from_secs(10))
            .sqlx_logging(false);

        if !in_memory {
            opt.idle_timeout(Duration::from_secs(300))
                .max_lifetime(Duration::from_secs(600));
        }

        let conn = Database::connect(opt).await?;

        migrator::Migrator::up(&conn, None).await?;

        info!(
            "Database connected & migrations applied (pool: {}-{})",
            min_connections, max_connections
        );

        Ok(Self { conn })
    }

    /// Fresh in-memory database with migrations and seed data applied.
    /// A single connection keeps every query on the same database.
    pub async fn in_memory() -> Result<Self> {
        Self::with_pool_options("sqlite::memory:", 1, 1).await
    }

    pub async fn ping(&self) -> Result<()> {
        let backend = self.conn.get_database_backend();
        self.conn
            .query_one(Statement::from_string(backend, "SELECT 1".to_string()))
            .await?;
        Ok(())
    }

    pub async fn begin(&self) -> Result<DatabaseTransaction> {
        Ok(self.conn.begin().await?)
    }

    #[must_use]
    pub const fn users(&self) -> UserRepository<'_, DatabaseConnection> {
        UserRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn tokens(&self) -> TokenRepository<'_, DatabaseConnection> {
        TokenRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn catalog(&self) -> CatalogRepository<'_, DatabaseConnection> {
        CatalogRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn quizzes(&self) -> QuizRepository<'_, DatabaseConnection> {
        QuizRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn attempts(&self) -> AttemptRepository<'_, DatabaseConnection> {
        AttemptRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn ai_requests(&self) -> AiRequestRepository<'_, DatabaseConnection> {
        AiRequestRepository::new(&self.conn)
    }

    #[must_use]
    pub const fn logs(&self) -> LogRepository<'_, DatabaseConnection> {
        LogRepository::new(&self.conn)
    }

    pub async fn add_log(
        &self,
        event_type: &str,
        level: &str,
        message: &str,
        details: Option<String>,
    ) -> Result<()> {
        self.logs().add(event_type, level, message, details).await
    }

    pub async fn prune_logs(&self, older_than_days: i64) -> Result<u64> {
        self.logs().prune_logs(older_than_days).await
    }
}
