// src/config.rs

use std::{env, sync::Arc, time::Duration};

use anyhow::Context;
use sqlx::{postgres::PgPoolOptions, PgPool};

use crate::{
    db::{AuditRepository, AuditSink, PgStore, Store, UserRepository},
    services::{
        AuditLogger, AuthService, DraftParser, FallbackDraftParser, InventoryLedger, LossRecorder,
        ReportService, TransactionEngine,
    },
};

/// Configuração lida do ambiente (`.env` incluído).
#[derive(Debug, Clone)]
pub struct Settings {
    pub database_url: String,
    pub jwt_secret: String,
    pub server_addr: String,
    pub db_max_connections: u32,
    pub db_acquire_timeout: Duration,
    pub bootstrap_admin: Option<(String, String)>,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL deve ser definida")?;
        let jwt_secret = env::var("JWT_SECRET").context("JWT_SECRET deve ser definido")?;
        let server_addr = env::var("SERVER_ADDR").unwrap_or_else(|_| "0.0.0.0:3000".to_string());

        let db_max_connections = match env::var("DB_MAX_CONNECTIONS") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("DB_MAX_CONNECTIONS inválido: {}", v))?,
            Err(_) => 5,
        };
        let acquire_secs: u64 = match env::var("DB_ACQUIRE_TIMEOUT_SECS") {
            Ok(v) => v
                .parse()
                .with_context(|| format!("DB_ACQUIRE_TIMEOUT_SECS inválido: {}", v))?,
            Err(_) => 3,
        };

        let bootstrap_admin = match (env::var("ADMIN_USERNAME"), env::var("ADMIN_PASSWORD")) {
            (Ok(user), Ok(pass)) if !user.trim().is_empty() && !pass.is_empty() => {
                Some((user, pass))
            }
            _ => None,
        };

        Ok(Self {
            database_url,
            jwt_secret,
            server_addr,
            db_max_connections,
            db_acquire_timeout: Duration::from_secs(acquire_secs),
            bootstrap_admin,
        })
    }
}

#[derive(Clone)]
pub struct AppState {
    pub db_pool: PgPool,
    pub auth_service: AuthService,
    pub ledger: InventoryLedger,
    pub loss_recorder: LossRecorder,
    pub transaction_engine: TransactionEngine,
    pub reports: ReportService,
    pub audit: AuditLogger,
    pub draft_parser: Arc<dyn DraftParser>,
}

impl AppState {
    pub async fn new(settings: &Settings) -> anyhow::Result<Self> {
        // Conecta ao banco de dados, usando '?' para propagar erros
        let db_pool = PgPoolOptions::new()
            .max_connections(settings.db_max_connections)
            .acquire_timeout(settings.db_acquire_timeout)
            .connect(&settings.database_url)
            .await
            .context("Falha ao conectar no banco de dados")?;

        tracing::info!("✅ Conexão com o banco de dados estabelecida com sucesso!");

        Ok(Self::from_pool(db_pool, settings.jwt_secret.clone()))
    }

    /// Monta o grafo Postgres a partir de uma pool já criada (também usada com `connect_lazy`).
    pub fn from_pool(db_pool: PgPool, jwt_secret: String) -> Self {
        let store: Arc<dyn Store> = Arc::new(PgStore::new(db_pool.clone()));
        let sink: Arc<dyn AuditSink> = Arc::new(AuditRepository::new(db_pool.clone()));
        let auth_service = AuthService::new(UserRepository::new(db_pool.clone()), jwt_secret);

        Self::assemble(db_pool, store, sink, auth_service)
    }

    // --- Monta o gráfico de dependências ---
    pub fn assemble(
        db_pool: PgPool,
        store: Arc<dyn Store>,
        sink: Arc<dyn AuditSink>,
        auth_service: AuthService,
    ) -> Self {
        let audit = AuditLogger::new(sink);
        let ledger = InventoryLedger::new(store.clone(), audit.clone());
        let loss_recorder = LossRecorder::new(store.clone(), ledger.clone(), audit.clone());
        let transaction_engine = TransactionEngine::new(store.clone(), ledger.clone(), audit.clone());
        let reports = ReportService::new(store);

        Self {
            db_pool,
            auth_service,
            ledger,
            loss_recorder,
            transaction_engine,
            reports,
            audit,
            draft_parser: Arc::new(FallbackDraftParser),
        }
    }
}
