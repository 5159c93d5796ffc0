//src/main.rs

use anyhow::Context;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use floricultura::{
    config::{AppState, Settings},
    routes::build_router,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Logger: RUST_LOG manda; sem ele, "info"
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .compact()
        .init();

    let settings = Settings::from_env()?;
    let app_state = AppState::new(&settings).await?;

    // Faz o app rodar as migrações do SQLx na inicialização
    sqlx::migrate!()
        .run(&app_state.db_pool)
        .await
        .context("Falha ao rodar as migrações do banco de dados")?;
    tracing::info!("✅ Migrações do banco de dados executadas com sucesso!");

    if let Some((username, password)) = &settings.bootstrap_admin {
        app_state
            .auth_service
            .bootstrap_admin(username, password)
            .await
            .context("Falha ao criar o administrador inicial")?;
    }

    let app = build_router(app_state);

    // Inicia o servidor
    let listener = TcpListener::bind(&settings.server_addr)
        .await
        .with_context(|| format!("Falha ao escutar em {}", settings.server_addr))?;
    tracing::info!("🚀 Servidor escutando em {}", listener.local_addr()?);
    axum::serve(listener, app).await.context("Erro no servidor Axum")?;

    Ok(())
}
