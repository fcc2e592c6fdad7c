use littlelemon_api::auth::TokenIssuer;
use littlelemon_api::config::Config;
use littlelemon_api::handlers::{AppState, app};
use littlelemon_api::{establish_pool, run_migrations};
use tracing::info;

pub async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;
    let pool = establish_pool(&config.database_url, config.pool_size)?;

    let applied = run_migrations(&mut *pool.get()?)?;
    if !applied.is_empty() {
        info!(?applied, "applied pending migrations");
    }

    let state = AppState::new(
        pool,
        TokenIssuer::new(&config.secret_key, config.access_token_ttl),
    );

    let listener = tokio::net::TcpListener::bind(config.bind_addr).await?;
    info!("Little Lemon API listening on {}", listener.local_addr()?);

    axum::serve(listener, app(state)).await?;

    Ok(())
}
