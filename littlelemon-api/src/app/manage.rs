use anyhow::Context;
use diesel::{Connection, PgConnection};
use littlelemon_api::config::database_url_from_env;
use littlelemon_api::run_migrations;
use littlelemon_api::services::accounts;
use tracing::info;

fn connect() -> anyhow::Result<PgConnection> {
    let database_url = database_url_from_env()?;
    PgConnection::establish(&database_url).context("cannot connect to the database")
}

pub fn migrate() -> anyhow::Result<()> {
    let applied = run_migrations(&mut connect()?)?;
    if applied.is_empty() {
        info!("database is up to date");
    }
    for version in applied {
        info!(%version, "applied migration");
    }
    Ok(())
}

pub fn create_superuser(username: &str, password: &str, email: &str) -> anyhow::Result<()> {
    let conn = &mut connect()?;
    let user = accounts::create_superuser(conn, username, password, email)?;
    info!(user_id = user.id, username = %user.username, "superuser ready");
    Ok(())
}
