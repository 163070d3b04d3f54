use std::sync::Arc;

use tracing::info;

use etb_core::{config::Config, storage::RegistrationStore};
use etb_sqlite::SqliteRegistrationStore;

#[tokio::main]
async fn main() -> Result<(), etb_core::Error> {
    etb_core::logging::init("etb")?;

    let cfg = Arc::new(Config::load()?);

    let store = Arc::new(SqliteRegistrationStore::open(&cfg.database_path)?);
    store.ensure_schema().await?;
    info!(path = %cfg.database_path.display(), "registration database ready");

    etb_telegram::router::run_polling(cfg, store)
        .await
        .map_err(|e| etb_core::Error::External(format!("telegram bot failed: {e}")))?;

    Ok(())
}
