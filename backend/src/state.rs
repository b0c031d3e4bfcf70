use crate::config::Settings;
use crate::db::Db;
use crate::ledger::LedgerClient;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: Db,
    pub ledger: LedgerClient,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(db: Db, ledger: LedgerClient, settings: Settings) -> Self {
        Self {
            db,
            ledger,
            settings: Arc::new(settings),
        }
    }
}
