use std::sync::Arc;
use std::time::{Instant, SystemTime};

use crate::db::DatabaseProxy;
use crate::services::llm_provider::TutorModel;
use crate::services::progress::ProgressLedger;

#[derive(Clone)]
pub struct AppState {
    started_at: Instant,
    started_at_system: SystemTime,
    ledger: ProgressLedger,
    tutor: Arc<dyn TutorModel>,
}

impl AppState {
    pub fn new(proxy: DatabaseProxy, max_upsert_attempts: u32, tutor: Arc<dyn TutorModel>) -> Self {
        Self {
            started_at: Instant::now(),
            started_at_system: SystemTime::now(),
            ledger: ProgressLedger::new(proxy, max_upsert_attempts),
            tutor,
        }
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    pub fn started_at_system(&self) -> SystemTime {
        self.started_at_system
    }

    pub fn db_proxy(&self) -> &DatabaseProxy {
        self.ledger.proxy()
    }

    pub fn ledger(&self) -> &ProgressLedger {
        &self.ledger
    }

    pub fn tutor(&self) -> &dyn TutorModel {
        self.tutor.as_ref()
    }
}
