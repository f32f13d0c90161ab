use std::sync::Arc;

use crate::clock::Clock;
use crate::config::AppConfig;
use crate::services::{BookingService, ProfileService};
use crate::store::SlotStore;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn SlotStore>,
    pub clock: Arc<dyn Clock>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(store: Arc<dyn SlotStore>, clock: Arc<dyn Clock>, config: AppConfig) -> Self {
        Self {
            store,
            clock,
            config: Arc::new(config),
        }
    }

    pub fn booking(&self) -> BookingService {
        BookingService::new(self.store.clone(), self.clock.clone(), self.config.school_time_zone)
    }

    pub fn profiles(&self) -> ProfileService {
        ProfileService::new(self.store.clone(), self.clock.clone())
    }
}
