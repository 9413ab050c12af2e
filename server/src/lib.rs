use std::sync::Arc;
use std::time::Duration;

pub mod config;
pub mod handlers;
pub mod models;
pub mod notify;
pub mod payment;
pub mod routes;
pub mod services;
pub mod store;
pub mod utils;

use config::Config;
use notify::Notifier;
use payment::PaymentAdapter;
use store::Store;

/// Request-independent settings the handlers and services read.
#[derive(Debug, Clone)]
pub struct Settings {
    pub base_url: String,
    pub admin_secret: String,
    pub currency: String,
    pub notify_timeout: Duration,
}

impl From<&Config> for Settings {
    fn from(config: &Config) -> Self {
        Self {
            base_url: config.base_url.clone(),
            admin_secret: config.admin_secret.clone(),
            currency: config.currency.clone(),
            notify_timeout: config.notify_timeout,
        }
    }
}

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub payments: Arc<dyn PaymentAdapter>,
    pub notifier: Arc<dyn Notifier>,
    pub settings: Arc<Settings>,
}

impl AppState {
    pub fn new(
        store: Arc<dyn Store>,
        payments: Arc<dyn PaymentAdapter>,
        notifier: Arc<dyn Notifier>,
        settings: Settings,
    ) -> Self {
        Self {
            store,
            payments,
            notifier,
            settings: Arc::new(settings),
        }
    }
}
