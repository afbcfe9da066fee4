//! Configuration module for environment variable parsing.
//!
//! Everything is read once at startup and handed to the web server as an
//! immutable [`Config`]. Nothing re-reads the environment per request.

use std::env;
use tracing::warn;

/// Default Stripe timestamp tolerance (5 minutes), same as the Stripe SDKs.
pub const DEFAULT_SIGNATURE_TOLERANCE_SECS: u64 = 300;

/// Which transaction store backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    /// Cloud Firestore over REST (production and emulator)
    Firestore,
    /// Process-local map, for local development only
    Memory,
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port for the web server to listen on
    pub port: u16,

    /// Stripe webhook signing secret (`whsec_...`)
    pub stripe_webhook_secret: Option<String>,

    /// Maximum allowed age in seconds of the `t=` value in `Stripe-Signature`
    pub stripe_signature_tolerance_secs: u64,

    /// Transaction store backend
    pub store_backend: StoreBackend,

    /// Google Cloud project hosting the Firestore database
    pub firestore_project_id: Option<String>,

    /// Firestore database id
    pub firestore_database_id: String,

    /// Collection holding transaction documents
    pub transactions_collection: String,

    /// `host:port` of a running Firestore emulator
    pub firestore_emulator_host: Option<String>,

    /// Fixed bearer token overriding Application Default Credentials.
    /// It is never refreshed, so only suitable for short-lived runs.
    pub firestore_access_token: Option<String>,

    /// HTTP request timeout in milliseconds for Firestore calls
    pub request_timeout_ms: u64,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Config {
            port: env::var("PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8080),

            stripe_webhook_secret: non_blank("STRIPE_WEBHOOK_SECRET"),

            stripe_signature_tolerance_secs: env::var("STRIPE_SIGNATURE_TOLERANCE_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_SIGNATURE_TOLERANCE_SECS),

            store_backend: parse_backend("TRANSACTION_STORE"),

            firestore_project_id: non_blank("FIRESTORE_PROJECT_ID")
                .or_else(|| non_blank("GOOGLE_CLOUD_PROJECT"))
                .or_else(|| non_blank("GCLOUD_PROJECT")),

            firestore_database_id: non_blank("FIRESTORE_DATABASE_ID")
                .unwrap_or_else(|| "(default)".to_string()),

            transactions_collection: non_blank("TRANSACTIONS_COLLECTION")
                .unwrap_or_else(|| "transactions".to_string()),

            firestore_emulator_host: non_blank("FIRESTORE_EMULATOR_HOST"),

            firestore_access_token: non_blank("FIRESTORE_ACCESS_TOKEN"),

            request_timeout_ms: env::var("REQUEST_TIMEOUT_MS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(8000),
        }
    }

    /// Whether incoming webhooks can be verified at all.
    pub fn has_webhook_secret(&self) -> bool {
        self.stripe_webhook_secret.is_some()
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 8080,
            stripe_webhook_secret: None,
            stripe_signature_tolerance_secs: DEFAULT_SIGNATURE_TOLERANCE_SECS,
            store_backend: StoreBackend::Firestore,
            firestore_project_id: None,
            firestore_database_id: "(default)".to_string(),
            transactions_collection: "transactions".to_string(),
            firestore_emulator_host: None,
            firestore_access_token: None,
            request_timeout_ms: 8000,
        }
    }
}

/// Read a variable, treating empty or whitespace-only values as unset.
fn non_blank(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_backend(name: &str) -> StoreBackend {
    let raw = match non_blank(name) {
        Some(v) => v,
        None => return StoreBackend::Firestore,
    };

    match raw.to_ascii_lowercase().as_str() {
        "firestore" => StoreBackend::Firestore,
        "memory" => StoreBackend::Memory,
        _ => {
            warn!(env_var = name, value = %raw, "Unknown store backend, using firestore");
            StoreBackend::Firestore
        }
    }
}
