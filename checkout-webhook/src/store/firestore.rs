//! Cloud Firestore transaction store.
//!
//! Talks to the Firestore REST API. A completion is one `documents:commit`
//! call carrying a single write:
//!
//! - `update` with `status` and `stripeSessionId`, limited by `updateMask`
//! - an `updateTransforms` entry setting `updatedAt` to `REQUEST_TIME`
//! - a `currentDocument.exists = true` precondition, so missing documents
//!   fail with `NOT_FOUND` instead of being created
//!
//! Production requests authenticate with Application Default Credentials
//! through `gcp_auth`, which caches the access token and refreshes it before
//! it expires. The emulator takes the fixed `owner` token.
//!
//! Reference: https://firebase.google.com/docs/firestore/reference/rest/v1/projects.databases.documents/commit

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use url::Url;

use super::{validate_transaction_id, StoreError, TransactionStatus, TransactionStore};
use crate::Config;

const PRODUCTION_BASE_URL: &str = "https://firestore.googleapis.com/";

/// The emulator accepts this token as an admin credential.
const EMULATOR_TOKEN: &str = "owner";

/// OAuth scope covering Firestore reads and writes.
pub const DATASTORE_SCOPE: &str = "https://www.googleapis.com/auth/datastore";

// =============================================================================
// Credentials
// =============================================================================

/// Supplies the bearer token for each Firestore request.
#[async_trait]
pub trait AccessTokenSource: Send + Sync {
    async fn access_token(&self) -> Result<String, StoreError>;
}

/// A token that never changes: the emulator's `owner`, or an explicit override.
pub struct StaticToken(pub String);

#[async_trait]
impl AccessTokenSource for StaticToken {
    async fn access_token(&self) -> Result<String, StoreError> {
        Ok(self.0.clone())
    }
}

/// Application Default Credentials, asked for a token on every request.
pub struct GcpTokenSource {
    provider: Arc<dyn gcp_auth::TokenProvider>,
}

impl GcpTokenSource {
    pub fn new(provider: Arc<dyn gcp_auth::TokenProvider>) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl AccessTokenSource for GcpTokenSource {
    async fn access_token(&self) -> Result<String, StoreError> {
        let token = self
            .provider
            .token(&[DATASTORE_SCOPE])
            .await
            .map_err(|e| StoreError::Auth(e.to_string()))?;
        Ok(token.as_str().to_string())
    }
}

/// Firestore-backed transaction store.
#[derive(Clone)]
pub struct FirestoreStore {
    client: Client,
    base_url: Url,
    /// `projects/{project}/databases/{database}`
    database_path: String,
    collection: String,
    credentials: Option<Arc<dyn AccessTokenSource>>,
}

// =============================================================================
// Wire types
// =============================================================================

#[derive(Debug, Serialize)]
struct CommitRequest {
    writes: Vec<Write>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Write {
    update: Document,
    update_mask: DocumentMask,
    update_transforms: Vec<FieldTransform>,
    current_document: Precondition,
}

#[derive(Debug, Serialize)]
struct Document {
    name: String,
    fields: BTreeMap<&'static str, Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
enum Value {
    StringValue(String),
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DocumentMask {
    field_paths: Vec<&'static str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldTransform {
    field_path: &'static str,
    set_to_server_value: &'static str,
}

#[derive(Debug, Serialize)]
struct Precondition {
    exists: bool,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorStatus,
}

#[derive(Debug, Deserialize)]
struct ErrorStatus {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

// =============================================================================
// Store
// =============================================================================

impl FirestoreStore {
    /// Build a store from configuration.
    ///
    /// - `FIRESTORE_EMULATOR_HOST` set: the emulator with the `owner` token
    /// - `FIRESTORE_ACCESS_TOKEN` set: production with that fixed token
    /// - otherwise: production with Application Default Credentials; the
    ///   project falls back to the one the credentials belong to
    pub async fn from_config(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_millis(config.request_timeout_ms))
            .build()
            .context("Failed to build Firestore HTTP client")?;

        let required_project = || {
            config
                .firestore_project_id
                .clone()
                .ok_or_else(|| anyhow!("FIRESTORE_PROJECT_ID is not set"))
        };

        let (base_url, credentials, project_id): (Url, Arc<dyn AccessTokenSource>, String) =
            if let Some(host) = &config.firestore_emulator_host {
                let emulator_token = StaticToken(EMULATOR_TOKEN.to_string());
                (
                    Url::parse(&format!("http://{}/", host))
                        .with_context(|| format!("Invalid FIRESTORE_EMULATOR_HOST: {}", host))?,
                    Arc::new(emulator_token) as Arc<dyn AccessTokenSource>,
                    required_project()?,
                )
            } else if let Some(token) = &config.firestore_access_token {
                warn!("firestore_static_access_token_in_use");
                (
                    Url::parse(PRODUCTION_BASE_URL).context("Invalid Firestore base URL")?,
                    Arc::new(StaticToken(token.clone())) as Arc<dyn AccessTokenSource>,
                    required_project()?,
                )
            } else {
                let provider = gcp_auth::provider()
                    .await
                    .context("Failed to load Google application default credentials")?;

                let project_id = match &config.firestore_project_id {
                    Some(project) => project.clone(),
                    None => provider
                        .project_id()
                        .await
                        .context("FIRESTORE_PROJECT_ID is not set and credentials have no project")?
                        .to_string(),
                };

                (
                    Url::parse(PRODUCTION_BASE_URL).context("Invalid Firestore base URL")?,
                    Arc::new(GcpTokenSource::new(provider)) as Arc<dyn AccessTokenSource>,
                    project_id,
                )
            };

        info!(
            project_id = %project_id,
            base_url = %base_url,
            "firestore_store_configured"
        );

        Ok(Self::new(
            client,
            base_url,
            &project_id,
            &config.firestore_database_id,
            &config.transactions_collection,
            Some(credentials),
        ))
    }

    pub fn new(
        client: Client,
        base_url: Url,
        project_id: &str,
        database_id: &str,
        collection: &str,
        credentials: Option<Arc<dyn AccessTokenSource>>,
    ) -> Self {
        Self {
            client,
            base_url,
            database_path: format!("projects/{}/databases/{}", project_id, database_id),
            collection: collection.to_string(),
            credentials,
        }
    }

    fn document_name(&self, transaction_id: &str) -> String {
        format!(
            "{}/documents/{}/{}",
            self.database_path, self.collection, transaction_id
        )
    }

    fn commit_url(&self) -> Result<Url, StoreError> {
        let path = format!("v1/{}/documents:commit", self.database_path);
        self.base_url.join(&path).map_err(|e| StoreError::Backend {
            status: 0,
            message: format!("invalid commit URL: {}", e),
        })
    }

    fn completion_request(&self, transaction_id: &str, stripe_session_id: &str) -> CommitRequest {
        let mut fields = BTreeMap::new();
        fields.insert(
            "status",
            Value::StringValue(TransactionStatus::Completed.as_str().to_string()),
        );
        fields.insert(
            "stripeSessionId",
            Value::StringValue(stripe_session_id.to_string()),
        );

        CommitRequest {
            writes: vec![Write {
                update: Document {
                    name: self.document_name(transaction_id),
                    fields,
                },
                update_mask: DocumentMask {
                    field_paths: vec!["status", "stripeSessionId"],
                },
                update_transforms: vec![FieldTransform {
                    field_path: "updatedAt",
                    set_to_server_value: "REQUEST_TIME",
                }],
                current_document: Precondition { exists: true },
            }],
        }
    }
}

#[async_trait]
impl TransactionStore for FirestoreStore {
    async fn complete_checkout(
        &self,
        transaction_id: &str,
        stripe_session_id: &str,
    ) -> Result<(), StoreError> {
        validate_transaction_id(transaction_id)?;

        let url = self.commit_url()?;
        let body = self.completion_request(transaction_id, stripe_session_id);

        let mut request = self.client.post(url).json(&body);
        if let Some(credentials) = &self.credentials {
            request = request.bearer_auth(credentials.access_token().await?);
        }

        let response = request.send().await?;
        let status = response.status();

        if status.is_success() {
            info!(
                transaction_id = transaction_id,
                stripe_session_id = stripe_session_id,
                "firestore_transaction_completed"
            );
            return Ok(());
        }

        let raw = response.text().await.unwrap_or_default();
        let (grpc_status, message) = match serde_json::from_str::<ErrorResponse>(&raw) {
            Ok(parsed) => (parsed.error.status, parsed.error.message),
            Err(_) => (String::new(), raw),
        };

        warn!(
            transaction_id = transaction_id,
            http_status = status.as_u16(),
            grpc_status = %grpc_status,
            message = %message,
            "firestore_commit_failed"
        );

        if status == StatusCode::NOT_FOUND || grpc_status == "NOT_FOUND" {
            return Err(StoreError::NotFound(transaction_id.to_string()));
        }

        if status == StatusCode::BAD_REQUEST || grpc_status == "INVALID_ARGUMENT" {
            return Err(StoreError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        Err(StoreError::Backend {
            status: status.as_u16(),
            message,
        })
    }
}
