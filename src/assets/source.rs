//! Asset inventory sources.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::{Deserialize, Serialize};

use super::error::AssetError;
use super::types::{Asset, AssetInventory};
use crate::config::{AssetSourceKind, ScannerConfig};
use crate::credentials::ServiceAccountKey;

/// Connection timeout for HTTP requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Overall request timeout for HTTP requests.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Maximum number of retries for transient failures.
const MAX_RETRIES: u32 = 3;

/// First retry delay; doubles on each further attempt.
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// OAuth scope for read-only Cloud Asset access.
const CLOUD_PLATFORM_SCOPE: &str = "https://www.googleapis.com/auth/cloud-platform";

/// Lifetime of the signed token assertion.
const ASSERTION_LIFETIME_SECS: i64 = 3600;

const JWT_BEARER_GRANT: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";

/// Whether a project id is safe to use in file paths and URLs.
#[must_use]
pub fn is_valid_project_id(project_id: &str) -> bool {
    !project_id.is_empty()
        && project_id.len() <= 100
        && !project_id.contains("..")
        && project_id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '.' | ':'))
}

/// Something that can produce the asset inventory of a project.
#[async_trait]
pub trait AssetSource: Send + Sync {
    /// Fetch all assets of `project_id`.
    async fn fetch(
        &self,
        project_id: &str,
        credentials: Option<&ServiceAccountKey>,
    ) -> Result<AssetInventory, AssetError>;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Reads `<dir>/<project_id>.json` exports.
#[derive(Debug, Clone)]
pub struct FileAssetSource {
    dir: PathBuf,
}

impl FileAssetSource {
    #[must_use]
    pub fn new(dir: impl AsRef<Path>) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
        }
    }

    #[must_use]
    pub fn path_for(&self, project_id: &str) -> PathBuf {
        self.dir.join(format!("{project_id}.json"))
    }
}

#[async_trait]
impl AssetSource for FileAssetSource {
    async fn fetch(
        &self,
        project_id: &str,
        _credentials: Option<&ServiceAccountKey>,
    ) -> Result<AssetInventory, AssetError> {
        let path = self.path_for(project_id);
        if !is_valid_project_id(project_id) || !path.exists() {
            return Err(AssetError::NotFound {
                project_id: project_id.to_string(),
                path,
            });
        }

        let text = tokio::fs::read_to_string(&path)
            .await
            .map_err(|source| AssetError::Io {
                path: path.clone(),
                source,
            })?;
        let inventory = AssetInventory::parse(project_id, &text)?;
        tracing::debug!(project_id, assets = inventory.len(), path = %path.display(), "Loaded asset export");
        Ok(inventory)
    }

    fn name(&self) -> &'static str {
        "file"
    }
}

/// Determine if a request should be retried based on status code and attempt count.
fn should_retry(status_code: u16, attempt: u32) -> bool {
    if attempt >= MAX_RETRIES {
        return false;
    }
    (500..600).contains(&status_code)
}

/// Exponential backoff from `initial`: 1x, 2x, 4x.
fn calculate_backoff(initial: Duration, attempt: u32) -> Duration {
    initial * (1 << attempt)
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListAssetsPage {
    #[serde(default)]
    assets: Vec<Asset>,
    #[serde(default)]
    next_page_token: Option<String>,
}

/// Live Cloud Asset Inventory API client.
#[derive(Debug, Clone)]
pub struct CloudAssetSource {
    client: Client,
    base_url: String,
    page_size: u32,
    initial_backoff: Duration,
}

impl CloudAssetSource {
    /// Create a client for `base_url`, usually `https://cloudasset.googleapis.com`.
    ///
    /// # Errors
    ///
    /// Returns `AssetError::Http` if the HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, page_size: u32) -> Result<Self, AssetError> {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into(),
            page_size,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Override the first retry delay.
    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    /// URL of one ListAssets page.
    fn list_url(
        &self,
        project_id: &str,
        content_type: &str,
        page_token: Option<&str>,
    ) -> Result<Url, AssetError> {
        let base = format!(
            "{}/v1/projects/{project_id}/assets",
            self.base_url.trim_end_matches('/')
        );
        let mut url = Url::parse(&base).map_err(|e| AssetError::Format(e.to_string()))?;
        url.query_pairs_mut()
            .append_pair("contentType", content_type)
            .append_pair("pageSize", &self.page_size.to_string());
        if let Some(token) = page_token {
            url.query_pairs_mut().append_pair("pageToken", token);
        }
        Ok(url)
    }

    /// Sign a JWT assertion with the service account key and trade it for
    /// an access token.
    async fn access_token(&self, key: &ServiceAccountKey) -> Result<String, AssetError> {
        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: CLOUD_PLATFORM_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let mut header = Header::new(Algorithm::RS256);
        header.kid = Some(key.private_key_id.clone());
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
        let assertion = jsonwebtoken::encode(&header, &claims, &encoding_key)?;

        let body = url::form_urlencoded::Serializer::new(String::new())
            .append_pair("grant_type", JWT_BEARER_GRANT)
            .append_pair("assertion", &assertion)
            .finish();

        let response = self
            .send(|| {
                self.client
                    .post(&key.token_uri)
                    .header("Content-Type", "application/x-www-form-urlencoded")
                    .body(body.clone())
            })
            .await?;
        let token: TokenResponse = response.json().await?;
        Ok(token.access_token)
    }

    async fn list_assets(
        &self,
        token: &str,
        project_id: &str,
        content_type: &str,
    ) -> Result<Vec<Asset>, AssetError> {
        let mut assets = Vec::new();
        let mut page_token: Option<String> = None;
        let mut seen_tokens = HashSet::new();
        loop {
            let url = self.list_url(project_id, content_type, page_token.as_deref())?;
            let response = self
                .send(|| self.client.get(url.clone()).bearer_auth(token))
                .await?;
            let page: ListAssetsPage = response.json().await?;
            assets.extend(page.assets);

            match page.next_page_token {
                Some(next) if !next.is_empty() => {
                    if !seen_tokens.insert(next.clone()) {
                        return Err(AssetError::Format(format!(
                            "Cloud Asset API repeated page token {next} for {content_type}"
                        )));
                    }
                    page_token = Some(next);
                }
                _ => break,
            }
        }
        tracing::debug!(project_id, content_type, count = assets.len(), "Listed assets");
        Ok(assets)
    }

    /// Send a request, retrying 5xx responses with backoff.
    async fn send<F>(&self, build: F) -> Result<Response, AssetError>
    where
        F: Fn() -> RequestBuilder,
    {
        let mut attempt = 0;
        loop {
            let response = build().send().await?;
            let status = response.status();
            if status.is_success() {
                return Ok(response);
            }

            let status_code = status.as_u16();
            if should_retry(status_code, attempt) {
                let backoff = calculate_backoff(self.initial_backoff, attempt);
                tracing::warn!(status = status_code, attempt, ?backoff, "Retrying Google API request");
                tokio::time::sleep(backoff).await;
                attempt += 1;
                continue;
            }

            let message = response.text().await.unwrap_or_default();
            return Err(AssetError::Api {
                status: status_code,
                message,
            });
        }
    }
}

#[async_trait]
impl AssetSource for CloudAssetSource {
    async fn fetch(
        &self,
        project_id: &str,
        credentials: Option<&ServiceAccountKey>,
    ) -> Result<AssetInventory, AssetError> {
        let key = credentials.ok_or(AssetError::MissingCredentials)?;
        let token = self.access_token(key).await?;

        let resources = self.list_assets(&token, project_id, "RESOURCE").await?;
        let policies = self.list_assets(&token, project_id, "IAM_POLICY").await?;

        let mut inventory = AssetInventory::new(project_id, resources);
        inventory.merge_policies(policies);
        tracing::info!(project_id, assets = inventory.len(), "Fetched Cloud Asset inventory");
        Ok(inventory)
    }

    fn name(&self) -> &'static str {
        "cloud_asset"
    }
}

/// Build the asset source selected in the scanner configuration.
///
/// # Errors
///
/// Returns an error if the HTTP client for the live source cannot be built.
pub fn asset_source_from_config(config: &ScannerConfig) -> Result<Arc<dyn AssetSource>, AssetError> {
    Ok(match config.source {
        AssetSourceKind::File => Arc::new(FileAssetSource::new(&config.assets_dir)),
        AssetSourceKind::CloudAsset => {
            Arc::new(CloudAssetSource::new(&config.cloud_asset_url, config.page_size)?)
        }
    })
}
