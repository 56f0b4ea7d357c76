//! Supabase-backed implementations of the product collaborators.

/// PostgREST table wrappers.
pub mod database;
/// One-shot TCP reachability probe.
pub mod reachability;
/// Object storage wrappers.
pub mod storage;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;

use crate::{
    config::Config,
    errors::{Backend, ErrorKind, RemoteFailure, map_database_error, map_storage_error},
    image::{self, ImageFormat, ImagePolicy},
    product::{Category, Product, ValidatedProduct},
    repository::{ProductCatalog, ProductRepository},
};

/// Project base URL and key shared by every request.
#[derive(Debug, Clone)]
pub struct Project {
    pub base_url: String,
    pub anon_key: String,
}

impl Project {
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
        }
    }

    /// Attach the key headers the gateway expects.
    pub fn authed(&self, req: RequestBuilder) -> RequestBuilder {
        req.header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
    }
}

impl From<reqwest::Error> for RemoteFailure {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() {
            RemoteFailure::offline(e.to_string())
        } else {
            RemoteFailure::message(e.to_string())
        }
    }
}

/// Error body shared by both APIs: PostgREST sends `code`, storage sends `error`.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    error: Option<String>,
    message: Option<String>,
}

/// Turn a non-2xx body into a failure for the given backend.
fn parse_failure(backend: Backend, status: reqwest::StatusCode, body: &str) -> RemoteFailure {
    let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) else {
        return RemoteFailure::message(format!("HTTP status {status}: {body}"));
    };
    let code = match backend {
        Backend::Database => parsed.code,
        Backend::Storage => parsed.error,
    };
    let message = parsed
        .message
        .unwrap_or_else(|| format!("HTTP status {status}"));
    RemoteFailure {
        code,
        message,
        not_connected: false,
    }
}

/// Convert non-2xx responses into a structured failure.
async fn ensure_success(
    backend: Backend,
    resp: reqwest::Response,
) -> Result<reqwest::Response, RemoteFailure> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_else(|_| "".into());
    Err(parse_failure(backend, status, &body))
}

/// Product table plus image bucket over HTTP.
#[derive(Debug, Clone)]
pub struct SupabaseBackend {
    http: Client,
    project: Project,
    table: String,
    bucket: String,
    cache_control_secs: u32,
    policy: ImagePolicy,
}

impl SupabaseBackend {
    pub fn from_config(cfg: &Config) -> Self {
        Self {
            http: Client::new(),
            project: Project::new(&cfg.supabase.url, &cfg.supabase.anon_key),
            table: cfg.supabase.products_table.clone(),
            bucket: cfg.supabase.image_bucket.clone(),
            cache_control_secs: cfg.upload.cache_control_secs,
            policy: cfg.image_policy(),
        }
    }

    /// Public URL of a product image.
    pub fn image_url(&self, id: &str, format: ImageFormat) -> String {
        storage::public_url(&self.project, &self.bucket, &image::object_key(id, format))
    }
}

#[async_trait]
impl ProductRepository for SupabaseBackend {
    async fn create_product(&self, product: &ValidatedProduct) -> Result<(), ErrorKind> {
        database::insert_row(&self.http, &self.project, &self.table, &product.to_row())
            .await
            .map_err(|f| map_database_error(&f))
    }

    async fn upload_product_image(&self, id: &str, bytes: &[u8]) -> Result<(), ErrorKind> {
        let format = self.policy.inspect(bytes).map_err(|e| {
            tracing::warn!("image for {id} refused before upload: {e}");
            ErrorKind::from(e)
        })?;
        let key = image::object_key(id, format);
        storage::upload_object(
            &self.http,
            &self.project,
            &self.bucket,
            &key,
            bytes.to_vec(),
            format.mime(),
            self.cache_control_secs,
        )
        .await
        .map_err(|f| map_storage_error(&f))
    }
}

#[async_trait]
impl ProductCatalog for SupabaseBackend {
    async fn fetch_product(&self, barcode: &str) -> Result<Product, ErrorKind> {
        let rows = database::select_by_id(&self.http, &self.project, &self.table, barcode)
            .await
            .map_err(|f| map_database_error(&f))?;
        rows.into_iter().next().ok_or(ErrorKind::NotFound)
    }

    async fn record_scan(&self, barcode: &str, scans: i64) -> Result<(), ErrorKind> {
        database::update_scans(&self.http, &self.project, &self.table, barcode, scans + 1)
            .await
            .map_err(|f| map_database_error(&f))
    }

    async fn most_scanned(&self, limit: usize) -> Result<Vec<Product>, ErrorKind> {
        database::select_most_scanned(&self.http, &self.project, &self.table, limit)
            .await
            .map_err(|f| map_database_error(&f))
    }

    async fn products_in_category(&self, category: Category) -> Result<Vec<Product>, ErrorKind> {
        database::select_by_category(&self.http, &self.project, &self.table, category)
            .await
            .map_err(|f| map_database_error(&f))
    }
}
