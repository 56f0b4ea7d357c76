//! Object storage helpers for product images.

use reqwest::Client;

use super::{Project, ensure_success};
use crate::errors::{Backend, RemoteFailure};

/// Upload raw bytes to `{bucket}/{key}`; existing objects are never overwritten.
pub async fn upload_object(
    http: &Client,
    project: &Project,
    bucket: &str,
    key: &str,
    bytes: Vec<u8>,
    mime: &str,
    cache_control_secs: u32,
) -> Result<(), RemoteFailure> {
    let url = format!(
        "{}/storage/v1/object/{}/{}",
        project.base_url,
        bucket,
        urlencoding::encode(key)
    );
    let resp = project
        .authed(http.post(url))
        .header("content-type", mime)
        .header("cache-control", format!("max-age={cache_control_secs}"))
        .header("x-upsert", "false")
        .body(bytes)
        .send()
        .await?;
    ensure_success(Backend::Storage, resp).await?;
    Ok(())
}

/// Public download URL for an object.
pub fn public_url(project: &Project, bucket: &str, key: &str) -> String {
    format!(
        "{}/storage/v1/object/public/{}/{}",
        project.base_url,
        bucket,
        urlencoding::encode(key)
    )
}
