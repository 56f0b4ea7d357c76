//! PostgREST helpers for the products table.

use reqwest::Client;
use serde_json::json;

use super::{Project, ensure_success};
use crate::{
    errors::{Backend, RemoteFailure},
    product::{Category, Product},
};

/// Build `{base}/rest/v1/{table}?{query}`.
fn table_url(project: &Project, table: &str, query: &str) -> String {
    if query.is_empty() {
        format!("{}/rest/v1/{}", project.base_url, table)
    } else {
        format!("{}/rest/v1/{}?{}", project.base_url, table, query)
    }
}

/// `column=eq.value` filter with the value encoded.
fn eq_filter(column: &str, value: &str) -> String {
    format!("{}=eq.{}", column, urlencoding::encode(value))
}

/// Insert one row without asking for it back.
pub async fn insert_row(
    http: &Client,
    project: &Project,
    table: &str,
    row: &Product,
) -> Result<(), RemoteFailure> {
    let resp = project
        .authed(http.post(table_url(project, table, "")))
        .header("Prefer", "return=minimal")
        .json(row)
        .send()
        .await?;
    ensure_success(Backend::Database, resp).await?;
    Ok(())
}

/// Select rows whose id equals `id`.
pub async fn select_by_id(
    http: &Client,
    project: &Project,
    table: &str,
    id: &str,
) -> Result<Vec<Product>, RemoteFailure> {
    let query = format!("select=*&{}", eq_filter("id", id));
    select(http, project, table, &query).await
}

/// Overwrite the scan counter of one row.
pub async fn update_scans(
    http: &Client,
    project: &Project,
    table: &str,
    id: &str,
    scans: i64,
) -> Result<(), RemoteFailure> {
    let resp = project
        .authed(http.patch(table_url(project, table, &eq_filter("id", id))))
        .header("Prefer", "return=minimal")
        .json(&json!({ "scans": scans }))
        .send()
        .await?;
    ensure_success(Backend::Database, resp).await?;
    Ok(())
}

/// Rows with `scans > 0`, highest first.
pub async fn select_most_scanned(
    http: &Client,
    project: &Project,
    table: &str,
    limit: usize,
) -> Result<Vec<Product>, RemoteFailure> {
    let query = format!("select=*&scans=gt.0&order=scans.desc&limit={limit}");
    select(http, project, table, &query).await
}

/// Rows in one category.
pub async fn select_by_category(
    http: &Client,
    project: &Project,
    table: &str,
    category: Category,
) -> Result<Vec<Product>, RemoteFailure> {
    let query = format!("select=*&{}", eq_filter("category", category.as_str()));
    select(http, project, table, &query).await
}

async fn select(
    http: &Client,
    project: &Project,
    table: &str,
    query: &str,
) -> Result<Vec<Product>, RemoteFailure> {
    let resp = project
        .authed(http.get(table_url(project, table, query)))
        .send()
        .await?;
    let resp = ensure_success(Backend::Database, resp).await?;
    Ok(resp.json::<Vec<Product>>().await?)
}
