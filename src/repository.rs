//! Collaborator traits consumed by the submission core, plus an in-memory backend.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;

use crate::{
    errors::ErrorKind,
    image::{self, ImagePolicy},
    product::{Category, Product, ValidatedProduct},
};

/// Write side of the product table and image bucket.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    /// Insert a new product row; fails with `AlreadyExists` when the barcode is taken.
    async fn create_product(&self, product: &ValidatedProduct) -> Result<(), ErrorKind>;

    /// Upload the image for a product under `{id}.{ext}`.
    async fn upload_product_image(&self, id: &str, bytes: &[u8]) -> Result<(), ErrorKind>;
}

/// Read side of the product table.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fetch one product by barcode; an empty result is `NotFound`.
    async fn fetch_product(&self, barcode: &str) -> Result<Product, ErrorKind>;

    /// Store `scans + 1` as the product's scan counter.
    async fn record_scan(&self, barcode: &str, scans: i64) -> Result<(), ErrorKind>;

    /// Products with at least one scan, most scanned first.
    async fn most_scanned(&self, limit: usize) -> Result<Vec<Product>, ErrorKind>;

    /// Every product in a category.
    async fn products_in_category(&self, category: Category) -> Result<Vec<Product>, ErrorKind>;
}

/// One-shot connectivity check made before the first remote call.
#[async_trait]
pub trait Reachability: Send + Sync {
    async fn is_network_reachable(&self) -> bool;
}

/// Reachability answer fixed at construction.
#[derive(Debug, Clone, Copy)]
pub struct FixedReachability(pub bool);

#[async_trait]
impl Reachability for FixedReachability {
    async fn is_network_reachable(&self) -> bool {
        self.0
    }
}

/// In-memory product table and bucket (for development/testing).
#[derive(Debug, Default, Clone)]
pub struct InMemoryProductRepository {
    rows: Arc<RwLock<HashMap<String, Product>>>,
    images: Arc<RwLock<HashMap<String, Vec<u8>>>>,
    policy: ImagePolicy,
    create_calls: Arc<AtomicUsize>,
    upload_calls: Arc<AtomicUsize>,
}

impl InMemoryProductRepository {
    pub fn new(policy: ImagePolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    /// Seed a row directly.
    pub async fn insert_row(&self, product: Product) {
        let id = product.id.clone().unwrap_or_default();
        self.rows.write().await.insert(id, product);
    }

    pub async fn row(&self, id: &str) -> Option<Product> {
        self.rows.read().await.get(id).cloned()
    }

    /// Stored image keys.
    pub async fn image_keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.images.read().await.keys().cloned().collect();
        keys.sort();
        keys
    }

    pub fn create_calls(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn upload_calls(&self) -> usize {
        self.upload_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn create_product(&self, product: &ValidatedProduct) -> Result<(), ErrorKind> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);
        let mut rows = self.rows.write().await;
        if rows.contains_key(product.barcode()) {
            return Err(ErrorKind::AlreadyExists);
        }
        rows.insert(product.barcode().to_string(), product.to_row());
        Ok(())
    }

    async fn upload_product_image(&self, id: &str, bytes: &[u8]) -> Result<(), ErrorKind> {
        self.upload_calls.fetch_add(1, Ordering::SeqCst);
        let format = self.policy.inspect(bytes)?;
        let key = image::object_key(id, format);
        let mut images = self.images.write().await;
        // Uploads never overwrite.
        if images.contains_key(&key) {
            return Err(ErrorKind::AlreadyExists);
        }
        images.insert(key, bytes.to_vec());
        Ok(())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryProductRepository {
    async fn fetch_product(&self, barcode: &str) -> Result<Product, ErrorKind> {
        self.rows
            .read()
            .await
            .get(barcode)
            .cloned()
            .ok_or(ErrorKind::NotFound)
    }

    async fn record_scan(&self, barcode: &str, scans: i64) -> Result<(), ErrorKind> {
        let mut rows = self.rows.write().await;
        let row = rows.get_mut(barcode).ok_or(ErrorKind::NotFound)?;
        row.scans = Some(scans + 1);
        Ok(())
    }

    async fn most_scanned(&self, limit: usize) -> Result<Vec<Product>, ErrorKind> {
        let rows = self.rows.read().await;
        let mut products: Vec<Product> = rows
            .values()
            .filter(|p| p.scans.unwrap_or(0) > 0)
            .cloned()
            .collect();
        products.sort_by(|a, b| b.scans.cmp(&a.scans).then_with(|| a.id.cmp(&b.id)));
        products.truncate(limit);
        Ok(products)
    }

    async fn products_in_category(&self, category: Category) -> Result<Vec<Product>, ErrorKind> {
        let rows = self.rows.read().await;
        let mut products: Vec<Product> = rows
            .values()
            .filter(|p| p.category == Some(category))
            .cloned()
            .collect();
        products.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(products)
    }
}
