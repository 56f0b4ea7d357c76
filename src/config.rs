//! Config model and persistence helpers.

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::{fs, path::Path, time::Duration};

use crate::image::{DEFAULT_MAX_IMAGE_BYTES, ImageFormat, ImagePolicy};

/// Top-level configuration stored in `nutrimasr.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Backend project and object names.
    pub supabase: SupabaseCfg,
    /// Image upload limits.
    pub upload: UploadCfg,
    /// Connectivity probe settings.
    pub network: NetworkCfg,
}

/// Backend project identifiers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupabaseCfg {
    /// Project base URL, e.g. `https://xyz.supabase.co`.
    pub url: String,
    /// Public anon key sent as both `apikey` and bearer token.
    pub anon_key: String,
    /// Table holding product rows.
    pub products_table: String,
    /// Bucket holding product images.
    pub image_bucket: String,
}

/// Limits applied before an image is uploaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UploadCfg {
    pub max_image_bytes: usize,
    /// `cache-control: max-age` sent with each upload.
    pub cache_control_secs: u32,
    pub accepted_formats: Vec<ImageFormat>,
}

/// Reachability probe settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NetworkCfg {
    pub probe_timeout_ms: u64,
}

impl Config {
    /// Load from disk or create defaults when missing.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let s = fs::read_to_string(path)?;
            Ok(toml::from_str(&s)?)
        } else {
            let cfg = Self::default();
            cfg.save(path)?;
            Ok(cfg)
        }
    }

    /// Persist the config as pretty TOML.
    pub fn save(&self, path: &Path) -> Result<()> {
        let s = toml::to_string_pretty(self)?;
        fs::write(path, s)?;
        Ok(())
    }

    /// Required keys that are still empty.
    pub fn missing_settings(&self) -> Vec<&'static str> {
        let mut missing = vec![];
        if self.supabase.url.is_empty() {
            missing.push("supabase.url");
        }
        if self.supabase.anon_key.is_empty() {
            missing.push("supabase.anon_key");
        }
        if self.supabase.products_table.is_empty() {
            missing.push("supabase.products_table");
        }
        if self.supabase.image_bucket.is_empty() {
            missing.push("supabase.image_bucket");
        }
        missing
    }

    pub fn image_policy(&self) -> ImagePolicy {
        ImagePolicy {
            max_bytes: self.upload.max_image_bytes,
            accepted: self.upload.accepted_formats.clone(),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.network.probe_timeout_ms)
    }
}

impl Default for Config {
    /// Defaults match the hosted project layout; url and key must be filled in.
    fn default() -> Self {
        Self {
            supabase: SupabaseCfg {
                url: "".into(),
                anon_key: "".into(),
                products_table: "products".into(),
                image_bucket: "product-imgs".into(),
            },
            upload: UploadCfg {
                max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
                cache_control_secs: 3600,
                accepted_formats: vec![ImageFormat::Webp],
            },
            network: NetworkCfg {
                probe_timeout_ms: 3000,
            },
        }
    }
}
