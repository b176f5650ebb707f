//! Service configuration
//!
//! Layered with figment: built-in defaults, then an optional TOML file,
//! then environment variables (`PORT`, `OUTPUT_DIR`, `BUCKET`, ...).

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

/// Environment variables recognized as configuration keys
const ENV_KEYS: &[&str] = &[
    "bind_host",
    "port",
    "max_upload_mb",
    "output_dir",
    "public_base",
    "rembg_model",
    "rembg_url",
    "rembg_timeout_secs",
    "bucket",
    "bucket_prefix",
    "signed_url_seconds",
    "s3_endpoint",
    "s3_region",
    "s3_path_style",
];

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listen address
    pub bind_host: IpAddr,
    /// Listen port
    pub port: u16,
    /// Maximum accepted request body, in megabytes
    pub max_upload_mb: usize,
    /// Directory for the local storage backend
    pub output_dir: PathBuf,
    /// URL prefix for locally stored images; a path is also served as static files
    pub public_base: String,
    /// Segmentation model name passed to the segmentation server
    pub rembg_model: String,
    /// Base URL of the segmentation server
    pub rembg_url: String,
    /// Segmentation request timeout (0 = wait forever)
    pub rembg_timeout_secs: u64,
    /// Bucket name; setting it selects the remote backend
    pub bucket: Option<String>,
    /// Key prefix for uploaded objects
    pub bucket_prefix: String,
    /// Lifetime of signed URLs in seconds (0 = make objects public instead)
    pub signed_url_seconds: u64,
    /// Object store endpoint (defaults to AWS for the configured region)
    pub s3_endpoint: Option<String>,
    pub s3_region: String,
    /// Use `endpoint/bucket/key` addressing instead of `bucket.endpoint/key`
    pub s3_path_style: bool,
    #[serde(skip_serializing)]
    pub s3_access_key: Option<String>,
    #[serde(skip_serializing)]
    pub s3_secret_key: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 8080,
            max_upload_mb: 25,
            output_dir: PathBuf::from("static/processed_images"),
            public_base: "/static/processed_images".to_string(),
            rembg_model: "u2net".to_string(),
            rembg_url: "http://127.0.0.1:7000".to_string(),
            rembg_timeout_secs: 120,
            bucket: None,
            bucket_prefix: "processed".to_string(),
            signed_url_seconds: 0,
            s3_endpoint: None,
            s3_region: "us-east-1".to_string(),
            s3_path_style: true,
            s3_access_key: None,
            s3_secret_key: None,
        }
    }
}

impl Config {
    /// Load configuration from defaults, an optional TOML file and the environment
    pub fn load(path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Config::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment
            .merge(Env::raw().only(ENV_KEYS))
            .merge(Env::raw().only(&["AWS_ACCESS_KEY_ID"]).map(|_| "s3_access_key".into()))
            .merge(
                Env::raw()
                    .only(&["AWS_SECRET_ACCESS_KEY"])
                    .map(|_| "s3_secret_key".into()),
            )
            .extract()
    }

    /// Socket address to bind
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.bind_host, self.port)
    }

    /// Upload limit in bytes
    pub fn max_upload_bytes(&self) -> usize {
        self.max_upload_mb.saturating_mul(1024 * 1024)
    }

    /// Segmentation timeout, `None` when disabled
    pub fn rembg_timeout(&self) -> Option<Duration> {
        (self.rembg_timeout_secs > 0).then(|| Duration::from_secs(self.rembg_timeout_secs))
    }

    /// Bucket name, ignoring an empty value
    pub fn bucket(&self) -> Option<&str> {
        self.bucket.as_deref().filter(|b| !b.trim().is_empty())
    }
}
