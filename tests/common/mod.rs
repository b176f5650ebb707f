//! Common test utilities - BgremTest harness for end-to-end testing

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use axum::{extract::Multipart, http::StatusCode, response::IntoResponse, routing::post, Router};
use bgremd::storage::{ObjectStore, RemoteStore, StorageBackend, StorageError};
use bgremd::{Config, Server};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use reqwest::{multipart, Client};
use tempfile::TempDir;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Test harness that spawns a real bgremd server on a random port
pub struct BgremTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
    /// Output directory for the local backend (cleaned up on drop)
    pub output_dir: TempDir,
    _rembg: Option<JoinHandle<()>>,
}

impl BgremTest {
    /// Start a server with local storage and a fake rembg server
    pub async fn start() -> Result<Self> {
        let (rembg_addr, rembg) = spawn_fake_rembg().await?;
        let output_dir = TempDir::new()?;

        let mut config = Self::base_config(&output_dir)?;
        config.rembg_url = format!("http://{}", rembg_addr);

        let server = Server::new(config).await?;
        Self::launch(server, output_dir, Some(rembg)).await
    }

    /// Start a server with a small upload limit
    pub async fn start_with_limit(max_upload_mb: usize) -> Result<Self> {
        let (rembg_addr, rembg) = spawn_fake_rembg().await?;
        let output_dir = TempDir::new()?;

        let mut config = Self::base_config(&output_dir)?;
        config.rembg_url = format!("http://{}", rembg_addr);
        config.max_upload_mb = max_upload_mb;

        let server = Server::new(config).await?;
        Self::launch(server, output_dir, Some(rembg)).await
    }

    /// Start a server whose segmentation server is unreachable
    pub async fn start_without_rembg() -> Result<Self> {
        let output_dir = TempDir::new()?;
        let mut config = Self::base_config(&output_dir)?;
        config.rembg_url = "http://127.0.0.1:9".to_string();
        config.rembg_timeout_secs = 2;

        let server = Server::new(config).await?;
        Self::launch(server, output_dir, None).await
    }

    /// Start a server backed by an in-memory object store
    pub async fn start_remote(store: Arc<MemoryObjectStore>, signed_url_secs: u64) -> Result<Self> {
        let (rembg_addr, rembg) = spawn_fake_rembg().await?;
        let output_dir = TempDir::new()?;

        let mut config = Self::base_config(&output_dir)?;
        config.rembg_url = format!("http://{}", rembg_addr);

        let segmenter = bgremd::segment::RembgClient::new(
            &config.rembg_url,
            &config.rembg_model,
            config.rembg_timeout(),
        )?;
        let storage = StorageBackend::Remote(RemoteStore::new(
            store,
            &config.bucket_prefix,
            signed_url_secs,
        ));

        let server = Server::with_components(config, Arc::new(segmenter), storage);
        Self::launch(server, output_dir, Some(rembg)).await
    }

    fn base_config(output_dir: &TempDir) -> Result<Config> {
        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let addr = listener.local_addr()?;
        drop(listener);

        Ok(Config {
            bind_host: addr.ip(),
            port: addr.port(),
            output_dir: output_dir.path().to_path_buf(),
            ..Config::default()
        })
    }

    async fn launch(
        server: Server,
        output_dir: TempDir,
        rembg: Option<JoinHandle<()>>,
    ) -> Result<Self> {
        let addr = server.bind_addr();
        let server = Arc::new(server);
        let server_clone = server.clone();

        // Spawn the server in a background task
        let handle = tokio::spawn(async move {
            if let Err(e) = server_clone.run().await {
                eprintln!("Server error: {}", e);
            }
        });

        let client = Client::builder().timeout(Duration::from_secs(10)).build()?;

        // Poll until server is ready (max 2 seconds)
        let mut ready = false;
        for _ in 0..20 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if client
                .get(format!("http://{}/healthz", addr))
                .send()
                .await
                .is_ok()
            {
                ready = true;
                break;
            }
        }

        if !ready {
            panic!("Server failed to start within 2 seconds");
        }

        Ok(Self {
            addr,
            client,
            server,
            _handle: handle,
            output_dir,
            _rembg: rembg,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// POST a multipart form to /remove-bg
    pub async fn remove_bg(&self, form: multipart::Form) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/remove-bg", self.base_url()))
            .multipart(form)
            .send()
            .await?)
    }

    /// POST `data` as the `image` field with the given filename
    pub async fn upload(&self, filename: &str, data: Vec<u8>) -> Result<reqwest::Response> {
        let part = multipart::Part::bytes(data).file_name(filename.to_string());
        self.remove_bg(multipart::Form::new().part("image", part)).await
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for BgremTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// Encode an RGBA image as PNG
pub fn png_bytes(img: &RgbaImage) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    DynamicImage::ImageRgba8(img.clone())
        .write_to(&mut buf, ImageFormat::Png)
        .expect("encode png");
    buf.into_inner()
}

/// Opaque solid-color test image
pub fn solid_png(width: u32, height: u32, color: [u8; 3]) -> Vec<u8> {
    png_bytes(&RgbaImage::from_pixel(
        width,
        height,
        Rgba([color[0], color[1], color[2], 255]),
    ))
}

/// Spawn a rembg stand-in that makes the right half of every image transparent
pub async fn spawn_fake_rembg() -> Result<(SocketAddr, JoinHandle<()>)> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/api/remove", post(fake_remove));

    let handle = tokio::spawn(async move {
        axum::serve(listener, app).await.ok();
    });
    Ok((addr, handle))
}

async fn fake_remove(mut multipart: Multipart) -> impl IntoResponse {
    let mut file = None;
    let mut model = None;
    while let Ok(Some(field)) = multipart.next_field().await {
        match field.name() {
            Some("file") => file = field.bytes().await.ok(),
            Some("model") => model = field.text().await.ok(),
            _ => {}
        }
    }

    if model.as_deref() != Some("u2net") {
        return (StatusCode::BAD_REQUEST, Vec::new());
    }
    let Some(image) = file.and_then(|bytes| image::load_from_memory(&bytes).ok()) else {
        return (StatusCode::BAD_REQUEST, Vec::new());
    };

    let mut rgba = image.into_rgba8();
    let half = rgba.width() / 2;
    for (x, _, px) in rgba.enumerate_pixels_mut() {
        if x >= half {
            px[3] = 0;
        }
    }
    (StatusCode::OK, png_bytes(&rgba))
}

/// In-memory object store for remote-backend tests
#[derive(Default)]
pub struct MemoryObjectStore {
    pub objects: Mutex<HashMap<String, Vec<u8>>>,
    pub refuse_public: bool,
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    fn bucket(&self) -> &str {
        "test-bucket"
    }

    async fn bucket_exists(&self) -> Result<bool, StorageError> {
        Ok(true)
    }

    async fn put_object(
        &self,
        key: &str,
        data: Vec<u8>,
        _content_type: &str,
    ) -> Result<(), StorageError> {
        self.objects
            .lock()
            .expect("lock")
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn make_public(&self, key: &str) -> Result<(), StorageError> {
        if self.refuse_public {
            return Err(StorageError::Status {
                status: 400,
                context: format!("PUT {}?acl", key),
            });
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://objects.example/test-bucket/{}", key)
    }

    async fn signed_url(&self, key: &str, expires: Duration) -> Result<String, StorageError> {
        Ok(format!(
            "https://objects.example/test-bucket/{}?X-Amz-Expires={}&X-Amz-Signature=deadbeef",
            key,
            expires.as_secs()
        ))
    }
}
