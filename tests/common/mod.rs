//! Common test utilities - ImgdTest harness for end-to-end testing

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use image::{DynamicImage, RgbImage};
use imgd::images::{encode, ImageKind};
use imgd::{Config, Server};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use tempfile::TempDir;
use tokio::task::JoinHandle;

/// Test harness that spawns a real imgd server on a random port
/// with its own temporary storage root
pub struct ImgdTest {
    pub addr: SocketAddr,
    pub client: Client,
    server: Arc<Server>,
    _handle: JoinHandle<()>,
    _temp_dir: TempDir,
}

impl ImgdTest {
    /// Start a new test server instance
    pub async fn start() -> Result<Self> {
        Self::start_with(Config::default()).await
    }

    /// Start a test server from a base config; bind address and root are
    /// always replaced with test-local values
    pub async fn start_with(base: Config) -> Result<Self> {
        let temp_dir = TempDir::new()?;

        // Find a random available port
        let listener = std::net::TcpListener::bind("127.0.0.1:0")?;
        let bind_addr = listener.local_addr()?;
        drop(listener);

        let config = Config {
            bind_addr,
            root: Some(temp_dir.path().join("images")),
            ..base
        };

        let server = Arc::new(Server::new(config).await?);
        let addr = server.bind_addr();
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
                .get(format!("http://{}/health", addr))
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
            _temp_dir: temp_dir,
        })
    }

    /// Get the base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Storage root of this instance
    pub fn image_root(&self) -> &Path {
        self.server.image_root()
    }

    /// On-disk path for a stored identifier
    pub fn stored_path(&self, name: &str) -> PathBuf {
        self.image_root().join(&name[..2]).join(name)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<reqwest::Response> {
        Ok(self
            .client
            .get(format!("{}{}", self.base_url(), path))
            .send()
            .await?)
    }

    /// Fetch an image by identifier with extra query params (`&s=..&q=..`)
    pub async fn get_image(&self, name: &str, extra: &str) -> Result<reqwest::Response> {
        self.get(&format!("/?n={}{}", name, extra)).await
    }

    /// Upload bytes as the `image` multipart field
    pub async fn upload(&self, filename: Option<&str>, data: Vec<u8>) -> Result<reqwest::Response> {
        let mut part = Part::bytes(data);
        if let Some(name) = filename {
            part = part.file_name(name.to_string());
        }
        self.upload_form(Form::new().part("image", part)).await
    }

    /// Upload an arbitrary multipart form
    pub async fn upload_form(&self, form: Form) -> Result<reqwest::Response> {
        Ok(self
            .client
            .post(format!("{}/", self.base_url()))
            .multipart(form)
            .send()
            .await?)
    }

    /// Upload and return the stored identifier, asserting success
    pub async fn upload_ok(&self, filename: &str, data: Vec<u8>) -> Result<String> {
        let resp = self.upload(Some(filename), data).await?;
        anyhow::ensure!(resp.status() == 200, "upload failed: {}", resp.status());

        let body: serde_json::Value = resp.json().await?;
        anyhow::ensure!(body["success"] == true, "upload failed: {}", body);
        body["name"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| anyhow::anyhow!("missing name in {}", body))
    }

    /// Shutdown the server gracefully
    pub fn shutdown(&self) {
        self.server.shutdown();
    }
}

impl Drop for ImgdTest {
    fn drop(&mut self) {
        self.server.shutdown();
    }
}

/// Encode a patterned test image of the given size and kind
pub fn sample_image(width: u32, height: u32, kind: ImageKind) -> Vec<u8> {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([
            (x * 255 / width.max(1)) as u8,
            (y * 255 / height.max(1)) as u8,
            ((x * 31 + y * 17) % 256) as u8,
        ])
    });
    encode(&DynamicImage::ImageRgb8(img), kind, 95).expect("Failed to encode sample image")
}

/// Decode response bytes and return their dimensions
pub fn dimensions(data: &[u8]) -> (u32, u32) {
    let img = image::load_from_memory(data).expect("Failed to decode response image");
    (img.width(), img.height())
}
