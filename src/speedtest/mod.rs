pub mod discover;
pub mod download;
pub mod ping;
pub mod upload;

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use futures::future::BoxFuture;
use futures::FutureExt;

use crate::error::{Direction, ProbeError};
use crate::settings::Settings;
use discover::ServerDiscovery;
use download::DownloadTest;
use upload::UploadTest;

/// The test target chosen during discovery.
#[derive(Debug, Clone, PartialEq)]
pub struct EndpointInfo {
    pub name: String,
    pub country: String,
    pub latency_ms: f64,
    pub jitter_ms: f64,
    /// Base URL the measurements are sent to.
    pub url: String,
}

/// Transfer rate in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd)]
pub struct Throughput(f64);

impl Throughput {
    pub fn from_bytes_per_sec(bytes_per_sec: f64) -> Self {
        Throughput(bytes_per_sec.max(0.0))
    }

    pub fn from_transfer(bytes: u64, elapsed: Duration) -> Self {
        let secs = elapsed.as_secs_f64().max(1e-6);
        Throughput::from_bytes_per_sec(bytes as f64 / secs)
    }

    pub fn bytes_per_sec(self) -> f64 {
        self.0
    }

    pub fn mbps(self) -> f64 {
        self.0 * 8.0 / 1_000_000.0
    }
}

impl fmt::Display for Throughput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2} Mbps", self.mbps())
    }
}

/// The three blocking measurements the controller sequences.
///
/// Futures are `'static` and `Send` so each one can run on its own task
/// while the event loop keeps drawing.
pub trait Probe: Send + Sync + 'static {
    fn discover_endpoint(&self) -> BoxFuture<'static, Result<EndpointInfo, ProbeError>>;

    fn measure_download(
        &self,
        endpoint: &EndpointInfo,
    ) -> BoxFuture<'static, Result<Throughput, ProbeError>>;

    fn measure_upload(
        &self,
        endpoint: &EndpointInfo,
    ) -> BoxFuture<'static, Result<Throughput, ProbeError>>;
}

/// Probe backed by a Cloudflare-style speed service.
#[derive(Clone)]
pub struct HttpProbe {
    client: reqwest::Client,
    server: String,
    ping_count: usize,
    download_size: u64,
    upload_size: usize,
}

impl HttpProbe {
    pub fn new(settings: &Settings) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(settings.request_timeout)
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            client,
            server: settings.server.clone(),
            ping_count: settings.ping_count,
            download_size: settings.download_size_bytes(),
            upload_size: settings.upload_size_bytes(),
        })
    }
}

impl Probe for HttpProbe {
    fn discover_endpoint(&self) -> BoxFuture<'static, Result<EndpointInfo, ProbeError>> {
        let discovery = ServerDiscovery::new(self.client.clone(), &self.server, self.ping_count);
        async move { discovery.run().await.map_err(ProbeError::discovery) }.boxed()
    }

    fn measure_download(
        &self,
        endpoint: &EndpointInfo,
    ) -> BoxFuture<'static, Result<Throughput, ProbeError>> {
        let client = self.client.clone();
        let url = endpoint.url.clone();
        let size = self.download_size;
        async move {
            DownloadTest::new(size)
                .run(&client, &url)
                .await
                .map_err(|e| ProbeError::measurement(Direction::Download, e))
        }
        .boxed()
    }

    fn measure_upload(
        &self,
        endpoint: &EndpointInfo,
    ) -> BoxFuture<'static, Result<Throughput, ProbeError>> {
        let client = self.client.clone();
        let url = endpoint.url.clone();
        let size = self.upload_size;
        async move {
            let test = tokio::task::spawn_blocking(move || UploadTest::new(size))
                .await
                .map_err(|e| ProbeError::measurement(Direction::Upload, e.into()))?;
            test.run(&client, &url)
                .await
                .map_err(|e| ProbeError::measurement(Direction::Upload, e))
        }
        .boxed()
    }
}
