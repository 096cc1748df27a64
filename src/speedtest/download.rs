use anyhow::{bail, Context, Result};
use futures::StreamExt;
use std::time::Instant;

use super::Throughput;

pub struct DownloadTest {
    download_size: u64,
}

impl DownloadTest {
    pub fn new(download_size: u64) -> Self {
        Self { download_size }
    }

    /// Streams `download_size` bytes from `server` and times the transfer.
    pub async fn run(&self, client: &reqwest::Client, server: &str) -> Result<Throughput> {
        let url = format!("{}/__down?bytes={}", server, self.download_size);

        let start = Instant::now();
        let response = client
            .get(&url)
            .send()
            .await
            .context("download request failed")?
            .error_for_status()
            .context("download rejected")?;
        let mut stream = response.bytes_stream();

        let mut downloaded: u64 = 0;
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.context("download interrupted")?;
            downloaded += chunk.len() as u64;
        }

        if downloaded == 0 {
            bail!("server sent an empty body");
        }

        let elapsed = start.elapsed();
        tracing::info!(bytes = downloaded, secs = elapsed.as_secs_f64(), "download finished");
        Ok(Throughput::from_transfer(downloaded, elapsed))
    }
}
