use anyhow::{Context, Result};
use rand::{RngCore, SeedableRng};
use std::time::Instant;

use super::Throughput;

const CHUNK_SIZE: usize = 1_000_000; // 1MB chunks

pub struct UploadTest {
    data: Vec<u8>,
}

impl UploadTest {
    pub fn new(upload_size: usize) -> Self {
        let mut rng = rand::rngs::StdRng::from_entropy();
        let mut data = vec![0u8; upload_size];
        rng.fill_bytes(&mut data);
        Self { data }
    }

    pub async fn run(&self, client: &reqwest::Client, server: &str) -> Result<Throughput> {
        let url = format!("{}/__up", server);

        let start = Instant::now();
        let mut uploaded: u64 = 0;

        for chunk in self.data.chunks(CHUNK_SIZE) {
            client
                .post(&url)
                .body(chunk.to_vec())
                .send()
                .await
                .context("upload request failed")?
                .error_for_status()
                .context("upload rejected")?;
            uploaded += chunk.len() as u64;
        }

        let elapsed = start.elapsed();
        tracing::info!(bytes = uploaded, secs = elapsed.as_secs_f64(), "upload finished");
        Ok(Throughput::from_transfer(uploaded, elapsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Reads headers plus `content-length` bytes of body.
    async fn read_request(socket: &mut TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let head = String::from_utf8_lossy(&data[..end]).to_lowercase();
                let body_len = head
                    .lines()
                    .find_map(|l| l.strip_prefix("content-length:"))
                    .and_then(|v| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    #[test]
    fn payload_has_requested_size() {
        let test = UploadTest::new(3 * CHUNK_SIZE + 17);
        assert_eq!(test.data.len(), 3 * CHUNK_SIZE + 17);
        assert_eq!(test.data.chunks(CHUNK_SIZE).count(), 4);
    }

    #[test]
    fn payload_is_not_all_zeroes() {
        let test = UploadTest::new(4096);
        assert!(test.data.iter().any(|&b| b != 0));
    }

    #[tokio::test]
    async fn server_error_is_reported_as_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let _ = socket
                .write_all(b"HTTP/1.1 503 Service Unavailable\r\ncontent-length: 0\r\nconnection: close\r\n\r\n")
                .await;
        });
        let client = reqwest::Client::builder().no_proxy().build().unwrap();

        let err = UploadTest::new(16)
            .run(&client, &format!("http://{}", addr))
            .await
            .unwrap_err();
        let report = format!("{:#}", err);
        assert!(report.starts_with("upload rejected: "), "{report}");
        assert!(report.contains("503"), "{report}");
    }
}
