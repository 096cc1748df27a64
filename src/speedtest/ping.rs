use anyhow::{bail, Result};
use std::time::{Duration, Instant};

const PING_GAP: Duration = Duration::from_millis(100);

pub struct PingTest {
    samples: Vec<f64>,
    ping_count: usize,
}

impl PingTest {
    pub fn new(ping_count: usize) -> Self {
        Self {
            samples: Vec::with_capacity(ping_count),
            ping_count,
        }
    }

    /// Times `ping_count` empty downloads against `server`.
    pub async fn run(&mut self, client: &reqwest::Client, server: &str) -> Result<PingResult> {
        let url = format!("{}/__down?bytes=0", server);
        self.samples.clear();

        for i in 0..self.ping_count {
            let start = Instant::now();
            match client.get(&url).send().await {
                Ok(response) if response.status().is_success() => {
                    self.samples.push(start.elapsed().as_secs_f64() * 1000.0);
                }
                Ok(response) => {
                    tracing::debug!(status = %response.status(), "latency probe rejected");
                }
                Err(e) => tracing::debug!(error = %e, "latency probe failed"),
            }

            if i + 1 < self.ping_count {
                tokio::time::sleep(PING_GAP).await;
            }
        }

        if self.samples.is_empty() {
            bail!("no latency samples from {}", server);
        }
        Ok(self.calculate_result())
    }

    fn calculate_result(&self) -> PingResult {
        summarize(&self.samples)
    }
}

/// Mean and sample standard deviation of the round-trip times.
pub fn summarize(samples: &[f64]) -> PingResult {
    if samples.is_empty() {
        return PingResult { avg_ms: 0.0, jitter_ms: 0.0 };
    }

    let avg = samples.iter().sum::<f64>() / samples.len() as f64;
    let jitter = if samples.len() > 1 {
        let variance: f64 =
            samples.iter().map(|&x| (x - avg).powi(2)).sum::<f64>() / (samples.len() - 1) as f64;
        variance.sqrt()
    } else {
        0.0
    };

    PingResult { avg_ms: avg, jitter_ms: jitter }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PingResult {
    pub avg_ms: f64,
    pub jitter_ms: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_samples_summarize_to_zero() {
        assert_eq!(summarize(&[]), PingResult { avg_ms: 0.0, jitter_ms: 0.0 });
    }

    #[test]
    fn single_sample_has_no_jitter() {
        let r = summarize(&[12.5]);
        assert_eq!(r.avg_ms, 12.5);
        assert_eq!(r.jitter_ms, 0.0);
    }

    #[test]
    fn jitter_is_sample_std_dev() {
        let r = summarize(&[10.0, 20.0, 30.0]);
        assert_eq!(r.avg_ms, 20.0);
        assert!((r.jitter_ms - 10.0).abs() < 1e-9);
    }
}
