use anyhow::{anyhow, Context, Result};

use super::ping::PingTest;
use super::EndpointInfo;

/// Edge identity as reported by `/cdn-cgi/trace`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Trace {
    pub colo: String,
    pub loc: Option<String>,
}

/// Parses the `key=value` body of a trace response.
pub fn parse_trace(body: &str) -> Result<Trace> {
    let mut colo = None;
    let mut loc = None;

    for line in body.lines() {
        let Some((key, value)) = line.split_once('=') else {
            continue;
        };
        let value = value.trim();
        if value.is_empty() {
            continue;
        }
        match key.trim() {
            "colo" => colo = Some(value.to_string()),
            "loc" => loc = Some(value.to_string()),
            _ => {}
        }
    }

    let colo = colo.ok_or_else(|| anyhow!("no servers found"))?;
    Ok(Trace { colo, loc })
}

pub struct ServerDiscovery {
    client: reqwest::Client,
    server: String,
    ping_count: usize,
}

impl ServerDiscovery {
    pub fn new(client: reqwest::Client, server: &str, ping_count: usize) -> Self {
        Self {
            client,
            server: server.to_string(),
            ping_count,
        }
    }

    /// Asks the service which edge answered, then measures latency to it.
    pub async fn run(&self) -> Result<EndpointInfo> {
        let trace_url = format!("{}/cdn-cgi/trace", self.server);
        let body = self
            .client
            .get(&trace_url)
            .send()
            .await
            .context("error fetching servers")?
            .error_for_status()
            .context("error fetching servers")?
            .text()
            .await
            .context("error reading server trace")?;

        let trace = parse_trace(&body).context("error selecting server")?;
        tracing::info!(colo = %trace.colo, loc = ?trace.loc, "edge selected");

        let ping = PingTest::new(self.ping_count)
            .run(&self.client, &self.server)
            .await
            .context("error measuring latency")?;

        Ok(EndpointInfo {
            name: trace.colo,
            country: trace.loc.unwrap_or_else(|| "unknown".to_string()),
            latency_ms: ping.avg_ms,
            jitter_ms: ping.jitter_ms,
            url: self.server.clone(),
        })
    }
}
