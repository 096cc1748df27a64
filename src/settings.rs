use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

pub const DEFAULT_SERVER: &str = "https://speed.cloudflare.com";

#[derive(Debug, Parser)]
#[command(name = "speedrun", version, about = "Measure latency, download and upload speed")]
pub struct Cli {
    /// Base URL of the speed test service
    #[arg(long, default_value = DEFAULT_SERVER)]
    pub server: String,

    /// Number of latency samples taken during server discovery
    #[arg(long, default_value_t = 10)]
    pub ping_count: usize,

    /// Download payload size in MB
    #[arg(long = "download-mb", default_value_t = 25)]
    pub download_mb: u64,

    /// Upload payload size in MB
    #[arg(long = "upload-mb", default_value_t = 10)]
    pub upload_mb: u64,

    /// Spinner frame interval in milliseconds
    #[arg(long, default_value_t = 80)]
    pub tick_ms: u64,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 60)]
    pub timeout_secs: u64,

    /// Hide the measured latency next to the server name
    #[arg(long)]
    pub no_latency: bool,

    /// Write diagnostic logs to this file
    #[arg(long)]
    pub log_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: String,
    pub ping_count: usize,
    pub download_size_mb: u64,
    pub upload_size_mb: u64,
    pub tick_interval: Duration,
    pub request_timeout: Duration,
    pub show_latency: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: DEFAULT_SERVER.to_string(),
            ping_count: 10,
            download_size_mb: 25,
            upload_size_mb: 10,
            tick_interval: Duration::from_millis(80),
            request_timeout: Duration::from_secs(60),
            show_latency: true,
        }
    }
}

impl Settings {
    pub fn download_size_bytes(&self) -> u64 {
        self.download_size_mb * 1_000_000
    }

    pub fn upload_size_bytes(&self) -> usize {
        (self.upload_size_mb * 1_000_000) as usize
    }

    /// Pulls every value back inside the range the probes can handle.
    pub fn clamped(mut self) -> Self {
        self.ping_count = self.ping_count.clamp(1, 100);
        self.download_size_mb = self.download_size_mb.clamp(1, 500);
        self.upload_size_mb = self.upload_size_mb.clamp(1, 250);
        self.tick_interval = self
            .tick_interval
            .clamp(Duration::from_millis(20), Duration::from_millis(1000));
        self.request_timeout = self.request_timeout.max(Duration::from_secs(1));
        self.server = self.server.trim_end_matches('/').to_string();
        self
    }
}

impl From<&Cli> for Settings {
    fn from(cli: &Cli) -> Self {
        Settings {
            server: cli.server.clone(),
            ping_count: cli.ping_count,
            download_size_mb: cli.download_mb,
            upload_size_mb: cli.upload_mb,
            tick_interval: Duration::from_millis(cli.tick_ms),
            request_timeout: Duration::from_secs(cli.timeout_secs),
            show_latency: !cli.no_latency,
        }
        .clamped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_defaults_match_settings_defaults() {
        let cli = Cli::parse_from(["speedrun"]);
        let settings = Settings::from(&cli);
        let defaults = Settings::default();

        assert_eq!(settings.server, defaults.server);
        assert_eq!(settings.ping_count, defaults.ping_count);
        assert_eq!(settings.download_size_mb, defaults.download_size_mb);
        assert_eq!(settings.upload_size_mb, defaults.upload_size_mb);
        assert_eq!(settings.tick_interval, defaults.tick_interval);
        assert!(settings.show_latency);
        assert!(cli.log_file.is_none());
    }

    #[test]
    fn out_of_range_values_are_clamped() {
        let cli = Cli::parse_from([
            "speedrun",
            "--ping-count",
            "0",
            "--download-mb",
            "9000",
            "--upload-mb",
            "0",
            "--tick-ms",
            "1",
            "--server",
            "http://localhost:8080/",
            "--no-latency",
        ]);
        let settings = Settings::from(&cli);

        assert_eq!(settings.ping_count, 1);
        assert_eq!(settings.download_size_mb, 500);
        assert_eq!(settings.upload_size_mb, 1);
        assert_eq!(settings.tick_interval, Duration::from_millis(20));
        assert_eq!(settings.server, "http://localhost:8080");
        assert!(!settings.show_latency);
    }

    #[test]
    fn byte_sizes_use_decimal_megabytes() {
        let settings = Settings::default();
        assert_eq!(settings.download_size_bytes(), 25_000_000);
        assert_eq!(settings.upload_size_bytes(), 10_000_000);
    }
}
