use async_trait::async_trait;
use chrono::Utc;
use log::{error, info};
use rand::RngCore;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

use crate::error::{FlowError, Result};

const PING_ENDPOINTS: [&str; 2] = [
    "https://www.google.com/generate_204",
    "https://www.gstatic.com/generate_204",
];
const PING_SAMPLES: usize = 8;
const UPLOAD_PAYLOAD_BYTES: usize = 2 * 1024 * 1024;
const UPLOAD_RANDOM_PREFIX_BYTES: usize = 4096;

/// Four-tier connection quality, plus `Partial` when any measurement is
/// missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Rating {
    Excellent,
    Good,
    Fair,
    Poor,
    Partial,
}

impl Rating {
    pub fn label(&self) -> &'static str {
        match self {
            Rating::Excellent => "Excellent",
            Rating::Good => "Good",
            Rating::Fair => "Fair",
            Rating::Poor => "Poor",
            Rating::Partial => "Partial",
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeedTestResult {
    pub ping_ms: Option<u32>,
    pub download_mbps: Option<f64>,
    pub upload_mbps: Option<f64>,
    pub rating: Rating,
}

impl SpeedTestResult {
    pub fn from_measurements(
        ping_ms: Option<u32>,
        download_mbps: Option<f64>,
        upload_mbps: Option<f64>,
    ) -> Self {
        let rating = match (ping_ms, download_mbps, upload_mbps) {
            (Some(ping), Some(down), Some(up)) => rate(ping, down, up),
            _ => Rating::Partial,
        };
        SpeedTestResult {
            ping_ms,
            download_mbps,
            upload_mbps,
            rating,
        }
    }
}

/// Trimmed mean over round-trip samples: sort ascending, drop the single
/// lowest (slow-first-connection artifact) and the two highest (tail
/// outliers), average the rest. Needs at least four samples.
pub fn trimmed_mean_ms(samples: &[f64]) -> Option<u32> {
    if samples.len() < 4 {
        return None;
    }
    let mut sorted = samples.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
    let trimmed = &sorted[1..sorted.len() - 2];
    let mean = trimmed.iter().sum::<f64>() / trimmed.len() as f64;
    Some(mean.round() as u32)
}

/// Throughput in Mbps for a timed download. Ping is round-trip, so half of
/// it is removed from the timed window; the window never shrinks below 1 ms.
pub fn download_mbps(size_bytes: usize, total_ms: f64, ping_ms: f64) -> f64 {
    let transfer_ms = (total_ms - ping_ms / 2.0).max(1.0);
    let mbps = (size_bytes as f64 * 8.0) / (transfer_ms / 1000.0) / 1_000_000.0;
    (mbps * 100.0).round() / 100.0
}

pub fn rate(ping_ms: u32, download: f64, upload: f64) -> Rating {
    if download >= 5.0 && upload >= 1.0 && ping_ms <= 120 {
        Rating::Excellent
    } else if download >= 2.0 && upload >= 0.5 && ping_ms <= 250 {
        Rating::Good
    } else if download >= 1.0 && upload >= 0.3 {
        Rating::Fair
    } else {
        Rating::Poor
    }
}

/// Seam for the state machine; lets tests substitute canned results.
#[async_trait]
pub trait SpeedEstimator: Send + Sync {
    async fn run(&self) -> SpeedTestResult;
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    ok: bool,
    #[serde(default)]
    upload_mbps: Option<f64>,
    #[serde(default)]
    error: Option<String>,
}

/// Measures ping, download and upload against the speed-test backend.
/// Every measurement failure is non-fatal; the session continues with
/// partial results.
pub struct SpeedTester {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SpeedTester {
    pub fn new(supabase_url: &str, anon_key: &str) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_else(|_| Client::new());
        SpeedTester {
            client,
            base_url: format!("{}/functions/v1/speed-test", supabase_url),
            anon_key: anon_key.to_string(),
        }
    }

    async fn measure_ping(&self) -> Result<u32> {
        let mut samples = Vec::with_capacity(PING_SAMPLES);
        let cache_bust = Utc::now().timestamp_millis();
        for i in 0..PING_SAMPLES {
            let url = format!(
                "{}?_={}",
                PING_ENDPOINTS[i % PING_ENDPOINTS.len()],
                cache_bust + i as i64
            );
            let t0 = Instant::now();
            // A failed probe still yields a timing sample, as in the portal.
            let _ = self.client.get(&url).send().await;
            samples.push(t0.elapsed().as_secs_f64() * 1000.0);
        }
        trimmed_mean_ms(&samples)
            .ok_or_else(|| FlowError::SpeedTest("not enough ping samples".to_string()))
    }

    async fn measure_download(&self, ping_ms: f64) -> Result<f64> {
        let url = format!(
            "{}?action=download&_={}",
            self.base_url,
            Utc::now().timestamp_millis()
        );
        let t0 = Instant::now();
        let response = self
            .client
            .get(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .send()
            .await?;
        let body = response.text().await?;
        let total_ms = t0.elapsed().as_secs_f64() * 1000.0;

        if body.is_empty() {
            return Err(FlowError::SpeedTest(
                "Download test failed: empty response".to_string(),
            ));
        }
        Ok(download_mbps(body.len(), total_ms, ping_ms))
    }

    async fn measure_upload(&self) -> Result<f64> {
        let mut payload = vec![0u8; UPLOAD_PAYLOAD_BYTES];
        // Randomize the prefix so transparent compression cannot shrink it.
        rand::thread_rng().fill_bytes(&mut payload[..UPLOAD_RANDOM_PREFIX_BYTES]);

        let url = format!("{}?action=upload", self.base_url);
        let response = self
            .client
            .post(&url)
            .header("apikey", &self.anon_key)
            .bearer_auth(&self.anon_key)
            .header("Content-Type", "application/octet-stream")
            .body(payload)
            .send()
            .await?;
        let data: UploadResponse = response.json().await?;

        if !data.ok {
            return Err(FlowError::SpeedTest(format!(
                "Upload test failed: {}",
                data.error.unwrap_or_else(|| "unknown".to_string())
            )));
        }
        data.upload_mbps
            .ok_or_else(|| FlowError::SpeedTest("Upload test returned no throughput".to_string()))
    }
}

#[async_trait]
impl SpeedEstimator for SpeedTester {
    async fn run(&self) -> SpeedTestResult {
        info!("Measuring ping...");
        let ping = match self.measure_ping().await {
            Ok(ms) => Some(ms),
            Err(e) => {
                error!("Ping failed: {}", e);
                None
            }
        };

        info!("Measuring download speed...");
        let download = match self.measure_download(ping.unwrap_or(0) as f64).await {
            Ok(mbps) => Some(mbps),
            Err(e) => {
                error!("Download failed: {}", e);
                None
            }
        };

        info!("Measuring upload speed...");
        let upload = match self.measure_upload().await {
            Ok(mbps) => Some(mbps),
            Err(e) => {
                error!("Upload failed: {}", e);
                None
            }
        };

        let result = SpeedTestResult::from_measurements(ping, download, upload);
        info!(
            "Speed test complete: ping={:?}ms download={:?}Mbps upload={:?}Mbps rating={}",
            result.ping_ms, result.download_mbps, result.upload_mbps, result.rating
        );
        result
    }
}
