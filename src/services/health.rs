use serde::Deserialize;
use tracing::{debug, warn};

#[derive(Debug, Deserialize)]
struct HealthResponse {
    status: String,
}

/// `GET {base_url}/health` answered with `{"status":"healthy"}`
pub async fn check_server_health(client: &reqwest::Client, base_url: &str) -> bool {
    let url = format!("{}/health", base_url.trim_end_matches('/'));

    let response = match client.get(&url).send().await {
        Ok(response) => response,
        Err(e) => {
            warn!("Health check against {} failed: {}", url, e);
            return false;
        }
    };

    if !response.status().is_success() {
        warn!("Health check against {} returned {}", url, response.status());
        return false;
    }

    match response.json::<HealthResponse>().await {
        Ok(health) => {
            debug!("Server status: {}", health.status);
            health.status == "healthy"
        }
        Err(e) => {
            warn!("Unexpected health response from {}: {}", url, e);
            false
        }
    }
}
