//! Application-level readiness probing
//!
//! Engine-level readiness ("container reports running") lives on
//! `DockerManager::wait_running`; this module covers the HTTP flavor:
//! probe the site's public URL until it answers with anything below 500.
//! Timing out is an expected outcome, reported as `false`.

use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Per-probe request timeout, so one hung connect cannot consume the
/// whole deadline
const PROBE_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll `url` with HEAD requests until it looks ready or the deadline
/// passes. Local cert resolvers produce certificates the probe cannot
/// verify, so verification is disabled. Connection errors are retried.
pub async fn wait_for_site(url: &str, timeout: Duration, interval: Duration) -> bool {
    let client = match reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(PROBE_TIMEOUT)
        .build()
    {
        Ok(client) => client,
        Err(e) => {
            warn!(error = %e, "Failed to build readiness probe client");
            return false;
        }
    };

    let deadline = Instant::now() + timeout;
    loop {
        match client.head(url).send().await {
            Ok(response) if response.status().as_u16() < 500 => {
                debug!(url, status = %response.status(), "Site is ready");
                return true;
            }
            Ok(response) => {
                debug!(url, status = %response.status(), "Site not ready yet");
            }
            Err(e) => {
                debug!(url, error = %e, "Probe failed; retrying");
            }
        }
        if Instant::now() + interval > deadline {
            return false;
        }
        tokio::time::sleep(interval).await;
    }
}
