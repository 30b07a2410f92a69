use std::time::Duration;

use tracing::{debug, warn};

use crate::common::bypass_tunnel_warning;

/// How long to wait, after `process_image` answers, before the published
/// result images are assumed to be on disk.
///
/// The remote service sends no "images ready" signal. `FixedDelay` sleeps for
/// a heuristic interval; `Poll` fetches every result URL until all of them
/// answer with a success status. Neither one is a guarantee: running out of
/// poll attempts only logs a warning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleStrategy {
    FixedDelay(Duration),
    Poll { interval: Duration, attempts: u32 },
}

impl Default for SettleStrategy {
    fn default() -> Self {
        SettleStrategy::FixedDelay(Duration::from_millis(1500))
    }
}

impl SettleStrategy {
    pub async fn settle(&self, http: &reqwest::Client, urls: &[&str]) {
        match *self {
            SettleStrategy::FixedDelay(delay) => {
                debug!("Waiting {:?} for result images to settle", delay);
                tokio::time::sleep(delay).await;
            }
            SettleStrategy::Poll { interval, attempts } => {
                for attempt in 1..=attempts {
                    if all_ready(http, urls).await {
                        debug!("Result images ready after {} attempt(s)", attempt);
                        return;
                    }
                    tokio::time::sleep(interval).await;
                }
                warn!(
                    "Result images not confirmed ready after {} attempts, continuing",
                    attempts
                );
            }
        }
    }
}

async fn all_ready(http: &reqwest::Client, urls: &[&str]) -> bool {
    for url in urls {
        match bypass_tunnel_warning(http.get(*url)).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => {
                debug!("Result image {} not ready: {}", url, response.status());
                return false;
            }
            Err(e) => {
                debug!("Result image {} not reachable: {}", url, e);
                return false;
            }
        }
    }
    true
}
