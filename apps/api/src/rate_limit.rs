//! Per-client request limits, one keyed limiter per operation class.

use std::net::IpAddr;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use governor::clock::{Clock, DefaultClock};
use governor::middleware::NoOpMiddleware;
use governor::state::keyed::DashMapStateStore;
use governor::{Quota, RateLimiter};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::errors::AppError;

type IpRateLimiter = RateLimiter<IpAddr, DashMapStateStore<IpAddr>, DefaultClock, NoOpMiddleware>;

/// Operation classes with their own per-minute budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bucket {
    Write,
    Batch,
    Search,
    Generate,
    ExternalParse,
}

/// Requests per minute, per client, for each bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub write_per_minute: u32,
    pub batch_per_minute: u32,
    pub search_per_minute: u32,
    pub generate_per_minute: u32,
    pub external_parse_per_minute: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            write_per_minute: 15,
            batch_per_minute: 5,
            search_per_minute: 10,
            generate_per_minute: 10,
            external_parse_per_minute: 5,
        }
    }
}

#[derive(Clone)]
pub struct RateLimits {
    write: Arc<IpRateLimiter>,
    batch: Arc<IpRateLimiter>,
    search: Arc<IpRateLimiter>,
    generate: Arc<IpRateLimiter>,
    external_parse: Arc<IpRateLimiter>,
}

fn per_minute(n: u32) -> Arc<IpRateLimiter> {
    let quota = Quota::per_minute(NonZeroU32::new(n).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::keyed(quota))
}

impl RateLimits {
    pub fn from_config(config: &RateLimitConfig) -> Self {
        Self {
            write: per_minute(config.write_per_minute),
            batch: per_minute(config.batch_per_minute),
            search: per_minute(config.search_per_minute),
            generate: per_minute(config.generate_per_minute),
            external_parse: per_minute(config.external_parse_per_minute),
        }
    }

    fn limiter(&self, bucket: Bucket) -> &IpRateLimiter {
        match bucket {
            Bucket::Write => &self.write,
            Bucket::Batch => &self.batch,
            Bucket::Search => &self.search,
            Bucket::Generate => &self.generate,
            Bucket::ExternalParse => &self.external_parse,
        }
    }

    fn limiters(&self) -> [&IpRateLimiter; 5] {
        [
            self.write.as_ref(),
            self.batch.as_ref(),
            self.search.as_ref(),
            self.generate.as_ref(),
            self.external_parse.as_ref(),
        ]
    }

    /// Drops per-client state whose budget has fully refilled.
    pub fn retain_recent(&self) {
        for limiter in self.limiters() {
            limiter.retain_recent();
            limiter.shrink_to_fit();
        }
    }

    /// Number of clients currently tracked across all buckets.
    pub fn tracked_clients(&self) -> usize {
        self.limiters().iter().map(|limiter| limiter.len()).sum()
    }

    /// Runs `retain_recent` every `period` until the runtime shuts down.
    pub fn spawn_cleanup(&self, period: Duration) -> JoinHandle<()> {
        let limits = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.tick().await;
            loop {
                interval.tick().await;
                limits.retain_recent();
                debug!(
                    "Rate limiter cleanup done, {} clients tracked",
                    limits.tracked_clients()
                );
            }
        })
    }

    /// Consumes one request from `client`'s budget for `bucket`.
    pub fn check(&self, bucket: Bucket, client: IpAddr) -> Result<(), AppError> {
        self.limiter(bucket).check_key(&client).map_err(|not_until| {
            let wait = not_until.wait_time_from(DefaultClock::default().now());
            warn!("Rate limit hit for {client} on {bucket:?}");
            AppError::RateLimited {
                retry_after_secs: Some(wait.as_secs().max(1)),
            }
        })
    }
}
