//! Per-client request throttling.
//!
//! Every client address owns a token bucket refilled at
//! `rate_limit_per_second` tokens per second and holding at most
//! `rate_limit_burst` tokens. The address is the first entry of
//! `X-Forwarded-For` when present, otherwise the peer address of the TCP
//! connection.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::num::NonZeroU32;
use std::sync::{Arc, Weak};
use std::time::Duration;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use governor::{DefaultKeyedRateLimiter, Quota, RateLimiter};
use log::*;

use crate::error::ErrorBody;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(5 * 60);
const RETRY_AFTER_SECS: &str = "60";

pub(crate) struct IpRateLimiter {
    limiter: DefaultKeyedRateLimiter<IpAddr>,
}

impl IpRateLimiter {
    /// A zero rate or burst is raised to one so the limiter is always valid.
    pub(crate) fn new(per_second: u32, burst: u32) -> Self {
        let per_second = NonZeroU32::new(per_second).unwrap_or(NonZeroU32::MIN);
        let burst = NonZeroU32::new(burst).unwrap_or(NonZeroU32::MIN);
        let quota = Quota::per_second(per_second).allow_burst(burst);

        Self {
            limiter: RateLimiter::keyed(quota),
        }
    }

    pub(crate) fn check(&self, ip: IpAddr) -> bool {
        self.limiter.check_key(&ip).is_ok()
    }

    /// Periodically forgets clients whose buckets have refilled. The task
    /// ends once the limiter itself is dropped.
    pub(crate) fn spawn_cleanup(self: &Arc<Self>) {
        let weak: Weak<Self> = Arc::downgrade(self);
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + CLEANUP_INTERVAL;
            let mut interval = tokio::time::interval_at(start, CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                let Some(limiter) = weak.upgrade() else {
                    break;
                };
                limiter.limiter.retain_recent();
                limiter.limiter.shrink_to_fit();
                trace!("Rate limiter tracks {} client(s)", limiter.limiter.len());
            }
        });
    }
}

pub(crate) async fn rate_limit(
    State(limiter): State<Arc<IpRateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let ip = client_ip(
        request.headers(),
        request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip()),
    );

    if limiter.check(ip) {
        return next.run(request).await;
    }

    warn!("Rate limit exceeded for {ip}");

    let mut response = (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ErrorBody::new(
            StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded. Please try again later.",
        )),
    )
        .into_response();
    response
        .headers_mut()
        .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
    response
}

fn client_ip(headers: &HeaderMap, peer: Option<IpAddr>) -> IpAddr {
    headers
        .get("x-forwarded-for")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(',').next())
        .and_then(|first| first.trim().parse::<IpAddr>().ok())
        .or(peer)
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}
