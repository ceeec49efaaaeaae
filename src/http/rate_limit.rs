//! Request budget shared by every call of a run
//!
//! Notion throttles an integration to an average of three requests per
//! second. A [`RequestBudget`] is a governor token bucket sized from the
//! tap's `requests_per_second`; clones share the bucket, so concurrent child
//! instances draw from the same allowance.

use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Average request rate Notion allows per integration
pub const NOTION_REQUESTS_PER_SECOND: u32 = 3;

/// Token bucket admitting `per_second` requests, bursting up to the same amount
#[derive(Clone)]
pub struct RequestBudget {
    bucket: Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>,
    per_second: NonZeroU32,
}

impl RequestBudget {
    /// Budget for the given rate, `None` when the rate is 0 (unthrottled)
    pub fn per_second(per_second: u32) -> Option<Self> {
        let per_second = NonZeroU32::new(per_second)?;
        Some(Self {
            bucket: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
            per_second,
        })
    }

    /// Wait for a token before issuing a request
    pub async fn acquire(&self) {
        self.bucket.until_ready().await;
    }
}

impl std::fmt::Debug for RequestBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RequestBudget")
            .field("per_second", &self.per_second)
            .finish_non_exhaustive()
    }
}
