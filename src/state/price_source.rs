use async_trait::async_trait;

use crate::error::Result;
use crate::types::{PricePath, Timestamp};

/// Observed market prices, supplied by the price observation process.
#[async_trait]
pub trait RealizedPriceSource: Send + Sync {
    /// The realized price at every timestamp in `times`, in the same order.
    /// Fails with `PriceUnavailable` if any timestamp has no observation yet.
    async fn realized_path(&self, asset: &str, times: &[Timestamp]) -> Result<PricePath>;
}
