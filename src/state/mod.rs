pub mod forecast_store;
pub mod price_source;

pub use forecast_store::{validate_paths, ForecastStore, MemoryForecastStore};
pub use price_source::RealizedPriceSource;
