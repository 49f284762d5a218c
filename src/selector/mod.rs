pub mod horizon;

pub use horizon::{horizon_end, select_eligible, SelectionPolicy};
