#[cfg(feature = "browser")]
pub mod browser_tier;
pub mod http_tier;
pub mod records;

#[cfg(feature = "browser")]
pub use browser_tier::BrowserTier;
pub use http_tier::HttpTier;
pub use records::{PatentRecords, extract_br_numbers, extract_records, extract_wo_numbers};
