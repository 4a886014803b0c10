pub mod cache;
pub mod discog;
pub mod files;

pub use cache::{CacheError, CacheStats, MemCache};
pub use discog::{DiscogError, Discography, RescanSummary, ScanFailure};
