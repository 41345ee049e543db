pub mod cache;
pub mod config;
pub mod error;
pub mod payout;
pub mod remote;

pub use cache::{CacheStore, FileCache, MemoryCache, PAYOUTS_CACHE_KEY};
pub use config::{ApiSettings, Config};
pub use error::{PayoutError, Result};
pub use payout::{
    AggregateState, FetchReport, Page, Pagination, PaymentMethod, PayoutRecord, PayoutStatus,
    PayoutStore, StatusUpdate,
};
pub use remote::{HttpSource, Outcome, RemoteSource};
