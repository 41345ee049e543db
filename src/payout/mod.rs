mod record;
mod store;

pub use record::{
    CalculationBasis, Page, Pagination, PaymentMethod, PayoutRecord, PayoutStatus, StatusUpdate,
};
pub use store::{AggregateState, FetchReport, FetchTicket, PageSource, PayoutStore, StatusTally};
