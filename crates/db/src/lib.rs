pub mod connection;
pub mod fixtures;
pub mod migrations;
pub mod quotations;
pub mod repositories;

pub use connection::{connect, DbPool};
pub use fixtures::{DemoDataset, SeedSummary};
pub use quotations::{
    NewQuotation, Pagination, QuotationError, QuotationFilter, QuotationPage, QuotationService,
    QuotationSummary, QuotationUpdate, QuotationView, StatusChange,
};
