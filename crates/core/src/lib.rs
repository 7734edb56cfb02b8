pub mod config;
pub mod domain;
pub mod errors;
pub mod numbering;
pub mod pricing;

pub use domain::client::{Client, ClientId};
pub use domain::company::CompanyId;
pub use domain::product::{Product, ProductId};
pub use domain::quotation::{
    Quotation, QuotationDetail, QuotationHistory, QuotationId, QuotationStatus,
};
pub use domain::user::{Principal, User, UserId, UserRole};
pub use errors::DomainError;
pub use pricing::{LineRequest, PricedLine, PricingOutcome, FIXED_TAX_RATE};
