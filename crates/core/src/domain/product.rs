use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::company::CompanyId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProductId(pub Uuid);

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub company_id: CompanyId,
    pub name: String,
    pub sku: String,
    pub price: Decimal,
    /// Informational only. Quotation totals always apply the fixed rate in
    /// `pricing::FIXED_TAX_RATE`, not this field.
    pub tax_percentage: Decimal,
}
