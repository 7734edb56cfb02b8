use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::product::ProductId;
use crate::errors::DomainError;

/// Tax rate applied to every quotation line, regardless of the product's
/// own `tax_percentage`. 19% IVA.
pub const FIXED_TAX_RATE: Decimal = Decimal::from_parts(19, 0, 0, false, 2);

/// One requested line before pricing: what the caller sends.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRequest {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
}

/// A priced line: the request plus its computed amounts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricedLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
    pub line_tax: Decimal,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingOutcome {
    pub lines: Vec<PricedLine>,
    pub total: Decimal,
    pub total_tax: Decimal,
}

/// Price an ordered list of line requests. Pure: no rounding is applied
/// here, amounts stay at full decimal precision until the display layer.
pub fn price_lines(requests: &[LineRequest]) -> Result<PricingOutcome, DomainError> {
    if requests.is_empty() {
        return Err(DomainError::Validation(
            "a quotation requires at least one line item".to_string(),
        ));
    }

    let mut lines = Vec::with_capacity(requests.len());
    let mut total = Decimal::ZERO;
    let mut total_tax = Decimal::ZERO;

    for request in requests {
        if request.quantity == 0 {
            return Err(DomainError::Validation(
                "line quantity must be a positive integer".to_string(),
            ));
        }
        if request.unit_price <= Decimal::ZERO {
            return Err(DomainError::Validation("line unit price must be positive".to_string()));
        }

        let subtotal = request.unit_price * Decimal::from(request.quantity);
        let line_tax = subtotal * FIXED_TAX_RATE;
        total += subtotal;
        total_tax += line_tax;

        lines.push(PricedLine {
            product_id: request.product_id,
            quantity: request.quantity,
            unit_price: request.unit_price,
            subtotal,
            line_tax,
        });
    }

    Ok(PricingOutcome { lines, total, total_tax })
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use uuid::Uuid;

    use super::{price_lines, LineRequest, FIXED_TAX_RATE};
    use crate::domain::product::ProductId;
    use crate::errors::DomainError;

    fn line(quantity: u32, unit_price: Decimal) -> LineRequest {
        LineRequest { product_id: ProductId(Uuid::new_v4()), quantity, unit_price }
    }

    #[test]
    fn fixed_rate_is_nineteen_percent() {
        assert_eq!(FIXED_TAX_RATE, Decimal::new(19, 2));
    }

    #[test]
    fn prices_the_reference_scenario_exactly() {
        // qty=2 @ 100 plus qty=1 @ 50 -> total 250, tax 47.5
        let outcome = price_lines(&[
            line(2, Decimal::new(100, 0)),
            line(1, Decimal::new(50, 0)),
        ])
        .expect("pricing should succeed");

        assert_eq!(outcome.total, Decimal::new(250, 0));
        assert_eq!(outcome.total_tax, Decimal::new(475, 1));
        assert_eq!(outcome.lines[0].subtotal, Decimal::new(200, 0));
        assert_eq!(outcome.lines[0].line_tax, Decimal::new(38, 0));
        assert_eq!(outcome.lines[1].subtotal, Decimal::new(50, 0));
        assert_eq!(outcome.lines[1].line_tax, Decimal::new(95, 1));
    }

    #[test]
    fn aggregates_equal_line_sums() {
        let outcome = price_lines(&[
            line(3, Decimal::new(19_990, 2)),
            line(7, Decimal::new(1_245, 2)),
            line(1, Decimal::new(999_999, 2)),
        ])
        .expect("pricing should succeed");

        let subtotal_sum: Decimal = outcome.lines.iter().map(|l| l.subtotal).sum();
        let tax_sum: Decimal = outcome.lines.iter().map(|l| l.line_tax).sum();
        assert_eq!(outcome.total, subtotal_sum);
        assert_eq!(outcome.total_tax, tax_sum);
        for priced in &outcome.lines {
            assert_eq!(priced.line_tax, priced.subtotal * FIXED_TAX_RATE);
        }
    }

    #[test]
    fn rejects_empty_line_lists() {
        let error = price_lines(&[]).expect_err("empty list should fail");
        assert!(matches!(error, DomainError::Validation(_)));
    }

    #[test]
    fn rejects_zero_quantity_and_non_positive_prices() {
        let zero_quantity = price_lines(&[line(0, Decimal::new(100, 0))]);
        assert!(matches!(zero_quantity, Err(DomainError::Validation(_))));

        let zero_price = price_lines(&[line(1, Decimal::ZERO)]);
        assert!(matches!(zero_price, Err(DomainError::Validation(_))));

        let negative_price = price_lines(&[line(1, Decimal::new(-500, 2))]);
        assert!(matches!(negative_price, Err(DomainError::Validation(_))));
    }

    #[test]
    fn keeps_full_precision_without_rounding() {
        let outcome =
            price_lines(&[line(3, Decimal::new(333, 2))]).expect("pricing should succeed");
        // 9.99 * 0.19 = 1.8981, untouched by any rounding policy.
        assert_eq!(outcome.total, Decimal::new(999, 2));
        assert_eq!(outcome.total_tax, Decimal::new(18_981, 4));
    }
}
