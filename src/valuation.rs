//! Net present value of sequestered carbon.
//!
//! The net present value at year $Y$ values the total net sequestration up to
//! $Y$ at the discounted price of every year since the baseline $B$:
//!
//! $$ NPV_Y = S_Y \cdot \sum_{y=B}^{Y-1} \frac{p_y}{(1 + d)^{y - B}} $$
//!
//! Where:
//! - $S_Y$ is the net sequestration summed over every regime ending by $Y$
//! - $p_y$ is the carbon price in year $y$
//! - $d$ is the discount rate

use bluecarbon_core::errors::{CarbonError, CarbonResult};
use bluecarbon_core::Year;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Valuation {
    /// Discount rate as a fraction, e.g. `0.03`
    pub discount_rate: f64,
    /// unit: currency / Mg C
    pub prices: BTreeMap<Year, f64>,
}

impl Valuation {
    pub fn new(discount_rate: f64, prices: BTreeMap<Year, f64>) -> Self {
        Self {
            discount_rate,
            prices,
        }
    }

    /// Prices grown from `price` at the baseline by a constant inflation rate.
    pub fn with_inflation(
        discount_rate: f64,
        price: f64,
        inflation_rate: f64,
        baseline: Year,
        end: Year,
    ) -> Self {
        let prices = (baseline..end)
            .map(|year| {
                (
                    year,
                    price * (1.0 + inflation_rate).powi((year - baseline) as i32),
                )
            })
            .collect();
        Self::new(discount_rate, prices)
    }

    pub fn price(&self, year: Year) -> CarbonResult<f64> {
        self.prices
            .get(&year)
            .copied()
            .ok_or(CarbonError::MissingPrice(year))
    }

    /// Fail unless every year in `baseline..end` has a price.
    pub fn check_coverage(&self, baseline: Year, end: Year) -> CarbonResult<()> {
        (baseline..end).try_for_each(|year| self.price(year).map(|_| ()))
    }

    /// Discounted price summed over `baseline..year`.
    pub fn npv_factor(&self, baseline: Year, year: Year) -> CarbonResult<f64> {
        (baseline..year).try_fold(0.0, |total, y| {
            let discount = (1.0 + self.discount_rate).powi((y - baseline) as i32);
            Ok(total + self.price(y)? / discount)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn inflation_schedule() {
        let valuation = Valuation::with_inflation(0.0, 10.0, 0.1, 2000, 2003);
        assert_eq!(valuation.prices.len(), 3);
        assert_relative_eq!(valuation.price(2002).unwrap(), 12.1, max_relative = 1e-12);
        assert!(matches!(
            valuation.price(2003),
            Err(CarbonError::MissingPrice(2003))
        ));
    }

    #[test]
    fn npv_factor_discounts_each_year() {
        let prices = BTreeMap::from([(2000, 10.0), (2001, 11.0), (2002, 12.0)]);
        let valuation = Valuation::new(0.1, prices);

        assert_relative_eq!(valuation.npv_factor(2000, 2000).unwrap(), 0.0);
        assert_relative_eq!(valuation.npv_factor(2000, 2001).unwrap(), 10.0);
        assert_relative_eq!(
            valuation.npv_factor(2000, 2003).unwrap(),
            10.0 + 11.0 / 1.1 + 12.0 / 1.21,
            max_relative = 1e-12
        );
    }

    #[test]
    fn coverage_reports_first_missing_year() {
        let valuation = Valuation::new(0.0, BTreeMap::from([(2000, 1.0), (2002, 1.0)]));
        assert!(valuation.check_coverage(2000, 2001).is_ok());
        assert!(matches!(
            valuation.check_coverage(2000, 2003),
            Err(CarbonError::MissingPrice(2001))
        ));
    }
}
