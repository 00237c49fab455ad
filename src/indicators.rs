use serde::Serialize;

use crate::records::Record;

/// Non-claims fixed cost load baked into the markup formula.
pub const FIXED_LOAD_FACTOR: f64 = 0.0615;

/// The four summable quantities of a book. Floating point throughout because
/// monthly averaging makes service orders and items fractional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Measures {
    pub revenue: f64,
    pub expense: f64,
    pub service_orders: f64,
    pub items: f64,
}

impl Measures {
    pub fn add(&mut self, other: &Measures) {
        self.revenue += other.revenue;
        self.expense += other.expense;
        self.service_orders += other.service_orders;
        self.items += other.items;
    }

    /// Divide every measure by `divisor`. `None` when there is nothing to
    /// divide by (no periods matched), so the caller reports "no data"
    /// instead of dividing by zero.
    pub fn per(&self, divisor: usize) -> Option<Measures> {
        if divisor == 0 {
            return None;
        }
        let d = divisor as f64;
        Some(Measures {
            revenue: self.revenue / d,
            expense: self.expense / d,
            service_orders: self.service_orders / d,
            items: self.items / d,
        })
    }
}

impl From<&Record> for Measures {
    fn from(r: &Record) -> Self {
        Measures {
            revenue: r.revenue,
            expense: r.expense,
            service_orders: r.service_orders as f64,
            items: r.items as f64,
        }
    }
}

/// Derived pricing indicators. Every field is `None` where its denominator is
/// zero; undefined values are never coerced to zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct IndicatorSet {
    /// Expense / revenue (sinistralidade).
    pub claims_ratio: Option<f64>,
    /// Annualised service orders per item.
    pub frequency: Option<f64>,
    pub markup: Option<f64>,
}

fn ratio(numerator: f64, denominator: f64) -> Option<f64> {
    if denominator == 0.0 {
        return None;
    }
    let r = numerator / denominator;
    r.is_finite().then_some(r)
}

/// (1 − load) / claims ratio; undefined for a zero or missing claims ratio.
pub fn markup_from_claims_ratio(claims_ratio: Option<f64>) -> Option<f64> {
    claims_ratio.and_then(|cr| ratio(1.0 - FIXED_LOAD_FACTOR, cr))
}

impl IndicatorSet {
    /// Pure in `m`: recomputing on the same measures gives the same result.
    pub fn from_measures(m: &Measures) -> Self {
        let claims_ratio = ratio(m.expense, m.revenue);
        IndicatorSet {
            claims_ratio,
            frequency: ratio(m.service_orders * 12.0, m.items),
            markup: markup_from_claims_ratio(claims_ratio),
        }
    }
}
