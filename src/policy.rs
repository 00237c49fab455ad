use std::collections::HashMap;

use serde::Serialize;

use crate::records::PolicyRow;

/// The product the caller is currently looking at, if any.
///
/// `All` disables policy lookup in aggregate views: rows there mix several
/// products, so no single product's tier applies.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub enum ProductFilter {
    All,
    Single(String),
}

impl ProductFilter {
    pub fn matches(&self, product: &str) -> bool {
        match self {
            ProductFilter::All => true,
            ProductFilter::Single(p) => p == product,
        }
    }
}

/// Tiered target markups, indexed by product. Read-only once built; share it
/// behind an `Arc` and swap the whole table on reload.
#[derive(Debug, Clone, Default)]
pub struct PolicyTable {
    /// (items threshold, target markup) per product, ascending by threshold.
    tiers: HashMap<String, Vec<(u64, f64)>>,
    rows: usize,
}

impl PolicyTable {
    pub fn new(rows: Vec<PolicyRow>) -> Self {
        let n = rows.len();
        let mut tiers: HashMap<String, Vec<(u64, f64)>> = HashMap::new();
        for row in rows {
            tiers.entry(row.product).or_default().push((row.items_threshold, row.target_markup));
        }
        for steps in tiers.values_mut() {
            // Stable: rows sharing a threshold keep their input order.
            steps.sort_by_key(|&(threshold, _)| threshold);
        }
        PolicyTable { tiers, rows: n }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    /// Target markup for `product` at volume `items`.
    ///
    /// Among the product's tiers whose threshold has been reached
    /// (threshold ≤ items), the one with the smallest threshold applies.
    /// `None` for an empty table, an unknown product, a volume below every
    /// threshold, or a non-finite volume.
    pub fn resolve(&self, product: &str, items: f64) -> Option<f64> {
        if !items.is_finite() {
            return None;
        }
        self.tiers
            .get(product)?
            .iter()
            .filter(|&&(threshold, _)| threshold as f64 <= items)
            .min_by_key(|&&(threshold, _)| threshold)
            .map(|&(_, target)| target)
    }

    /// Resolution for single-product views: `ProductFilter::All` yields `None`.
    pub fn resolve_for_filtered_product(&self, items: f64, filter: &ProductFilter) -> Option<f64> {
        match filter {
            ProductFilter::All => None,
            ProductFilter::Single(product) => self.resolve(product, items),
        }
    }
}
