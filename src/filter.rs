use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::records::Record;
use crate::types::Period;

/// Allowed values per dimension. An empty set means "no restriction".
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Filters {
    pub insurers: BTreeSet<String>,
    pub products: BTreeSet<String>,
    pub segments: BTreeSet<String>,
    /// Matches the normalised `is_new_product` label; records with no flag
    /// only pass when this set is empty.
    pub new_product: BTreeSet<String>,
    pub periods: BTreeSet<Period>,
}

fn admits(allowed: &BTreeSet<String>, value: &str) -> bool {
    allowed.is_empty() || allowed.contains(value)
}

impl Filters {
    pub fn is_unrestricted(&self) -> bool {
        self.insurers.is_empty()
            && self.products.is_empty()
            && self.segments.is_empty()
            && self.new_product.is_empty()
            && self.periods.is_empty()
    }

    pub fn matches(&self, r: &Record) -> bool {
        admits(&self.insurers, r.insurer.as_str())
            && admits(&self.products, r.product.as_str())
            && admits(&self.segments, r.segment.as_str())
            && match &r.is_new_product {
                Some(flag) => admits(&self.new_product, flag.as_str()),
                None => self.new_product.is_empty(),
            }
            && (self.periods.is_empty() || self.periods.contains(&r.reference_month))
    }

    pub fn apply<'a>(&self, records: &'a [Record]) -> Vec<&'a Record> {
        records.iter().filter(|r| self.matches(r)).collect()
    }
}
