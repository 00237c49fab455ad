use std::collections::BTreeSet;

use chrono::NaiveDate;

use crate::filter::Filters;
use crate::forecast::{GroupBy, Metric};
use crate::policy::ProductFilter;
use crate::types::{Granularity, Period};

/// Selections driving one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisConfig {
    /// Detailed view and forecast input.
    pub filters: Filters,
    /// Timeline view: insurers to include (empty = all).
    pub timeline_insurers: BTreeSet<String>,
    pub timeline_product: ProductFilter,
    pub granularity: Granularity,
    pub forecast_periods: u32,
    pub forecast_metric: Metric,
    /// `None` picks the dimension the filters are narrowing on.
    pub forecast_group_by: Option<GroupBy>,
}

impl AnalysisConfig {
    pub fn canonical() -> Self {
        AnalysisConfig {
            filters: Filters::default(),
            timeline_insurers: BTreeSet::new(),
            timeline_product: ProductFilter::Single("Geral".to_string()),
            granularity: Granularity::Month,
            forecast_periods: 3,
            forecast_metric: Metric::Markup,
            forecast_group_by: None,
        }
    }

    /// Colour the trend by insurer when the caller narrowed insurers but not
    /// products; by product otherwise.
    pub fn effective_group_by(&self) -> GroupBy {
        self.forecast_group_by.unwrap_or(
            if !self.filters.insurers.is_empty() && self.filters.products.is_empty() {
                GroupBy::Insurer
            } else {
                GroupBy::Product
            },
        )
    }
}

/// One product line of the synthetic book.
#[derive(Debug, Clone)]
pub struct ProductConfig {
    pub name: &'static str,
    pub segment: &'static str,
    pub is_new: bool,
    /// Month index (0-based) the product starts reporting. The launch month
    /// carries claims but no premium yet.
    pub launch_month: u32,
    /// Mean insured items per insurer at the start of the book.
    pub base_items: f64,
    /// Monthly premium per item.
    pub premium_per_item: f64,
    /// Expected claims ratio in month 0 and its drift per month.
    pub claims_ratio: f64,
    pub claims_ratio_drift: f64,
    /// Annual service orders per item.
    pub frequency: f64,
}

#[derive(Debug, Clone)]
pub struct InsurerConfig {
    pub name: &'static str,
    /// Multiplier on every product's item count.
    pub scale: f64,
}

/// (product, items threshold, target markup).
pub type PolicyTier = (&'static str, u64, f64);

#[derive(Debug, Clone)]
pub struct SynthConfig {
    pub seed: u64,
    pub start: Period,
    pub months: u32,
    pub insurers: Vec<InsurerConfig>,
    pub products: Vec<ProductConfig>,
    /// Monthly noise (std dev of the claims ratio around its trend).
    pub claims_ratio_sd: f64,
    pub policy: Vec<PolicyTier>,
}

impl SynthConfig {
    pub fn canonical() -> Self {
        SynthConfig {
            seed: 42,
            start: Period::from_date(NaiveDate::from_ymd_opt(2023, 1, 1).unwrap_or_default()),
            months: 24,
            insurers: vec![
                InsurerConfig { name: "Alfa Seguros", scale: 1.0 },
                InsurerConfig { name: "Beta Seguradora", scale: 0.6 },
                InsurerConfig { name: "Gama Vida", scale: 0.3 },
            ],
            products: vec![
                ProductConfig {
                    name: "Geral",
                    segment: "Residencial",
                    is_new: false,
                    launch_month: 0,
                    base_items: 12_000.0,
                    premium_per_item: 9.5,
                    claims_ratio: 0.55,
                    claims_ratio_drift: 0.002,
                    frequency: 0.35,
                },
                ProductConfig {
                    name: "Auto Assist",
                    segment: "Automóvel",
                    is_new: false,
                    launch_month: 0,
                    base_items: 30_000.0,
                    premium_per_item: 4.2,
                    claims_ratio: 0.70,
                    claims_ratio_drift: -0.001,
                    frequency: 0.60,
                },
                ProductConfig {
                    name: "Pet",
                    segment: "Residencial",
                    is_new: true,
                    launch_month: 9,
                    base_items: 1_500.0,
                    premium_per_item: 6.0,
                    claims_ratio: 0.40,
                    claims_ratio_drift: 0.01,
                    frequency: 0.90,
                },
            ],
            claims_ratio_sd: 0.04,
            policy: vec![
                ("Geral", 0, 1.9),
                ("Geral", 5_000, 1.7),
                ("Geral", 10_000, 1.5),
                ("Auto Assist", 1_000, 1.35),
                ("Auto Assist", 20_000, 1.25),
                ("Pet", 100, 2.2),
            ],
        }
    }
}
