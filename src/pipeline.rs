//! Grouping, period normalisation and the indicator → policy → deviation
//! sequence that turns filtered records into report rows.

use std::collections::{BTreeMap, BTreeSet};

use serde::Serialize;
use tracing::debug;

use crate::deviation::DeviationClass;
use crate::filter::Filters;
use crate::indicators::{IndicatorSet, Measures};
use crate::policy::{PolicyTable, ProductFilter};
use crate::records::Record;
use crate::types::{Dimension, Granularity, Period};

/// Grouping of the detailed per-entity view.
pub const DETAIL_DIMENSIONS: [Dimension; 4] =
    [Dimension::Insurer, Dimension::Product, Dimension::Segment, Dimension::IsNewProduct];

/// Values of the grouped dimensions; dimensions not grouped on stay `None`.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct GroupKey {
    pub insurer: Option<String>,
    pub product: Option<String>,
    pub segment: Option<String>,
    pub is_new_product: Option<String>,
    pub period: Option<Period>,
}

impl GroupKey {
    /// Keep only `dims`, truncating the period to `granularity`.
    fn project(&self, dims: &[Dimension], granularity: Granularity) -> GroupKey {
        let keep = |d: Dimension| dims.contains(&d);
        GroupKey {
            insurer: self.insurer.clone().filter(|_| keep(Dimension::Insurer)),
            product: self.product.clone().filter(|_| keep(Dimension::Product)),
            segment: self.segment.clone().filter(|_| keep(Dimension::Segment)),
            is_new_product: self.is_new_product.clone().filter(|_| keep(Dimension::IsNewProduct)),
            period: self
                .period
                .filter(|_| keep(Dimension::Period))
                .map(|p| p.truncate(granularity)),
        }
    }
}

/// Anything that can be fed to [`aggregate`]: raw records, or rows of an
/// earlier aggregation.
pub trait Observation {
    fn key(&self, dims: &[Dimension], granularity: Granularity) -> GroupKey;
    /// Month the observation belongs to, if it carries one.
    fn period(&self) -> Option<Period>;
    fn measures(&self) -> Measures;
}

impl<T: Observation + ?Sized> Observation for &T {
    fn key(&self, dims: &[Dimension], granularity: Granularity) -> GroupKey {
        (**self).key(dims, granularity)
    }

    fn period(&self) -> Option<Period> {
        (**self).period()
    }

    fn measures(&self) -> Measures {
        (**self).measures()
    }
}

impl Observation for Record {
    fn key(&self, dims: &[Dimension], granularity: Granularity) -> GroupKey {
        GroupKey {
            insurer: Some(self.insurer.clone()),
            product: Some(self.product.clone()),
            segment: Some(self.segment.clone()),
            is_new_product: self.is_new_product.clone(),
            period: Some(self.reference_month),
        }
        .project(dims, granularity)
    }

    fn period(&self) -> Option<Period> {
        Some(self.reference_month)
    }

    fn measures(&self) -> Measures {
        Measures::from(self)
    }
}

/// How group sums are scaled before indicators are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Normalization {
    /// Keep the sums (per-period timeline; divisor 1).
    PeriodTotals,
    /// Divide by the number of distinct months in the input (per-entity average).
    MonthlyAverage,
}

/// How a row's target markup is looked up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PolicyAttribution {
    /// Each row's own product (rows grouped by product).
    PerRowProduct,
    /// The caller's active product selection (rows mixing products).
    Filtered(ProductFilter),
}

/// One output row: group key, normalised measures and everything derived.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AggregatedRow {
    #[serde(flatten)]
    pub key: GroupKey,
    #[serde(flatten)]
    pub measures: Measures,
    #[serde(flatten)]
    pub indicators: IndicatorSet,
    pub target_markup: Option<f64>,
    /// markup − target_markup.
    pub gap: Option<f64>,
    pub deviation: DeviationClass,
}

impl AggregatedRow {
    pub fn new(key: GroupKey, measures: Measures) -> Self {
        AggregatedRow {
            key,
            indicators: IndicatorSet::from_measures(&measures),
            measures,
            target_markup: None,
            gap: None,
            deviation: DeviationClass::Uncomputed,
        }
    }

    pub fn set_target(&mut self, target: Option<f64>) {
        self.target_markup = target;
        self.gap = match (self.indicators.markup, target) {
            (Some(m), Some(t)) => Some(m - t),
            _ => None,
        };
        self.deviation = DeviationClass::classify(self.indicators.markup, target);
    }
}

impl Observation for AggregatedRow {
    fn key(&self, dims: &[Dimension], granularity: Granularity) -> GroupKey {
        self.key.project(dims, granularity)
    }

    fn period(&self) -> Option<Period> {
        self.key.period
    }

    fn measures(&self) -> Measures {
        self.measures
    }
}

/// Group `rows` by `dims`, sum the measures and attach indicators.
///
/// Output is sorted by group key, which is chronological when grouping by
/// period alone. An empty input yields an empty table.
pub fn aggregate<O: Observation>(
    rows: &[O],
    dims: &[Dimension],
    granularity: Granularity,
    normalization: Normalization,
) -> Vec<AggregatedRow> {
    let mut groups: BTreeMap<GroupKey, Measures> = BTreeMap::new();
    let mut periods: BTreeSet<Period> = BTreeSet::new();
    for row in rows {
        groups.entry(row.key(dims, granularity)).or_default().add(&row.measures());
        if let Some(p) = row.period() {
            periods.insert(p);
        }
    }

    let divisor = match normalization {
        Normalization::PeriodTotals => 1,
        // Rows already collapsed over time carry no period and count as one month.
        Normalization::MonthlyAverage => periods.len().max(1),
    };
    debug!(rows = rows.len(), groups = groups.len(), divisor, "aggregated");

    groups
        .into_iter()
        .filter_map(|(key, sum)| sum.per(divisor).map(|m| AggregatedRow::new(key, m)))
        .collect()
}

/// Resolve each row's target markup, then its gap and deviation class.
pub fn attach_policy(rows: &mut [AggregatedRow], table: &PolicyTable, attribution: &PolicyAttribution) {
    for row in rows.iter_mut() {
        let items = row.measures.items;
        let target = match attribution {
            PolicyAttribution::PerRowProduct => {
                row.key.product.as_deref().and_then(|p| table.resolve(p, items))
            }
            PolicyAttribution::Filtered(filter) => table.resolve_for_filtered_product(items, filter),
        };
        row.set_target(target);
    }
}

/// Monthly-average book per insurer × product × segment × new-product flag,
/// classified against each row's own product policy.
pub fn detailed_view(records: &[Record], filters: &Filters, policy: &PolicyTable) -> Vec<AggregatedRow> {
    let selected = filters.apply(records);
    let mut rows =
        aggregate(&selected, &DETAIL_DIMENSIONS, Granularity::Month, Normalization::MonthlyAverage);
    attach_policy(&mut rows, policy, &PolicyAttribution::PerRowProduct);
    rows
}

/// Records of the selected insurers (empty = all) and product.
pub fn timeline_selection<'a>(
    records: &'a [Record],
    insurers: &BTreeSet<String>,
    product: &ProductFilter,
) -> Vec<&'a Record> {
    records
        .iter()
        .filter(|r| insurers.is_empty() || insurers.contains(&r.insurer))
        .filter(|r| product.matches(&r.product))
        .collect()
}

/// Period totals for one product (or all), optionally restricted to some
/// insurers, classified against the selected product's policy.
pub fn timeline_view(
    records: &[Record],
    insurers: &BTreeSet<String>,
    product: &ProductFilter,
    granularity: Granularity,
    policy: &PolicyTable,
) -> Vec<AggregatedRow> {
    let selected = timeline_selection(records, insurers, product);
    let mut rows = aggregate(&selected, &[Dimension::Period], granularity, Normalization::PeriodTotals);
    attach_policy(&mut rows, policy, &PolicyAttribution::Filtered(product.clone()));
    rows
}

/// Compliance overview for one insurer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InsurerSummary {
    pub insurer: String,
    /// All detail rows, `Uncomputed` ones included.
    pub rows: usize,
    /// Rows classified out of policy; `Uncomputed` never counts.
    pub out_of_policy: usize,
    pub out_of_policy_share: f64,
}

/// Per-insurer counts over detail rows. Rows not grouped by insurer are skipped.
pub fn insurer_summary(rows: &[AggregatedRow]) -> Vec<InsurerSummary> {
    let mut counts: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for row in rows {
        let Some(insurer) = row.key.insurer.as_deref() else { continue };
        let c = counts.entry(insurer).or_default();
        c.0 += 1;
        if row.deviation.is_out_of_policy() {
            c.1 += 1;
        }
    }
    counts
        .into_iter()
        .map(|(insurer, (rows, out_of_policy))| InsurerSummary {
            insurer: insurer.to_string(),
            rows,
            out_of_policy,
            out_of_policy_share: out_of_policy as f64 / rows as f64,
        })
        .collect()
}

pub fn out_of_policy(rows: &[AggregatedRow]) -> Vec<&AggregatedRow> {
    rows.iter().filter(|r| r.deviation.is_out_of_policy()).collect()
}

/// Headline figures over a filtered record set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PortfolioSummary {
    /// Distinct months present.
    pub months: usize,
    pub total: Measures,
    /// `None` when no month matched.
    pub monthly_average: Option<Measures>,
    /// Pooled over the whole set; ratios are unaffected by the averaging.
    pub indicators: IndicatorSet,
}

pub fn portfolio_summary<O: Observation>(rows: &[O]) -> PortfolioSummary {
    let mut total = Measures::default();
    let mut periods: BTreeSet<Period> = BTreeSet::new();
    for row in rows {
        total.add(&row.measures());
        if let Some(p) = row.period() {
            periods.insert(p);
        }
    }
    let divisor = if rows.is_empty() { 0 } else { periods.len().max(1) };
    let monthly_average = total.per(divisor);
    PortfolioSummary {
        months: periods.len(),
        total,
        indicators: monthly_average.as_ref().map(IndicatorSet::from_measures).unwrap_or_default(),
        monthly_average,
    }
}
