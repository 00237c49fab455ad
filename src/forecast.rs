//! Per-group linear trend over monthly metric values.
//!
//! Each group is fitted on its own: the series is partitioned by group key
//! and every partition is mapped to its own fit, in parallel.

use std::collections::BTreeMap;
use std::str::FromStr;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::filter::Filters;
use crate::indicators::{IndicatorSet, Measures};
use crate::policy::PolicyTable;
use crate::records::Record;
use crate::types::Period;

/// Metric the trend is fitted on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Metric {
    #[default]
    Markup,
    /// Markup minus the record's policy target.
    Gap,
}

/// Dimension the series is split on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupBy {
    #[default]
    Product,
    Insurer,
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "markup" => Ok(Metric::Markup),
            "gap" => Ok(Metric::Gap),
            other => Err(format!("unknown metric `{other}` (expected markup or gap)")),
        }
    }
}

impl FromStr for GroupBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "product" => Ok(GroupBy::Product),
            "insurer" => Ok(GroupBy::Insurer),
            other => Err(format!("unknown grouping `{other}` (expected product or insurer)")),
        }
    }
}

/// One observed metric value.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesPoint {
    pub period: Period,
    pub group: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ForecastPoint {
    pub period: Period,
    pub group: String,
    pub value: f64,
    /// `false` for observed points, `true` for extrapolated ones.
    pub is_projected: bool,
}

/// Ordinary least squares of value on ordinal index 0..n−1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearFit {
    pub intercept: f64,
    pub slope: f64,
}

impl LinearFit {
    /// `None` for fewer than two values.
    pub fn ols(values: &[f64]) -> Option<Self> {
        let n = values.len();
        if n < 2 {
            return None;
        }
        let x_mean = (n - 1) as f64 / 2.0;
        let y_mean = values.iter().sum::<f64>() / n as f64;
        let (sxy, sxx) = values.iter().enumerate().fold((0.0, 0.0), |(sxy, sxx), (i, &y)| {
            let dx = i as f64 - x_mean;
            (sxy + dx * (y - y_mean), sxx + dx * dx)
        });
        let slope = sxy / sxx;
        Some(LinearFit { intercept: y_mean - slope * x_mean, slope })
    }

    pub fn predict(&self, x: f64) -> f64 {
        self.intercept + self.slope * x
    }
}

/// Per-record metric values for the records passing `filters`, keyed by the
/// record's product or insurer. Records whose metric is undefined are left out.
pub fn metric_series(
    records: &[Record],
    filters: &Filters,
    group_by: GroupBy,
    metric: Metric,
    policy: &PolicyTable,
) -> Vec<SeriesPoint> {
    filters
        .apply(records)
        .into_iter()
        .filter_map(|r| {
            let markup = IndicatorSet::from_measures(&Measures::from(r)).markup?;
            let value = match metric {
                Metric::Markup => markup,
                Metric::Gap => markup - policy.resolve(&r.product, r.items as f64)?,
            };
            let group = match group_by {
                GroupBy::Product => r.product.clone(),
                GroupBy::Insurer => r.insurer.clone(),
            };
            Some(SeriesPoint { period: r.reference_month, group, value })
        })
        .collect()
}

fn forecast_group(group: &str, by_period: BTreeMap<Period, (f64, usize)>, periods_ahead: u32) -> Vec<ForecastPoint> {
    let observed: Vec<(Period, f64)> =
        by_period.into_iter().map(|(p, (sum, n))| (p, sum / n as f64)).collect();

    let mut points: Vec<ForecastPoint> = observed
        .iter()
        .map(|&(period, value)| ForecastPoint { period, group: group.to_string(), value, is_projected: false })
        .collect();

    let values: Vec<f64> = observed.iter().map(|&(_, v)| v).collect();
    let (Some(fit), Some(&(last, _))) = (LinearFit::ols(&values), observed.last()) else {
        warn!(group, periods = values.len(), "fewer than two periods; trend not projected");
        return points;
    };

    let last_index = values.len() - 1;
    points.extend((1..=periods_ahead).map(|k| ForecastPoint {
        period: last.offset_months(k),
        group: group.to_string(),
        value: fit.predict((last_index + k as usize) as f64),
        is_projected: true,
    }));
    points
}

/// Observed points (same-period values averaged) followed by `periods_ahead`
/// projected monthly points, for every group. Groups come out sorted by key,
/// points within a group chronologically.
///
/// A group with fewer than two distinct periods keeps its observed points and
/// gets no projection.
pub fn forecast(series: &[SeriesPoint], periods_ahead: u32) -> Vec<ForecastPoint> {
    let mut partition: BTreeMap<&str, BTreeMap<Period, (f64, usize)>> = BTreeMap::new();
    let mut skipped = 0usize;
    for p in series {
        if !p.value.is_finite() {
            skipped += 1;
            continue;
        }
        let slot = partition.entry(p.group.as_str()).or_default().entry(p.period).or_default();
        slot.0 += p.value;
        slot.1 += 1;
    }
    if skipped > 0 {
        warn!(skipped, "non-finite values left out of the trend fit");
    }
    debug!(groups = partition.len(), periods_ahead, "fitting trends");

    let groups: Vec<(&str, BTreeMap<Period, (f64, usize)>)> = partition.into_iter().collect();
    let fitted: Vec<Vec<ForecastPoint>> = groups
        .into_par_iter()
        .map(|(group, by_period)| forecast_group(group, by_period, periods_ahead))
        .collect();
    fitted.into_iter().flatten().collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::PolicyRow;

    fn pt(group: &str, month: u32, value: f64) -> SeriesPoint {
        SeriesPoint { period: Period::new(2024, month).unwrap(), group: group.to_string(), value }
    }

    #[test]
    fn linear_series_extends_exactly() {
        let series: Vec<_> = [1.0, 1.1, 1.2, 1.3]
            .iter()
            .enumerate()
            .map(|(i, &v)| pt("Geral", i as u32 + 1, v))
            .collect();
        let out = forecast(&series, 3);
        assert_eq!(out.len(), 7);

        for (p, s) in out[..4].iter().zip(&series) {
            assert!(!p.is_projected);
            assert_eq!(p.period, s.period);
            assert_eq!(p.value, s.value, "observed points must be unchanged");
        }
        let projected: Vec<_> = out[4..].iter().collect();
        for (p, (month, expected)) in projected.iter().zip([(5, 1.4), (6, 1.5), (7, 1.6)]) {
            assert!(p.is_projected);
            assert_eq!(p.period, Period::new(2024, month).unwrap());
            assert!((p.value - expected).abs() < 1e-9, "got {} want {expected}", p.value);
        }
    }

    #[test]
    fn same_period_values_are_averaged() {
        let series = vec![pt("A", 1, 1.0), pt("A", 1, 3.0), pt("A", 2, 4.0)];
        let out = forecast(&series, 1);
        assert_eq!(out[0].value, 2.0);
        assert_eq!(out[1].value, 4.0);
        assert!((out[2].value - 6.0).abs() < 1e-9);
    }

    #[test]
    fn groups_are_fitted_independently() {
        let series = vec![pt("A", 1, 1.0), pt("A", 2, 2.0), pt("B", 1, 10.0), pt("B", 2, 8.0)];
        let out = forecast(&series, 1);
        let a: Vec<_> = out.iter().filter(|p| p.group == "A").collect();
        let b: Vec<_> = out.iter().filter(|p| p.group == "B").collect();
        assert!((a[2].value - 3.0).abs() < 1e-9);
        assert!((b[2].value - 6.0).abs() < 1e-9);
        assert_eq!(out[0].group, "A", "groups come out sorted by key");
    }

    #[test]
    fn single_period_group_is_returned_without_projection() {
        let series = vec![pt("Solo", 4, 2.5), pt("Solo", 4, 3.5), pt("Pair", 1, 1.0), pt("Pair", 2, 1.0)];
        let out = forecast(&series, 3);
        let solo: Vec<_> = out.iter().filter(|p| p.group == "Solo").collect();
        assert_eq!(solo.len(), 1);
        assert_eq!(solo[0].value, 3.0);
        assert!(!solo[0].is_projected);
        assert_eq!(out.iter().filter(|p| p.group == "Pair" && p.is_projected).count(), 3);
    }

    #[test]
    fn gaps_between_months_use_ordinal_index() {
        // Jan and Jun are consecutive observations: index 0 and 1.
        let series = vec![pt("A", 1, 1.0), pt("A", 6, 2.0)];
        let out = forecast(&series, 1);
        assert_eq!(out[2].period, Period::new(2024, 7).unwrap());
        assert!((out[2].value - 3.0).abs() < 1e-9);
    }

    #[test]
    fn non_finite_values_are_dropped() {
        let series = vec![pt("A", 1, 1.0), pt("A", 2, f64::NAN), pt("A", 3, 3.0)];
        let out = forecast(&series, 0);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn empty_series_forecasts_nothing() {
        assert!(forecast(&[], 3).is_empty());
    }

    #[test]
    fn ols_recovers_line() {
        let fit = LinearFit::ols(&[3.0, 5.0, 7.0]).unwrap();
        assert!((fit.intercept - 3.0).abs() < 1e-12);
        assert!((fit.slope - 2.0).abs() < 1e-12);
        assert_eq!(LinearFit::ols(&[1.0]), None);
    }

    // ── metric_series ─────────────────────────────────────────────────────────

    fn rec(insurer: &str, product: &str, month: u32, expense: f64) -> Record {
        Record {
            insurer: insurer.to_string(),
            product: product.to_string(),
            segment: "Auto".to_string(),
            is_new_product: None,
            reference_month: Period::new(2024, month).unwrap(),
            revenue: 1000.0,
            expense,
            service_orders: 1,
            items: 100,
        }
    }

    #[test]
    fn markup_series_skips_undefined_markup() {
        let records = vec![rec("A", "Geral", 1, 600.0), rec("A", "Geral", 2, 0.0)];
        let series = metric_series(&records, &Filters::default(), GroupBy::Product, Metric::Markup, &PolicyTable::empty());
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].group, "Geral");
    }

    #[test]
    fn gap_series_needs_a_target() {
        let policy = PolicyTable::new(vec![PolicyRow {
            product: "Geral".into(),
            items_threshold: 0,
            target_markup: 1.0,
        }]);
        let records = vec![rec("A", "Geral", 1, 500.0), rec("B", "Vida", 1, 500.0)];
        let series = metric_series(&records, &Filters::default(), GroupBy::Insurer, Metric::Gap, &policy);
        assert_eq!(series.len(), 1);
        assert_eq!(series[0].group, "A");
        assert!((series[0].value - (0.9385 / 0.5 - 1.0)).abs() < 1e-9);
    }

    #[test]
    fn parses_metric_and_grouping_names() {
        assert_eq!("Gap".parse::<Metric>(), Ok(Metric::Gap));
        assert_eq!("insurer".parse::<GroupBy>(), Ok(GroupBy::Insurer));
        assert!("claims".parse::<Metric>().is_err());
    }
}
