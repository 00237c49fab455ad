use serde::Serialize;
use tracing::info;

use crate::config::AnalysisConfig;
use crate::forecast::{self, ForecastPoint, GroupBy, Metric};
use crate::pipeline::{self, AggregatedRow, InsurerSummary, PortfolioSummary};
use crate::policy::PolicyTable;
use crate::records::Record;

/// Everything one analysis run produces.
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// Headline figures over the timeline selection.
    pub portfolio: PortfolioSummary,
    pub timeline: Vec<AggregatedRow>,
    pub detail: Vec<AggregatedRow>,
    pub insurers: Vec<InsurerSummary>,
    pub forecast_metric: Metric,
    pub forecast_group_by: GroupBy,
    pub forecast: Vec<ForecastPoint>,
}

impl Report {
    pub fn out_of_policy(&self) -> Vec<&AggregatedRow> {
        pipeline::out_of_policy(&self.detail)
    }
}

/// Run every view over `records`.
///
/// The timeline and portfolio summary use the timeline selection (insurers
/// and one product); the detailed view and the forecast use `config.filters`.
pub fn analyse(records: &[Record], policy: &PolicyTable, config: &AnalysisConfig) -> Report {
    let selection = pipeline::timeline_selection(records, &config.timeline_insurers, &config.timeline_product);
    let portfolio = pipeline::portfolio_summary(&selection);
    let timeline = pipeline::timeline_view(
        records,
        &config.timeline_insurers,
        &config.timeline_product,
        config.granularity,
        policy,
    );

    let detail = pipeline::detailed_view(records, &config.filters, policy);
    let insurers = pipeline::insurer_summary(&detail);

    let group_by = config.effective_group_by();
    let series = forecast::metric_series(records, &config.filters, group_by, config.forecast_metric, policy);
    let forecast = forecast::forecast(&series, config.forecast_periods);

    info!(
        records = records.len(),
        timeline = timeline.len(),
        detail = detail.len(),
        out_of_policy = pipeline::out_of_policy(&detail).len(),
        forecast_points = forecast.len(),
        "analysis complete"
    );

    Report {
        portfolio,
        timeline,
        detail,
        insurers,
        forecast_metric: config.forecast_metric,
        forecast_group_by: group_by,
        forecast,
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;
    use crate::config::SynthConfig;
    use crate::deviation::DeviationClass;
    use crate::policy::ProductFilter;
    use crate::synthetic::{generate_book, policy_rows};
    use crate::types::Period;

    fn synthetic() -> (Vec<Record>, PolicyTable) {
        let config = SynthConfig::canonical();
        let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
        (generate_book(&config, &mut rng), PolicyTable::new(policy_rows(&config)))
    }

    #[test]
    fn canonical_run_produces_every_view() {
        let (records, policy) = synthetic();
        let synth = SynthConfig::canonical();
        let report = analyse(&records, &policy, &AnalysisConfig::canonical());

        assert_eq!(report.timeline.len(), synth.months as usize);
        assert_eq!(report.portfolio.months, synth.months as usize);
        assert_eq!(report.detail.len(), synth.insurers.len() * synth.products.len());
        assert_eq!(report.insurers.len(), synth.insurers.len());
        assert!(report.detail.iter().all(|r| r.deviation != DeviationClass::Uncomputed));

        // One group per product, each with its observed months plus 3 projections.
        let projected = report.forecast.iter().filter(|p| p.is_projected).count();
        assert_eq!(projected, synth.products.len() * 3);
        assert_eq!(report.forecast_group_by, GroupBy::Product);
    }

    #[test]
    fn timeline_is_chronological() {
        let (records, policy) = synthetic();
        let report = analyse(&records, &policy, &AnalysisConfig::canonical());
        let periods: Vec<Period> = report.timeline.iter().filter_map(|r| r.key.period).collect();
        let mut sorted = periods.clone();
        sorted.sort();
        assert_eq!(periods, sorted);
    }

    #[test]
    fn all_products_timeline_has_no_policy_line() {
        let (records, policy) = synthetic();
        let config = AnalysisConfig { timeline_product: ProductFilter::All, ..AnalysisConfig::canonical() };
        let report = analyse(&records, &policy, &config);
        assert!(report.timeline.iter().all(|r| r.target_markup.is_none()));
    }

    #[test]
    fn portfolio_totals_match_the_timeline() {
        let (records, policy) = synthetic();
        let mut config = AnalysisConfig::canonical();
        config.timeline_insurers.insert("Gama Vida".to_string());
        let report = analyse(&records, &policy, &config);
        let timeline_revenue: f64 = report.timeline.iter().map(|r| r.measures.revenue).sum();
        assert_eq!(report.portfolio.months, report.timeline.len());
        assert!((report.portfolio.total.revenue - timeline_revenue).abs() < 1e-6);
    }

    #[test]
    fn gap_forecast_follows_the_insurer_selection() {
        let (records, policy) = synthetic();
        let mut config = AnalysisConfig::canonical();
        config.filters.insurers.insert("Beta Seguradora".to_string());
        config.forecast_metric = Metric::Gap;
        let report = analyse(&records, &policy, &config);
        assert_eq!(report.forecast_group_by, GroupBy::Insurer);
        assert!(report.forecast.iter().all(|p| p.group == "Beta Seguradora"));
        assert!(report.detail.iter().all(|r| r.key.insurer.as_deref() == Some("Beta Seguradora")));
    }

    #[test]
    fn empty_book_is_well_formed() {
        let report = analyse(&[], &PolicyTable::empty(), &AnalysisConfig::canonical());
        assert!(report.timeline.is_empty());
        assert!(report.detail.is_empty());
        assert!(report.forecast.is_empty());
        assert_eq!(report.portfolio.monthly_average, None);
        assert_eq!(report.portfolio.indicators.markup, None);
    }
}
