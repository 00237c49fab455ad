use rand::Rng;
use rand_distr::{Distribution, LogNormal, Normal, Poisson};

use crate::config::SynthConfig;
use crate::records::{PolicyRow, Record};

/// Generate a monthly book for every insurer × product in `config`.
///
/// Items grow 1% a month with log-normal noise; the claims ratio follows the
/// product's linear drift plus normal noise (floored at zero); service orders
/// are Poisson around the product's annual frequency. A product's launch
/// month books claims with zero premium.
pub fn generate_book(config: &SynthConfig, rng: &mut impl Rng) -> Vec<Record> {
    let size_noise = LogNormal::new(0.0, 0.05).expect("invalid LogNormal params");
    let mut out = Vec::new();

    for month in 0..config.months {
        let period = config.start.offset_months(month);
        for insurer in &config.insurers {
            for product in &config.products {
                if month < product.launch_month {
                    continue;
                }
                let age = (month - product.launch_month) as f64;
                let items =
                    (product.base_items * insurer.scale * (1.0 + 0.01 * age) * size_noise.sample(rng)).round();

                let mean_cr = product.claims_ratio + product.claims_ratio_drift * month as f64;
                let cr = Normal::new(mean_cr, config.claims_ratio_sd)
                    .expect("invalid Normal params")
                    .sample(rng)
                    .max(0.0);

                let written = items * product.premium_per_item;
                let (revenue, expense) = if month == product.launch_month && product.is_new {
                    (0.0, written * cr * 0.2)
                } else {
                    (written, written * cr)
                };

                let lambda = items * product.frequency / 12.0;
                let service_orders = if lambda > 0.0 {
                    Poisson::new(lambda).expect("invalid Poisson lambda").sample(rng) as u64
                } else {
                    0
                };

                out.push(Record {
                    insurer: insurer.name.to_string(),
                    product: product.name.to_string(),
                    segment: product.segment.to_string(),
                    is_new_product: Some(if product.is_new { "Sim" } else { "Não" }.to_string()),
                    reference_month: period,
                    revenue: (revenue * 100.0).round() / 100.0,
                    expense: (expense * 100.0).round() / 100.0,
                    service_orders,
                    items: items as u64,
                });
            }
        }
    }
    out
}

pub fn policy_rows(config: &SynthConfig) -> Vec<PolicyRow> {
    config
        .policy
        .iter()
        .map(|&(product, items_threshold, target_markup)| PolicyRow {
            product: product.to_string(),
            items_threshold,
            target_markup,
        })
        .collect()
}
