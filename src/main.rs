use std::fs::File;
use std::io::{BufReader, BufWriter, Write};

use anyhow::{Context, Result, bail};
use tracing_subscriber::EnvFilter;

use markup::analysis::{self, Report};
use markup::config::AnalysisConfig;
use markup::export;
use markup::forecast::{GroupBy, Metric};
use markup::pipeline::AggregatedRow;
use markup::policy::{PolicyTable, ProductFilter};
use markup::records::{load_policy, load_records};
use markup::types::{Granularity, Period};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();

    let mut config = AnalysisConfig::canonical();
    let mut records_path: Option<String> = None;
    let mut policy_path: Option<String> = None;
    let mut csv_path: Option<String> = None;
    let mut output_path: Option<String> = None;
    let mut quiet = false;

    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        let mut value = || -> Result<String> {
            i += 1;
            args.get(i).cloned().with_context(|| format!("{flag} requires a value"))
        };
        match flag {
            "--records" => records_path = Some(value()?),
            "--policy" => policy_path = Some(value()?),
            "--insurer" => {
                config.filters.insurers.insert(value()?);
            }
            "--product" => {
                config.filters.products.insert(value()?);
            }
            "--segment" => {
                config.filters.segments.insert(value()?);
            }
            "--new-product" => {
                config.filters.new_product.insert(value()?);
            }
            "--period" => {
                let v = value()?;
                let p = Period::parse(&v).with_context(|| format!("--period: unrecognised month `{v}`"))?;
                config.filters.periods.insert(p);
            }
            "--timeline-insurer" => {
                config.timeline_insurers.insert(value()?);
            }
            "--timeline-product" => {
                let v = value()?;
                config.timeline_product =
                    if v.eq_ignore_ascii_case("all") { ProductFilter::All } else { ProductFilter::Single(v) };
            }
            "--granularity" => {
                config.granularity = match value()?.as_str() {
                    "month" => Granularity::Month,
                    "quarter" => Granularity::Quarter,
                    "year" => Granularity::Year,
                    other => bail!("--granularity: expected month, quarter or year, got `{other}`"),
                };
            }
            "--forecast-by" => {
                config.forecast_group_by =
                    Some(value()?.parse::<GroupBy>().map_err(anyhow::Error::msg).context("--forecast-by")?);
            }
            "--metric" => {
                config.forecast_metric = value()?.parse::<Metric>().map_err(anyhow::Error::msg).context("--metric")?;
            }
            "--horizon" => {
                config.forecast_periods = value()?.parse::<u32>().context("--horizon requires a non-negative integer")?;
            }
            "--csv" => csv_path = Some(value()?),
            "--output" => output_path = Some(value()?),
            "--quiet" => quiet = true,
            other => bail!("unknown argument `{other}`"),
        }
        i += 1;
    }

    let records_path = records_path.context("--records PATH is required")?;
    let file = File::open(&records_path).with_context(|| format!("cannot open {records_path}"))?;
    let records = load_records(BufReader::new(file)).with_context(|| format!("invalid records in {records_path}"))?;

    let policy = match policy_path {
        Some(path) => {
            let file = File::open(&path).with_context(|| format!("cannot open {path}"))?;
            PolicyTable::new(load_policy(BufReader::new(file)).with_context(|| format!("invalid policy in {path}"))?)
        }
        None => PolicyTable::empty(),
    };

    let report = analysis::analyse(&records, &policy, &config);

    if let Some(path) = csv_path {
        let file = File::create(&path).with_context(|| format!("failed to create {path}"))?;
        export::write_detail_csv(&report.detail, file).with_context(|| format!("failed to write {path}"))?;
    }
    if let Some(path) = output_path {
        let file = File::create(&path).with_context(|| format!("failed to create {path}"))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, &report).context("failed to serialize report")?;
        writeln!(writer)?;
    }

    if !quiet {
        print_report(&report, &config);
    }
    Ok(())
}

fn opt(v: Option<f64>) -> String {
    v.map(|x| format!("{x:.2}")).unwrap_or_else(|| "---".to_string())
}

fn pct(v: Option<f64>) -> String {
    v.map(|x| format!("{:.2}%", x * 100.0)).unwrap_or_else(|| "---".to_string())
}

fn key_text(v: &Option<String>) -> &str {
    v.as_deref().unwrap_or("-")
}

fn print_report(report: &Report, config: &AnalysisConfig) {
    let product = match &config.timeline_product {
        ProductFilter::All => "all products".to_string(),
        ProductFilter::Single(p) => p.clone(),
    };

    // ── Portfolio ─────────────────────────────────────────────────────────────
    let p = &report.portfolio;
    println!("=== Portfolio ({product}, {} months) ===", p.months);
    println!("  Avg monthly revenue:  {}", opt(p.monthly_average.map(|m| m.revenue)));
    println!("  Avg monthly expense:  {}", opt(p.monthly_average.map(|m| m.expense)));
    println!("  Claims ratio:         {}", pct(p.indicators.claims_ratio));
    println!("  Markup:               {}", opt(p.indicators.markup));

    // ── Timeline ──────────────────────────────────────────────────────────────
    println!("\n=== Markup timeline ({product}) ===");
    println!("{:>8} | {:>14} | {:>14} | {:>8} | {:>7} | {:>7} | {:>13}", "Period", "Revenue", "Expense", "ClaimsR", "Markup", "Policy", "Alert");
    println!("{}", "-".repeat(8 + 3 + 14 + 3 + 14 + 3 + 8 + 3 + 7 + 3 + 7 + 3 + 13));
    for r in &report.timeline {
        let label = r.key.period.map(|p| p.label()).unwrap_or_default();
        println!(
            "{:>8} | {:>14.2} | {:>14.2} | {:>8} | {:>7} | {:>7} | {:>13}",
            label,
            r.measures.revenue,
            r.measures.expense,
            pct(r.indicators.claims_ratio),
            opt(r.indicators.markup),
            opt(r.target_markup),
            r.deviation.label(),
        );
    }

    // ── Insurer compliance ────────────────────────────────────────────────────
    println!("\n=== Deviation from policy by insurer ===");
    println!("{:<24} | {:>6} | {:>13} | {:>8}", "Insurer", "Rows", "Out of policy", "Share");
    println!("{}", "-".repeat(24 + 3 + 6 + 3 + 13 + 3 + 8));
    for s in &report.insurers {
        println!(
            "{:<24} | {:>6} | {:>13} | {:>7.2}%",
            s.insurer,
            s.rows,
            s.out_of_policy,
            s.out_of_policy_share * 100.0
        );
    }

    // ── Out of policy ─────────────────────────────────────────────────────────
    let outside = report.out_of_policy();
    println!("\n=== Markups out of policy ({}) ===", outside.len());
    print_detail_header();
    for r in outside {
        print_detail_row(r);
    }

    // ── Detail ────────────────────────────────────────────────────────────────
    println!("\n=== Detailed analysis (monthly average) ===");
    print_detail_header();
    for r in &report.detail {
        print_detail_row(r);
    }

    // ── Forecast ──────────────────────────────────────────────────────────────
    println!(
        "\n=== {:?} trend by {:?} (+{} periods) ===",
        report.forecast_metric, report.forecast_group_by, config.forecast_periods
    );
    println!("{:<24} | {:>8} | {:>9} | {:>9}", "Group", "Period", "Value", "Kind");
    println!("{}", "-".repeat(24 + 3 + 8 + 3 + 9 + 3 + 9));
    for f in &report.forecast {
        println!(
            "{:<24} | {:>8} | {:>9.3} | {:>9}",
            f.group,
            f.period.label(),
            f.value,
            if f.is_projected { "projected" } else { "observed" }
        );
    }
}

fn print_detail_header() {
    println!(
        "{:<20} | {:<14} | {:<12} | {:>10} | {:>8} | {:>7} | {:>7} | {:>7} | {:>13}",
        "Insurer", "Product", "Segment", "Items", "ClaimsR", "Markup", "Policy", "Gap", "Alert"
    );
    println!("{}", "-".repeat(20 + 3 + 14 + 3 + 12 + 3 + 10 + 3 + 8 + 3 + 7 + 3 + 7 + 3 + 7 + 3 + 13));
}

fn print_detail_row(r: &AggregatedRow) {
    println!(
        "{:<20} | {:<14} | {:<12} | {:>10.0} | {:>8} | {:>7} | {:>7} | {:>7} | {:>13}",
        key_text(&r.key.insurer),
        key_text(&r.key.product),
        key_text(&r.key.segment),
        r.measures.items,
        pct(r.indicators.claims_ratio),
        opt(r.indicators.markup),
        opt(r.target_markup),
        opt(r.gap),
        r.deviation.label(),
    );
}
