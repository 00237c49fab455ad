//! Writes a deterministic synthetic record book as NDJSON to stdout, and
//! optionally the matching policy table to `--policy PATH`.
//!
//! Usage: synth_book [--seed N] [--months N] [--policy PATH]

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::{Context, Result, bail};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use tracing::info;
use tracing_subscriber::EnvFilter;

use markup::config::SynthConfig;
use markup::synthetic::{generate_book, policy_rows};

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let mut config = SynthConfig::canonical();
    let mut policy_path: Option<String> = None;

    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;
    while i < args.len() {
        let flag = args[i].as_str();
        i += 1;
        let value = args.get(i).with_context(|| format!("{flag} requires a value"));
        match flag {
            "--seed" => config.seed = value?.parse::<u64>().context("--seed requires a u64")?,
            "--months" => config.months = value?.parse::<u32>().context("--months requires a u32")?,
            "--policy" => policy_path = Some(value?.clone()),
            other => bail!("unknown argument `{other}`"),
        }
        i += 1;
    }

    let mut rng = ChaCha20Rng::seed_from_u64(config.seed);
    let records = generate_book(&config, &mut rng);

    let stdout = std::io::stdout();
    let mut out = BufWriter::new(stdout.lock());
    for r in &records {
        serde_json::to_writer(&mut out, r).context("failed to serialize record")?;
        writeln!(out)?;
    }
    out.flush()?;

    if let Some(path) = policy_path {
        let file = File::create(&path).with_context(|| format!("failed to create {path}"))?;
        let mut w = BufWriter::new(file);
        for row in policy_rows(&config) {
            serde_json::to_writer(&mut w, &row).context("failed to serialize policy row")?;
            writeln!(w)?;
        }
        w.flush()?;
        info!(path = %path, "policy table written");
    }

    // Per-product summary to stderr.
    let mut by_product: BTreeMap<&str, (usize, f64, f64)> = BTreeMap::new();
    for r in &records {
        let e = by_product.entry(r.product.as_str()).or_default();
        e.0 += 1;
        e.1 += r.revenue;
        e.2 += r.expense;
    }
    info!(records = records.len(), months = config.months, seed = config.seed, "book generated");
    for (product, (n, revenue, expense)) in by_product {
        let cr = if revenue > 0.0 { expense / revenue } else { f64::NAN };
        info!(product, rows = n, claims_ratio = %format!("{cr:.4}"), "product");
    }
    Ok(())
}
