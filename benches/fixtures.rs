use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

use markup::config::{InsurerConfig, SynthConfig};
use markup::policy::PolicyTable;
use markup::records::Record;
use markup::synthetic::{generate_book, policy_rows};

pub struct Scenario {
    pub insurers: usize,
    pub months: u32,
}

pub const SMALL: Scenario = Scenario { insurers: 3, months: 12 };

pub const MEDIUM: Scenario = Scenario { insurers: 30, months: 36 };

pub const LARGE: Scenario = Scenario { insurers: 200, months: 60 };

const NAMES: [&str; 10] =
    ["Alfa", "Beta", "Gama", "Delta", "Epsilon", "Zeta", "Eta", "Teta", "Iota", "Kapa"];

/// Canonical products and policy, with `scenario.insurers` insurers of
/// descending size over `scenario.months` months.
pub fn synth_config(scenario: &Scenario) -> SynthConfig {
    let mut config = SynthConfig::canonical();
    config.months = scenario.months;
    config.insurers = (0..scenario.insurers)
        .map(|i| InsurerConfig {
            // Leaked once per scenario build; bench-only.
            name: Box::leak(format!("{} {}", NAMES[i % NAMES.len()], i / NAMES.len()).into_boxed_str()),
            scale: 1.0 / (1.0 + i as f64 * 0.1),
        })
        .collect();
    config
}

pub fn build_book(scenario: &Scenario, seed: u64) -> (Vec<Record>, PolicyTable) {
    let config = synth_config(scenario);
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    (generate_book(&config, &mut rng), PolicyTable::new(policy_rows(&config)))
}
