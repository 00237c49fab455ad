use std::fmt;

use serde::Serialize;

/// Ordinal alert scale for the gap between actual and target markup.
/// Declaration order is the reporting order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum DeviationClass {
    /// Actual or target markup is undefined.
    Uncomputed,
    FarBelow,
    Below,
    Compliant,
    Above,
    FarAbove,
}

/// Upper edge of a band on the gap axis.
#[derive(Debug, Clone, Copy)]
enum Bound {
    /// gap ≤ value
    AtMost(f64),
    /// gap < value
    Under(f64),
}

impl Bound {
    fn admits(self, gap: f64) -> bool {
        match self {
            Bound::AtMost(v) => gap <= v,
            Bound::Under(v) => gap < v,
        }
    }
}

/// Bands in ascending order; the first bound that admits the gap wins and
/// anything past the last bound is `FarAbove`.
const LADDER: [(Bound, DeviationClass); 4] = [
    (Bound::AtMost(-2.0), DeviationClass::FarBelow),
    (Bound::AtMost(-0.5), DeviationClass::Below),
    (Bound::Under(0.5), DeviationClass::Compliant),
    (Bound::Under(2.0), DeviationClass::Above),
];

impl DeviationClass {
    pub const ALL: [DeviationClass; 6] = [
        DeviationClass::Uncomputed,
        DeviationClass::FarBelow,
        DeviationClass::Below,
        DeviationClass::Compliant,
        DeviationClass::Above,
        DeviationClass::FarAbove,
    ];

    /// Classify a gap directly. Non-finite gaps are `Uncomputed`.
    pub fn from_gap(gap: f64) -> Self {
        if !gap.is_finite() {
            return DeviationClass::Uncomputed;
        }
        LADDER
            .iter()
            .find(|(bound, _)| bound.admits(gap))
            .map(|&(_, class)| class)
            .unwrap_or(DeviationClass::FarAbove)
    }

    pub fn classify(actual: Option<f64>, target: Option<f64>) -> Self {
        match (actual, target) {
            (Some(a), Some(t)) => Self::from_gap(a - t),
            _ => DeviationClass::Uncomputed,
        }
    }

    /// Every class except `Compliant` and `Uncomputed`.
    pub fn is_out_of_policy(self) -> bool {
        !matches!(self, DeviationClass::Compliant | DeviationClass::Uncomputed)
    }

    /// Alert label in the same language as `Period::label`.
    pub fn label(self) -> &'static str {
        match self {
            DeviationClass::Uncomputed => "Não Calculado",
            DeviationClass::FarBelow => "Muito Abaixo",
            DeviationClass::Below => "Abaixo",
            DeviationClass::Compliant => "Dentro",
            DeviationClass::Above => "Acima",
            DeviationClass::FarAbove => "Muito Acima",
        }
    }
}

impl fmt::Display for DeviationClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use super::DeviationClass::*;

    #[test]
    fn boundaries_are_closed_on_the_documented_side() {
        assert_eq!(DeviationClass::from_gap(-2.0), FarBelow);
        assert_eq!(DeviationClass::from_gap(-1.999), Below);
        assert_eq!(DeviationClass::from_gap(-0.5), Below);
        assert_eq!(DeviationClass::from_gap(-0.499), Compliant);
        assert_eq!(DeviationClass::from_gap(0.0), Compliant);
        assert_eq!(DeviationClass::from_gap(0.499), Compliant);
        assert_eq!(DeviationClass::from_gap(0.5), Above);
        assert_eq!(DeviationClass::from_gap(1.999), Above);
        assert_eq!(DeviationClass::from_gap(2.0), FarAbove);
    }

    #[test]
    fn missing_input_is_uncomputed() {
        assert_eq!(DeviationClass::classify(None, Some(1.0)), Uncomputed);
        assert_eq!(DeviationClass::classify(Some(1.0), None), Uncomputed);
        assert_eq!(DeviationClass::classify(None, None), Uncomputed);
        assert_eq!(DeviationClass::from_gap(f64::NAN), Uncomputed);
    }

    #[test]
    fn classify_uses_actual_minus_target() {
        assert_eq!(DeviationClass::classify(Some(1.0), Some(3.5)), FarBelow);
        assert_eq!(DeviationClass::classify(Some(3.5), Some(1.0)), FarAbove);
    }

    #[test]
    fn out_of_policy_excludes_compliant_and_uncomputed() {
        let out: Vec<_> = DeviationClass::ALL.iter().filter(|c| c.is_out_of_policy()).collect();
        assert_eq!(out, vec![&FarBelow, &Below, &Above, &FarAbove]);
    }

    #[test]
    fn labels_are_distinct_and_portuguese() {
        let labels: Vec<_> = DeviationClass::ALL.iter().map(|c| c.to_string()).collect();
        assert_eq!(labels, ["Não Calculado", "Muito Abaixo", "Abaixo", "Dentro", "Acima", "Muito Acima"]);
    }

    #[test]
    fn reporting_order_is_declaration_order() {
        let mut shuffled = vec![Above, Uncomputed, FarAbove, Below, Compliant, FarBelow];
        shuffled.sort();
        assert_eq!(shuffled, DeviationClass::ALL.to_vec());
    }

    proptest! {
        #[test]
        fn classification_is_monotonic_in_gap(a in -10.0f64..10.0, b in -10.0f64..10.0) {
            let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
            prop_assert!(DeviationClass::from_gap(lo) <= DeviationClass::from_gap(hi));
        }

        #[test]
        fn finite_gaps_are_always_computed(gap in proptest::num::f64::NORMAL) {
            prop_assert_ne!(DeviationClass::from_gap(gap), Uncomputed);
        }
    }
}
