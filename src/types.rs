use std::fmt;

use chrono::{Datelike, Months, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Calendar month a record refers to. Always stored as the first day of the
/// month, so two dates in the same month compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(NaiveDate);

/// Portuguese month abbreviations, matching the labels the book is reported in.
const MONTH_LABELS: [&str; 12] =
    ["Jan", "Fev", "Mar", "Abr", "Mai", "Jun", "Jul", "Ago", "Set", "Out", "Nov", "Dez"];

impl Period {
    /// `None` when `month` is outside 1..=12.
    pub fn new(year: i32, month: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, 1).map(Period)
    }

    /// Truncate any date to its month.
    pub fn from_date(date: NaiveDate) -> Self {
        // Day 1 exists in every month, so with_day(1) cannot fail.
        Period(date.with_day(1).unwrap_or(date))
    }

    /// Accepts `YYYY-MM`, `YYYY-MM-DD` and `YYYY-MM-DDTHH:MM:SS` (a space
    /// separator is also accepted). Anything after the month is discarded.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
            return Some(Self::from_date(d));
        }
        for fmt in ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f"] {
            if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
                return Some(Self::from_date(dt.date()));
            }
        }
        let (y, m) = s.split_once('-')?;
        Self::new(y.parse().ok()?, m.parse().ok()?)
    }

    pub fn year(self) -> i32 {
        self.0.year()
    }

    pub fn month(self) -> u32 {
        self.0.month()
    }

    pub fn date(self) -> NaiveDate {
        self.0
    }

    /// Advance by whole months; dates projected forecast points.
    pub fn offset_months(self, months: u32) -> Self {
        Period(self.0.checked_add_months(Months::new(months)).unwrap_or(NaiveDate::MAX))
    }

    /// First month of the bucket this period falls in at `granularity`.
    pub fn truncate(self, granularity: Granularity) -> Self {
        match granularity {
            Granularity::Month => self,
            Granularity::Quarter => {
                let first = (self.month() - 1) / 3 * 3 + 1;
                Period::new(self.year(), first).unwrap_or(self)
            }
            Granularity::Year => Period::new(self.year(), 1).unwrap_or(self),
        }
    }

    /// Display label in the book's reporting convention, e.g. `Fev/2024`.
    pub fn label(self) -> String {
        format!("{}/{}", MONTH_LABELS[self.0.month0() as usize], self.year())
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year(), self.month())
    }
}

impl Serialize for Period {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Period {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Period::parse(&s)
            .ok_or_else(|| serde::de::Error::custom(format!("unrecognised reference month `{s}`")))
    }
}

/// Bucket size used when grouping by period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Granularity {
    #[default]
    Month,
    Quarter,
    Year,
}

/// A column records can be grouped or filtered by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Insurer,
    Product,
    Segment,
    IsNewProduct,
    Period,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_accepts_month_date_and_datetime() {
        let feb = Period::new(2024, 2).unwrap();
        assert_eq!(Period::parse("2024-02"), Some(feb));
        assert_eq!(Period::parse("2024-02-17"), Some(feb));
        assert_eq!(Period::parse("2024-02-17T10:30:00"), Some(feb));
        assert_eq!(Period::parse("2024-02-17 00:00:00"), Some(feb));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(Period::parse("2024-13"), None);
        assert_eq!(Period::parse("Feb/2024"), None);
        assert_eq!(Period::parse(""), None);
    }

    #[test]
    fn offset_rolls_over_year_end() {
        let nov = Period::new(2023, 11).unwrap();
        assert_eq!(nov.offset_months(3), Period::new(2024, 2).unwrap());
    }

    #[test]
    fn truncate_to_quarter_and_year() {
        let aug = Period::new(2024, 8).unwrap();
        assert_eq!(aug.truncate(Granularity::Quarter), Period::new(2024, 7).unwrap());
        assert_eq!(aug.truncate(Granularity::Year), Period::new(2024, 1).unwrap());
        assert_eq!(aug.truncate(Granularity::Month), aug);
    }

    #[test]
    fn label_uses_portuguese_abbreviations() {
        assert_eq!(Period::new(2024, 2).unwrap().label(), "Fev/2024");
        assert_eq!(Period::new(2023, 12).unwrap().label(), "Dez/2023");
    }

    #[test]
    fn serializes_as_year_month() {
        let p = Period::new(2024, 5).unwrap();
        assert_eq!(serde_json::to_string(&p).unwrap(), "\"2024-05\"");
        let back: Period = serde_json::from_str("\"2024-05-31\"").unwrap();
        assert_eq!(back, p);
    }
}
