//! CSV export of the detailed view.

use std::io::Write;

use serde::Serialize;

use crate::pipeline::AggregatedRow;

const DETAIL_HEADER: [&str; 14] = [
    "insurer",
    "product",
    "segment",
    "is_new_product",
    "revenue",
    "expense",
    "service_orders",
    "items",
    "claims_ratio",
    "frequency",
    "markup",
    "target_markup",
    "gap",
    "deviation",
];

/// One flat line of the detailed view; undefined values become empty cells.
#[derive(Debug, Serialize)]
struct DetailLine<'a> {
    insurer: Option<&'a str>,
    product: Option<&'a str>,
    segment: Option<&'a str>,
    is_new_product: Option<&'a str>,
    revenue: f64,
    expense: f64,
    service_orders: f64,
    items: f64,
    claims_ratio: Option<f64>,
    frequency: Option<f64>,
    markup: Option<f64>,
    target_markup: Option<f64>,
    gap: Option<f64>,
    deviation: &'static str,
}

impl<'a> From<&'a AggregatedRow> for DetailLine<'a> {
    fn from(r: &'a AggregatedRow) -> Self {
        DetailLine {
            insurer: r.key.insurer.as_deref(),
            product: r.key.product.as_deref(),
            segment: r.key.segment.as_deref(),
            is_new_product: r.key.is_new_product.as_deref(),
            revenue: r.measures.revenue,
            expense: r.measures.expense,
            service_orders: r.measures.service_orders,
            items: r.measures.items,
            claims_ratio: r.indicators.claims_ratio,
            frequency: r.indicators.frequency,
            markup: r.indicators.markup,
            target_markup: r.target_markup,
            gap: r.gap,
            deviation: r.deviation.label(),
        }
    }
}

/// Write `rows` as RFC 4180 CSV with a header line, even when `rows` is empty.
pub fn write_detail_csv<W: Write>(rows: &[AggregatedRow], writer: W) -> csv::Result<()> {
    let mut w = csv::WriterBuilder::new().has_headers(false).from_writer(writer);
    w.write_record(DETAIL_HEADER)?;
    for row in rows {
        w.serialize(DetailLine::from(row))?;
    }
    w.flush()?;
    Ok(())
}
