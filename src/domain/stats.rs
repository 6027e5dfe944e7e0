//! Aggregate email statistics and their text report
//!
//! Turns SendGrid's per-bucket metric rows into totals, totals-based rates and a
//! plain-text report meant to be read by the requesting agent.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::json;

use crate::{
    errors::ProviderError,
    sendgrid_client::{DailyStatRecord, EmailProvider, StatsQuery},
};

pub const REPORT_TITLE: &str = "### SendGrid Email Stats ###";
pub const TABLE_HEADER: &str = "Date | Delivered | Opens | Clicks | Bounces | Unsubscribes";
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S UTC";
pub const UNAVAILABLE_RATE: &str = "N/A";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyRow {
    pub date: String,
    pub delivered: u64,
    pub opens: u64,
    pub clicks: u64,
    pub bounces: u64,
    pub unsubscribes: u64,
}

impl DailyRow {
    /// Only the first stat bucket of a record is read; a record without buckets counts as zero.
    pub fn from_record(record: &DailyStatRecord) -> Self {
        let metrics = record
            .stats
            .first()
            .map(|bucket| bucket.metrics)
            .unwrap_or_default();

        Self {
            date: record.date.clone(),
            delivered: metrics.delivered,
            opens: metrics.opens,
            clicks: metrics.clicks,
            bounces: metrics.bounces,
            unsubscribes: metrics.unsubscribes,
        }
    }

    fn table_line(&self) -> String {
        format!(
            "{} | {} | {} | {} | {} | {}",
            self.date, self.delivered, self.opens, self.clicks, self.bounces, self.unsubscribes
        )
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatTotals {
    pub delivered: u64,
    pub opens: u64,
    pub clicks: u64,
    pub bounces: u64,
    pub unsubscribes: u64,
}

impl StatTotals {
    /// Sums saturate at `u64::MAX`.
    pub fn sum(rows: &[DailyRow]) -> Self {
        rows.iter().fold(Self::default(), |totals, row| Self {
            delivered: totals.delivered.saturating_add(row.delivered),
            opens: totals.opens.saturating_add(row.opens),
            clicks: totals.clicks.saturating_add(row.clicks),
            bounces: totals.bounces.saturating_add(row.bounces),
            unsubscribes: totals.unsubscribes.saturating_add(row.unsubscribes),
        })
    }
}

/// Percentages computed from totals. `None` when the denominator is zero.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct StatRates {
    pub click_through: Option<f64>,
    pub bounce: Option<f64>,
    pub unsubscribe: Option<f64>,
}

impl StatRates {
    pub fn from_totals(totals: &StatTotals) -> Self {
        Self {
            click_through: percentage(totals.clicks, totals.opens),
            bounce: percentage(totals.bounces, totals.delivered),
            unsubscribe: percentage(totals.unsubscribes, totals.delivered),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub totals: StatTotals,
    pub rates: StatRates,
    pub rows: Vec<DailyRow>,
    #[serde(skip)]
    pub text: String,
}

impl StatsReport {
    pub fn build(
        records: &[DailyStatRecord],
        query: &StatsQuery,
        generated_at: DateTime<Utc>,
    ) -> Self {
        let rows: Vec<DailyRow> = records.iter().map(DailyRow::from_record).collect();
        let totals = StatTotals::sum(&rows);
        let rates = StatRates::from_totals(&totals);
        let text = render_report(&rows, &totals, &rates, query, generated_at);

        Self {
            totals,
            rates,
            rows,
            text,
        }
    }
}

pub fn percentage(numerator: u64, denominator: u64) -> Option<f64> {
    if denominator == 0 {
        return None;
    }

    Some(numerator as f64 / denominator as f64 * 100.0)
}

pub fn format_rate(rate: Option<f64>) -> String {
    match rate {
        Some(value) => format!("{value:.2}%"),
        None => UNAVAILABLE_RATE.to_string(),
    }
}

fn render_report(
    rows: &[DailyRow],
    totals: &StatTotals,
    rates: &StatRates,
    query: &StatsQuery,
    generated_at: DateTime<Utc>,
) -> String {
    let query_echo = json!({
        "start_date": query.start_date,
        "end_date": query.end_date,
        "aggregated_by": query.aggregated_by,
    });

    let mut lines = vec![
        REPORT_TITLE.to_string(),
        String::new(),
        "This data set describes the performance of the account's email program.".to_string(),
        String::new(),
        format!(
            "Requested on {}. The API query used to fetch this data was:",
            generated_at.format(TIMESTAMP_FORMAT)
        ),
        query_echo.to_string(),
        String::new(),
        "Review the figures below in detail and complete the user's request with an analysis of them."
            .to_string(),
        String::new(),
        "Summary of metrics across selected period:".to_string(),
        format!("  - Total Delivered: {}", totals.delivered),
        format!("  - Total Opens: {}", totals.opens),
        format!("  - Total Clicks: {}", totals.clicks),
        format!("  - Total Bounces: {}", totals.bounces),
        format!("  - Total Unsubscribes: {}", totals.unsubscribes),
        format!("  - Average CTR: {}", format_rate(rates.click_through)),
        format!("  - Bounce Rate: {}", format_rate(rates.bounce)),
        format!("  - Unsubscribe Rate: {}", format_rate(rates.unsubscribe)),
        String::new(),
        TABLE_HEADER.to_string(),
        "-".repeat(TABLE_HEADER.len()),
    ];
    lines.extend(rows.iter().map(DailyRow::table_line));

    let mut text = lines.join("\n");
    text.push('\n');
    text
}

pub async fn get_aggregate_email_stats(
    provider: &dyn EmailProvider,
    query: &StatsQuery,
    generated_at: DateTime<Utc>,
) -> Result<StatsReport, ProviderError> {
    let records = provider.aggregate_stats(query).await?;
    Ok(StatsReport::build(&records, query, generated_at))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;
    use crate::sendgrid_client::{StatBucket, StatMetrics};

    fn record(date: &str, metrics: [u64; 5]) -> DailyStatRecord {
        let [delivered, opens, clicks, bounces, unsubscribes] = metrics;
        DailyStatRecord {
            date: date.to_string(),
            stats: vec![StatBucket {
                metrics: StatMetrics {
                    delivered,
                    opens,
                    clicks,
                    bounces,
                    unsubscribes,
                },
            }],
        }
    }

    fn query() -> StatsQuery {
        StatsQuery {
            start_date: "2025-10-01".to_string(),
            end_date: "2025-10-03".to_string(),
            aggregated_by: "day".to_string(),
        }
    }

    fn fixed_clock() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, 4, 9, 30, 0)
            .single()
            .expect("valid timestamp")
    }

    fn table_rows(text: &str) -> Vec<&str> {
        text.lines()
            .skip_while(|line| *line != TABLE_HEADER)
            .skip(2)
            .filter(|line| !line.is_empty())
            .collect()
    }

    #[test]
    fn single_day_totals_and_rates() {
        let report = StatsReport::build(
            &[record("2025-10-01", [10, 13, 2, 1, 0])],
            &query(),
            fixed_clock(),
        );

        assert_eq!(
            report.totals,
            StatTotals {
                delivered: 10,
                opens: 13,
                clicks: 2,
                bounces: 1,
                unsubscribes: 0,
            }
        );
        assert_eq!(format_rate(report.rates.click_through), "15.38%");
        assert_eq!(format_rate(report.rates.bounce), "10.00%");
        assert_eq!(format_rate(report.rates.unsubscribe), "0.00%");
        assert!(report.text.contains("  - Average CTR: 15.38%"));
        assert!(report.text.contains("  - Bounce Rate: 10.00%"));
        assert!(report.text.contains("  - Unsubscribe Rate: 0.00%"));
        assert!(report.text.contains("  - Total Opens: 13"));
    }

    #[test]
    fn rates_use_totals_not_per_row_averages() {
        let report = StatsReport::build(
            &[
                record("2025-10-01", [100, 100, 50, 0, 0]),
                record("2025-10-02", [1, 1, 0, 1, 1]),
            ],
            &query(),
            fixed_clock(),
        );

        // per-row average CTR would be 25%; totals give 50/101
        assert_eq!(format_rate(report.rates.click_through), "49.50%");
        assert_eq!(format_rate(report.rates.bounce), "0.99%");
    }

    #[test]
    fn zero_denominators_render_as_unavailable() {
        let report = StatsReport::build(
            &[record("2025-10-01", [0, 0, 0, 0, 0])],
            &query(),
            fixed_clock(),
        );

        assert_eq!(report.rates.click_through, None);
        assert_eq!(report.rates.bounce, None);
        assert_eq!(report.rates.unsubscribe, None);
        assert!(report.text.contains("  - Average CTR: N/A"));
        assert!(report.text.contains("  - Unsubscribe Rate: N/A"));
    }

    #[test]
    fn empty_input_still_renders_header_and_divider() {
        let report = StatsReport::build(&[], &query(), fixed_clock());

        assert_eq!(report.totals, StatTotals::default());
        assert!(report.rows.is_empty());
        assert!(report.text.contains(TABLE_HEADER));
        assert!(table_rows(&report.text).is_empty());
    }

    #[test]
    fn table_keeps_input_order_and_row_count() {
        let records = vec![
            record("2025-10-03", [3, 3, 3, 0, 0]),
            record("2025-10-01", [1, 1, 1, 0, 0]),
            record("2025-10-02", [2, 2, 2, 0, 0]),
        ];
        let text = StatsReport::build(&records, &query(), fixed_clock()).text;

        let rows = table_rows(&text);
        assert_eq!(rows.len(), records.len());
        assert_eq!(rows[0], "2025-10-03 | 3 | 3 | 3 | 0 | 0");
        assert_eq!(rows[1], "2025-10-01 | 1 | 1 | 1 | 0 | 0");
        assert_eq!(rows[2], "2025-10-02 | 2 | 2 | 2 | 0 | 0");
    }

    #[test]
    fn divider_matches_header_length() {
        let records = [record("2025-10-01", [1, 1, 0, 0, 0])];
        let text = StatsReport::build(&records, &query(), fixed_clock()).text;

        let divider = text
            .lines()
            .skip_while(|line| *line != TABLE_HEADER)
            .nth(1)
            .expect("divider line");
        assert_eq!(divider.len(), TABLE_HEADER.len());
        assert!(divider.chars().all(|character| character == '-'));
    }

    #[test]
    fn header_carries_timestamp_and_query_echo() {
        let text = StatsReport::build(&[], &query(), fixed_clock()).text;

        assert!(text.starts_with(REPORT_TITLE));
        assert!(text.contains("Requested on 2025-10-04 09:30:00 UTC."));
        assert!(text.contains("\"start_date\":\"2025-10-01\""));
        assert!(text.contains("\"aggregated_by\":\"day\""));
    }

    #[test]
    fn oversized_counts_saturate_instead_of_overflowing() {
        let report = StatsReport::build(
            &[
                record("2025-10-01", [u64::MAX, u64::MAX, 1, 0, 0]),
                record("2025-10-02", [5, 5, 1, 0, 0]),
            ],
            &query(),
            fixed_clock(),
        );

        assert_eq!(report.totals.delivered, u64::MAX);
        assert_eq!(report.totals.opens, u64::MAX);
        assert_eq!(report.totals.clicks, 2);
        assert!(report.text.contains(&format!("  - Total Delivered: {}", u64::MAX)));
    }

    #[test]
    fn only_first_bucket_is_counted() {
        let mut day = record("2025-10-01", [5, 4, 1, 0, 0]);
        day.stats.push(StatBucket {
            metrics: StatMetrics {
                delivered: 1_000,
                opens: 1_000,
                clicks: 1_000,
                bounces: 1_000,
                unsubscribes: 1_000,
            },
        });
        let bare = DailyStatRecord {
            date: "2025-10-02".to_string(),
            stats: vec![],
        };

        let report = StatsReport::build(&[day, bare], &query(), fixed_clock());

        assert_eq!(report.totals.delivered, 5);
        assert_eq!(report.totals.opens, 4);
        assert_eq!(report.rows[1].delivered, 0);
    }
}
