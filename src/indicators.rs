//! Pure indicator derivation over the fetched daily history. No I/O; the
//! input slice must already be sorted ascending by date.

use crate::history::DailyRecord;

/// Trailing window for the moving average and the volatility band.
pub const MA_WINDOW: usize = 20;

/// Band half-width in standard deviations.
const BAND_SIGMA: f64 = 2.0;

/// A daily record extended with the derived per-day and running values.
#[derive(Debug, Clone, PartialEq)]
pub struct DerivedRow {
    pub record: DailyRecord,
    /// Net retail flow, the mirror image of foreign + institution flow.
    pub retail_net: f64,
    /// Trailing 20-day mean of close, `None` while the window is filling.
    pub ma20: Option<f64>,
    pub upper: Option<f64>,
    pub lower: Option<f64>,
    pub cum_foreign: f64,
    pub cum_institution: f64,
    pub cum_retail: f64,
}

/// Derives the indicator series for the full history.
///
/// The cumulative sums run from the first fetched row; callers that only
/// display a trailing window must window *after* this step or the running
/// totals would be corrupted.
pub fn derive(records: &[DailyRecord]) -> Vec<DerivedRow> {
    let closes: Vec<f64> = records.iter().map(|r| r.close).collect();

    let mut cum_foreign = 0.0;
    let mut cum_institution = 0.0;
    let mut cum_retail = 0.0;

    records
        .iter()
        .enumerate()
        .map(|(i, record)| {
            let retail_net = -(record.foreign_net + record.institution_net);
            cum_foreign += record.foreign_net;
            cum_institution += record.institution_net;
            cum_retail += retail_net;

            let (ma20, upper, lower) = match rolling_stats(&closes, i) {
                Some((mean, stddev)) => (
                    Some(mean),
                    Some(mean + BAND_SIGMA * stddev),
                    Some(mean - BAND_SIGMA * stddev),
                ),
                None => (None, None, None),
            };

            DerivedRow {
                record: record.clone(),
                retail_net,
                ma20,
                upper,
                lower,
                cum_foreign,
                cum_institution,
                cum_retail,
            }
        })
        .collect()
}

/// Mean and sample standard deviation of the `MA_WINDOW` closes ending at
/// index `i`, or `None` while the window is still filling.
fn rolling_stats(closes: &[f64], i: usize) -> Option<(f64, f64)> {
    if i + 1 < MA_WINDOW {
        return None;
    }
    let window = &closes[i + 1 - MA_WINDOW..=i];
    let mean = window.iter().sum::<f64>() / MA_WINDOW as f64;
    let variance = window
        .iter()
        .map(|close| (close - mean).powi(2))
        .sum::<f64>()
        / (MA_WINDOW as f64 - 1.0);
    Some((mean, variance.sqrt()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(day: u32, close: f64, foreign: f64, institution: f64) -> DailyRecord {
        DailyRecord {
            date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + chrono::Days::new(day as u64),
            close,
            change: 0.0,
            change_pct: 0.0,
            volume: 0.0,
            institution_net: institution,
            foreign_net: foreign,
            foreign_held_shares: 0.0,
            foreign_held_pct: 0.0,
        }
    }

    #[test]
    fn constant_close_collapses_the_band() {
        let records: Vec<DailyRecord> = (0..25).map(|i| record(i, 1000.0, 0.0, 0.0)).collect();
        let derived = derive(&records);

        for row in &derived[..MA_WINDOW - 1] {
            assert_eq!(row.ma20, None);
            assert_eq!(row.upper, None);
            assert_eq!(row.lower, None);
        }
        for row in &derived[MA_WINDOW - 1..] {
            assert_eq!(row.ma20, Some(1000.0));
            assert_eq!(row.upper, Some(1000.0));
            assert_eq!(row.lower, Some(1000.0));
        }
    }

    #[test]
    fn cumulative_flows_run_from_the_first_row() {
        let foreign = [5.0, -3.0, 2.0, 0.0, 4.0];
        let records: Vec<DailyRecord> = foreign
            .iter()
            .enumerate()
            .map(|(i, &f)| record(i as u32, 100.0, f, 1.0))
            .collect();
        let derived = derive(&records);

        assert_eq!(derived[4].cum_foreign, 8.0);
        assert_eq!(derived[4].cum_institution, 5.0);
        assert_eq!(derived[0].retail_net, -6.0);
        assert_eq!(derived[4].cum_retail, -13.0);
    }

    #[test]
    fn retail_net_mirrors_foreign_plus_institution() {
        let records = vec![record(0, 100.0, 250.0, -100.0)];
        let derived = derive(&records);
        assert_eq!(derived[0].retail_net, -150.0);
    }

    #[test]
    fn band_uses_sample_standard_deviation() {
        // 19 closes at 100 and one at 120: mean 101, sample variance
        // (19·1 + 361) / 19 = 20, stddev √20.
        let mut closes = vec![100.0; MA_WINDOW - 1];
        closes.push(120.0);
        let records: Vec<DailyRecord> = closes
            .iter()
            .enumerate()
            .map(|(i, &c)| record(i as u32, c, 0.0, 0.0))
            .collect();
        let derived = derive(&records);

        let last = &derived[MA_WINDOW - 1];
        let stddev = 20.0_f64.sqrt();
        assert_eq!(last.ma20, Some(101.0));
        let upper = last.upper.unwrap();
        assert!((upper - (101.0 + 2.0 * stddev)).abs() < 1e-9);
    }

    #[test]
    fn short_history_yields_no_band_values() {
        let records: Vec<DailyRecord> = (0..5).map(|i| record(i, 100.0, 0.0, 0.0)).collect();
        let derived = derive(&records);
        assert!(derived.iter().all(|r| r.ma20.is_none()));
    }
}
