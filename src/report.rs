use crate::indicators::DerivedRow;
use crate::resolver::TickerIdentity;

/// Trading days shown per requested month.
pub const ROWS_PER_MONTH: usize = 20;

/// Sessions compared for the foreign-accumulation check.
const ACCUMULATION_LOOKBACK: usize = 5;

/// Where the last close sits relative to its volatility band.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PriceState {
    Overbought,
    Oversold,
    Neutral,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Commentary {
    /// `None` when the band is still undefined at the last row (fewer than
    /// 20 rows of history); the signal is suppressed rather than guessed.
    pub price_state: Option<PriceState>,
    pub foreign_accumulating: bool,
}

/// The trailing display window plus the commentary derived from its tail.
#[derive(Debug, Clone)]
pub struct Report {
    pub identity: TickerIdentity,
    pub window: Vec<DerivedRow>,
    pub commentary: Commentary,
}

/// Windows the derived series to the trailing `months * 20` rows and reads
/// the commentary signals off the tail. The cumulative sums inside
/// `derived` already cover the full history, so windowing here is safe.
pub fn build(identity: TickerIdentity, derived: Vec<DerivedRow>, months: u32) -> Report {
    let window_len = months as usize * ROWS_PER_MONTH;
    let start = derived.len().saturating_sub(window_len);
    let window = derived[start..].to_vec();
    let commentary = commentate(&window);

    Report {
        identity,
        window,
        commentary,
    }
}

fn commentate(window: &[DerivedRow]) -> Commentary {
    let Some(last) = window.last() else {
        return Commentary {
            price_state: None,
            foreign_accumulating: false,
        };
    };

    let price_state = match (last.upper, last.lower) {
        (Some(upper), Some(lower)) => Some(if last.record.close >= upper {
            PriceState::Overbought
        } else if last.record.close <= lower {
            PriceState::Oversold
        } else {
            PriceState::Neutral
        }),
        _ => None,
    };

    // Compares against the cumulative total five sessions back; suppressed
    // on windows too short to have one.
    let foreign_accumulating = window.len() >= ACCUMULATION_LOOKBACK
        && last.cum_foreign > window[window.len() - ACCUMULATION_LOOKBACK].cum_foreign;

    Commentary {
        price_state,
        foreign_accumulating,
    }
}

impl Commentary {
    /// The bulleted lines shown under the charts and in one-shot mode.
    pub fn lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        match self.price_state {
            Some(PriceState::Overbought) => lines.push(
                "Short-term overheated: price closed at or above the upper band.".to_string(),
            ),
            Some(PriceState::Oversold) => lines.push(
                "Oversold zone: price closed at or below the lower band, rebound potential."
                    .to_string(),
            ),
            Some(PriceState::Neutral) => {
                lines.push("Price is moving inside its normal band range.".to_string())
            }
            None => lines.push("Not enough history yet for a 20-day band read.".to_string()),
        }
        if self.foreign_accumulating {
            lines.push(
                "Foreign accumulation: net foreign buying strengthened over the last 5 sessions."
                    .to_string(),
            );
        }
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::DailyRecord;
    use chrono::NaiveDate;

    fn identity() -> TickerIdentity {
        TickerIdentity {
            code: "005930".to_string(),
            name: "Code:005930".to_string(),
        }
    }

    fn row(day: u32, close: f64, band: Option<(f64, f64)>, cum_foreign: f64) -> DerivedRow {
        DerivedRow {
            record: DailyRecord {
                date: NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()
                    + chrono::Days::new(day as u64),
                close,
                change: 0.0,
                change_pct: 0.0,
                volume: 0.0,
                institution_net: 0.0,
                foreign_net: 0.0,
                foreign_held_shares: 0.0,
                foreign_held_pct: 0.0,
            },
            retail_net: 0.0,
            ma20: band.map(|(upper, lower)| (upper + lower) / 2.0),
            upper: band.map(|(upper, _)| upper),
            lower: band.map(|(_, lower)| lower),
            cum_foreign,
            cum_institution: 0.0,
            cum_retail: 0.0,
        }
    }

    fn flat_window(len: u32, last_close: f64, band: (f64, f64)) -> Vec<DerivedRow> {
        let mut window: Vec<DerivedRow> = (0..len.saturating_sub(1))
            .map(|i| row(i, 100.0, Some(band), 0.0))
            .collect();
        window.push(row(len, last_close, Some(band), 0.0));
        window
    }

    #[test]
    fn price_states_are_mutually_exclusive() {
        let band = (110.0, 90.0);
        let cases = [
            (111.0, PriceState::Overbought),
            (110.0, PriceState::Overbought),
            (89.0, PriceState::Oversold),
            (90.0, PriceState::Oversold),
            (100.0, PriceState::Neutral),
        ];
        for (close, expected) in cases {
            let commentary = commentate(&flat_window(10, close, band));
            assert_eq!(commentary.price_state, Some(expected));
        }
    }

    #[test]
    fn accumulation_is_independent_of_price_state() {
        let mut window = flat_window(10, 100.0, (110.0, 90.0));
        let len = window.len();
        window[len - 5].cum_foreign = 10.0;
        window[len - 1].cum_foreign = 25.0;

        let commentary = commentate(&window);
        assert_eq!(commentary.price_state, Some(PriceState::Neutral));
        assert!(commentary.foreign_accumulating);
    }

    #[test]
    fn accumulation_needs_five_rows() {
        let mut window: Vec<DerivedRow> =
            (0..4).map(|i| row(i, 100.0, None, i as f64)).collect();
        window[3].cum_foreign = 100.0;
        let commentary = commentate(&window);
        assert!(!commentary.foreign_accumulating);
    }

    #[test]
    fn undefined_band_suppresses_the_price_state() {
        let window: Vec<DerivedRow> = (0..10).map(|i| row(i, 100.0, None, 0.0)).collect();
        let commentary = commentate(&window);
        assert_eq!(commentary.price_state, None);
    }

    #[test]
    fn empty_window_emits_nothing() {
        let commentary = commentate(&[]);
        assert_eq!(commentary.price_state, None);
        assert!(!commentary.foreign_accumulating);
    }

    #[test]
    fn window_is_the_trailing_months_by_twenty_rows() {
        let derived: Vec<DerivedRow> =
            (0..100).map(|i| row(i, 100.0, None, i as f64)).collect();
        let report = build(identity(), derived.clone(), 2);
        assert_eq!(report.window.len(), 40);
        assert_eq!(report.window.last(), derived.last());

        // Shorter histories keep everything.
        let report = build(identity(), derived[..30].to_vec(), 6);
        assert_eq!(report.window.len(), 30);
    }
}
