use anyhow::{Result, anyhow};
use chrono::NaiveDate;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};

const HISTORY_URL: &str = "https://finance.naver.com/item/frgn.naver";
const USER_AGENT: &str = "Mozilla/5.0";

/// Roughly four table pages cover one month of trading days.
pub const PAGES_PER_MONTH: u32 = 4;

/// Header captions that identify the daily supply/demand table. The page
/// carries several layout tables; only the data table is headed by all of
/// these.
const HEADER_CAPTIONS: &[&str] = &[
    "날짜",
    "종가",
    "전일비",
    "등락률",
    "거래량",
    "기관",
    "외국인",
    "보유주수",
    "보유율",
];

/// One trading day of price and investor-class flow data.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub close: f64,
    pub change: f64,
    pub change_pct: f64,
    pub volume: f64,
    pub institution_net: f64,
    pub foreign_net: f64,
    pub foreign_held_shares: f64,
    pub foreign_held_pct: f64,
}

/// Fetches up to `months * 4` pages of daily history for `code`,
/// newest-first on the wire, and returns the rows sorted ascending by date.
///
/// A page without the expected data table ends the fetch early (end of the
/// available history). Transport errors are not retried; they abort the
/// whole fetch and the user re-triggers interactively.
pub async fn fetch_history(client: &Client, code: &str, months: u32) -> Result<Vec<DailyRecord>> {
    let pages = months * PAGES_PER_MONTH;
    let mut records = Vec::new();

    for page in 1..=pages {
        let html = client
            .get(HISTORY_URL)
            .query(&[("code", code), ("page", &page.to_string())])
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;

        match classify_page(code, page, parse_page(&html))? {
            PageOutcome::Rows(rows) => records.extend(rows),
            PageOutcome::EndOfHistory => break,
        }
    }

    records.sort_by_key(|r| r.date);
    Ok(records)
}

#[derive(Debug)]
enum PageOutcome {
    Rows(Vec<DailyRecord>),
    EndOfHistory,
}

/// Decides what the fetch loop does with one parsed page: collect its rows,
/// stop at the end of the available history, or fail when even the first
/// page carries no data table (layout change or bogus code).
fn classify_page(
    code: &str,
    page: u32,
    parsed: Option<Vec<DailyRecord>>,
) -> Result<PageOutcome> {
    match parsed {
        Some(rows) => Ok(PageOutcome::Rows(rows)),
        None if page == 1 => Err(anyhow!(
            "no daily supply/demand table found for code {code}; \
             expected a table headed 날짜/종가/…/외국인 보유율"
        )),
        None => Ok(PageOutcome::EndOfHistory),
    }
}

/// Extracts the data rows from one page, or `None` when the page carries no
/// table matching the expected header.
fn parse_page(html: &str) -> Option<Vec<DailyRecord>> {
    let document = Html::parse_document(html);
    let table_sel = Selector::parse("table").unwrap();
    let row_sel = Selector::parse("tr").unwrap();
    let cell_sel = Selector::parse("td").unwrap();

    let table = document.select(&table_sel).find(header_matches)?;

    let mut rows = Vec::new();
    for tr in table.select(&row_sel) {
        let cells: Vec<String> = tr.select(&cell_sel).map(cell_text).collect();
        // Spacer rows and the header rows fail to parse and are dropped.
        if let Some(record) = parse_row(&cells) {
            rows.push(record);
        }
    }
    Some(rows)
}

fn header_matches(table: &ElementRef) -> bool {
    let th_sel = Selector::parse("th").unwrap();
    let header: String = table.select(&th_sel).flat_map(|th| th.text()).collect();
    HEADER_CAPTIONS.iter().all(|caption| header.contains(caption))
}

fn cell_text(cell: ElementRef) -> String {
    cell.text().collect::<String>().trim().to_string()
}

fn parse_row(cells: &[String]) -> Option<DailyRecord> {
    if cells.len() != 9 {
        return None;
    }

    Some(DailyRecord {
        date: NaiveDate::parse_from_str(&cells[0], "%Y.%m.%d").ok()?,
        close: parse_number(&cells[1])?,
        change: parse_change(&cells[2])?,
        change_pct: parse_number(&cells[3])?,
        volume: parse_number(&cells[4])?,
        institution_net: parse_number(&cells[5])?,
        foreign_net: parse_number(&cells[6])?,
        foreign_held_shares: parse_number(&cells[7])?,
        foreign_held_pct: parse_number(&cells[8])?,
    })
}

/// Parses a formatted numeric cell: thousands separators, `%` suffixes and
/// explicit `+` signs are stripped.
fn parse_number(text: &str) -> Option<f64> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || matches!(c, '.' | '-'))
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

/// The day-over-day change cell carries a direction marker instead of a
/// sign: ▲/상승 for up, ▼/하락 for down.
fn parse_change(text: &str) -> Option<f64> {
    let value = parse_number(text)?;
    if text.contains('▼') || text.contains("하락") {
        Some(-value.abs())
    } else {
        Some(value)
    }
}
