//! Terminal rendering of delivered records.
//!
//! Prices and market caps arrive as raw page text. For display they are
//! reduced to digits and `.` and parsed; anything unparsable shows as `N/A`.
//! Market caps are also shown as a share of the first row's cap.

use std::fmt::Write as _;

use coinwatch_core::Record;

/// Keep only ASCII digits and `.`.
pub fn clean_numeric(raw: &str) -> String {
    raw.chars().filter(|c| c.is_ascii_digit() || *c == '.').collect()
}

pub fn parse_numeric(raw: &str) -> Option<f64> {
    clean_numeric(raw).parse().ok()
}

/// Price with two decimals, or `N/A`.
pub fn format_price(raw: &str) -> String {
    match parse_numeric(raw) {
        Some(price) => format!("{price:.2}"),
        None => "N/A".to_string(),
    }
}

/// Market cap of the first record, if it parses to a positive number.
pub fn baseline_market_cap(records: &[Record]) -> Option<f64> {
    records
        .first()
        .and_then(|r| parse_numeric(&r.market_cap))
        .filter(|cap| *cap > 0.0)
}

/// Percentage of `baseline`, truncated and capped at 100.
pub fn market_cap_share(raw: &str, baseline: Option<f64>) -> Option<u32> {
    let baseline = baseline?;
    let cap = parse_numeric(raw)?;
    let share = (cap / baseline * 100.0) as u32;
    Some(share.min(100))
}

/// Render up to `rows` records as an aligned table.
pub fn render_table(records: &[Record], rows: usize) -> String {
    let shown = &records[..records.len().min(rows)];
    let baseline = baseline_market_cap(records);

    let name_width = shown
        .iter()
        .map(|r| r.name.chars().count())
        .max()
        .unwrap_or(0)
        .max("Name".len());
    let cap_width = shown
        .iter()
        .map(|r| r.market_cap.chars().count())
        .max()
        .unwrap_or(0)
        .max("Market cap".len());

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:>3}  {:<name_width$}  {:>12}  {:>cap_width$}  {:>5}",
        "#", "Name", "Price", "Market cap", "Share"
    );
    for (i, record) in shown.iter().enumerate() {
        let share = match market_cap_share(&record.market_cap, baseline) {
            Some(pct) => format!("{pct}%"),
            None => "N/A".to_string(),
        };
        let _ = writeln!(
            out,
            "{:>3}  {:<name_width$}  {:>12}  {:>cap_width$}  {:>5}",
            i + 1,
            record.name,
            format_price(&record.price),
            record.market_cap,
            share
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_numeric() {
        assert_eq!(clean_numeric("$64,210.55"), "64210.55");
        assert_eq!(clean_numeric("$1.26T"), "1.26");
        assert_eq!(clean_numeric("N/A"), "");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price("$64,210.5"), "64210.50");
        assert_eq!(format_price("$0.000012"), "0.00");
        assert_eq!(format_price("--"), "N/A");
    }

    #[test]
    fn test_market_cap_share() {
        let baseline = Some(1_260_000_000.0);
        assert_eq!(market_cap_share("$1,260,000,000", baseline), Some(100));
        assert_eq!(market_cap_share("$630,000,000", baseline), Some(50));
        assert_eq!(market_cap_share("$2,520,000,000", baseline), Some(100));
        assert_eq!(market_cap_share("unknown", baseline), None);
        assert_eq!(market_cap_share("$630,000,000", None), None);
    }

    #[test]
    fn test_baseline_requires_positive_first_cap() {
        assert_eq!(
            baseline_market_cap(&[Record::new("A", "1", "$2,000")]),
            Some(2000.0)
        );
        assert_eq!(baseline_market_cap(&[Record::new("A", "1", "$0")]), None);
        assert_eq!(baseline_market_cap(&[Record::new("A", "1", "n/a")]), None);
        assert_eq!(baseline_market_cap(&[]), None);
    }

    #[test]
    fn test_render_table_limits_rows() {
        let records: Vec<Record> = (1..=12)
            .map(|i| Record::new(format!("Coin{i}"), format!("${i}.5"), format!("${}", 1000 / i)))
            .collect();

        let table = render_table(&records, 10);
        let lines: Vec<&str> = table.lines().collect();

        assert_eq!(lines.len(), 11);
        assert!(lines[0].contains("Market cap"));
        assert!(lines[1].contains("Coin1 "));
        assert!(lines[1].contains("1.50"));
        assert!(lines[1].ends_with("100%"));
        assert!(lines[2].ends_with("50%"));
        assert!(!table.contains("Coin11"));
    }

    #[test]
    fn test_render_table_without_baseline() {
        let records = vec![Record::new("Mystery", "?", "?")];
        let table = render_table(&records, 10);
        let row = table.lines().nth(1).unwrap();
        assert!(row.contains("N/A"));
        assert!(row.trim_end().ends_with("N/A"));
    }
}
