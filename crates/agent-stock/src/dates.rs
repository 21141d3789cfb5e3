//! Analysis window defaults

use chrono::{Months, NaiveDate};

use crate::error::{Result, StockError};

/// Three calendar months before `end`, clamping the day to the target month
///
/// `2024-01-15` gives `2023-10-15`; `2024-05-31` gives `2024-02-29`.
pub fn three_months_before(end: NaiveDate) -> Result<NaiveDate> {
    end.checked_sub_months(Months::new(3))
        .ok_or_else(|| StockError::InvalidDate(format!("cannot go three months back from {end}")))
}

/// Fill in a missing end date with `today` and a missing start date with
/// three months before the end date
pub fn resolve_date_window(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
    today: NaiveDate,
) -> Result<(NaiveDate, NaiveDate)> {
    let end = end.unwrap_or(today);
    let start = match start {
        Some(start) => start,
        None => three_months_before(end)?,
    };

    if start > end {
        return Err(StockError::InvalidDate(format!(
            "start date {start} is after end date {end}"
        )));
    }
    Ok((start, end))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn test_three_months_before() {
        assert_eq!(three_months_before(date("2024-01-15")).unwrap(), date("2023-10-15"));
        assert_eq!(three_months_before(date("2024-02-10")).unwrap(), date("2023-11-10"));
        assert_eq!(three_months_before(date("2024-03-31")).unwrap(), date("2023-12-31"));
        assert_eq!(three_months_before(date("2024-07-04")).unwrap(), date("2024-04-04"));
    }

    #[test]
    fn test_day_is_clamped() {
        assert_eq!(three_months_before(date("2024-05-31")).unwrap(), date("2024-02-29"));
        assert_eq!(three_months_before(date("2023-05-31")).unwrap(), date("2023-02-28"));
        assert_eq!(three_months_before(date("2024-12-31")).unwrap(), date("2024-09-30"));
    }

    #[test]
    fn test_resolve_window_defaults() {
        let today = date("2024-06-20");

        let (start, end) = resolve_date_window(None, None, today).unwrap();
        assert_eq!((start, end), (date("2024-03-20"), today));

        let (start, end) = resolve_date_window(None, Some(date("2024-01-15")), today).unwrap();
        assert_eq!((start, end), (date("2023-10-15"), date("2024-01-15")));

        let explicit =
            resolve_date_window(Some(date("2024-01-01")), Some(date("2024-02-01")), today).unwrap();
        assert_eq!(explicit, (date("2024-01-01"), date("2024-02-01")));
    }

    #[test]
    fn test_resolve_window_rejects_inverted_range() {
        let err = resolve_date_window(
            Some(date("2024-03-01")),
            Some(date("2024-02-01")),
            date("2024-06-01"),
        )
        .unwrap_err();
        assert!(matches!(err, StockError::InvalidDate(_)));
    }
}
