use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One canonical value per UTC calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DailyPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Group observations by UTC calendar date, keeping the value with the
/// latest timestamp for each date. Output is ordered by date.
pub fn resample_daily(points: &[(DateTime<Utc>, f64)]) -> Vec<DailyPoint> {
    let mut latest: Vec<(NaiveDate, DateTime<Utc>, f64)> = Vec::new();

    for &(ts, value) in points {
        let date = ts.date_naive();
        match latest.iter_mut().find(|(d, _, _)| *d == date) {
            Some(entry) if ts >= entry.1 => {
                entry.1 = ts;
                entry.2 = value;
            }
            Some(_) => {}
            None => latest.push((date, ts, value)),
        }
    }

    latest.sort_by_key(|(d, _, _)| *d);
    latest
        .into_iter()
        .map(|(date, _, value)| DailyPoint { date, value })
        .collect()
}

/// Forward-fill missing days with the most recent prior value, but only
/// when the series is sparse: coverage below `sparse_threshold` of the
/// date span, and a span of more than one day. This is the only permitted
/// imputation; values never cross indicators.
pub fn fill_sparse_daily(points: Vec<DailyPoint>, sparse_threshold: f64) -> Vec<DailyPoint> {
    let (first, last) = match (points.first(), points.last()) {
        (Some(f), Some(l)) => (f.date, l.date),
        _ => return points,
    };

    let span_days = (last - first).num_days() + 1;
    if span_days <= 1 {
        return points;
    }

    let coverage = points.len() as f64 / span_days as f64;
    if coverage >= sparse_threshold {
        return points;
    }

    let mut filled = Vec::with_capacity(span_days as usize);
    let mut iter = points.iter().peekable();
    let mut carry = match iter.peek() {
        Some(p) => p.value,
        None => return points,
    };

    let mut date = first;
    while date <= last {
        if let Some(p) = iter.peek() {
            if p.date == date {
                carry = p.value;
                iter.next();
            }
        }
        filled.push(DailyPoint { date, value: carry });
        match date.succ_opt() {
            Some(next) => date = next,
            None => break,
        }
    }

    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn resample_keeps_latest_value_per_date() {
        let points = vec![
            (ts(2024, 3, 1, 9), 10.0),
            (ts(2024, 3, 1, 16), 11.0),
            (ts(2024, 3, 2, 12), 12.0),
        ];
        let daily = resample_daily(&points);
        assert_eq!(daily.len(), 2);
        assert_eq!(daily[0].value, 11.0);
        assert_eq!(daily[1].value, 12.0);
    }

    #[test]
    fn resample_orders_by_date() {
        let points = vec![(ts(2024, 3, 5, 0), 3.0), (ts(2024, 3, 1, 0), 1.0)];
        let daily = resample_daily(&points);
        assert_eq!(daily[0].date, date(2024, 3, 1));
        assert_eq!(daily[1].date, date(2024, 3, 5));
    }

    #[test]
    fn sparse_series_is_forward_filled() {
        // 3 points over 10 days -> 30% coverage, below the 50% threshold.
        let points = vec![
            DailyPoint { date: date(2024, 3, 1), value: 1.0 },
            DailyPoint { date: date(2024, 3, 4), value: 2.0 },
            DailyPoint { date: date(2024, 3, 10), value: 3.0 },
        ];
        let filled = fill_sparse_daily(points, 0.5);
        assert_eq!(filled.len(), 10);
        assert_eq!(filled[1].value, 1.0); // Mar 2 carries Mar 1
        assert_eq!(filled[2].value, 1.0); // Mar 3 carries Mar 1
        assert_eq!(filled[3].value, 2.0);
        assert_eq!(filled[8].value, 2.0); // Mar 9 carries Mar 4
        assert_eq!(filled[9].value, 3.0);
    }

    #[test]
    fn dense_series_is_not_filled() {
        // 3 of 4 days covered -> 75%, at or above threshold means no fill.
        let points = vec![
            DailyPoint { date: date(2024, 3, 1), value: 1.0 },
            DailyPoint { date: date(2024, 3, 2), value: 2.0 },
            DailyPoint { date: date(2024, 3, 4), value: 3.0 },
        ];
        let filled = fill_sparse_daily(points.clone(), 0.5);
        assert_eq!(filled, points);
    }

    #[test]
    fn single_day_span_is_never_filled() {
        let points = vec![DailyPoint { date: date(2024, 3, 1), value: 1.0 }];
        let filled = fill_sparse_daily(points.clone(), 0.5);
        assert_eq!(filled, points);
    }

    #[test]
    fn coverage_exactly_at_threshold_is_not_filled() {
        // 2 of 4 days -> exactly 50%.
        let points = vec![
            DailyPoint { date: date(2024, 3, 1), value: 1.0 },
            DailyPoint { date: date(2024, 3, 4), value: 2.0 },
        ];
        let filled = fill_sparse_daily(points.clone(), 0.5);
        assert_eq!(filled, points);
    }
}
