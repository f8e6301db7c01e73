use chrono::NaiveDate;
use serde::Serialize;
use stats_engine::{rolling_volatility, DailyPoint};

/// Daily z-scores and daily canonical values for one feature indicator,
/// both ordered by date.
#[derive(Debug, Clone)]
pub struct IndicatorSeries {
    pub id: String,
    pub z_daily: Vec<DailyPoint>,
    pub value_daily: Vec<DailyPoint>,
}

/// Dense feature matrix for the clustering pass. `columns` holds
/// `z_<id>` / `vol_<id>` pairs in indicator order; `rows[i]` is the
/// feature vector for `dates[i]`.
#[derive(Debug, Clone, Serialize)]
pub struct FeatureFrame {
    pub dates: Vec<NaiveDate>,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<f64>>,
}

impl FeatureFrame {
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

fn value_at(series: &[DailyPoint], date: NaiveDate) -> Option<f64> {
    series.iter().find(|p| p.date == date).map(|p| p.value)
}

/// Trailing-window sigma of the daily values up to and including `date`.
fn volatility_at(series: &[DailyPoint], date: NaiveDate, window: usize) -> Option<f64> {
    let upto: Vec<f64> = series
        .iter()
        .take_while(|p| p.date <= date)
        .map(|p| p.value)
        .collect();
    rolling_volatility(&upto, window)
}

/// Build the feature matrix: for each date in the trailing window, concat
/// `(z, 30d sigma)` per indicator. Indicators without enough history for
/// the volatility window are excluded entirely; dates with any missing
/// feature are dropped.
pub fn build_frame(series: &[IndicatorSeries], window_days: usize, vol_window: usize) -> FeatureFrame {
    let included: Vec<&IndicatorSeries> = series
        .iter()
        .filter(|s| !s.z_daily.is_empty() && s.value_daily.len() >= vol_window)
        .collect();

    let mut columns = Vec::with_capacity(included.len() * 2);
    for s in &included {
        columns.push(format!("z_{}", s.id));
        columns.push(format!("vol_{}", s.id));
    }

    // Candidate dates: every date carrying a z for all included
    // indicators, trimmed to the trailing window.
    let mut dates: Vec<NaiveDate> = match included.first() {
        Some(first) => first.z_daily.iter().map(|p| p.date).collect(),
        None => Vec::new(),
    };
    dates.retain(|d| {
        included
            .iter()
            .all(|s| s.z_daily.iter().any(|p| p.date == *d))
    });
    if dates.len() > window_days {
        dates = dates.split_off(dates.len() - window_days);
    }

    let mut out_dates = Vec::new();
    let mut rows = Vec::new();

    'dates: for date in dates {
        let mut row = Vec::with_capacity(columns.len());
        for s in &included {
            let z = match value_at(&s.z_daily, date) {
                Some(z) if z.is_finite() => z,
                _ => continue 'dates,
            };
            let vol = match volatility_at(&s.value_daily, date, vol_window) {
                Some(v) if v.is_finite() => v,
                _ => continue 'dates,
            };
            row.push(z);
            row.push(vol);
        }
        out_dates.push(date);
        rows.push(row);
    }

    FeatureFrame { dates: out_dates, columns, rows }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn daily(values: &[(u32, f64)]) -> Vec<DailyPoint> {
        values
            .iter()
            .map(|&(d, v)| DailyPoint { date: date(d), value: v })
            .collect()
    }

    fn series(id: &str, days: std::ops::Range<u32>) -> IndicatorSeries {
        let z: Vec<(u32, f64)> = days.clone().map(|d| (d, d as f64 * 0.1)).collect();
        let v: Vec<(u32, f64)> = days.map(|d| (d, d as f64)).collect();
        IndicatorSeries {
            id: id.to_string(),
            z_daily: daily(&z),
            value_daily: daily(&v),
        }
    }

    #[test]
    fn columns_are_z_vol_pairs() {
        let frame = build_frame(&[series("vix", 1..11), series("hy_oas", 1..11)], 90, 3);
        assert_eq!(frame.columns, vec!["z_vix", "vol_vix", "z_hy_oas", "vol_hy_oas"]);
        assert_eq!(frame.column_index("z_hy_oas"), Some(2));
    }

    #[test]
    fn short_history_indicator_is_excluded() {
        let frame = build_frame(&[series("vix", 1..11), series("nfci", 1..3)], 90, 5);
        assert_eq!(frame.columns, vec!["z_vix", "vol_vix"]);
    }

    #[test]
    fn dates_missing_a_feature_are_dropped() {
        let a = series("vix", 1..11);
        let mut b = series("hy_oas", 1..11);
        b.z_daily.retain(|p| p.date != date(7));
        let frame = build_frame(&[a, b], 90, 3);
        assert!(!frame.dates.contains(&date(7)));
    }

    #[test]
    fn frame_is_trimmed_to_window() {
        let frame = build_frame(&[series("vix", 1..21)], 5, 3);
        assert!(frame.dates.len() <= 5);
        assert_eq!(*frame.dates.last().unwrap(), date(20));
    }

    #[test]
    fn early_dates_without_volatility_are_dropped() {
        // The first date has a single trailing value, so no sigma exists.
        let frame = build_frame(&[series("vix", 1..11)], 90, 3);
        assert!(!frame.dates.contains(&date(1)));
        assert!(frame.dates.contains(&date(10)));
    }
}
