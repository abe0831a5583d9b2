//! Historical series cleaning.
//!
//! Provider series arrive with nulls, zeros, duplicate dates and intraday
//! timestamps on daily bars. Cleaning produces a strictly ascending series of
//! usable closes:
//!
//! 1. daily and coarser timestamps are truncated to midnight UTC;
//! 2. points are sorted and de-duplicated by timestamp, preferring a usable close;
//! 3. interior unusable closes are linearly interpolated between the nearest
//!    usable neighbours (by time);
//! 4. unusable closes at either edge are dropped.

use time::Time;
use tracing::debug;

use crate::{HistoricalSeries, PricePoint, UtcDateTime};

/// Outcome counters for one cleaning pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleaningStats {
    pub interpolated: usize,
    pub dropped: usize,
    pub duplicates: usize,
}

fn usable(close: f64) -> bool {
    close.is_finite() && close > 0.0
}

fn midnight(timestamp: UtcDateTime) -> UtcDateTime {
    let truncated = timestamp.into_inner().replace_time(Time::MIDNIGHT);
    UtcDateTime::from_offset_datetime(truncated).unwrap_or(timestamp)
}

/// Cleans `series` in place of the caller and reports what changed.
pub fn clean(mut series: HistoricalSeries) -> (HistoricalSeries, CleaningStats) {
    let mut stats = CleaningStats::default();
    let mut points = std::mem::take(&mut series.points);

    if !series.interval.is_intraday() {
        for point in &mut points {
            point.timestamp = midnight(point.timestamp);
        }
    }

    points.sort_by(|left, right| left.timestamp.cmp(&right.timestamp));
    let mut unique: Vec<PricePoint> = Vec::with_capacity(points.len());
    for point in points {
        match unique.last_mut() {
            Some(last) if last.timestamp == point.timestamp => {
                stats.duplicates += 1;
                if usable(point.close) || !usable(last.close) {
                    *last = point;
                }
            }
            _ => unique.push(point),
        }
    }

    let first_usable = unique.iter().position(|point| usable(point.close));
    let last_usable = unique.iter().rposition(|point| usable(point.close));
    let (Some(first), Some(last)) = (first_usable, last_usable) else {
        stats.dropped = unique.len();
        series.points = Vec::new();
        return (series, stats);
    };
    stats.dropped = first + (unique.len() - 1 - last);

    let mut cleaned: Vec<PricePoint> = unique[first..=last].to_vec();
    let mut previous_usable = 0;
    for index in 1..cleaned.len() {
        if usable(cleaned[index].close) {
            previous_usable = index;
            continue;
        }

        // `last` is usable, so a later usable point always exists
        let Some(offset) = cleaned[index..].iter().position(|point| usable(point.close)) else {
            break;
        };
        let next_usable = index + offset;
        let left = cleaned[previous_usable];
        let right = cleaned[next_usable];
        cleaned[index] = PricePoint::close_only(
            cleaned[index].timestamp,
            interpolate(&left, &right, cleaned[index].timestamp),
        );
        stats.interpolated += 1;
    }

    if stats != CleaningStats::default() {
        debug!(
            symbol = %series.symbol,
            interpolated = stats.interpolated,
            dropped = stats.dropped,
            duplicates = stats.duplicates,
            "cleaned historical series"
        );
    }

    series.points = cleaned;
    (series, stats)
}

fn interpolate(left: &PricePoint, right: &PricePoint, at: UtcDateTime) -> f64 {
    let start = left.timestamp.into_inner().unix_timestamp() as f64;
    let end = right.timestamp.into_inner().unix_timestamp() as f64;
    let position = at.into_inner().unix_timestamp() as f64;

    if end <= start {
        return left.close;
    }
    let fraction = (position - start) / (end - start);
    left.close + (right.close - left.close) * fraction
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{AssetClass, Interval, ProviderId, Symbol};

    fn day(n: i64) -> UtcDateTime {
        UtcDateTime::from_unix_timestamp(1_717_977_600 + n * 86_400).expect("valid ts")
    }

    fn series(interval: Interval, points: Vec<PricePoint>) -> HistoricalSeries {
        HistoricalSeries::new(
            Symbol::parse("GC").expect("valid symbol"),
            AssetClass::Commodity,
            interval,
            ProviderId::Primary,
            points,
        )
    }

    #[test]
    fn interior_gaps_are_interpolated_by_time() {
        let input = series(
            Interval::OneDay,
            vec![
                PricePoint::close_only(day(0), 2600.0),
                PricePoint::close_only(day(1), f64::NAN),
                PricePoint::close_only(day(2), 0.0),
                PricePoint::close_only(day(3), 2630.0),
            ],
        );

        let (cleaned, stats) = clean(input);

        assert_eq!(stats.interpolated, 2);
        let expected = [2600.0, 2610.0, 2620.0, 2630.0];
        assert_eq!(cleaned.len(), expected.len());
        for (point, expected) in cleaned.points.iter().zip(expected) {
            assert!((point.close - expected).abs() < 1e-9, "{} != {expected}", point.close);
        }
    }

    #[test]
    fn unusable_edges_are_dropped() {
        let input = series(
            Interval::OneDay,
            vec![
                PricePoint::close_only(day(0), f64::NAN),
                PricePoint::close_only(day(1), 2600.0),
                PricePoint::close_only(day(2), 2605.0),
                PricePoint::close_only(day(3), -1.0),
            ],
        );

        let (cleaned, stats) = clean(input);

        assert_eq!(cleaned.len(), 2);
        assert_eq!(stats.dropped, 2);
        assert_eq!(cleaned.points[0].timestamp, day(1));
    }

    #[test]
    fn daily_timestamps_collapse_to_midnight_preferring_usable_close() {
        let noon = UtcDateTime::from_unix_timestamp(1_717_977_600 + 43_200).expect("valid ts");
        let input = series(
            Interval::OneDay,
            vec![
                PricePoint::close_only(day(0), 2590.0),
                PricePoint::close_only(noon, f64::NAN),
                PricePoint::close_only(day(1), 2601.0),
            ],
        );

        let (cleaned, stats) = clean(input);

        assert_eq!(stats.duplicates, 1);
        assert_eq!(cleaned.len(), 2);
        assert_eq!(cleaned.points[0].close, 2590.0);
    }

    #[test]
    fn intraday_timestamps_are_kept() {
        let half_hour = UtcDateTime::from_unix_timestamp(1_717_977_600 + 1_800).expect("valid ts");
        let input = series(
            Interval::OneHour,
            vec![
                PricePoint::close_only(day(0), 2590.0),
                PricePoint::close_only(half_hour, 2591.0),
            ],
        );

        let (cleaned, _) = clean(input);
        assert_eq!(cleaned.len(), 2);
    }

    #[test]
    fn series_without_usable_points_is_emptied() {
        let input = series(
            Interval::OneDay,
            vec![
                PricePoint::close_only(day(0), 0.0),
                PricePoint::close_only(day(1), f64::NAN),
            ],
        );

        let (cleaned, stats) = clean(input);
        assert!(cleaned.is_empty());
        assert_eq!(stats.dropped, 2);
    }

    #[test]
    fn thirty_days_with_three_gaps_stay_usable() {
        let points = (0..30)
            .map(|n| {
                let close = if [4, 11, 25].contains(&n) { 0.0 } else { 2500.0 + n as f64 };
                PricePoint::close_only(day(n), close)
            })
            .collect();

        let (cleaned, _) = clean(series(Interval::OneDay, points));

        assert!(cleaned.len() >= 27);
        assert!(cleaned.points.iter().all(|point| usable(point.close)));
    }
}
