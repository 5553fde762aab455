//! Summary statistics used by the reception report.

use std::time::Duration;

use serde::Serialize;

/// Min, max and mean of a sample set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Stats {
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    pub count: usize,
}

impl Stats {
    /// Single pass over the samples. `None` when there are none.
    pub fn from_samples(samples: impl IntoIterator<Item = f64>) -> Option<Self> {
        let mut iter = samples.into_iter();
        let first = iter.next()?;
        let (min, max, sum, count) = iter.fold((first, first, first, 1usize), |(lo, hi, sum, n), v| {
            (lo.min(v), hi.max(v), sum + v, n + 1)
        });
        Some(Self {
            min,
            max,
            mean: sum / count as f64,
            count,
        })
    }
}

/// Stats over durations, in milliseconds.
pub fn duration_stats_ms(data: &[Duration]) -> Option<Stats> {
    Stats::from_samples(data.iter().map(|d| d.as_secs_f64() * 1_000.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_has_no_stats() {
        assert!(Stats::from_samples(Vec::<f64>::new()).is_none());
        assert!(duration_stats_ms(&[]).is_none());
    }

    #[test]
    fn single_sample() {
        let s = Stats::from_samples([2.5]).unwrap();
        assert_eq!((s.min, s.max, s.mean, s.count), (2.5, 2.5, 2.5, 1));
    }

    #[test]
    fn millisecond_stats() {
        let s = duration_stats_ms(&[
            Duration::from_millis(5),
            Duration::from_millis(15),
            Duration::from_millis(10),
        ])
        .unwrap();
        assert_eq!(s.count, 3);
        assert!((s.min - 5.0).abs() < 1e-9);
        assert!((s.max - 15.0).abs() < 1e-9);
        assert!((s.mean - 10.0).abs() < 1e-9);
    }
}
