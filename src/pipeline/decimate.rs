use serde::{Deserialize, Serialize};

use crate::error::ValidationError;
use crate::metrics::Sample;

/// Smallest usable decimation target: the first and last sample.
pub const MIN_DECIMATION_TARGET: usize = 2;

/// Reference point used when the look-ahead bucket has no sample with a
/// latency.
///
/// `PreviousPoint` reproduces the established output: the previously
/// selected point doubles as the centroid, which collapses every triangle in
/// the bucket to zero area so the bucket's first point wins. `NextBucketTime`
/// keeps the previous point's latency but moves the centroid to the look-ahead
/// bucket's mean timestamp, so the bucket's extreme still gets picked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CentroidFallback {
    #[default]
    PreviousPoint,
    NextBucketTime,
}

impl CentroidFallback {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            CentroidFallback::PreviousPoint => "previous-point",
            CentroidFallback::NextBucketTime => "next-bucket-time",
        }
    }
}

impl std::str::FromStr for CentroidFallback {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "previous-point" => Ok(CentroidFallback::PreviousPoint),
            "next-bucket-time" => Ok(CentroidFallback::NextBucketTime),
            _ => Err(ValidationError::InvalidCentroidFallback {
                value: s.to_owned(),
            }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct Point {
    x: f64,
    y: f64,
}

impl Point {
    fn of(sample: &Sample) -> Self {
        Self {
            x: sample.timestamp_ms() as f64,
            y: sample.latency_ms.unwrap_or(0.0),
        }
    }
}

/// Clamps a requested target to at least [`MIN_DECIMATION_TARGET`].
#[must_use]
pub fn clamp_target(target: i64) -> usize {
    usize::try_from(target)
        .unwrap_or(MIN_DECIMATION_TARGET)
        .max(MIN_DECIMATION_TARGET)
}

/// Reduces `samples` to `target` points, keeping local peaks and troughs.
///
/// Largest-triangle-three-buckets: the first and last samples are kept, the
/// interior is cut into `target - 2` buckets whose boundaries are
/// `floor(i * (n - 2) / (target - 2)) + 1`, and each bucket contributes the
/// point spanning the largest triangle with the previously kept point and the
/// next bucket's centroid. Missing latency counts as 0. Inputs no longer than
/// `target` come back unchanged.
#[must_use]
pub fn decimate(samples: &[Sample], target: usize, fallback: CentroidFallback) -> Vec<Sample> {
    let target = target.max(MIN_DECIMATION_TARGET);
    let len = samples.len();
    if len <= target {
        return samples.to_vec();
    }
    let (Some(first), Some(last)) = (samples.first(), samples.last()) else {
        return Vec::new();
    };

    let buckets = target.saturating_sub(2);
    let bucket_size = len.saturating_sub(2) as f64 / buckets.max(1) as f64;
    let boundary = |index: usize| -> usize {
        let offset = (index as f64 * bucket_size).floor() as usize;
        offset.saturating_add(1).min(len)
    };

    let mut sampled = Vec::with_capacity(target);
    sampled.push(*first);
    let mut anchor = 0usize;

    for bucket in 0..buckets {
        let Some(anchor_sample) = samples.get(anchor) else {
            break;
        };
        let anchor_point = Point::of(anchor_sample);

        let next_range = samples
            .get(boundary(bucket.saturating_add(1))..boundary(bucket.saturating_add(2)))
            .unwrap_or(&[]);
        let centroid = next_bucket_centroid(next_range)
            .unwrap_or_else(|| fallback_centroid(fallback, anchor_point, next_range));

        let start = boundary(bucket);
        let end = boundary(bucket.saturating_add(1));
        let mut max_area = -1.0;
        let mut selected = None;
        for index in start..end {
            let Some(candidate) = samples.get(index) else {
                continue;
            };
            let area = triangle_area(anchor_point, Point::of(candidate), centroid);
            if area > max_area {
                max_area = area;
                selected = Some(index);
            }
        }

        if let Some(index) = selected
            && let Some(sample) = samples.get(index)
        {
            sampled.push(*sample);
            anchor = index;
        }
    }

    sampled.push(*last);
    sampled
}

fn next_bucket_centroid(range: &[Sample]) -> Option<Point> {
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    let mut count = 0usize;
    for sample in range {
        if let Some(latency) = sample.latency_ms {
            sum_x += sample.timestamp_ms() as f64;
            sum_y += latency;
            count = count.saturating_add(1);
        }
    }
    if count == 0 {
        return None;
    }
    Some(Point {
        x: sum_x / count as f64,
        y: sum_y / count as f64,
    })
}

fn fallback_centroid(policy: CentroidFallback, anchor: Point, range: &[Sample]) -> Point {
    match policy {
        CentroidFallback::PreviousPoint => anchor,
        CentroidFallback::NextBucketTime => {
            if range.is_empty() {
                return anchor;
            }
            let sum_x: f64 = range
                .iter()
                .map(|sample| sample.timestamp_ms() as f64)
                .sum();
            Point {
                x: sum_x / range.len() as f64,
                y: anchor.y,
            }
        }
    }
}

fn triangle_area(anchor: Point, candidate: Point, centroid: Point) -> f64 {
    ((anchor.x - centroid.x) * (candidate.y - anchor.y)
        - (anchor.x - candidate.x) * (centroid.y - anchor.y))
        .abs()
        * 0.5
}
