//! Trend, anomaly, forecast and aggregation analysis over metric history
//!
//! All computation is pure and synchronous. Points are re-sorted by
//! timestamp before analysis regardless of what storage returned; the x
//! axis is days since the first point.

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{PlatformError, Result};
use crate::models::{TimeSeries, TimeSeriesPoint};

const SECONDS_PER_DAY: f64 = 86_400.0;

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    pub min_data_points: usize,
    pub anomaly_sigma_threshold: f64,
    pub trend_significance_threshold: f64,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            min_data_points: 7,
            anomaly_sigma_threshold: 2.5,
            trend_significance_threshold: 0.6,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
    Stable,
    Volatile,
}

impl TrendDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Increasing => "increasing",
            Self::Decreasing => "decreasing",
            Self::Stable => "stable",
            Self::Volatile => "volatile",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrendAnalysis {
    pub direction: TrendDirection,
    /// Change per day
    pub slope: f64,
    pub intercept: f64,
    pub r_squared: f64,
    /// (last - first) / |first| * 100
    pub percent_change: f64,
    pub is_significant: bool,
}

/// How anomalies are detected
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "method")]
pub enum AnomalyMethod {
    ZScore { threshold: f64 },
    MovingAverage { window: usize },
    Iqr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Anomaly {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// What the method expected at that point (mean / MA / nearest fence)
    pub expected: f64,
    /// Normalized deviation: z-score, sigma distance or IQR distance
    pub deviation: f64,
    pub severity: String,
    /// "spike" above expectation, "drop" below
    pub anomaly_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    /// Decays with horizon: R² · exp(−0.1·k)
    pub confidence: f64,
    pub lower: f64,
    pub upper: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Forecast {
    pub points: Vec<ForecastPoint>,
    pub slope: f64,
    pub r_squared: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesComparison {
    pub mean_a: f64,
    pub mean_b: f64,
    /// (mean_b - mean_a) / |mean_a| * 100
    pub mean_change_percent: f64,
    /// Pearson correlation over days both series cover
    pub correlation: f64,
    pub overlapping_days: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Aggregation {
    Sum,
    Mean,
    Min,
    Max,
    Median,
}

pub struct TimeSeriesAnalyzer {
    config: AnalyzerConfig,
}

impl Default for TimeSeriesAnalyzer {
    fn default() -> Self {
        Self::new(AnalyzerConfig::default())
    }
}

impl TimeSeriesAnalyzer {
    pub fn new(config: AnalyzerConfig) -> Self {
        Self { config }
    }

    // ------------------------------------------------------------------
    // Trend
    // ------------------------------------------------------------------

    /// Classify the trend over the trailing `window_days` (0 = everything)
    pub fn detect_trend(&self, series: &TimeSeries, window_days: i64) -> Result<TrendAnalysis> {
        let points = windowed_points(series, window_days);
        if points.len() < 2 {
            return Err(PlatformError::InsufficientData(format!(
                "trend detection needs at least 2 points, got {}",
                points.len()
            )));
        }

        let (slope, intercept, r_squared) = linear_regression(&points);

        let first = points.first().map(|p| p.value).unwrap_or(0.0);
        let last = points.last().map(|p| p.value).unwrap_or(0.0);
        let percent_change =
            if first.abs() > f64::EPSILON { (last - first) / first.abs() * 100.0 } else { 0.0 };

        let significant = r_squared >= self.config.trend_significance_threshold;
        let direction = if significant {
            if slope.abs() < 0.01 {
                TrendDirection::Stable
            } else if slope > 0.0 {
                TrendDirection::Increasing
            } else {
                TrendDirection::Decreasing
            }
        } else if r_squared < 0.3 {
            TrendDirection::Volatile
        } else {
            TrendDirection::Stable
        };

        Ok(TrendAnalysis {
            direction,
            slope,
            intercept,
            r_squared,
            percent_change,
            is_significant: significant,
        })
    }

    // ------------------------------------------------------------------
    // Anomalies
    // ------------------------------------------------------------------

    pub fn detect_anomalies(&self, series: &TimeSeries, method: AnomalyMethod) -> Vec<Anomaly> {
        let points = sorted_points(series);
        match method {
            AnomalyMethod::ZScore { threshold } => self.zscore_anomalies(&points, threshold),
            AnomalyMethod::MovingAverage { window } => {
                self.moving_average_anomalies(&points, window.max(1))
            },
            AnomalyMethod::Iqr => iqr_anomalies(&points),
        }
    }

    fn zscore_anomalies(&self, points: &[TimeSeriesPoint], threshold: f64) -> Vec<Anomaly> {
        if points.len() < 2 {
            return Vec::new();
        }
        let values: Vec<f64> = points.iter().map(|p| p.value).collect();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let std =
            (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64).sqrt();
        if std <= f64::EPSILON {
            return Vec::new();
        }

        points
            .iter()
            .filter_map(|p| {
                let z = (p.value - mean) / std;
                if z.abs() > threshold {
                    Some(Anomaly {
                        timestamp: p.timestamp,
                        value: p.value,
                        expected: mean,
                        deviation: z,
                        severity: sigma_severity(z.abs()).to_string(),
                        anomaly_type: direction_label(z),
                    })
                } else {
                    None
                }
            })
            .collect()
    }

    fn moving_average_anomalies(
        &self,
        points: &[TimeSeriesPoint],
        window: usize,
    ) -> Vec<Anomaly> {
        if points.len() <= window {
            return Vec::new();
        }

        let mut anomalies = Vec::new();
        for i in window..points.len() {
            let slice: Vec<f64> = points[i - window..i].iter().map(|p| p.value).collect();
            let ma = slice.iter().sum::<f64>() / window as f64;
            let std =
                (slice.iter().map(|v| (v - ma).powi(2)).sum::<f64>() / window as f64).sqrt();
            if std <= f64::EPSILON {
                continue;
            }
            let deviation = (points[i].value - ma) / std;
            if deviation.abs() > self.config.anomaly_sigma_threshold {
                anomalies.push(Anomaly {
                    timestamp: points[i].timestamp,
                    value: points[i].value,
                    expected: ma,
                    deviation,
                    severity: sigma_severity(deviation.abs()).to_string(),
                    anomaly_type: direction_label(deviation),
                });
            }
        }
        anomalies
    }

    // ------------------------------------------------------------------
    // Forecast
    // ------------------------------------------------------------------

    /// Linear extrapolation at daily steps with a confidence band that
    /// widens with the horizon
    pub fn forecast(&self, series: &TimeSeries, steps: usize) -> Result<Forecast> {
        let points = sorted_points(series);
        if points.len() < self.config.min_data_points {
            return Err(PlatformError::InsufficientData(format!(
                "forecast needs at least {} points, got {}",
                self.config.min_data_points,
                points.len()
            )));
        }

        let (slope, intercept, r_squared) = linear_regression(&points);

        let first_ts = points[0].timestamp;
        let last = points.last().expect("non-empty points");
        let last_x = days_since(first_ts, last.timestamp);

        // Residual spread around the fitted line
        let residual_var = points
            .iter()
            .map(|p| {
                let fitted = intercept + slope * days_since(first_ts, p.timestamp);
                (p.value - fitted).powi(2)
            })
            .sum::<f64>()
            / points.len() as f64;
        let sigma = residual_var.sqrt();

        let mut forecast_points = Vec::with_capacity(steps);
        for k in 1..=steps {
            let x = last_x + k as f64;
            let value = intercept + slope * x;
            let confidence = (r_squared * (-0.1 * k as f64).exp()).clamp(0.0, 1.0);
            let half_width = 1.96 * sigma * (1.0 + 0.1 * k as f64).sqrt();
            forecast_points.push(ForecastPoint {
                timestamp: last.timestamp + Duration::days(k as i64),
                value,
                confidence,
                lower: value - half_width,
                upper: value + half_width,
            });
        }

        Ok(Forecast { points: forecast_points, slope, r_squared })
    }

    // ------------------------------------------------------------------
    // Comparison and aggregation
    // ------------------------------------------------------------------

    /// Compare two series over the days both cover
    pub fn compare(&self, a: &TimeSeries, b: &TimeSeries) -> Result<SeriesComparison> {
        let daily_a = daily_means(a);
        let daily_b = daily_means(b);

        let mut paired = Vec::new();
        for (day, value_a) in &daily_a {
            if let Some(value_b) = daily_b.get(day) {
                paired.push((*value_a, *value_b));
            }
        }
        if paired.is_empty() {
            return Err(PlatformError::InsufficientData(
                "series do not overlap in time".to_string(),
            ));
        }

        let mean_a = paired.iter().map(|(x, _)| x).sum::<f64>() / paired.len() as f64;
        let mean_b = paired.iter().map(|(_, y)| y).sum::<f64>() / paired.len() as f64;

        let mut cov = 0.0;
        let mut var_a = 0.0;
        let mut var_b = 0.0;
        for (x, y) in &paired {
            cov += (x - mean_a) * (y - mean_b);
            var_a += (x - mean_a).powi(2);
            var_b += (y - mean_b).powi(2);
        }
        let correlation =
            if var_a > 0.0 && var_b > 0.0 { cov / (var_a.sqrt() * var_b.sqrt()) } else { 0.0 };

        Ok(SeriesComparison {
            mean_a,
            mean_b,
            mean_change_percent: if mean_a.abs() > f64::EPSILON {
                (mean_b - mean_a) / mean_a.abs() * 100.0
            } else {
                0.0
            },
            correlation,
            overlapping_days: paired.len(),
        })
    }

    /// Merge a set of series into one, bucketing points to UTC days
    pub fn aggregate(&self, series: &[TimeSeries], how: Aggregation) -> TimeSeries {
        let mut buckets: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
        for ts in series {
            for point in &ts.points {
                buckets
                    .entry(round_to_day(point.timestamp))
                    .or_default()
                    .push(point.value);
            }
        }

        let points = buckets
            .into_iter()
            .map(|(timestamp, values)| TimeSeriesPoint {
                timestamp,
                value: apply_aggregation(&values, how),
            })
            .collect();

        let metric_name = series
            .first()
            .map(|ts| ts.metric_name.clone())
            .unwrap_or_default();
        TimeSeries::new(metric_name, points)
    }
}

// ----------------------------------------------------------------------
// Shared helpers
// ----------------------------------------------------------------------

fn sorted_points(series: &TimeSeries) -> Vec<TimeSeriesPoint> {
    let mut points = series.points.clone();
    points.sort_by_key(|p| p.timestamp);
    points
}

fn windowed_points(series: &TimeSeries, window_days: i64) -> Vec<TimeSeriesPoint> {
    let points = sorted_points(series);
    if window_days <= 0 {
        return points;
    }
    let Some(last) = points.last() else {
        return points;
    };
    let cutoff = last.timestamp - Duration::days(window_days);
    points.into_iter().filter(|p| p.timestamp >= cutoff).collect()
}

fn days_since(origin: DateTime<Utc>, ts: DateTime<Utc>) -> f64 {
    (ts - origin).num_seconds() as f64 / SECONDS_PER_DAY
}

/// Least squares over (days since first point, value); returns
/// (slope per day, intercept, R²)
pub fn linear_regression(points: &[TimeSeriesPoint]) -> (f64, f64, f64) {
    let n = points.len() as f64;
    if points.len() < 2 {
        return (0.0, points.first().map(|p| p.value).unwrap_or(0.0), 0.0);
    }

    let origin = points[0].timestamp;
    let xs: Vec<f64> = points.iter().map(|p| days_since(origin, p.timestamp)).collect();
    let ys: Vec<f64> = points.iter().map(|p| p.value).collect();

    let mean_x = xs.iter().sum::<f64>() / n;
    let mean_y = ys.iter().sum::<f64>() / n;

    let mut cov = 0.0;
    let mut var_x = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        cov += (x - mean_x) * (y - mean_y);
        var_x += (x - mean_x).powi(2);
    }
    if var_x <= f64::EPSILON {
        return (0.0, mean_y, 0.0);
    }

    let slope = cov / var_x;
    let intercept = mean_y - slope * mean_x;

    let mut ss_res = 0.0;
    let mut ss_tot = 0.0;
    for (x, y) in xs.iter().zip(ys.iter()) {
        let fitted = intercept + slope * x;
        ss_res += (y - fitted).powi(2);
        ss_tot += (y - mean_y).powi(2);
    }
    let r_squared = if ss_tot > 0.0 { 1.0 - ss_res / ss_tot } else { 1.0 };

    (slope, intercept, r_squared)
}

fn iqr_anomalies(points: &[TimeSeriesPoint]) -> Vec<Anomaly> {
    if points.len() < 4 {
        return Vec::new();
    }
    let mut values: Vec<f64> = points.iter().map(|p| p.value).collect();
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    let q1 = values[n / 4];
    let q3 = values[3 * n / 4];
    let iqr = q3 - q1;
    if iqr <= f64::EPSILON {
        return Vec::new();
    }
    let low_fence = q1 - 1.5 * iqr;
    let high_fence = q3 + 1.5 * iqr;

    points
        .iter()
        .filter_map(|p| {
            let (expected, distance) = if p.value < low_fence {
                (low_fence, (low_fence - p.value) / iqr)
            } else if p.value > high_fence {
                (high_fence, (p.value - high_fence) / iqr)
            } else {
                return None;
            };
            Some(Anomaly {
                timestamp: p.timestamp,
                value: p.value,
                expected,
                deviation: distance,
                severity: iqr_severity(distance).to_string(),
                anomaly_type: direction_label(p.value - expected),
            })
        })
        .collect()
}

/// Sigma buckets: > 4 critical, > 3.5 high, > 3 medium, else low
fn sigma_severity(sigma: f64) -> &'static str {
    if sigma > 4.0 {
        "critical"
    } else if sigma > 3.5 {
        "high"
    } else if sigma > 3.0 {
        "medium"
    } else {
        "low"
    }
}

/// Distance past the fence, normalized by the IQR
fn iqr_severity(distance: f64) -> &'static str {
    if distance >= 2.0 {
        "critical"
    } else if distance >= 1.0 {
        "high"
    } else {
        "medium"
    }
}

fn direction_label(signed: f64) -> String {
    if signed > 0.0 { "spike".to_string() } else { "drop".to_string() }
}

fn round_to_day(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.with_hour(0)
        .and_then(|t| t.with_minute(0))
        .and_then(|t| t.with_second(0))
        .and_then(|t| t.with_nanosecond(0))
        .unwrap_or(ts)
}

fn daily_means(series: &TimeSeries) -> BTreeMap<DateTime<Utc>, f64> {
    let mut buckets: BTreeMap<DateTime<Utc>, Vec<f64>> = BTreeMap::new();
    for point in &series.points {
        buckets
            .entry(round_to_day(point.timestamp))
            .or_default()
            .push(point.value);
    }
    buckets
        .into_iter()
        .map(|(day, values)| (day, values.iter().sum::<f64>() / values.len() as f64))
        .collect()
}

fn apply_aggregation(values: &[f64], how: Aggregation) -> f64 {
    match how {
        Aggregation::Sum => values.iter().sum(),
        Aggregation::Mean => values.iter().sum::<f64>() / values.len().max(1) as f64,
        Aggregation::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Aggregation::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        Aggregation::Median => {
            let mut sorted = values.to_vec();
            sorted.sort_by(|a, b| a.total_cmp(b));
            let n = sorted.len();
            if n % 2 == 1 {
                sorted[n / 2]
            } else {
                (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
            }
        },
    }
}
