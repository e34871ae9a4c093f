//! Daily aggregation of 3-hourly forecast samples.

use chrono::{DateTime, NaiveDate, TimeZone};
use std::collections::BTreeMap;

use crate::model::ForecastDay;

/// One raw forecast sample, already pulled out of the provider payload.
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    /// Epoch seconds.
    pub timestamp: i64,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub clouds: f64,
    pub icon: String,
    pub description: String,
}

/// Rounds like JavaScript's `Math.round`: halves go towards positive infinity.
pub fn round_half_up(value: f64) -> i32 {
    (value + 0.5).floor() as i32
}

/// Group samples by calendar date in `tz` and aggregate each day.
///
/// Days come out in chronological order. The representative icon and
/// description are taken from the sample at index `count / 2` of the day,
/// in the order the samples were given.
pub fn aggregate_daily<Tz: TimeZone>(samples: &[ForecastSample], tz: &Tz) -> Vec<ForecastDay> {
    let mut days: BTreeMap<NaiveDate, Vec<&ForecastSample>> = BTreeMap::new();

    for sample in samples {
        let Some(utc) = DateTime::from_timestamp(sample.timestamp, 0) else {
            tracing::debug!(timestamp = sample.timestamp, "Skipping forecast sample with invalid timestamp");
            continue;
        };
        let date = utc.with_timezone(tz).date_naive();
        days.entry(date).or_default().push(sample);
    }

    days.into_iter()
        .map(|(date, day)| summarize_day(date, &day))
        .collect()
}

fn summarize_day(date: NaiveDate, samples: &[&ForecastSample]) -> ForecastDay {
    let temps: Vec<f64> = samples.iter().map(|s| s.temperature).collect();
    let max = temps.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let min = temps.iter().copied().fold(f64::INFINITY, f64::min);

    let midpoint = samples[samples.len() / 2];

    ForecastDay {
        date,
        temp_max: round_half_up(max),
        temp_min: round_half_up(min),
        avg_temp: round_half_up(mean(&temps)),
        feels_like: mean_of(samples, |s| s.feels_like),
        icon: midpoint.icon.clone(),
        description: midpoint.description.clone(),
        avg_humidity: mean_of(samples, |s| s.humidity),
        avg_wind_speed: mean_of(samples, |s| s.wind_speed),
        avg_pressure: mean_of(samples, |s| s.pressure),
        avg_clouds: mean_of(samples, |s| s.clouds),
    }
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

fn mean_of(samples: &[&ForecastSample], field: impl Fn(&ForecastSample) -> f64) -> i32 {
    let values: Vec<f64> = samples.iter().map(|s| field(s)).collect();
    round_half_up(mean(&values))
}
