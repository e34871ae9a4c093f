//! Plain-text rendering of dashboard state.

use chrono::{DateTime, Local, NaiveDate};
use std::fmt::Write;
use weatherdash_core::{
    AppState, ForecastDay, PermissionStatus, Theme, Unit, WeatherSnapshot,
    favorites::FavoriteEntry, history::SearchHistory,
};

/// Steps for re-enabling location on the current platform.
pub fn location_help(os: &str) -> &'static [&'static str] {
    match os {
        "macos" => &[
            "Open System Settings > Privacy & Security > Location Services",
            "Turn Location Services on for your terminal",
            "Run `weatherdash location allow`",
        ],
        "windows" => &[
            "Open Settings > Privacy & security > Location",
            "Turn on 'Let apps access your location'",
            "Run `weatherdash location allow`",
        ],
        _ => &[
            "Make sure location services (e.g. GeoClue) are enabled",
            "Save your position with `weatherdash location set <lat> <lon>`",
            "Run `weatherdash location allow`",
        ],
    }
}

pub fn temperature(value: i32, unit: Unit) -> String {
    format!("{value}{}", unit.temperature_symbol())
}

pub fn wind(speed: f64, unit: Unit) -> String {
    format!("{speed:.1} {}", unit.speed_symbol())
}

/// Local wall-clock time of a unix timestamp.
pub fn clock(timestamp: i64) -> String {
    DateTime::from_timestamp(timestamp, 0)
        .map(|t| t.with_timezone(&Local).format("%H:%M").to_string())
        .unwrap_or_else(|| "--:--".to_string())
}

pub fn day_label(date: NaiveDate) -> String {
    date.format("%a, %b %d").to_string()
}

pub fn current_weather(w: &WeatherSnapshot, unit: Unit) -> String {
    let mut out = String::new();

    let place = match &w.region {
        Some(region) => format!("{}, {} ({region})", w.city, w.country),
        None => format!("{}, {}", w.city, w.country),
    };
    let _ = writeln!(out, "{place}");
    let _ = writeln!(
        out,
        "  {}  {}  feels like {}",
        temperature(w.temperature, unit),
        w.description,
        temperature(w.feels_like, unit)
    );
    let _ = writeln!(
        out,
        "  H {}  L {}",
        temperature(w.temp_max, unit),
        temperature(w.temp_min, unit)
    );

    let mut wind_line = format!("  Wind {} {}°", wind(w.wind_speed, unit), w.wind_deg);
    if let Some(gust) = w.wind_gust {
        let _ = write!(wind_line, " (gusts {})", wind(gust, unit));
    }
    let _ = writeln!(out, "{wind_line}");

    let _ = writeln!(
        out,
        "  Humidity {}%  Pressure {} hPa  Clouds {}%",
        w.humidity, w.pressure, w.clouds
    );
    if let Some(visibility) = w.visibility {
        let _ = writeln!(out, "  Visibility {:.1} km", f64::from(visibility) / 1000.0);
    }
    let _ = writeln!(out, "  Sunrise {}  Sunset {}", clock(w.sunrise), clock(w.sunset));
    for alert in &w.alerts {
        let _ = writeln!(
            out,
            "  ! {} ({}) until {}",
            alert.event,
            alert.sender,
            clock(alert.end)
        );
    }
    let _ = writeln!(out, "  {}", w.icon_url());

    out
}

fn forecast_row(day: &ForecastDay, unit: Unit) -> String {
    format!(
        "  {:<12} {:>6} / {:<6} avg {:<6} {:<16} hum {}%  wind {} {}",
        day_label(day.date),
        temperature(day.temp_max, unit),
        temperature(day.temp_min, unit),
        temperature(day.avg_temp, unit),
        day.description,
        day.avg_humidity,
        day.avg_wind_speed,
        unit.speed_symbol()
    )
}

/// The current forecast page with its position, e.g. "page 1/2".
pub fn forecast_page(state: &AppState) -> String {
    if state.forecast.is_empty() {
        return String::new();
    }

    let mut out = format!(
        "Forecast (page {}/{})\n",
        state.current_page + 1,
        state.page_count()
    );
    for day in state.visible_forecast() {
        let _ = writeln!(out, "{}", forecast_row(day, state.unit));
    }
    out
}

pub fn favorites(entries: &[FavoriteEntry]) -> String {
    if entries.is_empty() {
        return "No favorite cities yet.\n".to_string();
    }

    let mut out = String::from("Favorites\n");
    for f in entries {
        let _ = writeln!(
            out,
            "  * {}, {}  {}  (added {})",
            f.city,
            f.country,
            temperature(f.temp, f.unit),
            f.added_at.with_timezone(&Local).format("%Y-%m-%d")
        );
    }
    out
}

pub fn history(history: &SearchHistory) -> String {
    if history.is_empty() {
        return "No recent searches.\n".to_string();
    }

    let mut out = String::from("Recent searches\n");
    for (i, city) in history.iter().enumerate() {
        let _ = writeln!(out, "  {}. {city}", i + 1);
    }
    out
}

pub fn blocked(os: &str) -> String {
    let mut out = String::from("Location access is blocked.\nTo enable location-based weather:\n");
    for (i, step) in location_help(os).iter().enumerate() {
        let _ = writeln!(out, "  {}. {step}", i + 1);
    }
    out.push_str("You can still search for any city manually.\n");
    out
}

fn header(state: &AppState) -> String {
    let mode = match state.theme {
        Theme::Light => "light",
        Theme::Dark => "dark",
    };
    format!("== weatherdash ==  [{} | {mode}]\n", state.unit)
}

/// Whole dashboard, in the order the sections are meant to be read.
pub fn dashboard(state: &AppState) -> String {
    let mut out = header(state);

    if let Some(error) = &state.error {
        let _ = writeln!(out, "! {error}");
    }

    if state.loading {
        out.push_str("Loading...\n");
    } else if let Some(current) = &state.current_weather {
        if state.is_favorite(&current.city) {
            out.push_str("[favorite] ");
        }
        out.push_str(&current_weather(current, state.unit));
        out.push_str(&forecast_page(state));
    } else if state.error.is_none() {
        out.push_str("Search for a city to see the weather forecast.\n");
        if state.location_permission == PermissionStatus::Denied {
            out.push_str(&blocked(std::env::consts::OS));
        }
    }

    out.push('\n');
    out.push_str(&favorites(state.favorites.as_slice()));
    out.push_str(&history(&state.history));
    out
}
