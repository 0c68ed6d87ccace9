//! Display and speech formatting.

/// Pace as `m:ss`, e.g. `330.0` -> `"5:30"`. Non-finite or negative input
/// yields `"--:--"`.
pub fn format_pace(seconds_per_km: f64) -> String {
    if !seconds_per_km.is_finite() || seconds_per_km < 0.0 {
        return "--:--".to_string();
    }
    let total = seconds_per_km.round() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

/// Optional pace, `"--:--"` when there is no reading yet.
pub fn format_pace_opt(seconds_per_km: Option<f64>) -> String {
    seconds_per_km.map_or_else(|| "--:--".to_string(), format_pace)
}

/// Elapsed time as `mm:ss`, or `h:mm:ss` from one hour on.
pub fn format_duration(seconds: u64) -> String {
    let h = seconds / 3600;
    let m = (seconds % 3600) / 60;
    let s = seconds % 60;
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{:02}:{:02}", m, s)
    }
}

/// Meters to kilometers with two decimals, as stored in history.
pub fn km_two_decimals(meters: f64) -> f64 {
    (meters / 10.0).round() / 100.0
}

/// Pace in words for the voice output, e.g. "5 minutes 30 seconds".
pub fn spoken_pace(seconds_per_km: f64) -> String {
    let total = seconds_per_km.max(0.0).round() as u64;
    let minutes = total / 60;
    let seconds = total % 60;
    let unit = |n: u64, one: &str, many: &str| {
        if n == 1 {
            format!("{} {}", n, one)
        } else {
            format!("{} {}", n, many)
        }
    };
    match (minutes, seconds) {
        (0, s) => unit(s, "second", "seconds"),
        (m, 0) => unit(m, "minute", "minutes"),
        (m, s) => format!("{} {}", unit(m, "minute", "minutes"), unit(s, "second", "seconds")),
    }
}
