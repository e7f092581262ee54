use chrono::{DateTime, Duration, Utc};

pub fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.format("%d.%m.%Y %H:%M UTC").to_string()
}

/// Compact human form, largest units first: `1d 2h`, `45m`, `10s`.
pub fn format_duration(duration: Duration) -> String {
    let total = duration.num_seconds().max(0);
    if total == 0 {
        return "0s".to_string();
    }

    let units = [(86_400, "d"), (3_600, "h"), (60, "m"), (1, "s")];
    let mut remaining = total;
    let mut parts = Vec::new();
    for (size, suffix) in units {
        if remaining >= size {
            parts.push(format!("{}{}", remaining / size, suffix));
            remaining %= size;
        }
        if parts.len() == 2 {
            break;
        }
    }
    parts.join(" ")
}

/// "permanent", or the time left until `until`.
pub fn format_ban_expiry(until: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
    match until {
        None => "permanent".to_string(),
        Some(until) => format!(
            "until {} ({} left)",
            format_datetime(&until),
            format_duration(until - now)
        ),
    }
}
