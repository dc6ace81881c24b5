use chrono::{DateTime, Utc};

/// Returns "1.2B", "3.4M", "5.6K", or the plain count below a thousand.
pub fn format_tokens(count: u64) -> String {
    if count >= 1_000_000_000 {
        format!("{:.1}B", count as f64 / 1_000_000_000.0)
    } else if count >= 1_000_000 {
        format!("{:.1}M", count as f64 / 1_000_000.0)
    } else if count >= 1_000 {
        format!("{:.1}K", count as f64 / 1_000.0)
    } else {
        format!("{}", count)
    }
}

/// Returns "just now", "12m ago", "3h 5m ago" or "2d 4h ago" for a past instant.
/// Future instants (clock skew) read as "just now".
pub fn format_sync_age(last_sync: &DateTime<Utc>, now: &DateTime<Utc>) -> String {
    let total_minutes = (*now - *last_sync).num_minutes();
    if total_minutes < 1 {
        return "just now".to_string();
    }

    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours >= 24 {
        let days = hours / 24;
        let remaining_hours = hours % 24;
        if remaining_hours == 0 {
            format!("{}d ago", days)
        } else {
            format!("{}d {}h ago", days, remaining_hours)
        }
    } else if hours > 0 {
        format!("{}h {}m ago", hours, minutes)
    } else {
        format!("{}m ago", total_minutes)
    }
}
