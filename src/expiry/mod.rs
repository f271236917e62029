// Credential expiry display
use chrono::Utc;

/// Human readable time until `expires_at` (Unix seconds).
/// Empty when the expiry is unknown (0).
pub fn format_time_remaining(expires_at: i64) -> String {
    format_time_remaining_at(expires_at, Utc::now().timestamp())
}

fn format_time_remaining_at(expires_at: i64, now: i64) -> String {
    if expires_at == 0 {
        return String::new();
    }
    if expires_at <= now {
        return "Expired".to_string();
    }

    let duration = expires_at - now;
    let hours = duration / 3600;
    let minutes = (duration % 3600) / 60;
    let seconds = duration % 60;

    if hours > 0 {
        format!("{}h {}m", hours, minutes)
    } else if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else {
        format!("{}s", seconds)
    }
}
