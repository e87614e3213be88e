use std::time::Duration;

pub const BAR_LENGTH: usize = 15;
const INDICATOR: &str = "🔘";
const LINE: &str = "▬";

/// Format a duration as `m:ss` or `h:mm:ss`.
pub fn format_duration(duration: Duration) -> String {
    let total_seconds = duration.as_secs();
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, seconds)
    } else {
        format!("{}:{:02}", minutes, seconds)
    }
}

/// `0:42 ┃ ▬▬▬🔘▬▬▬ ┃ 3:15`. Streams without a known length render as live.
pub fn render(position: Duration, total: Option<Duration>) -> String {
    let elapsed = format_duration(position);
    let total = match total {
        Some(total) if !total.is_zero() => total,
        _ => return format!("{} ┃ 🔴 LIVE", elapsed),
    };

    let ratio = (position.as_secs_f64() / total.as_secs_f64()).clamp(0.0, 1.0);
    let slots = BAR_LENGTH - 1;
    let at = ((ratio * slots as f64).round() as usize).min(slots);
    let bar = format!("{}{}{}", LINE.repeat(at), INDICATOR, LINE.repeat(slots - at));

    format!("{} ┃ {} ┃ {}", elapsed, bar, format_duration(total))
}
