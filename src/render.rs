//! HTML rendering of announcements for Telegram.

use chrono::DateTime;

use crate::source::Announcement;

/// Escape text for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// The feed reports publish times as epoch milliseconds (sometimes
/// seconds). Render those as UTC; pass anything else through as-is.
fn format_timestamp(raw: &str) -> String {
    let Ok(n) = raw.parse::<i64>() else {
        return raw.to_string();
    };
    // Millisecond timestamps are 13 digits for any modern date.
    let parsed = if n >= 1_000_000_000_000 {
        DateTime::from_timestamp_millis(n)
    } else {
        DateTime::from_timestamp(n, 0)
    };
    match parsed {
        Some(dt) => dt.format("%Y-%m-%d %H:%M UTC").to_string(),
        None => raw.to_string(),
    }
}

fn body(announcement: &Announcement) -> String {
    format!(
        "<b>Title:</b> {}\n\n\
         <b>Published:</b> {}\n\n\
         👇 <b>Announcement link:</b>\n{}",
        escape_html(&announcement.title),
        escape_html(&format_timestamp(&announcement.created_at)),
        escape_html(&announcement.url),
    )
}

/// Broadcast alert for a newly detected announcement.
pub fn render_alert(announcement: &Announcement) -> String {
    format!(
        "🔥 <b>New Token Splash on Bybit!</b> 🔥\n\n{}",
        body(announcement)
    )
}

/// Reply for the on-demand `/test` lookup.
pub fn render_test_reply(announcement: &Announcement) -> String {
    format!(
        "✅ <b>Latest matching announcement (test message):</b>\n\n{}",
        body(announcement)
    )
}
