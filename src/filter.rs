//! Keyword and novelty filtering over a fetched announcement page.

use std::collections::HashSet;

use crate::source::Announcement;

fn title_matches(announcement: &Announcement, keyword_lower: &str) -> bool {
    announcement.title.to_lowercase().contains(keyword_lower)
}

/// Select the announcements worth broadcasting: title contains `keyword`
/// (case-insensitive) and the id has not been delivered before.
///
/// The feed is newest-first; the result is emitted oldest-to-newest so a
/// multi-announcement cycle delivers in chronological order, and so the
/// oldest unsent match is the first one retried after an interrupted cycle.
pub fn select_new(
    announcements: &[Announcement],
    delivered: &HashSet<String>,
    keyword: &str,
) -> Vec<Announcement> {
    let keyword_lower = keyword.to_lowercase();
    announcements
        .iter()
        .rev()
        .filter(|a| !a.id.is_empty() && !delivered.contains(&a.id) && title_matches(a, &keyword_lower))
        .cloned()
        .collect()
}

/// The single newest keyword match, ignoring delivery history. Used by the
/// on-demand `/test` command.
pub fn latest_match<'a>(announcements: &'a [Announcement], keyword: &str) -> Option<&'a Announcement> {
    let keyword_lower = keyword.to_lowercase();
    announcements.iter().find(|a| title_matches(a, &keyword_lower))
}
