use std::collections::HashMap;

use chrono::{Datelike, TimeZone, Utc};

use crate::data::InfoService;
use crate::net;
use crate::view::NodeId;

pub const LOADING_PLACEHOLDER: &str = "Loading...";

const MONTH_NAMES: [&str; 12] = [
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
];

#[derive(Debug, Clone)]
struct HoverEntry {
    loaded: bool,
    visible: bool,
    content: String,
}

/// Per-trigger lazy loader for hover panels. The first hover issues exactly
/// one fetch; every later hover reuses the cached panel. Hiding a panel
/// never destroys its cache.
#[derive(Debug, Default)]
pub struct HoverCache {
    entries: HashMap<NodeId, HoverEntry>,
}

impl HoverCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the user panel for `trigger`, fetching on first encounter.
    pub fn show_user(&mut self, trigger: NodeId, username: &str, info: &dyn InfoService) -> &str {
        let entry = self.entries.entry(trigger).or_insert_with(HoverEntry::fresh);
        entry.visible = true;
        if !entry.loaded {
            // The loaded flag flips before the fetch; a failure keeps the
            // placeholder and is never retried.
            entry.loaded = true;
            if let Ok(user) = info.user_info(username) {
                entry.content = render_user_info(&user);
            }
        }
        &entry.content
    }

    /// Show the item panel for `trigger`, fetching on first encounter.
    pub fn show_item(&mut self, trigger: NodeId, id: i64, info: &dyn InfoService) -> &str {
        let entry = self.entries.entry(trigger).or_insert_with(HoverEntry::fresh);
        entry.visible = true;
        if !entry.loaded {
            entry.loaded = true;
            if let Ok(item) = info.item_info(id) {
                entry.content = render_item_info(&item);
            }
        }
        &entry.content
    }

    /// Hide the panel; the cached content stays.
    pub fn hide(&mut self, trigger: NodeId) {
        if let Some(entry) = self.entries.get_mut(&trigger) {
            entry.visible = false;
        }
    }

    pub fn is_visible(&self, trigger: NodeId) -> bool {
        self.entries
            .get(&trigger)
            .is_some_and(|entry| entry.visible)
    }

    pub fn cached(&self, trigger: NodeId) -> Option<&str> {
        self.entries
            .get(&trigger)
            .filter(|entry| entry.loaded)
            .map(|entry| entry.content.as_str())
    }
}

impl HoverEntry {
    fn fresh() -> Self {
        HoverEntry {
            loaded: false,
            visible: false,
            content: LOADING_PLACEHOLDER.to_string(),
        }
    }
}

pub fn render_user_info(user: &net::User) -> String {
    let mut lines = vec![
        format!("user: {}", user.id),
        format!("created: {}", format_date(user.created)),
        format!("karma: {}", user.karma),
    ];
    if let Some(about) = &user.about {
        lines.push(format!("about: {about}"));
    }
    lines.join("\n")
}

pub fn render_item_info(item: &net::Item) -> String {
    let date = format_date(item.time.unwrap_or(0));
    let by = item.by.as_deref().unwrap_or("");
    match item.item_type.as_str() {
        "comment" => {
            let text = item.text.as_deref().unwrap_or("");
            format!("by: {by}\ndate: {date}\ntext: {text}")
        }
        "story" => {
            let mut lines = vec![format!("title: {}", item.title.as_deref().unwrap_or(""))];
            if let Some(url) = &item.url {
                lines.push(format!("url: {url}"));
            }
            lines.push(format!("by: {by}"));
            lines.push(format!("date: {date}"));
            lines.push(format!("score: {}", item.score.unwrap_or(0)));
            if let Some(kids) = &item.kids {
                lines.push(format!("comments: {}", kids.len()));
            }
            if let Some(text) = &item.text {
                lines.push(format!("text: {text}"));
            }
            lines.join("\n")
        }
        _ => String::new(),
    }
}

/// "January 5, 2020" style, matching the host site's panels.
pub fn format_date(secs: i64) -> String {
    let date = Utc
        .timestamp_opt(secs, 0)
        .single()
        .unwrap_or_else(|| Utc.timestamp_opt(0, 0).single().expect("epoch"));
    format!(
        "{} {}, {}",
        MONTH_NAMES[date.month0() as usize],
        date.day(),
        date.year()
    )
}
