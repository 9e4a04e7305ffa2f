//! Turns a release diff into categorized, sanitized text lines.

use crate::core::{ChangeEntry, DiffSet};
use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;
use std::fmt;

static TAG_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^>]*>").expect("tag pattern is valid"));

/// The release note categories that are relayed. Anything else is dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Improvements,
    Fixes,
}

impl Category {
    /// All categories, in the order their fields appear in a message.
    pub const ALL: [Category; 2] = [Category::Improvements, Category::Fixes];

    /// Maps an entry's `type` tag to a known category.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "Improvements" => Some(Category::Improvements),
            "Fixes" => Some(Category::Fixes),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Improvements => "Improvements",
            Category::Fixes => "Fixes",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Formatted lines grouped by category, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryBuckets {
    improvements: Vec<String>,
    fixes: Vec<String>,
}

impl CategoryBuckets {
    pub fn lines(&self, category: Category) -> &[String] {
        match category {
            Category::Improvements => &self.improvements,
            Category::Fixes => &self.fixes,
        }
    }

    /// Returns `true` if no category received a line.
    pub fn is_empty(&self) -> bool {
        self.improvements.is_empty() && self.fixes.is_empty()
    }

    /// Iterates over the non-empty buckets in `Category::ALL` order.
    pub fn non_empty(&self) -> impl Iterator<Item = (Category, &[String])> + '_ {
        Category::ALL
            .into_iter()
            .map(move |category| (category, self.lines(category)))
            .filter(|(_, lines)| !lines.is_empty())
    }

    fn push(&mut self, tag: &str, line: impl FnOnce() -> String) {
        let bucket = match Category::from_tag(tag) {
            Some(Category::Improvements) => &mut self.improvements,
            Some(Category::Fixes) => &mut self.fixes,
            None => return,
        };
        bucket.push(line());
    }
}

/// Removes anything that looks like a markup tag (`<...>`).
///
/// Entities are left as-is and an unclosed `<` is kept literally.
pub fn strip_tags(content: &str) -> Cow<'_, str> {
    TAG_RE.replace_all(content, "")
}

/// Wraps `content` in a fenced code block tagged with `lang`.
pub fn code_block(lang: &str, content: &str) -> String {
    format!("```{}\n{}\n```", lang, content)
}

/// Formats a diff into per-category lines.
///
/// Modified entries come first, then added, then removed, each in the order
/// they appear in the diff.
pub fn format_diff(diffs: &DiffSet) -> CategoryBuckets {
    let mut buckets = CategoryBuckets::default();

    for modified in &diffs.modified {
        let entry = &modified.value;
        buckets.push(&entry.category, || {
            format!(
                "* [{} -> {}] {}",
                modified.old_status,
                entry.status,
                strip_tags(&entry.content)
            )
        });
    }

    for entry in &diffs.added {
        buckets.push(&entry.category, || status_line('+', entry));
    }

    for entry in &diffs.removed {
        buckets.push(&entry.category, || status_line('-', entry));
    }

    buckets
}

fn status_line(marker: char, entry: &ChangeEntry) -> String {
    format!("{} [{}] {}", marker, entry.status, strip_tags(&entry.content))
}
