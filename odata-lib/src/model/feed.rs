//! Feed of entries returned by a collection query

use super::Entry;
use super::FeedAnnotations;

/// A page of entries with its feed-level annotations.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Feed {
    entries: Vec<Entry>,
    annotations: FeedAnnotations,
}

impl Feed {
    /// Creates a new feed with the given entries.
    pub fn new(entries: Vec<Entry>) -> Self {
        Self {
            entries,
            annotations: FeedAnnotations::default(),
        }
    }

    /// Sets the feed annotations.
    pub fn with_annotations(mut self, annotations: FeedAnnotations) -> Self {
        self.annotations = annotations;
        self
    }

    /// Returns the entries in this feed.
    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    /// Consumes the feed and returns the entries.
    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }

    /// Returns the feed annotations.
    pub fn annotations(&self) -> &FeedAnnotations {
        &self.annotations
    }

    pub(crate) fn annotations_mut(&mut self) -> &mut FeedAnnotations {
        &mut self.annotations
    }

    pub(crate) fn entries_mut(&mut self) -> &mut Vec<Entry> {
        &mut self.entries
    }

    /// Returns the next page link, if any.
    pub fn next_link(&self) -> Option<&str> {
        self.annotations.next_link.as_deref()
    }

    /// Returns the total count, if requested.
    pub fn total_count(&self) -> Option<i64> {
        self.annotations.count
    }

    /// Returns `true` if there are more results after this page.
    pub fn has_more(&self) -> bool {
        self.annotations.next_link.is_some()
    }

    /// Returns the number of entries in this feed.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if this feed has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl IntoIterator for Feed {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}
