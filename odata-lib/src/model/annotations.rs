//! Protocol annotations kept apart from entry data

/// Links published for one association of an entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AssociationLink {
    /// Navigation property name.
    pub name: String,
    /// URI of the association (`$links` / `$ref`) resource.
    pub association_link: Option<String>,
    /// URI of the related entity or collection.
    pub navigation_link: Option<String>,
}

/// Media resource pointers of a media-link entry.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MediaAnnotations {
    pub read_link: Option<String>,
    pub edit_link: Option<String>,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Annotations of a single entry.
///
/// Several payload fragments may describe the same logical entry (for
/// example an Atom entry with its inline links, or a V3 verbose entry with
/// `__metadata` and `__deferred` members). [`merge`](Self::merge) reconciles
/// them: the first non-null value wins and association links accumulate by
/// name.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct EntryAnnotations {
    /// Identity URI of the entry.
    pub id: Option<String>,
    /// Qualified type name.
    pub type_name: Option<String>,
    pub edit_link: Option<String>,
    pub read_link: Option<String>,
    /// Concurrency token.
    pub etag: Option<String>,
    pub association_links: Vec<AssociationLink>,
    pub media: Option<MediaAnnotations>,
}

fn keep_first(slot: &mut Option<String>, other: Option<String>) {
    if slot.is_none() {
        *slot = other;
    }
}

impl EntryAnnotations {
    /// Returns `true` if no annotation is set.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merges `other` into `self` without overwriting values already present.
    pub fn merge(&mut self, other: EntryAnnotations) {
        keep_first(&mut self.id, other.id);
        keep_first(&mut self.type_name, other.type_name);
        keep_first(&mut self.edit_link, other.edit_link);
        keep_first(&mut self.read_link, other.read_link);
        keep_first(&mut self.etag, other.etag);

        for link in other.association_links {
            match self
                .association_links
                .iter_mut()
                .find(|l| l.name == link.name)
            {
                Some(existing) => {
                    keep_first(&mut existing.association_link, link.association_link);
                    keep_first(&mut existing.navigation_link, link.navigation_link);
                }
                None => self.association_links.push(link),
            }
        }

        if let Some(theirs) = other.media {
            match &mut self.media {
                Some(mine) => {
                    keep_first(&mut mine.read_link, theirs.read_link);
                    keep_first(&mut mine.edit_link, theirs.edit_link);
                    keep_first(&mut mine.content_type, theirs.content_type);
                    keep_first(&mut mine.etag, theirs.etag);
                }
                None => self.media = Some(theirs),
            }
        }
    }

    /// Finds the links published for the named association.
    pub fn association(&self, name: &str) -> Option<&AssociationLink> {
        self.association_links.iter().find(|l| l.name == name)
    }
}

/// Annotations of a feed.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct FeedAnnotations {
    pub id: Option<String>,
    /// Total count when requested with inline count.
    pub count: Option<i64>,
    /// Link to the next page of results.
    pub next_link: Option<String>,
    pub delta_link: Option<String>,
}

impl FeedAnnotations {
    /// Merges `other` into `self` without overwriting values already present.
    pub fn merge(&mut self, other: FeedAnnotations) {
        keep_first(&mut self.id, other.id);
        if self.count.is_none() {
            self.count = other.count;
        }
        keep_first(&mut self.next_link, other.next_link);
        keep_first(&mut self.delta_link, other.delta_link);
    }
}
