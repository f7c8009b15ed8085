//! Cached directory of addressable peers.

use std::time::Duration;

use campus_shared::{Directory, DirectoryEntry, RoleGroup};

use crate::api::{bounded, MessagingApi};
use crate::error::Result;
use crate::slot::Slot;

/// Which directory groups a contact picker shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DirectoryFilter {
    #[default]
    All,
    Group(RoleGroup),
}

impl DirectoryFilter {
    /// `"all"` or a group key such as `"teachers"`.
    pub fn parse(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("all") {
            return Some(Self::All);
        }
        RoleGroup::ALL
            .into_iter()
            .find(|group| group.key().eq_ignore_ascii_case(s))
            .map(Self::Group)
    }

    fn admits(&self, group: RoleGroup) -> bool {
        match self {
            Self::All => true,
            Self::Group(only) => *only == group,
        }
    }
}

/// Last successfully loaded directory. Failed loads leave it untouched.
#[derive(Debug)]
pub struct DirectoryCache {
    slot: Slot<Option<Directory>>,
}

impl DirectoryCache {
    pub fn new() -> Self {
        Self {
            slot: Slot::new(None),
        }
    }

    pub fn snapshot(&self) -> Option<Directory> {
        self.slot.get()
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read(Option::is_some)
    }

    /// Fetch the directory. `Ok(None)` means a newer load already landed.
    pub async fn refresh<A: MessagingApi>(
        &self,
        api: &A,
        limit: Duration,
    ) -> Result<Option<Directory>> {
        let seq = self.slot.issue();
        let directory = bounded(limit, api.directory()).await?;
        Ok(self
            .slot
            .apply(seq, Some(directory.clone()))
            .then_some(directory))
    }

    /// Non-empty groups admitted by `filter`, entries narrowed to those whose
    /// name or id contains `query`.
    pub fn visible(
        &self,
        filter: DirectoryFilter,
        query: &str,
    ) -> Vec<(RoleGroup, Vec<DirectoryEntry>)> {
        let query = query.trim().to_lowercase();
        self.slot.read(|directory| {
            let Some(directory) = directory else {
                return Vec::new();
            };
            directory
                .groups()
                .filter(|(group, _)| filter.admits(*group))
                .map(|(group, entries)| {
                    let matching: Vec<DirectoryEntry> = entries
                        .iter()
                        .filter(|entry| {
                            query.is_empty()
                                || entry.name.to_lowercase().contains(&query)
                                || entry.peer.id.to_lowercase().contains(&query)
                        })
                        .cloned()
                        .collect();
                    (group, matching)
                })
                .filter(|(_, entries)| !entries.is_empty())
                .collect()
        })
    }
}

impl Default for DirectoryCache {
    fn default() -> Self {
        Self::new()
    }
}
