use crate::models::Action;
use crate::{Error, Result};
use std::collections::BTreeSet;

/// Chooses which configured actions a run executes.
///
/// Exactly one mode is valid: `all`, or a non-empty set of ids and/or tags.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Selector {
    pub ids: BTreeSet<String>,
    pub tags: BTreeSet<String>,
    pub all: bool,
}

impl Selector {
    pub fn all() -> Self {
        Self {
            all: true,
            ..Self::default()
        }
    }

    pub fn by_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            ids: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn by_tags<I, S>(tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tags: tags.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.all && !self.ids.is_empty() {
            return Err(Error::InvalidOption(
                "'all' can not be combined with action ids".to_string(),
            ));
        }
        if self.all && !self.tags.is_empty() {
            return Err(Error::InvalidOption(
                "'all' can not be combined with tags".to_string(),
            ));
        }
        if !self.all && self.ids.is_empty() && self.tags.is_empty() {
            return Err(Error::InvalidOption(
                "one of 'all', action ids or tags is required".to_string(),
            ));
        }
        Ok(())
    }

    pub fn contains(&self, action: &Action) -> bool {
        if self.all {
            return true;
        }
        if self.ids.contains(&action.id) {
            return true;
        }
        action.tags.iter().any(|t| self.tags.contains(t))
    }

    /// Selected actions in source order.
    pub fn filter<'a>(&self, actions: &'a [Action]) -> Vec<&'a Action> {
        actions.iter().filter(|a| self.contains(a)).collect()
    }
}
