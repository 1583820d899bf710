//! Listing diffs and pass reports.

use std::collections::BTreeMap;
use std::fmt;

use sha2::{Digest, Sha256};

/// Content hash of a descriptor file.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 32]);

impl Fingerprint {
    #[must_use]
    pub fn of(contents: &[u8]) -> Self {
        Self(Sha256::digest(contents).into())
    }
}

impl fmt::Debug for Fingerprint {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0.iter().take(6) {
            write!(formatter, "{byte:02x}")?;
        }
        Ok(())
    }
}

/// Kind of corrective action, in application order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ScanActionKind {
    Remove,
    Change,
    Add,
}

impl fmt::Display for ScanActionKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Remove => "remove",
            Self::Change => "change",
            Self::Add => "add",
        })
    }
}

/// An action computed by [`plan`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PlannedAction {
    pub(crate) kind: ScanActionKind,
    pub(crate) name: String,
}

/// Compares the previous pass's fingerprints with the current listing.
///
/// All removals come first, then changes, then additions; names are sorted
/// within each group.
pub(crate) fn plan(
    previous: &BTreeMap<String, Fingerprint>,
    current: &BTreeMap<String, Fingerprint>,
) -> Vec<PlannedAction> {
    let removed = previous
        .keys()
        .filter(|name| !current.contains_key(*name))
        .map(|name| (ScanActionKind::Remove, name));
    let changed = current
        .iter()
        .filter(|(name, fingerprint)| {
            previous
                .get(*name)
                .is_some_and(|previous| previous != *fingerprint)
        })
        .map(|(name, _)| (ScanActionKind::Change, name));
    let added = current
        .keys()
        .filter(|name| !previous.contains_key(*name))
        .map(|name| (ScanActionKind::Add, name));

    removed
        .chain(changed)
        .chain(added)
        .map(|(kind, name)| PlannedAction {
            kind,
            name: name.clone(),
        })
        .collect()
}

/// Whether an action took effect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Applied,
    Failed(String),
}

/// One applied action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanAction {
    pub kind: ScanActionKind,
    /// Descriptor file name.
    pub name: String,
    pub outcome: ActionOutcome,
}

/// Actions taken by one reconciliation pass, in application order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    pub actions: Vec<ScanAction>,
}

impl ScanReport {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// `(kind, name)` pairs in application order.
    #[must_use]
    pub fn summary(&self) -> Vec<(ScanActionKind, &str)> {
        self.actions
            .iter()
            .map(|action| (action.kind, action.name.as_str()))
            .collect()
    }

    #[must_use]
    pub fn failures(&self) -> Vec<&ScanAction> {
        self.actions
            .iter()
            .filter(|action| matches!(action.outcome, ActionOutcome::Failed(_)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn listing(entries: &[(&str, &str)]) -> BTreeMap<String, Fingerprint> {
        entries
            .iter()
            .map(|(name, contents)| ((*name).to_owned(), Fingerprint::of(contents.as_bytes())))
            .collect()
    }

    fn kinds(actions: &[PlannedAction]) -> Vec<(ScanActionKind, &str)> {
        actions
            .iter()
            .map(|action| (action.kind, action.name.as_str()))
            .collect()
    }

    #[rstest]
    fn removal_then_change_then_addition() {
        let previous = listing(&[("a.json", "a"), ("b.json", "b")]);
        let current = listing(&[("b.json", "b2"), ("c.json", "c")]);
        let actions = plan(&previous, &current);
        assert_eq!(
            kinds(&actions),
            vec![
                (ScanActionKind::Remove, "a.json"),
                (ScanActionKind::Change, "b.json"),
                (ScanActionKind::Add, "c.json"),
            ]
        );
    }

    #[rstest]
    fn identical_listings_plan_nothing() {
        let snapshot = listing(&[("a.json", "a"), ("b.json", "b")]);
        assert!(plan(&snapshot, &snapshot).is_empty());
    }

    #[rstest]
    fn groups_are_ordered_by_kind_not_name() {
        let previous = listing(&[("z.json", "z"), ("m.json", "m")]);
        let current = listing(&[("a.json", "a"), ("m.json", "m2")]);
        let actions = plan(&previous, &current);
        assert_eq!(
            kinds(&actions),
            vec![
                (ScanActionKind::Remove, "z.json"),
                (ScanActionKind::Change, "m.json"),
                (ScanActionKind::Add, "a.json"),
            ]
        );
    }
}
