//! List reconciliation for child references.
//!
//! Dashboard groups list mirrored dashboards as config entries that carry a
//! server-assigned `configId`. Updating a group must resend the ids of the
//! mirrors that stay, so the desired list is matched against the existing one
//! before the update is sent.

use crate::client::DashboardConfig;

/// Result of [`diff_lists`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListDiff<T> {
    /// Items only in `new`, in `new` order.
    pub added: Vec<T>,
    /// Items only in `old`, in `old` order.
    pub removed: Vec<T>,
    /// Items in both, in `new` order.
    pub kept: Vec<T>,
}

impl<T> ListDiff<T> {
    /// Whether the lists hold the same items.
    pub fn is_unchanged(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty()
    }
}

/// Diff two lists. Duplicates match one-for-one: `[a, a]` against `[a]`
/// keeps one `a` and removes the other.
pub fn diff_lists<T: PartialEq + Clone>(old: &[T], new: &[T]) -> ListDiff<T> {
    let mut unmatched: Vec<Option<&T>> = old.iter().map(Some).collect();
    let mut added = Vec::new();
    let mut kept = Vec::new();

    for item in new {
        match unmatched.iter_mut().find(|slot| slot.is_some_and(|o| o == item)) {
            Some(slot) => {
                *slot = None;
                kept.push(item.clone());
            },
            None => added.push(item.clone()),
        }
    }

    let removed = unmatched.into_iter().flatten().cloned().collect();
    ListDiff {
        added,
        removed,
        kept,
    }
}

/// Build the mirror list to send for `desired`, reusing config ids from
/// `existing`.
///
/// Each desired entry takes the `configId` of the first not yet matched
/// existing entry with the same `dashboardId`. Desired entries without a
/// match are sent without an id; existing entries nobody claims are dropped.
pub fn reconcile_dashboard_configs(
    existing: &[DashboardConfig],
    desired: &[DashboardConfig],
) -> Vec<DashboardConfig> {
    let mut claimed = vec![false; existing.len()];

    desired
        .iter()
        .map(|want| {
            let config_id = existing
                .iter()
                .enumerate()
                .find(|(i, have)| !claimed[*i] && have.dashboard_id == want.dashboard_id)
                .and_then(|(i, have)| {
                    claimed[i] = true;
                    have.config_id.clone()
                });
            DashboardConfig {
                config_id,
                ..want.clone()
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(dashboard: &str, config_id: Option<&str>, name: Option<&str>) -> DashboardConfig {
        DashboardConfig {
            config_id: config_id.map(str::to_string),
            dashboard_id: dashboard.to_string(),
            name_override: name.map(str::to_string),
            description_override: None,
        }
    }

    #[test]
    fn diff_preserves_order() {
        let diff = diff_lists(&["a", "b", "c"], &["d", "c", "a"]);
        assert_eq!(diff.added, vec!["d"]);
        assert_eq!(diff.removed, vec!["b"]);
        assert_eq!(diff.kept, vec!["c", "a"]);
        assert!(!diff.is_unchanged());
    }

    #[test]
    fn diff_matches_duplicates_one_for_one() {
        let diff = diff_lists(&["a", "a", "b"], &["a", "b", "b"]);
        assert_eq!(diff.kept, vec!["a", "b"]);
        assert_eq!(diff.added, vec!["b"]);
        assert_eq!(diff.removed, vec!["a"]);
    }

    #[test]
    fn diff_of_equal_lists_is_unchanged() {
        let diff = diff_lists(&[1, 2, 3], &[3, 2, 1]);
        assert!(diff.is_unchanged());
        assert_eq!(diff.kept, vec![3, 2, 1]);

        let empty: ListDiff<i32> = diff_lists(&[], &[]);
        assert!(empty.is_unchanged());
    }

    #[test]
    fn reuses_config_ids_first_come() {
        let existing = vec![
            config("D1", Some("CFG1"), None),
            config("D2", Some("CFG2"), None),
            config("D1", Some("CFG3"), Some("Second mirror")),
        ];
        let desired = vec![
            config("D1", None, Some("Renamed")),
            config("D3", None, None),
            config("D1", None, None),
        ];

        let result = reconcile_dashboard_configs(&existing, &desired);
        assert_eq!(
            result,
            vec![
                config("D1", Some("CFG1"), Some("Renamed")),
                config("D3", None, None),
                config("D1", Some("CFG3"), None),
            ]
        );
    }

    #[test]
    fn ignores_config_ids_in_desired() {
        let existing = vec![config("D1", Some("CFG1"), None)];
        let desired = vec![config("D2", Some("STALE"), None)];

        let result = reconcile_dashboard_configs(&existing, &desired);
        assert_eq!(result, vec![config("D2", None, None)]);
    }

    #[test]
    fn removing_every_mirror() {
        let existing = vec![config("D1", Some("CFG1"), None)];
        assert!(reconcile_dashboard_configs(&existing, &[]).is_empty());
    }
}
