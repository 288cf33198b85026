//! Role-based default population for news sets.
//!
//! # Responsibility
//! - Decide which predefined definitions a role set adds to a news set.
//! - Split all predefined definitions into present, default and hidden groups.
//!
//! # Invariants
//! - An empty role set never adds anything.
//! - A definition already referenced by the set is never added again.
//! - For a given (set, roles) pair the three groups are pairwise disjoint and
//!   together cover every predefined definition.
//!
//! The functions here work on in-memory data only. The store feeds them
//! candidates and persists the result.

use crate::model::definition::{DefinitionId, PredefinedNewsDefinition};
use crate::model::news_set::NewsSet;
use crate::model::RoleSet;
use log::debug;
use std::collections::BTreeSet;

/// Predefined definitions grouped relative to one set and one role set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DefinitionPartition {
    /// Already referenced by a configuration in the set.
    pub present: Vec<PredefinedNewsDefinition>,
    /// Not present, and granted by at least one of the roles.
    pub defaults: Vec<PredefinedNewsDefinition>,
    /// Not present, and granted by none of the roles.
    pub hidden: Vec<PredefinedNewsDefinition>,
}

/// Partitions `definitions` against the ids present in a set.
pub fn partition(
    present_ids: &BTreeSet<DefinitionId>,
    definitions: impl IntoIterator<Item = PredefinedNewsDefinition>,
    roles: &RoleSet,
) -> DefinitionPartition {
    let mut result = DefinitionPartition::default();
    for definition in definitions {
        if present_ids.contains(&definition.id) {
            result.present.push(definition);
        } else if definition.granted_by(roles) {
            result.defaults.push(definition);
        } else {
            result.hidden.push(definition);
        }
    }
    result
}

/// Adds a predefined configuration to `set` for every qualifying candidate.
///
/// A candidate qualifies when the set does not reference it yet and one of
/// `roles` grants it. Returns the number of configurations added.
pub fn apply_defaults(
    set: &mut NewsSet,
    candidates: impl IntoIterator<Item = PredefinedNewsDefinition>,
    roles: &RoleSet,
) -> usize {
    if roles.is_empty() {
        return 0;
    }

    let mut added = 0;
    for definition in candidates {
        if set.references(definition.id) || !definition.granted_by(roles) {
            continue;
        }
        debug!(
            "event=init_news_add module=initializer set_id={} definition_id={}",
            set.id, definition.id
        );
        set.add_predefined(definition);
        added += 1;
    }
    added
}

#[cfg(test)]
mod tests {
    use super::{apply_defaults, partition};
    use crate::model::definition::PredefinedNewsDefinition;
    use crate::model::news_set::NewsSet;
    use crate::model::RoleSet;
    use std::collections::BTreeSet;

    fn roles(values: &[&str]) -> RoleSet {
        values.iter().map(|value| value.to_string()).collect()
    }

    fn catalog() -> Vec<PredefinedNewsDefinition> {
        vec![
            PredefinedNewsDefinition::new("A", "rss").with_roles(["student"]),
            PredefinedNewsDefinition::new("B", "rss").with_roles(["staff"]),
            PredefinedNewsDefinition::new("C", "rss").with_roles(["staff", "student"]),
            PredefinedNewsDefinition::new("D", "rss"),
        ]
    }

    #[test]
    fn empty_roles_leave_set_unchanged() {
        let mut set = NewsSet::new("alice", "default");
        let added = apply_defaults(&mut set, catalog(), &RoleSet::new());
        assert_eq!(added, 0);
        assert!(set.configurations.is_empty());
    }

    #[test]
    fn only_granted_definitions_are_added() {
        let mut set = NewsSet::new("alice", "default");
        let added = apply_defaults(&mut set, catalog(), &roles(&["student"]));
        assert_eq!(added, 2);

        let names: BTreeSet<_> = set
            .configurations
            .iter()
            .map(|config| config.definition_name().to_string())
            .collect();
        assert_eq!(names, ["A".to_string(), "C".to_string()].into());
    }

    #[test]
    fn applying_twice_is_idempotent() {
        let definitions = catalog();
        let mut set = NewsSet::new("alice", "default");
        let granted = roles(&["staff", "student"]);

        apply_defaults(&mut set, definitions.clone(), &granted);
        let after_first = set.configurations.len();
        let added_again = apply_defaults(&mut set, definitions, &granted);

        assert_eq!(added_again, 0);
        assert_eq!(set.configurations.len(), after_first);
    }

    #[test]
    fn duplicate_candidates_are_added_once() {
        let definition = PredefinedNewsDefinition::new("A", "rss").with_roles(["student"]);
        let mut set = NewsSet::new("alice", "default");
        let added = apply_defaults(
            &mut set,
            vec![definition.clone(), definition],
            &roles(&["student"]),
        );
        assert_eq!(added, 1);
    }

    #[test]
    fn partition_groups_are_disjoint_and_complete() {
        let definitions = catalog();
        let role_sets = [
            RoleSet::new(),
            roles(&["student"]),
            roles(&["staff"]),
            roles(&["staff", "student", "guest"]),
        ];

        for present_count in 0..=definitions.len() {
            let present: BTreeSet<_> = definitions
                .iter()
                .take(present_count)
                .map(|def| def.id)
                .collect();

            for granted in &role_sets {
                let groups = partition(&present, definitions.clone(), granted);
                let mut seen = BTreeSet::new();
                for def in groups
                    .present
                    .iter()
                    .chain(&groups.defaults)
                    .chain(&groups.hidden)
                {
                    assert!(seen.insert(def.id), "definition {} in two groups", def.name);
                }
                assert_eq!(seen.len(), definitions.len());
                assert!(groups.defaults.iter().all(|def| def.granted_by(granted)));
                assert!(groups.hidden.iter().all(|def| !def.granted_by(granted)));
            }
        }
    }

    #[test]
    fn partition_matches_what_apply_defaults_adds() {
        let definitions = catalog();
        let granted = roles(&["staff"]);
        let mut set = NewsSet::new("alice", "default");
        set.add_predefined(definitions[2].clone());

        let present: BTreeSet<_> = set
            .configurations
            .iter()
            .map(|config| config.definition_id())
            .collect();
        let groups = partition(&present, definitions.clone(), &granted);

        apply_defaults(&mut set, definitions, &granted);
        let added: Vec<_> = set.configurations[1..]
            .iter()
            .map(|config| config.definition_id())
            .collect();
        let expected: Vec<_> = groups.defaults.iter().map(|def| def.id).collect();
        assert_eq!(added, expected);
        assert_eq!(groups.hidden.len(), 2);
    }
}
