use chrono::{DateTime, Local};
use tracing::debug;
use uuid::Uuid;

use crate::error::CatalogError;
use crate::index::{Snapshot, SnapshotHandle};
use crate::models::{Combo, Group};

pub const DEFAULT_GROUP_NAME: &str = "Default";

/// In-memory combo/group store owned by the embedding application.
///
/// Every mutation rebuilds the matching snapshot and publishes it through
/// the shared [`SnapshotHandle`], so the match engine always queries a
/// complete, consistent view without blocking on editor activity.
pub struct Catalog {
    groups: Vec<Group>,
    combos: Vec<Combo>,
    version: u64,
    handle: SnapshotHandle,
}

impl Catalog {
    pub fn new() -> Self {
        let default_group = Group::new(DEFAULT_GROUP_NAME);
        let mut catalog = Self {
            groups: vec![default_group],
            combos: Vec::new(),
            version: 0,
            handle: SnapshotHandle::default(),
        };
        catalog.publish();
        catalog
    }

    /// Handle the match engine (and policy gate) read snapshots through.
    pub fn handle(&self) -> SnapshotHandle {
        self.handle.clone()
    }

    pub fn default_group(&self) -> &Group {
        &self.groups[0]
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    pub fn combos(&self) -> &[Combo] {
        &self.combos
    }

    pub fn add_group(&mut self, group: Group) -> Uuid {
        let id = group.id;
        self.groups.push(group);
        self.publish();
        id
    }

    /// Delete a group and every combo it owns. The default group cannot
    /// be deleted, only emptied.
    pub fn remove_group(&mut self, id: Uuid) -> Result<(), CatalogError> {
        if id == self.groups[0].id {
            return Err(CatalogError::DefaultGroupDeletion);
        }
        let before = self.groups.len();
        self.groups.retain(|g| g.id != id);
        if self.groups.len() == before {
            return Err(CatalogError::UnknownGroup);
        }
        self.combos.retain(|c| c.group != id);
        self.publish();
        Ok(())
    }

    pub fn set_group_enabled(&mut self, id: Uuid, enabled: bool) -> Result<(), CatalogError> {
        let group = self
            .groups
            .iter_mut()
            .find(|g| g.id == id)
            .ok_or(CatalogError::UnknownGroup)?;
        group.enabled = enabled;
        self.publish();
        Ok(())
    }

    /// Insert a combo. Duplicate keywords are permitted (the conflict
    /// resolver reports them); an empty keyword is not.
    pub fn add_combo(&mut self, combo: Combo) -> Result<Uuid, CatalogError> {
        if combo.keyword.is_empty() {
            return Err(CatalogError::InvalidKeyword(combo.keyword));
        }
        if !self.groups.iter().any(|g| g.id == combo.group) {
            return Err(CatalogError::UnknownGroup);
        }
        let id = combo.id;
        self.combos.push(combo);
        self.publish();
        Ok(id)
    }

    pub fn update_combo(&mut self, combo: Combo) -> Result<(), CatalogError> {
        if combo.keyword.is_empty() {
            return Err(CatalogError::InvalidKeyword(combo.keyword));
        }
        let slot = self
            .combos
            .iter_mut()
            .find(|c| c.id == combo.id)
            .ok_or(CatalogError::UnknownCombo)?;
        *slot = combo;
        slot.touch_modified();
        self.publish();
        Ok(())
    }

    pub fn remove_combo(&mut self, id: Uuid) -> Result<(), CatalogError> {
        let before = self.combos.len();
        self.combos.retain(|c| c.id != id);
        if self.combos.len() == before {
            return Err(CatalogError::UnknownCombo);
        }
        self.publish();
        Ok(())
    }

    pub fn set_combo_enabled(&mut self, id: Uuid, enabled: bool) -> Result<(), CatalogError> {
        let combo = self
            .combos
            .iter_mut()
            .find(|c| c.id == id)
            .ok_or(CatalogError::UnknownCombo)?;
        combo.enabled = enabled;
        self.publish();
        Ok(())
    }

    /// Record that a combo fired. Called by the executor's last-used
    /// notification; does not rebuild the snapshot since matching does
    /// not depend on the timestamp.
    pub fn touch_last_used(&mut self, id: Uuid, when: DateTime<Local>) {
        if let Some(combo) = self.combos.iter_mut().find(|c| c.id == id) {
            combo.last_used = Some(when);
        }
    }

    fn publish(&mut self) {
        self.version += 1;
        let snapshot = Snapshot::rebuild(&self.groups, &self.combos, self.version);
        debug!(version = self.version, "publishing catalog snapshot");
        self.handle.replace(snapshot);
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_group_exists_and_cannot_be_deleted() {
        let mut catalog = Catalog::new();
        let default_id = catalog.default_group().id;
        assert_eq!(catalog.default_group().name, DEFAULT_GROUP_NAME);
        assert_eq!(
            catalog.remove_group(default_id),
            Err(CatalogError::DefaultGroupDeletion)
        );
    }

    #[test]
    fn group_deletion_cascades_to_combos() {
        let mut catalog = Catalog::new();
        let group_id = catalog.add_group(Group::new("work"));
        catalog
            .add_combo(Combo::new("", "sig", "regards", group_id))
            .unwrap();
        assert_eq!(catalog.handle().current().len(), 1);

        catalog.remove_group(group_id).unwrap();
        assert!(catalog.combos().is_empty());
        assert!(catalog.handle().current().is_empty());
    }

    #[test]
    fn empty_keywords_are_rejected_but_duplicates_are_not() {
        let mut catalog = Catalog::new();
        let group_id = catalog.default_group().id;
        assert!(matches!(
            catalog.add_combo(Combo::new("", "", "x", group_id)),
            Err(CatalogError::InvalidKeyword(_))
        ));
        catalog
            .add_combo(Combo::new("", "dup", "one", group_id))
            .unwrap();
        catalog
            .add_combo(Combo::new("", "dup", "two", group_id))
            .unwrap();
        assert_eq!(catalog.combos().len(), 2);
    }

    #[test]
    fn mutations_bump_the_snapshot_version() {
        let mut catalog = Catalog::new();
        let group_id = catalog.default_group().id;
        let v0 = catalog.handle().current().version();
        let id = catalog
            .add_combo(Combo::new("", "kw", "text", group_id))
            .unwrap();
        let v1 = catalog.handle().current().version();
        assert!(v1 > v0);
        catalog.set_combo_enabled(id, false).unwrap();
        assert!(catalog.handle().current().version() > v1);
        assert!(catalog.handle().current().is_empty());
    }

    #[test]
    fn combos_outside_any_known_group_are_rejected() {
        let mut catalog = Catalog::new();
        let err = catalog.add_combo(Combo::new("", "kw", "text", Uuid::new_v4()));
        assert!(matches!(err, Err(CatalogError::UnknownGroup)));
    }
}
