//! Reconciliation engine
//!
//! This module is the only writer of the catalog tables. For each batch it:
//! - Collapses in-batch duplicates by identity
//! - Rejects conflicting identities, orphans and parent cycles
//! - Upserts the survivors in one call so they commit together
//!
//! Rejections never abort the rest of the batch.

mod dedup;

use crate::model::{find_cycles, Diagram, DiagramKey, Group, GroupForest, Part};
use crate::storage::{CatalogStore, CommitMode, PartIdentity, UpsertCounts};
use crate::{HarvestError, Result};
use dedup::{dedup_by, name_conflict};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// Why a record was left out of a batch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectionKind {
    /// Two payloads for one identity disagree on a required field
    Conflict,

    /// The owner is in neither the batch nor storage
    Orphan,

    /// The group sits on a parent cycle
    Cycle,
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Conflict => write!(f, "conflict"),
            Self::Orphan => write!(f, "orphan"),
            Self::Cycle => write!(f, "cycle"),
        }
    }
}

/// A rejected identity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub kind: RejectionKind,
    pub identity: String,
    pub reason: String,
}

/// Summary of one reconciliation call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcileReport {
    pub entity: &'static str,
    pub submitted: usize,
    pub duplicates: usize,
    pub written: UpsertCounts,
    pub rejected: Vec<Rejection>,
}

impl ReconcileReport {
    fn new(entity: &'static str, submitted: usize) -> Self {
        Self {
            entity,
            submitted,
            duplicates: 0,
            written: UpsertCounts::default(),
            rejected: Vec::new(),
        }
    }

    fn reject(&mut self, kind: RejectionKind, identity: impl ToString, reason: impl Into<String>) {
        let rejection = Rejection {
            kind,
            identity: identity.to_string(),
            reason: reason.into(),
        };
        tracing::warn!(
            "Rejected {} {} ({}): {}",
            self.entity,
            rejection.identity,
            rejection.kind,
            rejection.reason
        );
        self.rejected.push(rejection);
    }

    /// Returns true if every submitted identity was written
    pub fn is_clean(&self) -> bool {
        self.rejected.is_empty()
    }

    /// Turns the first rejection into an error
    pub fn into_strict(self) -> Result<Self> {
        match self.rejected.first() {
            None => Ok(self),
            Some(rejection) => Err(HarvestError::ReconciliationConflict {
                entity: self.entity,
                identity: rejection.identity.clone(),
                reason: format!("{}: {}", rejection.kind, rejection.reason),
            }),
        }
    }
}

impl fmt::Display for ReconcileReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {} submitted, {} inserted, {} updated, {} duplicates, {} rejected",
            self.entity,
            self.submitted,
            self.written.inserted,
            self.written.updated,
            self.duplicates,
            self.rejected.len()
        )
    }
}

/// Applies scraped batches to storage
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    commit_mode: CommitMode,
    part_identity: PartIdentity,
}

impl Reconciler {
    pub fn new(commit_mode: CommitMode, part_identity: PartIdentity) -> Self {
        Self {
            commit_mode,
            part_identity,
        }
    }

    /// Reconciles a batch of groups
    ///
    /// Parents are written before children, so the batch may be in any
    /// order even with per-row commits.
    ///
    /// # Arguments
    ///
    /// * `store` - Target storage
    /// * `batch` - Groups as extracted, duplicates allowed
    ///
    /// # Returns
    ///
    /// * `Ok(ReconcileReport)` - What was written and what was rejected
    /// * `Err(HarvestError)` - Storage failed; in transaction mode nothing
    ///   from this batch was written
    pub fn reconcile_groups<S: CatalogStore + ?Sized>(
        &self,
        store: &mut S,
        batch: &[Group],
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new("group", batch.len());

        let deduped = dedup_by(batch, |g| g.id, |a, b| name_conflict(&a.name, &b.name));
        report.duplicates = deduped.duplicates;
        for (identity, reason) in deduped.conflicts {
            report.reject(RejectionKind::Conflict, identity, reason);
        }

        let stored_edges = store.get_group_edges()?;
        let stored_ids: HashSet<i64> = stored_edges.iter().map(|(id, _)| *id).collect();

        // Batch edges replace stored ones for the same id
        let mut parents: HashMap<i64, Option<i64>> = stored_edges.into_iter().collect();
        parents.extend(deduped.records.iter().map(|g| (g.id, g.parent_group_id)));
        let cyclic: HashSet<i64> = find_cycles(parents).into_iter().collect();

        let mut accepted: Vec<Group> = Vec::with_capacity(deduped.records.len());
        for group in deduped.records {
            if cyclic.contains(&group.id) {
                report.reject(
                    RejectionKind::Cycle,
                    group.id,
                    format!("parent {:?} leads back to itself", group.parent_group_id),
                );
            } else {
                accepted.push(group);
            }
        }

        // Dropping an orphan can orphan its children, so repeat until stable
        loop {
            let known: HashSet<i64> = stored_ids
                .iter()
                .copied()
                .chain(accepted.iter().map(|g| g.id))
                .collect();
            let (kept, orphans): (Vec<Group>, Vec<Group>) = accepted
                .into_iter()
                .partition(|g| g.parent_group_id.map_or(true, |p| known.contains(&p)));
            accepted = kept;
            if orphans.is_empty() {
                break;
            }
            for group in orphans {
                report.reject(
                    RejectionKind::Orphan,
                    group.id,
                    format!("parent {:?} not found", group.parent_group_id),
                );
            }
        }

        let ordered: Vec<Group> = GroupForest::from_groups(accepted)
            .depth_first()
            .into_iter()
            .cloned()
            .collect();

        report.written = store.upsert_groups(&ordered, self.commit_mode)?;
        tracing::info!("Reconciled {}", report);
        Ok(report)
    }

    /// Reconciles a batch of diagrams by compound key
    pub fn reconcile_diagrams<S: CatalogStore + ?Sized>(
        &self,
        store: &mut S,
        batch: &[Diagram],
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new("diagram", batch.len());

        let deduped = dedup_by(batch, |d| d.key, |a, b| name_conflict(&a.name, &b.name));
        report.duplicates = deduped.duplicates;
        for (identity, reason) in deduped.conflicts {
            report.reject(RejectionKind::Conflict, identity, reason);
        }

        let mut owners: HashMap<i64, bool> = HashMap::new();
        let mut accepted = Vec::with_capacity(deduped.records.len());
        for diagram in deduped.records {
            let group_id = diagram.parent_group_id();
            let exists = match owners.get(&group_id) {
                Some(&exists) => exists,
                None => {
                    let exists = store.get_group_by_id(group_id)?.is_some();
                    owners.insert(group_id, exists);
                    exists
                }
            };

            if exists {
                accepted.push(diagram);
            } else {
                report.reject(
                    RejectionKind::Orphan,
                    diagram.key,
                    format!("group {} not found", group_id),
                );
            }
        }

        report.written = store.upsert_diagrams(&accepted, self.commit_mode)?;
        tracing::info!("Reconciled {}", report);
        Ok(report)
    }

    /// Reconciles a batch of parts
    ///
    /// Parts are only deduplicated when they are identified by natural key;
    /// with fresh identity every submitted part is a new row.
    pub fn reconcile_parts<S: CatalogStore + ?Sized>(
        &self,
        store: &mut S,
        batch: &[Part],
    ) -> Result<ReconcileReport> {
        let mut report = ReconcileReport::new("part", batch.len());

        let records = match self.part_identity {
            PartIdentity::Fresh => batch.to_vec(),
            PartIdentity::NaturalKey => {
                let deduped = dedup_by(
                    batch,
                    |p| PartKey(p.diagram, p.number.clone()),
                    |a, b| name_conflict(&a.name, &b.name),
                );
                report.duplicates = deduped.duplicates;
                for (identity, reason) in deduped.conflicts {
                    report.reject(RejectionKind::Conflict, identity, reason);
                }
                deduped.records
            }
        };

        let mut owners: HashMap<DiagramKey, bool> = HashMap::new();
        let mut accepted = Vec::with_capacity(records.len());
        for part in records {
            let exists = match owners.get(&part.diagram) {
                Some(&exists) => exists,
                None => {
                    let exists = store.get_diagram_by_key(part.diagram)?.is_some();
                    owners.insert(part.diagram, exists);
                    exists
                }
            };

            if exists {
                accepted.push(part);
            } else {
                report.reject(
                    RejectionKind::Orphan,
                    PartKey(part.diagram, part.number.clone()),
                    format!("diagram {} not found", part.diagram),
                );
            }
        }

        report.written = store.upsert_parts(&accepted, self.commit_mode, self.part_identity)?;
        tracing::info!("Reconciled {}", report);
        Ok(report)
    }
}

/// Natural identity of a part within the catalog
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct PartKey(DiagramKey, String);

impl fmt::Display for PartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.0, self.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{Pagination, SqliteStorage};

    fn group(id: i64, parent: Option<i64>, name: &str) -> Group {
        Group {
            id,
            name: name.to_string(),
            diagrams_url: None,
            parent_group_id: parent,
        }
    }

    fn diagram(group_id: i64, ordinal: u32, name: &str) -> Diagram {
        let key = DiagramKey::new(group_id, ordinal);
        Diagram {
            key,
            id: key.legacy_id(3).unwrap(),
            name: name.to_string(),
            img_url: None,
        }
    }

    fn part(key: DiagramKey, number: &str, name: &str, amount: Option<u32>) -> Part {
        Part {
            id: None,
            diagram: key,
            parent_diagram_id: key.legacy_id(3).unwrap(),
            number: number.to_string(),
            name: name.to_string(),
            note: String::new(),
            date_range: String::new(),
            amount,
        }
    }

    fn store() -> SqliteStorage {
        SqliteStorage::new_in_memory().unwrap()
    }

    #[test]
    fn test_children_before_parents_in_batch() {
        let mut store = store();
        let batch = vec![
            group(3, Some(2), "Bolts"),
            group(2, Some(1), "Bumper"),
            group(1, None, "Body"),
        ];

        let reconciler = Reconciler::new(CommitMode::PerRow, PartIdentity::NaturalKey);
        let report = reconciler.reconcile_groups(&mut store, &batch).unwrap();

        assert!(report.is_clean());
        assert_eq!(report.written.inserted, 3);
    }

    #[test]
    fn test_reconcile_groups_is_idempotent() {
        let mut store = store();
        let batch = vec![group(1, None, "Body"), group(2, Some(1), "Bumper")];
        let reconciler = Reconciler::default();

        reconciler.reconcile_groups(&mut store, &batch).unwrap();
        let second = reconciler.reconcile_groups(&mut store, &batch).unwrap();

        assert_eq!(second.written, UpsertCounts { inserted: 0, updated: 2 });
        assert_eq!(store.get_groups(Pagination::all()).unwrap().len(), 2);
    }

    #[test]
    fn test_last_submitted_values_are_stored() {
        let mut store = store();
        let reconciler = Reconciler::default();

        let mut first = group(1, None, "Body");
        first.diagrams_url = Some("https://partsouq.com/a".to_string());
        reconciler.reconcile_groups(&mut store, &[first]).unwrap();

        let mut later = group(1, None, "Body");
        later.diagrams_url = Some("https://partsouq.com/b".to_string());
        let mut latest = later.clone();
        latest.diagrams_url = Some("https://partsouq.com/c".to_string());
        reconciler.reconcile_groups(&mut store, &[later, latest]).unwrap();

        let stored = store.get_group_by_id(1).unwrap().unwrap();
        assert_eq!(stored.diagrams_url.as_deref(), Some("https://partsouq.com/c"));
    }

    #[test]
    fn test_conflicting_names_reject_identity_only() {
        let mut store = store();
        let batch = vec![
            group(1, None, "Body"),
            group(2, None, "Engine"),
            group(1, None, "Chassis"),
        ];

        let report = Reconciler::default().reconcile_groups(&mut store, &batch).unwrap();

        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].kind, RejectionKind::Conflict);
        assert_eq!(report.rejected[0].identity, "1");
        assert!(store.get_group_by_id(1).unwrap().is_none());
        assert!(store.get_group_by_id(2).unwrap().is_some());

        let err = report.into_strict().unwrap_err();
        assert!(matches!(
            err,
            HarvestError::ReconciliationConflict { entity: "group", .. }
        ));
    }

    #[test]
    fn test_orphans_and_their_children_are_rejected() {
        let mut store = store();
        let batch = vec![
            group(1, None, "Body"),
            group(5, Some(99), "Lost"),
            group(6, Some(5), "Lost child"),
        ];

        let report = Reconciler::default().reconcile_groups(&mut store, &batch).unwrap();

        let rejected: Vec<&str> = report.rejected.iter().map(|r| r.identity.as_str()).collect();
        assert_eq!(rejected, vec!["5", "6"]);
        assert!(report.rejected.iter().all(|r| r.kind == RejectionKind::Orphan));
        assert_eq!(report.written.inserted, 1);
    }

    #[test]
    fn test_parent_from_storage_is_accepted() {
        let mut store = store();
        let reconciler = Reconciler::default();
        reconciler
            .reconcile_groups(&mut store, &[group(1, None, "Body")])
            .unwrap();

        let report = reconciler
            .reconcile_groups(&mut store, &[group(2, Some(1), "Bumper")])
            .unwrap();
        assert!(report.is_clean());
    }

    #[test]
    fn test_cycles_are_rejected() {
        let mut store = store();
        let batch = vec![
            group(1, Some(2), "A"),
            group(2, Some(1), "B"),
            group(3, None, "C"),
        ];

        let report = Reconciler::default().reconcile_groups(&mut store, &batch).unwrap();

        assert_eq!(report.rejected.len(), 2);
        assert!(report.rejected.iter().all(|r| r.kind == RejectionKind::Cycle));
        assert_eq!(report.written.inserted, 1);
    }

    #[test]
    fn test_diagram_orphans_rejected() {
        let mut store = store();
        let reconciler = Reconciler::default();
        reconciler
            .reconcile_groups(&mut store, &[group(42, None, "Engine")])
            .unwrap();

        let batch = vec![diagram(42, 0, "Intake"), diagram(43, 0, "Nowhere")];
        let report = reconciler.reconcile_diagrams(&mut store, &batch).unwrap();

        assert_eq!(report.written.inserted, 1);
        assert_eq!(report.rejected[0].identity, "43#0");
    }

    #[test]
    fn test_duplicate_diagrams_collapse() {
        let mut store = store();
        let reconciler = Reconciler::default();
        reconciler
            .reconcile_groups(&mut store, &[group(42, None, "Engine")])
            .unwrap();

        let mut with_image = diagram(42, 0, "Intake");
        with_image.img_url = Some("https://partsouq.com/i.png".to_string());
        let batch = vec![diagram(42, 0, "Intake"), with_image];
        let report = reconciler.reconcile_diagrams(&mut store, &batch).unwrap();

        assert_eq!(report.duplicates, 1);
        let stored = store.get_diagram_by_key(DiagramKey::new(42, 0)).unwrap().unwrap();
        assert_eq!(stored.img_url.as_deref(), Some("https://partsouq.com/i.png"));
    }

    fn seeded_diagram(store: &mut SqliteStorage, reconciler: &Reconciler) -> DiagramKey {
        reconciler
            .reconcile_groups(store, &[group(42, None, "Engine")])
            .unwrap();
        reconciler
            .reconcile_diagrams(store, &[diagram(42, 0, "Intake")])
            .unwrap();
        DiagramKey::new(42, 0)
    }

    #[test]
    fn test_parts_natural_key_idempotent() {
        let mut store = store();
        let reconciler = Reconciler::default();
        let key = seeded_diagram(&mut store, &reconciler);

        let batch = vec![
            part(key, "17801-50040", "Air Filter", None),
            part(key, "90105-08", "Bolt", Some(4)),
        ];
        reconciler.reconcile_parts(&mut store, &batch).unwrap();
        reconciler.reconcile_parts(&mut store, &batch).unwrap();

        assert_eq!(store.get_parts_for_diagram(key).unwrap().len(), 2);
    }

    #[test]
    fn test_parts_last_amount_wins() {
        let mut store = store();
        let reconciler = Reconciler::default();
        let key = seeded_diagram(&mut store, &reconciler);

        let batch = vec![
            part(key, "90105-08", "Bolt", Some(4)),
            part(key, "90105-08", "Bolt", Some(6)),
        ];
        let report = reconciler.reconcile_parts(&mut store, &batch).unwrap();

        assert_eq!(report.duplicates, 1);
        let parts = store.get_parts_for_diagram(key).unwrap();
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].amount, Some(6));
    }

    #[test]
    fn test_parts_fresh_keeps_every_row() {
        let mut store = store();
        let reconciler = Reconciler::new(CommitMode::Transaction, PartIdentity::Fresh);
        let key = seeded_diagram(&mut store, &reconciler);

        let batch = vec![
            part(key, "90105-08", "Bolt", Some(4)),
            part(key, "90105-08", "Bolt", Some(6)),
        ];
        let report = reconciler.reconcile_parts(&mut store, &batch).unwrap();

        assert_eq!(report.written.inserted, 2);
        assert_eq!(report.duplicates, 0);
    }

    #[test]
    fn test_parts_without_diagram_are_orphans() {
        let mut store = store();
        let reconciler = Reconciler::default();
        let batch = vec![part(DiagramKey::new(1, 0), "X-1", "Nut", None)];

        let report = reconciler.reconcile_parts(&mut store, &batch).unwrap();
        assert_eq!(report.rejected[0].kind, RejectionKind::Orphan);
        assert_eq!(report.rejected[0].identity, "1#0/X-1");
        assert_eq!(report.written.total(), 0);
    }
}
