//! Revision and hierarchy resolution for one subscription snapshot.
//!
//! Turns raw rows into root groups: rows missing a root id are amended onto
//! their fallback id, package mappings are shared within each group, revision
//! chains are netted and fully cancelled rows are dropped, and the survivors
//! are ranked to tell simple lines from compound packages.

pub mod netting;

use std::collections::{BTreeMap, HashMap};

use tracing::{debug, info, warn};

use crate::error::DataIntegrityError;
use crate::records::SubscriptionRecord;

pub use netting::{ExclusionReason, NettingTable};

pub const AMENDED_SUFFIX: &str = " - AMENDED";

#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRecord {
    /// The row with its effective root id and, when amended, suffixed name.
    pub record: SubscriptionRecord,
    pub root_id: String,
    pub amended: bool,
    /// 1-based rank within the root group; `None` for amended rows.
    pub sequence: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupKind {
    Simple,
    Compound,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RootGroup {
    pub root_id: String,
    pub kind: GroupKind,
    pub members: Vec<ResolvedRecord>,
}

impl RootGroup {
    pub fn is_compound(&self) -> bool {
        self.kind == GroupKind::Compound
    }

    pub fn max_sequence(&self) -> u32 {
        self.members
            .iter()
            .filter_map(|member| member.sequence)
            .max()
            .unwrap_or(0)
    }

    /// Row whose usage figures describe the whole package: the package parent
    /// (id equal to the root id) when it survived, else the first ranked row.
    pub fn usage_source(&self) -> Option<&ResolvedRecord> {
        self.members
            .iter()
            .find(|member| member.record.id == self.root_id)
            .or_else(|| self.members.iter().find(|member| member.sequence == Some(1)))
            .or_else(|| self.members.first())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exclusion {
    pub id: String,
    pub reason: ExclusionReason,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResolvedSet {
    /// Every row that passed identity checks, untouched.
    pub snapshot: Vec<SubscriptionRecord>,
    /// Surviving rows: has-root rows first, then amended rows, input order.
    pub records: Vec<ResolvedRecord>,
    pub groups: Vec<RootGroup>,
    pub net_quantities: BTreeMap<String, f64>,
    pub exclusions: Vec<Exclusion>,
    pub integrity_errors: Vec<DataIntegrityError>,
}

impl ResolvedSet {
    /// Contract ids among surviving rows, in first-seen order.
    pub fn contract_ids(&self) -> Vec<&str> {
        distinct(self.records.iter().map(|r| r.record.contract_id.as_str()))
    }

    /// Account ids in the full snapshot, in first-seen order.
    pub fn account_ids(&self) -> Vec<&str> {
        distinct(self.snapshot.iter().map(|r| r.account_id.as_str()))
    }
}

pub(crate) fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = Vec::new();
    for value in values {
        if !seen.contains(&value) {
            seen.push(value);
        }
    }
    seen
}

pub fn resolve(records: &[SubscriptionRecord]) -> ResolvedSet {
    let mut integrity_errors = Vec::new();
    let mut snapshot = Vec::with_capacity(records.len());
    for (position, record) in records.iter().enumerate() {
        match check_identity(position, record) {
            Ok(()) => snapshot.push(record.clone()),
            Err(err) => {
                warn!(target: "resolver", error = %err, "skipping record");
                integrity_errors.push(err);
            }
        }
    }

    let (with_root, missing_root): (Vec<_>, Vec<_>) =
        snapshot.iter().partition(|record| record.root_id.is_some());

    let mut rows: Vec<ResolvedRecord> = with_root
        .into_iter()
        .map(|record| ResolvedRecord {
            root_id: record.root_id.clone().unwrap_or_default(),
            record: record.clone(),
            amended: false,
            sequence: None,
        })
        .collect();
    rows.extend(missing_root.into_iter().map(amend));

    fill_package_mapping(&mut rows);

    let table = NettingTable::build(rows.iter().map(|row| &row.record));
    let mut exclusions = Vec::new();
    rows.retain(|row| match table.exclusion(&row.record) {
        Some(reason) => {
            debug!(target: "resolver", id = %row.record.id, ?reason, "excluding netted record");
            exclusions.push(Exclusion {
                id: row.record.id.clone(),
                reason,
            });
            false
        }
        None => true,
    });

    let groups = rank_and_group(&mut rows);
    info!(
        target: "resolver",
        input = records.len(),
        retained = rows.len(),
        excluded = exclusions.len(),
        rejected = integrity_errors.len(),
        groups = groups.len(),
        compound = groups.iter().filter(|g| g.is_compound()).count(),
        "resolved subscription snapshot"
    );

    ResolvedSet {
        snapshot,
        records: rows,
        groups,
        net_quantities: table.into_inner(),
        exclusions,
        integrity_errors,
    }
}

fn check_identity(position: usize, record: &SubscriptionRecord) -> Result<(), DataIntegrityError> {
    let label = || {
        if record.id.is_empty() {
            format!("#{position}")
        } else {
            record.id.clone()
        }
    };
    let missing = |field| DataIntegrityError::MissingField {
        record: label(),
        field,
    };
    if record.id.is_empty() {
        return Err(missing("id"));
    }
    if record.account_id.is_empty() {
        return Err(missing("accountId"));
    }
    if record.contract_id.is_empty() {
        return Err(missing("contractId"));
    }
    if record.root_id.is_none() && record.fallback_root_id.is_none() {
        return Err(missing("fallbackRootId"));
    }
    Ok(())
}

fn amend(record: &SubscriptionRecord) -> ResolvedRecord {
    let root_id = record.fallback_root_id.clone().unwrap_or_default();
    let mut record = record.clone();
    record.product_name.push_str(AMENDED_SUFFIX);
    record.root_id = Some(root_id.clone());
    ResolvedRecord {
        record,
        root_id,
        amended: true,
        sequence: None,
    }
}

/// Forward-fill then back-fill `package_mapping` within each root id.
fn fill_package_mapping(rows: &mut [ResolvedRecord]) {
    let mut positions: HashMap<String, Vec<usize>> = HashMap::new();
    for (index, row) in rows.iter().enumerate() {
        positions.entry(row.root_id.clone()).or_default().push(index);
    }

    for indices in positions.values() {
        let mut last: Option<String> = None;
        for &index in indices {
            match &rows[index].record.package_mapping {
                Some(value) => last = Some(value.clone()),
                None => rows[index].record.package_mapping = last.clone(),
            }
        }
        let mut next: Option<String> = None;
        for &index in indices.iter().rev() {
            match &rows[index].record.package_mapping {
                Some(value) => next = Some(value.clone()),
                None => rows[index].record.package_mapping = next.clone(),
            }
        }
    }
}

/// Number surviving rows per root id and build the groups. Amended rows stay
/// unranked and each forms a simple group of its own.
fn rank_and_group(rows: &mut [ResolvedRecord]) -> Vec<RootGroup> {
    let mut counters: HashMap<String, u32> = HashMap::new();
    for row in rows.iter_mut() {
        row.sequence = if row.amended {
            None
        } else {
            let counter = counters.entry(row.root_id.clone()).or_default();
            *counter += 1;
            Some(*counter)
        };
    }

    let mut groups: Vec<RootGroup> = Vec::new();
    let mut index_by_root: HashMap<String, usize> = HashMap::new();
    for row in rows.iter() {
        if row.amended {
            groups.push(RootGroup {
                root_id: row.root_id.clone(),
                kind: GroupKind::Simple,
                members: vec![row.clone()],
            });
            continue;
        }
        match index_by_root.get(&row.root_id) {
            Some(&index) => groups[index].members.push(row.clone()),
            None => {
                index_by_root.insert(row.root_id.clone(), groups.len());
                groups.push(RootGroup {
                    root_id: row.root_id.clone(),
                    kind: GroupKind::Simple,
                    members: vec![row.clone()],
                });
            }
        }
    }

    for group in &mut groups {
        if group.max_sequence() >= 2 {
            group.kind = GroupKind::Compound;
        }
    }
    groups
}
