use std::collections::BTreeMap;

use crate::records::SubscriptionRecord;

const ZERO_TOLERANCE: f64 = 1e-9;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExclusionReason {
    /// The record's own id nets to zero.
    NetZero,
    /// The record revises an id that nets to zero.
    RevisesNetZero { revised: String },
}

/// Net quantity per subscription id across one revision hop.
///
/// The net of an id is its own quantity plus the quantity of every record
/// naming it as `revised_subscription_id`. Revisions of revisions are not
/// followed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NettingTable {
    net: BTreeMap<String, f64>,
}

impl NettingTable {
    pub fn build<'a>(records: impl IntoIterator<Item = &'a SubscriptionRecord>) -> Self {
        let mut net: BTreeMap<String, f64> = BTreeMap::new();
        for record in records {
            *net.entry(record.id.clone()).or_default() += record.quantity;
            if let Some(revised) = &record.revised_subscription_id {
                *net.entry(revised.clone()).or_default() += record.quantity;
            }
        }
        Self { net }
    }

    pub fn net(&self, id: &str) -> Option<f64> {
        self.net.get(id).copied()
    }

    pub fn nets_to_zero(&self, id: &str) -> bool {
        self.net(id)
            .map(|quantity| quantity.abs() < ZERO_TOLERANCE)
            .unwrap_or(false)
    }

    pub fn exclusion(&self, record: &SubscriptionRecord) -> Option<ExclusionReason> {
        if self.nets_to_zero(&record.id) {
            return Some(ExclusionReason::NetZero);
        }
        record
            .revised_subscription_id
            .as_ref()
            .filter(|revised| self.nets_to_zero(revised))
            .map(|revised| ExclusionReason::RevisesNetZero {
                revised: revised.clone(),
            })
    }

    pub fn into_inner(self) -> BTreeMap<String, f64> {
        self.net
    }
}
