use serde_json::json;

use subscription_sync::resolver::{resolve, ExclusionReason, GroupKind, NettingTable};
use subscription_sync::SubscriptionRecord;

fn records(value: serde_json::Value) -> Vec<SubscriptionRecord> {
    serde_json::from_value(value).expect("records parse")
}

#[test]
fn revision_that_cancels_its_original_removes_both() {
    let rows = records(json!([
        {"id": "A", "accountId": "acc", "contractId": "C1", "rootId": "A", "quantity": 5},
        {"id": "B", "accountId": "acc", "contractId": "C1", "rootId": "B", "revisedSubscriptionId": "A", "quantity": -5},
        {"id": "K", "accountId": "acc", "contractId": "C1", "rootId": "K", "quantity": 1}
    ]));

    let resolved = resolve(&rows);

    let kept: Vec<&str> = resolved.records.iter().map(|r| r.record.id.as_str()).collect();
    assert_eq!(kept, vec!["K"]);
    assert_eq!(resolved.exclusions.len(), 2);
    assert_eq!(resolved.exclusions[0].reason, ExclusionReason::NetZero);
    assert_eq!(resolved.net_quantities.get("A"), Some(&0.0));
    // accounts still see every row
    assert_eq!(resolved.snapshot.len(), 3);
}

#[test]
fn original_without_revisions_is_retained() {
    let rows = records(json!([
        {"id": "A", "accountId": "acc", "contractId": "C1", "rootId": "A", "quantity": 5}
    ]));
    let resolved = resolve(&rows);
    assert_eq!(resolved.records.len(), 1);
    assert!(resolved.exclusions.is_empty());
}

#[test]
fn missing_root_takes_fallback_and_is_amended() {
    let rows = records(json!([
        {"id": "s1", "accountId": "acc", "contractId": "C1", "fallbackRootId": "FX123",
         "productName": "Data Steward Seats", "quantity": 3}
    ]));

    let resolved = resolve(&rows);

    assert_eq!(resolved.groups.len(), 1);
    let group = &resolved.groups[0];
    assert_eq!(group.root_id, "FX123");
    assert_eq!(group.kind, GroupKind::Simple);
    assert_eq!(group.members[0].record.product_name, "Data Steward Seats - AMENDED");
    assert_eq!(group.members[0].sequence, None);
}

#[test]
fn rows_without_identity_are_reported() {
    let rows = records(json!([
        {"id": "s1", "contractId": "C1", "rootId": "R", "quantity": 1},
        {"id": "s2", "accountId": "acc", "contractId": "C1", "quantity": 1},
        {"id": "s3", "accountId": "acc", "contractId": "C1", "rootId": "R", "quantity": 1}
    ]));

    let resolved = resolve(&rows);

    let messages: Vec<String> = resolved.integrity_errors.iter().map(|e| e.to_string()).collect();
    assert_eq!(
        messages,
        vec![
            "record s1 is missing required field `accountId`",
            "record s2 is missing required field `fallbackRootId`",
        ]
    );
    assert_eq!(resolved.records.len(), 1);
}

#[test]
fn exclusion_matches_net_quantity_rule() {
    let rows = records(json!([
        {"id": "A", "accountId": "acc", "contractId": "C1", "rootId": "P", "quantity": 10},
        {"id": "B", "accountId": "acc", "contractId": "C1", "rootId": "P", "revisedSubscriptionId": "A", "quantity": -4},
        {"id": "C", "accountId": "acc", "contractId": "C1", "rootId": "P", "revisedSubscriptionId": "A", "quantity": -6},
        {"id": "D", "accountId": "acc", "contractId": "C1", "rootId": "P", "quantity": 0},
        {"id": "E", "accountId": "acc", "contractId": "C1", "rootId": "P", "revisedSubscriptionId": "Z", "quantity": 2}
    ]));

    let table = NettingTable::build(&rows);
    let resolved = resolve(&rows);

    for row in &rows {
        let own_zero = table.nets_to_zero(&row.id);
        let revised_zero = row
            .revised_subscription_id
            .as_deref()
            .is_some_and(|revised| table.nets_to_zero(revised));
        let retained = resolved.records.iter().any(|r| r.record.id == row.id);
        assert_eq!(retained, !(own_zero || revised_zero), "row {}", row.id);
    }
    let kept: Vec<&str> = resolved.records.iter().map(|r| r.record.id.as_str()).collect();
    assert_eq!(kept, vec!["E"]);
}

#[test]
fn resolving_twice_gives_the_same_result() {
    let rows = records(json!([
        {"id": "P", "accountId": "acc", "contractId": "C1", "rootId": "P", "quantity": 1, "packageMapping": "Enterprise"},
        {"id": "c1", "accountId": "acc", "contractId": "C1", "rootId": "P", "quantity": 2},
        {"id": "x", "accountId": "acc", "contractId": "C2", "fallbackRootId": "P", "quantity": 1}
    ]));

    assert_eq!(resolve(&rows), resolve(&rows));
}

#[test]
fn compound_groups_need_two_ranked_members() {
    let rows = records(json!([
        {"id": "P", "accountId": "acc", "contractId": "C1", "rootId": "P", "quantity": 1},
        {"id": "c1", "accountId": "acc", "contractId": "C1", "rootId": "P", "quantity": 2},
        {"id": "solo", "accountId": "acc", "contractId": "C1", "rootId": "solo", "quantity": 2}
    ]));

    let resolved = resolve(&rows);
    let kinds: Vec<(&str, GroupKind, u32)> = resolved
        .groups
        .iter()
        .map(|g| (g.root_id.as_str(), g.kind, g.max_sequence()))
        .collect();
    assert_eq!(
        kinds,
        vec![("P", GroupKind::Compound, 2), ("solo", GroupKind::Simple, 1)]
    );
}
