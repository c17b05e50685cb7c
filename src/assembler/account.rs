use serde_json::Value;

use super::document::{flag, integer, number, number_text, text, DocumentBuilder};
use super::{group_by, Assembler, EntityDocument};
use crate::error::AssemblyError;
use crate::records::{AccountInfo, SubscriptionRecord};
use crate::resolver::{distinct, ResolvedSet};
use crate::templates::EntityKind;

impl<'a> Assembler<'a> {
    /// One organization document per account in the snapshot. Accounts are
    /// built from every row that passed identity checks, netted or not.
    pub fn accounts(&self, resolved: &ResolvedSet) -> Result<Vec<EntityDocument>, AssemblyError> {
        let template = self.template(EntityKind::Account)?;
        let reference = self.template(EntityKind::AccountContract)?;

        Ok(group_by(&resolved.snapshot, |record| record.account_id.as_str())
            .into_iter()
            .filter_map(|(account_id, rows)| {
                let first = rows.first()?;
                Some(account_document(template, reference, account_id, first, &rows))
            })
            .collect())
    }
}

fn account_document(
    template: &Value,
    reference: &Value,
    account_id: &str,
    first: &SubscriptionRecord,
    rows: &[&SubscriptionRecord],
) -> Value {
    let info = &first.account;
    let mut builder = DocumentBuilder::entity(template)
        .set("/crosswalks/0/value", account_id)
        .set("/crosswalks/1/value", account_id)
        .field("SalesForceID", Some(Value::from(account_id)));

    for (name, value) in scalar_fields(info) {
        builder = builder.field(name, value);
    }

    let address = &info.billing_address;
    builder = builder
        .field_path(
            &["Total_Subscription_ACV__gc", "Total_Subscription_ACV__gc"],
            number_text(info.total_subscription_acv),
        )
        .field_path(
            &["Total_Subscription_ACV__gc", "SalesRevenueCurrency"],
            text(&info.currency_iso_code),
        )
        .field_path(&["Phone", "Number"], text(&info.phone))
        .field_path(
            &["KeyFinancialFiguresOverview", "SalesRevenueAmount"],
            number_text(info.annual_revenue),
        )
        .field_path(
            &["KeyFinancialFiguresOverview", "SalesRevenueCurrencyCode"],
            text(&info.currency_iso_code),
        )
        .field_path(&["Address", "AddressLine1"], text(&address.street))
        .field_path(&["Address", "City"], text(&address.city))
        .field_path(&["Address", "StateProvince"], text(&address.state))
        .field_path(&["Address", "Country"], text(&address.country))
        .field_path(&["Address", "ISO3166-2"], text(&address.country_code))
        .set("/attributes/Address/0/refRelation/crosswalks/0/value", account_id);

    builder = match info.number_of_employees {
        Some(count) => builder.field_path(
            &["EmployeeDetails", "NumberOfEmployees"],
            integer(Some(count)),
        ),
        None => builder.remove_path(&["EmployeeDetails"]),
    };

    builder = match address.postal_code.as_deref() {
        Some(raw) => {
            let (zip5, zip4) = split_postal_code(raw);
            builder
                .field_path(&["Address", "Zip", "Zip5"], Some(Value::from(zip5)))
                .field_path(&["Address", "Zip", "Zip4"], zip4.map(Value::from))
        }
        None => builder.remove_path(&["Address", "Zip"]),
    };

    let contracts = distinct(rows.iter().map(|row| row.contract_id.as_str()))
        .into_iter()
        .map(|contract_id| {
            let name = rows
                .iter()
                .find(|row| row.contract_id == contract_id)
                .and_then(|row| row.contract.opportunity_name.clone());
            DocumentBuilder::nested(reference)
                .set("/refEntity/crosswalks/0/value", contract_id)
                .set("/refEntity/crosswalks/1/value", contract_id)
                .set(
                    "/refRelation/crosswalks/0/value",
                    format!("{account_id}_{contract_id}"),
                )
                .field("ContractName", name.map(Value::from))
                .build()
        })
        .collect();

    builder.insert_field("Contract", Value::Array(contracts)).build()
}

fn scalar_fields(info: &AccountInfo) -> Vec<(&'static str, Option<Value>)> {
    vec![
        ("Name", text(&info.name)),
        ("OrganizationType", text(&info.account_type)),
        ("AccountRegion", text(&info.region)),
        ("AccountTerritory", text(&info.territory)),
        ("WebsiteURL", text(&info.website)),
        ("OriginalContractDate", text(&info.original_contract_date)),
        ("Industry", text(&info.industry)),
        ("subIndustry", text(&info.sub_industry)),
        ("Site", text(&info.site)),
        ("MarketSegmentation", text(&info.market_segmentation)),
        ("TargetAccount", text(&info.target_account)),
        ("PoRequired", text(&info.po_required)),
        ("RenewalPricingMethod", text(&info.renewal_pricing_method)),
        ("RenewalModel", text(&info.renewal_model)),
        ("SupportLevel", text(&info.support_level)),
        ("accountIntentScore6sense", number(info.intent_score)),
        ("Engaged", flag(info.engaged)),
        ("accountBuyingStage6sense", text(&info.buying_stage_signal)),
        ("accountProfileScore6sense", number(info.profile_score)),
        ("EngagedContactCount", integer(info.engaged_contact_count)),
        ("IsDeleted", flag(info.is_deleted)),
        ("accountProfileFit6sense", text(&info.profile_fit)),
        ("TenantID", text(&info.tenant_id)),
        ("ReltioTargetAccount", flag(info.strategic_target)),
        ("PartnerType", text(&info.partner_type)),
        ("PartnerTierLevel", text(&info.partner_tier_level)),
        ("PartnerSubType", text(&info.partner_sub_type)),
        ("PartnerIntel", flag(info.partner_intel)),
        ("ParentId", text(&info.parent_id)),
        ("OwnerId", text(&info.owner_id)),
        ("CreatedDate", text(&info.created_date)),
        ("BuyingStage", text(&info.buying_stage)),
        ("AllboundID", text(&info.allbound_id)),
        ("CurrencyIsoCode", text(&info.currency_iso_code)),
    ]
}

/// Splits `"94105-1234"` into the 5-digit and 4-digit parts: the text before
/// the first hyphen and the text after the last one. A code without a hyphen
/// has no extension.
pub fn split_postal_code(raw: &str) -> (String, Option<String>) {
    match raw.split_once('-') {
        Some((zip5, _)) => {
            let zip4 = raw.rsplit_once('-').map(|(_, ext)| ext.trim()).unwrap_or_default();
            (
                zip5.trim().to_string(),
                (!zip4.is_empty()).then(|| zip4.to_string()),
            )
        }
        None => (raw.trim().to_string(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn postal_codes_split_on_the_first_hyphen() {
        assert_eq!(
            split_postal_code("94105-1234"),
            ("94105".to_string(), Some("1234".to_string()))
        );
        assert_eq!(split_postal_code("SW1A 1AA"), ("SW1A 1AA".to_string(), None));
        assert_eq!(split_postal_code("94105-"), ("94105".to_string(), None));
        assert_eq!(
            split_postal_code("12345-67-89"),
            ("12345".to_string(), Some("89".to_string()))
        );
    }
}
