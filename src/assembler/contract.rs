use serde_json::Value;

use super::document::{integer, number_text, text, DocumentBuilder};
use super::{group_by, Assembler, CrmLinks, EntityDocument};
use crate::error::AssemblyError;
use crate::records::{ContractInfo, UsageMetrics};
use crate::resolver::{ResolvedRecord, ResolvedSet, RootGroup};
use crate::templates::EntityKind;

pub const PACKAGE_LINK_PRODUCT: &str = "Package Link";

/// Usage rows appended to every compound package, in emission order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyntheticRow {
    ConsolidatedProfiles,
    StorageUnits,
    StorageUnitQuantity,
    TotalStorageUnits,
    Credits,
    ManagedCredits,
    ApiUsage,
    Tasks,
    DataDomain,
}

impl SyntheticRow {
    pub const ALL: [SyntheticRow; 9] = [
        SyntheticRow::ConsolidatedProfiles,
        SyntheticRow::StorageUnits,
        SyntheticRow::StorageUnitQuantity,
        SyntheticRow::TotalStorageUnits,
        SyntheticRow::Credits,
        SyntheticRow::ManagedCredits,
        SyntheticRow::ApiUsage,
        SyntheticRow::Tasks,
        SyntheticRow::DataDomain,
    ];

    pub fn product_name(&self) -> &'static str {
        match self {
            SyntheticRow::ConsolidatedProfiles => "ROR CP Entitlement",
            SyntheticRow::StorageUnits => "ROR RSU Storage Entitlement",
            SyntheticRow::StorageUnitQuantity => "ROR RSU Quantity",
            SyntheticRow::TotalStorageUnits => "ROR Total RSU Entitlement",
            SyntheticRow::Credits => "ROR Agentflow Credits Entitlement",
            SyntheticRow::ManagedCredits => "ROR Agentflow Credits Managed Entitlement",
            SyntheticRow::ApiUsage => "ROR API Usage Entitlement",
            SyntheticRow::Tasks => "ROR RIH Tasks Entitlement",
            SyntheticRow::DataDomain => "ROR Data Domain",
        }
    }

    fn quantity(&self, usage: &UsageMetrics) -> f64 {
        match self {
            SyntheticRow::ConsolidatedProfiles => usage.consolidated_profiles,
            SyntheticRow::StorageUnits => usage.storage_units,
            SyntheticRow::StorageUnitQuantity => usage.storage_unit_quantity,
            SyntheticRow::TotalStorageUnits => usage.total_storage_units,
            SyntheticRow::Credits => usage.credits,
            SyntheticRow::ManagedCredits => usage.managed_credits,
            SyntheticRow::ApiUsage => usage.api_calls,
            SyntheticRow::Tasks => usage.tasks,
            SyntheticRow::DataDomain => 0.0,
        }
    }
}

/// One entry of a package's `Subscription_details` list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PackageRow {
    pub product_name: String,
    /// Whole-number quantity rendered as text.
    pub quantity: String,
    pub root_id: String,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub domain_name: Option<String>,
    pub link: Option<String>,
    pub package_mapping: Option<String>,
    pub data_domain: Option<String>,
    pub product_code: Option<String>,
    pub other_data_domain: Option<String>,
}

impl PackageRow {
    fn member(member: &ResolvedRecord) -> Self {
        let record = &member.record;
        Self {
            product_name: record.product_name.clone(),
            quantity: whole_quantity(record.quantity),
            root_id: member.root_id.clone(),
            start_date: record.start_date.clone(),
            end_date: record.end_date.clone(),
            domain_name: record.domain_name.clone(),
            link: None,
            package_mapping: record.package_mapping.clone(),
            data_domain: record.usage.data_domain.clone(),
            product_code: record.product_code.clone(),
            other_data_domain: record.usage.other_data_domain.clone(),
        }
    }

    /// Row inheriting dates, mapping and codes from the usage source.
    fn derived(source: &ResolvedRecord, root_id: &str, product_name: &str, quantity: f64, link: &str) -> Self {
        let record = &source.record;
        Self {
            product_name: product_name.to_string(),
            quantity: whole_quantity(quantity),
            root_id: root_id.to_string(),
            start_date: record.start_date.clone(),
            end_date: record.end_date.clone(),
            domain_name: record.domain_name.clone(),
            link: Some(link.to_string()),
            package_mapping: record.package_mapping.clone(),
            data_domain: None,
            product_code: record.product_code.clone(),
            other_data_domain: None,
        }
    }

    fn render(&self, template: &Value) -> Value {
        DocumentBuilder::nested(template)
            .field("Product_Name", Some(Value::from(self.product_name.as_str())))
            .field("Product_Quantity", Some(Value::from(self.quantity.as_str())))
            .field("RootID", Some(Value::from(self.root_id.as_str())))
            .field("Start_Date", text(&self.start_date))
            .field("End_Date", text(&self.end_date))
            .field("Domain_Name", text(&self.domain_name))
            .field("sf_package_link", text(&self.link))
            .field("packageMapping", text(&self.package_mapping))
            .field("dataDomain", text(&self.data_domain))
            .field("productCode", text(&self.product_code))
            .field("dataDomainOtherDetail", text(&self.other_data_domain))
            .build()
    }
}

fn whole_quantity(quantity: f64) -> String {
    if quantity.is_finite() {
        (quantity.trunc() as i64).to_string()
    } else {
        "0".to_string()
    }
}

/// Rows of one compound package within a contract: the members themselves,
/// then the nine usage rows, then the package link marker. Usage figures come
/// from the contract's own members only.
pub fn package_rows(group: &RootGroup, members: &[&ResolvedRecord], links: &CrmLinks) -> Vec<PackageRow> {
    let mut rows: Vec<PackageRow> = members.iter().map(|member| PackageRow::member(member)).collect();
    let Some(source) = usage_source(&group.root_id, members) else {
        return rows;
    };

    let link = links.subscription(&group.root_id);
    let usage = &source.record.usage;
    rows.extend(SyntheticRow::ALL.iter().map(|kind| {
        let mut row = PackageRow::derived(source, &group.root_id, kind.product_name(), kind.quantity(usage), &link);
        if *kind == SyntheticRow::DataDomain {
            row.data_domain = usage.data_domain.clone();
            row.other_data_domain = usage.other_data_domain.clone();
        }
        row
    }));
    rows.push(PackageRow::derived(source, &group.root_id, PACKAGE_LINK_PRODUCT, 0.0, &link));
    rows
}

/// The package parent when it sits in this contract, else the first ranked
/// member, else the first member.
fn usage_source<'m>(root_id: &str, members: &[&'m ResolvedRecord]) -> Option<&'m ResolvedRecord> {
    members
        .iter()
        .find(|member| member.record.id == root_id)
        .or_else(|| members.iter().filter(|member| member.sequence.is_some()).min_by_key(|member| member.sequence))
        .or_else(|| members.first())
        .copied()
}

/// A root group is a package within a contract when any of the contract's
/// members ranks second or later.
fn is_package_in_contract(members: &[&ResolvedRecord]) -> bool {
    members.iter().any(|member| member.sequence.is_some_and(|rank| rank >= 2))
}

impl<'a> Assembler<'a> {
    /// One contract document per contract among the surviving rows.
    pub fn contracts(&self, resolved: &ResolvedSet) -> Result<Vec<EntityDocument>, AssemblyError> {
        let templates = ContractTemplates {
            contract: self.template(EntityKind::Contract)?,
            detail: self.template(EntityKind::ContractDetail)?,
            package: self.template(EntityKind::PackageDetail)?,
            group: self.template(EntityKind::PackageGroup)?,
        };

        Ok(group_by(&resolved.records, |row| row.record.contract_id.as_str())
            .into_iter()
            .filter_map(|(contract_id, rows)| {
                let first = rows.first()?;
                Some(self.contract_document(&templates, contract_id, &first.record.contract, &resolved.groups))
            })
            .collect())
    }

    fn contract_document(
        &self,
        templates: &ContractTemplates<'_>,
        contract_id: &str,
        info: &ContractInfo,
        groups: &[RootGroup],
    ) -> Value {
        let mut builder = DocumentBuilder::entity(templates.contract)
            .set("/crosswalks/0/value", contract_id)
            .field("ContractID18Char", Some(Value::from(contract_id)))
            .field("sfContractLink", Some(Value::from(self.links.contract(contract_id))));
        for (name, value) in scalar_fields(info) {
            builder = builder.field(name, value);
        }

        let mut details = Vec::new();
        let mut packages = Vec::new();
        for group in groups {
            let members: Vec<&ResolvedRecord> = group
                .members
                .iter()
                .filter(|member| member.record.contract_id == contract_id)
                .collect();
            let Some(lead) = members.first() else {
                continue;
            };
            if is_package_in_contract(&members) {
                let rows: Vec<Value> = package_rows(group, &members, &self.links)
                    .iter()
                    .map(|row| row.render(templates.package))
                    .collect();
                packages.push(
                    DocumentBuilder::nested(templates.group)
                        .insert_field("Subscription_details", Value::Array(rows))
                        .build(),
                );
            } else {
                details.push(detail_row(templates.detail, lead));
            }
        }
        tracing::debug!(
            target: "assembler",
            contract_id,
            details = details.len(),
            packages = packages.len(),
            "assembled contract"
        );

        builder = if details.is_empty() {
            builder.remove_path(&["Contract_details"])
        } else {
            builder.insert_field("Contract_details", Value::Array(details))
        };
        builder = if packages.is_empty() {
            builder.remove_path(&["Base_Package_Details"])
        } else {
            builder.insert_field("Base_Package_Details", Value::Array(packages))
        };
        builder.build()
    }
}

struct ContractTemplates<'t> {
    contract: &'t Value,
    detail: &'t Value,
    package: &'t Value,
    group: &'t Value,
}

fn detail_row(template: &Value, lead: &ResolvedRecord) -> Value {
    let record = &lead.record;
    DocumentBuilder::nested(template)
        .field("Product_Name", Some(Value::from(record.product_name.as_str())))
        .field("Product_Quantity", integer(Some(record.quantity)))
        .field("RootID", Some(Value::from(lead.root_id.as_str())))
        .field("Start_Date", text(&record.start_date))
        .field("End_Date", text(&record.end_date))
        .build()
}

fn scalar_fields(info: &ContractInfo) -> Vec<(&'static str, Option<Value>)> {
    vec![
        ("ContractNumber", text(&info.contract_number)),
        ("ContractName", text(&info.opportunity_name)),
        ("ContractType", text(&info.record_type)),
        ("ContractStatus", text(&info.status)),
        ("renewalAcv", number_text(info.renewal_acv)),
        ("ProcurementChannel", text(&info.procurement_channel)),
        ("ActivatedDate", text(&info.activated_date)),
        ("ContractStartDate", text(&info.start_date)),
        ("ContractEndDate", text(&info.end_date)),
        ("HIPAAFinance", text(&info.hipaa_finance)),
        ("InternationalBusiness", text(&info.international_business)),
        ("Industry", text(&info.industry)),
        ("MarketSegment", text(&info.market_segment)),
        ("CloudProvider", text(&info.cloud_provider)),
        ("TenantDeploymentRegion", text(&info.deployment_region)),
        ("productFamily", text(&info.product_family)),
        ("pooledApi", text(&info.pooled_apis)),
        ("pooledCP", text(&info.pooled_profiles)),
        ("pooledRih", text(&info.pooled_rih)),
        ("pooledRsu", text(&info.pooled_rsus)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::SubscriptionRecord;
    use crate::resolver::resolve;

    fn member(id: &str, root: &str) -> SubscriptionRecord {
        SubscriptionRecord {
            id: id.to_string(),
            account_id: "acc".to_string(),
            contract_id: "con".to_string(),
            root_id: Some(root.to_string()),
            product_name: format!("Product {id}"),
            quantity: 2.7,
            ..Default::default()
        }
    }

    #[test]
    fn compound_groups_gain_nine_usage_rows_and_a_link() {
        let mut parent = member("P", "P");
        parent.usage.consolidated_profiles = 1_000_000.0;
        parent.usage.api_calls = 2500.9;
        parent.usage.data_domain = Some("Customer".to_string());
        let resolved = resolve(&[parent, member("c1", "P"), member("c2", "P")]);
        let group = &resolved.groups[0];
        let members: Vec<&ResolvedRecord> = group.members.iter().collect();

        let rows = package_rows(group, &members, &CrmLinks::new("https://crm.example/r"));

        assert_eq!(rows.len(), 3 + 10);
        let names: Vec<&str> = rows[3..].iter().map(|r| r.product_name.as_str()).collect();
        let mut expected: Vec<&str> = SyntheticRow::ALL.iter().map(|k| k.product_name()).collect();
        expected.push(PACKAGE_LINK_PRODUCT);
        assert_eq!(names, expected);

        assert_eq!(rows[0].quantity, "2");
        assert_eq!(rows[0].link, None);
        assert_eq!(rows[3].quantity, "1000000");
        assert_eq!(rows[9].quantity, "2500");
        assert_eq!(rows[11].data_domain.as_deref(), Some("Customer"));
        assert_eq!(rows[3].data_domain, None);
        assert_eq!(
            rows[12].link.as_deref(),
            Some("https://crm.example/r/SBQQ__Subscription__c/P/view")
        );
        assert!(rows[3..].iter().all(|r| r.root_id == "P"));
    }

    #[test]
    fn missing_parent_still_yields_usage_rows() {
        let resolved = resolve(&[member("c1", "P"), member("c2", "P")]);
        let group = &resolved.groups[0];
        let members: Vec<&ResolvedRecord> = group.members.iter().collect();

        let rows = package_rows(group, &members, &CrmLinks::default());
        assert_eq!(rows.len(), 12);
        assert!(rows[2..].iter().all(|r| r.quantity == "0"));
    }
}
