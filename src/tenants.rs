//! Usage-package tenants joined onto the resolved subscription graph.

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::records::coerce;
use crate::resolver::ResolvedSet;

/// A usage package as reported by the package management service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsagePackage {
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub subscription_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub package_type: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_flag")]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub mdm_tenants: Vec<MdmTenant>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MdmTenant {
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub tenant_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub tenant_purpose: Option<String>,
    #[serde(default, rename = "reltioEnv", deserialize_with = "coerce::optional_text")]
    pub environment: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub deployment_cloud: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub deployment_region: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub package_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub contract_id: Option<String>,
    #[serde(default)]
    pub sales_config: SalesConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SalesConfig {
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub subscription_name: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub subscription_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub end_date: Option<String>,
}

/// One tenant ready for the tenant document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TenantRow {
    pub tenant_id: String,
    pub tenant: MdmTenant,
    pub package_type: Option<String>,
    pub account_id: String,
    pub account_name: Option<String>,
    pub contract_id: String,
    pub contract_name: Option<String>,
}

impl TenantRow {
    pub fn is_base_package(&self) -> bool {
        self.package_type
            .as_deref()
            .is_some_and(|kind| kind.trim().eq_ignore_ascii_case("BASE"))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantSet {
    pub rows: Vec<TenantRow>,
    /// Tenant ids carried by more than one row. Reported, never rejected.
    pub duplicate_tenant_ids: Vec<String>,
}

impl TenantSet {
    pub fn has_duplicates(&self) -> bool {
        !self.duplicate_tenant_ids.is_empty()
    }
}

pub fn resolve_tenants(packages: &[UsagePackage], resolved: &ResolvedSet) -> TenantSet {
    let active: Vec<&UsagePackage> = packages
        .iter()
        .filter(|package| package.is_active == Some(true))
        .collect();

    let mut tenants: Vec<&MdmTenant> = Vec::new();
    for tenant in active.iter().flat_map(|package| package.mdm_tenants.iter()) {
        if tenant.tenant_id.is_some() && !tenants.contains(&tenant) {
            tenants.push(tenant);
        }
    }
    tenants.sort_by(|a, b| {
        (&a.contract_id, &a.tenant_id, &a.package_id).cmp(&(&b.contract_id, &b.tenant_id, &b.package_id))
    });

    // key: contract id -> (account id, account name, contract name), first seen wins per pair
    let mut owners: Vec<(&str, &str, Option<&str>, Option<&str>)> = Vec::new();
    for row in &resolved.records {
        let record = &row.record;
        let owner = (
            record.contract_id.as_str(),
            record.account_id.as_str(),
            record.account.name.as_deref(),
            record.contract.opportunity_name.as_deref(),
        );
        if !owners.iter().any(|(c, a, _, _)| *c == owner.0 && *a == owner.1) {
            owners.push(owner);
        }
    }

    let mut rows = Vec::new();
    for tenant in tenants {
        let Some(tenant_id) = tenant.tenant_id.clone() else {
            continue;
        };
        let Some(contract_id) = tenant.contract_id.as_deref() else {
            continue;
        };
        let package_type = active
            .iter()
            .find(|package| package.subscription_id.is_some() && package.subscription_id == tenant.package_id)
            .and_then(|package| package.package_type.clone());

        for (_, account_id, account_name, contract_name) in
            owners.iter().filter(|(owner_contract, ..)| *owner_contract == contract_id)
        {
            rows.push(TenantRow {
                tenant_id: tenant_id.clone(),
                tenant: tenant.clone(),
                package_type: package_type.clone(),
                account_id: account_id.to_string(),
                account_name: account_name.map(str::to_string),
                contract_id: contract_id.to_string(),
                contract_name: contract_name.map(str::to_string),
            });
        }
    }

    let mut duplicate_tenant_ids: Vec<String> = Vec::new();
    for (index, row) in rows.iter().enumerate() {
        let repeated = rows[index + 1..].iter().any(|other| other.tenant_id == row.tenant_id);
        if repeated && !duplicate_tenant_ids.contains(&row.tenant_id) {
            duplicate_tenant_ids.push(row.tenant_id.clone());
        }
    }
    if !duplicate_tenant_ids.is_empty() {
        warn!(target: "tenants", duplicates = ?duplicate_tenant_ids, "duplicate tenant ids");
    }
    info!(
        target: "tenants",
        packages = packages.len(),
        active = active.len(),
        rows = rows.len(),
        "resolved tenants"
    );

    TenantSet {
        rows,
        duplicate_tenant_ids,
    }
}
