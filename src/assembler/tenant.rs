use serde_json::Value;

use super::document::{text, DocumentBuilder};
use super::{Assembler, EntityDocument};
use crate::error::AssemblyError;
use crate::templates::EntityKind;
use crate::tenants::{TenantRow, TenantSet};

const TENANT_TYPE: &str = "MDM";
const TENANT_RECORD_TYPE: &str = "Customer";
const OWNING_DEPARTMENT: &str = "Customer Success";

impl<'a> Assembler<'a> {
    pub fn tenants(&self, tenants: &TenantSet) -> Result<Vec<EntityDocument>, AssemblyError> {
        let template = self.template(EntityKind::Tenant)?;
        Ok(tenants
            .rows
            .iter()
            .map(|row| tenant_document(template, row))
            .collect())
    }
}

fn tenant_document(template: &Value, row: &TenantRow) -> Value {
    let tenant_id = row.tenant_id.as_str();
    let tenant = &row.tenant;
    let url = format!("/{tenant_id}");
    let description = match (&tenant.tenant_purpose, &row.account_name) {
        (Some(purpose), Some(name)) => Some(Value::from(format!("{purpose} - {name}"))),
        _ => None,
    };

    let builder = DocumentBuilder::entity(template)
        .set("/crosswalks/0/value", tenant_id)
        .set("/crosswalks/1/value", tenant_id)
        .set("/crosswalks/0/url", url.as_str())
        .set("/crosswalks/1/url", url.as_str())
        .field("TenantID", Some(Value::from(tenant_id)))
        .field("shortDescription", description)
        .field("TenantType", Some(Value::from(TENANT_TYPE)))
        .field("TenantRecordType", Some(Value::from(TENANT_RECORD_TYPE)))
        .field("Environment", text(&tenant.environment))
        .field("subscriptionName", text(&tenant.sales_config.subscription_name))
        .field("subscriptionId", text(&tenant.sales_config.subscription_id))
        .field("subStartDate", text(&tenant.sales_config.start_date))
        .field("subEndDate", text(&tenant.sales_config.end_date))
        .field("TenantdeploymentCloud", text(&tenant.deployment_cloud))
        .field("TenantdeploymentRegion", text(&tenant.deployment_region))
        .field("ownedByReltioDept", Some(Value::from(OWNING_DEPARTMENT)))
        .field("Root_ID", text(&tenant.package_id))
        .field_path(&["EndUserCustomer", "Name"], text(&row.account_name))
        .set(
            "/attributes/EndUserCustomer/0/refEntity/crosswalks/0/value",
            row.account_id.as_str(),
        )
        .set(
            "/attributes/EndUserCustomer/0/refEntity/crosswalks/1/value",
            row.account_id.as_str(),
        )
        .set(
            "/attributes/EndUserCustomer/0/refRelation/crosswalks/0/value",
            format!("{}_{tenant_id}", row.account_id),
        );

    let (kept, dropped) = if row.is_base_package() {
        ("BasePackageContract", "AdditionalContract")
    } else {
        ("AdditionalContract", "BasePackageContract")
    };
    let contract_id = row.contract_id.as_str();
    builder
        .set(&format!("/attributes/{kept}/0/refEntity/crosswalks/0/value"), contract_id)
        .set(&format!("/attributes/{kept}/0/refEntity/crosswalks/1/value"), contract_id)
        .set(
            &format!("/attributes/{kept}/0/refRelation/crosswalks/0/value"),
            format!("{contract_id}_{tenant_id}"),
        )
        .field_path(&[kept, "ContractName"], text(&row.contract_name))
        .remove_path(&[dropped])
        .build()
}
