use serde_json::{json, Value};

use subscription_sync::assembler::{Assembler, CrmLinks};
use subscription_sync::error::AssemblyError;
use subscription_sync::tenants::{resolve_tenants, TenantSet, UsagePackage};
use subscription_sync::{
    resolve, EntityKind, ResolvedSet, StaticTemplateStore, SubscriptionRecord, TemplateStore,
};

fn snapshot() -> Vec<SubscriptionRecord> {
    serde_json::from_value(json!([
        {
            "id": "PKG", "accountId": "001A", "contractId": "800A", "rootId": "PKG",
            "productName": "Enterprise Package", "quantity": 1, "packageMapping": "Enterprise",
            "startDate": "2024-01-01", "endDate": "2025-01-01",
            "usage": {"consolidatedProfiles": 5000000, "apiCalls": "120000000.0", "dataDomain": "Customer"},
            "account": {
                "name": "Acme Corp", "accountType": "Customer", "engaged": false,
                "billingAddress": {"street": "1 Main St", "city": "Springfield", "postalCode": "94105-1234"}
            },
            "contract": {"contractNumber": "00001234", "opportunityName": "Acme Renewal 2024", "renewalAcv": 125000.5}
        },
        {
            "id": "CHILD", "accountId": "001A", "contractId": "800A", "rootId": "PKG",
            "productName": "Extra Tenant", "quantity": 2.9,
            "account": {"name": "Acme Corp"},
            "contract": {"opportunityName": "Acme Renewal 2024"}
        },
        {
            "id": "SOLO", "accountId": "001A", "contractId": "800B", "rootId": "SOLO",
            "productName": "Premium Support", "quantity": 3, "startDate": "2024-03-01",
            "account": {"name": "Acme Corp"},
            "contract": {"opportunityName": "Acme Support"}
        }
    ]))
    .expect("snapshot parses")
}

fn builtin() -> StaticTemplateStore {
    StaticTemplateStore::builtin().expect("builtin templates parse")
}

fn contract<'d>(documents: &'d [Value], id: &str) -> &'d Value {
    documents
        .iter()
        .find(|doc| doc["crosswalks"][0]["value"] == id)
        .expect("contract document present")
}

#[test]
fn compound_contract_nests_a_package_with_usage_rows() {
    let store = builtin();
    let resolved = resolve(&snapshot());
    let assembler = Assembler::new(&store, CrmLinks::new("https://crm.example/lightning/r"));

    let documents = assembler.contracts(&resolved).expect("contracts assemble");
    assert_eq!(documents.len(), 2);

    let compound = contract(&documents, "800A");
    let attributes = &compound["attributes"];
    assert!(attributes.get("Contract_details").is_none());
    assert_eq!(attributes["ContractName"][0]["value"], "Acme Renewal 2024");
    assert_eq!(attributes["renewalAcv"][0]["value"], "125000.5");
    assert_eq!(
        attributes["sfContractLink"][0]["value"],
        "https://crm.example/lightning/r/Contract/800A/view"
    );
    assert!(attributes.get("ContractStatus").is_none());

    let packages = attributes["Base_Package_Details"].as_array().unwrap();
    assert_eq!(packages.len(), 1);
    let rows = packages[0]["value"]["Subscription_details"].as_array().unwrap();
    assert_eq!(rows.len(), 2 + 10);

    let names: Vec<&str> = rows
        .iter()
        .map(|row| row["value"]["Product_Name"][0]["value"].as_str().unwrap())
        .collect();
    assert_eq!(
        &names[2..],
        &[
            "ROR CP Entitlement",
            "ROR RSU Storage Entitlement",
            "ROR RSU Quantity",
            "ROR Total RSU Entitlement",
            "ROR Agentflow Credits Entitlement",
            "ROR Agentflow Credits Managed Entitlement",
            "ROR API Usage Entitlement",
            "ROR RIH Tasks Entitlement",
            "ROR Data Domain",
            "Package Link",
        ]
    );
    assert_eq!(rows[1]["value"]["Product_Quantity"][0]["value"], "2");
    assert_eq!(rows[2]["value"]["Product_Quantity"][0]["value"], "5000000");
    assert_eq!(rows[8]["value"]["Product_Quantity"][0]["value"], "120000000");
    assert_eq!(rows[10]["value"]["dataDomain"][0]["value"], "Customer");
    assert_eq!(rows[1]["value"]["packageMapping"][0]["value"], "Enterprise");
    assert!(rows[0]["value"].get("sf_package_link").is_none());
    assert_eq!(
        rows[11]["value"]["sf_package_link"][0]["value"],
        "https://crm.example/lightning/r/SBQQ__Subscription__c/PKG/view"
    );
}

#[test]
fn simple_contract_lists_detail_rows_only() {
    let store = builtin();
    let resolved = resolve(&snapshot());
    let assembler = Assembler::new(&store, CrmLinks::default());

    let documents = assembler.contracts(&resolved).unwrap();
    let simple = contract(&documents, "800B");
    let attributes = &simple["attributes"];

    assert!(attributes.get("Base_Package_Details").is_none());
    let details = attributes["Contract_details"].as_array().unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0]["value"]["Product_Name"][0]["value"], "Premium Support");
    assert_eq!(details[0]["value"]["Product_Quantity"][0]["value"], 3);
    assert_eq!(details[0]["value"]["Start_Date"][0]["value"], "2024-03-01");
    assert!(details[0]["value"].get("End_Date").is_none());
}

#[test]
fn account_document_references_each_contract_once() {
    let store = builtin();
    let resolved = resolve(&snapshot());
    let assembler = Assembler::new(&store, CrmLinks::default());

    let documents = assembler.accounts(&resolved).unwrap();
    assert_eq!(documents.len(), 1);
    let account = &documents[0];
    let attributes = &account["attributes"];

    assert_eq!(account["crosswalks"][0]["value"], "001A");
    assert_eq!(account["crosswalks"][1]["value"], "001A");
    assert_eq!(attributes["Name"][0]["value"], "Acme Corp");
    assert_eq!(attributes["Engaged"][0]["value"], false);
    assert!(attributes.get("EmployeeDetails").is_none());
    assert!(attributes.get("Site").is_none());

    let address = &attributes["Address"][0];
    assert_eq!(address["value"]["City"][0]["value"], "Springfield");
    assert_eq!(address["value"]["Zip"][0]["value"]["Zip5"][0]["value"], "94105");
    assert_eq!(address["value"]["Zip"][0]["value"]["Zip4"][0]["value"], "1234");
    assert_eq!(address["refRelation"]["crosswalks"][0]["value"], "001A");

    let contracts = attributes["Contract"].as_array().unwrap();
    assert_eq!(contracts.len(), 2);
    assert_eq!(contracts[0]["refEntity"]["crosswalks"][0]["value"], "800A");
    assert_eq!(contracts[0]["refRelation"]["crosswalks"][0]["value"], "001A_800A");
    assert_eq!(contracts[1]["value"]["ContractName"][0]["value"], "Acme Support");
}

fn tenants(resolved: &ResolvedSet) -> TenantSet {
    let packages: Vec<UsagePackage> = serde_json::from_value(json!([
        {
            "subscriptionId": "PKG", "packageType": "Base", "isActive": true,
            "mdmTenants": [{
                "tenantId": "tnt1", "tenantPurpose": "Production", "reltioEnv": "prod",
                "deploymentCloud": "GCP", "packageId": "PKG", "contractId": "800A",
                "salesConfig": {"subscriptionName": "Enterprise", "startDate": "2024-01-01"}
            }]
        },
        {
            "subscriptionId": "SOLO", "packageType": "Add-on", "isActive": true,
            "mdmTenants": [{"tenantId": "tnt2", "tenantPurpose": "Sandbox", "packageId": "SOLO", "contractId": "800B"}]
        }
    ]))
    .unwrap();
    resolve_tenants(&packages, resolved)
}

#[test]
fn tenant_documents_switch_contract_node_on_package_type() {
    let store = builtin();
    let resolved = resolve(&snapshot());
    let tenants = tenants(&resolved);
    let assembler = Assembler::new(&store, CrmLinks::default());

    let documents = assembler.tenants(&tenants).unwrap();
    assert_eq!(documents.len(), 2);

    let base = &documents[0];
    assert_eq!(base["crosswalks"][0]["url"], "/tnt1");
    let attributes = &base["attributes"];
    assert_eq!(attributes["shortDescription"][0]["value"], "Production - Acme Corp");
    assert_eq!(attributes["TenantType"][0]["value"], "MDM");
    assert_eq!(attributes["Environment"][0]["value"], "prod");
    assert_eq!(attributes["Root_ID"][0]["value"], "PKG");
    assert!(attributes.get("AdditionalContract").is_none());
    let node = &attributes["BasePackageContract"][0];
    assert_eq!(node["refEntity"]["crosswalks"][1]["value"], "800A");
    assert_eq!(node["refRelation"]["crosswalks"][0]["value"], "800A_tnt1");
    assert_eq!(node["value"]["ContractName"][0]["value"], "Acme Renewal 2024");
    assert_eq!(
        attributes["EndUserCustomer"][0]["refRelation"]["crosswalks"][0]["value"],
        "001A_tnt1"
    );

    let additional = &documents[1]["attributes"];
    assert!(additional.get("BasePackageContract").is_none());
    assert!(additional.get("Environment").is_none());
    assert_eq!(
        additional["AdditionalContract"][0]["refRelation"]["crosswalks"][0]["value"],
        "800B_tnt2"
    );
}

#[test]
fn missing_template_fails_the_phase() {
    let store = StaticTemplateStore::empty();
    let resolved = resolve(&snapshot());
    let assembler = Assembler::new(&store, CrmLinks::default());

    assert_eq!(
        assembler.accounts(&resolved).unwrap_err(),
        AssemblyError::MissingTemplate(EntityKind::Account)
    );
    assert_eq!(
        assembler
            .assemble(EntityKind::PackageDetail, &resolved, &TenantSet::default())
            .unwrap_err(),
        AssemblyError::NotTopLevel(EntityKind::PackageDetail)
    );
}

#[test]
fn assembling_twice_leaves_templates_untouched() {
    let store = builtin();
    let resolved = resolve(&snapshot());
    let assembler = Assembler::new(&store, CrmLinks::default());

    let first = assembler.contracts(&resolved).unwrap();
    let second = assembler.contracts(&resolved).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        store.template(EntityKind::Contract),
        builtin().template(EntityKind::Contract)
    );
}

#[test]
fn package_shape_is_decided_per_contract() {
    let rows: Vec<SubscriptionRecord> = serde_json::from_value(json!([
        {"id": "PKG", "accountId": "001A", "contractId": "800A", "rootId": "PKG",
         "productName": "Enterprise Package", "quantity": 1,
         "usage": {"consolidatedProfiles": 5000000}},
        {"id": "ADD", "accountId": "001A", "contractId": "800C", "rootId": "PKG",
         "productName": "Extra Tenant", "quantity": 2}
    ]))
    .unwrap();
    let store = builtin();
    let resolved = resolve(&rows);
    let assembler = Assembler::new(&store, CrmLinks::default());

    let documents = assembler.contracts(&resolved).unwrap();

    let first = &contract(&documents, "800A")["attributes"];
    assert!(first.get("Base_Package_Details").is_none());
    let details = first["Contract_details"].as_array().unwrap();
    assert_eq!(details.len(), 1);
    assert_eq!(details[0]["value"]["Product_Name"][0]["value"], "Enterprise Package");

    let second = &contract(&documents, "800C")["attributes"];
    assert!(second.get("Contract_details").is_none());
    let rows = second["Base_Package_Details"][0]["value"]["Subscription_details"]
        .as_array()
        .unwrap();
    assert_eq!(rows.len(), 1 + 10);
    assert_eq!(rows[0]["value"]["Product_Name"][0]["value"], "Extra Tenant");
    // usage figures of a parent in another contract are not borrowed
    assert_eq!(rows[1]["value"]["Product_Quantity"][0]["value"], "0");
}
