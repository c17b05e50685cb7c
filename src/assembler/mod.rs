//! Entity payload assembly: resolved rows in, store-ready documents out.
//!
//! Every document starts as a clone of its template and is filled through
//! [`DocumentBuilder`]; nothing here performs I/O or mutates a stored template.

mod account;
mod contract;
pub mod document;
mod tenant;

use serde_json::Value;

use crate::config;
use crate::error::AssemblyError;
use crate::resolver::ResolvedSet;
use crate::templates::{EntityKind, TemplateStore};
use crate::tenants::TenantSet;

pub use account::split_postal_code;
pub use contract::{package_rows, PackageRow, SyntheticRow, PACKAGE_LINK_PRODUCT};
pub use document::DocumentBuilder;

pub type EntityDocument = Value;

/// Deep links back into the CRM.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrmLinks {
    base: String,
}

impl CrmLinks {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn contract(&self, contract_id: &str) -> String {
        format!("{}/Contract/{contract_id}/view", self.base)
    }

    pub fn subscription(&self, subscription_id: &str) -> String {
        format!("{}/SBQQ__Subscription__c/{subscription_id}/view", self.base)
    }
}

impl Default for CrmLinks {
    fn default() -> Self {
        Self::new(config::CRM_LINK_BASE.as_str())
    }
}

pub struct Assembler<'a> {
    templates: &'a dyn TemplateStore,
    links: CrmLinks,
}

impl<'a> Assembler<'a> {
    pub fn new(templates: &'a dyn TemplateStore, links: CrmLinks) -> Self {
        Self { templates, links }
    }

    /// Top-level documents of one kind: accounts, contracts or tenants.
    pub fn assemble(
        &self,
        kind: EntityKind,
        resolved: &ResolvedSet,
        tenants: &TenantSet,
    ) -> Result<Vec<EntityDocument>, AssemblyError> {
        let documents = match kind {
            EntityKind::Account => self.accounts(resolved)?,
            EntityKind::Contract => self.contracts(resolved)?,
            EntityKind::Tenant => self.tenants(tenants)?,
            other => return Err(AssemblyError::NotTopLevel(other)),
        };
        tracing::info!(target: "assembler", %kind, documents = documents.len(), "assembled documents");
        Ok(documents)
    }

    fn template(&self, kind: EntityKind) -> Result<&'a Value, AssemblyError> {
        self.templates
            .template(kind)
            .ok_or(AssemblyError::MissingTemplate(kind))
    }
}

/// Groups items by key, keeping first-seen order of keys and items.
pub(crate) fn group_by<'r, T>(
    items: impl IntoIterator<Item = &'r T>,
    key: impl Fn(&'r T) -> &'r str,
) -> Vec<(&'r str, Vec<&'r T>)>
where
    T: 'r,
{
    let mut groups: Vec<(&'r str, Vec<&'r T>)> = Vec::new();
    for item in items {
        let k = key(item);
        match groups.iter_mut().find(|(existing, _)| *existing == k) {
            Some((_, members)) => members.push(item),
            None => groups.push((k, vec![item])),
        }
    }
    groups
}
