use std::collections::HashMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde_json::Value;

use crate::error::TemplateError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntityKind {
    Account,
    AccountContract,
    Contract,
    ContractDetail,
    PackageDetail,
    PackageGroup,
    Tenant,
}

impl EntityKind {
    pub const ALL: [EntityKind; 7] = [
        EntityKind::Account,
        EntityKind::AccountContract,
        EntityKind::Contract,
        EntityKind::ContractDetail,
        EntityKind::PackageDetail,
        EntityKind::PackageGroup,
        EntityKind::Tenant,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Account => "account",
            EntityKind::AccountContract => "account-contract",
            EntityKind::Contract => "contract",
            EntityKind::ContractDetail => "contract-detail",
            EntityKind::PackageDetail => "package-detail",
            EntityKind::PackageGroup => "package-group",
            EntityKind::Tenant => "tenant",
        }
    }

    fn builtin_source(&self) -> &'static str {
        match self {
            EntityKind::Account => include_str!("../templates/account.json"),
            EntityKind::AccountContract => include_str!("../templates/account-contract.json"),
            EntityKind::Contract => include_str!("../templates/contract.json"),
            EntityKind::ContractDetail => include_str!("../templates/contract-detail.json"),
            EntityKind::PackageDetail => include_str!("../templates/package-detail.json"),
            EntityKind::PackageGroup => include_str!("../templates/package-group.json"),
            EntityKind::Tenant => include_str!("../templates/tenant.json"),
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or(())
    }
}

/// Read-only lookup of overlay templates. Callers clone what they overlay.
pub trait TemplateStore: Send + Sync {
    fn template(&self, kind: EntityKind) -> Option<&Value>;
}

#[derive(Debug, Clone, Default)]
pub struct StaticTemplateStore {
    templates: HashMap<EntityKind, Value>,
}

impl StaticTemplateStore {
    pub fn empty() -> Self {
        Self::default()
    }

    /// The templates shipped with the crate.
    pub fn builtin() -> Result<Self, TemplateError> {
        let mut store = Self::empty();
        for kind in EntityKind::ALL {
            let value = parse_template(kind, kind.builtin_source())?;
            store.templates.insert(kind, value);
        }
        Ok(store)
    }

    /// Loads `<kind>.json` for every kind from `dir`. Kinds without a file
    /// keep the built-in template.
    pub fn from_dir(dir: impl AsRef<Path>) -> Result<Self, TemplateError> {
        let dir = dir.as_ref();
        let mut store = Self::builtin()?;
        for kind in EntityKind::ALL {
            let path = dir.join(format!("{}.json", kind.as_str()));
            if !path.exists() {
                continue;
            }
            let raw = std::fs::read_to_string(&path).map_err(|source| TemplateError::Io {
                path: path.display().to_string(),
                source,
            })?;
            store.templates.insert(kind, parse_template(kind, &raw)?);
            tracing::debug!(target: "templates", %kind, path = %path.display(), "loaded template override");
        }
        Ok(store)
    }

    pub fn with_template(mut self, kind: EntityKind, template: Value) -> Self {
        self.templates.insert(kind, template);
        self
    }
}

impl TemplateStore for StaticTemplateStore {
    fn template(&self, kind: EntityKind) -> Option<&Value> {
        self.templates.get(&kind)
    }
}

/// Accepts a bare object or a one-element array wrapping it.
fn parse_template(kind: EntityKind, raw: &str) -> Result<Value, TemplateError> {
    let value: Value =
        serde_json::from_str(raw).map_err(|source| TemplateError::Parse { kind, source })?;
    match value {
        Value::Object(_) => Ok(value),
        Value::Array(items) => match items.into_iter().next() {
            Some(first @ Value::Object(_)) => Ok(first),
            _ => Err(TemplateError::Shape(kind)),
        },
        _ => Err(TemplateError::Shape(kind)),
    }
}
