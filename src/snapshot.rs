use std::path::Path;

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;

use crate::records::SubscriptionRecord;
use crate::tenants::UsagePackage;

/// Reads a JSON array snapshot from disk.
pub async fn load<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("failed to read snapshot {}", path.display()))?;
    let rows: Vec<T> = serde_json::from_str(&raw)
        .with_context(|| format!("snapshot {} is not a JSON array of records", path.display()))?;
    tracing::info!(target: "snapshot", path = %path.display(), rows = rows.len(), "loaded snapshot");
    Ok(rows)
}

pub async fn load_subscriptions(path: &Path) -> Result<Vec<SubscriptionRecord>> {
    load(path).await
}

pub async fn load_packages(path: &Path) -> Result<Vec<UsagePackage>> {
    load(path).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn subscriptions_load_from_a_json_array() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"id": "s1", "accountId": "a1", "contractId": "c1", "quantity": "2"}}]"#).unwrap();

        let rows = load_subscriptions(file.path()).await.expect("snapshot loads");
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].quantity, 2.0);
    }

    #[tokio::test]
    async fn non_array_snapshots_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"packages": []}}"#).unwrap();

        let err = load_packages(file.path()).await.unwrap_err();
        assert!(err.to_string().contains("is not a JSON array"));
    }
}
