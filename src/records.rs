//! Subscription rows as they arrive from the CRM snapshot.
//!
//! Every field is read leniently: nulls and empty strings become `None`,
//! unparsable numbers become zero and unparsable dates are dropped. Each
//! coercion is logged as a [`DataCoercionError`] and never aborts the load.

use serde::{Deserialize, Serialize};

use crate::error::DataCoercionError;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionRecord {
    #[serde(default, deserialize_with = "coerce::text")]
    pub id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub account_id: String,
    #[serde(default, deserialize_with = "coerce::text")]
    pub contract_id: String,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub root_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub fallback_root_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub revised_subscription_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::text")]
    pub product_name: String,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub product_code: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub domain_name: Option<String>,
    #[serde(default, deserialize_with = "coerce::number")]
    pub quantity: f64,
    #[serde(default, deserialize_with = "coerce::optional_date")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_date")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub package_mapping: Option<String>,
    #[serde(default)]
    pub usage: UsageMetrics,
    #[serde(default)]
    pub account: AccountInfo,
    #[serde(default)]
    pub contract: ContractInfo,
}

/// Entitlement figures carried by package parent rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetrics {
    #[serde(default, deserialize_with = "coerce::number")]
    pub consolidated_profiles: f64,
    #[serde(default, deserialize_with = "coerce::number")]
    pub storage_units: f64,
    #[serde(default, deserialize_with = "coerce::number")]
    pub storage_unit_quantity: f64,
    #[serde(default, deserialize_with = "coerce::number")]
    pub total_storage_units: f64,
    #[serde(default, deserialize_with = "coerce::number")]
    pub credits: f64,
    #[serde(default, deserialize_with = "coerce::number")]
    pub managed_credits: f64,
    #[serde(default, deserialize_with = "coerce::number")]
    pub api_calls: f64,
    #[serde(default, deserialize_with = "coerce::number")]
    pub tasks: f64,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub data_domain: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub other_data_domain: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub account_type: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub region: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub territory: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub website: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub original_contract_date: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub industry: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub sub_industry: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub site: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub market_segmentation: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub target_account: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub po_required: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub renewal_pricing_method: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub renewal_model: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub support_level: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_number")]
    pub intent_score: Option<f64>,
    #[serde(default, deserialize_with = "coerce::optional_flag")]
    pub engaged: Option<bool>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub buying_stage_signal: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_number")]
    pub profile_score: Option<f64>,
    #[serde(default, deserialize_with = "coerce::optional_number")]
    pub engaged_contact_count: Option<f64>,
    #[serde(default, deserialize_with = "coerce::optional_flag")]
    pub is_deleted: Option<bool>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub profile_fit: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub tenant_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_flag")]
    pub strategic_target: Option<bool>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub partner_type: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub partner_tier_level: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub partner_sub_type: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_flag")]
    pub partner_intel: Option<bool>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub parent_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub owner_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub created_date: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub buying_stage: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub allbound_id: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub currency_iso_code: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_number")]
    pub total_subscription_acv: Option<f64>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub phone: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_number")]
    pub number_of_employees: Option<f64>,
    #[serde(default, deserialize_with = "coerce::optional_number")]
    pub annual_revenue: Option<f64>,
    #[serde(default)]
    pub billing_address: BillingAddress,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BillingAddress {
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub street: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub city: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub state: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub country: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub country_code: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub postal_code: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractInfo {
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub contract_number: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub opportunity_name: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub record_type: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub status: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_number")]
    pub renewal_acv: Option<f64>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub procurement_channel: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub activated_date: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub start_date: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub end_date: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub hipaa_finance: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub international_business: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub industry: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub market_segment: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub cloud_provider: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub deployment_region: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub product_family: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub pooled_apis: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub pooled_profiles: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub pooled_rih: Option<String>,
    #[serde(default, deserialize_with = "coerce::optional_text")]
    pub pooled_rsus: Option<String>,
}

pub(crate) mod coerce {
    use chrono::{DateTime, NaiveDate};
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    use super::DataCoercionError;

    fn report(err: DataCoercionError) {
        tracing::warn!(target: "records", error = %err, "coerced malformed field");
    }

    pub fn optional_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            Some(Value::String(raw)) => {
                let trimmed = raw.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        })
    }

    pub fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(optional_text(deserializer)?.unwrap_or_default())
    }

    pub fn parse_number(value: &Value) -> Result<Option<f64>, DataCoercionError> {
        match value {
            Value::Null => Ok(None),
            Value::Number(n) => Ok(n.as_f64()),
            Value::String(raw) if raw.trim().is_empty() => Ok(None),
            Value::String(raw) => raw
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(Some)
                .ok_or_else(|| DataCoercionError::Number { raw: raw.clone() }),
            other => Err(DataCoercionError::Number {
                raw: other.to_string(),
            }),
        }
    }

    pub fn optional_number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
        Ok(parse_number(&value).unwrap_or_else(|err| {
            report(err);
            None
        }))
    }

    pub fn number<'de, D>(deserializer: D) -> Result<f64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?.unwrap_or(Value::Null);
        Ok(parse_number(&value)
            .unwrap_or_else(|err| {
                report(err);
                None
            })
            .unwrap_or(0.0))
    }

    pub fn optional_flag<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Option::<Value>::deserialize(deserializer)?;
        Ok(match value {
            None | Some(Value::Null) => None,
            Some(Value::Bool(b)) => Some(b),
            Some(Value::Number(n)) => n.as_f64().map(|n| n != 0.0),
            Some(Value::String(raw)) => match raw.trim().to_ascii_lowercase().as_str() {
                "" => None,
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => {
                    report(DataCoercionError::Flag { raw });
                    None
                }
            },
            Some(other) => {
                report(DataCoercionError::Flag {
                    raw: other.to_string(),
                });
                None
            }
        })
    }

    pub fn is_date(raw: &str) -> bool {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d").is_ok() || DateTime::parse_from_rfc3339(raw).is_ok()
    }

    pub fn optional_date<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = optional_text(deserializer)?;
        Ok(value.and_then(|raw| {
            if is_date(&raw) {
                Some(raw)
            } else {
                report(DataCoercionError::Date { raw });
                None
            }
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn malformed_numbers_coerce_to_zero() {
        let record: SubscriptionRecord = serde_json::from_value(json!({
            "id": "a1",
            "accountId": "acc",
            "contractId": "c1",
            "quantity": "twelve",
            "usage": {"storageUnits": "4.5", "apiCalls": null}
        }))
        .expect("record parses");

        assert_eq!(record.quantity, 0.0);
        assert_eq!(record.usage.storage_units, 4.5);
        assert_eq!(record.usage.api_calls, 0.0);
    }

    #[test]
    fn empty_strings_are_absent() {
        let record: SubscriptionRecord = serde_json::from_value(json!({
            "id": "a1",
            "rootId": "  ",
            "packageMapping": "",
            "account": {"name": "", "engaged": "true"}
        }))
        .expect("record parses");

        assert_eq!(record.root_id, None);
        assert_eq!(record.package_mapping, None);
        assert_eq!(record.account.name, None);
        assert_eq!(record.account.engaged, Some(true));
    }

    #[test]
    fn malformed_dates_are_dropped() {
        let record: SubscriptionRecord = serde_json::from_value(json!({
            "id": "a1",
            "startDate": "2024-02-01",
            "endDate": "next year"
        }))
        .expect("record parses");

        assert_eq!(record.start_date.as_deref(), Some("2024-02-01"));
        assert_eq!(record.end_date, None);
    }

    #[test]
    fn numeric_identifiers_become_text() {
        let record: SubscriptionRecord =
            serde_json::from_value(json!({"id": 42, "quantity": 3})).expect("record parses");
        assert_eq!(record.id, "42");
        assert_eq!(record.quantity, 3.0);
    }
}
