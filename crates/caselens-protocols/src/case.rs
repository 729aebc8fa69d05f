//! Case record types shared between extraction, caching and feature modules.

use serde::{Deserialize, Serialize};

/// Field values scraped from a case page, exactly as rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawCaseFields {
    pub case_number: Option<String>,
    pub subject: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub account_number: Option<String>,
    pub environment: Option<String>,
    pub product_name: Option<String>,
    /// Rendered "Last Modified" value, used as the freshness token.
    pub last_modified: Option<String>,
    /// Linked identifiers (engineering tickets, parent cases).
    #[serde(default)]
    pub linked_ids: Vec<String>,
}

/// One row of the customer lookup table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerRecord {
    pub institution_code: String,
    #[serde(default)]
    pub server: String,
    #[serde(default)]
    pub region: String,
    #[serde(rename = "custID", default)]
    pub cust_id: Option<u64>,
    #[serde(rename = "instID", default)]
    pub inst_id: Option<u64>,
    #[serde(default)]
    pub name: String,
}

/// Raw fields joined with the customer lookup table. This combined value is
/// what the cache stores.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedCaseData {
    pub record_id: String,
    pub raw: RawCaseFields,
    pub institution_code: Option<String>,
    pub server: Option<String>,
    pub region: Option<String>,
    pub cust_id: Option<u64>,
    pub inst_id: Option<u64>,
    pub display_name: Option<String>,
    /// Date-time portion of the rendered "Last Modified" text.
    #[serde(default)]
    pub last_modified: Option<String>,
}

impl ExtractedCaseData {
    /// Whether the lookup join found a customer.
    pub fn is_enriched(&self) -> bool {
        self.display_name.is_some()
    }
}

/// A case comment / case update row.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseComment {
    pub author: String,
    pub is_public: bool,
    /// Date as rendered on the page.
    pub date: String,
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_customer_record_deserialization() {
        let json = r#"{"institutionCode":"FNB_TX","server":"prod-04","region":"US",
            "custID":1201,"instID":88,"name":"First National"}"#;
        let record: CustomerRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.institution_code, "FNB_TX");
        assert_eq!(record.cust_id, Some(1201));
        assert_eq!(record.inst_id, Some(88));
    }

    #[test]
    fn test_customer_record_optional_fields() {
        let record: CustomerRecord =
            serde_json::from_str(r#"{"institutionCode":"ABC"}"#).unwrap();
        assert!(record.cust_id.is_none());
        assert!(record.server.is_empty());
    }

    #[test]
    fn test_is_enriched() {
        let mut data = ExtractedCaseData::default();
        assert!(!data.is_enriched());
        data.display_name = Some("First National".to_string());
        assert!(data.is_enriched());
    }
}
