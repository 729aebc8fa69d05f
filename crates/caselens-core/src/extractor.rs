//! Case field extraction and customer enrichment.
//!
//! [`CaseDataExtractor::extract`] scrapes the rendered case record. Each field
//! has an ordered list of strategies, most specific first; the first one that
//! yields a non-empty value wins. Values stay exactly as rendered so scrape
//! results remain debuggable. [`enrich`] then joins them with the customer
//! table; all normalization happens there.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use caselens_protocols::{Document, ExtractedCaseData, RawCaseFields};

use crate::customer::{CustomerTable, normalize_code};
use crate::freshness::{LAST_MODIFIED_SELECTORS, normalize_token};

/// A scraped case field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CaseField {
    CaseNumber,
    Subject,
    Status,
    Priority,
    AccountNumber,
    Environment,
    ProductName,
    LastModified,
}

impl CaseField {
    pub const ALL: [CaseField; 8] = [
        CaseField::CaseNumber,
        CaseField::Subject,
        CaseField::Status,
        CaseField::Priority,
        CaseField::AccountNumber,
        CaseField::Environment,
        CaseField::ProductName,
        CaseField::LastModified,
    ];

    /// Field label as shown in the record layout.
    pub fn label(&self) -> &'static str {
        match self {
            CaseField::CaseNumber => "Case Number",
            CaseField::Subject => "Subject",
            CaseField::Status => "Status",
            CaseField::Priority => "Priority",
            CaseField::AccountNumber => "Account Number",
            CaseField::Environment => "Environment",
            CaseField::ProductName => "Product",
            CaseField::LastModified => "Last Modified By",
        }
    }
}

/// Where a strategy reads its value from.
#[derive(Debug, Clone)]
pub enum Source {
    /// First element matching a selector; its text, or an attribute.
    Selector {
        selector: String,
        attribute: Option<String>,
    },
    /// The document title.
    Title,
}

/// One way of obtaining a field.
#[derive(Debug, Clone)]
pub struct FieldStrategy {
    pub source: Source,
    /// When set, the value is the first capture group (or whole match).
    pub pattern: Option<Regex>,
}

impl FieldStrategy {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            source: Source::Selector {
                selector: selector.into(),
                attribute: None,
            },
            pattern: None,
        }
    }

    pub fn attribute(selector: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self {
            source: Source::Selector {
                selector: selector.into(),
                attribute: Some(attribute.into()),
            },
            pattern: None,
        }
    }

    pub fn title() -> Self {
        Self {
            source: Source::Title,
            pattern: None,
        }
    }

    pub fn with_pattern(mut self, pattern: Regex) -> Self {
        self.pattern = Some(pattern);
        self
    }

    fn apply(&self, document: &dyn Document) -> Option<String> {
        let value = match &self.source {
            Source::Selector {
                selector,
                attribute,
            } => {
                let element = document.query(None, selector)?;
                match attribute {
                    Some(name) => element.attr(name)?.to_string(),
                    None => element.text,
                }
            }
            Source::Title => document.title(),
        };

        let value = match &self.pattern {
            Some(pattern) => {
                let caps = pattern.captures(&value)?;
                caps.get(1).or_else(|| caps.get(0))?.as_str().to_string()
            }
            None => value,
        };

        let value = value.trim();
        if value.is_empty() {
            None
        } else {
            Some(value.to_string())
        }
    }
}

static CASE_NUMBER_IN_TITLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(\d{8})\b").expect("static case number pattern"));

static TICKET_ID: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b[A-Z][A-Z0-9]+-\d+\b").expect("static ticket pattern"));

fn layout_item(label: &str) -> String {
    format!(
        "records-record-layout-item[field-label=\"{}\"] lightning-formatted-text",
        label
    )
}

fn highlights_item(label: &str) -> String {
    format!(
        "records-highlights-details-item[field-label=\"{}\"] lightning-formatted-text",
        label
    )
}

fn data_field(api_name: &str) -> String {
    format!("[data-field=\"{}\"]", api_name)
}

fn default_strategies(field: CaseField) -> Vec<FieldStrategy> {
    let label = field.label();
    match field {
        CaseField::CaseNumber => vec![
            FieldStrategy::selector(highlights_item(label)),
            FieldStrategy::selector(layout_item(label)),
            FieldStrategy::selector(data_field("CaseNumber")),
            FieldStrategy::title().with_pattern(CASE_NUMBER_IN_TITLE.clone()),
        ],
        CaseField::Subject => vec![
            FieldStrategy::selector(layout_item(label)),
            FieldStrategy::selector(data_field("Subject")),
            FieldStrategy::selector("h1 .slds-page-header__title"),
            FieldStrategy::attribute("lightning-formatted-text[slot=\"primaryField\"]", "title"),
        ],
        CaseField::Status => vec![
            FieldStrategy::selector(highlights_item(label)),
            FieldStrategy::selector(layout_item(label)),
            FieldStrategy::selector(data_field("Status")),
        ],
        CaseField::Priority => vec![
            FieldStrategy::selector(highlights_item(label)),
            FieldStrategy::selector(layout_item(label)),
            FieldStrategy::selector(data_field("Priority")),
        ],
        CaseField::AccountNumber => vec![
            FieldStrategy::selector(highlights_item(label)),
            FieldStrategy::selector(layout_item(label)),
            FieldStrategy::selector(data_field("AccountNumber")),
        ],
        CaseField::Environment => vec![
            FieldStrategy::selector(layout_item(label)),
            FieldStrategy::selector(data_field("Environment__c")),
        ],
        CaseField::ProductName => vec![
            FieldStrategy::selector(layout_item(label)),
            FieldStrategy::selector(layout_item("Product Name")),
            FieldStrategy::selector(data_field("ProductId")),
        ],
        CaseField::LastModified => LAST_MODIFIED_SELECTORS
            .iter()
            .map(|s| FieldStrategy::selector(*s))
            .collect(),
    }
}

/// Selectors whose matches may carry linked identifiers.
const LINKED_ID_SELECTORS: &[&str] = &[
    "records-record-layout-item[field-label*=\"Ticket\"] a",
    "records-record-layout-item[field-label*=\"Ticket\"] lightning-formatted-text",
    "records-record-layout-item[field-label=\"Parent Case\"] a",
    "[data-field=\"LinkedTickets\"]",
];

/// Scrapes [`RawCaseFields`] from a case page.
pub struct CaseDataExtractor {
    strategies: HashMap<CaseField, Vec<FieldStrategy>>,
    linked_selectors: Vec<String>,
}

impl Default for CaseDataExtractor {
    fn default() -> Self {
        Self::new()
    }
}

impl CaseDataExtractor {
    pub fn new() -> Self {
        Self {
            strategies: CaseField::ALL
                .iter()
                .map(|f| (*f, default_strategies(*f)))
                .collect(),
            linked_selectors: LINKED_ID_SELECTORS.iter().map(|s| s.to_string()).collect(),
        }
    }

    /// Replace the strategy chain for one field.
    pub fn with_strategies(mut self, field: CaseField, strategies: Vec<FieldStrategy>) -> Self {
        self.strategies.insert(field, strategies);
        self
    }

    /// First strategy result for `field`.
    pub fn extract_field(&self, document: &dyn Document, field: CaseField) -> Option<String> {
        let value = self
            .strategies
            .get(&field)
            .and_then(|chain| chain.iter().find_map(|s| s.apply(document)));
        if value.is_none() {
            warn!("Could not extract {:?} from page", field);
        }
        value
    }

    fn extract_linked_ids(&self, document: &dyn Document) -> Vec<String> {
        let mut ids: Vec<String> = Vec::new();
        for selector in &self.linked_selectors {
            for element in document.query_all(None, selector) {
                for m in TICKET_ID.find_iter(&element.text) {
                    if !ids.iter().any(|id| id == m.as_str()) {
                        ids.push(m.as_str().to_string());
                    }
                }
                if selector.contains("Parent Case") {
                    if let Some(text) = element.text_trimmed() {
                        if !ids.iter().any(|id| id == text) {
                            ids.push(text.to_string());
                        }
                    }
                }
            }
        }
        ids
    }

    /// Scrape every field. Missing fields are `None`; never fails.
    pub fn extract(&self, document: &dyn Document) -> RawCaseFields {
        let raw = RawCaseFields {
            case_number: self.extract_field(document, CaseField::CaseNumber),
            subject: self.extract_field(document, CaseField::Subject),
            status: self.extract_field(document, CaseField::Status),
            priority: self.extract_field(document, CaseField::Priority),
            account_number: self.extract_field(document, CaseField::AccountNumber),
            environment: self.extract_field(document, CaseField::Environment),
            product_name: self.extract_field(document, CaseField::ProductName),
            last_modified: self.extract_field(document, CaseField::LastModified),
            linked_ids: self.extract_linked_ids(document),
        };
        debug!("Extracted case fields: {:?}", raw);
        raw
    }
}

/// Join raw fields with the customer table. The account number carries the
/// institution code.
pub fn enrich(record_id: &str, raw: RawCaseFields, table: &CustomerTable) -> ExtractedCaseData {
    let institution_code = raw
        .account_number
        .as_deref()
        .map(normalize_code)
        .filter(|c| !c.is_empty());

    let customer = institution_code.as_deref().and_then(|c| table.find(c));
    if institution_code.is_some() && customer.is_none() {
        debug!("No customer record for {:?}", institution_code);
    }

    let non_empty = |s: &str| {
        let s = s.trim();
        if s.is_empty() { None } else { Some(s.to_string()) }
    };

    ExtractedCaseData {
        record_id: record_id.to_string(),
        institution_code,
        server: customer.and_then(|c| non_empty(&c.server)),
        region: customer.and_then(|c| non_empty(&c.region)),
        cust_id: customer.and_then(|c| c.cust_id),
        inst_id: customer.and_then(|c| c.inst_id),
        display_name: customer.and_then(|c| non_empty(&c.name)),
        last_modified: raw.last_modified.as_deref().and_then(normalize_token),
        raw,
    }
}

#[cfg(test)]
#[path = "extractor_tests.rs"]
mod tests;
