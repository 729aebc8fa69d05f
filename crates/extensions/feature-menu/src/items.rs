//! Values shown in the quick-info menu.

use caselens_protocols::ExtractedCaseData;

/// One copyable row of the menu.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuItem {
    pub key: &'static str,
    pub label: &'static str,
    pub value: String,
}

impl MenuItem {
    fn new(key: &'static str, label: &'static str, value: Option<String>) -> Option<Self> {
        let value = value?;
        if value.trim().is_empty() {
            return None;
        }
        Some(Self { key, label, value })
    }
}

/// Rows for `case`, skipping values that are unknown.
pub fn menu_items(case: &ExtractedCaseData) -> Vec<MenuItem> {
    let linked = if case.raw.linked_ids.is_empty() {
        None
    } else {
        Some(case.raw.linked_ids.join(", "))
    };

    [
        MenuItem::new("caseNumber", "Case Number", case.raw.case_number.clone()),
        MenuItem::new("customer", "Customer", case.display_name.clone()),
        MenuItem::new("institutionCode", "Institution Code", case.institution_code.clone()),
        MenuItem::new("server", "Server", case.server.clone()),
        MenuItem::new("region", "Region", case.region.clone()),
        MenuItem::new("custId", "Cust ID", case.cust_id.map(|id| id.to_string())),
        MenuItem::new("instId", "Inst ID", case.inst_id.map(|id| id.to_string())),
        MenuItem::new("environment", "Environment", case.raw.environment.clone()),
        MenuItem::new("product", "Product", case.raw.product_name.clone()),
        MenuItem::new("linked", "Linked", linked),
    ]
    .into_iter()
    .flatten()
    .collect()
}

/// One-line summary used by "Copy summary".
pub fn summary(case: &ExtractedCaseData) -> String {
    let mut parts = Vec::new();
    if let Some(number) = &case.raw.case_number {
        parts.push(format!("Case {}", number));
    }
    if let Some(subject) = &case.raw.subject {
        parts.push(subject.clone());
    }
    match (&case.display_name, &case.institution_code) {
        (Some(name), Some(code)) => parts.push(format!("{} ({})", name, code)),
        (None, Some(code)) => parts.push(code.clone()),
        _ => {}
    }
    if let (Some(server), Some(region)) = (&case.server, &case.region) {
        parts.push(format!("{} / {}", server, region));
    }
    if parts.is_empty() {
        case.record_id.clone()
    } else {
        parts.join(" | ")
    }
}
