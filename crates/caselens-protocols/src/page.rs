//! Page classification types.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Kind of CRM page currently displayed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PageType {
    CasePage,
    CaseCommentsPage,
    CaseListPage,
    ReportHome,
    ReportPage,
    SearchPage,
    Unknown,
}

impl PageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PageType::CasePage => "case",
            PageType::CaseCommentsPage => "case-comments",
            PageType::CaseListPage => "case-list",
            PageType::ReportHome => "report-home",
            PageType::ReportPage => "report",
            PageType::SearchPage => "search",
            PageType::Unknown => "unknown",
        }
    }
}

impl fmt::Display for PageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the tab is showing. Two values are the same page iff all fields match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageInfo {
    pub page_type: PageType,
    pub record_id: Option<String>,
    pub report_id: Option<String>,
}

impl PageInfo {
    pub fn unknown() -> Self {
        Self {
            page_type: PageType::Unknown,
            record_id: None,
            report_id: None,
        }
    }

    pub fn record(page_type: PageType, record_id: impl Into<String>) -> Self {
        Self {
            page_type,
            record_id: Some(record_id.into()),
            report_id: None,
        }
    }

    pub fn report(report_id: impl Into<String>) -> Self {
        Self {
            page_type: PageType::ReportPage,
            record_id: None,
            report_id: Some(report_id.into()),
        }
    }

    pub fn of_type(page_type: PageType) -> Self {
        Self {
            page_type,
            record_id: None,
            report_id: None,
        }
    }
}

impl fmt::Display for PageInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.page_type)?;
        if let Some(id) = &self.record_id {
            write!(f, " record={}", id)?;
        }
        if let Some(id) = &self.report_id {
            write!(f, " report={}", id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_info_equality() {
        let a = PageInfo::record(PageType::CasePage, "5005g00000AbCdE");
        let b = PageInfo::record(PageType::CasePage, "5005g00000AbCdE");
        let c = PageInfo::record(PageType::CaseCommentsPage, "5005g00000AbCdE");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_page_info_display() {
        let info = PageInfo::record(PageType::CasePage, "500ABC");
        assert_eq!(info.to_string(), "case record=500ABC");
        assert_eq!(PageInfo::unknown().to_string(), "unknown");
    }
}
