//! Highlight classification.

use chrono::{DateTime, NaiveDateTime};

use caselens_core::Settings;
use caselens_core::freshness::parse_token;

/// Why a row or field is highlighted. Variants are listed in precedence order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightKind {
    Priority,
    Status,
    Aging,
}

impl HighlightKind {
    /// Attribute value written to highlighted nodes.
    pub fn as_str(&self) -> &'static str {
        match self {
            HighlightKind::Priority => "priority",
            HighlightKind::Status => "status",
            HighlightKind::Aging => "aging",
        }
    }
}

/// Matching rules derived from [`Settings`].
#[derive(Debug, Clone)]
pub struct HighlightRules {
    statuses: Vec<String>,
    priorities: Vec<String>,
    aging_days: u32,
}

impl HighlightRules {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            statuses: settings.highlight_statuses.clone(),
            priorities: settings.highlight_priorities.clone(),
            aging_days: settings.aging_days,
        }
    }

    pub fn is_highlighted_status(&self, status: &str) -> bool {
        let status = status.trim();
        self.statuses.iter().any(|s| s.eq_ignore_ascii_case(status))
    }

    pub fn is_highlighted_priority(&self, priority: &str) -> bool {
        let priority = priority.trim();
        self.priorities.iter().any(|p| p.eq_ignore_ascii_case(priority))
    }

    /// Whether `last_modified` lies more than `aging_days` before `now_ms`.
    /// Unparseable dates never age, and an `aging_days` of 0 disables aging.
    pub fn is_aging(&self, last_modified: &str, now_ms: i64) -> bool {
        if self.aging_days == 0 {
            return false;
        }
        let Some(modified) = parse_token(last_modified) else {
            return false;
        };
        let Some(now) = DateTime::from_timestamp_millis(now_ms).map(|t| t.naive_utc()) else {
            return false;
        };
        age_in_days(modified, now) > i64::from(self.aging_days)
    }

    /// Highest-precedence reason to highlight a case list row.
    pub fn classify(
        &self,
        status: Option<&str>,
        priority: Option<&str>,
        last_modified: Option<&str>,
        now_ms: i64,
    ) -> Option<HighlightKind> {
        if priority.is_some_and(|p| self.is_highlighted_priority(p)) {
            return Some(HighlightKind::Priority);
        }
        if status.is_some_and(|s| self.is_highlighted_status(s)) {
            return Some(HighlightKind::Status);
        }
        if last_modified.is_some_and(|m| self.is_aging(m, now_ms)) {
            return Some(HighlightKind::Aging);
        }
        None
    }
}

fn age_in_days(modified: NaiveDateTime, now: NaiveDateTime) -> i64 {
    (now - modified).num_days()
}
