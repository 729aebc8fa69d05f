//! XML and TSV renderings of case comments.

use std::cmp::Ordering;

use chrono::NaiveDateTime;

use caselens_core::freshness::{normalize_token, parse_token};
use caselens_protocols::{CaseComment, ExportError, ExtractedCaseData};

#[cfg(test)]
#[path = "export_tests.rs"]
mod tests;

/// Clipboard export format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Xml,
    Tsv,
}

impl ExportFormat {
    pub fn label(&self) -> &'static str {
        match self {
            ExportFormat::Xml => "XML",
            ExportFormat::Tsv => "TSV",
        }
    }

    pub fn render(
        &self,
        metadata: &ExportMetadata,
        comments: &[CaseComment],
    ) -> Result<String, ExportError> {
        match self {
            ExportFormat::Xml => to_xml(metadata, comments),
            ExportFormat::Tsv => to_tsv(metadata, comments),
        }
    }
}

/// Case details written ahead of the comments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExportMetadata {
    pub record_id: Option<String>,
    pub case_number: Option<String>,
    pub subject: Option<String>,
    pub status: Option<String>,
    pub priority: Option<String>,
    pub account_number: Option<String>,
    pub customer: Option<String>,
}

impl ExportMetadata {
    pub fn from_case(case: &ExtractedCaseData) -> Self {
        Self {
            record_id: Some(case.record_id.clone()),
            case_number: case.raw.case_number.clone(),
            subject: case.raw.subject.clone(),
            status: case.raw.status.clone(),
            priority: case.raw.priority.clone(),
            account_number: case.raw.account_number.clone(),
            customer: case.display_name.clone(),
        }
    }

    fn fields(&self) -> [(&'static str, &'static str, Option<&str>); 7] {
        [
            ("recordId", "Record Id", self.record_id.as_deref()),
            ("caseNumber", "Case Number", self.case_number.as_deref()),
            ("subject", "Subject", self.subject.as_deref()),
            ("status", "Status", self.status.as_deref()),
            ("priority", "Priority", self.priority.as_deref()),
            ("accountNumber", "Account Number", self.account_number.as_deref()),
            ("customer", "Customer", self.customer.as_deref()),
        ]
    }
}

fn comment_time(comment: &CaseComment) -> Option<NaiveDateTime> {
    parse_token(&comment.date)
        .or_else(|| normalize_token(&comment.date).and_then(|t| parse_token(&t)))
}

/// Ascending by parsed date. Undated comments keep their relative order after
/// the dated ones.
pub fn sort_by_date(comments: &[CaseComment]) -> Vec<CaseComment> {
    let mut keyed: Vec<_> = comments.iter().map(|c| (comment_time(c), c)).collect();
    keyed.sort_by(|(a, _), (b, _)| match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    });
    keyed.into_iter().map(|(_, c)| c.clone()).collect()
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Tabs and line breaks would break the row structure.
fn escape_tsv(text: &str) -> String {
    text.split(['\t', '\n', '\r'])
        .filter(|part| !part.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn to_xml(metadata: &ExportMetadata, comments: &[CaseComment]) -> Result<String, ExportError> {
    if comments.is_empty() {
        return Err(ExportError::NoComments);
    }

    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<case>\n  <metadata>\n");
    for (tag, _, value) in metadata.fields() {
        if let Some(value) = value {
            xml.push_str(&format!("    <{0}>{1}</{0}>\n", tag, escape_xml(value)));
        }
    }
    xml.push_str("  </metadata>\n  <updates>\n");
    for comment in sort_by_date(comments) {
        xml.push_str(&format!("    <comment public=\"{}\">\n", comment.is_public));
        xml.push_str(&format!("      <author>{}</author>\n", escape_xml(&comment.author)));
        xml.push_str(&format!("      <date>{}</date>\n", escape_xml(&comment.date)));
        xml.push_str(&format!("      <body>{}</body>\n", escape_xml(&comment.body)));
        xml.push_str("    </comment>\n");
    }
    xml.push_str("  </updates>\n</case>\n");
    Ok(xml)
}

pub fn to_tsv(metadata: &ExportMetadata, comments: &[CaseComment]) -> Result<String, ExportError> {
    if comments.is_empty() {
        return Err(ExportError::NoComments);
    }

    let mut tsv = String::new();
    for (_, label, value) in metadata.fields() {
        if let Some(value) = value {
            tsv.push_str(&format!("{}\t{}\n", label, escape_tsv(value)));
        }
    }
    tsv.push('\n');
    tsv.push_str("Author\tPublic\tDate\tComment\n");
    for comment in sort_by_date(comments) {
        tsv.push_str(&format!(
            "{}\t{}\t{}\t{}\n",
            escape_tsv(&comment.author),
            if comment.is_public { "Yes" } else { "No" },
            escape_tsv(&comment.date),
            escape_tsv(&comment.body),
        ));
    }
    Ok(tsv)
}
