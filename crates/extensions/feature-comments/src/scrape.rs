//! Case comment scraping.

use tracing::debug;

use caselens_protocols::{CaseComment, Document, ElementSnapshot};

const ROW_SELECTOR: &str = "table tbody tr";

const AUTHOR_CELLS: &[&str] = &["Created By", "Author", "User"];
const PUBLIC_CELLS: &[&str] = &["Public", "Published"];
const DATE_CELLS: &[&str] = &["Created Date", "Date", "Created"];
const BODY_CELLS: &[&str] = &["Comment", "Comment Body", "Body"];

fn cell(document: &dyn Document, row: &ElementSnapshot, labels: &[&str]) -> Option<ElementSnapshot> {
    labels.iter().find_map(|label| {
        let selector = format!("td[data-label=\"{0}\"], th[data-label=\"{0}\"]", label);
        document.query(Some(row.node_id), &selector)
    })
}

fn cell_text(document: &dyn Document, row: &ElementSnapshot, labels: &[&str]) -> String {
    cell(document, row, labels)
        .and_then(|c| c.text_trimmed().map(str::to_string))
        .unwrap_or_default()
}

/// Checkbox cells render either text or a checked control.
fn is_checked(document: &dyn Document, cell: &ElementSnapshot) -> bool {
    if let Some(text) = cell.text_trimmed() {
        if matches!(
            text.to_ascii_lowercase().as_str(),
            "true" | "yes" | "checked" | "public"
        ) {
            return true;
        }
    }
    document
        .query(
            Some(cell.node_id),
            "[aria-checked=\"true\"], input[checked], img[alt=\"True\"], img[alt=\"Checked\"]",
        )
        .is_some()
}

/// Comments rendered in related-list tables, in page order. Rows without a
/// body are skipped.
pub fn scrape_comments(document: &dyn Document) -> Vec<CaseComment> {
    let mut comments = Vec::new();
    for row in document.query_all(None, ROW_SELECTOR) {
        let body = cell_text(document, &row, BODY_CELLS);
        if body.is_empty() {
            continue;
        }
        let is_public = cell(document, &row, PUBLIC_CELLS)
            .map(|c| is_checked(document, &c))
            .unwrap_or(false);
        comments.push(CaseComment {
            author: cell_text(document, &row, AUTHOR_CELLS),
            is_public,
            date: cell_text(document, &row, DATE_CELLS),
            body,
        });
    }
    debug!("Scraped {} case comments", comments.len());
    comments
}

#[cfg(test)]
mod tests {
    use super::*;
    use caselens_core::MemoryDocument;
    use caselens_protocols::NewElement;

    fn add_row(doc: &MemoryDocument, tbody: u64, cells: &[(&str, &str)]) -> u64 {
        let row = doc.append(tbody, NewElement::new("tr")).unwrap();
        for (label, value) in cells {
            doc.append(
                row,
                NewElement::new("td").with_attr("data-label", *label).with_text(*value),
            )
            .unwrap();
        }
        row
    }

    #[test]
    fn test_scrape_rows() {
        let doc = MemoryDocument::new("https://acme.lightning.force.com/");
        let table = doc.append(doc.body(), NewElement::new("table")).unwrap();
        let tbody = doc.append(table, NewElement::new("tbody")).unwrap();
        add_row(
            &doc,
            tbody,
            &[
                ("Created By", "Jane Doe"),
                ("Public", "true"),
                ("Created Date", "02/01/2024 09:00"),
                ("Comment", "Customer confirmed fix"),
            ],
        );
        let row = add_row(
            &doc,
            tbody,
            &[
                ("Author", "Sam Lee"),
                ("Created Date", "01/01/2024 10:00"),
                ("Comment Body", "Escalated to tier 2"),
            ],
        );
        let public = doc
            .append(row, NewElement::new("td").with_attr("data-label", "Public"))
            .unwrap();
        doc.append(public, NewElement::new("span").with_attr("aria-checked", "false"))
            .unwrap();
        add_row(&doc, tbody, &[("Created By", "Nobody"), ("Comment", "  ")]);

        let comments = scrape_comments(&doc);
        assert_eq!(comments.len(), 2);
        assert_eq!(comments[0].author, "Jane Doe");
        assert!(comments[0].is_public);
        assert_eq!(comments[1].author, "Sam Lee");
        assert!(!comments[1].is_public);
        assert_eq!(comments[1].body, "Escalated to tier 2");
    }

    #[test]
    fn test_no_table() {
        let doc = MemoryDocument::new("https://acme.lightning.force.com/");
        assert!(scrape_comments(&doc).is_empty());
    }
}
