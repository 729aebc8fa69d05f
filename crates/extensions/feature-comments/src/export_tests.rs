use super::*;

fn comment(author: &str, public: bool, date: &str, body: &str) -> CaseComment {
    CaseComment {
        author: author.to_string(),
        is_public: public,
        date: date.to_string(),
        body: body.to_string(),
    }
}

fn metadata() -> ExportMetadata {
    ExportMetadata {
        case_number: Some("00012345".to_string()),
        subject: Some("Login <failure> & timeouts".to_string()),
        ..Default::default()
    }
}

#[test]
fn test_xml_orders_comments_by_date() {
    let comments = vec![
        comment("Jane Doe", true, "02/01/2024 09:00", "Second"),
        comment("Sam Lee", false, "01/01/2024 10:00", "First"),
    ];
    let xml = to_xml(&metadata(), &comments).unwrap();

    let first = xml.find("First").unwrap();
    let second = xml.find("Second").unwrap();
    assert!(first < second);
    assert!(xml.contains("<comment public=\"false\">"));
    assert!(xml.contains("<caseNumber>00012345</caseNumber>"));
    assert!(xml.starts_with("<?xml"));
    assert!(xml.trim_end().ends_with("</case>"));
}

#[test]
fn test_xml_escapes_text() {
    let comments = vec![comment("A&B", true, "01/01/2024 10:00", "x < y")];
    let xml = to_xml(&metadata(), &comments).unwrap();
    assert!(xml.contains("<subject>Login &lt;failure&gt; &amp; timeouts</subject>"));
    assert!(xml.contains("<author>A&amp;B</author>"));
    assert!(xml.contains("<body>x &lt; y</body>"));
}

#[test]
fn test_tsv_layout() {
    let comments = vec![
        comment("Jane Doe", true, "02/01/2024 09:00", "Line one\nline\ttwo"),
        comment("Sam Lee", false, "01/01/2024 10:00", "First"),
    ];
    let tsv = to_tsv(&metadata(), &comments).unwrap();
    let lines: Vec<&str> = tsv.lines().collect();

    assert_eq!(lines[0], "Case Number\t00012345");
    let header = lines
        .iter()
        .position(|l| *l == "Author\tPublic\tDate\tComment")
        .unwrap();
    assert_eq!(lines[header - 1], "");
    assert_eq!(lines[header + 1], "Sam Lee\tNo\t01/01/2024 10:00\tFirst");
    assert_eq!(lines[header + 2], "Jane Doe\tYes\t02/01/2024 09:00\tLine one line two");
}

#[test]
fn test_empty_comments_rejected() {
    assert!(matches!(to_xml(&metadata(), &[]), Err(ExportError::NoComments)));
    assert!(matches!(ExportFormat::Tsv.render(&metadata(), &[]), Err(ExportError::NoComments)));
}

#[test]
fn test_mixed_date_formats_and_undated() {
    let comments = vec![
        comment("C", true, "unknown", "undated"),
        comment("B", true, "Jane Doe, 3/1/2024, 10:05 AM", "march"),
        comment("A", true, "2024-02-15T08:00", "february"),
    ];
    let sorted: Vec<_> = sort_by_date(&comments)
        .into_iter()
        .map(|c| c.body)
        .collect();
    assert_eq!(sorted, vec!["february", "march", "undated"]);
}

#[test]
fn test_metadata_from_case() {
    let mut case = ExtractedCaseData {
        record_id: "500Ak00000AbCdEIAV".to_string(),
        display_name: Some("First National".to_string()),
        ..Default::default()
    };
    case.raw.case_number = Some("00012345".to_string());
    let metadata = ExportMetadata::from_case(&case);
    assert_eq!(metadata.customer.as_deref(), Some("First National"));
    assert_eq!(metadata.case_number.as_deref(), Some("00012345"));
}
