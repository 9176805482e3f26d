// Tests for link graph and social metadata functionality

use siteaudit_core::links::build_link_report;
use siteaudit_scanner::result::{PageExtract, PageOutcome};

fn rendered(url: &str, links: &[&str]) -> PageExtract {
    let mut page = PageExtract::new(url.to_string());
    page.outbound_links = links.iter().map(|s| s.to_string()).collect();
    page
}

#[test]
fn test_inbound_counts_collapse_duplicates_and_ignore_outside_links() {
    let sitemap: Vec<String> = ["https://a.test/p1", "https://a.test/p2", "https://a.test/p3"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    let outcomes = vec![
        PageOutcome::Rendered(rendered(
            "https://a.test/p1",
            &["https://a.test/p2", "https://a.test/p2", "https://a.test/p4"],
        )),
        PageOutcome::Rendered(rendered("https://a.test/p2", &[])),
        PageOutcome::Rendered(rendered("https://a.test/p3", &[])),
    ];

    let report = build_link_report("sitemap.xml", &sitemap, &outcomes);

    assert_eq!(report.total_pages, 3);
    let p2 = report.pages.iter().find(|p| p.url == "https://a.test/p2").unwrap();
    assert_eq!(p2.inbound_count, 1);
    assert_eq!(p2.inbound_from, vec!["https://a.test/p1"]);
    assert!(report.pages.iter().all(|p| p.url != "https://a.test/p4"));
    assert_eq!(
        report.pages_with_no_inbound,
        vec!["https://a.test/p1", "https://a.test/p3"]
    );
}

#[test]
fn test_x_card_flags() {
    let sitemap = vec!["https://a.test/bare".to_string(), "https://a.test/og".to_string()];
    let bare = rendered("https://a.test/bare", &[]);
    let mut og = rendered("https://a.test/og", &[]);
    og.og.title = Some("Rooms".to_string());

    let report = build_link_report(
        "sitemap.xml",
        &sitemap,
        &[PageOutcome::Rendered(bare), PageOutcome::Rendered(og)],
    );

    assert!(!report.pages[0].has_x_card);
    assert!(report.pages[1].has_x_card);
    assert_eq!(report.pages_missing_x_card, vec!["https://a.test/bare"]);
}

#[test]
fn test_failed_and_asset_pages() {
    let sitemap = vec![
        "https://a.test/".to_string(),
        "https://a.test/down".to_string(),
        "https://a.test/hero.jpg".to_string(),
    ];
    let outcomes = vec![
        PageOutcome::Rendered(rendered("https://a.test/", &["https://a.test/down"])),
        PageOutcome::with_error("https://a.test/down".to_string(), "timeout".to_string(), 3),
        PageOutcome::skipped_asset("https://a.test/hero.jpg".to_string()),
    ];

    let report = build_link_report("sitemap.xml", &sitemap, &outcomes);

    assert_eq!(report.total_pages, 2);
    let down = &report.pages[1];
    assert_eq!(down.error.as_deref(), Some("timeout"));
    assert_eq!(down.inbound_count, 1);
    assert_eq!(report.pages_missing_x_card, vec!["https://a.test/"]);
}

#[test]
fn test_link_report_json_keys() {
    let report = build_link_report("sitemap.xml", &["https://a.test/".to_string()], &[]);
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["totalPages"], 1);
    assert_eq!(json["pages"][0]["inboundCount"], 0);
    assert_eq!(json["pages"][0]["hasXCard"], false);
    assert!(json["pages"][0]["inboundFrom"].is_array());
    assert!(json["pagesWithNoInbound"].is_array());
    assert!(json["pagesMissingXCard"].is_array());
}
