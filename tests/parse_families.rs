// tests/parse_families.rs
use alterna_monitor::ingest::parse::{detect_family, parse_document, parse_feed, FeedFamily};
use chrono::{DateTime, TimeZone, Utc};

const RSS2: &str = include_str!("fixtures/rss2.xml");
const RDF: &str = include_str!("fixtures/rdf.xml");
const ATOM: &str = include_str!("fixtures/atom.xml");

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 9, 6, 0, 0, 0).unwrap()
}

#[test]
fn fixtures_detect_their_family() {
    assert_eq!(
        detect_family(&parse_document(RSS2).unwrap()),
        Some(FeedFamily::Rss2)
    );
    assert_eq!(
        detect_family(&parse_document(RDF).unwrap()),
        Some(FeedFamily::Rdf)
    );
    assert_eq!(
        detect_family(&parse_document(ATOM).unwrap()),
        Some(FeedFamily::Atom)
    );
}

#[test]
fn rss2_items_keep_fields_and_link_fallbacks() {
    let items = parse_feed(RSS2, now()).expect("rss2 parse ok");
    assert_eq!(items.len(), 4, "one RawItem per <item>");

    let first = &items[0];
    assert_eq!(first.title, "オルタナZ、新着案件を募集開始");
    assert_eq!(first.link, "https://news.example.jp/articles/1001");
    assert_eq!(first.published, "Mon, 01 Sep 2025 03:00:00 GMT");
    assert_eq!(first.author, "経済新報");
    assert!(first.content.contains("最低投資額50万円"));

    // No <link>: guid is used.
    assert_eq!(items[1].link, "https://news.example.jp/articles/1002");
    assert!(items[1].content.starts_with("<p>抽選方式"));
    assert_eq!(items[1].author, "");

    // Nothing resolvable at all.
    assert_eq!(items[2].link, "");
    assert_eq!(items[2].published, now().to_rfc2822());
}

#[test]
fn rdf_prefers_issued_then_date() {
    let items = parse_feed(RDF, now()).expect("rdf parse ok");
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].published, "2025-08-29T14:00:00+09:00");
    assert_eq!(items[1].published, "2025-08-30T10:00:00+09:00");
    assert_eq!(
        items[0].link,
        "https://prtimes.jp/main/html/rd/p/000000101.html"
    );
    assert_eq!(
        items[0].author,
        "三井物産デジタル・アセットマネジメント株式会社"
    );
}

#[test]
fn atom_prefers_alternate_href_summary_and_updated() {
    let items = parse_feed(ATOM, now()).expect("atom parse ok");
    assert_eq!(items.len(), 2);

    let a = &items[0];
    assert_eq!(a.link, "https://blog.example.com/2025/09/review");
    assert_eq!(a.content, "抽選に落選しました。次回に期待。");
    assert_eq!(a.published, "2025-09-04T21:00:00Z");
    assert_eq!(a.author, "個人投資家A");

    let b = &items[1];
    assert_eq!(b.link, "tag:blog.example.com,2025:entry-2");
    assert_eq!(b.content, "<p>遅延の報告あり</p>");
}

#[test]
fn malformed_document_is_an_error_not_a_panic() {
    let broken = "<rss><channel><item><title>x</title></channel></rss>";
    assert!(parse_feed(broken, now()).is_err());
}
