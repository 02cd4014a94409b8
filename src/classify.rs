// src/classify.rs
//! Keyword/regex classification of feed text into offering facts.
//!
//! Every decision is an ordered table of `(pattern, outcome)` rows evaluated
//! top to bottom; the first row whose pattern matches wins. Tables are
//! compiled once and never change at runtime.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    Redemption,
    Result,
    NewListing,
    Review,
    News,
}

impl EventType {
    pub fn as_str(self) -> &'static str {
        match self {
            EventType::Redemption => "REDEMPTION",
            EventType::Result => "RESULT",
            EventType::NewListing => "NEW_LISTING",
            EventType::Review => "REVIEW",
            EventType::News => "NEWS",
        }
    }

    /// Dashboard label.
    pub fn label(self) -> &'static str {
        match self {
            EventType::Redemption => "償還・分配",
            EventType::Result => "抽選・運用結果",
            EventType::NewListing => "新着案件",
            EventType::Review => "評判・レビュー",
            EventType::News => "ニュース",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionMethod {
    Draw,
    Fcfs,
}

impl SubscriptionMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            SubscriptionMethod::Draw => "DRAW",
            SubscriptionMethod::Fcfs => "FCFS",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            SubscriptionMethod::Draw => "抽選方式",
            SubscriptionMethod::Fcfs => "先着順",
        }
    }
}

/// Facts derived from an item's combined `title + content` text.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedFact {
    pub event_type: EventType,
    pub subscription_method: Option<SubscriptionMethod>,
    pub min_invest: Option<f64>, // yen
    pub expected_yield: Option<f64>, // percent as written, e.g. 5.5
    pub sentiment: i8,
}

/// One row of a decision table.
pub struct Rule<T> {
    pub pattern: Regex,
    pub outcome: T,
}

fn rule<T>(pattern: &str, outcome: T) -> Rule<T> {
    Rule {
        pattern: Regex::new(pattern).expect("classifier regex"),
        outcome,
    }
}

/// Plain "利回り" is deliberately absent from RESULT: "想定利回り" announces a
/// new offering, not a reported outcome.
pub static EVENT_RULES: Lazy<Vec<Rule<EventType>>> = Lazy::new(|| {
    vec![
        rule("償還|運用終了", EventType::Redemption),
        rule("分配|配当|利回り実績|実績利回り|運用実績|運用結果", EventType::Result),
        rule("募集|申込|応募|販売開始|公開|受付開始|提供開始|新着", EventType::NewListing),
        rule("レビュー|体験|感想|当選|落選", EventType::Review),
    ]
});

pub static SUBSCRIPTION_RULES: Lazy<Vec<Rule<SubscriptionMethod>>> = Lazy::new(|| {
    vec![
        rule("抽選", SubscriptionMethod::Draw),
        rule("先着|FCFS", SubscriptionMethod::Fcfs),
    ]
});

pub static SENTIMENT_RULES: Lazy<Vec<Rule<i8>>> = Lazy::new(|| {
    vec![
        rule("想定超|当選|好評", 1),
        rule("落選|遅延|下回り", -1),
    ]
});

static RE_MIN_INVEST: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([1-9][0-9]*(?:\.[0-9]+)?)\s*万円").expect("min invest regex"));
static RE_YIELD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"([0-9]+(?:\.[0-9]+)?)\s*[%％]").expect("yield regex"));

/// First outcome whose pattern matches `text`.
pub fn first_match<T: Copy>(rules: &[Rule<T>], text: &str) -> Option<T> {
    rules
        .iter()
        .find(|r| r.pattern.is_match(text))
        .map(|r| r.outcome)
}

fn capture_number(re: &Regex, text: &str, factor: f64) -> Option<f64> {
    let caps = re.captures(text)?;
    let v: f64 = caps.get(1)?.as_str().parse().ok()?;
    let v = v * factor;
    v.is_finite().then_some(v)
}

/// Derive facts from free text. Never fails; `event_type` falls back to NEWS.
pub fn classify(text: &str) -> NormalizedFact {
    NormalizedFact {
        event_type: first_match(&EVENT_RULES, text).unwrap_or(EventType::News),
        subscription_method: first_match(&SUBSCRIPTION_RULES, text),
        min_invest: capture_number(&RE_MIN_INVEST, text, 10_000.0),
        expected_yield: capture_number(&RE_YIELD, text, 1.0),
        sentiment: first_match(&SENTIMENT_RULES, text).unwrap_or(0),
    }
}

/// Organization keywords an item must mention to be kept (generic feeds only).
pub const ORG_KEYWORDS: [&str; 2] = ["オルタナ", "三井物産"];

pub fn mentions_any<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    keywords.iter().any(|k| text.contains(k.as_ref()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_listing_with_fcfs_amount_and_yield() {
        let f = classify("オルタナZ、新着案件を募集開始。先着順、最低投資額50万円、想定利回り5.5%");
        assert_eq!(f.event_type, EventType::NewListing);
        assert_eq!(f.subscription_method, Some(SubscriptionMethod::Fcfs));
        assert_eq!(f.min_invest, Some(500_000.0));
        assert_eq!(f.expected_yield, Some(5.5));
        assert_eq!(f.sentiment, 0);
    }

    #[test]
    fn draw_and_win_is_positive() {
        let f = classify("抽選の結果、当選しました");
        assert_eq!(f.subscription_method, Some(SubscriptionMethod::Draw));
        assert_eq!(f.sentiment, 1);
    }

    #[test]
    fn redemption_outranks_everything() {
        let f = classify("ファンド償還のお知らせ。分配金と募集の案内");
        assert_eq!(f.event_type, EventType::Redemption);
    }

    #[test]
    fn result_outranks_listing() {
        let f = classify("第3期の分配を実施、次回募集は未定");
        assert_eq!(f.event_type, EventType::Result);
    }

    #[test]
    fn review_and_negative() {
        let f = classify("落選でした。次に期待");
        assert_eq!(f.event_type, EventType::Review);
        assert_eq!(f.sentiment, -1);
    }

    #[test]
    fn catch_all_is_news() {
        let f = classify("三井物産が決算を発表");
        assert_eq!(f.event_type, EventType::News);
        assert_eq!(f.subscription_method, None);
        assert_eq!(f.min_invest, None);
        assert_eq!(f.expected_yield, None);
        assert_eq!(f.sentiment, 0);
    }

    #[test]
    fn positive_wins_over_negative() {
        // 当選 and 落選 both present: positive row comes first.
        assert_eq!(classify("当選と落選").sentiment, 1);
    }

    #[test]
    fn fractional_amount_and_fullwidth_percent() {
        let f = classify("1口1.5万円から、利回り実績4％");
        assert_eq!(f.min_invest, Some(15_000.0));
        assert_eq!(f.expected_yield, Some(4.0));
        assert_eq!(f.event_type, EventType::Result);
    }

    #[test]
    fn keyword_filter() {
        assert!(mentions_any("オルタナの新案件", &ORG_KEYWORDS));
        assert!(mentions_any("三井物産デジタル", &ORG_KEYWORDS));
        assert!(!mentions_any("別の会社", &ORG_KEYWORDS));
    }

    #[test]
    fn wire_names() {
        assert_eq!(
            serde_json::to_string(&EventType::NewListing).unwrap(),
            "\"NEW_LISTING\""
        );
        assert_eq!(
            serde_json::to_string(&SubscriptionMethod::Fcfs).unwrap(),
            "\"FCFS\""
        );
        assert_eq!(EventType::NewListing.as_str(), "NEW_LISTING");
        assert_eq!(SubscriptionMethod::Draw.label(), "抽選方式");
    }
}
