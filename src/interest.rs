//! Buying-interest detection inside private conversations: a keyword
//! heuristic with a fixed confidence, optionally backstopped by an
//! AI-assisted analysis request over the message channel.

use serde::{Deserialize, Serialize};

pub const HEURISTIC_CONFIDENCE: f64 = 0.8;

/// Deadline for a correlated analyze-interest response before the detector
/// falls back to the heuristic result.
pub const ANALYZE_INTEREST_TIMEOUT_SECONDS: i64 = 5;

/// How many recent conversation lines are shipped as analysis context.
pub const ANALYSIS_CONTEXT_LINES: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterestCategory {
    PriceInquiry,
    ProductDetail,
    PurchaseIntent,
    PositiveFeedback,
    Comparison,
}

impl InterestCategory {
    pub fn as_str(self) -> &'static str {
        match self {
            InterestCategory::PriceInquiry => "price_inquiry",
            InterestCategory::ProductDetail => "product_detail",
            InterestCategory::PurchaseIntent => "purchase_intent",
            InterestCategory::PositiveFeedback => "positive_feedback",
            InterestCategory::Comparison => "comparison",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "price_inquiry" => Some(InterestCategory::PriceInquiry),
            "product_detail" => Some(InterestCategory::ProductDetail),
            "purchase_intent" => Some(InterestCategory::PurchaseIntent),
            "positive_feedback" => Some(InterestCategory::PositiveFeedback),
            "comparison" => Some(InterestCategory::Comparison),
            _ => None,
        }
    }
}

impl std::fmt::Display for InterestCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterestSignal {
    #[serde(rename = "type")]
    pub category: InterestCategory,
    pub keyword: String,
    pub confidence: f64,
    pub message: String,
    pub detected_at: i64,
}

/// First category whose any keyword appears in the lower-cased message wins;
/// table order is the precedence order.
const CATEGORY_KEYWORDS: &[(InterestCategory, &[&str])] = &[
    (
        InterestCategory::PriceInquiry,
        &[
            "多少钱", "多少錢", "价格", "價格", "报价", "報價", "贵不贵", "貴不貴", "price",
            "how much", "cost",
        ],
    ),
    (
        InterestCategory::ProductDetail,
        &[
            "功能", "介绍", "介紹", "详细", "詳細", "怎么用", "怎麼用", "参数", "參數", "feature",
            "detail", "spec",
        ],
    ),
    (
        InterestCategory::PurchaseIntent,
        &[
            "想买", "想買", "购买", "購買", "下单", "下單", "付款", "怎么付", "buy", "order",
            "purchase",
        ],
    ),
    (
        InterestCategory::PositiveFeedback,
        &[
            "不错", "不錯", "很好", "喜欢", "喜歡", "满意", "滿意", "great", "love it", "nice",
        ],
    ),
    (
        InterestCategory::Comparison,
        &[
            "对比", "對比", "比较", "比較", "区别", "區別", "哪个好", "哪個好", "compare",
            "versus", "difference",
        ],
    ),
];

pub fn detect(message: &str, now: i64) -> Option<InterestSignal> {
    let text = message.to_lowercase();
    for (category, keywords) in CATEGORY_KEYWORDS {
        for keyword in *keywords {
            if text.contains(keyword) {
                return Some(InterestSignal {
                    category: *category,
                    keyword: (*keyword).to_string(),
                    confidence: HEURISTIC_CONFIDENCE,
                    message: message.to_string(),
                    detected_at: now,
                });
            }
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_category_has_a_matching_keyword() {
        assert_eq!(
            detect("多少錢", 1).expect("signal").category,
            InterestCategory::PriceInquiry
        );
        assert_eq!(
            detect("有哪些功能", 1).expect("signal").category,
            InterestCategory::ProductDetail
        );
        assert_eq!(
            detect("我想买", 1).expect("signal").category,
            InterestCategory::PurchaseIntent
        );
        assert_eq!(
            detect("这个不错", 1).expect("signal").category,
            InterestCategory::PositiveFeedback
        );
        assert_eq!(
            detect("跟别家对比呢", 1).expect("signal").category,
            InterestCategory::Comparison
        );
    }

    #[test]
    fn price_inquiry_wins_over_later_categories() {
        let signal = detect("多少錢可以買", 7).expect("signal");
        assert_eq!(signal.category, InterestCategory::PriceInquiry);
        assert_eq!(signal.confidence, HEURISTIC_CONFIDENCE);
        assert_eq!(signal.detected_at, 7);
    }

    #[test]
    fn unrelated_chatter_yields_no_signal() {
        assert!(detect("今天天气真好", 1).is_none());
    }

    #[test]
    fn category_names_round_trip() {
        for category in [
            InterestCategory::PriceInquiry,
            InterestCategory::ProductDetail,
            InterestCategory::PurchaseIntent,
            InterestCategory::PositiveFeedback,
            InterestCategory::Comparison,
        ] {
            assert_eq!(InterestCategory::parse(category.as_str()), Some(category));
        }
        assert_eq!(InterestCategory::parse("unknown"), None);
    }
}
