//! Additive keyword heuristic that scores how likely a message indicates
//! purchase intent. Scores gate campaign triggering.

const BASE_SCORE: u32 = 50;
const MAX_SCORE: u32 = 100;

const PRICE_TERMS: &[&str] = &[
    "多少钱", "多少錢", "价格", "價格", "报价", "報價", "怎么卖", "怎麼賣", "price", "cost",
    "how much",
];

const PURCHASE_TERMS: &[&str] = &[
    "想买", "想買", "购买", "購買", "下单", "下單", "付款", "怎么付", "buy", "order", "purchase",
];

const LEARN_MORE_TERMS: &[&str] = &[
    "了解", "详细", "詳細", "介绍", "介紹", "咨询", "諮詢", "more info", "tell me more",
    "details",
];

const URGENCY_TERMS: &[&str] = &[
    "急", "尽快", "盡快", "马上", "馬上", "立刻", "urgent", "asap", "right away",
];

fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|term| text.contains(term))
}

/// Score a message in `[0, 100]`. Every matched term family adds its weight
/// on top of the neutral base; the sum is capped.
pub fn score_intent(message: &str) -> u8 {
    let text = message.to_lowercase();
    let mut score = BASE_SCORE;
    if contains_any(&text, PRICE_TERMS) {
        score += 20;
    }
    if contains_any(&text, PURCHASE_TERMS) {
        score += 25;
    }
    if contains_any(&text, LEARN_MORE_TERMS) {
        score += 10;
    }
    if contains_any(&text, URGENCY_TERMS) {
        score += 15;
    }
    score.min(MAX_SCORE) as u8
}
