use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::bundles::BundleError;

pub const MAX_TEXT_CHARS: usize = 10_000;
pub const MAX_BATCH_TEXTS: usize = 100;

const POSITIVE_WORDS: &[&str] = &[
    "profit", "growth", "increase", "bull", "rise", "gain", "up", "strong", "outperform", "beat",
    "exceed", "bullish", "rally", "surge", "boom", "expansion", "revenue", "earnings", "dividend",
    "upgrade", "buy", "overweight", "momentum", "breakout",
];
const NEGATIVE_WORDS: &[&str] = &[
    "loss", "decline", "decrease", "bear", "fall", "drop", "down", "weak", "underperform", "miss",
    "disappoint", "bearish", "crash", "plunge", "recession", "contraction", "debt", "deficit", "cut",
    "downgrade", "sell", "underweight", "volatility", "breakdown",
];
const NEUTRAL_WORDS: &[&str] = &[
    "stable", "flat", "unchanged", "sideways", "consolidate", "maintain", "steady", "hold",
    "neutral", "mixed",
];
const STRONG_POSITIVE: &[&str] = &["profit", "growth", "bullish"];
const STRONG_NEGATIVE: &[&str] = &["loss", "bearish", "crash"];
const FINANCIAL_TERMS: &[&str] = &[
    "stock", "market", "trading", "investment", "portfolio", "earnings", "revenue", "profit",
    "dividend", "shares", "broker", "analyst", "forecast", "quarter", "financial",
];

const KEYWORD_LIMIT: usize = 5;
const CLASSIFICATION_THRESHOLD: f64 = 0.1;

static PERCENT_RE: OnceLock<Regex> = OnceLock::new();
static DOLLAR_RE: OnceLock<Regex> = OnceLock::new();
static MILLION_RE: OnceLock<Regex> = OnceLock::new();
static BILLION_RE: OnceLock<Regex> = OnceLock::new();
static WHITESPACE_RE: OnceLock<Regex> = OnceLock::new();
static SYMBOL_RE: OnceLock<Regex> = OnceLock::new();
static MONEY_RE: OnceLock<Regex> = OnceLock::new();
static PERCENTAGE_RE: OnceLock<Regex> = OnceLock::new();

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentimentContext {
    #[serde(default)]
    pub sector: Option<String>,
    #[serde(default)]
    pub market_condition: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SentimentDistribution {
    pub positive: f64,
    pub negative: f64,
    pub neutral: f64,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    StockSymbol,
    MonetaryAmount,
    Percentage,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinancialEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub value: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SentimentAnalysis {
    pub sentiment: SentimentLabel,
    pub score: f64,
    pub confidence: f64,
    pub sentiment_distribution: SentimentDistribution,
    pub keywords: Vec<String>,
    pub entities: Vec<FinancialEntity>,
    pub reasoning: String,
    pub word_count: usize,
    pub financial_relevance: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BatchSentimentItem {
    pub index: usize,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis: Option<SentimentAnalysis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Keyword-weighted financial sentiment scoring with entity extraction.
#[derive(Clone, Copy, Debug, Default)]
pub struct SentimentAnalyzer;

impl SentimentAnalyzer {
    pub fn analyze(
        &self,
        text: &str,
        context: Option<&SentimentContext>,
    ) -> Result<SentimentAnalysis, BundleError> {
        if text.trim().is_empty() {
            return Err(BundleError::InvalidInput("Text input is required".to_string()));
        }
        if text.chars().count() > MAX_TEXT_CHARS {
            return Err(BundleError::InvalidInput(format!(
                "text exceeds {MAX_TEXT_CHARS} characters"
            )));
        }

        let normalized = normalize_financial_text(text);
        let words = tokenize(&normalized);

        let mut scores = score_words(&words);
        if let Some(context) = context {
            apply_context(&mut scores, context);
        }

        let net = scores.positive - scores.negative;
        let sentiment = if net > CLASSIFICATION_THRESHOLD {
            SentimentLabel::Positive
        } else if net < -CLASSIFICATION_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        };

        let entities = extract_entities(text);
        let confidence = confidence(&scores, entities.len(), words.len());
        let reasoning = format!(
            "Net sentiment score: {net:.3} (positive: {:.3}, negative: {:.3}, neutral: {:.3})",
            scores.positive, scores.negative, scores.neutral
        );

        Ok(SentimentAnalysis {
            sentiment,
            score: net.clamp(-1.0, 1.0),
            confidence,
            sentiment_distribution: scores,
            keywords: matched_keywords(&words, sentiment),
            entities,
            reasoning,
            word_count: words.len(),
            financial_relevance: financial_relevance(text),
        })
    }

    /// Analyzes each text independently; one bad text never fails the batch.
    pub fn analyze_batch(
        &self,
        texts: &[String],
        context: Option<&SentimentContext>,
    ) -> Result<Vec<BatchSentimentItem>, BundleError> {
        if texts.len() > MAX_BATCH_TEXTS {
            return Err(BundleError::InvalidInput(format!(
                "batch of {} texts exceeds the limit of {MAX_BATCH_TEXTS}",
                texts.len()
            )));
        }

        Ok(texts
            .iter()
            .enumerate()
            .map(|(index, text)| match self.analyze(text, context) {
                Ok(analysis) => BatchSentimentItem {
                    index,
                    success: true,
                    analysis: Some(analysis),
                    error: None,
                },
                Err(error) => BatchSentimentItem {
                    index,
                    success: false,
                    analysis: None,
                    error: Some(error.to_string()),
                },
            })
            .collect())
    }

    pub fn capabilities(&self) -> Value {
        json!({
            "service": "fingpt",
            "capabilities": [
                "sentiment_analysis",
                "financial_nlp",
                "entity_extraction",
                "batch_processing",
                "context_awareness"
            ],
            "supported_languages": ["en"],
            "max_text_length": MAX_TEXT_CHARS,
            "batch_size_limit": MAX_BATCH_TEXTS,
        })
    }
}

fn normalize_financial_text(text: &str) -> String {
    let percent = PERCENT_RE.get_or_init(|| Regex::new(r"(\d+)%").expect("percent pattern"));
    let dollar = DOLLAR_RE.get_or_init(|| Regex::new(r"\$(\d+)").expect("dollar pattern"));
    let million = MILLION_RE.get_or_init(|| Regex::new(r"(\d+)M").expect("million pattern"));
    let billion = BILLION_RE.get_or_init(|| Regex::new(r"(\d+)B").expect("billion pattern"));
    let whitespace = WHITESPACE_RE.get_or_init(|| Regex::new(r"\s+").expect("whitespace pattern"));

    let text = percent.replace_all(text, "${1} percent");
    let text = dollar.replace_all(&text, "${1} dollars");
    let text = million.replace_all(&text, "${1} million");
    let text = billion.replace_all(&text, "${1} billion");
    whitespace.replace_all(&text, " ").trim().to_string()
}

fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|word| word.trim_matches(|c: char| !c.is_alphanumeric()).to_lowercase())
        .filter(|word| !word.is_empty())
        .collect()
}

fn score_words(words: &[String]) -> SentimentDistribution {
    let mut scores = SentimentDistribution::default();
    for word in words.iter().map(String::as_str) {
        if POSITIVE_WORDS.contains(&word) {
            scores.positive += if STRONG_POSITIVE.contains(&word) { 1.5 } else { 1.0 };
        } else if NEGATIVE_WORDS.contains(&word) {
            scores.negative += if STRONG_NEGATIVE.contains(&word) { 1.5 } else { 1.0 };
        } else if NEUTRAL_WORDS.contains(&word) {
            scores.neutral += 1.0;
        }
    }

    let total = scores.positive + scores.negative + scores.neutral;
    if total > 0.0 {
        scores.positive /= total;
        scores.negative /= total;
        scores.neutral /= total;
    }
    scores
}

fn apply_context(scores: &mut SentimentDistribution, context: &SentimentContext) {
    let sector = context.sector.as_deref().unwrap_or_default().to_ascii_lowercase();
    match sector.as_str() {
        "tech" | "technology" => scores.positive *= 1.1,
        "utility" | "utilities" => scores.neutral *= 1.2,
        _ => {}
    }

    let market = context.market_condition.as_deref().unwrap_or_default().to_ascii_lowercase();
    match market.as_str() {
        "bull" => scores.positive *= 1.1,
        "bear" => scores.negative *= 1.1,
        _ => {}
    }
}

fn matched_keywords(words: &[String], sentiment: SentimentLabel) -> Vec<String> {
    let vocabulary = match sentiment {
        SentimentLabel::Positive => POSITIVE_WORDS,
        SentimentLabel::Negative => NEGATIVE_WORDS,
        SentimentLabel::Neutral => NEUTRAL_WORDS,
    };

    let mut keywords: Vec<String> = Vec::new();
    for word in words {
        if keywords.len() == KEYWORD_LIMIT {
            break;
        }
        if vocabulary.contains(&word.as_str()) && !keywords.contains(word) {
            keywords.push(word.clone());
        }
    }
    keywords
}

fn extract_entities(text: &str) -> Vec<FinancialEntity> {
    let symbol = SYMBOL_RE.get_or_init(|| Regex::new(r"\b[A-Z]{1,4}\b").expect("symbol pattern"));
    let money = MONEY_RE
        .get_or_init(|| Regex::new(r"\$\d+(?:,\d+)*(?:\.\d+)?[KMB]?").expect("money pattern"));
    let percentage =
        PERCENTAGE_RE.get_or_init(|| Regex::new(r"\d+(?:\.\d+)?%").expect("percentage pattern"));

    let mut entities = Vec::new();
    for (pattern, kind) in [
        (symbol, EntityKind::StockSymbol),
        (money, EntityKind::MonetaryAmount),
        (percentage, EntityKind::Percentage),
    ] {
        entities.extend(
            pattern
                .find_iter(text)
                .map(|found| FinancialEntity { kind, value: found.as_str().to_string() }),
        );
    }
    entities
}

fn confidence(scores: &SentimentDistribution, entity_count: usize, word_count: usize) -> f64 {
    let keyword_factor = ((scores.positive + scores.negative) * 0.3).min(0.3);
    let entity_factor = (entity_count as f64 * 0.05).min(0.15);
    let length_factor = if (10..=100).contains(&word_count) { 0.05 } else { 0.0 };
    (0.5 + keyword_factor + entity_factor + length_factor).min(0.95)
}

fn financial_relevance(text: &str) -> f64 {
    let words = tokenize(text);
    if words.is_empty() {
        return 0.0;
    }
    let hits = words.iter().filter(|word| FINANCIAL_TERMS.contains(&word.as_str())).count();
    (hits as f64 / words.len() as f64 * 5.0).min(1.0)
}

#[cfg(test)]
mod tests {
    use crate::bundles::BundleError;

    use super::{EntityKind, SentimentAnalyzer, SentimentContext, SentimentLabel};

    fn close(left: f64, right: f64) -> bool {
        (left - right).abs() < 1e-9
    }

    #[test]
    fn strong_earnings_with_tech_bull_context_is_positive() {
        let context = SentimentContext {
            sector: Some("tech".to_string()),
            market_condition: Some("bull".to_string()),
        };
        let analysis = SentimentAnalyzer
            .analyze(
                "Apple reported strong quarterly earnings with revenue growth of 15% exceeding analyst expectations",
                Some(&context),
            )
            .expect("analysis");

        assert_eq!(analysis.sentiment, SentimentLabel::Positive);
        assert!(close(analysis.score, 1.0));
        assert!(close(analysis.sentiment_distribution.positive, 1.21));
        assert_eq!(analysis.keywords, vec!["strong", "earnings", "revenue", "growth"]);
        assert_eq!(analysis.word_count, 14);
        // base + keyword cap + one entity + length bonus
        assert!(close(analysis.confidence, 0.9));
        assert!(analysis.reasoning.starts_with("Net sentiment score: 1.210"));
    }

    #[test]
    fn heavy_losses_are_negative() {
        let analysis = SentimentAnalyzer
            .analyze("Shares crash as quarterly loss deepens and debt piles up.", None)
            .expect("analysis");

        // crash 1.5 + loss 1.5 + debt 1.0 against up 1.0
        assert_eq!(analysis.sentiment, SentimentLabel::Negative);
        assert!(close(analysis.sentiment_distribution.negative, 0.8));
        assert!(close(analysis.score, -0.6));
        assert_eq!(analysis.keywords, vec!["crash", "loss", "debt"]);
    }

    #[test]
    fn stable_mixed_text_is_neutral() {
        let analysis = SentimentAnalyzer
            .analyze(
                "Stock price remained stable with mixed trading volume and neutral analyst ratings",
                Some(&SentimentContext { sector: Some("Utilities".to_string()), market_condition: None }),
            )
            .expect("analysis");

        assert_eq!(analysis.sentiment, SentimentLabel::Neutral);
        assert!(close(analysis.score, 0.0));
        assert!(close(analysis.sentiment_distribution.neutral, 1.2));
        assert_eq!(analysis.keywords, vec!["stable", "mixed", "neutral"]);
    }

    #[test]
    fn punctuation_does_not_hide_keywords() {
        let analysis = SentimentAnalyzer.analyze("Revenue, profit.", None).expect("analysis");
        assert_eq!(analysis.sentiment, SentimentLabel::Positive);
        assert_eq!(analysis.keywords, vec!["revenue", "profit"]);
        assert!(close(analysis.financial_relevance, 1.0));
    }

    #[test]
    fn extracts_symbols_amounts_and_percentages() {
        let analysis = SentimentAnalyzer
            .analyze("Tesla TSLA surged 8% after a $1,200.50M deal and a 2.5% bump", None)
            .expect("analysis");

        let values: Vec<(EntityKind, &str)> =
            analysis.entities.iter().map(|entity| (entity.kind, entity.value.as_str())).collect();
        assert_eq!(
            values,
            vec![
                (EntityKind::StockSymbol, "TSLA"),
                (EntityKind::MonetaryAmount, "$1,200.50M"),
                (EntityKind::Percentage, "8%"),
                (EntityKind::Percentage, "2.5%"),
            ]
        );
    }

    #[test]
    fn rejects_blank_and_oversized_text() {
        assert_eq!(
            SentimentAnalyzer.analyze("   ", None),
            Err(BundleError::InvalidInput("Text input is required".to_string()))
        );
        let oversized = "a".repeat(10_001);
        assert!(matches!(
            SentimentAnalyzer.analyze(&oversized, None),
            Err(BundleError::InvalidInput(_))
        ));
    }

    #[test]
    fn batch_isolates_failures_by_index() {
        let texts = vec!["Profit growth".to_string(), "".to_string(), "Debt cut".to_string()];
        let items = SentimentAnalyzer.analyze_batch(&texts, None).expect("batch");

        assert_eq!(items.len(), 3);
        assert!(items[0].success);
        assert!(!items[1].success);
        assert_eq!(items[1].index, 1);
        assert_eq!(items[1].error.as_deref(), Some("invalid input: Text input is required"));
        assert_eq!(
            items[2].analysis.as_ref().map(|analysis| analysis.sentiment),
            Some(SentimentLabel::Negative)
        );
    }

    #[test]
    fn batch_limit_is_enforced() {
        let texts = vec!["profit".to_string(); 101];
        assert!(SentimentAnalyzer.analyze_batch(&texts, None).is_err());
    }
}
