//! Lead scores, pricing and their display helpers.

use std::sync::Arc;

use database::{LeadPricing, LeadQualityScore};
use tracing::{debug, warn};

use crate::backend::LeadBackend;
use crate::error::ApiError;

const MODULE: &str = "lead_scoring";

/// Reads scores and prices from a [`LeadBackend`].
#[derive(Clone)]
pub struct ScoringService {
    backend: Arc<dyn LeadBackend>,
}

impl ScoringService {
    pub fn new(backend: Arc<dyn LeadBackend>) -> Self {
        Self { backend }
    }

    /// The lead's score, calculating it first if none exists yet.
    pub async fn fetch_lead_score(&self, lead_id: &str) -> Result<LeadQualityScore, ApiError> {
        match self.backend.get_lead_score(lead_id).await {
            Ok(score) => Ok(score),
            Err(e) if e.is_not_found() => {
                debug!(lead_id, "No score yet, calculating");
                self.calculate_score(lead_id).await
            }
            Err(e) => Err(ApiError::backend(MODULE, "fetch_lead_score", e)),
        }
    }

    /// Recalculate the lead's score and read it back.
    pub async fn calculate_score(&self, lead_id: &str) -> Result<LeadQualityScore, ApiError> {
        self.backend
            .calculate_lead_score(lead_id)
            .await
            .map_err(|e| ApiError::backend(MODULE, "calculate_score", e))?;

        self.backend
            .get_lead_score(lead_id)
            .await
            .map_err(|e| ApiError::backend(MODULE, "calculate_score", e))
    }

    /// The lead's price, or `None` when the backend answers with a
    /// malformed pricing object.
    pub async fn fetch_lead_pricing(&self, lead_id: &str) -> Result<Option<LeadPricing>, ApiError> {
        let value = self
            .backend
            .get_lead_pricing(lead_id)
            .await
            .map_err(|e| ApiError::backend(MODULE, "fetch_lead_pricing", e))?;

        let pricing = parse_pricing(value);
        if pricing.is_none() {
            warn!(lead_id, "Discarding malformed pricing");
        }
        Ok(pricing)
    }
}

/// Accept a pricing object only if `tier_name` is a string and
/// `base_price_cents` a number.
fn parse_pricing(value: serde_json::Value) -> Option<LeadPricing> {
    let shaped = value.get("tier_name").is_some_and(|v| v.is_string())
        && value.get("base_price_cents").is_some_and(|v| v.is_number());
    if !shaped {
        return None;
    }
    serde_json::from_value(value).ok()
}

/// Letter grade for a 0-100 score.
pub fn score_grade(score: i64) -> &'static str {
    match score {
        s if s >= 86 => "A+",
        s if s >= 76 => "A",
        s if s >= 61 => "B",
        s if s >= 46 => "C",
        s if s >= 31 => "D",
        _ => "F",
    }
}

/// Display color for a score, same bands as [`score_grade`].
pub fn score_color(score: i64) -> &'static str {
    match score {
        s if s >= 86 => "emerald",
        s if s >= 76 => "green",
        s if s >= 61 => "lime",
        s if s >= 46 => "yellow",
        s if s >= 31 => "orange",
        _ => "red",
    }
}

/// Badge color for a pricing tier.
pub fn tier_badge_color(tier_name: &str) -> &'static str {
    match tier_name {
        "premium" => "purple",
        "standard" => "blue",
        "basic" => "green",
        _ => "gray",
    }
}

/// Format øre as whole kroner with space thousand separators: `"1 250 kr"`.
pub fn format_price(cents: i64) -> String {
    let kroner = (cents / 100).unsigned_abs().to_string();
    let mut grouped = String::with_capacity(kroner.len() + kroner.len() / 3);
    for (i, ch) in kroner.chars().enumerate() {
        if i > 0 && (kroner.len() - i) % 3 == 0 {
            grouped.push(' ');
        }
        grouped.push(ch);
    }
    let sign = if cents <= -100 { "-" } else { "" };
    format!("{}{} kr", sign, grouped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use database::PreviewAccessLevel;
    use serde_json::json;

    #[test]
    fn test_score_grade_boundaries() {
        assert_eq!(score_grade(100), "A+");
        assert_eq!(score_grade(86), "A+");
        assert_eq!(score_grade(85), "A");
        assert_eq!(score_grade(76), "A");
        assert_eq!(score_grade(61), "B");
        assert_eq!(score_grade(60), "C");
        assert_eq!(score_grade(46), "C");
        assert_eq!(score_grade(31), "D");
        assert_eq!(score_grade(30), "F");
        assert_eq!(score_grade(0), "F");
    }

    #[test]
    fn test_colors() {
        assert_eq!(score_color(90), "emerald");
        assert_eq!(score_color(10), "red");
        assert_eq!(tier_badge_color("premium"), "purple");
        assert_eq!(tier_badge_color("unknown"), "gray");
    }

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(125_000), "1 250 kr");
        assert_eq!(format_price(50_000), "500 kr");
        assert_eq!(format_price(150_000_000), "1 500 000 kr");
        assert_eq!(format_price(0), "0 kr");
        assert_eq!(format_price(-250_000), "-2 500 kr");
    }

    #[test]
    fn test_parse_pricing_requires_shape() {
        let valid = json!({
            "tier_name": "basic",
            "base_price_cents": 25000,
            "preview_access_level": "basic",
            "full_price_cents": 50000,
            "score": 45
        });
        let pricing = parse_pricing(valid).unwrap();
        assert_eq!(pricing.preview_access_level, PreviewAccessLevel::Basic);

        assert!(parse_pricing(json!({ "tier_name": 3, "base_price_cents": 25000 })).is_none());
        assert!(parse_pricing(json!({ "tier_name": "basic", "base_price_cents": "25000" })).is_none());
        assert!(parse_pricing(json!({ "tier_name": "basic" })).is_none());
        assert!(parse_pricing(json!(null)).is_none());
    }
}
