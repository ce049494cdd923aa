//! Deal suggestion generation
//!
//! Builds the marketing prompt from event and inventory context, invokes
//! the generative model, and validates its structured reply against the
//! inventory ground truth. Prices are never taken from the model: the
//! original price is looked up from inventory and the discounted price is
//! recomputed deterministically.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use thiserror::Error;
use tracing::warn;
use utoipa::ToSchema;

use crate::ai::{AiError, GeminiClient};
use crate::models::deal_suggestion::DiscountType;
use crate::models::{event, inventory_item};

/// Maximum tolerated gap between the model's claimed price and the
/// recomputed one before a warning is logged.
const PRICE_MISMATCH_TOLERANCE: f64 = 0.01;

/// Failures from suggestion generation
#[derive(Debug, Error)]
pub enum SuggestionError {
    #[error("AI generation failed: {0}")]
    Ai(#[from] AiError),

    #[error("suggestion validation failed: {0}")]
    Validation(String),
}

/// Event context handed to the generator (and accepted by the suggest API).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct EventContext {
    pub vendor_id: String,
    pub location_uuid: String,
    pub event_trigger_point: String,
    pub event_details_text: JsonValue,
    pub event_location_latitude: f64,
    pub event_location_longitude: f64,
    pub event_timestamp: DateTime<Utc>,
}

impl From<&event::Model> for EventContext {
    fn from(model: &event::Model) -> Self {
        Self {
            vendor_id: model.vendor_id.clone(),
            location_uuid: model.location_uuid.to_string(),
            event_trigger_point: model.event_trigger_point.clone(),
            event_details_text: model.event_details_text.clone(),
            event_location_latitude: model.event_location_latitude,
            event_location_longitude: model.event_location_longitude,
            event_timestamp: model.event_timestamp.with_timezone(&Utc),
        }
    }
}

/// Inventory item context handed to the generator.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InventoryContext {
    pub sku: String,
    pub product_name: String,
    pub description: String,
    pub price: f64,
    pub quantity_on_hand: i32,
    pub category: String,
    pub supplier: String,
}

impl From<&inventory_item::Model> for InventoryContext {
    fn from(model: &inventory_item::Model) -> Self {
        Self {
            sku: model.sku.clone(),
            product_name: model.product_name.clone(),
            description: model.description.clone(),
            price: model.price,
            quantity_on_hand: model.quantity_on_hand,
            category: model.category.clone(),
            supplier: model.supplier.clone(),
        }
    }
}

/// Structured reply expected from the model.
#[derive(Debug, Deserialize)]
struct AiSuggestionPayload {
    suggested_product_sku: String,
    deal_details_suggestion_text: String,
    suggested_discount_type: DiscountType,
    suggested_discount_value: f64,
    #[serde(default)]
    suggested_price: Option<f64>,
}

/// Fully validated suggestion, not yet persisted.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct GeneratedSuggestion {
    pub suggested_product_sku: String,
    pub deal_details_suggestion_text: String,
    pub suggested_discount_type: DiscountType,
    pub suggested_discount_value: f64,
    pub original_price: f64,
    pub suggested_price: f64,
    #[serde(skip)]
    pub deal_details_prompt: String,
    pub ai_model_name: String,
    #[serde(skip)]
    pub ai_response_payload: JsonValue,
}

/// Generator wrapping the AI client.
#[derive(Debug, Clone)]
pub struct SuggestionGenerator {
    ai: GeminiClient,
}

impl SuggestionGenerator {
    pub fn new(ai: GeminiClient) -> Self {
        Self { ai }
    }

    /// Generate one validated deal suggestion for the given event and
    /// inventory snapshot.
    pub async fn generate(
        &self,
        event: &EventContext,
        inventory: &[InventoryContext],
    ) -> Result<GeneratedSuggestion, SuggestionError> {
        if inventory.is_empty() {
            return Err(SuggestionError::Validation(
                "inventory list is empty; nothing to suggest".to_string(),
            ));
        }

        let prompt = build_prompt(event, inventory)
            .map_err(|e| SuggestionError::Validation(format!("failed to serialize context: {e}")))?;

        let reply = self.ai.generate(&prompt).await?;

        resolve_suggestion(
            &reply.text,
            reply.raw,
            self.ai.model(),
            prompt,
            inventory,
        )
    }
}

/// Build the natural-language prompt embedding event and inventory data.
fn build_prompt(
    event: &EventContext,
    inventory: &[InventoryContext],
) -> serde_json::Result<String> {
    let event_json = serde_json::to_string_pretty(event)?;
    let inventory_json = serde_json::to_string_pretty(inventory)?;

    Ok(format!(
        "You are an expert marketing assistant. Analyze event details and inventory to suggest ONE compelling product deal.\n\
         Event: {event_json}\n\
         Inventory: {inventory_json}\n\
         \n\
         Select ONE product. Discount should be 10-30% or a meaningful fixed amount.\n\
         'deal_details_suggestion_text' should be catchy, concise, highlight benefit/savings, and relevant to the event.\n\
         'suggested_product_sku' must be from inventory. Use its 'price' as 'original_price'.\n\
         Calculate 'suggested_price'. 'suggested_discount_type' is 'fixed_amount' or 'percentage'.\n\
         If 'percentage', 'suggested_discount_value' is the percent number (e.g., 20 for 20%).\n\
         If 'fixed_amount', 'suggested_discount_value' is a currency amount (e.g., 80.00).\n\
         \n\
         Respond ONLY with a single JSON object:\n\
         {{\n\
           \"suggested_product_sku\": \"string\",\n\
           \"deal_details_suggestion_text\": \"string\",\n\
           \"suggested_discount_type\": \"string\",\n\
           \"suggested_discount_value\": \"float\",\n\
           \"original_price\": \"float\",\n\
           \"suggested_price\": \"float\"\n\
         }}"
    ))
}

/// Strip an optional Markdown code fence from around the reply body.
fn strip_code_fence(text: &str) -> &str {
    let fence = Regex::new(r"```(?:json)?\s*([\s\S]*?)\s*```").expect("static regex");
    match fence.captures(text) {
        Some(captures) => captures.get(1).map(|m| m.as_str()).unwrap_or(text),
        None => text.trim(),
    }
}

/// Parse and validate the model's reply against the inventory snapshot.
fn resolve_suggestion(
    reply_text: &str,
    raw_payload: JsonValue,
    model_name: &str,
    prompt: String,
    inventory: &[InventoryContext],
) -> Result<GeneratedSuggestion, SuggestionError> {
    let cleaned = strip_code_fence(reply_text);

    let payload: AiSuggestionPayload = serde_json::from_str(cleaned)
        .map_err(|e| SuggestionError::Validation(format!("AI response not valid JSON: {e}")))?;

    let item = inventory
        .iter()
        .find(|item| item.sku == payload.suggested_product_sku)
        .ok_or_else(|| {
            SuggestionError::Validation(format!(
                "AI suggested SKU '{}' not in inventory",
                payload.suggested_product_sku
            ))
        })?;

    // The model's arithmetic is never trusted: take the actual inventory
    // price and recompute the discounted price from it.
    let original_price = item.price;
    let computed = match payload.suggested_discount_type {
        DiscountType::FixedAmount => original_price - payload.suggested_discount_value,
        DiscountType::Percentage => {
            original_price * (1.0 - payload.suggested_discount_value / 100.0)
        }
    };

    if let Some(claimed) = payload.suggested_price
        && (claimed - computed).abs() > PRICE_MISMATCH_TOLERANCE
    {
        warn!(
            sku = %payload.suggested_product_sku,
            claimed,
            computed,
            "AI suggested price differs from calculated price; using calculated"
        );
    }

    Ok(GeneratedSuggestion {
        suggested_product_sku: payload.suggested_product_sku,
        deal_details_suggestion_text: payload.deal_details_suggestion_text,
        suggested_discount_type: payload.suggested_discount_type,
        suggested_discount_value: payload.suggested_discount_value,
        original_price,
        suggested_price: round2(computed),
        deal_details_prompt: prompt,
        ai_model_name: model_name.to_string(),
        ai_response_payload: raw_payload,
    })
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn inventory() -> Vec<InventoryContext> {
        vec![InventoryContext {
            sku: "A".to_string(),
            product_name: "Large Black Umbrella".to_string(),
            description: "A sturdy black umbrella.".to_string(),
            price: 100.0,
            quantity_on_hand: 150,
            category: "Accessories".to_string(),
            supplier: "Acme".to_string(),
        }]
    }

    fn resolve(reply: &str) -> Result<GeneratedSuggestion, SuggestionError> {
        resolve_suggestion(
            reply,
            json!({}),
            "gemini-1.5-flash-latest",
            "prompt".to_string(),
            &inventory(),
        )
    }

    #[test]
    fn model_price_is_ignored_and_recomputed() {
        let suggestion = resolve(
            r#"{
                "suggested_product_sku": "A",
                "deal_details_suggestion_text": "Save big!",
                "suggested_discount_type": "percentage",
                "suggested_discount_value": 20,
                "original_price": 5.0,
                "suggested_price": 999
            }"#,
        )
        .unwrap();

        assert_eq!(suggestion.original_price, 100.0);
        assert_eq!(suggestion.suggested_price, 80.0);
    }

    #[test]
    fn fixed_amount_discount_subtracts() {
        let suggestion = resolve(
            r#"{
                "suggested_product_sku": "A",
                "deal_details_suggestion_text": "Was 100, now 75!",
                "suggested_discount_type": "fixed_amount",
                "suggested_discount_value": 25.0,
                "suggested_price": 75.0
            }"#,
        )
        .unwrap();

        assert_eq!(suggestion.suggested_price, 75.0);
        assert_eq!(suggestion.suggested_discount_type, DiscountType::FixedAmount);
    }

    #[test]
    fn unknown_sku_fails_validation() {
        let result = resolve(
            r#"{
                "suggested_product_sku": "Z",
                "deal_details_suggestion_text": "Nope",
                "suggested_discount_type": "percentage",
                "suggested_discount_value": 10
            }"#,
        );

        assert!(matches!(result, Err(SuggestionError::Validation(msg)) if msg.contains("'Z'")));
    }

    #[test]
    fn invalid_json_fails_validation() {
        let result = resolve("this is not json");
        assert!(
            matches!(result, Err(SuggestionError::Validation(msg)) if msg.contains("not valid JSON"))
        );
    }

    #[test]
    fn invalid_discount_type_fails_validation() {
        let result = resolve(
            r#"{
                "suggested_product_sku": "A",
                "deal_details_suggestion_text": "Deal",
                "suggested_discount_type": "bogus",
                "suggested_discount_value": 10
            }"#,
        );

        assert!(matches!(result, Err(SuggestionError::Validation(_))));
    }

    #[test]
    fn code_fenced_reply_is_unwrapped() {
        let suggestion = resolve(
            "```json\n{\"suggested_product_sku\": \"A\", \"deal_details_suggestion_text\": \"x\", \"suggested_discount_type\": \"percentage\", \"suggested_discount_value\": 10}\n```",
        )
        .unwrap();

        assert_eq!(suggestion.suggested_price, 90.0);
    }

    #[test]
    fn rounding_is_to_two_decimals() {
        let suggestion = resolve(
            r#"{
                "suggested_product_sku": "A",
                "deal_details_suggestion_text": "x",
                "suggested_discount_type": "percentage",
                "suggested_discount_value": 33.333
            }"#,
        )
        .unwrap();

        assert_eq!(suggestion.suggested_price, 66.67);
    }

    #[test]
    fn prompt_embeds_event_and_inventory() {
        let event = EventContext {
            vendor_id: "v-1".to_string(),
            location_uuid: "loc".to_string(),
            event_trigger_point: "local_event".to_string(),
            event_details_text: json!({"title": "City Marathon"}),
            event_location_latitude: 27.5727,
            event_location_longitude: 77.6506,
            event_timestamp: Utc::now(),
        };

        let prompt = build_prompt(&event, &inventory()).unwrap();
        assert!(prompt.contains("City Marathon"));
        assert!(prompt.contains("Large Black Umbrella"));
        assert!(prompt.contains("single JSON object"));
    }
}
