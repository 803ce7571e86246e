use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// `fare * passengers + extras - discount`, in cents.
pub fn price(fare_cents: i64, passengers: u32, extras_cents: i64, discount_cents: i64) -> i64 {
    fare_cents * i64::from(passengers) + extras_cents - discount_cents
}

/// Breakdown of a booking total.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceQuote {
    pub fare_cents: i64,
    pub passengers: u32,
    pub base_cents: i64,
    pub extras_cents: i64,
    pub discount_cents: i64,
    pub total_cents: i64,
    /// Set only when a promotion was actually applied.
    pub applied_promo_code: Option<String>,
}

/// A percentage discount redeemable by code inside a validity window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Promotion {
    pub id: Uuid,
    pub promo_code: String,
    pub discount_percent: f64,
    pub valid_from: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
    pub target_criteria: Option<String>,
}

impl Promotion {
    pub fn new(
        promo_code: &str,
        discount_percent: f64,
        valid_from: DateTime<Utc>,
        valid_until: DateTime<Utc>,
        target_criteria: Option<String>,
    ) -> Result<Self, PricingError> {
        let promo_code = normalize_code(promo_code)
            .ok_or_else(|| PricingError::InvalidPromotion("promo code is required".to_string()))?;
        if !(discount_percent > 0.0 && discount_percent <= 100.0) {
            return Err(PricingError::InvalidPromotion(format!(
                "discount must be in (0, 100], got {}",
                discount_percent
            )));
        }
        if valid_from >= valid_until {
            return Err(PricingError::InvalidPromotion(
                "validity start must be before validity end".to_string(),
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            promo_code,
            discount_percent,
            valid_from,
            valid_until,
            target_criteria,
        })
    }

    pub fn is_active(&self, at: DateTime<Utc>) -> bool {
        self.valid_from <= at && at <= self.valid_until
    }

    /// Discount on the fare portion, rounded to the nearest cent.
    pub fn discount_on(&self, base_cents: i64) -> i64 {
        let discount = (base_cents as f64 * self.discount_percent / 100.0).round() as i64;
        discount.clamp(0, base_cents.max(0))
    }
}

/// Trimmed, upper-cased promo code; `None` for blank input.
pub fn normalize_code(raw: &str) -> Option<String> {
    let code = raw.trim().to_uppercase();
    (!code.is_empty()).then_some(code)
}

#[async_trait]
pub trait PromotionLookup: Send + Sync {
    /// The promotion for `code` if it exists and is active at `at`.
    async fn find_active(&self, code: &str, at: DateTime<Utc>) -> Option<Promotion>;
}

/// Lookup that never discounts.
pub struct NoPromotions;

#[async_trait]
impl PromotionLookup for NoPromotions {
    async fn find_active(&self, _code: &str, _at: DateTime<Utc>) -> Option<Promotion> {
        None
    }
}

/// In-process promotion table keyed by code.
#[derive(Default)]
pub struct PromotionCatalog {
    promotions: RwLock<HashMap<String, Promotion>>,
}

impl PromotionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add(&self, promotion: Promotion) -> Result<(), PricingError> {
        let mut promotions = self.promotions.write().await;
        if promotions.contains_key(&promotion.promo_code) {
            return Err(PricingError::DuplicatePromotion(promotion.promo_code));
        }
        promotions.insert(promotion.promo_code.clone(), promotion);
        Ok(())
    }

    pub async fn list(&self) -> Vec<Promotion> {
        let mut all: Vec<Promotion> = self.promotions.read().await.values().cloned().collect();
        all.sort_by(|a, b| a.promo_code.cmp(&b.promo_code));
        all
    }
}

#[async_trait]
impl PromotionLookup for PromotionCatalog {
    async fn find_active(&self, code: &str, at: DateTime<Utc>) -> Option<Promotion> {
        let code = normalize_code(code)?;
        self.promotions
            .read()
            .await
            .get(&code)
            .filter(|promotion| promotion.is_active(at))
            .cloned()
    }
}

/// Computes booking totals. Discounts come from the injected [`PromotionLookup`].
#[derive(Clone)]
pub struct PricingCalculator {
    promotions: Arc<dyn PromotionLookup>,
}

impl PricingCalculator {
    pub fn new(promotions: Arc<dyn PromotionLookup>) -> Self {
        Self { promotions }
    }

    pub fn without_promotions() -> Self {
        Self::new(Arc::new(NoPromotions))
    }

    pub async fn quote(
        &self,
        fare_cents: i64,
        passengers: u32,
        extras_cents: i64,
        promo_code: Option<&str>,
        at: DateTime<Utc>,
    ) -> Result<PriceQuote, PricingError> {
        if fare_cents < 0 {
            return Err(PricingError::NegativeAmount("fare", fare_cents));
        }
        if extras_cents < 0 {
            return Err(PricingError::NegativeAmount("extras", extras_cents));
        }

        let base_cents = fare_cents
            .checked_mul(i64::from(passengers))
            .filter(|base| base.checked_add(extras_cents).is_some())
            .ok_or(PricingError::Overflow)?;

        let promotion = match promo_code.and_then(normalize_code) {
            Some(code) => self.promotions.find_active(&code, at).await,
            None => None,
        };
        let discount_cents = promotion
            .as_ref()
            .map(|p| p.discount_on(base_cents))
            .unwrap_or(0);

        Ok(PriceQuote {
            fare_cents,
            passengers,
            base_cents,
            extras_cents,
            discount_cents,
            total_cents: price(fare_cents, passengers, extras_cents, discount_cents),
            applied_promo_code: promotion.map(|p| p.promo_code),
        })
    }
}

impl Default for PricingCalculator {
    fn default() -> Self {
        Self::without_promotions()
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("{0} cannot be negative: {1}")]
    NegativeAmount(&'static str, i64),

    #[error("Price calculation overflowed")]
    Overflow,

    #[error("Invalid promotion: {0}")]
    InvalidPromotion(String),

    #[error("Promotion code already exists: {0}")]
    DuplicatePromotion(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn summer_sale(percent: f64) -> Promotion {
        let now = Utc::now();
        Promotion::new(" summer10 ", percent, now - Duration::days(1), now + Duration::days(30), None).unwrap()
    }

    #[test]
    fn test_price_formula() {
        assert_eq!(price(10_000, 2, 2_000, 0), 22_000);
        assert_eq!(price(10_000, 3, 0, 1_500), 28_500);
    }

    #[tokio::test]
    async fn test_quote_without_promotion() {
        let calculator = PricingCalculator::without_promotions();

        let quote = calculator.quote(10_000, 2, 2_000, Some("SUMMER10"), Utc::now()).await.unwrap();

        assert_eq!(quote.base_cents, 20_000);
        assert_eq!(quote.discount_cents, 0);
        assert_eq!(quote.total_cents, 22_000);
        assert_eq!(quote.applied_promo_code, None);
    }

    #[tokio::test]
    async fn test_quote_applies_active_promotion_to_fare_only() {
        let catalog = Arc::new(PromotionCatalog::new());
        catalog.add(summer_sale(10.0)).await.unwrap();
        let calculator = PricingCalculator::new(catalog);

        let quote = calculator.quote(10_000, 2, 2_000, Some("summer10"), Utc::now()).await.unwrap();

        assert_eq!(quote.discount_cents, 2_000);
        assert_eq!(quote.total_cents, 20_000);
        assert_eq!(quote.applied_promo_code.as_deref(), Some("SUMMER10"));
    }

    #[tokio::test]
    async fn test_expired_promotion_is_ignored() {
        let catalog = Arc::new(PromotionCatalog::new());
        catalog.add(summer_sale(50.0)).await.unwrap();
        let calculator = PricingCalculator::new(catalog);

        let later = Utc::now() + Duration::days(60);
        let quote = calculator.quote(10_000, 1, 0, Some("SUMMER10"), later).await.unwrap();

        assert_eq!(quote.total_cents, 10_000);
    }

    #[tokio::test]
    async fn test_negative_extras_rejected() {
        let calculator = PricingCalculator::default();
        let err = calculator.quote(10_000, 1, -1, None, Utc::now()).await.unwrap_err();
        assert_eq!(err, PricingError::NegativeAmount("extras", -1));
    }

    #[tokio::test]
    async fn test_duplicate_codes_rejected() {
        let catalog = PromotionCatalog::new();
        catalog.add(summer_sale(10.0)).await.unwrap();

        let err = catalog.add(summer_sale(20.0)).await.unwrap_err();
        assert_eq!(err, PricingError::DuplicatePromotion("SUMMER10".to_string()));
        assert_eq!(catalog.list().await.len(), 1);
    }

    #[test]
    fn test_promotion_validation() {
        let now = Utc::now();
        assert!(Promotion::new("X", 0.0, now, now + Duration::days(1), None).is_err());
        assert!(Promotion::new("X", 120.0, now, now + Duration::days(1), None).is_err());
        assert!(Promotion::new("X", 10.0, now, now, None).is_err());
        assert!(Promotion::new("  ", 10.0, now, now + Duration::days(1), None).is_err());
    }
}
