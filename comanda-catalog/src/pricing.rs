use comanda_core::Money;
use serde::{Deserialize, Serialize};

/// Per-restaurant delivery pricing.
///
/// Owned by the restaurant profile. The lifecycle engine only ever sees a
/// snapshot of it, taken when an order is created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PricingConfig {
    /// Flat fee covering the first `base_distance_km`
    pub base_fee: Money,

    pub base_distance_km: f64,

    /// Charged per kilometre beyond the base distance
    pub fee_per_extra_km: Money,

    /// Anything farther is out of coverage
    pub max_delivery_distance_km: f64,

    pub estimated_prep_minutes: u32,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            base_fee: 3000,
            base_distance_km: 1.0,
            fee_per_extra_km: 1500,
            max_delivery_distance_km: 10.0,
            estimated_prep_minutes: 30,
        }
    }
}

impl PricingConfig {
    pub fn validate(&self) -> Result<(), PricingError> {
        if self.base_fee < 0 || self.fee_per_extra_km < 0 {
            return Err(PricingError::InvalidConfig(
                "fees must not be negative".to_string(),
            ));
        }
        if !self.base_distance_km.is_finite() || self.base_distance_km < 0.0 {
            return Err(PricingError::InvalidConfig(format!(
                "base distance must be a non-negative number, got {}",
                self.base_distance_km
            )));
        }
        if !self.max_delivery_distance_km.is_finite()
            || self.max_delivery_distance_km < self.base_distance_km
        {
            return Err(PricingError::InvalidConfig(format!(
                "max delivery distance {} is below base distance {}",
                self.max_delivery_distance_km, self.base_distance_km
            )));
        }
        Ok(())
    }
}

/// What the checkout screen shows before the customer confirms
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeliveryQuote {
    pub distance_km: f64,
    pub fee: Money,
    pub estimated_prep_minutes: u32,
}

fn check_distance(distance_km: f64) -> Result<(), PricingError> {
    if !distance_km.is_finite() || distance_km < 0.0 {
        return Err(PricingError::InvalidDistance(distance_km));
    }
    Ok(())
}

/// Reject distances the restaurant does not deliver to
pub fn ensure_coverage(config: &PricingConfig, distance_km: f64) -> Result<(), PricingError> {
    check_distance(distance_km)?;
    if distance_km > config.max_delivery_distance_km {
        return Err(PricingError::OutOfCoverage {
            distance_km,
            max_km: config.max_delivery_distance_km,
        });
    }
    Ok(())
}

/// Distance-tiered delivery fee.
///
/// Up to `base_distance_km` the fee is `base_fee`; past it every extra
/// kilometre (fractions included) adds `fee_per_extra_km`. The result is
/// rounded to the smallest currency unit. Coverage is the caller's job,
/// see [`ensure_coverage`].
pub fn compute_delivery_fee(config: &PricingConfig, distance_km: f64) -> Result<Money, PricingError> {
    check_distance(distance_km)?;

    if distance_km <= config.base_distance_km {
        return Ok(config.base_fee);
    }

    // Snap to the 0.1 km grid first; raw float subtraction lands just below half units
    let extra_tenths = ((distance_km - config.base_distance_km) * 10.0).round();
    let extra_km = extra_tenths / 10.0;
    let extra = (extra_tenths * config.fee_per_extra_km as f64 / 10.0).round() as Money;
    let fee = config.base_fee + extra;

    tracing::debug!(distance_km, extra_km, fee, "Delivery fee computed");
    Ok(fee)
}

/// Coverage check and fee in one step
pub fn quote(config: &PricingConfig, distance_km: f64) -> Result<DeliveryQuote, PricingError> {
    ensure_coverage(config, distance_km)?;
    let fee = compute_delivery_fee(config, distance_km)?;

    Ok(DeliveryQuote {
        distance_km,
        fee,
        estimated_prep_minutes: config.estimated_prep_minutes,
    })
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PricingError {
    #[error("Delivery distance {distance_km} km exceeds coverage of {max_km} km")]
    OutOfCoverage { distance_km: f64, max_km: f64 },

    #[error("Invalid delivery distance: {0}")]
    InvalidDistance(f64),

    #[error("Invalid pricing configuration: {0}")]
    InvalidConfig(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> PricingConfig {
        PricingConfig {
            base_fee: 3000,
            base_distance_km: 1.0,
            fee_per_extra_km: 1500,
            max_delivery_distance_km: 8.0,
            estimated_prep_minutes: 25,
        }
    }

    #[test]
    fn test_within_base_distance_is_flat() {
        let config = config();
        for d in [0.0, 0.1, 0.5, 0.9, 1.0] {
            assert_eq!(compute_delivery_fee(&config, d).unwrap(), 3000);
        }
    }

    #[test]
    fn test_three_km_scenario() {
        assert_eq!(compute_delivery_fee(&config(), 3.0).unwrap(), 6000);
    }

    #[test]
    fn test_fractional_distance_rounds_to_unit() {
        // 0.3 km extra * 1500 = 450
        assert_eq!(compute_delivery_fee(&config(), 1.3).unwrap(), 3450);

        let odd = PricingConfig {
            fee_per_extra_km: 999,
            ..config()
        };
        // 0.5 * 999 = 499.5 -> 500
        assert_eq!(compute_delivery_fee(&odd, 1.5).unwrap(), 3500);
    }

    #[test]
    fn test_half_unit_rounds_away_from_zero() {
        let config = PricingConfig {
            base_fee: 3000,
            base_distance_km: 2.0,
            fee_per_extra_km: 1005,
            ..config()
        };
        // 0.3 km extra * 1005 = 301.5 -> 302, even though 2.3 - 2.0 < 0.3 in f64
        assert_eq!(compute_delivery_fee(&config, 2.3).unwrap(), 3302);
    }

    #[test]
    fn test_monotonic_in_distance() {
        let config = config();
        let mut previous = 0;
        for step in 0..=80 {
            let d = step as f64 * 0.1;
            let fee = compute_delivery_fee(&config, d).unwrap();
            assert!(fee >= previous, "fee dropped at {} km", d);
            previous = fee;
        }
    }

    #[test]
    fn test_compute_is_repeatable() {
        let config = config();
        let first = compute_delivery_fee(&config, 4.2).unwrap();
        for _ in 0..10 {
            assert_eq!(compute_delivery_fee(&config, 4.2).unwrap(), first);
        }
    }

    #[test]
    fn test_negative_distance_rejected() {
        assert_eq!(
            compute_delivery_fee(&config(), -0.1),
            Err(PricingError::InvalidDistance(-0.1))
        );
        assert!(compute_delivery_fee(&config(), f64::INFINITY).is_err());
    }

    #[test]
    fn test_out_of_coverage() {
        let config = config();
        assert!(ensure_coverage(&config, 8.0).is_ok());
        assert!(matches!(
            ensure_coverage(&config, 8.1),
            Err(PricingError::OutOfCoverage { .. })
        ));
        assert!(quote(&config, 12.0).is_err());
    }

    #[test]
    fn test_quote() {
        let quote = quote(&config(), 3.0).unwrap();
        assert_eq!(quote.fee, 6000);
        assert_eq!(quote.estimated_prep_minutes, 25);
    }

    #[test]
    fn test_config_validation() {
        assert!(config().validate().is_ok());
        assert!(PricingConfig { base_fee: -1, ..config() }.validate().is_err());
        assert!(PricingConfig {
            max_delivery_distance_km: 0.5,
            ..config()
        }
        .validate()
        .is_err());
    }
}
