use serde::Serialize;

use crate::error::DecisionError;

/// Carbon prices are quoted per tonne of CO2 while emissions are in kg.
pub const KG_PER_TONNE: f64 = 1000.0;

pub const CARBON_PRICE_MIN: f64 = 1000.0;
pub const CARBON_PRICE_MAX: f64 = 15000.0;
pub const CARBON_PRICE_STEP: f64 = 500.0;
pub const CARBON_PRICE_DEFAULT: f64 = 4000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct CarbonPriceBounds {
    pub min: f64,
    pub max: f64,
    pub step: f64,
    pub default: f64,
}

impl Default for CarbonPriceBounds {
    fn default() -> Self {
        Self {
            min: CARBON_PRICE_MIN,
            max: CARBON_PRICE_MAX,
            step: CARBON_PRICE_STEP,
            default: CARBON_PRICE_DEFAULT,
        }
    }
}

impl CarbonPriceBounds {
    pub fn contains(&self, value: f64) -> bool {
        value.is_finite() && value >= self.min && value <= self.max
    }
}

/// Currency units per tonne of CO2, guaranteed to lie within its bounds.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize)]
#[serde(transparent)]
pub struct CarbonPrice(f64);

impl CarbonPrice {
    pub fn new(value: f64) -> Result<Self, DecisionError> {
        Self::within(value, &CarbonPriceBounds::default())
    }

    pub fn within(value: f64, bounds: &CarbonPriceBounds) -> Result<Self, DecisionError> {
        if bounds.contains(value) {
            Ok(Self(value))
        } else {
            Err(DecisionError::ConfigOutOfRange {
                name: "carbon_price",
                value,
                min: bounds.min,
                max: bounds.max,
            })
        }
    }

    /// Snaps to the nearest step above `bounds.min` and clamps into range.
    /// Non-finite input falls back to `bounds.default`.
    pub fn clamped(value: f64, bounds: &CarbonPriceBounds) -> Self {
        if !value.is_finite() {
            return Self(bounds.default.clamp(bounds.min, bounds.max));
        }
        let snapped = if bounds.step > 0.0 {
            bounds.min + ((value - bounds.min) / bounds.step).round() * bounds.step
        } else {
            value
        };
        Self(snapped.clamp(bounds.min, bounds.max))
    }

    pub fn value(self) -> f64 {
        self.0
    }
}

impl Default for CarbonPrice {
    fn default() -> Self {
        Self(CARBON_PRICE_DEFAULT)
    }
}

pub fn carbon_cost(emissions_kg: f64, price: CarbonPrice) -> f64 {
    emissions_kg * price.value() / KG_PER_TONNE
}

pub fn project_costs(emissions_kg: &[f64], price: CarbonPrice) -> Vec<f64> {
    emissions_kg
        .iter()
        .map(|e| carbon_cost(*e, price))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alpha_cost_at_default_price() {
        let price = CarbonPrice::new(4000.0).expect("in range");
        assert!((carbon_cost(7200.0, price) - 28_800.0).abs() < 1e-9);
    }

    #[test]
    fn out_of_range_is_rejected() {
        for value in [999.0, 15_000.5, f64::NAN, f64::INFINITY] {
            assert!(matches!(
                CarbonPrice::new(value),
                Err(DecisionError::ConfigOutOfRange {
                    name: "carbon_price",
                    ..
                })
            ));
        }
        assert!(CarbonPrice::new(1000.0).is_ok());
        assert!(CarbonPrice::new(15_000.0).is_ok());
    }

    #[test]
    fn clamped_snaps_to_step_and_bounds() {
        let bounds = CarbonPriceBounds::default();
        assert_eq!(CarbonPrice::clamped(4_240.0, &bounds).value(), 4_000.0);
        assert_eq!(CarbonPrice::clamped(4_260.0, &bounds).value(), 4_500.0);
        assert_eq!(CarbonPrice::clamped(10.0, &bounds).value(), 1_000.0);
        assert_eq!(CarbonPrice::clamped(99_999.0, &bounds).value(), 15_000.0);
        assert_eq!(CarbonPrice::clamped(f64::NAN, &bounds).value(), 4_000.0);
    }

    #[test]
    fn higher_price_never_lowers_cost() {
        let emissions = [0.0, 6480.0, 75_000.0];
        let low = project_costs(&emissions, CarbonPrice::new(2000.0).expect("low"));
        let high = project_costs(&emissions, CarbonPrice::new(2500.0).expect("high"));
        for (l, h) in low.iter().zip(&high) {
            assert!(h >= l);
        }
        assert!(high.iter().zip(&low).skip(1).all(|(h, l)| h > l));
    }
}
