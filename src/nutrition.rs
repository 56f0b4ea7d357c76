//! Calorie figures for display.

use std::str::FromStr;

use crate::product::Product;

/// Basis the calorie figure is shown for.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ServingBasis {
    /// Whole package, using the product weight.
    Serving,
    #[default]
    Per100g,
    Per100ml,
}

impl ServingBasis {
    pub fn label(self) -> &'static str {
        match self {
            ServingBasis::Serving => "Serving",
            ServingBasis::Per100g => "100g",
            ServingBasis::Per100ml => "100m",
        }
    }
}

impl FromStr for ServingBasis {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "serving" => Ok(ServingBasis::Serving),
            "100g" => Ok(ServingBasis::Per100g),
            "100ml" | "100m" => Ok(ServingBasis::Per100ml),
            other => Err(format!("unknown serving basis: {other}")),
        }
    }
}

/// Calories for `basis`, rounded to one decimal; 0.0 when inputs are missing.
pub fn calories_for(product: &Product, basis: ServingBasis) -> f64 {
    let (Some(per_100g), Some(weight)) = (product.calories_per_100g, product.weight) else {
        tracing::debug!("calories unavailable for {:?}", product.id);
        return 0.0;
    };
    let value = match basis {
        ServingBasis::Serving => weight * per_100g / 100.0,
        ServingBasis::Per100g | ServingBasis::Per100ml => per_100g,
    };
    (value * 10.0).round() / 10.0
}
