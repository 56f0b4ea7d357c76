//! Product models: the editable draft, the validated payload, and the stored row.

use serde::{Deserialize, Serialize};
use std::{fmt, str::FromStr};

/// Minimum number of ingredient slots a draft always carries.
pub const MIN_INGREDIENT_SLOTS: usize = 2;

/// Product category as stored in the `category` column.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Chips,
    Drinks,
    Dairy,
    Biscuits,
    Sweets,
    Cereals,
    Sauces,
    Noodles,
}

impl Category {
    /// Every category, in menu order.
    pub const ALL: [Category; 8] = [
        Category::Chips,
        Category::Drinks,
        Category::Dairy,
        Category::Biscuits,
        Category::Sweets,
        Category::Cereals,
        Category::Sauces,
        Category::Noodles,
    ];

    /// Column value used in filters.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Chips => "chips",
            Category::Drinks => "drinks",
            Category::Dairy => "dairy",
            Category::Biscuits => "biscuits",
            Category::Sweets => "sweets",
            Category::Cereals => "cereals",
            Category::Sauces => "sauces",
            Category::Noodles => "noodles",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string names no known category.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown category: {0}")]
pub struct UnknownCategory(pub String);

impl FromStr for Category {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        Category::ALL
            .into_iter()
            .find(|c| c.as_str() == wanted)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

/// Raw, unvalidated form input for a new product.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductDraft {
    /// Scanned or typed barcode; becomes the row id.
    pub barcode: Option<String>,
    pub name: String,
    /// Calories per 100g.
    pub calories: String,
    pub weight: String,
    pub protein: String,
    pub sodium: String,
    pub sugars: String,
    pub fiber: String,
    pub fat: String,
    pub carbohydrates: String,
    pub category: Option<Category>,
    /// Ordered ingredient slots; never fewer than [`MIN_INGREDIENT_SLOTS`].
    pub ingredients: Vec<String>,
    /// Selected image bytes; never part of the draft file.
    #[serde(skip)]
    pub image: Option<Vec<u8>>,
}

impl Default for ProductDraft {
    fn default() -> Self {
        Self {
            barcode: None,
            name: String::new(),
            calories: String::new(),
            weight: String::new(),
            protein: String::new(),
            sodium: String::new(),
            sugars: String::new(),
            fiber: String::new(),
            fat: String::new(),
            carbohydrates: String::new(),
            category: None,
            ingredients: vec![String::new(); MIN_INGREDIENT_SLOTS],
            image: None,
        }
    }
}

impl ProductDraft {
    /// Append an empty ingredient slot.
    pub fn add_ingredient_slot(&mut self) {
        self.ingredients.push(String::new());
    }

    /// Pad the ingredient list up to the minimum slot count.
    pub fn ensure_min_ingredient_slots(&mut self) {
        while self.ingredients.len() < MIN_INGREDIENT_SLOTS {
            self.ingredients.push(String::new());
        }
    }

    /// Demo draft used to exercise the submission path end to end.
    pub fn pepsi_diet() -> Self {
        Self {
            barcode: Some("6223001360186".into()),
            name: "Pepsi Diet".into(),
            calories: "1".into(),
            weight: "320".into(),
            protein: "0".into(),
            sodium: "12".into(),
            sugars: "0".into(),
            fiber: "0".into(),
            fat: "0".into(),
            carbohydrates: "0".into(),
            category: Some(Category::Drinks),
            ingredients: [
                "Carbonated Water",
                "Caramel Color",
                "Phosphoric Acid",
                "Aspartame",
                "Potassium Benzoate",
                "Caffeine",
                "Citric Acid",
                "Natural Flavoring",
            ]
            .into_iter()
            .map(String::from)
            .collect(),
            image: None,
        }
    }
}

/// Parsed numeric facts of a validated product.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Nutrients {
    pub calories_per_100g: f64,
    pub weight: f64,
    pub protein: f64,
    pub sodium: f64,
    pub sugars: f64,
    pub fiber: f64,
    pub fat: f64,
    pub carbohydrates: f64,
}

/// A draft whose every required field parsed.
///
/// Only the validator builds these, and only from a draft with an empty
/// field-error set and a present barcode.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidatedProduct {
    barcode: String,
    name: String,
    category: Category,
    nutrients: Nutrients,
    ingredients: Vec<String>,
}

impl ValidatedProduct {
    pub(crate) fn new(
        barcode: String,
        name: String,
        category: Category,
        nutrients: Nutrients,
        ingredients: Vec<String>,
    ) -> Self {
        Self {
            barcode,
            name,
            category,
            nutrients,
            ingredients,
        }
    }

    pub fn barcode(&self) -> &str {
        &self.barcode
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn nutrients(&self) -> &Nutrients {
        &self.nutrients
    }

    pub fn ingredients(&self) -> &[String] {
        &self.ingredients
    }

    /// Row to insert; the barcode becomes the id and the scan counter starts at zero.
    pub fn to_row(&self) -> Product {
        let n = &self.nutrients;
        Product {
            id: Some(self.barcode.clone()),
            name: Some(self.name.clone()),
            calories_per_100g: Some(n.calories_per_100g),
            scans: Some(0),
            weight: Some(n.weight),
            protein: Some(n.protein),
            sodium: Some(n.sodium),
            sugars: Some(n.sugars),
            fiber: Some(n.fiber),
            category: Some(self.category),
            fat: Some(n.fat),
            carbohydrates: Some(n.carbohydrates),
            ingredients: Some(self.ingredients.clone()),
        }
    }
}

/// A product row as stored in the `products` table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: Option<String>,
    pub name: Option<String>,
    pub calories_per_100g: Option<f64>,
    pub scans: Option<i64>,
    pub weight: Option<f64>,
    pub protein: Option<f64>,
    pub sodium: Option<f64>,
    pub sugars: Option<f64>,
    pub fiber: Option<f64>,
    pub category: Option<Category>,
    pub fat: Option<f64>,
    pub carbohydrates: Option<f64>,
    pub ingredients: Option<Vec<String>>,
}
