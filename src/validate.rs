//! Field parsing and validation for the add-product form.

use std::collections::BTreeSet;

use crate::product::{Nutrients, ProductDraft, ValidatedProduct};

/// Identifies one form field that can be flagged as erroring.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldId {
    Name,
    Category,
    Calories,
    Weight,
    Protein,
    Sodium,
    Sugars,
    Fiber,
    Fat,
    Carbohydrates,
    /// Ingredient slot by zero-based index.
    Ingredient(usize),
}

impl FieldId {
    /// Numeric fields in form order.
    pub const NUMERIC: [FieldId; 8] = [
        FieldId::Calories,
        FieldId::Weight,
        FieldId::Protein,
        FieldId::Sodium,
        FieldId::Sugars,
        FieldId::Fiber,
        FieldId::Fat,
        FieldId::Carbohydrates,
    ];

    /// Unit hint shown next to the field label.
    pub fn unit_hint(self) -> &'static str {
        match self {
            FieldId::Name | FieldId::Category | FieldId::Ingredient(_) => "",
            FieldId::Calories => "(per kcal)",
            _ => "(per g)",
        }
    }

    /// Raw text of a numeric field, `None` for non-numeric fields.
    fn raw_numeric(self, draft: &ProductDraft) -> Option<&str> {
        let raw = match self {
            FieldId::Calories => &draft.calories,
            FieldId::Weight => &draft.weight,
            FieldId::Protein => &draft.protein,
            FieldId::Sodium => &draft.sodium,
            FieldId::Sugars => &draft.sugars,
            FieldId::Fiber => &draft.fiber,
            FieldId::Fat => &draft.fat,
            FieldId::Carbohydrates => &draft.carbohydrates,
            _ => return None,
        };
        Some(raw.as_str())
    }
}

/// Fields currently failing validation.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FieldErrorSet(BTreeSet<FieldId>);

impl FieldErrorSet {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, field: FieldId) -> bool {
        self.0.contains(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = FieldId> + '_ {
        self.0.iter().copied()
    }

    /// Whether any ingredient slot is flagged.
    ///
    /// Informational only. [`validate`] never flags ingredient slots, so this
    /// stays false for every set it produces.
    pub fn contains_ingredient_field(&self) -> bool {
        self.0.iter().any(|f| matches!(f, FieldId::Ingredient(_)))
    }

    fn insert(&mut self, field: FieldId) {
        self.0.insert(field);
    }
}

/// Why a draft could not become a [`ValidatedProduct`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Rejection {
    /// No barcode yet; the user has to scan one before anything else is checked.
    MissingBarcode,
    /// One or more fields failed to parse.
    Fields(FieldErrorSet),
}

/// Parse a decimal the same way regardless of locale.
///
/// Empty input and non-finite values (`inf`, `NaN`) are rejected; no
/// whitespace trimming is applied.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    if raw.is_empty() {
        return None;
    }
    raw.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Compute the full error set for a draft.
pub fn validate(draft: &ProductDraft) -> FieldErrorSet {
    let mut errors = FieldErrorSet::default();

    if draft.name.is_empty() {
        errors.insert(FieldId::Name);
    }
    if draft.category.is_none() {
        errors.insert(FieldId::Category);
    }
    for field in FieldId::NUMERIC {
        let raw = field.raw_numeric(draft).unwrap_or_default();
        if parse_decimal(raw).is_none() {
            errors.insert(field);
        }
    }
    // Ingredient slots are not checked; empty entries are submitted as-is.

    errors
}

/// Turn a draft into a validated product, or say why it can't be.
///
/// The barcode check runs first and short-circuits; the returned error set is
/// always complete when fields are rejected.
pub fn validate_product(draft: &ProductDraft) -> Result<ValidatedProduct, Rejection> {
    let Some(barcode) = draft.barcode.as_deref().filter(|b| !b.is_empty()) else {
        return Err(Rejection::MissingBarcode);
    };

    let errors = validate(draft);
    if !errors.is_empty() {
        return Err(Rejection::Fields(errors));
    }

    let num = |field: FieldId| {
        field
            .raw_numeric(draft)
            .and_then(parse_decimal)
            .ok_or_else(|| Rejection::Fields(validate(draft)))
    };
    let nutrients = Nutrients {
        calories_per_100g: num(FieldId::Calories)?,
        weight: num(FieldId::Weight)?,
        protein: num(FieldId::Protein)?,
        sodium: num(FieldId::Sodium)?,
        sugars: num(FieldId::Sugars)?,
        fiber: num(FieldId::Fiber)?,
        fat: num(FieldId::Fat)?,
        carbohydrates: num(FieldId::Carbohydrates)?,
    };
    let category = draft
        .category
        .ok_or_else(|| Rejection::Fields(validate(draft)))?;

    Ok(ValidatedProduct::new(
        barcode.to_string(),
        draft.name.clone(),
        category,
        nutrients,
        draft.ingredients.clone(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::product::Category;

    #[test]
    fn test_parse_decimal_accepts_plain_decimals() {
        // Dot decimals, integers and signs parse.
        assert_eq!(parse_decimal("12"), Some(12.0));
        assert_eq!(parse_decimal("0.5"), Some(0.5));
        assert_eq!(parse_decimal("-3.25"), Some(-3.25));
    }

    #[test]
    fn test_parse_decimal_rejects_empty_locale_and_non_finite() {
        // Empty, comma decimals, padded and non-finite inputs fail.
        assert_eq!(parse_decimal(""), None);
        assert_eq!(parse_decimal("1,5"), None);
        assert_eq!(parse_decimal(" 1"), None);
        assert_eq!(parse_decimal("inf"), None);
        assert_eq!(parse_decimal("NaN"), None);
        assert_eq!(parse_decimal("abc"), None);
    }

    #[test]
    fn test_complete_draft_has_no_errors() {
        // The demo draft is fully valid.
        let d = ProductDraft::pepsi_diet();
        assert!(validate(&d).is_empty());
    }

    #[test]
    fn test_empty_draft_flags_every_required_field() {
        // Every required field of an empty draft is flagged, ingredients are not.
        let errors = validate(&ProductDraft::default());
        assert_eq!(errors.len(), 10);
        assert!(errors.contains(FieldId::Name));
        assert!(errors.contains(FieldId::Category));
        for f in FieldId::NUMERIC {
            assert!(errors.contains(f));
        }
        assert!(!errors.contains_ingredient_field());
    }

    #[test]
    fn test_single_bad_numeric_field_is_isolated() {
        // Breaking any one numeric field flags exactly that field.
        for field in FieldId::NUMERIC {
            let mut d = ProductDraft::pepsi_diet();
            let raw = match field {
                FieldId::Calories => &mut d.calories,
                FieldId::Weight => &mut d.weight,
                FieldId::Protein => &mut d.protein,
                FieldId::Sodium => &mut d.sodium,
                FieldId::Sugars => &mut d.sugars,
                FieldId::Fiber => &mut d.fiber,
                FieldId::Fat => &mut d.fat,
                FieldId::Carbohydrates => &mut d.carbohydrates,
                other => unreachable!("{other:?} is not numeric"),
            };
            *raw = "12mg".into();
            let errors = validate(&d);
            assert_eq!(errors.iter().collect::<Vec<_>>(), vec![field], "{field:?}");
        }
    }

    #[test]
    fn test_empty_ingredients_are_not_errors() {
        // Empty ingredient slots pass validation.
        let mut d = ProductDraft::pepsi_diet();
        d.ingredients = vec![String::new(), String::new(), String::new()];
        assert!(validate(&d).is_empty());
        let product = validate_product(&d).unwrap();
        assert_eq!(product.ingredients().len(), 3);
    }

    #[test]
    fn test_missing_barcode_short_circuits() {
        // Without a barcode no field errors are reported at all.
        let mut d = ProductDraft::default();
        assert_eq!(validate_product(&d), Err(Rejection::MissingBarcode));
        d.barcode = Some(String::new());
        assert_eq!(validate_product(&d), Err(Rejection::MissingBarcode));
    }

    #[test]
    fn test_validate_product_builds_typed_values() {
        // A valid draft becomes a typed product.
        let p = validate_product(&ProductDraft::pepsi_diet()).unwrap();
        assert_eq!(p.barcode(), "6223001360186");
        assert_eq!(p.name(), "Pepsi Diet");
        assert_eq!(p.category(), Category::Drinks);
        assert_eq!(p.nutrients().weight, 320.0);
        assert_eq!(p.nutrients().sodium, 12.0);
    }

    #[test]
    fn test_validate_product_reports_field_errors() {
        // Field errors come back as a complete set.
        let mut d = ProductDraft::pepsi_diet();
        d.name.clear();
        d.category = None;
        match validate_product(&d) {
            Err(Rejection::Fields(errors)) => {
                assert!(errors.contains(FieldId::Name));
                assert!(errors.contains(FieldId::Category));
                assert_eq!(errors.len(), 2);
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_unit_hints() {
        // Calories use kcal, other nutrients grams, text fields nothing.
        assert_eq!(FieldId::Calories.unit_hint(), "(per kcal)");
        assert_eq!(FieldId::Fat.unit_hint(), "(per g)");
        assert_eq!(FieldId::Ingredient(0).unit_hint(), "");
    }
}
