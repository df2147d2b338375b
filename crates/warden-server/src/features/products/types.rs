use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::features::shared::{
    validate_amount, validate_optional_text, validate_text, FieldError, Fields, Record,
};
use crate::store::Row;

pub const MAX_NAME_LENGTH: usize = 255;
pub const MAX_CATEGORY_LENGTH: usize = 100;
pub const MAX_DESCRIPTION_LENGTH: usize = 2000;

/// A row of `products`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub category: Option<String>,
    pub price: f64,
    pub stock_quantity: Option<i64>,
    pub description: Option<String>,
}

impl Record for Product {
    const TABLE: &'static str = "products";

    fn id(&self) -> i64 {
        self.id
    }
}

/// Body of create and update requests.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub category: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub stock_quantity: Option<i64>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProductInput {
    pub fn validate(&self) -> Result<(), FieldError> {
        validate_text("name", &self.name, MAX_NAME_LENGTH)?;
        validate_optional_text("category", self.category.as_deref(), MAX_CATEGORY_LENGTH)?;
        validate_amount("price", self.price)?;
        if matches!(self.stock_quantity, Some(q) if q < 0) {
            return Err(FieldError::Negative {
                field: "stockQuantity",
            });
        }
        validate_optional_text("description", self.description.as_deref(), MAX_DESCRIPTION_LENGTH)
    }
}

impl Fields for ProductInput {
    fn into_row(self) -> Row {
        let mut row = Row::new();
        row.insert("name".into(), json!(self.name.trim()));
        row.insert("category".into(), json!(self.category));
        row.insert("price".into(), json!(self.price));
        row.insert("stock_quantity".into(), json!(self.stock_quantity));
        row.insert("description".into(), json!(self.description));
        row
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ProductInput {
        ProductInput {
            name: "Desk Lamp".into(),
            category: Some("furniture".into()),
            price: 29.9,
            stock_quantity: Some(12),
            description: None,
        }
    }

    #[test]
    fn test_product_serializes_camel_case() {
        let row = json!({
            "id": 1,
            "name": "Desk Lamp",
            "category": "furniture",
            "price": 29.9,
            "stock_quantity": 12,
            "description": null
        });
        let product: Product = serde_json::from_value(row).unwrap();
        let out = serde_json::to_value(&product).unwrap();
        assert_eq!(out["stockQuantity"], 12);
        assert!(out.get("stock_quantity").is_none());
    }

    #[test]
    fn test_input_deserializes_camel_case() {
        let parsed: ProductInput =
            serde_json::from_value(json!({"name": "Pen", "price": 1.5, "stockQuantity": 3}))
                .unwrap();
        assert_eq!(parsed.stock_quantity, Some(3));
        assert_eq!(parsed.category, None);
    }

    #[test]
    fn test_validation() {
        assert!(input().validate().is_ok());

        let mut bad = input();
        bad.name = " ".into();
        assert!(bad.validate().is_err());

        let mut bad = input();
        bad.stock_quantity = Some(-1);
        assert_eq!(
            bad.validate(),
            Err(FieldError::Negative {
                field: "stockQuantity"
            })
        );
    }

    #[test]
    fn test_into_row_uses_columns() {
        let row = input().into_row();
        assert_eq!(row["stock_quantity"], json!(12));
        assert_eq!(row["description"], json!(null));
        assert_eq!(row.len(), 5);
    }
}
