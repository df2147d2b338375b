use chrono::{NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::features::shared::{
    validate_amount, validate_digits, validate_optional_text, validate_text, FieldError, Fields,
    Record,
};
use crate::store::Row;

pub const MAX_CUSTOMER_NAME_LENGTH: usize = 255;
pub const MAX_CARD_TYPE_LENGTH: usize = 50;

/// A row of `customer_payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase"))]
pub struct CustomerPayment {
    pub id: i64,
    pub customer_name: String,
    pub card_last_four_digits: Option<String>,
    pub card_type: Option<String>,
    pub amount: f64,
    pub payment_date: Option<NaiveDateTime>,
}

impl Record for CustomerPayment {
    const TABLE: &'static str = "customer_payments";

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentInput {
    pub customer_name: String,
    #[serde(default)]
    pub card_last_four_digits: Option<String>,
    #[serde(default)]
    pub card_type: Option<String>,
    pub amount: f64,
    /// Defaults to the time of the request.
    #[serde(default)]
    pub payment_date: Option<NaiveDateTime>,
}

impl PaymentInput {
    pub fn validate(&self) -> Result<(), FieldError> {
        validate_text("customerName", &self.customer_name, MAX_CUSTOMER_NAME_LENGTH)?;
        if let Some(digits) = &self.card_last_four_digits {
            validate_digits("cardLastFourDigits", digits, 4)?;
        }
        validate_optional_text("cardType", self.card_type.as_deref(), MAX_CARD_TYPE_LENGTH)?;
        validate_amount("amount", self.amount)
    }
}

impl Fields for PaymentInput {
    fn into_row(self) -> Row {
        let payment_date = self
            .payment_date
            .unwrap_or_else(|| Utc::now().naive_utc().trunc_subsecs(0));
        let mut row = Row::new();
        row.insert("customer_name".into(), json!(self.customer_name.trim()));
        row.insert("card_last_four_digits".into(), json!(self.card_last_four_digits));
        row.insert("card_type".into(), json!(self.card_type));
        row.insert("amount".into(), json!(self.amount));
        row.insert("payment_date".into(), json!(payment_date));
        row
    }
}
