//! Domain models for Kvitto

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An expense category ("Office Supplies", "Travel", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
}

/// A payment method ("Visa", "Cash", ...)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentMethod {
    pub id: i64,
    pub name: String,
}

/// Whether an expense is claimable by the business or private
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BusinessOrPersonal {
    Business,
    Personal,
}

impl BusinessOrPersonal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Business => "business",
            Self::Personal => "personal",
        }
    }
}

impl std::str::FromStr for BusinessOrPersonal {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "business" | "b" => Ok(Self::Business),
            "personal" | "p" | "private" => Ok(Self::Personal),
            _ => Err(format!("Unknown business/personal flag: {}", s)),
        }
    }
}

impl std::fmt::Display for BusinessOrPersonal {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A finalized expense ready to be stored
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewExpense {
    pub date: NaiveDate,
    pub category_id: i64,
    pub description: String,
    pub amount: Decimal,
    pub vat: Decimal,
    pub payment_method_id: i64,
    pub business_personal: BusinessOrPersonal,
}

impl NewExpense {
    /// Check the record against the rules the store enforces
    pub fn validate(&self, today: NaiveDate) -> std::result::Result<(), String> {
        if self.date > today {
            return Err(format!("Date {} is in the future", self.date));
        }
        if self.amount.is_sign_negative() {
            return Err(format!("Amount must not be negative: {}", self.amount));
        }
        if self.vat.is_sign_negative() {
            return Err(format!("VAT must not be negative: {}", self.vat));
        }
        if self.description.trim().is_empty() {
            return Err("Description must not be empty".to_string());
        }
        Ok(())
    }
}

/// A stored expense
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Expense {
    pub transaction_id: i64,
    pub date: NaiveDate,
    pub category_id: i64,
    pub description: String,
    pub amount: Decimal,
    pub vat: Decimal,
    pub payment_method_id: i64,
    pub business_personal: BusinessOrPersonal,
    /// Day the expense was recorded
    pub declared_on: NaiveDate,
    pub created_at: DateTime<Utc>,
}

/// Optional filters for listing expenses
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpenseFilter {
    pub category_id: Option<i64>,
    pub payment_method_id: Option<i64>,
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
}

impl ExpenseFilter {
    pub fn is_empty(&self) -> bool {
        self.category_id.is_none()
            && self.payment_method_id.is_none()
            && self.start_date.is_none()
            && self.end_date.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn expense() -> NewExpense {
        NewExpense {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            category_id: 3,
            description: "Printer paper".to_string(),
            amount: Decimal::from_str("42.50").unwrap(),
            vat: Decimal::from_str("5.00").unwrap(),
            payment_method_id: 1,
            business_personal: BusinessOrPersonal::Business,
        }
    }

    #[test]
    fn test_business_or_personal_parse() {
        assert_eq!(
            "Business".parse::<BusinessOrPersonal>().unwrap(),
            BusinessOrPersonal::Business
        );
        assert_eq!(
            " personal ".parse::<BusinessOrPersonal>().unwrap(),
            BusinessOrPersonal::Personal
        );
        assert!("both".parse::<BusinessOrPersonal>().is_err());
    }

    #[test]
    fn test_validate_rejects_future_date() {
        let today = NaiveDate::from_ymd_opt(2024, 2, 29).unwrap();
        assert!(expense().validate(today).is_err());

        let today = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        assert!(expense().validate(today).is_ok());
    }

    #[test]
    fn test_validate_rejects_negative_amounts() {
        let today = NaiveDate::from_ymd_opt(2025, 1, 1).unwrap();
        let mut e = expense();
        e.amount = Decimal::from_str("-1.00").unwrap();
        assert!(e.validate(today).is_err());

        let mut e = expense();
        e.vat = Decimal::from_str("-0.01").unwrap();
        assert!(e.validate(today).is_err());
    }

    #[test]
    fn test_amounts_serialize_as_strings() {
        let json = serde_json::to_value(expense()).unwrap();
        assert_eq!(json["amount"], "42.50");
        assert_eq!(json["business_personal"], "business");
    }
}
