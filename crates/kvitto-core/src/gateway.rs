//! Persistence gateway: where the workflow reads reference data and stores expenses
//!
//! Two implementations:
//! - `Database`: the local SQLite store
//! - `HttpGateway`: a REST client for a running `kvitto serve`

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::models::{Category, Expense, NewExpense, PaymentMethod};

#[async_trait]
pub trait ExpenseGateway: Send + Sync {
    async fn list_categories(&self) -> Result<Vec<Category>>;

    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>>;

    /// Store a finalized expense and return it with its transaction id
    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense>;

    async fn get_expense(&self, transaction_id: i64) -> Result<Option<Expense>>;
}

#[async_trait]
impl ExpenseGateway for Database {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        Database::list_categories(self)
    }

    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        Database::list_payment_methods(self)
    }

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense> {
        Database::create_expense(self, expense)
    }

    async fn get_expense(&self, transaction_id: i64) -> Result<Option<Expense>> {
        Database::get_expense(self, transaction_id)
    }
}

/// REST client for the expense API served by `kvitto serve`
#[derive(Clone)]
pub struct HttpGateway {
    http_client: Client,
    base_url: String,
    api_key: Option<String>,
}

/// Error body returned by the API
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

impl HttpGateway {
    /// `base_url` is the server root, e.g. `http://localhost:3000`
    pub fn new(base_url: &str) -> Self {
        Self {
            http_client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    pub fn with_api_key(mut self, api_key: &str) -> Self {
        self.api_key = Some(api_key.to_string());
        self
    }

    /// Create from `KVITTO_SERVER_URL` (and optional `KVITTO_API_KEY`)
    pub fn from_env() -> Option<Self> {
        let url = std::env::var("KVITTO_SERVER_URL").ok()?;
        let gateway = Self::new(&url);
        Some(match std::env::var("KVITTO_API_KEY") {
            Ok(key) => gateway.with_api_key(&key),
            Err(_) => gateway,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        let builder = self
            .http_client
            .request(method, format!("{}/api{}", self.base_url, path));
        match &self.api_key {
            Some(key) => builder.bearer_auth(key),
            None => builder,
        }
    }

    /// Turn a non-success response into the matching error variant
    async fn check(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let message = match response.json::<ApiError>().await {
            Ok(body) => body.error,
            Err(_) => status.to_string(),
        };

        Err(match status {
            StatusCode::NOT_FOUND => Error::NotFound(message),
            StatusCode::CONFLICT => Error::Conflict(message),
            StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
                Error::InvalidData(message)
            }
            _ => Error::PersistenceFailed(format!("{}: {}", status, message)),
        })
    }
}

#[async_trait]
impl ExpenseGateway for HttpGateway {
    async fn list_categories(&self) -> Result<Vec<Category>> {
        let response = self.request(reqwest::Method::GET, "/categories").send().await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn list_payment_methods(&self) -> Result<Vec<PaymentMethod>> {
        let response = self
            .request(reqwest::Method::GET, "/payment_methods")
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn create_expense(&self, expense: &NewExpense) -> Result<Expense> {
        let response = self
            .request(reqwest::Method::POST, "/expenses")
            .json(expense)
            .send()
            .await?;
        Ok(Self::check(response).await?.json().await?)
    }

    async fn get_expense(&self, transaction_id: i64) -> Result<Option<Expense>> {
        let response = self
            .request(reqwest::Method::GET, &format!("/expenses/{}", transaction_id))
            .send()
            .await?;
        match Self::check(response).await {
            Ok(response) => Ok(Some(response.json().await?)),
            Err(Error::NotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;

    use crate::models::BusinessOrPersonal;

    #[tokio::test]
    async fn test_database_gateway_round_trip() {
        let db = Database::in_memory().unwrap();
        let category = db.create_category("Office Supplies").unwrap();
        let method = db.create_payment_method("Visa").unwrap();
        let gateway: &dyn ExpenseGateway = &db;

        assert_eq!(gateway.list_categories().await.unwrap(), vec![category.clone()]);

        let expense = NewExpense {
            date: NaiveDate::from_ymd_opt(2024, 3, 1).unwrap(),
            category_id: category.id,
            description: "Paper".into(),
            amount: Decimal::new(4250, 2),
            vat: Decimal::new(500, 2),
            payment_method_id: method.id,
            business_personal: BusinessOrPersonal::Business,
        };
        let stored = gateway.create_expense(&expense).await.unwrap();
        let fetched = gateway
            .get_expense(stored.transaction_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fetched.amount, expense.amount);
        assert_eq!(fetched.date, expense.date);
        assert_eq!(fetched.payment_method_id, method.id);
    }

    #[tokio::test]
    async fn test_http_gateway_unreachable_is_error() {
        let gateway = HttpGateway::new("http://127.0.0.1:1/");
        assert_eq!(gateway.base_url(), "http://127.0.0.1:1");
        assert!(matches!(
            gateway.list_categories().await.unwrap_err(),
            Error::Http(_)
        ));
    }
}
