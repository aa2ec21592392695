//! Boundary to the expense backend.
//!
//! [`ExpenseApi`] is the contract the controller talks to. [`HttpExpenseApi`]
//! implements it over the REST routes, unwrapping the `{ "data": ... }`
//! envelope every response uses.

use std::time::Duration;

use reqwest::{Client, Method, Response, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::aggregate::group_by_day;
use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::{DaywiseAggregate, ExpenseDraft, ExpenseRecord};
use crate::period::DateBounds;

#[allow(async_fn_in_trait)]
pub trait ExpenseApi {
    async fn fetch_expenses(&self) -> Result<Vec<ExpenseRecord>>;

    /// Days in `bounds` that have at least one expense, ascending.
    async fn fetch_expenses_by_date_range(
        &self,
        bounds: DateBounds,
    ) -> Result<Vec<DaywiseAggregate>>;

    async fn add_expense(&self, draft: &ExpenseDraft) -> Result<ExpenseRecord>;

    async fn update_expense(&self, id: &str, draft: &ExpenseDraft) -> Result<ExpenseRecord>;

    async fn delete_expense(&self, id: &str) -> Result<()>;
}

#[derive(Debug, Default)]
struct Tokens {
    access: Option<String>,
    refresh: Option<String>,
}

#[derive(Debug)]
pub struct HttpExpenseApi {
    client: Client,
    base_url: String,
    tokens: RwLock<Tokens>,
}

#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshedTokens {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// The add route has been seen to answer with a one element array.
#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    One(T),
    Many(Vec<T>),
}

impl<T> OneOrMany<T> {
    fn into_first(self) -> Option<T> {
        match self {
            OneOrMany::One(item) => Some(item),
            OneOrMany::Many(items) => items.into_iter().next(),
        }
    }
}

/// The daywise route returns grouped days, older backends raw records.
#[derive(Deserialize)]
#[serde(untagged)]
enum DaywisePayload {
    Days(Vec<DaywiseAggregate>),
    Records(Vec<ExpenseRecord>),
}

impl DaywisePayload {
    fn into_days(self) -> Vec<DaywiseAggregate> {
        match self {
            DaywisePayload::Days(mut days) => {
                days.sort_by_key(|d| d.date);
                days
            }
            DaywisePayload::Records(records) => group_by_day(&records),
        }
    }
}

impl HttpExpenseApi {
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            tokens: RwLock::new(Tokens {
                access: config.access_token.clone(),
                refresh: config.refresh_token.clone(),
            }),
        })
    }

    pub async fn set_tokens(&self, access: Option<String>, refresh: Option<String>) {
        let mut tokens = self.tokens.write().await;
        tokens.access = access;
        tokens.refresh = refresh;
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    async fn execute(
        &self,
        method: &Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<&serde_json::Value>,
    ) -> Result<Response> {
        let mut request = self.client.request(method.clone(), self.url(path));
        if !query.is_empty() {
            request = request.query(query);
        }
        if let Some(body) = body {
            request = request.json(body);
        }
        if let Some(token) = self.tokens.read().await.access.as_deref() {
            request = request.bearer_auth(token);
        }

        debug!("{} {}", method, path);
        Ok(request.send().await?)
    }

    /// Sends a request, refreshing the access token and retrying once on 401.
    async fn send(
        &self,
        method: Method,
        path: &str,
        query: &[(&str, String)],
        body: Option<serde_json::Value>,
    ) -> Result<Vec<u8>> {
        let response = self.execute(&method, path, query, body.as_ref()).await?;
        if response.status() != StatusCode::UNAUTHORIZED {
            return read_body(response).await;
        }

        warn!("{} {} was unauthorized, refreshing access token", method, path);
        self.refresh_access_token().await?;

        let retried = self.execute(&method, path, query, body.as_ref()).await?;
        if retried.status() == StatusCode::UNAUTHORIZED {
            self.set_tokens(None, None).await;
            return Err(AppError::Unauthorized(
                "Session expired. Please login again.".into(),
            ));
        }
        read_body(retried).await
    }

    async fn refresh_access_token(&self) -> Result<()> {
        let refresh = self.tokens.read().await.refresh.clone().ok_or_else(|| {
            AppError::Unauthorized("no refresh token available".into())
        })?;

        let response = self
            .client
            .post(self.url("users/refresh-token"))
            .json(&serde_json::json!({ "refreshToken": refresh }))
            .send()
            .await?;

        if !response.status().is_success() {
            self.set_tokens(None, None).await;
            return Err(AppError::Unauthorized(
                "Session expired. Please login again.".into(),
            ));
        }

        let bytes = response.bytes().await?;
        let refreshed: RefreshedTokens = unwrap_data(&bytes)?;

        let mut tokens = self.tokens.write().await;
        tokens.access = Some(refreshed.access_token);
        if let Some(next_refresh) = refreshed.refresh_token {
            tokens.refresh = Some(next_refresh);
        }
        debug!("access token refreshed");
        Ok(())
    }
}

async fn read_body(response: Response) -> Result<Vec<u8>> {
    let status = response.status();
    let bytes = response.bytes().await?;
    if status.is_success() {
        return Ok(bytes.to_vec());
    }

    let message = error_message(&bytes)
        .unwrap_or_else(|| format!("request failed with status {}", status));
    match status {
        StatusCode::NOT_FOUND => Err(AppError::NotFound(message)),
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            Err(AppError::Validation(message))
        }
        _ => Err(AppError::TransientFetch(message)),
    }
}

fn error_message(body: &[u8]) -> Option<String> {
    serde_json::from_slice::<ErrorEnvelope>(body)
        .ok()
        .map(|e| e.error.message)
        .filter(|m| !m.is_empty())
}

fn unwrap_data<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    let envelope: Envelope<T> = serde_json::from_slice(body)?;
    Ok(envelope.data)
}

fn to_body(draft: &ExpenseDraft) -> Result<serde_json::Value> {
    draft.validate()?;
    Ok(serde_json::to_value(draft)?)
}

impl ExpenseApi for HttpExpenseApi {
    async fn fetch_expenses(&self) -> Result<Vec<ExpenseRecord>> {
        let body = self
            .send(Method::GET, "expenses/get-expenses", &[], None)
            .await?;
        unwrap_data(&body)
    }

    async fn fetch_expenses_by_date_range(
        &self,
        bounds: DateBounds,
    ) -> Result<Vec<DaywiseAggregate>> {
        let query = [("startDate", bounds.start_iso()), ("endDate", bounds.end_iso())];
        let body = self
            .send(Method::GET, "expenses/daywise-expenses", &query, None)
            .await?;
        let payload: DaywisePayload = unwrap_data(&body)?;
        Ok(payload.into_days())
    }

    async fn add_expense(&self, draft: &ExpenseDraft) -> Result<ExpenseRecord> {
        let body = self
            .send(Method::POST, "expenses/add-expense", &[], Some(to_body(draft)?))
            .await?;
        let created: OneOrMany<ExpenseRecord> = unwrap_data(&body)?;
        created
            .into_first()
            .ok_or_else(|| AppError::Deserialization("add-expense returned no record".into()))
    }

    async fn update_expense(&self, id: &str, draft: &ExpenseDraft) -> Result<ExpenseRecord> {
        let path = format!("expenses/update-expense/{}", id);
        let body = self
            .send(Method::PUT, &path, &[], Some(to_body(draft)?))
            .await?;
        unwrap_data(&body)
    }

    async fn delete_expense(&self, id: &str) -> Result<()> {
        let path = format!("expenses/delete-expense/{}", id);
        self.send(Method::DELETE, &path, &[], None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_message_from_envelope() {
        let body = br#"{"success":false,"error":{"message":"Expense not found"}}"#;
        assert_eq!(error_message(body).as_deref(), Some("Expense not found"));
        assert_eq!(error_message(b"<html>bad gateway</html>"), None);
    }

    #[test]
    fn test_unwrap_data() {
        let body = br#"{"statusCode":200,"data":[{"_id":"1","amount":4,"category":"Food","date":"2024-03-01","time":"10:00"}]}"#;
        let records: Vec<ExpenseRecord> = unwrap_data(body).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].amount, dec!(4));

        let missing: Result<Vec<ExpenseRecord>> = unwrap_data(br#"{"message":"ok"}"#);
        assert!(matches!(missing, Err(AppError::Deserialization(_))));
    }

    #[test]
    fn test_daywise_payload_accepts_grouped_days() {
        let body = br#"{"data":[
            {"date":"2024-03-02","day":"Saturday","total":15.5,"count":1,"expenses":[]},
            {"date":"2024-03-01","day":"Friday","total":10,"count":2}
        ]}"#;
        let days = unwrap_data::<DaywisePayload>(body).unwrap().into_days();

        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(days[0].count, 2);
        assert_eq!(days[1].total, dec!(15.5));
    }

    #[test]
    fn test_daywise_rows_with_group_key_and_date() {
        let body = br#"{"data":[
            {"_id":"2024-03-01","date":"2024-03-01","day":"Friday","total":10,"count":1,"expenses":[]}
        ]}"#;
        let days = unwrap_data::<DaywisePayload>(body).unwrap().into_days();

        assert_eq!(days.len(), 1);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(days[0].total, dec!(10));
    }

    #[test]
    fn test_daywise_rows_keyed_only_by_group_id() {
        let body = br#"{"data":[
            {"_id":"2024-03-04T00:00:00.000Z","total":6.5,"count":2}
        ]}"#;
        let days = unwrap_data::<DaywisePayload>(body).unwrap().into_days();

        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2024, 3, 4).unwrap());
        assert_eq!(days[0].day, "Monday");
        assert_eq!(days[0].count, 2);
    }

    #[test]
    fn test_daywise_payload_groups_raw_records() {
        let body = br#"{"data":[
            {"_id":"a","amount":5,"category":"Food","date":"2024-03-02T00:00:00.000Z","time":"09:00"},
            {"_id":"b","amount":7,"category":"Bills","date":"2024-03-02T00:00:00.000Z","time":"18:00"},
            {"_id":"c","amount":1,"category":"Other","date":"2024-03-01","time":"07:30"}
        ]}"#;
        let days = unwrap_data::<DaywisePayload>(body).unwrap().into_days();

        assert_eq!(days.len(), 2);
        assert_eq!(days[1].total, dec!(12));
        assert_eq!(days[1].count, 2);
        assert_eq!(days[1].expenses[0].id, "a");
    }

    #[test]
    fn test_one_or_many_takes_first() {
        let one: OneOrMany<u32> = serde_json::from_str("3").unwrap();
        assert_eq!(one.into_first(), Some(3));
        let many: OneOrMany<u32> = serde_json::from_str("[4, 5]").unwrap();
        assert_eq!(many.into_first(), Some(4));
        let none: OneOrMany<u32> = serde_json::from_str("[]").unwrap();
        assert_eq!(none.into_first(), None);
    }

    #[test]
    fn test_url_joining() {
        let config = Config {
            api_base_url: "http://localhost:8000/api/v1/".into(),
            ..Config::default()
        };
        let api = HttpExpenseApi::new(&config).unwrap();
        assert_eq!(
            api.url("/expenses/get-expenses"),
            "http://localhost:8000/api/v1/expenses/get-expenses"
        );
    }
}
