use std::fmt;
use std::str::FromStr;

use chrono::{NaiveDate, NaiveTime};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use strum::{Display, EnumIter, EnumString};

use crate::error::{AppError, Result};

/// The fixed set of categories the expense form offers.
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Display,
    EnumString,
    EnumIter,
)]
pub enum CategoryName {
    Food,
    Transportation,
    Entertainment,
    Shopping,
    Bills,
    Healthcare,
    Education,
    Other,
}

/// Category as it arrives from the backend.
///
/// Names outside [`CategoryName`] are kept verbatim in `Unknown` so they
/// get their own bucket instead of being folded into `Other`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Category {
    Known(CategoryName),
    Unknown(String),
}

impl Category {
    pub fn is_known(&self) -> bool {
        matches!(self, Category::Known(_))
    }
}

impl From<CategoryName> for Category {
    fn from(name: CategoryName) -> Self {
        Category::Known(name)
    }
}

impl From<String> for Category {
    fn from(raw: String) -> Self {
        match CategoryName::from_str(&raw) {
            Ok(name) => Category::Known(name),
            Err(_) => Category::Unknown(raw),
        }
    }
}

impl From<&str> for Category {
    fn from(raw: &str) -> Self {
        Category::from(raw.to_string())
    }
}

impl From<Category> for String {
    fn from(category: Category) -> Self {
        category.to_string()
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Category::Known(name) => write!(f, "{}", name),
            Category::Unknown(raw) => f.write_str(raw),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    #[serde(rename = "_id", alias = "id")]
    pub id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub category: Category,
    #[serde(with = "wire_date")]
    pub date: NaiveDate,
    #[serde(with = "wire_time")]
    pub time: NaiveTime,
    /// Weekday name as stored by the backend, e.g. "Friday".
    #[serde(default)]
    pub day: String,
}

impl ExpenseRecord {
    pub fn from_draft(id: impl Into<String>, draft: &ExpenseDraft) -> Self {
        Self {
            id: id.into(),
            amount: draft.amount,
            category: draft.category.clone(),
            date: draft.date,
            time: draft.time,
            day: weekday_name(draft.date),
        }
    }

    /// Stored weekday, falling back to the one derived from `date`.
    pub fn weekday(&self) -> String {
        if self.day.is_empty() {
            weekday_name(self.date)
        } else {
            self.day.clone()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.id.trim().is_empty() {
            return Err(AppError::Validation("Expense id is required".into()));
        }
        if self.amount < Decimal::ZERO {
            return Err(AppError::Validation(format!(
                "Amount must not be negative: {}",
                self.amount
            )));
        }
        Ok(())
    }
}

/// Payload for creating or editing an expense.
#[derive(Debug, Clone, PartialEq)]
pub struct ExpenseDraft {
    pub amount: Decimal,
    pub category: Category,
    pub date: NaiveDate,
    pub time: NaiveTime,
}

impl ExpenseDraft {
    pub fn validate(&self) -> Result<()> {
        if self.amount <= Decimal::ZERO {
            return Err(AppError::Validation("Amount must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct DraftPayload<'a> {
    #[serde(with = "rust_decimal::serde::float")]
    amount: Decimal,
    category: &'a Category,
    #[serde(with = "wire_date")]
    date: NaiveDate,
    #[serde(with = "wire_time")]
    time: NaiveTime,
    day: String,
}

impl Serialize for ExpenseDraft {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        DraftPayload {
            amount: self.amount,
            category: &self.category,
            date: self.date,
            time: self.time,
            day: weekday_name(self.date),
        }
        .serialize(serializer)
    }
}

/// All expenses recorded on one calendar date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "DaywiseRow")]
pub struct DaywiseAggregate {
    #[serde(with = "wire_date")]
    pub date: NaiveDate,
    #[serde(default)]
    pub day: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total: Decimal,
    pub count: usize,
    /// Records for this date in the order they were received.
    #[serde(default)]
    pub expenses: Vec<ExpenseRecord>,
}

/// Grouped rows name the day in `date`, in the group key `_id`, or both.
#[derive(Deserialize)]
struct DaywiseRow {
    #[serde(default)]
    date: Option<String>,
    #[serde(default, rename = "_id")]
    group_id: Option<serde_json::Value>,
    #[serde(default)]
    day: String,
    #[serde(with = "rust_decimal::serde::float")]
    total: Decimal,
    count: usize,
    #[serde(default)]
    expenses: Vec<ExpenseRecord>,
}

impl TryFrom<DaywiseRow> for DaywiseAggregate {
    type Error = String;

    fn try_from(row: DaywiseRow) -> std::result::Result<Self, Self::Error> {
        let raw = match (row.date, row.group_id) {
            (Some(date), _) => date,
            (None, Some(serde_json::Value::String(key))) => key,
            (None, _) => return Err("daywise row has no date".to_string()),
        };
        let date = wire_date::parse(&raw)?;
        let day = if row.day.is_empty() {
            weekday_name(date)
        } else {
            row.day
        };

        Ok(Self {
            date,
            day,
            total: row.total,
            count: row.count,
            expenses: row.expenses,
        })
    }
}

impl DaywiseAggregate {
    pub fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            day: weekday_name(date),
            total: Decimal::ZERO,
            count: 0,
            expenses: Vec::new(),
        }
    }

    pub fn push(&mut self, record: ExpenseRecord) {
        self.total += record.amount;
        self.count += 1;
        self.expenses.push(record);
    }
}

pub fn weekday_name(date: NaiveDate) -> String {
    date.format("%A").to_string()
}

/// Dates travel as `YYYY-MM-DD`; full ISO timestamps are cut at the `T`.
pub(crate) mod wire_date {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&date.format(FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).map_err(de::Error::custom)
    }

    pub fn parse(raw: &str) -> Result<NaiveDate, String> {
        let date_part = raw.split('T').next().unwrap_or(raw).trim();
        NaiveDate::parse_from_str(date_part, FORMAT)
            .map_err(|e| format!("invalid date '{}': {}", raw, e))
    }
}

/// Times travel as `HH:MM`, seconds are accepted on input.
pub(crate) mod wire_time {
    use chrono::NaiveTime;
    use serde::{Deserialize, Deserializer, Serializer, de};

    pub fn serialize<S: Serializer>(time: &NaiveTime, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&time.format("%H:%M"))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveTime, D::Error> {
        let raw = String::deserialize(deserializer)?;
        NaiveTime::parse_from_str(&raw, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(&raw, "%H:%M"))
            .map_err(|e| de::Error::custom(format!("invalid time '{}': {}", raw, e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_record_from_backend_json() {
        let json = r#"{
            "_id": "65f1a",
            "amount": 25.5,
            "category": "Food",
            "date": "2024-03-01T00:00:00.000Z",
            "time": "12:30",
            "day": "Friday"
        }"#;

        let record: ExpenseRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "65f1a");
        assert_eq!(record.amount, dec!(25.5));
        assert_eq!(record.category, Category::Known(CategoryName::Food));
        assert_eq!(record.date, NaiveDate::from_ymd_opt(2024, 3, 1).unwrap());
        assert_eq!(record.time, NaiveTime::from_hms_opt(12, 30, 0).unwrap());
        assert_eq!(record.weekday(), "Friday");
    }

    #[test]
    fn test_unknown_category_is_kept_verbatim() {
        let json = r#"{"_id":"1","amount":3,"category":"Pets","date":"2024-03-01","time":"08:00:00"}"#;
        let record: ExpenseRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.category, Category::Unknown("Pets".into()));
        assert!(!record.category.is_known());
        assert_eq!(record.category.to_string(), "Pets");
        // Missing day is derived from the date
        assert_eq!(record.weekday(), "Friday");
    }

    #[test]
    fn test_missing_required_field_fails() {
        let json = r#"{"_id":"1","category":"Food","date":"2024-03-01","time":"08:00"}"#;
        let result: std::result::Result<ExpenseRecord, _> = serde_json::from_str(json);
        assert!(result.is_err());
    }

    #[test]
    fn test_draft_payload_carries_weekday() {
        let draft = ExpenseDraft {
            amount: dec!(12.75),
            category: CategoryName::Bills.into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            time: NaiveTime::from_hms_opt(9, 5, 0).unwrap(),
        };

        let value = serde_json::to_value(&draft).unwrap();
        assert_eq!(value["amount"], serde_json::json!(12.75));
        assert_eq!(value["category"], "Bills");
        assert_eq!(value["date"], "2024-03-02");
        assert_eq!(value["time"], "09:05");
        assert_eq!(value["day"], "Saturday");
    }

    #[test]
    fn test_draft_rejects_non_positive_amount() {
        let mut draft = ExpenseDraft {
            amount: Decimal::ZERO,
            category: CategoryName::Other.into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        };
        assert!(matches!(draft.validate(), Err(AppError::Validation(_))));

        draft.amount = dec!(0.01);
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn test_record_rejects_negative_amount() {
        let record = ExpenseRecord {
            id: "x".into(),
            amount: dec!(-1),
            category: CategoryName::Food.into(),
            date: NaiveDate::from_ymd_opt(2024, 3, 2).unwrap(),
            time: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
            day: String::new(),
        };
        assert!(matches!(record.validate(), Err(AppError::Validation(_))));
    }
}
