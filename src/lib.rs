//! Derived analytics for a personal expense tracker.
//!
//! Turns the expense records fetched from the backend into totals,
//! per-day and per-category breakdowns, and bar chart geometry, and keeps
//! them in an [`ExpenseStore`] that is recomputed on every change.

pub mod aggregate;
pub mod api;
pub mod chart;
pub mod config;
pub mod error;
pub mod models;
pub mod period;
pub mod service;
pub mod state;

pub use aggregate::{CategoryTotals, ExpenseSummary, SpendingPace, SpendingPeak, aggregate};
pub use api::{ExpenseApi, HttpExpenseApi};
pub use chart::{BarGeometry, Canvas, build_bars};
pub use config::Config;
pub use error::{AppError, Result};
pub use models::{Category, CategoryName, DaywiseAggregate, ExpenseDraft, ExpenseRecord};
pub use period::{DateBounds, Period};
pub use service::ExpenseController;
pub use state::{ExpenseStore, Operation, RequestTicket};
