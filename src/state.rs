use std::collections::HashSet;

use chrono::{Datelike, Local, NaiveDate};
use rust_decimal::Decimal;

use crate::aggregate::{CategoryTotals, ExpenseSummary, aggregate};
use crate::error::{AppError, Result};
use crate::models::{DaywiseAggregate, ExpenseRecord};
use crate::period::{DateBounds, Period};

/// Round trips that may only be in flight once at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Fetch,
    Add,
    Update,
    Delete,
}

impl Operation {
    pub fn title(&self) -> &'static str {
        match self {
            Self::Fetch => "fetch expenses",
            Self::Add => "add expense",
            Self::Update => "update expense",
            Self::Delete => "delete expense",
        }
    }
}

/// Issued for each daywise request; only the newest one may be applied.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestTicket {
    seq: u64,
    pub period: Period,
    pub bounds: DateBounds,
}

impl RequestTicket {
    pub fn seq(&self) -> u64 {
        self.seq
    }
}

/// Fetched expenses and everything derived from them.
///
/// Every mutation goes through [`ExpenseStore::recompute`], so the
/// derived fields always describe the current collection.
#[derive(Debug)]
pub struct ExpenseStore {
    expenses: Vec<ExpenseRecord>,
    total_amount: Decimal,
    current_month_expenses: Vec<ExpenseRecord>,
    category_totals: CategoryTotals,
    /// Pins the date that decides which month counts as current.
    /// Unset means today's local date, read on every recompute.
    reference_date: Option<NaiveDate>,

    // Daywise chart state
    period: Period,
    period_bounds: Option<DateBounds>,
    daywise: ExpenseSummary,
    latest_seq: u64,
    daywise_loading: bool,

    in_flight: HashSet<Operation>,
    error: Option<String>,
}

impl Default for ExpenseStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpenseStore {
    pub fn new() -> Self {
        Self {
            expenses: Vec::new(),
            total_amount: Decimal::ZERO,
            current_month_expenses: Vec::new(),
            category_totals: CategoryTotals::default(),
            reference_date: None,
            period: Period::default(),
            period_bounds: None,
            daywise: ExpenseSummary::default(),
            latest_seq: 0,
            daywise_loading: false,
            in_flight: HashSet::new(),
            error: None,
        }
    }

    pub fn with_reference_date(reference_date: NaiveDate) -> Self {
        Self {
            reference_date: Some(reference_date),
            ..Self::new()
        }
    }

    pub fn expenses(&self) -> &[ExpenseRecord] {
        &self.expenses
    }

    pub fn total_amount(&self) -> Decimal {
        self.total_amount
    }

    pub fn current_month_expenses(&self) -> &[ExpenseRecord] {
        &self.current_month_expenses
    }

    pub fn current_month_total(&self) -> Decimal {
        self.current_month_expenses.iter().map(|e| e.amount).sum()
    }

    pub fn category_totals(&self) -> &CategoryTotals {
        &self.category_totals
    }

    pub fn reference_date(&self) -> NaiveDate {
        self.reference_date.unwrap_or_else(|| Local::now().date_naive())
    }

    /// Full summary of the whole collection, computed on demand.
    pub fn overview(&self) -> ExpenseSummary {
        aggregate(&self.expenses)
    }

    pub fn find(&self, id: &str) -> Option<&ExpenseRecord> {
        self.expenses.iter().find(|e| e.id == id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.find(id).is_some()
    }

    pub fn set_reference_date(&mut self, date: Option<NaiveDate>) {
        self.reference_date = date;
        self.recompute();
    }

    /// Replaces the collection. On error the previous collection stays.
    pub fn set_expenses(&mut self, records: Vec<ExpenseRecord>) -> Result<()> {
        for record in &records {
            record.validate()?;
        }
        self.expenses = records;
        self.recompute();
        Ok(())
    }

    pub fn add_expense(&mut self, record: ExpenseRecord) -> Result<()> {
        record.validate()?;
        if self.contains(&record.id) {
            return Err(AppError::Validation(format!(
                "Expense {} already exists",
                record.id
            )));
        }
        self.expenses.push(record);
        self.recompute();
        Ok(())
    }

    pub fn update_expense(&mut self, record: ExpenseRecord) -> Result<()> {
        record.validate()?;
        let slot = self
            .expenses
            .iter_mut()
            .find(|e| e.id == record.id)
            .ok_or_else(|| AppError::NotFound(record.id.clone()))?;
        *slot = record;
        self.recompute();
        Ok(())
    }

    pub fn remove_expense(&mut self, id: &str) -> Result<ExpenseRecord> {
        let index = self
            .expenses
            .iter()
            .position(|e| e.id == id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        let removed = self.expenses.remove(index);
        self.recompute();
        Ok(removed)
    }

    fn recompute(&mut self) {
        self.total_amount = self.expenses.iter().map(|e| e.amount).sum();

        let today = self.reference_date();
        let (year, month) = (today.year(), today.month());
        self.current_month_expenses = self
            .expenses
            .iter()
            .filter(|e| e.date.year() == year && e.date.month() == month)
            .cloned()
            .collect();

        self.category_totals = CategoryTotals::from_records(&self.expenses);
    }

    // In-flight tracking

    pub fn begin_operation(&mut self, op: Operation) -> Result<()> {
        if !self.in_flight.insert(op) {
            return Err(AppError::InFlight(op.title()));
        }
        self.error = None;
        Ok(())
    }

    pub fn finish_operation(&mut self, op: Operation) {
        self.in_flight.remove(&op);
    }

    pub fn is_in_flight(&self, op: Operation) -> bool {
        self.in_flight.contains(&op)
    }

    pub fn is_loading(&self) -> bool {
        !self.in_flight.is_empty()
    }

    // Daywise chart

    pub fn period(&self) -> Period {
        self.period
    }

    pub fn period_bounds(&self) -> Option<DateBounds> {
        self.period_bounds
    }

    pub fn daywise(&self) -> &[DaywiseAggregate] {
        &self.daywise.daywise
    }

    pub fn daywise_summary(&self) -> &ExpenseSummary {
        &self.daywise
    }

    pub fn is_daywise_loading(&self) -> bool {
        self.daywise_loading
    }

    pub fn begin_daywise_request(&mut self, period: Period, bounds: DateBounds) -> RequestTicket {
        self.latest_seq += 1;
        self.daywise_loading = true;
        self.error = None;
        RequestTicket {
            seq: self.latest_seq,
            period,
            bounds,
        }
    }

    /// Applies a daywise response if `ticket` is the newest one issued.
    ///
    /// Returns `Ok(false)` for a superseded ticket, whose result is dropped
    /// whether it succeeded or failed. A failure for the newest ticket is
    /// recorded and returned, and the previous daywise data is kept.
    pub fn complete_daywise_request(
        &mut self,
        ticket: RequestTicket,
        result: Result<Vec<DaywiseAggregate>>,
    ) -> Result<bool> {
        if ticket.seq != self.latest_seq {
            return Ok(false);
        }

        self.daywise_loading = false;
        match result {
            Ok(days) => {
                self.daywise = ExpenseSummary::from_days(days);
                self.period = ticket.period;
                self.period_bounds = Some(ticket.bounds);
                Ok(true)
            }
            Err(e) => {
                self.record_failure(&e);
                Err(e)
            }
        }
    }

    // Errors

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn record_failure(&mut self, err: &AppError) {
        self.error = Some(err.to_string());
    }

    pub fn clear_error(&mut self) {
        self.error = None;
    }
}
