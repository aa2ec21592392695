use chrono::{DateTime, Local, TimeZone};
use tracing::{info, warn};

use crate::api::ExpenseApi;
use crate::error::{AppError, Result};
use crate::models::{DaywiseAggregate, ExpenseDraft, ExpenseRecord};
use crate::period::Period;
use crate::state::{ExpenseStore, Operation, RequestTicket};

/// Runs round trips against the backend and applies confirmed results
/// to the local [`ExpenseStore`].
///
/// The store is only mutated after the backend has accepted a change.
/// Failures are logged and remembered on the store, and the previous
/// aggregates stay in place.
///
/// Mutations take `&mut self` and so run one at a time per controller.
/// The store's in-flight set still rejects a second submission of the
/// same kind while one is pending, e.g. when a caller marks an operation
/// busy through [`Self::store_mut`] before its own round trip. Daywise
/// loads can overlap through the split begin/fetch/complete methods.
pub struct ExpenseController<A: ExpenseApi> {
    api: A,
    store: ExpenseStore,
}

impl<A: ExpenseApi> ExpenseController<A> {
    pub fn new(api: A, store: ExpenseStore) -> Self {
        Self { api, store }
    }

    pub fn store(&self) -> &ExpenseStore {
        &self.store
    }

    pub fn store_mut(&mut self) -> &mut ExpenseStore {
        &mut self.store
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn into_parts(self) -> (A, ExpenseStore) {
        (self.api, self.store)
    }

    /// Replaces the local collection with the backend's.
    pub async fn refresh(&mut self) -> Result<()> {
        self.store.begin_operation(Operation::Fetch)?;
        info!("Fetching expenses");

        let result = self.api.fetch_expenses().await;
        let outcome = result.and_then(|records| {
            let count = records.len();
            self.store.set_expenses(records)?;
            Ok(count)
        });

        let count = self.settle(Operation::Fetch, outcome)?;
        info!(
            "Loaded {} expenses, total {}",
            count,
            self.store.total_amount()
        );
        Ok(())
    }

    /// Loads the daywise breakdown for `period` as seen from the current time.
    pub async fn load_period(&mut self, period: Period) -> Result<bool> {
        self.load_period_at(period, &Local::now()).await
    }

    /// Returns `Ok(false)` when a newer request superseded this one.
    pub async fn load_period_at<Tz: TimeZone>(
        &mut self,
        period: Period,
        now: &DateTime<Tz>,
    ) -> Result<bool> {
        let ticket = self.begin_period_load(period, now);
        let result = self.fetch_period(&ticket).await;
        self.complete_period_load(ticket, result)
    }

    /// Issues a ticket for a daywise load. Callers that keep several loads
    /// in flight fetch each with [`Self::fetch_period`] and hand every
    /// result to [`Self::complete_period_load`] in whatever order they
    /// arrive.
    pub fn begin_period_load<Tz: TimeZone>(
        &mut self,
        period: Period,
        now: &DateTime<Tz>,
    ) -> RequestTicket {
        let bounds = period.resolve(now);
        let ticket = self.store.begin_daywise_request(period, bounds);
        info!(
            "Fetching daywise expenses for {} ({}) #{}",
            period.title(),
            bounds,
            ticket.seq()
        );
        ticket
    }

    pub async fn fetch_period(&self, ticket: &RequestTicket) -> Result<Vec<DaywiseAggregate>> {
        self.api.fetch_expenses_by_date_range(ticket.bounds).await
    }

    /// Applies `result` only if `ticket` is still the newest load.
    pub fn complete_period_load(
        &mut self,
        ticket: RequestTicket,
        result: Result<Vec<DaywiseAggregate>>,
    ) -> Result<bool> {
        match self.store.complete_daywise_request(ticket, result) {
            Ok(true) => {
                info!(
                    "Applied {} days for {}",
                    self.store.daywise().len(),
                    ticket.period.title()
                );
                Ok(true)
            }
            Ok(false) => {
                warn!("Discarded stale daywise response #{}", ticket.seq());
                Ok(false)
            }
            Err(e) => {
                warn!("Daywise fetch for {} failed: {}", ticket.period.title(), e);
                Err(e)
            }
        }
    }

    pub async fn add_expense(&mut self, draft: ExpenseDraft) -> Result<ExpenseRecord> {
        draft.validate()?;
        self.store.begin_operation(Operation::Add)?;

        let result = self.api.add_expense(&draft).await;
        let outcome = result.and_then(|created| {
            self.store.add_expense(created.clone())?;
            Ok(created)
        });

        let created = self.settle(Operation::Add, outcome)?;
        info!("Added expense {} ({})", created.id, created.amount);
        Ok(created)
    }

    pub async fn update_expense(&mut self, id: &str, draft: ExpenseDraft) -> Result<ExpenseRecord> {
        draft.validate()?;
        if !self.store.contains(id) {
            return Err(AppError::NotFound(id.to_string()));
        }
        self.store.begin_operation(Operation::Update)?;

        let result = self.api.update_expense(id, &draft).await;
        let outcome = result.and_then(|updated| {
            self.store.update_expense(updated.clone())?;
            Ok(updated)
        });

        let updated = self.settle(Operation::Update, outcome)?;
        info!("Updated expense {}", updated.id);
        Ok(updated)
    }

    pub async fn delete_expense(&mut self, id: &str) -> Result<ExpenseRecord> {
        if !self.store.contains(id) {
            return Err(AppError::NotFound(id.to_string()));
        }
        self.store.begin_operation(Operation::Delete)?;

        let result = self.api.delete_expense(id).await;
        let outcome = result.and_then(|()| self.store.remove_expense(id));

        let removed = self.settle(Operation::Delete, outcome)?;
        info!("Deleted expense {}", removed.id);
        Ok(removed)
    }

    fn settle<T>(&mut self, op: Operation, outcome: Result<T>) -> Result<T> {
        self.store.finish_operation(op);
        if let Err(e) = &outcome {
            warn!("Failed to {}: {}", op.title(), e);
            self.store.record_failure(e);
        }
        outcome
    }
}
