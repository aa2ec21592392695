//! Reduces expense records into the totals and per-day groupings the
//! dashboard and the daywise chart display.
//!
//! Everything here is a pure function of its input. Empty input yields a
//! zeroed [`ExpenseSummary`] rather than an error.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use strum::Display;

use crate::models::{Category, DaywiseAggregate, ExpenseRecord};

/// Summed amount per category.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotals(BTreeMap<Category, Decimal>);

impl CategoryTotals {
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ExpenseRecord>) -> Self {
        let mut totals = BTreeMap::new();
        for record in records {
            *totals.entry(record.category.clone()).or_insert(Decimal::ZERO) += record.amount;
        }
        Self(totals)
    }

    pub fn get(&self, category: &Category) -> Decimal {
        self.0.get(category).copied().unwrap_or(Decimal::ZERO)
    }

    pub fn total(&self) -> Decimal {
        self.0.values().copied().sum()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Category, &Decimal)> {
        self.0.iter()
    }

    /// Largest amount first; equal amounts keep category order.
    pub fn sorted_desc(&self) -> Vec<(Category, Decimal)> {
        let mut entries: Vec<(Category, Decimal)> =
            self.0.iter().map(|(c, a)| (c.clone(), *a)).collect();
        entries.sort_by(|a, b| b.1.cmp(&a.1));
        entries
    }

    /// Share of the overall total in percent, one decimal place.
    pub fn percentage(&self, category: &Category) -> Decimal {
        let total = self.total();
        if total.is_zero() {
            return Decimal::ZERO;
        }
        (self.get(category) / total * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(1, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn category_count(&self) -> usize {
        self.0.len()
    }

    /// The `n` largest categories, as listed in the top-categories panel.
    pub fn top(&self, n: usize) -> Vec<(Category, Decimal)> {
        let mut entries = self.sorted_desc();
        entries.truncate(n);
        entries
    }

    pub fn top_category(&self) -> Option<(Category, Decimal)> {
        self.sorted_desc().into_iter().next()
    }

    /// Overall total spread evenly over the categories present.
    pub fn average_per_category(&self) -> Decimal {
        if self.0.is_empty() {
            return Decimal::ZERO;
        }
        self.total() / Decimal::from(self.0.len())
    }
}

/// Tier of the average daily spend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
pub enum SpendingPace {
    High,
    Moderate,
    Conservative,
}

impl SpendingPace {
    const HIGH_ABOVE: Decimal = Decimal::from_parts(50, 0, 0, false, 0);
    const MODERATE_ABOVE: Decimal = Decimal::from_parts(25, 0, 0, false, 0);

    pub fn from_average(average_daily: Decimal) -> Self {
        if average_daily > Self::HIGH_ABOVE {
            SpendingPace::High
        } else if average_daily > Self::MODERATE_ABOVE {
            SpendingPace::Moderate
        } else {
            SpendingPace::Conservative
        }
    }
}

/// Day with the largest total, or a zero sentinel when there are no days.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpendingPeak {
    pub date: Option<NaiveDate>,
    pub day: Option<String>,
    pub total: Decimal,
    pub count: usize,
}

impl From<&DaywiseAggregate> for SpendingPeak {
    fn from(day: &DaywiseAggregate) -> Self {
        Self {
            date: Some(day.date),
            day: Some(day.day.clone()),
            total: day.total,
            count: day.count,
        }
    }
}

const CONSISTENCY_WINDOW_DAYS: Decimal = Decimal::from_parts(30, 0, 0, false, 0);

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExpenseSummary {
    pub total_amount: Decimal,
    /// Total divided by the number of days that have at least one record.
    pub average_daily: Decimal,
    pub category_totals: CategoryTotals,
    /// Ascending by date.
    pub daywise: Vec<DaywiseAggregate>,
    pub highest_spending_day: SpendingPeak,
}

impl ExpenseSummary {
    pub fn active_days(&self) -> usize {
        self.daywise.len()
    }

    /// Days with spending against a 30 day month, as a whole percent.
    ///
    /// Not capped, so a 31 day period with spending every day reads 103.
    pub fn consistency_percent(&self) -> Decimal {
        (Decimal::from(self.active_days()) / CONSISTENCY_WINDOW_DAYS * Decimal::ONE_HUNDRED)
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
    }

    pub fn pace(&self) -> SpendingPace {
        SpendingPace::from_average(self.average_daily)
    }

    pub fn total_transactions(&self) -> usize {
        self.daywise.iter().map(|d| d.count).sum()
    }

    /// Summarizes days that were already grouped, e.g. by the backend.
    ///
    /// Category totals are taken from each day's expense list, so days
    /// delivered without their records contribute only to the totals.
    pub fn from_days(mut daywise: Vec<DaywiseAggregate>) -> Self {
        daywise.sort_by_key(|d| d.date);

        let total_amount: Decimal = daywise.iter().map(|d| d.total).sum();
        let active = daywise.iter().filter(|d| d.count > 0).count();
        let average_daily = if active == 0 {
            Decimal::ZERO
        } else {
            total_amount / Decimal::from(active)
        };

        let category_totals =
            CategoryTotals::from_records(daywise.iter().flat_map(|d| d.expenses.iter()));

        Self {
            total_amount,
            average_daily,
            category_totals,
            highest_spending_day: highest_day(&daywise),
            daywise,
        }
    }
}

/// Groups records by date and computes the summary figures.
pub fn aggregate(records: &[ExpenseRecord]) -> ExpenseSummary {
    let total_amount: Decimal = records.iter().map(|r| r.amount).sum();
    let daywise = group_by_day(records);

    let average_daily = if daywise.is_empty() {
        Decimal::ZERO
    } else {
        total_amount / Decimal::from(daywise.len())
    };

    ExpenseSummary {
        total_amount,
        average_daily,
        category_totals: CategoryTotals::from_records(records),
        highest_spending_day: highest_day(&daywise),
        daywise,
    }
}

/// One aggregate per distinct date, ascending. Records keep input order.
pub fn group_by_day(records: &[ExpenseRecord]) -> Vec<DaywiseAggregate> {
    let mut days: BTreeMap<NaiveDate, DaywiseAggregate> = BTreeMap::new();
    for record in records {
        days.entry(record.date)
            .or_insert_with(|| DaywiseAggregate::empty(record.date))
            .push(record.clone());
    }
    days.into_values().collect()
}

/// Earliest date wins a tie because later days must be strictly larger.
fn highest_day(daywise: &[DaywiseAggregate]) -> SpendingPeak {
    let mut peak: Option<&DaywiseAggregate> = None;
    for day in daywise {
        match peak {
            Some(best) if day.total <= best.total => {}
            _ => peak = Some(day),
        }
    }
    peak.map(SpendingPeak::from).unwrap_or_default()
}
