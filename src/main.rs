use anyhow::Context;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use expense_lens::chart::{self, Canvas};
use expense_lens::{Config, ExpenseController, ExpenseStore, HttpExpenseApi, Period};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let period = match std::env::args().nth(1) {
        Some(selector) => Period::parse(&selector)?,
        None => Period::default(),
    };

    let config = Config::from_env()?;
    info!("Using expense API at {}", config.api_base_url);

    let api = HttpExpenseApi::new(&config)?;
    let mut controller = ExpenseController::new(api, ExpenseStore::new());

    controller
        .refresh()
        .await
        .context("could not load expenses")?;
    if let Err(e) = controller.load_period(period).await {
        warn!("Daywise breakdown unavailable: {}", e);
    }

    let store = controller.store();
    let categories = store.category_totals();
    info!(
        "All time: {} across {} expenses, this month {}",
        chart::format_amount(store.total_amount()),
        store.expenses().len(),
        chart::format_amount(store.current_month_total())
    );
    if let Some((top, _)) = categories.top_category() {
        info!(
            "{} categories, top {}, average {} per category",
            categories.category_count(),
            top,
            chart::format_amount(categories.average_per_category())
        );
    }
    for (category, amount) in categories.sorted_desc() {
        info!(
            "  {:<16} {:>12} {:>6}%",
            category.to_string(),
            chart::format_amount(amount),
            categories.percentage(&category)
        );
    }

    let summary = store.daywise_summary();
    info!(
        "{}: total {}, daily average {}, {} active days, highest {}",
        period.title(),
        chart::format_amount(summary.total_amount),
        chart::format_amount(summary.average_daily),
        summary.active_days(),
        chart::format_amount(summary.highest_spending_day.total)
    );
    info!(
        "{} transactions, {}% active days, {} pace",
        summary.total_transactions(),
        summary.consistency_percent(),
        summary.pace()
    );

    let bars = chart::build_bars(&summary.daywise, &Canvas::default());
    for bar in &bars {
        info!(
            "  {:>6} {:>10} h={:.1}",
            bar.date_label,
            chart::format_amount(bar.total),
            bar.height
        );
    }

    Ok(())
}
