//! Bar geometry for the daywise spending chart.
//!
//! Coordinates are in a fixed logical canvas; the presentation layer
//! scales them to whatever it draws on. No colors are chosen here, only
//! an intensity in `0.0..=1.0` per bar.

use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::models::DaywiseAggregate;

pub const MIN_BAR_WIDTH: f64 = 20.0;
pub const MAX_BAR_WIDTH: f64 = 60.0;
pub const BAR_GAP: f64 = 8.0;

/// Above this many days labels are rotated.
const ROTATE_LABELS_ABOVE: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Canvas {
    pub width: f64,
    pub height: f64,
    pub left_margin: f64,
    pub right_margin: f64,
    pub top_margin: f64,
    pub bottom_margin: f64,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            width: 800.0,
            height: 280.0,
            left_margin: 80.0,
            right_margin: 50.0,
            top_margin: 40.0,
            bottom_margin: 40.0,
        }
    }
}

impl Canvas {
    pub fn plot_width(&self) -> f64 {
        (self.width - self.left_margin - self.right_margin).max(0.0)
    }

    pub fn plot_height(&self) -> f64 {
        (self.height - self.top_margin - self.bottom_margin).max(0.0)
    }

    /// y coordinate of the zero line.
    pub fn baseline(&self) -> f64 {
        self.top_margin + self.plot_height()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarGeometry {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    /// Horizontal centre of the bar, where its labels are anchored.
    pub label_x: f64,
    pub date_label: String,
    pub full_label: String,
    /// Three letter weekday, only when there is room for it.
    pub weekday_label: Option<String>,
    pub rotate_label: bool,
    pub color_intensity: f64,
    pub total: Decimal,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GridLine {
    pub y: f64,
    pub value: Decimal,
    pub label: String,
}

pub fn max_total(daywise: &[DaywiseAggregate]) -> Decimal {
    daywise
        .iter()
        .map(|d| d.total)
        .max()
        .unwrap_or(Decimal::ZERO)
        .max(Decimal::ZERO)
}

/// Lays the days out left to right in the order given.
pub fn build_bars(daywise: &[DaywiseAggregate], canvas: &Canvas) -> Vec<BarGeometry> {
    if daywise.is_empty() {
        return Vec::new();
    }

    let day_count = daywise.len();
    let max = max_total(daywise).to_f64().unwrap_or(0.0);
    let slot = canvas.plot_width() / day_count as f64;
    let bar_width = (slot - BAR_GAP).clamp(MIN_BAR_WIDTH, MAX_BAR_WIDTH);
    let rotate_label = day_count > ROTATE_LABELS_ABOVE;

    daywise
        .iter()
        .enumerate()
        .map(|(index, day)| {
            let ratio = if max > 0.0 {
                (day.total.to_f64().unwrap_or(0.0) / max).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let height = ratio * canvas.plot_height();
            let x = canvas.left_margin + index as f64 * slot + (slot - bar_width) / 2.0;

            BarGeometry {
                x,
                y: canvas.baseline() - height,
                width: bar_width,
                height,
                label_x: x + bar_width / 2.0,
                date_label: date_label(day, day_count),
                full_label: day.date.format("%A, %B %-d, %Y").to_string(),
                weekday_label: (!rotate_label).then(|| short_weekday(day)),
                rotate_label,
                color_intensity: ratio,
                total: day.total,
                count: day.count,
            }
        })
        .collect()
}

/// Guide lines from the top of the plot (max) down to the baseline (zero).
pub fn grid_lines(max_total: Decimal, canvas: &Canvas) -> Vec<GridLine> {
    [0u32, 25, 50, 75, 100]
        .into_iter()
        .map(|pct| {
            let fraction = Decimal::from(pct) / Decimal::ONE_HUNDRED;
            let value = max_total * (Decimal::ONE - fraction);
            GridLine {
                y: canvas.top_margin + f64::from(pct) / 100.0 * canvas.plot_height(),
                label: format_amount(value),
                value,
            }
        })
        .collect()
}

/// Formats an amount as dollars with two decimals, e.g. `$1234.50`.
pub fn format_amount(amount: Decimal) -> String {
    format!(
        "${:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

fn date_label(day: &DaywiseAggregate, day_count: usize) -> String {
    let format = match day_count {
        n if n > 20 => "%-d",
        n if n > 10 => "%-m/%-d",
        _ => "%b %-d",
    };
    day.date.format(format).to_string()
}

fn short_weekday(day: &DaywiseAggregate) -> String {
    if day.day.is_empty() {
        day.date.format("%a").to_string()
    } else {
        day.day.chars().take(3).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate};
    use rust_decimal_macros::dec;

    const EPSILON: f64 = 1e-9;

    fn day(date: &str, total: Decimal) -> DaywiseAggregate {
        let mut aggregate =
            DaywiseAggregate::empty(NaiveDate::parse_from_str(date, "%Y-%m-%d").unwrap());
        aggregate.total = total;
        aggregate.count = 1;
        aggregate
    }

    fn days(count: usize) -> Vec<DaywiseAggregate> {
        let start = NaiveDate::from_ymd_opt(2024, 3, 1).unwrap();
        (0..count)
            .map(|i| {
                let date = start + Duration::days(i as i64);
                day(&date.format("%Y-%m-%d").to_string(), Decimal::from(i + 1))
            })
            .collect()
    }

    #[test]
    fn test_empty_input_has_no_bars() {
        assert!(build_bars(&[], &Canvas::default()).is_empty());
    }

    #[test]
    fn test_height_is_proportional_to_total() {
        let daywise = vec![day("2024-03-01", dec!(10)), day("2024-03-02", dec!(40))];
        let bars = build_bars(&daywise, &Canvas::default());

        assert_eq!(bars.len(), 2);
        assert!((bars[1].height - 4.0 * bars[0].height).abs() < EPSILON);
        assert!((bars[1].height - 200.0).abs() < EPSILON);
        assert!((bars[0].y - 190.0).abs() < EPSILON);
        assert!((bars[1].y - 40.0).abs() < EPSILON);
        assert!((bars[0].color_intensity - 0.25).abs() < EPSILON);
        assert!((bars[1].color_intensity - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_bars_are_centred_in_even_slots() {
        let daywise = vec![day("2024-03-01", dec!(10)), day("2024-03-02", dec!(40))];
        let bars = build_bars(&daywise, &Canvas::default());

        // 670 / 2 = 335 per slot, bar clamped to 60
        assert!((bars[0].width - MAX_BAR_WIDTH).abs() < EPSILON);
        assert!((bars[0].x - (80.0 + 137.5)).abs() < EPSILON);
        assert!((bars[1].x - (80.0 + 335.0 + 137.5)).abs() < EPSILON);
        assert!((bars[0].label_x - (80.0 + 167.5)).abs() < EPSILON);
        assert!(bars[0].x < bars[1].x);
    }

    #[test]
    fn test_bar_width_clamps_to_minimum() {
        let bars = build_bars(&days(31), &Canvas::default());
        // 670 / 31 - 8 is about 13.6
        assert!(bars.iter().all(|b| (b.width - MIN_BAR_WIDTH).abs() < EPSILON));
    }

    #[test]
    fn test_bar_width_between_limits() {
        let bars = build_bars(&days(15), &Canvas::default());
        let expected = 670.0 / 15.0 - BAR_GAP;
        assert!((bars[0].width - expected).abs() < EPSILON);
    }

    #[test]
    fn test_all_zero_totals_have_zero_height() {
        let daywise = vec![day("2024-03-01", dec!(0)), day("2024-03-02", dec!(0))];
        let bars = build_bars(&daywise, &Canvas::default());

        assert!(bars.iter().all(|b| b.height == 0.0 && b.color_intensity == 0.0));
        assert!(bars.iter().all(|b| (b.y - 240.0).abs() < EPSILON));
    }

    #[test]
    fn test_label_density() {
        let few = build_bars(&days(7), &Canvas::default());
        assert_eq!(few[0].date_label, "Mar 1");
        assert_eq!(few[0].weekday_label.as_deref(), Some("Fri"));
        assert!(!few[0].rotate_label);

        let medium = build_bars(&days(11), &Canvas::default());
        assert_eq!(medium[10].date_label, "3/11");
        assert!(!medium[0].rotate_label);

        let rotated = build_bars(&days(13), &Canvas::default());
        assert_eq!(rotated[0].date_label, "3/1");
        assert!(rotated[0].rotate_label);
        assert_eq!(rotated[0].weekday_label, None);

        let many = build_bars(&days(21), &Canvas::default());
        assert_eq!(many[20].date_label, "21");
    }

    #[test]
    fn test_ten_days_keeps_month_names() {
        let bars = build_bars(&days(10), &Canvas::default());
        assert_eq!(bars[9].date_label, "Mar 10");
    }

    #[test]
    fn test_full_label() {
        let bars = build_bars(&[day("2024-03-01", dec!(5))], &Canvas::default());
        assert_eq!(bars[0].full_label, "Friday, March 1, 2024");
    }

    #[test]
    fn test_grid_lines_run_from_max_to_zero() {
        let lines = grid_lines(dec!(80), &Canvas::default());

        assert_eq!(lines.len(), 5);
        assert_eq!(lines[0].value, dec!(80));
        assert_eq!(lines[0].label, "$80.00");
        assert!((lines[0].y - 40.0).abs() < EPSILON);
        assert_eq!(lines[2].value, dec!(40));
        assert_eq!(lines[4].value, Decimal::ZERO);
        assert!((lines[4].y - 240.0).abs() < EPSILON);
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(dec!(1234.5)), "$1234.50");
        assert_eq!(format_amount(dec!(0)), "$0.00");
        assert_eq!(format_amount(dec!(3.456)), "$3.46");
    }

    #[test]
    fn test_format_amount_rounds_half_cents_up() {
        assert_eq!(format_amount(dec!(0.125)), "$0.13");
        assert_eq!(format_amount(dec!(2.675)), "$2.68");
        assert_eq!(format_amount(dec!(0.135)), "$0.14");
    }
}
