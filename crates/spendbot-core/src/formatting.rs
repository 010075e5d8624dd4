//! User-facing text (Telegram HTML parse mode).

use chrono::NaiveDate;
use rust_decimal::{Decimal, RoundingStrategy};

use crate::{aggregate::Summary, domain::ExpenseRecord};

/// Escape HTML special characters for Telegram HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

/// Two decimal places, rounded half away from zero.
pub fn format_money(amount: Decimal) -> String {
    format!(
        "{:.2}",
        amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
    )
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReportKind {
    /// Requested by the user.
    OnDemand,
    /// Sent by the daily trigger.
    Scheduled,
}

/// Render a day's summary, keeping the output within `max_len` bytes by
/// collapsing trailing categories.
pub fn format_report(
    kind: ReportKind,
    day: NaiveDate,
    summary: &Summary,
    max_len: usize,
) -> String {
    if summary.is_empty() {
        return match kind {
            ReportKind::OnDemand => format!("No expenses for {day}."),
            ReportKind::Scheduled => format!("Daily report for {day}: no expenses ✅"),
        };
    }

    let heading = match kind {
        ReportKind::OnDemand => "Report for",
        ReportKind::Scheduled => "Daily report for",
    };
    let mut out = format!(
        "<b>{heading} {day}</b>\nTotal: <b>{}</b>\n\nBy category:",
        format_money(summary.total)
    );

    let count = summary.by_category.len();
    for (idx, c) in summary.by_category.iter().enumerate() {
        let line = format!(
            "\n- {}: {}",
            escape_html(&c.category),
            format_money(c.amount)
        );
        // Leave room for the "...and N more" tail.
        if out.len() + line.len() + 32 > max_len {
            out.push_str(&format!("\n...and {} more", count - idx));
            break;
        }
        out.push_str(&line);
    }
    out
}

/// Confirmation sent after an expense is stored.
pub fn format_added(expense: &ExpenseRecord) -> String {
    let mut out = format!(
        "Added: <b>{}</b> ({})",
        format_money(expense.amount),
        escape_html(&expense.category)
    );
    if !expense.note.is_empty() {
        out.push(' ');
        out.push_str(&escape_html(&expense.note));
    }
    out
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use super::*;
    use crate::aggregate::CategoryTotal;

    fn summary(items: &[(&str, &str)]) -> Summary {
        let by_category: Vec<_> = items
            .iter()
            .map(|(c, a)| CategoryTotal {
                category: c.to_string(),
                amount: Decimal::from_str(a).unwrap(),
            })
            .collect();
        let total = by_category.iter().map(|c| c.amount).sum();
        Summary { total, by_category }
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 4, 2).unwrap()
    }

    #[test]
    fn escapes_html() {
        let s = r#"<a href="x&y">"#;
        assert_eq!(escape_html(s), "&lt;a href=&quot;x&amp;y&quot;&gt;");
    }

    #[test]
    fn money_has_two_decimals() {
        assert_eq!(format_money(Decimal::from(800)), "800.00");
        assert_eq!(format_money(Decimal::from_str("12.5").unwrap()), "12.50");
        assert_eq!(format_money(Decimal::from_str("0.125").unwrap()), "0.13");
    }

    #[test]
    fn empty_day_has_distinct_message() {
        let s = Summary::default();
        assert_eq!(
            format_report(ReportKind::OnDemand, day(), &s, 4096),
            "No expenses for 2026-04-02."
        );
        assert!(format_report(ReportKind::Scheduled, day(), &s, 4096).contains("no expenses"));
    }

    #[test]
    fn report_lists_categories_in_order() {
        let s = summary(&[("taxi", "500"), ("food", "300")]);
        let text = format_report(ReportKind::OnDemand, day(), &s, 4096);
        assert!(text.starts_with("<b>Report for 2026-04-02</b>"));
        assert!(text.contains("Total: <b>800.00</b>"));
        let taxi = text.find("- taxi: 500.00").unwrap();
        let food = text.find("- food: 300.00").unwrap();
        assert!(taxi < food);
    }

    #[test]
    fn category_names_are_escaped() {
        let s = summary(&[("<script>", "1")]);
        let text = format_report(ReportKind::Scheduled, day(), &s, 4096);
        assert!(text.contains("- &lt;script&gt;: 1.00"));
        assert!(text.starts_with("<b>Daily report for"));
    }

    #[test]
    fn long_reports_are_collapsed() {
        let names: Vec<String> = (0..200).map(|i| format!("category-{i}")).collect();
        let items: Vec<(&str, &str)> = names.iter().map(|n| (n.as_str(), "1")).collect();
        let text = format_report(ReportKind::OnDemand, day(), &summary(&items), 500);
        assert!(text.len() <= 500);
        assert!(text.contains("more"));
    }

    #[test]
    fn added_confirmation_includes_note() {
        let e = ExpenseRecord {
            id: 1,
            user_id: crate::domain::UserId(1),
            amount: Decimal::from(300),
            category: "food".to_string(),
            note: "lunch".to_string(),
            created_at: day().and_hms_opt(12, 0, 0).unwrap(),
            utc_offset_secs: 0,
        };
        assert_eq!(format_added(&e), "Added: <b>300.00</b> (food) lunch");
    }
}
