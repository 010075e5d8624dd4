//! Free-text expense parser.
//!
//! Grammar: `[/add[@bot]] <amount> [category] [note...]`, where the amount is digits
//! with at most one `.` or `,` decimal separator. Matching is case-insensitive.

use std::{str::FromStr, sync::OnceLock};

use regex::Regex;
use rust_decimal::Decimal;

use crate::domain::{ParsedExpense, UNCATEGORIZED};

fn expense_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        // A category glued to the amount (`500taxi`) may not start with a digit or
        // separator, so `1.2.3` is rejected instead of being split into `1.2` + `.3`.
        Regex::new(
            r"(?is)^(?:/add(?:@\S+)?(?:\s+|$))?([0-9]+(?:[.,][0-9]*)?)(?:\s+(\S+)|([^\s0-9.,]\S*))?(?:\s+(.*))?$",
        )
        .unwrap_or_else(|e| panic!("expense regex must compile: {e}"))
    })
}

/// Parse a free-text expense. Returns `None` when the text is not an expense.
pub fn parse_expense(text: &str) -> Option<ParsedExpense> {
    let caps = expense_re().captures(text.trim())?;

    let amount = parse_amount(caps.get(1)?.as_str())?;
    let category = caps
        .get(2)
        .or_else(|| caps.get(3))
        .map(|m| m.as_str().trim())
        .filter(|s| !s.is_empty())
        .unwrap_or(UNCATEGORIZED)
        .to_string();
    let note = caps
        .get(4)
        .map(|m| m.as_str().trim().to_string())
        .unwrap_or_default();

    Some(ParsedExpense {
        amount,
        category,
        note,
    })
}

fn parse_amount(raw: &str) -> Option<Decimal> {
    let normalized = raw.replace(',', ".");
    let normalized = normalized.strip_suffix('.').unwrap_or(&normalized);
    let amount = Decimal::from_str(normalized).ok()?;
    if amount.is_sign_negative() {
        return None;
    }
    Some(amount.normalize())
}
