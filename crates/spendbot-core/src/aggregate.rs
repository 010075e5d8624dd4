//! Reduction of a day's expense records into a total and per-category sums.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::{
    domain::{ExpenseRecord, UNCATEGORIZED},
    Error, Result,
};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CategoryTotal {
    pub category: String,
    pub amount: Decimal,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Summary {
    pub total: Decimal,
    /// Ordered by first appearance in the input.
    pub by_category: Vec<CategoryTotal>,
}

impl Summary {
    pub fn category(&self, name: &str) -> Option<Decimal> {
        self.by_category
            .iter()
            .find(|c| c.category == name)
            .map(|c| c.amount)
    }

    pub fn is_empty(&self) -> bool {
        self.total.is_zero()
    }
}

/// Sum `records`. The caller selects the user/day window.
///
/// Fails with `AmountOverflow` when a sum leaves the `Decimal` range.
pub fn summarize(records: &[ExpenseRecord]) -> Result<Summary> {
    let mut total = Decimal::ZERO;
    let mut by_category: Vec<CategoryTotal> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for r in records {
        total = checked_sum(total, r.amount, "total")?;

        let category = normalize_category(&r.category);
        match index.get(category) {
            Some(&i) => {
                let entry = &mut by_category[i];
                entry.amount = checked_sum(entry.amount, r.amount, category)?;
            }
            None => {
                index.insert(category.to_string(), by_category.len());
                by_category.push(CategoryTotal {
                    category: category.to_string(),
                    amount: r.amount,
                });
            }
        }
    }

    Ok(Summary { total, by_category })
}

fn checked_sum(acc: Decimal, amount: Decimal, what: &str) -> Result<Decimal> {
    acc.checked_add(amount)
        .ok_or_else(|| Error::AmountOverflow(what.to_string()))
}

fn normalize_category(raw: &str) -> &str {
    let t = raw.trim();
    if t.is_empty() {
        UNCATEGORIZED
    } else {
        t
    }
}

#[cfg(test)]
mod tests {
    use std::str::FromStr;

    use chrono::NaiveDate;

    use super::*;
    use crate::domain::UserId;

    fn rec(amount: &str, category: &str) -> ExpenseRecord {
        ExpenseRecord {
            id: 0,
            user_id: UserId(1),
            amount: Decimal::from_str(amount).unwrap(),
            category: category.to_string(),
            note: String::new(),
            created_at: NaiveDate::from_ymd_opt(2026, 1, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            utc_offset_secs: 0,
        }
    }

    #[test]
    fn empty_input_sums_to_zero() {
        let s = summarize(&[]).unwrap();
        assert_eq!(s.total, Decimal::ZERO);
        assert!(s.by_category.is_empty());
        assert!(s.is_empty());
    }

    #[test]
    fn groups_by_category_in_first_appearance_order() {
        let s = summarize(&[rec("10", "food"), rec("5", "food"), rec("3", "taxi")]).unwrap();
        assert_eq!(s.total, Decimal::from(18));
        assert_eq!(s.category("food"), Some(Decimal::from(15)));
        assert_eq!(s.category("taxi"), Some(Decimal::from(3)));
        let order: Vec<_> = s.by_category.iter().map(|c| c.category.as_str()).collect();
        assert_eq!(order, vec!["food", "taxi"]);
    }

    #[test]
    fn blank_category_falls_back_to_sentinel() {
        let s = summarize(&[rec("2.5", ""), rec("1.5", "  "), rec("1", UNCATEGORIZED)]).unwrap();
        assert_eq!(s.by_category.len(), 1);
        assert_eq!(s.category(UNCATEGORIZED), Some(Decimal::from(5)));
    }

    #[test]
    fn decimal_sums_are_exact() {
        let s = summarize(&[rec("0.1", "a"), rec("0.2", "a")]).unwrap();
        assert_eq!(s.total, Decimal::from_str("0.3").unwrap());
    }

    #[test]
    fn overflowing_day_is_an_error() {
        let max = Decimal::MAX.to_string();
        let err = summarize(&[rec(&max, "a"), rec("1", "b")]).unwrap_err();
        assert!(matches!(err, Error::AmountOverflow(ref what) if what == "total"));

        let err = summarize(&[rec(&max, "a"), rec(&max, "a")]).unwrap_err();
        assert!(matches!(err, Error::AmountOverflow(_)));
    }
}
