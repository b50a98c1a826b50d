//! Money formatting
//!
//! Amounts arrive from the storefront as decimal strings ("1234.5") and are
//! kept exact until rendered. They are rendered with a fixed currency
//! convention; the default is NZD as written in the en-NZ locale ("$1,234.50").

use std::str::FromStr;

use bigdecimal::{BigDecimal, RoundingMode};

use crate::query::{Money, Price};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MoneyFormat {
    pub symbol: String,
    pub group_separator: char,
    pub decimal_separator: char,
    pub fraction_digits: usize,
}

impl Default for MoneyFormat {
    fn default() -> Self {
        Self::nzd()
    }
}

impl MoneyFormat {
    /// New Zealand dollars, en-NZ
    pub fn nzd() -> Self {
        Self {
            symbol: "$".to_string(),
            group_separator: ',',
            decimal_separator: '.',
            fraction_digits: 2,
        }
    }

    /// Format a raw decimal amount, rounding half away from zero to
    /// `fraction_digits`. Amounts that don't parse are returned verbatim.
    pub fn format_amount(&self, amount: &str) -> String {
        let Ok(value) = BigDecimal::from_str(amount.trim()) else {
            return amount.to_string();
        };

        let scale = self.fraction_digits as i64;
        let (units, _) = value
            .with_scale_round(scale, RoundingMode::HalfUp)
            .as_bigint_and_exponent();
        // Integer count of the smallest unit; zero carries no sign
        let units = units.to_string();
        let (negative, mut digits) = match units.strip_prefix('-') {
            Some(magnitude) => (true, magnitude.to_string()),
            None => (false, units),
        };

        // At least one digit before the separator
        if digits.len() <= self.fraction_digits {
            digits.insert_str(0, &"0".repeat(self.fraction_digits + 1 - digits.len()));
        }
        let (whole, fraction) = digits.split_at(digits.len() - self.fraction_digits);

        let mut out = String::with_capacity(digits.len() + self.symbol.len() + 8);
        if negative {
            out.push('-');
        }
        out.push_str(&self.symbol);
        for (i, digit) in whole.chars().enumerate() {
            if i > 0 && (whole.len() - i) % 3 == 0 {
                out.push(self.group_separator);
            }
            out.push(digit);
        }
        if !fraction.is_empty() {
            out.push(self.decimal_separator);
            out.push_str(fraction);
        }
        out
    }

    pub fn format_money(&self, money: &Money) -> String {
        self.format_amount(&money.amount)
    }

    /// Single prices format as one amount; ranges collapse to one amount when
    /// both ends render the same.
    pub fn format_price(&self, price: &Price) -> String {
        match price {
            Price::Single(money) => self.format_money(money),
            Price::Range { min, max } => {
                let min = self.format_money(min);
                let max = self.format_money(max);
                if min == max {
                    min
                } else {
                    format!("{} – {}", min, max)
                }
            }
        }
    }
}
