//! Explicit parsing of untrusted spreadsheet cells.
//!
//! Every numeric field read from an external workbook goes through
//! [`parse_numeric`]. Anything that is not confidently a finite number comes
//! back as [`Numeric::NotANumber`]; the callers decide whether that means
//! "store zero" (overall averages, counters) or "skip the cell" (discipline
//! grades).

use crate::lcams::tools::model::Cell;

/// Placeholder stored when a mandatory name field is blank.
pub const UNDEFINED_NAME: &str = "Non défini";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Numeric {
    Value(f64),
    NotANumber,
}

impl Numeric {
    pub fn value(self) -> Option<f64> {
        match self {
            Numeric::Value(value) => Some(value),
            Numeric::NotANumber => None,
        }
    }

    /// Zero-default policy applied to term averages and attendance counters.
    pub fn or_zero(self) -> f64 {
        self.value().unwrap_or(0.0)
    }

    /// Counter view (rank, lateness, absence) with the same zero default.
    /// Negative values are not counts and become zero; fractional parts are
    /// truncated.
    pub fn or_zero_count(self) -> i64 {
        match self.value() {
            Some(value) if value >= 0.0 => value.trunc() as i64,
            _ => 0,
        }
    }
}

/// Classifies a cell as a number or not. Text cells are trimmed and accept a
/// comma as decimal separator; NaN and infinities are rejected.
pub fn parse_numeric(cell: &Cell) -> Numeric {
    match cell {
        Cell::Number(value) if value.is_finite() => Numeric::Value(*value),
        Cell::Number(_) | Cell::Empty => Numeric::NotANumber,
        Cell::Text(raw) => parse_numeric_text(raw),
    }
}

fn parse_numeric_text(raw: &str) -> Numeric {
    let candidate = raw.trim().replace(',', ".");
    let looks_numeric = !candidate.is_empty()
        && candidate
            .chars()
            .all(|ch| ch.is_ascii_digit() || matches!(ch, '.' | '-' | '+'));
    if !looks_numeric {
        return Numeric::NotANumber;
    }
    match candidate.parse::<f64>() {
        Ok(value) if value.is_finite() => Numeric::Value(value),
        _ => Numeric::NotANumber,
    }
}

/// Returns the trimmed text of a cell, or `None` when it is blank.
pub fn non_blank(cell: &Cell) -> Option<String> {
    if cell.is_empty() {
        None
    } else {
        Some(cell.key())
    }
}

/// Text of a mandatory name cell, replaced by [`UNDEFINED_NAME`] when blank.
pub fn name_or_placeholder(cell: &Cell) -> String {
    non_blank(cell).unwrap_or_else(|| UNDEFINED_NAME.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numbers_and_numeric_text_are_values() {
        assert_eq!(parse_numeric(&Cell::Number(12.5)), Numeric::Value(12.5));
        assert_eq!(parse_numeric(&Cell::text(" 14 ")), Numeric::Value(14.0));
        assert_eq!(parse_numeric(&Cell::text("9,75")), Numeric::Value(9.75));
    }

    #[test]
    fn non_numeric_inputs_are_sentinels() {
        assert_eq!(parse_numeric(&Cell::text("N/A")), Numeric::NotANumber);
        assert_eq!(parse_numeric(&Cell::text("NaN")), Numeric::NotANumber);
        assert_eq!(parse_numeric(&Cell::text("inf")), Numeric::NotANumber);
        assert_eq!(parse_numeric(&Cell::text("1er")), Numeric::NotANumber);
        assert_eq!(parse_numeric(&Cell::Empty), Numeric::NotANumber);
        assert_eq!(parse_numeric(&Cell::Number(f64::NAN)), Numeric::NotANumber);
    }

    #[test]
    fn zero_default_policy_truncates_integers() {
        assert_eq!(Numeric::NotANumber.or_zero(), 0.0);
        assert_eq!(Numeric::Value(3.9).or_zero_count(), 3);
    }

    #[test]
    fn negative_counters_fall_back_to_zero() {
        assert_eq!(parse_numeric(&Cell::text("-2")).or_zero_count(), 0);
        assert_eq!(Numeric::Value(-0.5).or_zero_count(), 0);
        assert_eq!(parse_numeric(&Cell::text("+4")).or_zero_count(), 4);
    }

    #[test]
    fn blank_names_get_placeholder() {
        assert_eq!(name_or_placeholder(&Cell::Empty), UNDEFINED_NAME);
        assert_eq!(name_or_placeholder(&Cell::text("Awa")), "Awa");
    }
}
