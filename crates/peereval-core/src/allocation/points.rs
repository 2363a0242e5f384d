//! Point values entered into allocation rows.

use crate::error::ValidationError;

/// Points every student distributes.
pub const TOTAL_POINTS: f64 = 100.0;

/// Slack allowed when comparing accumulated decimal points against
/// [`TOTAL_POINTS`]. Whole-number totals are exact in `f64`, so this only
/// matters for entries like `33.3 + 33.3 + 33.4`.
pub const POINTS_TOLERANCE: f64 = 1e-6;

/// Parse the raw text of a points field.
///
/// Blank input clears the field. Anything else must be a finite,
/// non-negative number.
pub fn parse_points(input: &str) -> Result<Option<f64>, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let value = trimmed
        .parse::<f64>()
        .map_err(|_| ValidationError::InvalidPoints {
            value: trimmed.to_string(),
            message: "not a number".into(),
        })?;
    validate_points(value).map(Some)
}

/// Reject NaN, infinities and negative values.
pub fn validate_points(value: f64) -> Result<f64, ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::InvalidPoints {
            value: value.to_string(),
            message: "must be a finite number".into(),
        });
    }
    if value < 0.0 {
        return Err(ValidationError::InvalidPoints {
            value: value.to_string(),
            message: "must not be negative".into(),
        });
    }
    // -0.0 compares equal to 0.0 but prints as "-0"
    Ok(if value == 0.0 { 0.0 } else { value })
}

/// Whether `total` is the full budget.
pub fn is_full_budget(total: f64) -> bool {
    (total - TOTAL_POINTS).abs() <= POINTS_TOLERANCE
}

/// Whether `total` leaves budget to hand out.
pub fn is_below_budget(total: f64) -> bool {
    total < TOTAL_POINTS - POINTS_TOLERANCE
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_input_clears() {
        assert_eq!(parse_points("").unwrap(), None);
        assert_eq!(parse_points("   ").unwrap(), None);
    }

    #[test]
    fn parses_whole_and_decimal_points() {
        assert_eq!(parse_points("30").unwrap(), Some(30.0));
        assert_eq!(parse_points(" 12.5 ").unwrap(), Some(12.5));
        assert_eq!(parse_points("0").unwrap(), Some(0.0));
        assert_eq!(parse_points("-0").unwrap(), Some(0.0));
    }

    #[test]
    fn rejects_negative_and_garbage() {
        assert!(matches!(
            parse_points("-5"),
            Err(ValidationError::InvalidPoints { .. })
        ));
        assert!(matches!(
            parse_points("thirty"),
            Err(ValidationError::InvalidPoints { .. })
        ));
        assert!(matches!(
            parse_points("NaN"),
            Err(ValidationError::InvalidPoints { .. })
        ));
        assert!(matches!(
            parse_points("inf"),
            Err(ValidationError::InvalidPoints { .. })
        ));
    }

    #[test]
    fn budget_comparison_tolerates_decimal_error() {
        let total = 33.3 + 33.3 + 33.4;
        assert!(is_full_budget(total));
        assert!(!is_below_budget(total));
        assert!(is_full_budget(0.1 * 3.0 + 99.7));
        assert!(!is_full_budget(99.99));
        assert!(is_below_budget(99.99));
        assert!(!is_full_budget(100.01));
    }
}
