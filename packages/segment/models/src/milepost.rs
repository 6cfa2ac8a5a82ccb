//! Linear-referencing position parsing.
//!
//! Mileposts arrive as `"<integer>+<decimal>"` strings (e.g. `"002+0.619"`)
//! where the integer part is whole miles and the decimal part is the
//! fractional remainder. Only that form is accepted: a bare number such as
//! `"2.619"` is rejected so that every call site shares one contract.

/// Parses a `"<integer>+<decimal>"` milepost string into miles.
///
/// Leading zeros in the integer portion are stripped, and an integer portion
/// that is empty after stripping counts as zero. Returns `None` for missing
/// input, for strings without exactly one `+`, for non-numeric or
/// non-finite operands, and for signed operands (a milepost is never
/// negative). Never panics.
#[must_use]
pub fn parse_milepost(value: Option<&str>) -> Option<f64> {
    let value = value?;
    let (whole, fraction) = value.split_once('+')?;
    let (whole, fraction) = (whole.trim(), fraction.trim());
    if [whole, fraction]
        .iter()
        .any(|operand| operand.starts_with(['+', '-']))
    {
        return None;
    }

    let whole = whole.trim_start_matches('0');
    let whole = if whole.is_empty() {
        0.0
    } else {
        parse_finite(whole)?
    };
    let fraction = parse_finite(fraction)?;

    Some(whole + fraction)
}

/// Coerces a free-form numeric field (`"1234"`, `" 0.52 "`) into a finite
/// float. Non-numeric, empty, or non-finite input yields `None`.
#[must_use]
pub fn parse_numeric(value: Option<&str>) -> Option<f64> {
    parse_finite(value?.trim())
}

fn parse_finite(s: &str) -> Option<f64> {
    if s.is_empty() {
        return None;
    }
    s.parse::<f64>().ok().filter(|v| v.is_finite())
}
