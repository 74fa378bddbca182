//! Text rendering of numbers as a spreadsheet shows them in "General" format

/// At or above this magnitude General switches to scientific notation
const SCIENTIFIC_ABOVE: f64 = 1e11;
/// Below this magnitude (and non-zero) General switches to scientific notation
const SCIENTIFIC_BELOW: f64 = 1e-9;
/// General shows at most this many significant digits
const SIGNIFICANT_DIGITS: i32 = 10;

/// Render a number the way a General-formatted cell displays it
///
/// Integers print without a decimal point, fractions are rounded to ten
/// significant digits with trailing zeros dropped, and very large or very
/// small magnitudes use `1.23457E+11` style notation.
pub fn format_general(value: f64) -> String {
    if !value.is_finite() {
        return "#NUM!".to_string();
    }
    if value == 0.0 {
        return "0".to_string();
    }

    let abs = value.abs();
    if abs < SCIENTIFIC_BELOW {
        return scientific(value);
    }

    let digits_before = if abs >= 1.0 {
        abs.log10().floor() as i32 + 1
    } else {
        0
    };
    let decimals = (SIGNIFICANT_DIGITS - digits_before).clamp(0, 9);
    let factor = 10_f64.powi(decimals);
    let rounded = (value * factor).round() / factor;

    // The threshold applies to the displayed value, after rounding
    if rounded.abs() >= SCIENTIFIC_ABOVE {
        return scientific(rounded);
    }
    if rounded.fract() == 0.0 {
        return format!("{}", rounded as i64);
    }
    trim_fraction(&format!("{:.*}", decimals as usize, rounded)).to_string()
}

fn scientific(value: f64) -> String {
    let formatted = format!("{:.5e}", value);
    match formatted.split_once('e') {
        Some((mantissa, exponent)) => {
            let exponent: i32 = exponent.parse().unwrap_or(0);
            format!(
                "{}E{}{:02}",
                trim_fraction(mantissa),
                if exponent < 0 { '-' } else { '+' },
                exponent.abs()
            )
        }
        None => formatted,
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
