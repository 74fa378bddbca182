//! Rendering of numbers through an explicit number format code
//!
//! Covers the fixed-point, percent, thousands and scientific forms that
//! intake sheets use for references and amounts: `00000`, `#,##0.00`,
//! `0.0%`, `0.00E+00`, literal prefixes and suffixes, and up to three
//! `;`-separated sections. Fractions and anything unrecognised fall back to
//! the General rendering.

use super::display::format_general;

/// Render `value` the way a cell with format `code` displays it
pub fn format_number(value: f64, code: &str) -> String {
    if !value.is_finite() {
        return format_general(value);
    }

    let sections = split_sections(code);
    let (section, signed) = match (value, sections.as_slice()) {
        (v, [_, negative, ..]) if v < 0.0 => (*negative, false),
        (v, [_, _, zero, ..]) if v == 0.0 => (*zero, false),
        (_, [first, ..]) => (*first, true),
        (_, []) => return format_general(value),
    };
    let magnitude = if signed { value } else { value.abs() };

    let pattern = strip_brackets(section);
    let trimmed = pattern.trim();
    if trimmed.is_empty() {
        // An empty section in a multi-section code hides the value
        return if sections.len() > 1 {
            String::new()
        } else {
            format_general(magnitude)
        };
    }
    if trimmed.eq_ignore_ascii_case("general") || trimmed == "@" {
        return format_general(magnitude);
    }
    if count_outside_quotes(&pattern, '/') > 0 {
        return format_general(magnitude);
    }

    let Some((start, end)) = placeholder_span(&pattern) else {
        return render_literal(&pattern);
    };

    let prefix = render_literal(&pattern[..start]);
    let body = &pattern[start..end];
    let suffix = render_literal(&pattern[end..]);

    let mut scaled = magnitude.abs();
    for _ in 0..count_outside_quotes(&pattern, '%') {
        scaled *= 100.0;
    }

    let digits = match exponent_split(body) {
        Some((mantissa, exponent)) => render_scientific(scaled, &Fixed::parse(mantissa), exponent),
        None => render_fixed(scaled, &Fixed::parse(body)),
    };

    let negative = magnitude < 0.0 && digits.chars().any(|c| matches!(c, '1'..='9'));
    format!(
        "{}{}{}{}",
        if negative { "-" } else { "" },
        prefix,
        digits,
        suffix
    )
}

/// Walk `s` yielding only the characters outside quotes, escapes and brackets
fn unquoted(s: &str) -> impl Iterator<Item = (usize, char)> + '_ {
    let mut in_quotes = false;
    let mut in_brackets = false;
    let mut escaped = false;
    s.char_indices().filter(move |&(_, ch)| {
        if escaped {
            escaped = false;
            return false;
        }
        if in_quotes {
            in_quotes = ch != '"';
            return false;
        }
        if in_brackets {
            in_brackets = ch != ']';
            return false;
        }
        match ch {
            '"' => in_quotes = true,
            '[' => in_brackets = true,
            '\\' | '_' | '*' => escaped = true,
            _ => return true,
        }
        false
    })
}

fn split_sections(code: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut from = 0;
    for (idx, ch) in unquoted(code) {
        if ch == ';' {
            sections.push(&code[from..idx]);
            from = idx + 1;
        }
    }
    sections.push(&code[from..]);
    sections
}

fn count_outside_quotes(s: &str, needle: char) -> usize {
    unquoted(s).filter(|&(_, ch)| ch == needle).count()
}

/// Drop `[Red]`, `[>=100]` and similar tokens, keeping `[$€-407]` symbols
fn strip_brackets(section: &str) -> String {
    let mut out = String::new();
    let mut chars = section.chars();
    let mut in_quotes = false;
    while let Some(ch) = chars.next() {
        match ch {
            '"' => {
                in_quotes = !in_quotes;
                out.push(ch);
            }
            '\\' if !in_quotes => {
                out.push(ch);
                if let Some(next) = chars.next() {
                    out.push(next);
                }
            }
            '[' if !in_quotes => {
                let token: String = chars.by_ref().take_while(|&c| c != ']').collect();
                if let Some(symbol) = token.strip_prefix('$') {
                    let symbol = symbol.split('-').next().unwrap_or("");
                    if !symbol.is_empty() {
                        out.push('"');
                        out.push_str(symbol);
                        out.push('"');
                    }
                }
            }
            _ => out.push(ch),
        }
    }
    out
}

/// Byte range from the first to the last digit placeholder, trailing
/// scaling commas included
fn placeholder_span(pattern: &str) -> Option<(usize, usize)> {
    let mut first = None;
    let mut last = None;
    let mut in_exponent = false;
    for (idx, ch) in unquoted(pattern) {
        match ch {
            '0' | '#' | '?' => {
                first.get_or_insert(idx);
                last = Some(idx + 1);
            }
            'E' | 'e' if first.is_some() => in_exponent = true,
            '+' | '-' if in_exponent => {}
            '.' => {
                first.get_or_insert(idx);
            }
            ',' if first.is_some() => {}
            _ => {
                if first.is_some() {
                    break;
                }
            }
        }
    }

    let (start, mut end) = (first?, last?);
    while pattern[end..].starts_with(',') {
        end += 1;
    }
    Some((start, end))
}

fn exponent_split(body: &str) -> Option<(&str, &str)> {
    let idx = body.find(['E', 'e'])?;
    Some((&body[..idx], &body[idx + 1..]))
}

#[derive(Debug, Clone, PartialEq)]
struct Fixed {
    /// Integer digits that always print
    min_int: usize,
    /// Integer `?` placeholders, padded with spaces
    space_int: usize,
    /// All integer placeholders, `#` included
    int_digits: usize,
    min_frac: usize,
    max_frac: usize,
    grouping: bool,
    /// Trailing commas, each dividing by a thousand
    scale: usize,
    decimal_point: bool,
}

impl Fixed {
    fn parse(body: &str) -> Self {
        let mut raw = body;
        let mut scale = 0;
        while let Some(rest) = raw.strip_suffix(',') {
            raw = rest;
            scale += 1;
        }

        let (int_part, frac_part) = match raw.split_once('.') {
            Some((int_part, frac_part)) => (int_part, Some(frac_part)),
            None => (raw, None),
        };
        let count = |s: &str, f: fn(char) -> bool| s.chars().filter(|&c| f(c)).count();
        let frac = frac_part.unwrap_or("");

        Fixed {
            min_int: count(int_part, |c| c == '0'),
            space_int: count(int_part, |c| c == '?'),
            int_digits: count(int_part, |c| matches!(c, '0' | '#' | '?')),
            min_frac: count(frac, |c| matches!(c, '0' | '?')),
            max_frac: count(frac, |c| matches!(c, '0' | '#' | '?')),
            grouping: int_part.contains(','),
            scale,
            decimal_point: frac_part.is_some(),
        }
    }
}

fn render_fixed(value: f64, spec: &Fixed) -> String {
    let mut value = value;
    for _ in 0..spec.scale {
        value /= 1000.0;
    }
    let factor = 10_f64.powi(spec.max_frac as i32);
    let rounded = (value * factor).round() / factor;

    let rendered = format!("{:.*}", spec.max_frac, rounded);
    let (int_digits, frac_digits) = rendered
        .split_once('.')
        .unwrap_or((rendered.as_str(), ""));

    // `#` alone prints nothing for a zero integer part
    let mut int_part = if int_digits == "0" && spec.min_int == 0 {
        String::new()
    } else {
        int_digits.to_string()
    };
    while int_part.len() < spec.min_int {
        int_part.insert(0, '0');
    }
    if spec.grouping {
        int_part = group_thousands(&int_part);
    }
    while int_part.chars().count() < spec.min_int + spec.space_int {
        int_part.insert(0, ' ');
    }

    let mut frac_part = frac_digits.to_string();
    while frac_part.len() > spec.min_frac && frac_part.ends_with('0') {
        frac_part.pop();
    }

    let mut out = int_part;
    if spec.decimal_point {
        out.push('.');
        out.push_str(&frac_part);
    }
    out
}

fn render_scientific(value: f64, mantissa_spec: &Fixed, exponent: &str) -> String {
    let (sign_always, width_pattern) = match exponent.chars().next() {
        Some('+') => (true, &exponent[1..]),
        Some('-') => (false, &exponent[1..]),
        _ => (false, exponent),
    };
    let width = width_pattern
        .chars()
        .filter(|c| matches!(c, '0' | '#' | '?'))
        .count()
        .max(1);

    // `##0.0E+0` keeps the exponent a multiple of three
    let step = mantissa_spec.int_digits.max(1) as i32;
    let (mut mantissa, mut exp) = if value == 0.0 {
        (0.0, 0)
    } else {
        let exp = value.log10().floor() as i32;
        let exp = exp.div_euclid(step) * step;
        (value / 10_f64.powi(exp), exp)
    };

    let factor = 10_f64.powi(mantissa_spec.max_frac as i32);
    mantissa = (mantissa * factor).round() / factor;
    if mantissa >= 10_f64.powi(step) {
        mantissa /= 10_f64.powi(step);
        exp += step;
    }

    let sign = if exp < 0 {
        "-"
    } else if sign_always {
        "+"
    } else {
        ""
    };
    format!(
        "{}E{}{:0width$}",
        render_fixed(mantissa, mantissa_spec),
        sign,
        exp.abs(),
        width = width
    )
}

fn group_thousands(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        out.push(ch);
        let remaining = len - i - 1;
        if remaining > 0 && remaining % 3 == 0 {
            out.push(',');
        }
    }
    out
}

/// Text outside the number body: quoted strings, escapes, padding and fill
fn render_literal(segment: &str) -> String {
    let mut out = String::new();
    let mut chars = segment.chars();
    let mut in_quotes = false;
    while let Some(ch) = chars.next() {
        if in_quotes {
            if ch == '"' {
                in_quotes = false;
            } else {
                out.push(ch);
            }
            continue;
        }
        match ch {
            '"' => in_quotes = true,
            '\\' => out.extend(chars.next()),
            '_' => {
                chars.next();
                out.push(' ');
            }
            '*' => {
                chars.next();
            }
            _ => out.push(ch),
        }
    }
    out
}
