pub fn ease_in_out_cubic(t: f32) -> f32 {
    let t = t.clamp(0.0, 1.0);
    if t < 0.5 {
        4.0 * t * t * t
    } else {
        let u = -2.0 * t + 2.0;
        1.0 - (u * u * u) / 2.0
    }
}

pub fn extract_numeric_tokens(raw: &str) -> Vec<f32> {
    let mut values = Vec::new();
    let mut token = String::new();

    for ch in raw.chars() {
        if ch.is_ascii_digit() || ch == '.' || ch == '-' || ch == '+' || ch == 'e' || ch == 'E' {
            token.push(ch);
        } else if !token.is_empty() {
            if let Ok(value) = token.parse::<f32>() {
                values.push(value);
            }
            token.clear();
        }
    }

    if !token.is_empty()
        && let Ok(value) = token.parse::<f32>()
    {
        values.push(value);
    }

    values
}

pub fn format_count(count: usize) -> String {
    let digits = count.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    grouped
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ease_endpoints_are_exact() {
        assert_eq!(ease_in_out_cubic(0.0), 0.0);
        assert_eq!(ease_in_out_cubic(1.0), 1.0);
        assert_eq!(ease_in_out_cubic(0.5), 0.5);
    }

    #[test]
    fn ease_clamps_out_of_range_input() {
        assert_eq!(ease_in_out_cubic(-2.0), 0.0);
        assert_eq!(ease_in_out_cubic(3.0), 1.0);
    }

    #[test]
    fn numeric_tokens_survive_malformed_wrappers() {
        let values = extract_numeric_tokens("[0.5, garbage -1.25 ;; 3e2]");
        assert_eq!(values, vec![0.5, -1.25, 300.0]);
    }

    #[test]
    fn numeric_tokens_empty_for_non_numeric_text() {
        assert!(extract_numeric_tokens("no digits here").is_empty());
    }

    #[test]
    fn count_grouping() {
        assert_eq!(format_count(0), "0");
        assert_eq!(format_count(999), "999");
        assert_eq!(format_count(12000), "12,000");
        assert_eq!(format_count(1234567), "1,234,567");
    }
}
