/// Format a float as a rupee amount with Indian digit grouping: ₹12,34,567.89
pub fn money(val: f64) -> String {
    let negative = val < 0.0;
    let abs = val.abs();
    let fixed = format!("{:.2}", abs);
    let (int_part, dec_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), "00"));

    // Last three digits form one group, everything before groups in pairs.
    let grouped = if int_part.len() > 3 {
        let (head, tail) = int_part.split_at(int_part.len() - 3);
        let mut with_commas = String::new();
        for (i, c) in head.chars().rev().enumerate() {
            if i > 0 && i % 2 == 0 {
                with_commas.push(',');
            }
            with_commas.push(c);
        }
        let head: String = with_commas.chars().rev().collect();
        format!("{head},{tail}")
    } else {
        int_part.to_string()
    };

    if negative {
        format!("-\u{20b9}{grouped}.{dec_part}")
    } else {
        format!("\u{20b9}{grouped}.{dec_part}")
    }
}

/// Human-readable byte size.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 4] = ["B", "KB", "MB", "GB"];
    let mut size = bytes as f64;
    let mut unit = 0;
    while size >= 1024.0 && unit < UNITS.len() - 1 {
        size /= 1024.0;
        unit += 1;
    }
    if unit == 0 {
        format!("{bytes} B")
    } else {
        format!("{size:.1} {}", UNITS[unit])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_money_formatting() {
        assert_eq!(money(1234.56), "\u{20b9}1,234.56");
        assert_eq!(money(-500.00), "-\u{20b9}500.00");
        assert_eq!(money(0.0), "\u{20b9}0.00");
        assert_eq!(money(1234567.89), "\u{20b9}12,34,567.89");
        assert_eq!(money(13875.0), "\u{20b9}13,875.00");
        assert_eq!(money(100000.0), "\u{20b9}1,00,000.00");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
    }
}
