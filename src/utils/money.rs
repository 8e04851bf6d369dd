/// Formats an amount the way payslips and error messages show it:
/// `₱1,100` for whole amounts, `₱1,100.50` otherwise.
pub fn format_peso(amount: f64) -> String {
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = cents / 100;
    let fraction = cents % 100;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if amount < 0.0 && cents > 0 { "-" } else { "" };
    if fraction == 0 {
        format!("{sign}₱{grouped}")
    } else {
        format!("{sign}₱{grouped}.{fraction:02}")
    }
}
