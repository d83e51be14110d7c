use rust_decimal::Decimal;

/// Display symbol for an ISO currency code, if one is known.
pub fn currency_symbol(code: &str) -> Option<&'static str> {
    match code.to_ascii_uppercase().as_str() {
        "GBP" => Some("£"),
        "EUR" => Some("€"),
        "USD" => Some("$"),
        _ => None,
    }
}

/// Render a price with two decimals, e.g. `£12.00` or `CHF 12.00`.
pub fn format_price(price: Decimal, currency: &str) -> String {
    let amount = price.round_dp(2);
    match currency_symbol(currency) {
        Some(symbol) => format!("{symbol}{amount:.2}"),
        None if currency.is_empty() => format!("{amount:.2}"),
        None => format!("{} {amount:.2}", currency.to_ascii_uppercase()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_price() {
        assert_eq!(format_price(Decimal::new(12, 0), "GBP"), "£12.00");
        assert_eq!(format_price(Decimal::new(955, 2), "eur"), "€9.55");
        assert_eq!(format_price(Decimal::new(1050, 2), "USD"), "$10.50");
        assert_eq!(format_price(Decimal::new(20, 0), "chf"), "CHF 20.00");
        assert_eq!(format_price(Decimal::new(20, 0), ""), "20.00");
    }
}
