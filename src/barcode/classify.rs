//! Marker text classification.

/// What kind of marker a decoded string looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerClass {
    DeliveryLike,
    CustomerLike,
}

/// Classify decoded marker text.
///
/// Delivery numbers start with "DO" (any case) or a decimal digit; everything
/// else, including blank text, is customer-like. Callers must reject blank
/// text themselves.
pub fn classify(text: &str) -> MarkerClass {
    let normalized = text.trim().to_ascii_uppercase();
    let starts_with_digit = normalized
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_digit());

    if normalized.starts_with("DO") || starts_with_digit {
        MarkerClass::DeliveryLike
    } else {
        MarkerClass::CustomerLike
    }
}

/// Whether decoded text is blank after trimming.
pub fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_do_prefix_any_case() {
        for text in ["DO123", "do123", "Do123", "dO123", "  DO-42  "] {
            assert_eq!(classify(text), MarkerClass::DeliveryLike, "{}", text);
        }
    }

    #[test]
    fn test_leading_digit_is_delivery() {
        for d in '0'..='9' {
            let text = format!("{}ABC", d);
            assert_eq!(classify(&text), MarkerClass::DeliveryLike);
        }
    }

    #[test]
    fn test_names_are_customer() {
        assert_eq!(classify("ACME Corp"), MarkerClass::CustomerLike);
        assert_eq!(classify("Beta GmbH"), MarkerClass::CustomerLike);
        assert_eq!(classify("D123"), MarkerClass::CustomerLike);
    }

    #[test]
    fn test_blank_text_does_not_panic() {
        assert_eq!(classify(""), MarkerClass::CustomerLike);
        assert_eq!(classify("   \t"), MarkerClass::CustomerLike);
        assert!(is_blank("   \t"));
        assert!(!is_blank(" x "));
    }

    #[test]
    fn test_non_ascii_is_customer() {
        assert_eq!(classify("Ørsted"), MarkerClass::CustomerLike);
        assert_eq!(classify("٣abc"), MarkerClass::CustomerLike);
    }
}
