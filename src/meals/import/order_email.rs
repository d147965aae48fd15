// src/meals/import/order_email.rs
// Extracts "<meal name> x<qty>" lines from an order confirmation body.

use std::sync::LazyLock;

use regex::Regex;

use super::OrderLine;

// Name characters stay on one line: word characters, blanks and a little punctuation.
static ORDER_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^([\w \t&'’,-]+?)[ \t]+x(\d+)").expect("order line pattern is valid")
});

// Totals and headings that share the "x<n>"-style layout in the email
static SUMMARY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)ITEMS ORDERED|Subtotal|Shipping|Discount|GST|TOTAL").expect("summary pattern is valid")
});

pub fn parse_order_lines(body: &str) -> Vec<OrderLine> {
    ORDER_LINE
        .captures_iter(body)
        .filter_map(|caps| {
            let name = caps[1].trim();
            if name.is_empty() || SUMMARY_LINE.is_match(name) {
                return None;
            }
            let qty = caps[2].parse::<u32>().ok()?;
            Some(OrderLine { name: name.to_string(), qty })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ORDER_BODY: &str = "Hi there,\n\
        Thanks for your order!\n\
        \n\
        ITEMS ORDERED x5\n\
        Chicken Pesto Pasta x2\n\
        Beef & Broccoli x1\n\
        Crème Brûlée Oats x3\n\
        Nonna’s Meatballs, Large x1\n\
        \n\
        Subtotal x1 $84.00\n\
        Shipping x1 $9.95\n\
        TOTAL x1 $93.95\n";

    #[test]
    fn test_parses_meal_lines_and_skips_summary() {
        let lines = parse_order_lines(ORDER_BODY);
        let parsed: Vec<(&str, u32)> = lines.iter().map(|l| (l.name.as_str(), l.qty)).collect();
        assert_eq!(
            parsed,
            vec![
                ("Chicken Pesto Pasta", 2),
                ("Beef & Broccoli", 1),
                ("Crème Brûlée Oats", 3),
                ("Nonna’s Meatballs, Large", 1),
            ]
        );
    }

    #[test]
    fn test_heading_does_not_swallow_next_line() {
        let lines = parse_order_lines("ITEMS ORDERED\nTacos x4\n");
        assert_eq!(lines, vec![OrderLine { name: "Tacos".to_string(), qty: 4 }]);
    }

    #[test]
    fn test_no_meals_in_plain_text() {
        assert!(parse_order_lines("Your order has shipped.\nTrack it online.").is_empty());
    }
}
