// 📦 Stock badges - materials currently on hand

use crate::records::StockMap;

/// Only materials with a positive quantity get a badge
pub fn in_stock(stock: &StockMap) -> impl Iterator<Item = (&str, f64)> + '_ {
    stock
        .iter()
        .filter(|(_, qty)| **qty > 0.0)
        .map(|(name, qty)| (name.as_str(), *qty))
}

pub fn has_stock(stock: &StockMap) -> bool {
    in_stock(stock).next().is_some()
}

pub fn format_qty(qty: f64) -> String {
    format!("{:.1} kg", qty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_positive_quantities_are_shown() {
        let mut stock = StockMap::new();
        stock.insert("PET".to_string(), 12.26);
        stock.insert("Paper".to_string(), 0.0);
        stock.insert("Glass".to_string(), -3.0);

        let shown: Vec<(&str, f64)> = in_stock(&stock).collect();

        assert_eq!(shown, vec![("PET", 12.26)]);
        assert!(has_stock(&stock));
        assert_eq!(format_qty(12.26), "12.3 kg");
    }

    #[test]
    fn test_empty_or_depleted_stock() {
        let mut stock = StockMap::new();
        assert!(!has_stock(&stock));

        stock.insert("Copper".to_string(), 0.0);
        assert!(!has_stock(&stock));
    }
}
