use std::collections::HashMap;
use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::errors::DomainError;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawOrderLine")]
pub struct OrderLine {
    pub item: String,
    pub quantity: u32,
    #[serde(serialize_with = "serialize_price")]
    pub price: Decimal,
}

impl OrderLine {
    pub fn new(item: impl Into<String>, quantity: u32, price: Decimal) -> Self {
        Self { item: item.into(), quantity, price }
    }

    pub fn from_value(value: &Value) -> Result<Self, DomainError> {
        let raw = serde_json::from_value::<RawOrderLine>(value.clone())
            .map_err(|_| DomainError::MissingItemName)?;
        Self::try_from(raw)
    }

    pub fn line_total(&self) -> Decimal {
        self.price * Decimal::from(self.quantity)
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawOrderLine {
    #[serde(default)]
    item: Option<Value>,
    #[serde(default)]
    quantity: Option<Value>,
    #[serde(default)]
    price: Option<Value>,
}

impl TryFrom<RawOrderLine> for OrderLine {
    type Error = DomainError;

    fn try_from(raw: RawOrderLine) -> Result<Self, Self::Error> {
        let item = match raw.item {
            Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
            _ => return Err(DomainError::MissingItemName),
        };
        let quantity = parse_quantity(&item, raw.quantity.as_ref())?;
        let price = parse_price(&item, raw.price.as_ref())?;

        Ok(Self { item, quantity, price })
    }
}

fn parse_quantity(item: &str, value: Option<&Value>) -> Result<u32, DomainError> {
    let invalid = || DomainError::InvalidQuantity {
        item: item.to_string(),
        value: value.map(Value::to_string).unwrap_or_else(|| "<missing>".to_string()),
    };

    let quantity = match value {
        Some(Value::Number(number)) => match number.as_u64() {
            Some(whole) => Some(whole),
            None => number
                .as_f64()
                .filter(|float| float.fract() == 0.0 && *float > 0.0)
                .map(|float| float as u64),
        },
        Some(Value::String(raw)) => raw.trim().parse::<u64>().ok(),
        _ => None,
    };

    quantity
        .filter(|quantity| *quantity > 0)
        .and_then(|quantity| u32::try_from(quantity).ok())
        .ok_or_else(invalid)
}

fn parse_price(item: &str, value: Option<&Value>) -> Result<Decimal, DomainError> {
    let invalid = || DomainError::InvalidPrice {
        item: item.to_string(),
        value: value.map(Value::to_string).unwrap_or_else(|| "<missing>".to_string()),
    };

    let price = match value {
        Some(Value::Number(number)) => parse_decimal(&number.to_string()),
        Some(Value::String(raw)) => parse_decimal(raw.trim().trim_start_matches('$')),
        _ => None,
    };

    price.filter(|price| !price.is_sign_negative()).ok_or_else(invalid)
}

fn parse_decimal(raw: &str) -> Option<Decimal> {
    Decimal::from_str(raw).ok().or_else(|| Decimal::from_scientific(raw).ok())
}

fn serialize_price<S: Serializer>(price: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
    match price.to_f64() {
        Some(float) => serializer.serialize_f64(float),
        None => serializer.serialize_str(&price.to_string()),
    }
}

/// Result of decoding raw order lines one entry at a time.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ParsedOrder {
    pub lines: Vec<OrderLine>,
    pub rejected: Vec<DomainError>,
}

pub fn parse_order_lines(values: &[Value]) -> ParsedOrder {
    let mut parsed = ParsedOrder::default();
    for value in values {
        match OrderLine::from_value(value) {
            Ok(line) => parsed.lines.push(line),
            Err(error) => parsed.rejected.push(error),
        }
    }
    parsed
}

/// Which price survives when an item already in the order is ordered again.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepeatItemPrice {
    #[default]
    KeepExisting,
    Latest,
}

impl FromStr for RepeatItemPrice {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "keep_existing" => Ok(Self::KeepExisting),
            "latest" => Ok(Self::Latest),
            other => Err(format!(
                "unsupported repeat item price policy `{other}` (expected keep_existing|latest)"
            )),
        }
    }
}

/// Folds `new_lines` into `current`, keyed by item name.
///
/// Quantities of repeated items are summed; the output keeps first-insertion
/// order and holds at most one line per item name.
pub fn merge_orders(
    current: &[OrderLine],
    new_lines: &[OrderLine],
    policy: RepeatItemPrice,
) -> Vec<OrderLine> {
    if new_lines.is_empty() {
        return current.to_vec();
    }

    let mut merged: Vec<OrderLine> = Vec::with_capacity(current.len() + new_lines.len());
    let mut positions: HashMap<String, usize> = HashMap::new();

    for line in current.iter().chain(new_lines) {
        match positions.get(&line.item) {
            Some(&index) => {
                let existing = &mut merged[index];
                existing.quantity = existing.quantity.saturating_add(line.quantity);
                if policy == RepeatItemPrice::Latest {
                    existing.price = line.price;
                }
            }
            None => {
                positions.insert(line.item.clone(), merged.len());
                merged.push(line.clone());
            }
        }
    }

    merged
}

pub fn order_total(order: &[OrderLine]) -> Decimal {
    order.iter().map(OrderLine::line_total).sum()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{merge_orders, order_total, parse_order_lines, OrderLine, RepeatItemPrice};
    use crate::errors::DomainError;

    fn latte(quantity: u32) -> OrderLine {
        OrderLine::new("Latte", quantity, Decimal::new(475, 2))
    }

    #[test]
    fn repeated_item_sums_quantity_without_summing_price() {
        let merged = merge_orders(&[latte(2)], &[latte(1)], RepeatItemPrice::KeepExisting);

        assert_eq!(merged, vec![latte(3)]);
    }

    #[test]
    fn empty_new_order_returns_current_unchanged() {
        let current = vec![latte(2), OrderLine::new("Croissant", 1, Decimal::new(325, 2))];

        let merged = merge_orders(&current, &[], RepeatItemPrice::KeepExisting);

        assert_eq!(merged, current);
    }

    #[test]
    fn empty_current_order_returns_new_lines() {
        let new_lines = vec![latte(1), OrderLine::new("Espresso shot", 2, Decimal::new(200, 2))];

        let merged = merge_orders(&[], &new_lines, RepeatItemPrice::KeepExisting);

        assert_eq!(merged, new_lines);
    }

    #[test]
    fn new_items_are_appended_after_existing_lines() {
        let scone = OrderLine::new("Ginger Scone", 1, Decimal::new(350, 2));
        let merged =
            merge_orders(&[latte(1)], &[scone.clone(), latte(1)], RepeatItemPrice::KeepExisting);

        assert_eq!(merged, vec![latte(2), scone]);
    }

    #[test]
    fn price_policy_controls_repeat_item_price() {
        let promo = OrderLine::new("Latte", 1, Decimal::new(400, 2));

        let kept = merge_orders(&[latte(1)], &[promo.clone()], RepeatItemPrice::KeepExisting);
        assert_eq!(kept[0].price, Decimal::new(475, 2));

        let latest = merge_orders(&[latte(1)], &[promo], RepeatItemPrice::Latest);
        assert_eq!(latest[0].price, Decimal::new(400, 2));
        assert_eq!(latest[0].quantity, 2);
    }

    #[test]
    fn malformed_lines_are_rejected_individually() {
        let parsed = parse_order_lines(&[
            json!({"item": "Latte", "quantity": 2, "price": 4.75}),
            json!({"item": "Scone", "quantity": "a few", "price": 3.25}),
            json!({"item": "Mocha", "quantity": 1, "price": -1}),
            json!({"quantity": 1, "price": 1}),
            json!({"item": "Croissant", "quantity": 1.0, "price": "$3.25"}),
        ]);

        assert_eq!(
            parsed.lines,
            vec![latte(2), OrderLine::new("Croissant", 1, Decimal::new(325, 2))]
        );
        assert_eq!(parsed.rejected.len(), 3);
        assert!(matches!(parsed.rejected[0], DomainError::InvalidQuantity { ref item, .. } if item == "Scone"));
        assert!(matches!(parsed.rejected[1], DomainError::InvalidPrice { ref item, .. } if item == "Mocha"));
        assert_eq!(parsed.rejected[2], DomainError::MissingItemName);
    }

    #[test]
    fn zero_quantity_is_not_a_valid_line() {
        let parsed = parse_order_lines(&[json!({"item": "Latte", "quantity": 0, "price": 4.75})]);

        assert!(parsed.lines.is_empty());
        assert_eq!(parsed.rejected.len(), 1);
    }

    #[test]
    fn total_multiplies_price_by_quantity() {
        let order = vec![latte(2), OrderLine::new("Hazelnut syrup", 1, Decimal::new(150, 2))];

        assert_eq!(order_total(&order), Decimal::new(1100, 2));
    }

    #[test]
    fn line_round_trips_with_numeric_price() {
        let value = serde_json::to_value(latte(1)).expect("line serializes");
        assert_eq!(value, json!({"item": "Latte", "quantity": 1, "price": 4.75}));

        let decoded: OrderLine = serde_json::from_value(value).expect("line decodes");
        assert_eq!(decoded, latte(1));
    }
}
