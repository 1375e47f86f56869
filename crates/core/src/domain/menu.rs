use rust_decimal::Decimal;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MenuItem {
    pub name: String,
    pub price: Decimal,
}

impl MenuItem {
    fn priced(name: &str, cents: i64) -> Self {
        Self { name: name.to_string(), price: Decimal::new(cents, 2) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Menu {
    items: Vec<MenuItem>,
}

impl Default for Menu {
    fn default() -> Self {
        Self::merrys_way()
    }
}

impl Menu {
    pub fn new(items: Vec<MenuItem>) -> Self {
        Self { items }
    }

    pub fn merrys_way() -> Self {
        Self::new(vec![
            MenuItem::priced("Cappuccino", 450),
            MenuItem::priced("Jumbo Savory Scone", 325),
            MenuItem::priced("Latte", 475),
            MenuItem::priced("Chocolate Chip Biscotti", 250),
            MenuItem::priced("Espresso shot", 200),
            MenuItem::priced("Hazelnut Biscotti", 275),
            MenuItem::priced("Chocolate Croissant", 375),
            MenuItem::priced("Dark chocolate (Drinking Chocolate)", 500),
            MenuItem::priced("Cranberry Scone", 350),
            MenuItem::priced("Croissant", 325),
            MenuItem::priced("Almond Croissant", 400),
            MenuItem::priced("Ginger Biscotti", 250),
            MenuItem::priced("Oatmeal Scone", 325),
            MenuItem::priced("Ginger Scone", 350),
            MenuItem::priced("Chocolate syrup", 150),
            MenuItem::priced("Hazelnut syrup", 150),
            MenuItem::priced("Carmel syrup", 150),
            MenuItem::priced("Sugar Free Vanilla syrup", 150),
            MenuItem::priced("Dark chocolate (Packaged Chocolate)", 300),
        ])
    }

    pub fn items(&self) -> &[MenuItem] {
        &self.items
    }

    pub fn find(&self, name: &str) -> Option<&MenuItem> {
        let name = name.trim();
        self.items.iter().find(|item| item.name.eq_ignore_ascii_case(name))
    }

    /// One `Name - $0.00` line per item, in menu order.
    pub fn render(&self) -> String {
        self.items
            .iter()
            .map(|item| format!("{} - ${:.2}", item.name, item.price))
            .collect::<Vec<_>>()
            .join("\n")
    }
}
