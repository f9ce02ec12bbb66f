use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Deserialize, Serialize, PartialEq)]
pub struct Plan {
    pub id: String,
    pub name: String,
    pub price: Decimal,
    pub days: u32,
    /// Advertised return rate, shown as-is.
    pub returns: String,
}

#[derive(Clone, Debug, Default)]
pub struct PlanCatalog {
    plans: Vec<Plan>,
}

impl PlanCatalog {
    pub fn new(plans: Vec<Plan>) -> Self {
        Self { plans }
    }

    pub fn find(&self, id: &str) -> Option<&Plan> {
        self.plans.iter().find(|plan| plan.id == id)
    }

    pub fn plans(&self) -> &[Plan] {
        &self.plans
    }
}
