//! Plan registry.
//!
//! The service sells a closed set of prediction plans. Checkout and webhook
//! handling both validate plan identifiers against this registry before
//! honoring them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use crate::config::PlanPrices;

/// A single subscription plan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    /// Internal plan identifier (e.g. "monthly").
    pub id: String,
    /// Display name shown to users.
    pub name: String,
    /// Payment provider price ID.
    pub price_id: String,
    /// Length of one billing period in days; plan expiry is the record's
    /// last update plus this.
    pub period_days: u32,
    /// Whether this plan unlocks the external analytics application token.
    pub premium: bool,
}

impl Plan {
    /// Billing period as a [`Duration`].
    #[must_use]
    pub fn period(&self) -> Duration {
        Duration::from_secs(u64::from(self.period_days) * 86_400)
    }
}

/// Immutable registry of the plans on sale.
///
/// Cheap to clone; shared across handlers.
#[derive(Debug, Clone)]
pub struct Plans {
    inner: Arc<PlansInner>,
}

#[derive(Debug)]
struct PlansInner {
    by_id: HashMap<String, Plan>,
    order: Vec<String>,
    default_id: String,
}

impl Plans {
    /// Start building a plan registry.
    #[must_use]
    pub fn builder() -> PlansBuilder {
        PlansBuilder {
            plans: Vec::new(),
            default_id: None,
        }
    }

    /// The standard goalcast plan set, wired to configured price IDs.
    ///
    /// Yearly is the premium tier that unlocks the analytics token.
    #[must_use]
    pub fn standard(prices: &PlanPrices) -> Self {
        Self::builder()
            .plan("monthly")
            .display_name("Monthly")
            .price(&prices.monthly)
            .period_days(30)
            .done()
            .plan("quarterly")
            .display_name("Quarterly")
            .price(&prices.quarterly)
            .period_days(90)
            .done()
            .plan("yearly")
            .display_name("Yearly")
            .price(&prices.yearly)
            .period_days(365)
            .premium()
            .done()
            .default_plan("monthly")
            .build()
    }

    /// Look up a plan by its internal ID.
    #[must_use]
    pub fn get(&self, plan_id: &str) -> Option<&Plan> {
        self.inner.by_id.get(plan_id)
    }

    /// Look up a plan by its payment provider price ID.
    #[must_use]
    pub fn find_by_price(&self, price_id: &str) -> Option<&Plan> {
        self.inner.by_id.values().find(|p| p.price_id == price_id)
    }

    /// Whether `plan_id` names a plan in the registry.
    #[must_use]
    pub fn contains(&self, plan_id: &str) -> bool {
        self.inner.by_id.contains_key(plan_id)
    }

    /// The plan assumed when webhook metadata names none.
    #[must_use]
    pub fn default_plan(&self) -> &Plan {
        &self.inner.by_id[&self.inner.default_id]
    }

    /// Iterate plans in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = &Plan> {
        self.inner.order.iter().map(|id| &self.inner.by_id[id])
    }
}

/// Builder for [`Plans`].
#[must_use = "builder does nothing until you call build()"]
pub struct PlansBuilder {
    plans: Vec<Plan>,
    default_id: Option<String>,
}

impl PlansBuilder {
    /// Begin defining a plan.
    pub fn plan(self, id: impl Into<String>) -> PlanBuilder {
        PlanBuilder {
            plans: self,
            plan: Plan {
                id: id.into(),
                name: String::new(),
                price_id: String::new(),
                period_days: 30,
                premium: false,
            },
        }
    }

    /// Set which plan is assumed when none is specified.
    pub fn default_plan(mut self, id: impl Into<String>) -> Self {
        self.default_id = Some(id.into());
        self
    }

    /// Finalize the registry.
    ///
    /// # Panics
    ///
    /// Panics if no plans were defined, a plan is missing its price ID, or
    /// the default plan does not exist. Plan registries are built once at
    /// startup from static wiring, so these are programmer errors.
    pub fn build(self) -> Plans {
        assert!(!self.plans.is_empty(), "plan registry must not be empty");

        let mut by_id = HashMap::new();
        let mut order = Vec::new();
        for plan in self.plans {
            assert!(
                !plan.price_id.is_empty(),
                "plan '{}' is missing a price ID",
                plan.id
            );
            order.push(plan.id.clone());
            by_id.insert(plan.id.clone(), plan);
        }

        let default_id = self.default_id.unwrap_or_else(|| order[0].clone());
        assert!(
            by_id.contains_key(&default_id),
            "default plan '{}' is not defined",
            default_id
        );

        Plans {
            inner: Arc::new(PlansInner {
                by_id,
                order,
                default_id,
            }),
        }
    }
}

/// Builder for a single plan inside a [`PlansBuilder`].
#[must_use = "call done() to add the plan"]
pub struct PlanBuilder {
    plans: PlansBuilder,
    plan: Plan,
}

impl PlanBuilder {
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.plan.name = name.into();
        self
    }

    pub fn price(mut self, price_id: impl Into<String>) -> Self {
        self.plan.price_id = price_id.into();
        self
    }

    pub fn period_days(mut self, days: u32) -> Self {
        self.plan.period_days = days;
        self
    }

    /// Mark this plan as the premium tier.
    pub fn premium(mut self) -> Self {
        self.plan.premium = true;
        self
    }

    /// Finish this plan and return to the registry builder.
    pub fn done(mut self) -> PlansBuilder {
        if self.plan.name.is_empty() {
            self.plan.name = self.plan.id.clone();
        }
        self.plans.plans.push(self.plan);
        self.plans
    }
}
