//! Domain models for metering-service.

mod account;
mod operation;
mod plan;
mod usage;

pub use account::{Account, CreditBalance};
pub use operation::{FeatureCostOverride, OperationType, PlanCreditOverride};
pub use plan::Plan;
pub use usage::{RecordUsage, UsageRecord};
