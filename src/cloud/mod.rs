/// This module provides the REST accessors for a cloud account's plan and
/// usage data.
pub mod plans;
