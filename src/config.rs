//! Billing policy configuration.

use std::env;

use thiserror::Error;

/// Last day of the month that still bills against the period ending in that month.
pub const DEFAULT_CUT_OFF_DAY: u32 = 20;

/// Environment variable overriding [`DEFAULT_CUT_OFF_DAY`].
pub const CUT_OFF_DAY_VAR: &str = "CHIT_CUT_OFF_DAY";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("CHIT_CUT_OFF_DAY: '{0}' is not a day of month")]
    Unparsable(String),
    #[error("CHIT_CUT_OFF_DAY: cut-off day {0} must be within 1..=27")]
    OutOfRange(u32),
}

/// Calendar policy shared by the due-number and balance calculators.
///
/// The day after the cut-off is the start of a new billing cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BillingPolicy {
    cut_off_day: u32,
}

impl BillingPolicy {
    pub fn new(cut_off_day: u32) -> Result<Self, ConfigError> {
        // the cycle start day must exist in every month
        if !(1..=27).contains(&cut_off_day) {
            return Err(ConfigError::OutOfRange(cut_off_day));
        }
        Ok(Self { cut_off_day })
    }

    /// Read the policy from the environment, falling back to the default.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::parse(env::var(CUT_OFF_DAY_VAR).ok().as_deref())
    }

    fn parse(value: Option<&str>) -> Result<Self, ConfigError> {
        match value.map(str::trim) {
            None | Some("") => Ok(Self::default()),
            Some(raw) => {
                let day = raw
                    .parse()
                    .map_err(|_| ConfigError::Unparsable(raw.to_string()))?;
                Self::new(day)
            }
        }
    }

    pub fn cut_off_day(&self) -> u32 {
        self.cut_off_day
    }

    pub fn cycle_start_day(&self) -> u32 {
        self.cut_off_day + 1
    }
}

impl Default for BillingPolicy {
    fn default() -> Self {
        Self {
            cut_off_day: DEFAULT_CUT_OFF_DAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_policy_cuts_off_on_the_20th() {
        let policy = BillingPolicy::default();
        assert_eq!(policy.cut_off_day(), 20);
        assert_eq!(policy.cycle_start_day(), 21);
    }

    #[test]
    fn parse_missing_or_blank_uses_default() {
        assert_eq!(BillingPolicy::parse(None), Ok(BillingPolicy::default()));
        assert_eq!(BillingPolicy::parse(Some("  ")), Ok(BillingPolicy::default()));
    }

    #[test]
    fn parse_valid_day() {
        let policy = BillingPolicy::parse(Some(" 15 ")).unwrap();
        assert_eq!(policy.cut_off_day(), 15);
        assert_eq!(policy.cycle_start_day(), 16);
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(
            BillingPolicy::parse(Some("twenty")),
            Err(ConfigError::Unparsable("twenty".to_string()))
        );
    }

    #[test]
    fn new_rejects_days_missing_from_short_months() {
        assert_eq!(BillingPolicy::new(0), Err(ConfigError::OutOfRange(0)));
        assert_eq!(BillingPolicy::new(28), Err(ConfigError::OutOfRange(28)));
        assert!(BillingPolicy::new(27).is_ok());
    }
}
