//! Engine defaults, loaded from JSON or `TALLY_*` environment variables.

use serde::{Deserialize, Serialize};

use tally_core::{DEFAULT_DIVIDER, LedgerError, LedgerResult};

use crate::price::MissingPricePolicy;

pub const ENV_DIVIDER: &str = "TALLY_DIVIDER";
pub const ENV_CURRENCY: &str = "TALLY_CURRENCY";
pub const ENV_CREDIT_PATTERN: &str = "TALLY_CREDIT_PATTERN";
pub const ENV_HIDDEN_ACCOUNT: &str = "TALLY_HIDDEN_ACCOUNT";
pub const ENV_MISSING_PRICE: &str = "TALLY_MISSING_PRICE";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Account path separator.
    pub divider: String,
    /// Target currency for accumulation, if any.
    pub currency: Option<String>,
    /// Accounts whose sign is flipped before accumulation.
    pub credit_pattern: Option<String>,
    /// Account dropped from accumulated output.
    pub hidden_account: Option<String>,
    pub missing_price: MissingPricePolicy,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            divider: DEFAULT_DIVIDER.to_string(),
            currency: None,
            credit_pattern: None,
            hidden_account: None,
            missing_price: MissingPricePolicy::default(),
        }
    }
}

impl LedgerConfig {
    pub fn from_json(text: &str) -> LedgerResult<Self> {
        let config: Self =
            serde_json::from_str(text).map_err(|e| LedgerError::config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_env() -> LedgerResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds a config from any key lookup; blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> LedgerResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let divider = match get(ENV_DIVIDER) {
            Some(divider) => divider,
            None => {
                tracing::debug!(
                    key = ENV_DIVIDER,
                    default = DEFAULT_DIVIDER,
                    "using default divider"
                );
                DEFAULT_DIVIDER.to_string()
            }
        };
        let missing_price = match get(ENV_MISSING_PRICE) {
            Some(value) => value.parse()?,
            None => MissingPricePolicy::default(),
        };

        let config = Self {
            divider,
            currency: get(ENV_CURRENCY),
            credit_pattern: get(ENV_CREDIT_PATTERN),
            hidden_account: get(ENV_HIDDEN_ACCOUNT),
            missing_price,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> LedgerResult<()> {
        if self.divider.is_empty() {
            return Err(LedgerError::config("account divider must not be empty"));
        }
        if let Some(pattern) = &self.credit_pattern {
            regex::Regex::new(pattern).map_err(|e| LedgerError::invalid_pattern(e.to_string()))?;
        }
        Ok(())
    }
}
