//! Ledger engine configuration.

use bankledger_common::{LedgerError, Result, DEFAULT_MAX_SCALE};

/// Largest scale `rust_decimal` can represent.
const MAX_DECIMAL_SCALE: u32 = 28;

/// Business rules applied by the engine.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// Let withdrawals drive a balance below zero. Transfers are always
    /// fund-checked regardless.
    pub allow_overdraft: bool,
    /// Maximum fractional digits accepted in an amount.
    pub max_amount_scale: u32,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            allow_overdraft: false,
            max_amount_scale: DEFAULT_MAX_SCALE,
        }
    }
}

impl LedgerConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(flag) = std::env::var("BANKLEDGER_ALLOW_OVERDRAFT") {
            if let Ok(flag) = flag.parse() {
                config.allow_overdraft = flag;
            }
        }

        if let Ok(scale) = std::env::var("BANKLEDGER_MAX_AMOUNT_SCALE") {
            if let Ok(scale) = scale.parse() {
                config.max_amount_scale = scale;
            }
        }

        config
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.max_amount_scale > MAX_DECIMAL_SCALE {
            return Err(LedgerError::ConfigurationError(format!(
                "Max amount scale cannot exceed {}",
                MAX_DECIMAL_SCALE
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = LedgerConfig::default();
        assert!(config.validate().is_ok());
        assert!(!config.allow_overdraft);
    }

    #[test]
    fn test_invalid_scale() {
        let config = LedgerConfig {
            max_amount_scale: 40,
            ..LedgerConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
