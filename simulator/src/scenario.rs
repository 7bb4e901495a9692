//! Simulation scenarios.

use std::path::Path;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A simulation scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    /// Scenario name.
    pub name: String,
    /// Description.
    #[serde(default)]
    pub description: String,
    /// Steps in the scenario.
    pub steps: Vec<ScenarioStep>,
}

/// A step in a scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Register a user with a plaintext password.
    AddUser { user: String, password: String },
    /// Create an account with an opening balance.
    OpenAccount {
        account: String,
        owner: String,
        balance: Decimal,
    },
    Deposit { account: String, amount: Decimal },
    Withdraw { account: String, amount: Decimal },
    Transfer {
        from: String,
        to: String,
        amount: Decimal,
    },
    DepositCheck {
        check: String,
        account: String,
        amount: Decimal,
    },
    ValidateCheck { check: String },
    /// Assert a condition.
    Assert { condition: AssertCondition },
}

/// Conditions that can be asserted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "check", rename_all = "snake_case")]
pub enum AssertCondition {
    /// The previous operation step committed.
    LastSucceeded,
    /// The previous operation step failed with this error code.
    LastFailedWith { code: String },
    BalanceEquals { account: String, amount: Decimal },
    /// Sum of all balances.
    TotalEquals { amount: Decimal },
    PendingChecks { account: String, count: usize },
    CheckValidated { check: String },
    Authenticates {
        user: String,
        password: String,
        expected: bool,
    },
    /// Every journaled transfer is balanced.
    JournalConsistent,
}

impl Scenario {
    /// Load a built-in scenario by name, or a JSON scenario file by path.
    pub fn load(name: &str) -> anyhow::Result<Self> {
        match name {
            "transfer-basic" => Ok(Self::transfer_basic()),
            "check-lifecycle" => Ok(Self::check_lifecycle()),
            "overdraft-rejection" => Ok(Self::overdraft_rejection()),
            path if path.ends_with(".json") || Path::new(path).is_file() => Self::from_file(path),
            _ => Err(anyhow::anyhow!("Unknown scenario: {}", name)),
        }
    }

    /// Parse a scenario from a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read scenario {}: {}", path.display(), e))?;
        Self::from_json(&text)
    }

    pub fn from_json(text: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(text)?)
    }

    fn owner_with_accounts(accounts: &[(&str, i64)]) -> Vec<ScenarioStep> {
        let mut steps = vec![ScenarioStep::AddUser {
            user: "alice".to_string(),
            password: "wonderland".to_string(),
        }];
        steps.extend(accounts.iter().map(|(id, balance)| ScenarioStep::OpenAccount {
            account: id.to_string(),
            owner: "alice".to_string(),
            balance: Decimal::from(*balance),
        }));
        steps
    }

    fn assert_balance(account: &str, amount: Decimal) -> ScenarioStep {
        ScenarioStep::Assert {
            condition: AssertCondition::BalanceEquals {
                account: account.to_string(),
                amount,
            },
        }
    }

    fn assert_failed(code: &str) -> ScenarioStep {
        ScenarioStep::Assert {
            condition: AssertCondition::LastFailedWith {
                code: code.to_string(),
            },
        }
    }

    /// Two accounts of 100; moving 20 leaves 80 and 120.
    fn transfer_basic() -> Self {
        let mut steps = Self::owner_with_accounts(&[("A1", 100), ("A2", 100)]);
        steps.extend([
            ScenarioStep::Transfer {
                from: "A1".to_string(),
                to: "A2".to_string(),
                amount: Decimal::from(20),
            },
            ScenarioStep::Assert {
                condition: AssertCondition::LastSucceeded,
            },
            Self::assert_balance("A1", Decimal::from(80)),
            Self::assert_balance("A2", Decimal::from(120)),
            ScenarioStep::Assert {
                condition: AssertCondition::TotalEquals {
                    amount: Decimal::from(200),
                },
            },
            ScenarioStep::Assert {
                condition: AssertCondition::Authenticates {
                    user: "alice".to_string(),
                    password: "wonderland".to_string(),
                    expected: true,
                },
            },
            ScenarioStep::Assert {
                condition: AssertCondition::JournalConsistent,
            },
        ]);

        Self {
            name: "transfer-basic".to_string(),
            description: "Fund-checked transfer between two accounts".to_string(),
            steps,
        }
    }

    /// Deposit a check, validate it once, then fail to validate it again.
    fn check_lifecycle() -> Self {
        let mut steps = Self::owner_with_accounts(&[("A1", 100)]);
        steps.extend([
            ScenarioStep::DepositCheck {
                check: "C1".to_string(),
                account: "A1".to_string(),
                amount: Decimal::new(5025, 2),
            },
            Self::assert_balance("A1", Decimal::from(100)),
            ScenarioStep::Assert {
                condition: AssertCondition::PendingChecks {
                    account: "A1".to_string(),
                    count: 1,
                },
            },
            ScenarioStep::ValidateCheck {
                check: "C1".to_string(),
            },
            ScenarioStep::Assert {
                condition: AssertCondition::CheckValidated {
                    check: "C1".to_string(),
                },
            },
            Self::assert_balance("A1", Decimal::new(15025, 2)),
            ScenarioStep::ValidateCheck {
                check: "C1".to_string(),
            },
            Self::assert_failed("CHECK_NOT_FOUND"),
            Self::assert_balance("A1", Decimal::new(15025, 2)),
            ScenarioStep::Assert {
                condition: AssertCondition::PendingChecks {
                    account: "A1".to_string(),
                    count: 0,
                },
            },
        ]);

        Self {
            name: "check-lifecycle".to_string(),
            description: "Check deposit, single validation and repeat refusal".to_string(),
            steps,
        }
    }

    /// Overdrawing transfers and withdrawals are refused without side effects.
    fn overdraft_rejection() -> Self {
        let mut steps = Self::owner_with_accounts(&[("A1", 50), ("A2", 10)]);
        steps.extend([
            ScenarioStep::Transfer {
                from: "A2".to_string(),
                to: "A1".to_string(),
                amount: Decimal::from(11),
            },
            Self::assert_failed("TRANSFER_REJECTED"),
            ScenarioStep::Withdraw {
                account: "A2".to_string(),
                amount: Decimal::from(25),
            },
            Self::assert_failed("INSUFFICIENT_FUNDS"),
            ScenarioStep::Transfer {
                from: "A1".to_string(),
                to: "nowhere".to_string(),
                amount: Decimal::from(1),
            },
            Self::assert_failed("TRANSFER_REJECTED"),
            ScenarioStep::Deposit {
                account: "A2".to_string(),
                amount: Decimal::ZERO,
            },
            Self::assert_failed("INVALID_AMOUNT"),
            Self::assert_balance("A1", Decimal::from(50)),
            Self::assert_balance("A2", Decimal::from(10)),
            ScenarioStep::Withdraw {
                account: "A2".to_string(),
                amount: Decimal::from(10),
            },
            ScenarioStep::Assert {
                condition: AssertCondition::LastSucceeded,
            },
            Self::assert_balance("A2", Decimal::ZERO),
        ]);

        Self {
            name: "overdraft-rejection".to_string(),
            description: "Refused overdrafts leave every balance untouched".to_string(),
            steps,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_builtins() {
        for name in ["transfer-basic", "check-lifecycle", "overdraft-rejection"] {
            let scenario = Scenario::load(name).unwrap();
            assert_eq!(scenario.name, name);
            assert!(!scenario.steps.is_empty());
        }
        assert!(Scenario::load("no-such-scenario").is_err());
    }

    #[test]
    fn test_parse_json() {
        let scenario = Scenario::from_json(
            r#"{
                "name": "custom",
                "steps": [
                    {"op": "add_user", "user": "bob", "password": "pw"},
                    {"op": "open_account", "account": "B1", "owner": "bob", "balance": "12.50"},
                    {"op": "deposit", "account": "B1", "amount": "0.50"},
                    {"op": "assert", "condition": {"check": "balance_equals", "account": "B1", "amount": "13"}}
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(scenario.name, "custom");
        assert_eq!(scenario.steps.len(), 4);
        assert!(matches!(
            &scenario.steps[3],
            ScenarioStep::Assert {
                condition: AssertCondition::BalanceEquals { .. }
            }
        ));
    }
}
