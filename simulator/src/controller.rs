//! Simulation controller.

use std::sync::Arc;
use std::time::Instant;

use anyhow::{bail, ensure};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use tokio::sync::RwLock;
use tracing::{info, warn};

use bankledger_common::{Account, AccountId, CheckId, LedgerError, UserId};
use bankledger_service::BankService;

use crate::bank::AccountFactory;
use crate::metrics::SimulationMetrics;
use crate::scenario::{AssertCondition, Scenario, ScenarioStep};

/// Drives scenarios and stress runs against a bank service.
pub struct SimulationController {
    service: BankService,
    /// Base seed; each stress worker derives its own generator from it.
    seed: u64,
    /// Seeded accounts the stress run moves money between.
    accounts: Arc<Vec<AccountId>>,
    /// Total balance right after seeding.
    initial_total: Decimal,
    metrics: Arc<RwLock<SimulationMetrics>>,
}

impl SimulationController {
    /// Create a new simulation controller.
    pub fn new(service: BankService, seed: Option<u64>) -> Self {
        Self {
            service,
            seed: seed.unwrap_or_else(rand::random),
            accounts: Arc::new(Vec::new()),
            initial_total: Decimal::ZERO,
            metrics: Arc::new(RwLock::new(SimulationMetrics::new())),
        }
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    /// Seed owners and accounts for a stress run.
    pub async fn initialize(&mut self, count: usize, initial_balance: Decimal) -> anyhow::Result<()> {
        ensure!(count >= 2, "a stress run needs at least two accounts");
        info!(accounts = count, balance = %initial_balance, "Initializing simulation");

        let accounts = AccountFactory::seed(&self.service, count, initial_balance).await?;
        self.accounts = Arc::new(accounts);
        self.initial_total = self.service.total_balance().await?;

        info!(total = %self.initial_total, "Simulation seeded");
        Ok(())
    }

    /// Run a scenario, failing on the first assertion that does not hold.
    pub async fn run_scenario(&self, scenario: Scenario) -> anyhow::Result<()> {
        info!(scenario = %scenario.name, description = %scenario.description, "Running scenario");

        // Error code of the most recent operation step; `None` when it committed.
        let mut last: Option<Option<String>> = None;

        for (index, step) in scenario.steps.iter().enumerate() {
            match step {
                ScenarioStep::Assert { condition } => {
                    self.check(condition, last.as_ref())
                        .await
                        .map_err(|e| anyhow::anyhow!("step {} ({:?}): {}", index + 1, condition, e))?;
                }
                operation => {
                    let started = Instant::now();
                    let outcome = self.execute(operation).await;
                    self.record(&outcome, started).await;
                    last = Some(match outcome {
                        Ok(()) => None,
                        Err(e) => {
                            info!(step = index + 1, code = e.error_code(), "Step refused");
                            Some(e.error_code().to_string())
                        }
                    });
                }
            }
        }

        info!(scenario = %scenario.name, steps = scenario.steps.len(), "Scenario passed");
        Ok(())
    }

    /// Execute a single operation step.
    async fn execute(&self, step: &ScenarioStep) -> Result<(), LedgerError> {
        let service = &self.service;
        match step {
            ScenarioStep::AddUser { user, password } => service
                .register_user(&UserId::new(user.as_str()), password, "client")
                .await
                .map(drop),
            ScenarioStep::OpenAccount {
                account,
                owner,
                balance,
            } => {
                service
                    .add_account(&Account::new(account.as_str(), *balance, owner.as_str()))
                    .await
            }
            ScenarioStep::Deposit { account, amount } => service
                .deposit(&AccountId::new(account.as_str()), *amount)
                .await
                .map(drop),
            ScenarioStep::Withdraw { account, amount } => service
                .withdraw(&AccountId::new(account.as_str()), *amount)
                .await
                .map(drop),
            ScenarioStep::Transfer { from, to, amount } => service
                .transfer(
                    &AccountId::new(from.as_str()),
                    &AccountId::new(to.as_str()),
                    *amount,
                )
                .await
                .map(drop),
            ScenarioStep::DepositCheck {
                check,
                account,
                amount,
            } => service
                .deposit_check(
                    &CheckId::new(check.as_str()),
                    &AccountId::new(account.as_str()),
                    *amount,
                )
                .await
                .map(drop),
            ScenarioStep::ValidateCheck { check } => service
                .validate_check(&CheckId::new(check.as_str()))
                .await
                .map(drop),
            ScenarioStep::Assert { .. } => Ok(()),
        }
    }

    /// Evaluate one assertion against the service and the last outcome.
    async fn check(
        &self,
        condition: &AssertCondition,
        last: Option<&Option<String>>,
    ) -> anyhow::Result<()> {
        let service = &self.service;
        match condition {
            AssertCondition::LastSucceeded => match last {
                Some(None) => Ok(()),
                Some(Some(code)) => bail!("previous step failed with {}", code),
                None => bail!("no operation has run yet"),
            },
            AssertCondition::LastFailedWith { code } => match last {
                Some(Some(actual)) if actual == code => Ok(()),
                Some(Some(actual)) => bail!("expected {}, got {}", code, actual),
                Some(None) => bail!("expected {}, but the step succeeded", code),
                None => bail!("no operation has run yet"),
            },
            AssertCondition::BalanceEquals { account, amount } => {
                let found = service
                    .find_account(&AccountId::new(account.as_str()))
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("account {} not found", account))?;
                ensure!(
                    found.balance == *amount,
                    "balance of {} is {}, expected {}",
                    account,
                    found.balance,
                    amount
                );
                Ok(())
            }
            AssertCondition::TotalEquals { amount } => {
                let total = service.total_balance().await?;
                ensure!(total == *amount, "total is {}, expected {}", total, amount);
                Ok(())
            }
            AssertCondition::PendingChecks { account, count } => {
                let pending = service
                    .unvalidated_checks_for_account(&AccountId::new(account.as_str()))
                    .await?;
                ensure!(
                    pending.len() == *count,
                    "{} pending checks on {}, expected {}",
                    pending.len(),
                    account,
                    count
                );
                Ok(())
            }
            AssertCondition::CheckValidated { check } => {
                let found = service
                    .find_check(&CheckId::new(check.as_str()))
                    .await?
                    .ok_or_else(|| anyhow::anyhow!("check {} not found", check))?;
                ensure!(found.is_validated, "check {} is still pending", check);
                Ok(())
            }
            AssertCondition::Authenticates {
                user,
                password,
                expected,
            } => {
                let ok = service
                    .authenticate_user(&UserId::new(user.as_str()), password)
                    .await?;
                ensure!(ok == *expected, "authentication of {} returned {}", user, ok);
                Ok(())
            }
            AssertCondition::JournalConsistent => {
                let report = service.verify_integrity().await?;
                ensure!(
                    report.is_consistent(),
                    "unbalanced operations: {:?}, drifted accounts: {:?}",
                    report.unbalanced,
                    report.drifted
                );
                Ok(())
            }
        }
    }

    async fn record<T>(&self, outcome: &Result<T, LedgerError>, started: Instant) {
        let mut metrics = self.metrics.write().await;
        match outcome {
            Ok(_) => metrics.record_success(started.elapsed().as_micros() as u64),
            Err(e) if e.is_rejection() => metrics.record_rejection(),
            Err(_) => metrics.record_failure(),
        }
    }

    /// Run concurrent random transfers between the seeded accounts.
    ///
    /// Each worker issues `transfers` transfers of up to `max_amount`.
    pub async fn run_stress(
        &self,
        workers: usize,
        transfers: usize,
        max_amount: Decimal,
    ) -> anyhow::Result<()> {
        ensure!(self.accounts.len() >= 2, "simulation is not initialized");
        let max_cents = (max_amount * Decimal::ONE_HUNDRED)
            .trunc()
            .to_i64()
            .filter(|c| *c >= 1)
            .ok_or_else(|| anyhow::anyhow!("max amount must be at least 0.01"))?;

        info!(workers, transfers, max_amount = %max_amount, seed = self.seed, "Starting stress run");

        let handles: Vec<_> = (0..workers)
            .map(|worker| {
                let service = self.service.clone();
                let accounts = self.accounts.clone();
                let mut rng = StdRng::seed_from_u64(self.seed.wrapping_add(worker as u64));

                tokio::spawn(async move {
                    let mut metrics = SimulationMetrics::new();
                    for _ in 0..transfers {
                        let from = rng.gen_range(0..accounts.len());
                        let mut to = rng.gen_range(0..accounts.len());
                        while to == from {
                            to = rng.gen_range(0..accounts.len());
                        }
                        let amount = Decimal::new(rng.gen_range(1..=max_cents), 2);

                        let started = Instant::now();
                        match service.transfer(&accounts[from], &accounts[to], amount).await {
                            Ok(_) => metrics.record_success(started.elapsed().as_micros() as u64),
                            Err(e) if e.is_rejection() => metrics.record_rejection(),
                            Err(e) => {
                                warn!(worker, error = %e, "Transfer failed");
                                metrics.record_failure();
                            }
                        }
                    }
                    metrics
                })
            })
            .collect();

        for result in futures::future::join_all(handles).await {
            let worker_metrics = result?;
            self.metrics.write().await.merge(&worker_metrics);
        }

        Ok(())
    }

    /// Check that no balance went negative and the total is unchanged.
    pub async fn verify(&self) -> anyhow::Result<()> {
        let accounts = self.service.all_accounts().await?;
        if let Some(account) = accounts.iter().find(|a| a.balance < Decimal::ZERO) {
            bail!(
                "account {} has negative balance {}",
                account.account_id,
                account.balance
            );
        }

        let total = self.service.total_balance().await?;
        ensure!(
            total == self.initial_total,
            "total balance drifted from {} to {}",
            self.initial_total,
            total
        );

        let report = self.service.verify_integrity().await?;
        ensure!(
            report.is_consistent(),
            "{} unbalanced transfers and {} drifted balances in the journal",
            report.unbalanced.len(),
            report.drifted.len()
        );

        info!(
            total = %total,
            transfers_checked = report.operations_checked,
            "Ledger verified"
        );
        Ok(())
    }

    /// Get simulation metrics.
    pub async fn metrics(&self) -> SimulationMetrics {
        self.metrics.read().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankledger_service::ServiceConfig;
    use rust_decimal_macros::dec;

    async fn controller() -> SimulationController {
        let service = BankService::open(ServiceConfig::in_memory()).await.unwrap();
        SimulationController::new(service, Some(7))
    }

    #[tokio::test]
    async fn test_builtin_scenarios_pass() {
        for name in ["transfer-basic", "check-lifecycle", "overdraft-rejection"] {
            let controller = controller().await;
            controller
                .run_scenario(Scenario::load(name).unwrap())
                .await
                .unwrap_or_else(|e| panic!("{} failed: {}", name, e));
        }
    }

    #[tokio::test]
    async fn test_failed_assertion_is_reported() {
        let controller = controller().await;
        let scenario = Scenario::from_json(
            r#"{
                "name": "wrong",
                "steps": [
                    {"op": "add_user", "user": "bob", "password": "pw"},
                    {"op": "open_account", "account": "B1", "owner": "bob", "balance": "10"},
                    {"op": "assert", "condition": {"check": "balance_equals", "account": "B1", "amount": "11"}}
                ]
            }"#,
        )
        .unwrap();

        let err = controller.run_scenario(scenario).await.unwrap_err();
        assert!(err.to_string().contains("step 3"));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_stress_run_conserves_funds() {
        let mut controller = controller().await;
        controller.initialize(4, dec!(100)).await.unwrap();

        controller.run_stress(4, 25, dec!(60)).await.unwrap();
        controller.verify().await.unwrap();

        let metrics = controller.metrics().await;
        assert_eq!(metrics.total_operations, 100);
        assert_eq!(metrics.failed_operations, 0);
        assert!(metrics.successful_operations > 0);
    }

    #[tokio::test]
    async fn test_stress_requires_initialization() {
        let controller = controller().await;
        assert!(controller.run_stress(1, 1, dec!(1)).await.is_err());
    }
}
