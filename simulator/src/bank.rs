//! Seed data: owners and funded accounts for a simulation run.

use rust_decimal::Decimal;
use tracing::info;

use bankledger_common::{Account, AccountId, UserId};
use bankledger_service::BankService;

const OWNER_NAMES: [&str; 10] = [
    "alpha", "beta", "central", "delta", "eastern", "first", "global", "harbor", "inter", "jade",
];

/// Password given to every seeded owner.
pub const SEED_PASSWORD: &str = "simulator";

/// Builds the account set a run starts from.
pub struct AccountFactory;

impl AccountFactory {
    /// Owner of the i-th seeded account. Owners are reused round-robin.
    pub fn owner_for(index: usize) -> UserId {
        let name = OWNER_NAMES[index % OWNER_NAMES.len()];
        if index < OWNER_NAMES.len() {
            UserId::new(name)
        } else {
            UserId::new(format!("{}-{}", name, index / OWNER_NAMES.len()))
        }
    }

    /// Create N accounts with the same opening balance.
    pub fn create_accounts(count: usize, initial_balance: Decimal) -> Vec<Account> {
        (0..count)
            .map(|i| {
                Account::new(
                    format!("ACC-{:03}", i + 1),
                    initial_balance,
                    Self::owner_for(i),
                )
            })
            .collect()
    }

    /// Persist owners and accounts, skipping any already present.
    pub async fn seed(
        service: &BankService,
        count: usize,
        initial_balance: Decimal,
    ) -> anyhow::Result<Vec<AccountId>> {
        let accounts = Self::create_accounts(count, initial_balance);

        for account in &accounts {
            if service.find_user(&account.owner_id).await?.is_none() {
                service
                    .register_user(&account.owner_id, SEED_PASSWORD, "client")
                    .await?;
            }
            if service.find_account(&account.account_id).await?.is_none() {
                service.add_account(account).await?;
                info!(account = %account.account_id, owner = %account.owner_id, balance = %initial_balance, "Seeded account");
            }
        }

        Ok(accounts.into_iter().map(|a| a.account_id).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bankledger_service::ServiceConfig;
    use rust_decimal_macros::dec;

    #[test]
    fn test_owner_names_wrap() {
        assert_eq!(AccountFactory::owner_for(0).as_str(), "alpha");
        assert_eq!(AccountFactory::owner_for(10).as_str(), "alpha-1");
        assert_eq!(AccountFactory::owner_for(23).as_str(), "delta-2");
    }

    #[tokio::test]
    async fn test_seed_is_repeatable() {
        let service = BankService::open(ServiceConfig::in_memory()).await.unwrap();

        let ids = AccountFactory::seed(&service, 3, dec!(50)).await.unwrap();
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].as_str(), "ACC-001");

        AccountFactory::seed(&service, 3, dec!(50)).await.unwrap();
        assert_eq!(service.total_balance().await.unwrap(), dec!(150));
        assert!(service
            .authenticate_user(&UserId::new("beta"), SEED_PASSWORD)
            .await
            .unwrap());
    }
}
