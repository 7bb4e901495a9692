//! Table definitions. Every statement is idempotent.

pub(crate) const CREATE_USERS: &str = "CREATE TABLE IF NOT EXISTS users (
    id TEXT PRIMARY KEY,
    password TEXT NOT NULL,
    role TEXT NOT NULL
)";

// Balances are decimal text so no precision is lost in SQLite's REAL.
pub(crate) const CREATE_ACCOUNTS: &str = "CREATE TABLE IF NOT EXISTS accounts (
    accountId TEXT PRIMARY KEY,
    balance TEXT NOT NULL,
    ownerId TEXT NOT NULL,
    FOREIGN KEY (ownerId) REFERENCES users (id)
)";

pub(crate) const CREATE_CHECKS: &str = "CREATE TABLE IF NOT EXISTS checks (
    checkId TEXT PRIMARY KEY,
    amount TEXT NOT NULL,
    accountId TEXT NOT NULL,
    isValidated BOOLEAN NOT NULL DEFAULT 0,
    FOREIGN KEY (accountId) REFERENCES accounts (accountId)
)";

// No foreign key: history outlives the accounts it describes.
pub(crate) const CREATE_LEDGER_ENTRIES: &str = "CREATE TABLE IF NOT EXISTS ledger_entries (
    entryId BLOB PRIMARY KEY,
    operationId BLOB NOT NULL,
    operation TEXT NOT NULL,
    accountId TEXT NOT NULL,
    entryType TEXT NOT NULL,
    amount TEXT NOT NULL,
    balanceAfter TEXT NOT NULL,
    reference TEXT,
    createdAt TEXT NOT NULL
)";

pub(crate) const CREATE_INDEXES: [&str; 4] = [
    "CREATE INDEX IF NOT EXISTS idx_accounts_owner ON accounts (ownerId)",
    "CREATE INDEX IF NOT EXISTS idx_checks_account ON checks (accountId, isValidated)",
    "CREATE INDEX IF NOT EXISTS idx_entries_account ON ledger_entries (accountId)",
    "CREATE INDEX IF NOT EXISTS idx_entries_operation ON ledger_entries (operationId)",
];

/// All bootstrap statements in dependency order.
pub(crate) fn statements() -> impl Iterator<Item = &'static str> {
    [CREATE_USERS, CREATE_ACCOUNTS, CREATE_CHECKS, CREATE_LEDGER_ENTRIES]
        .into_iter()
        .chain(CREATE_INDEXES)
}
