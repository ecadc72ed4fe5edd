//! Numbered schema migrations for the relational driver
//!
//! The driver itself lives outside this workspace; the schema it must apply
//! is versioned here as data. Every migration is idempotent (`IF EXISTS` /
//! `IF NOT EXISTS`) and carries its inverse.

/// One schema migration step
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    /// Ordinal; migrations apply in ascending order
    pub version: u32,

    /// Short name
    pub name: &'static str,

    /// Forward SQL
    pub up: &'static str,

    /// Inverse SQL
    pub down: &'static str,
}

/// All migrations, in order
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "accounts",
        up: r#"
CREATE TABLE IF NOT EXISTS accounts (
    account_id   TEXT PRIMARY KEY,
    customer_id  TEXT NOT NULL,
    account_type TEXT NOT NULL CHECK (account_type IN ('DEPOSIT', 'LOAN', 'CREDIT', 'EQUITY', 'SUSPENSE')),
    currency     TEXT NOT NULL CHECK (currency IN ('USD', 'EUR', 'GBP', 'NOK', 'SEK', 'DKK')),
    account_name TEXT,
    created_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at   TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_accounts_customer ON accounts (customer_id);
"#,
        down: "DROP TABLE IF EXISTS accounts;",
    },
    Migration {
        version: 2,
        name: "payment_plans",
        up: r#"
CREATE TABLE IF NOT EXISTS payment_plans (
    account_id         TEXT PRIMARY KEY REFERENCES accounts (account_id),
    principal          BIGINT NOT NULL,
    interest_rate      NUMERIC(5, 2) NOT NULL,
    term_months        INT NOT NULL,
    monthly_payment    BIGINT NOT NULL,
    remaining_payments INT NOT NULL,
    loan_type          TEXT NOT NULL CHECK (loan_type IN ('ANNUITY', 'SERIAL')),
    payment_frequency  TEXT NOT NULL CHECK (payment_frequency IN ('WEEKLY', 'BI_WEEKLY', 'MONTHLY')),
    fees               JSONB NOT NULL DEFAULT '[]',
    total_loan_amount  BIGINT NOT NULL,
    next_payment_date  DATE NOT NULL,
    customer_id        TEXT NOT NULL,
    created_at         TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at         TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_payment_plans_due ON payment_plans (next_payment_date)
    WHERE remaining_payments > 0;
"#,
        down: "DROP TABLE IF EXISTS payment_plans;",
    },
    Migration {
        version: 3,
        name: "transfers",
        up: r#"
CREATE TABLE IF NOT EXISTS transfers (
    transfer_id     TEXT PRIMARY KEY,
    from_account_id TEXT NOT NULL,
    to_account_id   TEXT NOT NULL,
    amount          BIGINT NOT NULL,
    currency        TEXT NOT NULL,
    description     TEXT,
    created_at      TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_transfers_from ON transfers (from_account_id, created_at DESC);
CREATE INDEX IF NOT EXISTS idx_transfers_to ON transfers (to_account_id, created_at DESC);
"#,
        down: "DROP TABLE IF EXISTS transfers;",
    },
    Migration {
        version: 4,
        name: "external_transactions",
        up: r#"
CREATE TABLE IF NOT EXISTS external_transactions (
    external_transaction_id TEXT PRIMARY KEY,
    account_id              TEXT NOT NULL,
    transfer_id             TEXT,
    transaction_type        TEXT NOT NULL CHECK (transaction_type IN ('SEPA_OUTGOING', 'SEPA_INCOMING')),
    amount                  BIGINT NOT NULL,
    currency                TEXT NOT NULL,
    status                  TEXT NOT NULL CHECK (status IN ('PENDING', 'SETTLED', 'FAILED')),
    external_bank_info      JSONB NOT NULL,
    description             TEXT,
    created_at              TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at              TIMESTAMPTZ NOT NULL DEFAULT now()
);
CREATE INDEX IF NOT EXISTS idx_external_transactions_account ON external_transactions (account_id);
"#,
        down: "DROP TABLE IF EXISTS external_transactions;",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_are_ordered_and_unique() {
        for (i, migration) in MIGRATIONS.iter().enumerate() {
            assert_eq!(migration.version, i as u32 + 1);
        }
    }

    #[test]
    fn test_migrations_are_idempotent_and_reversible() {
        for migration in MIGRATIONS {
            assert!(migration.up.contains("IF NOT EXISTS"), "{}", migration.name);
            assert!(migration.down.contains("IF EXISTS"), "{}", migration.name);
        }
    }
}
