//! Account ledger.
//!
//! `Bank` enforces the ledger invariants: one account per (scope, owner),
//! balances never negative, every mutation observed as a single atomic step.
//! A single mutex guards the in-memory account map and is held across the
//! full read-modify-write *and* the save tail effect — a mutation is only
//! acknowledged once the snapshot is durably written, and a failed save rolls
//! the in-memory change back so nothing is half-committed.

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::Mutex;
use tracing::info;

use crate::errors::BankError;
use crate::models::Account;
use crate::storage::{AccountMap, LedgerStore, StorageError};

pub struct Bank {
    store: Box<dyn LedgerStore>,
    inner: Mutex<BankInner>,
}

struct BankInner {
    accounts: AccountMap,
    /// Balances from the pre-scope document format, consumed once at
    /// registration (one-time import, not steady-state bank data).
    legacy_balances: HashMap<String, i64>,
}

impl Bank {
    /// Load the accounts document and build the ledger.
    pub fn new(store: Box<dyn LedgerStore>) -> Result<Self, StorageError> {
        let loaded = store.load()?;
        Ok(Self {
            store,
            inner: Mutex::new(BankInner {
                accounts: loaded.accounts,
                legacy_balances: loaded.legacy_balances,
            }),
        })
    }

    /// Register a new account. Fails if one already exists for the key.
    ///
    /// If a legacy balance is pending for this owner it seeds the account
    /// instead of `initial_balance` and is consumed.
    pub fn create_account(
        &self,
        scope_id: &str,
        owner_id: &str,
        display_name: &str,
        initial_balance: i64,
    ) -> Result<Account, BankError> {
        if initial_balance < 0 {
            return Err(BankError::NegativeValue);
        }
        let mut inner = self.inner.lock();
        let scope_existed = inner.accounts.contains_key(scope_id);
        if scope_existed && inner.accounts[scope_id].contains_key(owner_id) {
            return Err(BankError::AccountAlreadyExists);
        }

        let legacy = inner.legacy_balances.remove(owner_id);
        let account = Account {
            scope_id: scope_id.to_string(),
            owner_id: owner_id.to_string(),
            display_name: display_name.to_string(),
            balance: legacy.unwrap_or(initial_balance),
            created_at: Utc::now().naive_utc(),
        };
        inner
            .accounts
            .entry(scope_id.to_string())
            .or_default()
            .insert(owner_id.to_string(), account.clone());

        if let Err(e) = self.store.save(&inner.accounts) {
            if let Some(owners) = inner.accounts.get_mut(scope_id) {
                owners.remove(owner_id);
            }
            if !scope_existed {
                inner.accounts.remove(scope_id);
            }
            if let Some(balance) = legacy {
                inner.legacy_balances.insert(owner_id.to_string(), balance);
            }
            return Err(BankError::Storage(e));
        }

        info!(
            scope = scope_id,
            owner = owner_id,
            balance = account.balance,
            migrated = legacy.is_some(),
            "account registered"
        );
        Ok(account)
    }

    pub fn account_exists(&self, scope_id: &str, owner_id: &str) -> bool {
        self.inner
            .lock()
            .accounts
            .get(scope_id)
            .map(|owners| owners.contains_key(owner_id))
            .unwrap_or(false)
    }

    pub fn get_account(&self, scope_id: &str, owner_id: &str) -> Result<Account, BankError> {
        self.inner
            .lock()
            .accounts
            .get(scope_id)
            .and_then(|owners| owners.get(owner_id))
            .cloned()
            .ok_or(BankError::NoAccount)
    }

    pub fn get_balance(&self, scope_id: &str, owner_id: &str) -> Result<i64, BankError> {
        self.get_account(scope_id, owner_id).map(|a| a.balance)
    }

    /// Whether the account can cover `amount`. A missing account propagates
    /// as `NoAccount` rather than reading as "cannot spend".
    pub fn can_spend(&self, scope_id: &str, owner_id: &str, amount: i64) -> Result<bool, BankError> {
        Ok(self.get_balance(scope_id, owner_id)? >= amount)
    }

    /// Add credits. Returns the new balance.
    pub fn deposit(&self, scope_id: &str, owner_id: &str, amount: i64) -> Result<i64, BankError> {
        if amount < 0 {
            return Err(BankError::NegativeValue);
        }
        // Balances saturate at i64::MAX rather than wrapping.
        self.update_balance(scope_id, owner_id, |balance| Ok(balance.saturating_add(amount)))
    }

    /// Remove credits. Returns the new balance.
    pub fn withdraw(&self, scope_id: &str, owner_id: &str, amount: i64) -> Result<i64, BankError> {
        if amount < 0 {
            return Err(BankError::NegativeValue);
        }
        self.update_balance(scope_id, owner_id, |balance| {
            if balance < amount {
                Err(BankError::InsufficientBalance)
            } else {
                Ok(balance - amount)
            }
        })
    }

    /// Unconditionally overwrite the balance.
    pub fn set_balance(&self, scope_id: &str, owner_id: &str, amount: i64) -> Result<i64, BankError> {
        if amount < 0 {
            return Err(BankError::NegativeValue);
        }
        self.update_balance(scope_id, owner_id, |_| Ok(amount))
    }

    /// Move credits between two accounts in one atomic step. Both legs commit
    /// under a single critical section, so no observer sees the debit without
    /// the credit and the total across the pair is conserved.
    pub fn transfer(
        &self,
        scope_id: &str,
        sender_id: &str,
        receiver_id: &str,
        amount: i64,
    ) -> Result<(), BankError> {
        if amount < 0 {
            return Err(BankError::NegativeValue);
        }
        if sender_id == receiver_id {
            return Err(BankError::SameSenderAndReceiver);
        }

        let mut inner = self.inner.lock();
        let owners = inner.accounts.get_mut(scope_id).ok_or(BankError::NoAccount)?;
        if !owners.contains_key(sender_id) || !owners.contains_key(receiver_id) {
            return Err(BankError::NoAccount);
        }
        let sender_prev = owners[sender_id].balance;
        let receiver_prev = owners[receiver_id].balance;
        if sender_prev < amount {
            return Err(BankError::InsufficientBalance);
        }

        if let Some(sender) = owners.get_mut(sender_id) {
            sender.balance = sender_prev - amount;
        }
        if let Some(receiver) = owners.get_mut(receiver_id) {
            receiver.balance = receiver_prev.saturating_add(amount);
        }

        if let Err(e) = self.store.save(&inner.accounts) {
            if let Some(owners) = inner.accounts.get_mut(scope_id) {
                if let Some(sender) = owners.get_mut(sender_id) {
                    sender.balance = sender_prev;
                }
                if let Some(receiver) = owners.get_mut(receiver_id) {
                    receiver.balance = receiver_prev;
                }
            }
            return Err(BankError::Storage(e));
        }

        info!(
            scope = scope_id,
            sender = sender_id,
            receiver = receiver_id,
            amount,
            "credits transferred"
        );
        Ok(())
    }

    /// Remove every account in the scope in one step. Other scopes are
    /// untouched. Clearing a scope with no accounts is a no-op.
    pub fn wipe_scope(&self, scope_id: &str) -> Result<(), BankError> {
        let mut inner = self.inner.lock();
        let Some(removed) = inner.accounts.remove(scope_id) else {
            return Ok(());
        };
        if let Err(e) = self.store.save(&inner.accounts) {
            inner.accounts.insert(scope_id.to_string(), removed);
            return Err(BankError::Storage(e));
        }
        info!(scope = scope_id, "scope wiped");
        Ok(())
    }

    /// All accounts in one scope, in no particular order.
    pub fn accounts_in_scope(&self, scope_id: &str) -> Vec<Account> {
        self.inner
            .lock()
            .accounts
            .get(scope_id)
            .map(|owners| owners.values().cloned().collect())
            .unwrap_or_default()
    }

    /// All accounts across scopes the host still knows. Stale entries for
    /// scopes rejected by `known_scope` are skipped, not errored.
    pub fn all_accounts<F>(&self, known_scope: F) -> Vec<Account>
    where
        F: Fn(&str) -> bool,
    {
        let inner = self.inner.lock();
        inner
            .accounts
            .iter()
            .filter(|(scope_id, _)| known_scope(scope_id))
            .flat_map(|(_, owners)| owners.values().cloned())
            .collect()
    }

    fn update_balance<F>(&self, scope_id: &str, owner_id: &str, f: F) -> Result<i64, BankError>
    where
        F: FnOnce(i64) -> Result<i64, BankError>,
    {
        let mut inner = self.inner.lock();
        let account = inner
            .accounts
            .get_mut(scope_id)
            .and_then(|owners| owners.get_mut(owner_id))
            .ok_or(BankError::NoAccount)?;
        let prev = account.balance;
        let next = f(prev)?;
        account.balance = next;

        if let Err(e) = self.store.save(&inner.accounts) {
            if let Some(account) = inner
                .accounts
                .get_mut(scope_id)
                .and_then(|owners| owners.get_mut(owner_id))
            {
                account.balance = prev;
            }
            return Err(BankError::Storage(e));
        }
        Ok(next)
    }
}
