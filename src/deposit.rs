use std::collections::BTreeMap;

use near_sdk::{json_types::U128, near, store::IterableMap, AccountId};

use crate::errors::LedgerError;
use crate::order::AssetId;

pub type Balance = u128;

/// Balance bookkeeping the order registry relies on. Funds are moved either
/// out of an account that authorised the current call (`transfer_from`) or
/// out of the registry's own custody (`transfer`).
pub trait FungibleLedger {
    /// Account that holds escrowed funds on behalf of depositors.
    fn custodian(&self) -> &AccountId;
    fn is_registered(&self, account_id: &AccountId) -> bool;
    fn balance_of(&self, asset: &AssetId, account_id: &AccountId) -> Balance;
    fn transfer_from(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Balance,
    ) -> Result<(), LedgerError>;

    fn transfer(&mut self, asset: &AssetId, to: &AccountId, amount: Balance) -> Result<(), LedgerError> {
        let custodian = self.custodian().clone();
        self.transfer_from(asset, &custodian, to, amount)
    }
}

/// NEP-141 balances deposited into the contract through `ft_on_transfer`.
#[near(serializers = [borsh])]
pub struct DepositLedger {
    custodian: AccountId,
    // AccountId -> TokenId -> Balance
    balances: IterableMap<AccountId, BTreeMap<AssetId, U128>>,
}

impl DepositLedger {
    pub fn new(prefix: &'static [u8], custodian: AccountId) -> Self {
        Self {
            custodian,
            balances: IterableMap::new(prefix),
        }
    }

    /// Returns `false` when the account was already known.
    pub fn register(&mut self, account_id: &AccountId) -> bool {
        if self.balances.contains_key(account_id) {
            return false;
        }
        self.balances.insert(account_id.clone(), BTreeMap::new());
        true
    }

    pub fn credit(&mut self, account_id: &AccountId, asset: &AssetId, amount: Balance) -> Result<(), LedgerError> {
        let updated = self
            .balance_of(asset, account_id)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;
        self.set_balance(account_id, asset, updated);
        Ok(())
    }

    pub fn debit(&mut self, account_id: &AccountId, asset: &AssetId, amount: Balance) -> Result<(), LedgerError> {
        let updated = self
            .balance_of(asset, account_id)
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance)?;
        self.set_balance(account_id, asset, updated);
        Ok(())
    }

    pub fn get_all_balances(&self, account_id: &AccountId) -> Vec<(AssetId, U128)> {
        self.balances
            .get(account_id)
            .map(|assets| {
                assets
                    .iter()
                    .map(|(asset, balance)| (asset.clone(), *balance))
                    .collect()
            })
            .unwrap_or_default()
    }

    fn set_balance(&mut self, account_id: &AccountId, asset: &AssetId, balance: Balance) {
        if !self.balances.contains_key(account_id) {
            self.balances.insert(account_id.clone(), BTreeMap::new());
        }
        if let Some(assets) = self.balances.get_mut(account_id) {
            if balance == 0 {
                assets.remove(asset);
            } else {
                assets.insert(asset.clone(), U128(balance));
            }
        }
    }
}

impl FungibleLedger for DepositLedger {
    fn custodian(&self) -> &AccountId {
        &self.custodian
    }

    fn is_registered(&self, account_id: &AccountId) -> bool {
        self.balances.contains_key(account_id)
    }

    fn balance_of(&self, asset: &AssetId, account_id: &AccountId) -> Balance {
        self.balances
            .get(account_id)
            .and_then(|assets| assets.get(asset))
            .map(|balance| balance.0)
            .unwrap_or(0)
    }

    fn transfer_from(
        &mut self,
        asset: &AssetId,
        from: &AccountId,
        to: &AccountId,
        amount: Balance,
    ) -> Result<(), LedgerError> {
        let remaining = self
            .balance_of(asset, from)
            .checked_sub(amount)
            .ok_or(LedgerError::InsufficientBalance)?;
        if from == to {
            return Ok(());
        }
        let credited = self
            .balance_of(asset, to)
            .checked_add(amount)
            .ok_or(LedgerError::BalanceOverflow)?;

        // Both sides are computed before either is written.
        self.set_balance(from, asset, remaining);
        self.set_balance(to, asset, credited);
        Ok(())
    }
}
