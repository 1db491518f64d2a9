use near_sdk::env::panic_str;
use near_sdk::json_types::U128;
use near_sdk::{
    env, ext_contract, log, near, serde_json, AccountId, Gas, NearToken, Promise, PromiseOrValue,
};

mod deposit;
mod errors;
mod events;
mod order;
mod registry;
mod utils;

pub use deposit::{Balance, DepositLedger, FungibleLedger};
pub use errors::{LedgerError, RegistryError};
pub use events::{RegistryEvent, EVENT_STANDARD, EVENT_VERSION};
pub use order::{AssetId, CreateOrderMsg, Order, OrderId, OrderStatus};
pub use registry::OrderRegistry;

use utils::log_ledger_event;

const GAS_FOR_FT_TRANSFER: Gas = Gas::from_tgas(10);
const GAS_FOR_WITHDRAW_CALLBACK: Gas = Gas::from_tgas(10);

// External contract interfaces
#[ext_contract(ext_fungible_token)]
pub trait FungibleToken {
    fn ft_transfer(&mut self, receiver_id: AccountId, amount: U128, memo: Option<String>);
}

#[ext_contract(ext_self)]
pub trait SelfCallbacks {
    fn on_withdraw_settled(&mut self, account_id: AccountId, asset: AssetId, amount: U128) -> U128;
}

// Define the contract structure
#[near(contract_state)]
pub struct Contract {
    // Every order ever created plus the per-depositor index
    pub registry: OrderRegistry,
    // Deposited NEP-141 balances, including the escrow held under the contract's own account
    pub ledger: DepositLedger,
}

// Define the default, which automatically initializes the contract
impl Default for Contract {
    fn default() -> Self {
        Self {
            registry: OrderRegistry::new(b"o", b"d"),
            ledger: DepositLedger::new(b"b", env::current_account_id()),
        }
    }
}

// Implement the contract structure
#[near]
impl Contract {
    #[init]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the predecessor as a known identity that may deposit and trade.
    /// Registering twice is a no-op.
    #[handle_result]
    pub fn register_account(&mut self) -> Result<(), RegistryError> {
        let account_id = env::predecessor_account_id();
        if account_id == env::current_account_id() {
            return Err(RegistryError::InvalidCaller);
        }
        if self.ledger.register(&account_id) {
            log!("Registered account {}", account_id);
        }
        Ok(())
    }

    /// Locks `deposit_amount` of `deposit_asset` from the caller's deposits and
    /// opens an order asking `swap_amount` of `swap_asset` in return.
    #[handle_result]
    pub fn create_order(
        &mut self,
        deposit_asset: AssetId,
        swap_asset: AssetId,
        deposit_amount: U128,
        swap_amount: U128,
    ) -> Result<OrderId, RegistryError> {
        let caller = env::predecessor_account_id();
        self.registry.create_order(
            &mut self.ledger,
            &caller,
            deposit_asset,
            swap_asset,
            deposit_amount.0,
            swap_amount.0,
        )
    }

    #[handle_result]
    pub fn swap_token(&mut self, order_id: OrderId) -> Result<(), RegistryError> {
        let caller = env::predecessor_account_id();
        self.registry.swap_token(&mut self.ledger, &caller, order_id)
    }

    #[handle_result]
    pub fn cancel_order(&mut self, order_id: OrderId) -> Result<(), RegistryError> {
        let caller = env::predecessor_account_id();
        self.registry.cancel_order(&mut self.ledger, &caller, order_id)
    }

    /// NEP-141 receiver.
    ///
    /// An empty `msg` credits the transferred tokens to the sender's deposits.
    /// A JSON `CreateOrderMsg` additionally escrows them as a new order in the
    /// same call. Unregistered senders get the full amount refunded.
    pub fn ft_on_transfer(
        &mut self,
        sender_id: AccountId,
        amount: U128,
        msg: String,
    ) -> PromiseOrValue<U128> {
        let asset = env::predecessor_account_id();
        if sender_id == env::current_account_id() || !self.ledger.is_registered(&sender_id) {
            log_ledger_event("REFUNDED", &sender_id, &asset, amount.0);
            return PromiseOrValue::Value(amount);
        }

        let request = if msg.is_empty() {
            None
        } else {
            let parsed: CreateOrderMsg = serde_json::from_str(&msg)
                .unwrap_or_else(|_| panic_str(RegistryError::InvalidTransferMessage.as_ref()));
            Some(parsed)
        };

        // A panic below reverts the credit and lets the token contract refund the sender.
        self.ledger
            .credit(&sender_id, &asset, amount.0)
            .unwrap_or_else(|err| panic_str(err.as_ref()));
        log_ledger_event("DEPOSITED", &sender_id, &asset, amount.0);

        if let Some(request) = request {
            self.registry
                .create_order(
                    &mut self.ledger,
                    &sender_id,
                    asset,
                    request.swap_asset,
                    amount.0,
                    request.swap_amount.0,
                )
                .unwrap_or_else(|err| panic_str(err.as_ref()));
        }

        PromiseOrValue::Value(U128(0))
    }

    /// Sends `amount` of `asset` from the caller's deposits back to their wallet.
    /// The balance is debited up front and restored if the token transfer fails.
    #[payable]
    pub fn withdraw(&mut self, asset: AssetId, amount: U128) -> Promise {
        near_sdk::assert_one_yocto();
        let account_id = env::predecessor_account_id();
        if account_id == env::current_account_id() || !self.ledger.is_registered(&account_id) {
            panic_str(RegistryError::InvalidCaller.as_ref());
        }
        if amount.0 == 0 {
            panic_str(RegistryError::ZeroValueNotAllowed.as_ref());
        }
        if self.ledger.balance_of(&asset, &account_id) < amount.0 {
            panic_str(RegistryError::InsufficientFunds.as_ref());
        }

        self.ledger
            .debit(&account_id, &asset, amount.0)
            .unwrap_or_else(|err| panic_str(err.as_ref()));
        log_ledger_event("WITHDRAWN", &account_id, &asset, amount.0);

        ext_fungible_token::ext(asset.clone())
            .with_attached_deposit(NearToken::from_yoctonear(1))
            .with_static_gas(GAS_FOR_FT_TRANSFER)
            .ft_transfer(account_id.clone(), amount, Some("Token swap escrow withdrawal".to_string()))
            .then(
                ext_self::ext(env::current_account_id())
                    .with_static_gas(GAS_FOR_WITHDRAW_CALLBACK)
                    .on_withdraw_settled(account_id, asset, amount),
            )
    }

    // --- VIEWS ---

    pub fn get_order(&self, order_id: OrderId) -> Option<Order> {
        self.registry.get_order(order_id).cloned()
    }

    pub fn get_order_ids(&self, from_index: Option<u64>, limit: Option<u64>) -> Vec<OrderId> {
        self.registry.order_ids(from_index, limit)
    }

    pub fn get_orders(&self, from_index: Option<u64>, limit: Option<u64>) -> Vec<Order> {
        self.registry.orders(from_index, limit)
    }

    pub fn get_depositor_order_ids(&self, account_id: AccountId) -> Vec<OrderId> {
        self.registry.depositor_order_ids(&account_id)
    }

    pub fn get_next_order_id(&self) -> OrderId {
        self.registry.next_order_id()
    }

    pub fn get_balance(&self, account_id: AccountId, asset: AssetId) -> U128 {
        U128(self.ledger.balance_of(&asset, &account_id))
    }

    pub fn get_balances(&self, account_id: AccountId) -> Vec<(AssetId, U128)> {
        self.ledger.get_all_balances(&account_id)
    }

    pub fn is_registered(&self, account_id: AccountId) -> bool {
        self.ledger.is_registered(&account_id)
    }

    // --- PRIVATE CALLBACKS ---

    /// Returns the amount that actually left the contract.
    #[private]
    pub fn on_withdraw_settled(
        &mut self,
        #[callback_result] result: Result<(), near_sdk::PromiseError>,
        account_id: AccountId,
        asset: AssetId,
        amount: U128,
    ) -> U128 {
        if result.is_ok() {
            return amount;
        }
        // The tokens never left, put them back on the account.
        match self.ledger.credit(&account_id, &asset, amount.0) {
            Ok(()) => log_ledger_event("WITHDRAW_FAILED", &account_id, &asset, amount.0),
            Err(err) => log!("Withdrawal refund for {} failed: {}", account_id, err),
        }
        U128(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use near_sdk::test_utils::{get_logs, VMContextBuilder};
    use near_sdk::{testing_env, PromiseError};

    fn account(id: &str) -> AccountId {
        id.parse().unwrap()
    }

    fn registry_id() -> AccountId {
        account("registry.near")
    }

    fn call_as(predecessor: &AccountId) {
        testing_env!(VMContextBuilder::new()
            .current_account_id(registry_id())
            .predecessor_account_id(predecessor.clone())
            .build());
    }

    fn call_with_yocto(predecessor: &AccountId) {
        testing_env!(VMContextBuilder::new()
            .current_account_id(registry_id())
            .predecessor_account_id(predecessor.clone())
            .attached_deposit(NearToken::from_yoctonear(1))
            .build());
    }

    fn deposit(contract: &mut Contract, sender: &AccountId, token: &AccountId, amount: u128) {
        call_as(token);
        let refund = contract.ft_on_transfer(sender.clone(), U128(amount), String::new());
        assert!(matches!(refund, PromiseOrValue::Value(U128(0))));
    }

    fn registered(contract: &mut Contract, id: &str) -> AccountId {
        let account_id = account(id);
        call_as(&account_id);
        contract.register_account().unwrap();
        account_id
    }

    #[test]
    fn register_account_is_idempotent() {
        call_as(&registry_id());
        let mut contract = Contract::new();
        assert_eq!(contract.register_account(), Err(RegistryError::InvalidCaller));

        let alice = registered(&mut contract, "alice.near");
        contract.register_account().unwrap();

        assert!(contract.is_registered(alice));
        assert_eq!(get_logs(), vec!["Registered account alice.near".to_string()]);
        assert!(!contract.is_registered(account("bob.near")));
    }

    #[test]
    fn unregistered_sender_is_refunded() {
        call_as(&registry_id());
        let mut contract = Contract::new();
        let token = account("token-a.near");
        call_as(&token);

        let refund = contract.ft_on_transfer(account("bob.near"), U128(50), String::new());

        assert!(matches!(refund, PromiseOrValue::Value(U128(50))));
        assert_eq!(contract.get_balance(account("bob.near"), token), U128(0));
        assert!(get_logs()[0].starts_with("LEDGER_REFUNDED"));
    }

    #[test]
    fn transfer_call_with_message_creates_order() {
        call_as(&registry_id());
        let mut contract = Contract::new();
        let alice = registered(&mut contract, "alice.near");
        let (token_a, token_b) = (account("token-a.near"), account("token-b.near"));

        call_as(&token_a);
        let msg = r#"{"swap_asset":"token-b.near","swap_amount":"200"}"#.to_string();
        let refund = contract.ft_on_transfer(alice.clone(), U128(100), msg);

        assert!(matches!(refund, PromiseOrValue::Value(U128(0))));
        let order = contract.get_order(1).unwrap();
        assert_eq!(order.depositor, alice);
        assert_eq!(order.deposit_asset, token_a);
        assert_eq!(order.swap_asset, token_b);
        assert_eq!(order.deposit_amount, U128(100));
        assert_eq!(order.swap_amount, U128(200));
        assert_eq!(contract.get_balance(alice.clone(), token_a.clone()), U128(0));
        assert_eq!(contract.get_balance(registry_id(), token_a), U128(100));
        assert_eq!(contract.get_depositor_order_ids(alice), vec![1]);
    }

    #[test]
    #[should_panic(expected = "InvalidTransferMessage")]
    fn transfer_call_with_garbage_message_panics() {
        call_as(&registry_id());
        let mut contract = Contract::new();
        let alice = registered(&mut contract, "alice.near");
        call_as(&account("token-a.near"));

        contract.ft_on_transfer(alice, U128(100), "not json".to_string());
    }

    #[test]
    #[should_panic(expected = "SameAssetNotAllowed")]
    fn transfer_call_for_same_asset_panics() {
        call_as(&registry_id());
        let mut contract = Contract::new();
        let alice = registered(&mut contract, "alice.near");
        call_as(&account("token-a.near"));

        let msg = r#"{"swap_asset":"token-a.near","swap_amount":"1"}"#.to_string();
        contract.ft_on_transfer(alice, U128(100), msg);
    }

    #[test]
    fn swap_flow_through_contract() {
        call_as(&registry_id());
        let mut contract = Contract::new();
        let alice = registered(&mut contract, "alice.near");
        let bob = registered(&mut contract, "bob.near");
        let (token_a, token_b) = (account("token-a.near"), account("token-b.near"));
        deposit(&mut contract, &alice, &token_a, 100);
        deposit(&mut contract, &bob, &token_b, 200);

        call_as(&alice);
        let order_id = contract
            .create_order(token_a.clone(), token_b.clone(), U128(100), U128(200))
            .unwrap();
        assert_eq!(order_id, 1);
        assert_eq!(contract.get_next_order_id(), 2);

        call_as(&bob);
        contract.swap_token(order_id).unwrap();

        assert_eq!(contract.get_balances(alice.clone()), vec![(token_b.clone(), U128(200))]);
        assert_eq!(contract.get_balances(bob.clone()), vec![(token_a.clone(), U128(100))]);
        let order = contract.get_order(order_id).unwrap();
        assert_eq!(order.status, OrderStatus::Completed);
        assert_eq!(order.fulfiller, Some(bob));
        assert_eq!(contract.get_order_ids(None, None), vec![1]);
    }

    #[test]
    fn withdraw_debits_before_transfer() {
        call_as(&registry_id());
        let mut contract = Contract::new();
        let alice = registered(&mut contract, "alice.near");
        let token = account("token-a.near");
        deposit(&mut contract, &alice, &token, 100);

        call_with_yocto(&alice);
        let _ = contract.withdraw(token.clone(), U128(40));

        assert_eq!(contract.get_balance(alice, token), U128(60));
        assert!(get_logs()[0].starts_with("LEDGER_WITHDRAWN"));
    }

    #[test]
    #[should_panic(expected = "InsufficientFunds")]
    fn withdraw_more_than_deposited_panics() {
        call_as(&registry_id());
        let mut contract = Contract::new();
        let alice = registered(&mut contract, "alice.near");
        let token = account("token-a.near");
        deposit(&mut contract, &alice, &token, 10);

        call_with_yocto(&alice);
        let _ = contract.withdraw(token, U128(11));
    }

    #[test]
    fn failed_withdrawal_is_recredited() {
        call_as(&registry_id());
        let mut contract = Contract::new();
        let alice = registered(&mut contract, "alice.near");
        let token = account("token-a.near");

        call_as(&registry_id());
        let sent = contract.on_withdraw_settled(
            Err(PromiseError::Failed),
            alice.clone(),
            token.clone(),
            U128(40),
        );

        assert_eq!(sent, U128(0));
        assert_eq!(contract.get_balance(alice.clone(), token.clone()), U128(40));

        let sent = contract.on_withdraw_settled(Ok(()), alice.clone(), token.clone(), U128(5));
        assert_eq!(sent, U128(5));
        assert_eq!(contract.get_balance(alice, token), U128(40));
    }
}
