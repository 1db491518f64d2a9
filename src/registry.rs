use near_sdk::json_types::U128;
use near_sdk::store::{LookupMap, Vector};
use near_sdk::{near, AccountId};

use crate::deposit::{Balance, FungibleLedger};
use crate::errors::RegistryError;
use crate::events::RegistryEvent;
use crate::order::{AssetId, Order, OrderId, OrderStatus};
use crate::utils::page_bounds;

/// Append-only book of swap orders.
///
/// Order `n` lives at position `n - 1` of `orders`, so the arena doubles as the
/// global index in creation order. Orders are never removed; a finished order
/// keeps its terminal status forever.
///
/// Every operation runs all of its checks before the first ledger mutation,
/// so a rejected call leaves balances, orders and indices untouched.
#[near(serializers = [borsh])]
pub struct OrderRegistry {
    orders: Vector<Order>,
    depositor_orders: LookupMap<AccountId, Vec<OrderId>>,
    next_order_id: OrderId,
}

impl OrderRegistry {
    pub fn new(orders_prefix: &'static [u8], depositors_prefix: &'static [u8]) -> Self {
        Self {
            orders: Vector::new(orders_prefix),
            depositor_orders: LookupMap::new(depositors_prefix),
            next_order_id: 1,
        }
    }

    /// Escrows `deposit_amount` of `deposit_asset` from `caller` and opens an order
    /// asking `swap_amount` of `swap_asset` in return.
    pub fn create_order<L: FungibleLedger>(
        &mut self,
        ledger: &mut L,
        caller: &AccountId,
        deposit_asset: AssetId,
        swap_asset: AssetId,
        deposit_amount: Balance,
        swap_amount: Balance,
    ) -> Result<OrderId, RegistryError> {
        assert_known_caller(ledger, caller)?;
        if deposit_asset == swap_asset {
            return Err(RegistryError::SameAssetNotAllowed);
        }
        if deposit_amount == 0 || swap_amount == 0 {
            return Err(RegistryError::ZeroValueNotAllowed);
        }
        if ledger.balance_of(&deposit_asset, caller) < deposit_amount {
            return Err(RegistryError::InsufficientFunds);
        }

        let custodian = ledger.custodian().clone();
        ledger.transfer_from(&deposit_asset, caller, &custodian, deposit_amount)?;

        let order_id = self.next_order_id;
        self.next_order_id += 1;
        self.orders.push(Order {
            order_id,
            depositor: caller.clone(),
            fulfiller: None,
            deposit_asset: deposit_asset.clone(),
            swap_asset: swap_asset.clone(),
            deposit_amount: U128(deposit_amount),
            swap_amount: U128(swap_amount),
            status: OrderStatus::Open,
        });
        match self.depositor_orders.get_mut(caller) {
            Some(order_ids) => order_ids.push(order_id),
            None => {
                self.depositor_orders.insert(caller.clone(), vec![order_id]);
            }
        }

        RegistryEvent::OrderCreated {
            depositor: caller.clone(),
            deposit_asset,
            swap_asset,
            deposit_amount: U128(deposit_amount),
        }
        .emit();

        Ok(order_id)
    }

    /// Fills an open order: the caller pays the depositor and receives the escrow.
    pub fn swap_token<L: FungibleLedger>(
        &mut self,
        ledger: &mut L,
        caller: &AccountId,
        order_id: OrderId,
    ) -> Result<(), RegistryError> {
        assert_known_caller(ledger, caller)?;
        let index = self.open_order_index(order_id)?;
        let order = self.order_at(index)?.clone();

        if ledger.balance_of(&order.swap_asset, caller) < order.swap_amount.0 {
            return Err(RegistryError::InsufficientFunds);
        }
        if ledger.balance_of(&order.deposit_asset, ledger.custodian()) < order.deposit_amount.0 {
            return Err(RegistryError::InsufficientContractBalance);
        }

        ledger.transfer_from(&order.swap_asset, caller, &order.depositor, order.swap_amount.0)?;
        if let Err(err) = ledger.transfer(&order.deposit_asset, caller, order.deposit_amount.0) {
            // Undo the payment leg so neither transfer persists.
            ledger.transfer_from(&order.swap_asset, &order.depositor, caller, order.swap_amount.0)?;
            return Err(err.into());
        }

        if let Some(stored) = self.orders.get_mut(index) {
            stored.status = OrderStatus::Completed;
            stored.fulfiller = Some(caller.clone());
        }

        RegistryEvent::TokenSwapped {
            fulfiller: caller.clone(),
            order_id,
        }
        .emit();

        Ok(())
    }

    /// Returns the escrow of an open order to its depositor.
    pub fn cancel_order<L: FungibleLedger>(
        &mut self,
        ledger: &mut L,
        caller: &AccountId,
        order_id: OrderId,
    ) -> Result<(), RegistryError> {
        assert_known_caller(ledger, caller)?;
        let index = self.open_order_index(order_id)?;
        let order = self.order_at(index)?.clone();
        if *caller != order.depositor {
            return Err(RegistryError::UnauthorizedCaller);
        }

        ledger.transfer(&order.deposit_asset, &order.depositor, order.deposit_amount.0)?;

        if let Some(stored) = self.orders.get_mut(index) {
            stored.status = OrderStatus::Cancelled;
        }

        RegistryEvent::OrderCancelled {
            canceller: caller.clone(),
            order_id,
        }
        .emit();

        Ok(())
    }

    pub fn get_order(&self, order_id: OrderId) -> Option<&Order> {
        let index = order_id.checked_sub(1)?;
        self.orders.get(u32::try_from(index).ok()?)
    }

    pub fn next_order_id(&self) -> OrderId {
        self.next_order_id
    }

    pub fn order_ids(&self, from_index: Option<u64>, limit: Option<u64>) -> Vec<OrderId> {
        let (start, end) = page_bounds(u64::from(self.orders.len()), from_index, limit);
        (start..end).map(|index| index + 1).collect()
    }

    pub fn orders(&self, from_index: Option<u64>, limit: Option<u64>) -> Vec<Order> {
        self.order_ids(from_index, limit)
            .into_iter()
            .filter_map(|order_id| self.get_order(order_id).cloned())
            .collect()
    }

    pub fn depositor_order_ids(&self, depositor: &AccountId) -> Vec<OrderId> {
        self.depositor_orders.get(depositor).cloned().unwrap_or_default()
    }

    /// Resolves an issued id to its arena slot, rejecting orders that already left `Open`.
    fn open_order_index(&self, order_id: OrderId) -> Result<u32, RegistryError> {
        if order_id == 0 || order_id >= self.next_order_id {
            return Err(RegistryError::InvalidOrderId);
        }
        let index = u32::try_from(order_id - 1).map_err(|_| RegistryError::InvalidOrderId)?;
        match self.order_at(index)?.status {
            OrderStatus::Open => Ok(index),
            OrderStatus::Completed => Err(RegistryError::OrderAlreadyCompleted),
            OrderStatus::Cancelled => Err(RegistryError::OrderNotActive),
        }
    }

    fn order_at(&self, index: u32) -> Result<&Order, RegistryError> {
        self.orders.get(index).ok_or(RegistryError::InvalidOrderId)
    }
}

// The custodian can never act as a trader, it only holds escrow.
fn assert_known_caller<L: FungibleLedger>(ledger: &L, caller: &AccountId) -> Result<(), RegistryError> {
    if caller == ledger.custodian() || !ledger.is_registered(caller) {
        return Err(RegistryError::InvalidCaller);
    }
    Ok(())
}
