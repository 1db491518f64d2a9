use near_sdk::json_types::U128;
use near_sdk::{near, AccountId};

// Sequential order identifier, the first order is 1.
pub type OrderId = u64;

// NEP-141 token contract that defines the asset.
pub type AssetId = AccountId;

#[near(serializers = [json, borsh])]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OrderStatus {
    Open,
    Completed,
    Cancelled,
}

// One depositor's standing offer to exchange a fixed amount of one token for a fixed amount of another.
#[near(serializers = [json, borsh])]
#[derive(Clone, Debug, PartialEq)]
pub struct Order {
    pub order_id: OrderId,
    pub depositor: AccountId,       // Locked the deposit asset, receives the swap asset
    pub fulfiller: Option<AccountId>, // Set once, when the order completes
    pub deposit_asset: AssetId,
    pub swap_asset: AssetId,
    pub deposit_amount: U128,
    pub swap_amount: U128,
    pub status: OrderStatus,
}

impl Order {
    pub fn is_open(&self) -> bool {
        self.status == OrderStatus::Open
    }
}

// Message for ft_on_transfer that escrows the transferred tokens as a new order
#[near(serializers = [json])]
pub struct CreateOrderMsg {
    pub swap_asset: AssetId,
    pub swap_amount: U128,
}
