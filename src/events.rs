use near_sdk::json_types::U128;
use near_sdk::serde::Serialize;
use near_sdk::{env, near, serde_json, AccountId};

use crate::order::{AssetId, OrderId};

pub const EVENT_STANDARD: &str = "token-swap-escrow";
pub const EVENT_VERSION: &str = "1.0.0";
const EVENT_JSON_PREFIX: &str = "EVENT_JSON:";

/// Observations published by the order registry as NEP-297 log lines.
#[near(serializers = [json])]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
#[derive(Clone, Debug, PartialEq)]
pub enum RegistryEvent {
    OrderCreated {
        depositor: AccountId,
        deposit_asset: AssetId,
        swap_asset: AssetId,
        deposit_amount: U128,
    },
    TokenSwapped {
        fulfiller: AccountId,
        order_id: OrderId,
    },
    OrderCancelled {
        canceller: AccountId,
        order_id: OrderId,
    },
}

#[derive(Serialize)]
#[serde(crate = "near_sdk::serde")]
struct EventLog<'a> {
    standard: &'static str,
    version: &'static str,
    #[serde(flatten)]
    event: &'a RegistryEvent,
}

impl RegistryEvent {
    pub fn to_log_line(&self) -> String {
        let log = EventLog {
            standard: EVENT_STANDARD,
            version: EVENT_VERSION,
            event: self,
        };
        // Every field is a string or an integer, serialization cannot fail.
        let json = serde_json::to_string(&log).unwrap_or_default();
        format!("{EVENT_JSON_PREFIX}{json}")
    }

    pub fn emit(&self) {
        env::log_str(&self.to_log_line());
    }
}
