use near_sdk::{env, AccountId};

use crate::deposit::Balance;

pub const MAX_PAGE_SIZE: u64 = 100;

// Helper for consistent logging
pub fn log_ledger_event(event: &str, account: &AccountId, asset: &AccountId, amount: Balance) {
    env::log_str(&format!(
        "LEDGER_{}: account='{}', asset='{}', amount='{}'",
        event, account, asset, amount
    ));
}

/// Clamps a `(from_index, limit)` view request to `[start, end)` within `len`.
pub fn page_bounds(len: u64, from_index: Option<u64>, limit: Option<u64>) -> (u64, u64) {
    let start = from_index.unwrap_or(0).min(len);
    let limit = limit.unwrap_or(MAX_PAGE_SIZE).min(MAX_PAGE_SIZE);
    (start, start.saturating_add(limit).min(len))
}
