use std::fmt;

/// Failures reported by the deposit ledger when moving balances.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LedgerError {
    InsufficientBalance,
    BalanceOverflow,
}

impl AsRef<str> for LedgerError {
    fn as_ref(&self) -> &str {
        match self {
            LedgerError::InsufficientBalance => "Ledger: insufficient balance",
            LedgerError::BalanceOverflow => "Ledger: balance overflow",
        }
    }
}

impl fmt::Display for LedgerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

/// Every way an order registry call can be rejected.
///
/// Implements `AsRef<str>`, which makes it a `near_sdk::FunctionError`: a
/// `#[handle_result]` method returning `Err` panics with the message below
/// and the runtime reverts the whole call.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RegistryError {
    InvalidCaller,
    SameAssetNotAllowed,
    ZeroValueNotAllowed,
    InsufficientFunds,
    InsufficientContractBalance,
    InvalidOrderId,
    OrderAlreadyCompleted,
    OrderNotActive,
    UnauthorizedCaller,
    InvalidTransferMessage,
    Ledger(LedgerError),
}

impl AsRef<str> for RegistryError {
    fn as_ref(&self) -> &str {
        match self {
            RegistryError::InvalidCaller => "InvalidCaller: caller is not a registered account",
            RegistryError::SameAssetNotAllowed => {
                "SameAssetNotAllowed: deposit and swap assets must differ"
            }
            RegistryError::ZeroValueNotAllowed => "ZeroValueNotAllowed: amounts must be positive",
            RegistryError::InsufficientFunds => "InsufficientFunds: caller balance is too low",
            RegistryError::InsufficientContractBalance => {
                "InsufficientContractBalance: custody balance is too low"
            }
            RegistryError::InvalidOrderId => "InvalidOrderId: order was never issued",
            RegistryError::OrderAlreadyCompleted => "OrderAlreadyCompleted",
            RegistryError::OrderNotActive => "OrderNotActive: order was cancelled",
            RegistryError::UnauthorizedCaller => "UnauthorizedCaller: only the depositor may cancel",
            RegistryError::InvalidTransferMessage => {
                "InvalidTransferMessage: ft_on_transfer msg is not a create-order request"
            }
            RegistryError::Ledger(err) => err.as_ref(),
        }
    }
}

impl fmt::Display for RegistryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_ref())
    }
}

impl std::error::Error for LedgerError {}
impl std::error::Error for RegistryError {}

impl From<LedgerError> for RegistryError {
    fn from(err: LedgerError) -> Self {
        RegistryError::Ledger(err)
    }
}
