//! Records owned by the four ledgers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{EntryId, ProductId, TransactionId, UserId};

/// Lifecycle position of a cart line, derived from its two flags.
///
/// ```text
/// Active ──► CheckedOut ──► Confirmed ──► (migrated to history)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum LineState {
    /// In the cart, not yet checked out.
    #[default]
    Active,
    /// Checked out; stock has been decremented.
    CheckedOut,
    /// Confirmed; waiting to be swept into history.
    Confirmed,
}

impl LineState {
    /// Returns the `(is_checked_out, is_confirmed)` flags for this state.
    pub fn flags(&self) -> (bool, bool) {
        match self {
            LineState::Active => (false, false),
            LineState::CheckedOut => (true, false),
            LineState::Confirmed => (true, true),
        }
    }

    /// Recovers the state from stored flags.
    ///
    /// Returns `None` for the illegal combination confirmed-but-not-checked-out.
    pub fn from_flags(is_checked_out: bool, is_confirmed: bool) -> Option<Self> {
        match (is_checked_out, is_confirmed) {
            (false, false) => Some(LineState::Active),
            (true, false) => Some(LineState::CheckedOut),
            (true, true) => Some(LineState::Confirmed),
            (false, true) => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineState::Active => "Active",
            LineState::CheckedOut => "CheckedOut",
            LineState::Confirmed => "Confirmed",
        }
    }
}

impl std::fmt::Display for LineState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One (user, product) line in the cart.
///
/// The flags are only settable together through [`LineState`], so a line
/// can never be confirmed without also being checked out.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CartLine {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: u32,
    is_checked_out: bool,
    is_confirmed: bool,
    pub created_at: DateTime<Utc>,
}

impl CartLine {
    /// Creates a line in the given state, stamped with the current time.
    pub fn new(user_id: UserId, product_id: ProductId, quantity: u32, state: LineState) -> Self {
        Self::at(user_id, product_id, quantity, state, Utc::now())
    }

    /// Creates a line with an explicit creation timestamp.
    pub fn at(
        user_id: UserId,
        product_id: ProductId,
        quantity: u32,
        state: LineState,
        created_at: DateTime<Utc>,
    ) -> Self {
        let (is_checked_out, is_confirmed) = state.flags();
        Self {
            user_id,
            product_id,
            quantity,
            is_checked_out,
            is_confirmed,
            created_at,
        }
    }

    pub fn state(&self) -> LineState {
        match (self.is_checked_out, self.is_confirmed) {
            (true, true) => LineState::Confirmed,
            (true, false) => LineState::CheckedOut,
            _ => LineState::Active,
        }
    }

    pub fn is_checked_out(&self) -> bool {
        self.is_checked_out
    }

    pub fn is_confirmed(&self) -> bool {
        self.is_confirmed
    }

    /// The key this line is stored under.
    pub fn key(&self) -> (UserId, ProductId) {
        (self.user_id, self.product_id)
    }
}

/// Available quantity for one product.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockRecord {
    pub product_id: ProductId,
    pub available_stock: u32,
    pub updated_at: DateTime<Utc>,
}

impl StockRecord {
    pub fn new(product_id: ProductId, available_stock: u32) -> Self {
        Self {
            product_id,
            available_stock,
            updated_at: Utc::now(),
        }
    }
}

/// Accumulated loyalty coupons for one user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CouponBalance {
    pub user_id: UserId,
    pub amount: u64,
    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl CouponBalance {
    /// Opens a balance with its first accrual.
    pub fn opened(user_id: UserId, amount: u64, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            amount,
            created_at: now,
            last_updated: now,
        }
    }
}

/// Immutable record of a confirmed line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub entry_id: EntryId,
    pub transaction_id: TransactionId,
    pub product_id: ProductId,
    pub user_id: UserId,
    pub quantity: u32,
    pub is_checked_out: bool,
    pub is_confirmed: bool,
    /// Creation time of the originating cart line.
    pub created_at: DateTime<Utc>,
}

impl HistoryEntry {
    /// Copies a cart line into a new entry tagged with `transaction_id`.
    pub fn from_line(transaction_id: TransactionId, line: &CartLine) -> Self {
        Self {
            entry_id: EntryId::new(),
            transaction_id,
            product_id: line.product_id,
            user_id: line.user_id,
            quantity: line.quantity,
            is_checked_out: line.is_checked_out,
            is_confirmed: line.is_confirmed,
            created_at: line.created_at,
        }
    }
}
