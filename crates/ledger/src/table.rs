//! Static mapping from record kind to its physical table.

use crate::model::{CartLine, CouponBalance, HistoryEntry, StockRecord};

/// The four physical tables backing the ledgers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Stock,
    Cart,
    Coupon,
    History,
}

impl Table {
    /// Every table, in creation order.
    pub const ALL: [Table; 4] = [Table::Stock, Table::Cart, Table::Coupon, Table::History];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Stock => "stock",
            Table::Cart => "carts",
            Table::Coupon => "coupons",
            Table::History => "history",
        }
    }
}

impl std::fmt::Display for Table {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// A record type persisted in exactly one table.
pub trait Record {
    const TABLE: Table;
}

impl Record for StockRecord {
    const TABLE: Table = Table::Stock;
}

impl Record for CartLine {
    const TABLE: Table = Table::Cart;
}

impl Record for CouponBalance {
    const TABLE: Table = Table::Coupon;
}

impl Record for HistoryEntry {
    const TABLE: Table = Table::History;
}
