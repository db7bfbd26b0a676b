//! Catalog of synchronized collections.
//!
//! # Responsibility
//! - Name every collection once, with its remote table and state field.
//! - Fix the load order and the push order.
//!
//! # Invariants
//! - `LOAD_ORDER` covers all eleven collections exactly once.
//! - `PUSH_ORDER` lists the ten record collections; budgets are pushed last
//!   as a row rewrite.

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// One synchronized collection of `PlannerState`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CollectionKind {
    Spheres,
    Dreams,
    Goals,
    Steps,
    Actions,
    Activities,
    Sessions,
    FinanceCategories,
    Funds,
    Transactions,
    Budgets,
}

/// Remote ordering applied when fetching a collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RemoteOrder {
    pub column: &'static str,
    pub ascending: bool,
}

const SORT_ORDER_ASC: RemoteOrder = RemoteOrder {
    column: "sort_order",
    ascending: true,
};

impl CollectionKind {
    /// Sequential fetch order used by the aggregate loader.
    pub const LOAD_ORDER: [CollectionKind; 11] = [
        Self::Spheres,
        Self::Dreams,
        Self::Goals,
        Self::Steps,
        Self::Actions,
        Self::Activities,
        Self::Sessions,
        Self::FinanceCategories,
        Self::Funds,
        Self::Transactions,
        Self::Budgets,
    ];

    /// Record collections in the order they are pushed.
    pub const PUSH_ORDER: [CollectionKind; 10] = [
        Self::Spheres,
        Self::Dreams,
        Self::Goals,
        Self::Steps,
        Self::Actions,
        Self::Activities,
        Self::Sessions,
        Self::FinanceCategories,
        Self::Funds,
        Self::Transactions,
    ];

    /// Table name in the remote store.
    pub fn table_name(self) -> &'static str {
        match self {
            Self::Spheres => "spheres",
            Self::Dreams => "dreams",
            Self::Goals => "goals",
            Self::Steps => "steps",
            Self::Actions => "actions",
            Self::Activities => "activities",
            Self::Sessions => "sessions",
            Self::FinanceCategories => "finance_categories",
            Self::Funds => "funds",
            Self::Transactions => "transactions",
            Self::Budgets => "budgets",
        }
    }

    /// Field name of this collection inside a serialized `PlannerState`.
    pub fn state_field(self) -> &'static str {
        match self {
            Self::FinanceCategories => "financeCategories",
            other => other.table_name(),
        }
    }

    /// Server-side ordering for fetches; `None` for unordered collections.
    pub fn remote_order(self) -> Option<RemoteOrder> {
        match self {
            Self::Sessions => Some(RemoteOrder {
                column: "start_at",
                ascending: false,
            }),
            Self::Transactions => Some(RemoteOrder {
                column: "date",
                ascending: false,
            }),
            Self::Budgets => None,
            _ => Some(SORT_ORDER_ASC),
        }
    }

    /// Whether records of this collection carry a `sort_order` column.
    pub fn is_sort_ordered(self) -> bool {
        self.remote_order() == Some(SORT_ORDER_ASC)
    }

    /// Whether this collection is an id-keyed record list (everything but budgets).
    pub fn is_record_collection(self) -> bool {
        self != Self::Budgets
    }

    /// Parses a remote table name back into a kind.
    pub fn from_table_name(value: &str) -> Option<Self> {
        Self::LOAD_ORDER
            .into_iter()
            .find(|kind| kind.table_name() == value.trim())
    }
}

impl Display for CollectionKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.table_name())
    }
}

#[cfg(test)]
mod tests {
    use super::CollectionKind;
    use std::collections::HashSet;

    #[test]
    fn load_order_covers_every_collection_once() {
        let unique = CollectionKind::LOAD_ORDER
            .iter()
            .map(|kind| kind.table_name())
            .collect::<HashSet<_>>();
        assert_eq!(unique.len(), 11);
        assert_eq!(CollectionKind::LOAD_ORDER.last(), Some(&CollectionKind::Budgets));
    }

    #[test]
    fn push_order_excludes_budgets() {
        assert!(CollectionKind::PUSH_ORDER
            .iter()
            .all(|kind| kind.is_record_collection()));
        assert_eq!(CollectionKind::PUSH_ORDER[0], CollectionKind::Spheres);
        assert_eq!(CollectionKind::PUSH_ORDER[9], CollectionKind::Transactions);
    }

    #[test]
    fn sessions_and_transactions_sort_newest_first() {
        let sessions = CollectionKind::Sessions.remote_order().expect("ordered");
        assert_eq!(sessions.column, "start_at");
        assert!(!sessions.ascending);
        assert!(!CollectionKind::Transactions.is_sort_ordered());
        assert!(CollectionKind::Goals.is_sort_ordered());
        assert!(CollectionKind::Budgets.remote_order().is_none());
    }

    #[test]
    fn table_names_round_trip() {
        for kind in CollectionKind::LOAD_ORDER {
            assert_eq!(CollectionKind::from_table_name(kind.table_name()), Some(kind));
        }
        assert_eq!(CollectionKind::from_table_name("milestones"), None);
        assert_eq!(CollectionKind::FinanceCategories.state_field(), "financeCategories");
    }
}
