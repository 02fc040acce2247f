//! SeaORM entity modules for the finance tracker.
//!
//! Users own goals, budgets and transactions. A transaction may be linked to
//! one goal or one budget, whose `current_amount` tracks the linked
//! transactions.

pub mod budget;
pub mod budget_category;
pub mod category;
pub mod goal;
pub mod transaction;
pub mod user;

pub mod prelude {
    //! A prelude module for easy importing of all entities.
    pub use super::budget::Entity as Budget;
    pub use super::budget_category::Entity as BudgetCategory;
    pub use super::category::Entity as Category;
    pub use super::goal::Entity as Goal;
    pub use super::transaction::Entity as Transaction;
    pub use super::user::Entity as User;
}
