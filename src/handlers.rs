pub mod budget_categories;
pub mod budgets;
pub mod categories;
pub mod goals;
pub mod health;
pub mod transactions;
pub mod users;
