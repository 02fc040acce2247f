//! Fixtures shared by the ledger tests.

use chrono::{NaiveDate, TimeZone, Utc};
use migration::{Migrator, MigratorTrait};
use model::entities::{budget, budget_category, category, goal, user};
use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, Set};

/// In-memory SQLite database with all migrations applied.
pub async fn setup_db() -> DatabaseConnection {
    let db = Database::connect("sqlite::memory:")
        .await
        .expect("Failed to connect to in-memory database");
    db.execute_unprepared("PRAGMA foreign_keys = ON;")
        .await
        .expect("Failed to enable foreign keys");
    Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");
    db
}

pub async fn create_user(db: &DatabaseConnection, username: &str) -> user::Model {
    user::ActiveModel {
        username: Set(username.to_string()),
        email: Set(format!("{}@example.com", username)),
        password_hash: Set("hash".to_string()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create user")
}

pub async fn create_category(db: &DatabaseConnection, name: &str) -> category::Model {
    category::ActiveModel {
        name: Set(name.to_string()),
        is_income: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create category")
}

pub async fn create_goal(db: &DatabaseConnection, user_id: i32, title: &str) -> goal::Model {
    goal::ActiveModel {
        user_id: Set(user_id),
        title: Set(title.to_string()),
        target_amount: Set(Decimal::new(1000, 0)),
        current_amount: Set(Decimal::ZERO),
        due_date: Set(NaiveDate::from_ymd_opt(2030, 1, 1).unwrap()),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create goal")
}

pub async fn create_budget(
    db: &DatabaseConnection,
    user_id: i32,
    year: i32,
    month: u32,
) -> budget::Model {
    budget::ActiveModel {
        user_id: Set(user_id),
        month: Set(NaiveDate::from_ymd_opt(year, month, 1).unwrap()),
        current_amount: Set(Decimal::ZERO),
        created_at: Set(Utc::now()),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create budget")
}

pub async fn add_budget_category(
    db: &DatabaseConnection,
    budget_id: i32,
    category_id: i32,
    limit: i64,
) -> budget_category::Model {
    budget_category::ActiveModel {
        budget_id: Set(budget_id),
        category_id: Set(category_id),
        limit_amount: Set(Decimal::new(limit, 0)),
        ..Default::default()
    }
    .insert(db)
    .await
    .expect("Failed to create budget category")
}

/// Noon UTC on the given day.
pub fn at(year: i32, month: u32, day: u32) -> chrono::DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap()
}
