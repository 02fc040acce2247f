use rust_decimal::Decimal;
use sea_orm::entity::prelude::*;
use sea_orm::Set;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Direction of a money movement.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    #[sea_orm(string_value = "income")]
    Income,
    #[sea_orm(string_value = "expense")]
    Expense,
}

/// Kind of aggregate a transaction can be linked to.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, DeriveActiveEnum, Serialize, Deserialize, ToSchema,
)]
#[sea_orm(rs_type = "String", db_type = "String(StringLen::N(10))")]
#[serde(rename_all = "lowercase")]
pub enum LinkedObjectType {
    #[sea_orm(string_value = "goal")]
    Goal,
    #[sea_orm(string_value = "budget")]
    Budget,
}

/// A complete link to a goal or a budget.
///
/// The table stores the link as two nullable columns; this type is how the
/// rest of the code sees it, so a link with only one half set cannot be
/// expressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LinkRef {
    pub kind: LinkedObjectType,
    pub id: i32,
}

impl LinkRef {
    pub fn goal(id: i32) -> Self {
        Self { kind: LinkedObjectType::Goal, id }
    }

    pub fn budget(id: i32) -> Self {
        Self { kind: LinkedObjectType::Budget, id }
    }
}

/// A single money movement owned by a user.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel)]
#[sea_orm(table_name = "transactions")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub category_id: i32,
    /// Always positive; the direction comes from `transaction_type`.
    #[sea_orm(column_type = "Decimal(Some((16, 4)))")]
    pub amount: Decimal,
    pub transaction_type: TransactionType,
    pub description: Option<String>,
    pub occurred_at: DateTimeUtc,
    pub linked_object_id: Option<i32>,
    pub linked_object_type: Option<LinkedObjectType>,
}

impl Model {
    /// Returns the linked goal or budget, if both link columns are set.
    pub fn link(&self) -> Option<LinkRef> {
        match (self.linked_object_type, self.linked_object_id) {
            (Some(kind), Some(id)) => Some(LinkRef { kind, id }),
            _ => None,
        }
    }
}

impl ActiveModel {
    /// Writes both link columns at once.
    pub fn set_link(&mut self, link: Option<LinkRef>) {
        self.linked_object_id = Set(link.map(|l| l.id));
        self.linked_object_type = Set(link.map(|l| l.kind));
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id",
        on_delete = "Cascade"
    )]
    User,
    #[sea_orm(
        belongs_to = "super::category::Entity",
        from = "Column::CategoryId",
        to = "super::category::Column::Id",
        on_delete = "Restrict"
    )]
    Category,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::category::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Category.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
