use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// One row per (battle, user); the row is updated in place when a user
/// switches sides, never duplicated.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "battle_votes")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub battle_id: i32,
    pub user_id: i32,
    pub voted_character_id: i32,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::battle::Entity",
        from = "Column::BattleId",
        to = "super::battle::Column::Id"
    )]
    Battle,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::UserId",
        to = "super::user::Column::Id"
    )]
    User,
}

impl Related<super::battle::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Battle.def()
    }
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
