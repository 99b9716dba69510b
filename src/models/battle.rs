use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "battles")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub character1_id: i32,
    pub character2_id: i32,
    pub creator_id: i32,
    /// Frozen at creation by the outcome resolver; never recomputed.
    pub simulation_winner_id: Option<i32>,
    pub win_probability_char1: i32,
    pub win_probability_char2: i32,
    pub votes_char1: i32,
    pub votes_char2: i32,
    pub total_votes: i32,
    pub views: i32,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::character::Entity",
        from = "Column::Character1Id",
        to = "super::character::Column::Id"
    )]
    Character1,
    #[sea_orm(
        belongs_to = "super::character::Entity",
        from = "Column::Character2Id",
        to = "super::character::Column::Id"
    )]
    Character2,
    #[sea_orm(
        belongs_to = "super::user::Entity",
        from = "Column::CreatorId",
        to = "super::user::Column::Id"
    )]
    Creator,
}

impl Related<super::user::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Creator.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
