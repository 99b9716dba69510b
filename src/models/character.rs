use sea_orm::entity::prelude::*;
use sea_orm::FromJsonQueryResult;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Shown when a character has no image variants yet.
pub const PLACEHOLDER_IMAGE: &str = "https://placehold.co/400x600?text=Character";

/// One entry of the ordered image-variant list; the first entry is the
/// character's primary image.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema)]
pub struct ImageVariant {
    pub url: String,
    #[serde(default)]
    pub label: Option<String>,
}

#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
pub struct ImageList(pub Vec<ImageVariant>);

#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
pub struct AbilityList(pub Vec<String>);

/// User ids that currently like the owning row. Backs the idempotent
/// like toggle.
#[derive(
    Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, FromJsonQueryResult, ToSchema,
)]
pub struct LikerSet(pub Vec<i32>);

impl LikerSet {
    pub fn contains(&self, user_id: i32) -> bool {
        self.0.contains(&user_id)
    }
}

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize, ToSchema)]
#[sea_orm(table_name = "characters")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    pub alias: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub quote: Option<String>,
    #[sea_orm(column_type = "Text")]
    pub description: String,
    pub origin: Option<String>,
    pub gender: Option<String>,
    pub classification: Option<String>,
    #[sea_orm(column_type = "JsonBinary")]
    pub images: ImageList,
    pub tier: String,
    // Narrative wiki stats: free text, distinct from the numeric stats below.
    #[sea_orm(column_type = "Text", nullable)]
    pub attack_potency: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub speed: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub durability: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub weaknesses: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub equipment: Option<String>,
    pub strength: i32,
    pub speed_stat: i32,
    pub durability_stat: i32,
    pub intelligence: i32,
    pub energy: i32,
    pub combat: i32,
    #[sea_orm(column_type = "JsonBinary")]
    pub abilities: AbilityList,
    #[sea_orm(column_type = "JsonBinary")]
    pub liked_by: LikerSet,
    pub creator_id: i32,
    pub views: i32,
    pub likes: i32,
    pub is_active: bool,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}

impl Model {
    /// Derived power level: rounded mean of the six numeric stats.
    /// Never stored; recomputed on every read.
    pub fn power_level(&self) -> i32 {
        let sum = self.strength
            + self.speed_stat
            + self.durability_stat
            + self.intelligence
            + self.energy
            + self.combat;
        (f64::from(sum) / 6.0).round() as i32
    }

    pub fn primary_image(&self) -> String {
        self.images
            .0
            .first()
            .map(|v| v.url.clone())
            .unwrap_or_else(|| PLACEHOLDER_IMAGE.to_string())
    }
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
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

#[cfg(test)]
mod tests {
    use super::*;

    fn stats_character(stats: [i32; 6]) -> Model {
        Model {
            id: 1,
            name: "Test".to_string(),
            alias: None,
            quote: None,
            description: "lore".to_string(),
            origin: None,
            gender: None,
            classification: None,
            images: ImageList::default(),
            tier: "Unknown".to_string(),
            attack_potency: None,
            speed: None,
            durability: None,
            weaknesses: None,
            equipment: None,
            strength: stats[0],
            speed_stat: stats[1],
            durability_stat: stats[2],
            intelligence: stats[3],
            energy: stats[4],
            combat: stats[5],
            abilities: AbilityList::default(),
            liked_by: LikerSet::default(),
            creator_id: 1,
            views: 0,
            likes: 0,
            is_active: true,
            created_at: DateTime::default(),
            updated_at: DateTime::default(),
        }
    }

    #[test]
    fn power_level_is_rounded_mean() {
        assert_eq!(stats_character([50; 6]).power_level(), 50);
        assert_eq!(stats_character([100, 100, 100, 100, 100, 100]).power_level(), 100);
        // mean 50.5 rounds to 51
        assert_eq!(stats_character([50, 50, 50, 51, 51, 51]).power_level(), 51);
        // mean 1.0
        assert_eq!(stats_character([1; 6]).power_level(), 1);
    }

    #[test]
    fn primary_image_falls_back_to_placeholder() {
        let mut c = stats_character([50; 6]);
        assert_eq!(c.primary_image(), PLACEHOLDER_IMAGE);

        c.images = ImageList(vec![
            ImageVariant {
                url: "/uploads/base.png".to_string(),
                label: Some("Base Form".to_string()),
            },
            ImageVariant {
                url: "/uploads/rage.png".to_string(),
                label: Some("Rage Mode".to_string()),
            },
        ]);
        assert_eq!(c.primary_image(), "/uploads/base.png");
    }

    #[test]
    fn liker_set_membership() {
        let set = LikerSet(vec![3, 7]);
        assert!(set.contains(7));
        assert!(!set.contains(4));
    }
}
