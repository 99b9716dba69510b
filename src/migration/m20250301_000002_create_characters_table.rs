use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum Characters {
    Table,
    Id,
    Name,
    Alias,
    Quote,
    Description,
    Origin,
    Gender,
    Classification,
    Images,
    Tier,
    AttackPotency,
    Speed,
    Durability,
    Weaknesses,
    Equipment,
    Strength,
    SpeedStat,
    DurabilityStat,
    Intelligence,
    Energy,
    Combat,
    Abilities,
    LikedBy,
    CreatorId,
    Views,
    Likes,
    IsActive,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Users {
    Table,
    Id,
}

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Characters::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Characters::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Characters::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Characters::Alias).string_len(100).null())
                    .col(ColumnDef::new(Characters::Quote).text().null())
                    .col(ColumnDef::new(Characters::Description).text().not_null())
                    .col(ColumnDef::new(Characters::Origin).string_len(100).null())
                    .col(ColumnDef::new(Characters::Gender).string_len(50).null())
                    .col(
                        ColumnDef::new(Characters::Classification)
                            .string_len(100)
                            .null(),
                    )
                    .col(ColumnDef::new(Characters::Images).json_binary().not_null())
                    .col(
                        ColumnDef::new(Characters::Tier)
                            .string_len(50)
                            .not_null()
                            .default("Unknown"),
                    )
                    .col(ColumnDef::new(Characters::AttackPotency).text().null())
                    .col(ColumnDef::new(Characters::Speed).text().null())
                    .col(ColumnDef::new(Characters::Durability).text().null())
                    .col(ColumnDef::new(Characters::Weaknesses).text().null())
                    .col(ColumnDef::new(Characters::Equipment).text().null())
                    .col(
                        ColumnDef::new(Characters::Strength)
                            .integer()
                            .not_null()
                            .default(50),
                    )
                    .col(
                        ColumnDef::new(Characters::SpeedStat)
                            .integer()
                            .not_null()
                            .default(50),
                    )
                    .col(
                        ColumnDef::new(Characters::DurabilityStat)
                            .integer()
                            .not_null()
                            .default(50),
                    )
                    .col(
                        ColumnDef::new(Characters::Intelligence)
                            .integer()
                            .not_null()
                            .default(50),
                    )
                    .col(
                        ColumnDef::new(Characters::Energy)
                            .integer()
                            .not_null()
                            .default(50),
                    )
                    .col(
                        ColumnDef::new(Characters::Combat)
                            .integer()
                            .not_null()
                            .default(50),
                    )
                    .col(
                        ColumnDef::new(Characters::Abilities)
                            .json_binary()
                            .not_null(),
                    )
                    .col(ColumnDef::new(Characters::LikedBy).json_binary().not_null())
                    .col(ColumnDef::new(Characters::CreatorId).integer().not_null())
                    .col(
                        ColumnDef::new(Characters::Views)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Characters::Likes)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Characters::IsActive)
                            .boolean()
                            .not_null()
                            .default(true),
                    )
                    .col(
                        ColumnDef::new(Characters::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(Characters::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_characters_creator_id")
                            .from(Characters::Table, Characters::CreatorId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_characters_creator")
                    .table(Characters::Table)
                    .col(Characters::CreatorId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_characters_tier")
                    .table(Characters::Table)
                    .col(Characters::Tier)
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Characters::Table).to_owned())
            .await
    }
}
