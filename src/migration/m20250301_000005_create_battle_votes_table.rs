use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[derive(DeriveIden)]
enum BattleVotes {
    Table,
    Id,
    BattleId,
    UserId,
    VotedCharacterId,
    CreatedAt,
    UpdatedAt,
}

#[derive(DeriveIden)]
enum Battles {
    Table,
    Id,
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
                    .table(BattleVotes::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(BattleVotes::Id)
                            .integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(BattleVotes::BattleId).integer().not_null())
                    .col(ColumnDef::new(BattleVotes::UserId).integer().not_null())
                    .col(
                        ColumnDef::new(BattleVotes::VotedCharacterId)
                            .integer()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(BattleVotes::CreatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(
                        ColumnDef::new(BattleVotes::UpdatedAt)
                            .timestamp()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_battle_votes_battle_id")
                            .from(BattleVotes::Table, BattleVotes::BattleId)
                            .to(Battles::Table, Battles::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_battle_votes_user_id")
                            .from(BattleVotes::Table, BattleVotes::UserId)
                            .to(Users::Table, Users::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .name("idx_battle_votes_unique")
                    .table(BattleVotes::Table)
                    .col(BattleVotes::BattleId)
                    .col(BattleVotes::UserId)
                    .unique()
                    .to_owned(),
            )
            .await
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(BattleVotes::Table).to_owned())
            .await
    }
}
