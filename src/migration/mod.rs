use sea_orm_migration::prelude::*;

mod m20250301_000001_create_users_table;
mod m20250301_000002_create_characters_table;
mod m20250301_000003_create_comments_table;
mod m20250301_000004_create_battles_table;
mod m20250301_000005_create_battle_votes_table;
mod m20250301_000006_create_conversations_tables;
mod m20250301_000007_create_messages_table;
mod m20250301_000008_create_refresh_tokens;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250301_000001_create_users_table::Migration),
            Box::new(m20250301_000002_create_characters_table::Migration),
            Box::new(m20250301_000003_create_comments_table::Migration),
            Box::new(m20250301_000004_create_battles_table::Migration),
            Box::new(m20250301_000005_create_battle_votes_table::Migration),
            Box::new(m20250301_000006_create_conversations_tables::Migration),
            Box::new(m20250301_000007_create_messages_table::Migration),
            Box::new(m20250301_000008_create_refresh_tokens::Migration),
        ]
    }
}
