use crate::{
    error::{AppError, AppResult},
    models::{
        battle, battle_vote, character, Battle, BattleModel, BattleVote, BattleVoteModel,
        Character,
    },
};
use rand::Rng;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, QuerySelect, Statement, TransactionTrait,
};

/// Total order of power tiers, weakest to strongest. Tiers missing from the
/// table rank alongside "Unknown".
const TIER_RANKS: [(&str, u8); 13] = [
    ("Unknown", 0),
    ("Street Level", 1),
    ("Building Level", 2),
    ("City Level", 3),
    ("Country Level", 4),
    ("Continental", 5),
    ("Planet Level", 6),
    ("Star Level", 7),
    ("Galaxy Level", 8),
    ("Universal", 9),
    ("Multiversal", 10),
    ("Hyperversal", 11),
    ("Omnipotent", 12),
];

pub fn tier_rank(tier: &str) -> u8 {
    TIER_RANKS
        .iter()
        .find(|(name, _)| *name == tier)
        .map(|(_, rank)| *rank)
        .unwrap_or(0)
}

pub struct SimulatedOutcome {
    pub probability1: i32,
    pub probability2: i32,
    pub char1_wins: bool,
}

/// Deterministic probability split plus one randomized winner draw.
/// The higher tier gets 90/10, equal tiers 50/50; `roll` is uniform in
/// [0, 100) and character1 wins iff roll <= probability1.
pub fn simulate_outcome(tier1: &str, tier2: &str, roll: f64) -> SimulatedOutcome {
    let rank1 = tier_rank(tier1);
    let rank2 = tier_rank(tier2);

    let (probability1, probability2) = if rank1 > rank2 {
        (90, 10)
    } else if rank2 > rank1 {
        (10, 90)
    } else {
        (50, 50)
    };

    SimulatedOutcome {
        probability1,
        probability2,
        char1_wins: roll <= f64::from(probability1),
    }
}

pub struct BattleService {
    db: DatabaseConnection,
}

impl BattleService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Create a battle between two distinct active characters. The outcome
    /// triple is computed exactly once here and frozen; later tier edits or
    /// votes never change it.
    pub async fn create(
        &self,
        creator_id: i32,
        character1_id: i32,
        character2_id: i32,
    ) -> AppResult<BattleModel> {
        if character1_id == character2_id {
            return Err(AppError::Validation(
                "A character cannot battle itself".to_string(),
            ));
        }

        let char1 = self.get_active_character(character1_id).await?;
        let char2 = self.get_active_character(character2_id).await?;

        let roll = rand::rng().random_range(0.0..100.0);
        let outcome = simulate_outcome(&char1.tier, &char2.tier, roll);
        let winner_id = if outcome.char1_wins {
            char1.id
        } else {
            char2.id
        };

        let now = chrono::Utc::now().naive_utc();
        let new_battle = battle::ActiveModel {
            character1_id: sea_orm::ActiveValue::Set(character1_id),
            character2_id: sea_orm::ActiveValue::Set(character2_id),
            creator_id: sea_orm::ActiveValue::Set(creator_id),
            simulation_winner_id: sea_orm::ActiveValue::Set(Some(winner_id)),
            win_probability_char1: sea_orm::ActiveValue::Set(outcome.probability1),
            win_probability_char2: sea_orm::ActiveValue::Set(outcome.probability2),
            votes_char1: sea_orm::ActiveValue::Set(0),
            votes_char2: sea_orm::ActiveValue::Set(0),
            total_votes: sea_orm::ActiveValue::Set(0),
            views: sea_orm::ActiveValue::Set(0),
            is_active: sea_orm::ActiveValue::Set(true),
            created_at: sea_orm::ActiveValue::Set(now),
            updated_at: sea_orm::ActiveValue::Set(now),
            ..Default::default()
        };

        let battle = new_battle.insert(&self.db).await?;
        Ok(battle)
    }

    pub async fn list(
        &self,
        page: u64,
        per_page: u64,
        sort: &str,
    ) -> AppResult<(Vec<BattleModel>, u64)> {
        let mut query = Battle::find().filter(battle::Column::IsActive.eq(true));

        query = match sort {
            "popular" => query
                .order_by_desc(battle::Column::Views)
                .order_by_desc(battle::Column::TotalVotes),
            _ => query.order_by_desc(battle::Column::CreatedAt),
        };

        let paginator = query.paginate(&self.db, per_page);
        let total = paginator.num_items().await?;
        let battles = paginator.fetch_page(page.saturating_sub(1)).await?;

        Ok((battles, total))
    }

    pub async fn get_active(&self, id: i32) -> AppResult<BattleModel> {
        Battle::find_by_id(id)
            .filter(battle::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }

    pub async fn increment_views(&self, id: i32) -> AppResult<()> {
        self.db
            .execute(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "UPDATE battles SET views = views + 1 WHERE id = $1 AND is_active = TRUE",
                vec![id.into()],
            ))
            .await?;
        Ok(())
    }

    /// Vote state machine: first vote creates the row and bumps totals; an
    /// identical resubmission is a no-op; a switch moves one count across
    /// and rewrites the existing row. `votes_char1 + votes_char2 ==
    /// total_votes` holds at every commit.
    pub async fn vote(
        &self,
        battle_id: i32,
        user_id: i32,
        voted_character_id: i32,
    ) -> AppResult<BattleModel> {
        let battle = self.get_active(battle_id).await?;

        if voted_character_id != battle.character1_id
            && voted_character_id != battle.character2_id
        {
            return Err(AppError::Validation(
                "Voted character is not part of this battle".to_string(),
            ));
        }

        let txn = self.db.begin().await?;

        // Read the previous choice in the same transaction to compute the
        // exact counter delta.
        let previous = BattleVote::find()
            .filter(battle_vote::Column::BattleId.eq(battle_id))
            .filter(battle_vote::Column::UserId.eq(user_id))
            .lock_exclusive()
            .one(&txn)
            .await?
            .map(|v| v.voted_character_id);

        if previous != Some(voted_character_id) {
            txn.execute(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "INSERT INTO battle_votes (battle_id, user_id, voted_character_id, created_at, updated_at)
                 VALUES ($1, $2, $3, NOW(), NOW())
                 ON CONFLICT (battle_id, user_id)
                 DO UPDATE SET voted_character_id = EXCLUDED.voted_character_id, updated_at = NOW()",
                vec![battle_id.into(), user_id.into(), voted_character_id.into()],
            ))
            .await?;

            let backs_char1 = voted_character_id == battle.character1_id;
            let (delta1, delta2, delta_total) = match previous {
                None if backs_char1 => (1, 0, 1),
                None => (0, 1, 1),
                Some(_) if backs_char1 => (1, -1, 0),
                Some(_) => (-1, 1, 0),
            };

            txn.execute(Statement::from_sql_and_values(
                sea_orm::DatabaseBackend::Postgres,
                "UPDATE battles
                 SET votes_char1 = GREATEST(votes_char1 + $1, 0),
                     votes_char2 = GREATEST(votes_char2 + $2, 0),
                     total_votes = GREATEST(total_votes + $3, 0)
                 WHERE id = $4",
                vec![
                    delta1.into(),
                    delta2.into(),
                    delta_total.into(),
                    battle_id.into(),
                ],
            ))
            .await?;
        }

        txn.commit().await?;
        self.get_active(battle_id).await
    }

    /// The caller's single current vote, or None. Never a history.
    pub async fn my_vote(
        &self,
        battle_id: i32,
        user_id: i32,
    ) -> AppResult<Option<BattleVoteModel>> {
        let vote = BattleVote::find()
            .filter(battle_vote::Column::BattleId.eq(battle_id))
            .filter(battle_vote::Column::UserId.eq(user_id))
            .one(&self.db)
            .await?;
        Ok(vote)
    }

    pub async fn soft_delete(&self, id: i32, user_id: i32) -> AppResult<()> {
        let battle = self.get_active(id).await?;
        if battle.creator_id != user_id {
            return Err(AppError::Forbidden);
        }

        let mut active: battle::ActiveModel = battle.into();
        active.is_active = sea_orm::ActiveValue::Set(false);
        active.updated_at = sea_orm::ActiveValue::Set(chrono::Utc::now().naive_utc());
        active.update(&self.db).await?;
        Ok(())
    }

    async fn get_active_character(&self, id: i32) -> AppResult<crate::models::CharacterModel> {
        Character::find_by_id(id)
            .filter(character::Column::IsActive.eq(true))
            .one(&self.db)
            .await?
            .ok_or(AppError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn tier_ranks_are_strictly_ordered() {
        for window in TIER_RANKS.windows(2) {
            assert!(window[0].1 < window[1].1);
        }
        assert_eq!(tier_rank("Unknown"), 0);
        assert_eq!(tier_rank("Omnipotent"), 12);
    }

    #[test]
    fn unmapped_tier_ranks_as_unknown() {
        assert_eq!(tier_rank("2-C"), 0);
        assert_eq!(tier_rank(""), 0);
    }

    #[test]
    fn higher_tier_gets_ninety_percent() {
        let outcome = simulate_outcome("Universal", "City Level", 50.0);
        assert_eq!(outcome.probability1, 90);
        assert_eq!(outcome.probability2, 10);

        let reversed = simulate_outcome("City Level", "Universal", 50.0);
        assert_eq!(reversed.probability1, 10);
        assert_eq!(reversed.probability2, 90);
    }

    #[test]
    fn equal_tiers_split_fifty_fifty() {
        let outcome = simulate_outcome("Planet Level", "Planet Level", 0.0);
        assert_eq!(outcome.probability1, 50);
        assert_eq!(outcome.probability2, 50);
    }

    #[test]
    fn probabilities_always_sum_to_one_hundred() {
        for (tier1, _) in TIER_RANKS {
            for (tier2, _) in TIER_RANKS {
                let outcome = simulate_outcome(tier1, tier2, 0.0);
                assert_eq!(outcome.probability1 + outcome.probability2, 100);
            }
        }
    }

    #[test]
    fn winner_follows_the_roll() {
        assert!(simulate_outcome("Universal", "City Level", 90.0).char1_wins);
        assert!(!simulate_outcome("Universal", "City Level", 90.1).char1_wins);
        assert!(!simulate_outcome("City Level", "Universal", 10.5).char1_wins);
        assert!(simulate_outcome("City Level", "Universal", 10.0).char1_wins);
    }

    #[test]
    fn underdog_wins_about_ten_percent_of_trials() {
        let mut rng = StdRng::seed_from_u64(7);
        let mut upsets = 0;
        for _ in 0..1000 {
            let roll = rng.random_range(0.0..100.0);
            if !simulate_outcome("Universal", "Street Level", roll).char1_wins {
                upsets += 1;
            }
        }
        // Expectation 100 of 1000; generous tolerance for sampling noise.
        assert!((50..=160).contains(&upsets), "upsets = {upsets}");
    }

    #[test]
    fn switch_vote_preserves_total() {
        // first vote for char1, then switch to char2
        let (d1_first, d2_first, dt_first) = (1, 0, 1);
        let (d1_switch, d2_switch, dt_switch) = (-1, 1, 0);
        let votes1 = 0 + d1_first + d1_switch;
        let votes2 = 0 + d2_first + d2_switch;
        let total = 0 + dt_first + dt_switch;
        assert_eq!(votes1 + votes2, total);
        assert_eq!((votes1, votes2, total), (0, 1, 1));
    }
}
