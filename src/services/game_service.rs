use std::time::SystemTime;

use tracing::{info, warn};
use uuid::Uuid;
use validator::Validate;

use crate::{
    dao::models::{GameEntity, StarEntity, Topic},
    dto::game::{
        GameCard, GameDetail, GameInput, GameListResponse, StarToggleResponse,
        StarredGamesResponse,
    },
    error::ServiceError,
    services::live_events,
    state::{SharedState, UserIdentity},
};

/// Ranked game list for the list view.
///
/// An empty result and a failed query both come back as an empty list carrying
/// the quota notice; the failure is only logged.
pub async fn list_games(state: &SharedState) -> GameListResponse {
    let limit = state.config().game_list_limit;
    let games = match state.require_store().await {
        Ok(store) => match store.list_top_games(limit).await {
            Ok(games) => games,
            Err(err) => {
                warn!(error = %err, "failed to list games");
                Vec::new()
            }
        },
        Err(err) => {
            warn!(error = %err, "cannot list games");
            Vec::new()
        }
    };

    let notice = games
        .is_empty()
        .then(|| state.config().quota_notice.clone());

    GameListResponse {
        games: games.into_iter().map(GameCard::from).collect(),
        notice,
    }
}

pub async fn get_game(state: &SharedState, id: Uuid) -> Result<GameDetail, ServiceError> {
    let store = state.require_store().await?;
    let game = store.find_game(id).await?.ok_or_else(|| not_found(id))?;
    Ok(game.into())
}

/// Validate and persist a new game with zero stars.
pub async fn create_game(
    state: &SharedState,
    input: GameInput,
) -> Result<GameDetail, ServiceError> {
    input.validate()?;
    let store = state.require_store().await?;

    let now = SystemTime::now();
    let game = GameEntity {
        id: Uuid::new_v4(),
        name: input.name.trim().to_owned(),
        description: input.description.trim().to_owned(),
        labels: input.normalized_labels(),
        rules: input.rules,
        stars: 0,
        created_at: now,
        updated_at: now,
    };

    store.save_game(game.clone()).await.inspect_err(|err| {
        warn!(game_id = %game.id, error = %err, "failed to save new game");
    })?;
    info!(game_id = %game.id, name = %game.name, "game created");

    live_events::publish_games_snapshot(state).await;
    Ok(game.into())
}

/// Overwrite a game in place. Identity, creation time and stars are kept.
pub async fn update_game(
    state: &SharedState,
    id: Uuid,
    input: GameInput,
) -> Result<GameDetail, ServiceError> {
    input.validate()?;
    let store = state.require_store().await?;

    let game = {
        let _gate = state.lock_games().await;
        let current = store.find_game(id).await?.ok_or_else(|| not_found(id))?;
        let labels = input.normalized_labels();
        let game = GameEntity {
            name: input.name.trim().to_owned(),
            description: input.description.trim().to_owned(),
            labels,
            rules: input.rules,
            updated_at: SystemTime::now().max(current.created_at),
            ..current
        };

        store.save_game(game.clone()).await.inspect_err(|err| {
            warn!(game_id = %id, error = %err, "failed to save edited game");
        })?;
        game
    };
    info!(game_id = %id, "game updated");

    live_events::publish_games_snapshot(state).await;
    Ok(game.into())
}

/// Remove a game together with its stars and its discussion thread.
pub async fn delete_game(state: &SharedState, id: Uuid) -> Result<(), ServiceError> {
    let store = state.require_store().await?;
    let topic = Topic::Game(id);

    {
        let _gate = state.lock_games().await;
        if !store.delete_game(id).await? {
            return Err(not_found(id));
        }

        // The game is gone at this point; leftovers are logged, not reported.
        match store.delete_stars_for_game(id).await {
            Ok(count) => info!(game_id = %id, count, "removed stars of deleted game"),
            Err(err) => warn!(game_id = %id, error = %err, "failed to remove stars of deleted game"),
        }
        match store.delete_topic(topic).await {
            Ok(count) => info!(game_id = %id, count, "removed discussion of deleted game"),
            Err(err) => warn!(game_id = %id, error = %err, "failed to remove discussion of deleted game"),
        }
    }
    info!(game_id = %id, "game deleted");

    live_events::publish_games_snapshot(state).await;
    live_events::publish_discussion_snapshot(state, topic).await;
    Ok(())
}

/// Flip the caller's star on a game.
///
/// The aggregate count and the membership record are two separate writes with
/// no transaction between them; toggles are serialised by the game gate.
pub async fn toggle_star(
    state: &SharedState,
    user: &UserIdentity,
    id: Uuid,
) -> Result<StarToggleResponse, ServiceError> {
    let store = state.require_store().await?;

    let response = {
        let _gate = state.lock_games().await;
        let mut game = store.find_game(id).await?.ok_or_else(|| not_found(id))?;
        let starred = store.find_star(user.uid.clone(), id).await?.is_some();

        let result = if starred {
            game.stars = game.stars.saturating_sub(1);
            match store.save_game(game.clone()).await {
                Ok(()) => store.delete_star(user.uid.clone(), id).await.map(|_| ()),
                Err(err) => Err(err),
            }
        } else {
            game.stars = game.stars.saturating_add(1);
            match store.save_game(game.clone()).await {
                Ok(()) => {
                    store
                        .save_star(StarEntity {
                            user_id: user.uid.clone(),
                            game_id: id,
                            created_at: SystemTime::now(),
                        })
                        .await
                }
                Err(err) => Err(err),
            }
        };

        if let Err(err) = result {
            warn!(game_id = %id, user = %user.uid, error = %err, "star toggle failed");
            return Err(err.into());
        }

        StarToggleResponse {
            game_id: id,
            starred: !starred,
            stars: game.stars,
        }
    };
    info!(
        game_id = %id,
        user = %user.uid,
        starred = response.starred,
        stars = response.stars,
        "star toggled"
    );

    live_events::publish_games_snapshot(state).await;
    Ok(response)
}

/// Ids of the games the caller has starred, oldest star first.
pub async fn starred_games(
    state: &SharedState,
    user: &UserIdentity,
) -> Result<StarredGamesResponse, ServiceError> {
    let store = state.require_store().await?;
    let mut stars = store.list_stars_for_user(user.uid.clone()).await?;
    stars.sort_by_key(|star| (star.created_at, star.game_id));

    Ok(StarredGamesResponse {
        game_ids: stars.into_iter().map(|star| star.game_id).collect(),
    })
}

fn not_found(id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("game `{id}` not found"))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::archive_store::{ArchiveStore, memory::MemoryArchiveStore},
        state::AppState,
    };

    async fn state_with_store() -> (SharedState, MemoryArchiveStore) {
        let state = AppState::new(AppConfig::default());
        let store = MemoryArchiveStore::new();
        state.install_store(Arc::new(store.clone())).await;
        (state, store)
    }

    fn user(uid: &str) -> UserIdentity {
        UserIdentity {
            uid: uid.into(),
            display_name: None,
            photo_url: None,
        }
    }

    fn input(name: &str) -> GameInput {
        GameInput {
            name: name.into(),
            description: "A game played with a deck of cards".into(),
            labels: vec!["cards".into(), "family".into(), "cards".into()],
            rules: vec!["Shuffle".into(), "Deal seven cards".into()],
        }
    }

    #[tokio::test]
    async fn created_game_matches_submitted_labels_and_rules() {
        let (state, store) = state_with_store().await;
        let detail = create_game(&state, input("Uno")).await.unwrap();

        let stored = store.find_game(detail.id).await.unwrap().unwrap();
        assert_eq!(stored.labels, ["cards", "family"]);
        assert_eq!(stored.rules, ["Shuffle", "Deal seven cards"]);
        assert_eq!(stored.stars, 0);
    }

    #[tokio::test]
    async fn invalid_input_is_not_persisted() {
        let (state, store) = state_with_store().await;
        let mut game = input("Uno");
        game.rules.clear();

        let result = create_game(&state, game).await;
        assert!(matches!(result, Err(ServiceError::InvalidInput(_))));
        assert!(store.list_top_games(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn edit_overwrites_in_place_and_keeps_stars() {
        let (state, _store) = state_with_store().await;
        let created = create_game(&state, input("Uno")).await.unwrap();
        toggle_star(&state, &user("alice"), created.id).await.unwrap();

        let mut edited = input("Uno Flip");
        edited.rules = vec!["Flip the deck".into()];
        update_game(&state, created.id, edited).await.unwrap();

        let reopened = get_game(&state, created.id).await.unwrap();
        assert_eq!(reopened.id, created.id);
        assert_eq!(reopened.name, "Uno Flip");
        assert_eq!(reopened.rules, ["Flip the deck"]);
        assert_eq!(reopened.stars, 1);
        assert_eq!(reopened.created_at, created.created_at);
    }

    #[tokio::test]
    async fn star_count_and_membership_move_together() {
        let (state, store) = state_with_store().await;
        let game = create_game(&state, input("Uno")).await.unwrap();
        let alice = user("alice");
        let bob = user("bob");

        let sequence = [&alice, &bob, &alice, &alice, &bob, &bob, &alice];
        for who in sequence {
            let before = store.find_game(game.id).await.unwrap().unwrap().stars;
            let was_member = store
                .find_star(who.uid.clone(), game.id)
                .await
                .unwrap()
                .is_some();

            let response = toggle_star(&state, who, game.id).await.unwrap();

            let is_member = store
                .find_star(who.uid.clone(), game.id)
                .await
                .unwrap()
                .is_some();
            assert_eq!(is_member, !was_member);
            assert_eq!(response.starred, is_member);
            let expected = if is_member { before + 1 } else { before - 1 };
            assert_eq!(response.stars, expected);
            assert_eq!(store.find_game(game.id).await.unwrap().unwrap().stars, expected);
        }
    }

    #[tokio::test]
    async fn concurrent_toggles_do_not_lose_updates() {
        let (state, store) = state_with_store().await;
        let game = create_game(&state, input("Uno")).await.unwrap();

        let tasks: Vec<_> = (0..16)
            .map(|n| {
                let state = state.clone();
                tokio::spawn(async move { toggle_star(&state, &user(&format!("u{n}")), game.id).await })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(store.find_game(game.id).await.unwrap().unwrap().stars, 16);
    }

    #[tokio::test]
    async fn list_is_ranked_by_stars_and_capped() {
        let (state, _store) = state_with_store().await;
        let mut ids = Vec::new();
        for n in 0..12 {
            ids.push(create_game(&state, input(&format!("Game {n}"))).await.unwrap().id);
        }
        let favourite = ids[11];
        toggle_star(&state, &user("alice"), favourite).await.unwrap();

        let list = list_games(&state).await;
        assert_eq!(list.games.len(), 10);
        assert_eq!(list.games[0].id, favourite);
        assert!(list.notice.is_none());
    }

    #[tokio::test]
    async fn empty_and_failed_lists_both_carry_the_notice() {
        let (state, store) = state_with_store().await;
        let empty = list_games(&state).await;
        assert!(empty.games.is_empty());
        assert_eq!(empty.notice.as_deref(), Some(state.config().quota_notice.as_str()));

        create_game(&state, input("Uno")).await.unwrap();
        store.set_offline(true);
        let failed = list_games(&state).await;
        assert!(failed.games.is_empty());
        assert_eq!(failed.notice, empty.notice);
    }

    #[tokio::test]
    async fn deleting_a_game_removes_stars_and_thread() {
        let (state, store) = state_with_store().await;
        let game = create_game(&state, input("Uno")).await.unwrap();
        toggle_star(&state, &user("alice"), game.id).await.unwrap();

        delete_game(&state, game.id).await.unwrap();

        assert!(store.find_game(game.id).await.unwrap().is_none());
        assert!(starred_games(&state, &user("alice")).await.unwrap().game_ids.is_empty());
        assert!(matches!(
            delete_game(&state, game.id).await,
            Err(ServiceError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn writes_fail_in_degraded_mode() {
        let state = AppState::new(AppConfig::default());
        assert!(matches!(
            create_game(&state, input("Uno")).await,
            Err(ServiceError::Degraded)
        ));
    }
}
