use crate::{
    authentication::permissions::ActionType,
    error::{ServiceError, StoreError},
    schema::{BasketEntry, Favorite, Follow, Id},
    session::SessionData,
    store::{constraints, RelationKind, RelationSide, Store},
    views::UserCounts,
};

/// Inserts a relation row. The pre-check only saves a round trip; the
/// storage unique constraint decides.
async fn insert_relation<S: Store>(
    kind: RelationKind,
    subject: Id,
    target: Id,
    store: &S,
) -> Result<(), ServiceError> {
    if store.relation_exists(kind, subject, target).await? {
        return Err(ServiceError::AlreadyExists(
            constraints::describe(kind.unique_constraint()).to_owned(),
        ));
    }

    store
        .insert_relation(kind, subject, target)
        .await
        .map_err(|e| {
            if let StoreError::UniqueViolation { constraint } = &e {
                log::warn!("Concurrent insert into {} hit {constraint}", kind.table());
            }
            ServiceError::from(e)
        })?;

    log::info!("Added {} row ({subject}, {target})", kind.table());
    Ok(())
}

async fn delete_relation<S: Store>(
    kind: RelationKind,
    subject: Id,
    target: Id,
    store: &S,
) -> Result<(), ServiceError> {
    if !store.delete_relation(kind, subject, target).await? {
        return Err(ServiceError::NotFound(
            constraints::describe(kind.unique_constraint()).to_owned(),
        ));
    }

    log::info!("Removed {} row ({subject}, {target})", kind.table());
    Ok(())
}

async fn ensure_recipe<S: Store>(recipe_id: Id, store: &S) -> Result<(), ServiceError> {
    match store.get_recipe(recipe_id).await? {
        Some(_) => Ok(()),
        None => Err(ServiceError::NotFound("recipe".to_owned())),
    }
}

pub async fn follow<S: Store>(
    session: &SessionData,
    followee: Id,
    store: &S,
) -> Result<Follow, ServiceError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let follower = session.user_id;
    if follower == followee {
        return Err(ServiceError::SelfReference);
    }

    if store.get_user(followee).await?.is_none() {
        return Err(ServiceError::NotFound("user".to_owned()));
    }

    insert_relation(RelationKind::Follow, follower, followee, store).await?;

    Ok(Follow {
        follower_id: follower,
        followee_id: followee,
    })
}

pub async fn unfollow<S: Store>(
    session: &SessionData,
    followee: Id,
    store: &S,
) -> Result<(), ServiceError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;
    delete_relation(RelationKind::Follow, session.user_id, followee, store).await
}

pub async fn add_favorite<S: Store>(
    session: &SessionData,
    recipe_id: Id,
    store: &S,
) -> Result<Favorite, ServiceError> {
    session.authenticate(ActionType::ManageOwnFavorites)?;
    ensure_recipe(recipe_id, store).await?;
    insert_relation(RelationKind::Favorite, session.user_id, recipe_id, store).await?;

    Ok(Favorite {
        user_id: session.user_id,
        recipe_id,
    })
}

pub async fn remove_favorite<S: Store>(
    session: &SessionData,
    recipe_id: Id,
    store: &S,
) -> Result<(), ServiceError> {
    session.authenticate(ActionType::ManageOwnFavorites)?;
    delete_relation(RelationKind::Favorite, session.user_id, recipe_id, store).await
}

pub async fn add_to_basket<S: Store>(
    session: &SessionData,
    recipe_id: Id,
    store: &S,
) -> Result<BasketEntry, ServiceError> {
    session.authenticate(ActionType::ManageOwnBasket)?;
    ensure_recipe(recipe_id, store).await?;
    insert_relation(RelationKind::Basket, session.user_id, recipe_id, store).await?;

    Ok(BasketEntry {
        user_id: session.user_id,
        recipe_id,
    })
}

pub async fn remove_from_basket<S: Store>(
    session: &SessionData,
    recipe_id: Id,
    store: &S,
) -> Result<(), ServiceError> {
    session.authenticate(ActionType::ManageOwnBasket)?;
    delete_relation(RelationKind::Basket, session.user_id, recipe_id, store).await
}

pub async fn is_following<S: Store>(
    follower: Id,
    followee: Id,
    store: &S,
) -> Result<bool, ServiceError> {
    Ok(store
        .relation_exists(RelationKind::Follow, follower, followee)
        .await?)
}

pub async fn followers_count<S: Store>(user_id: Id, store: &S) -> Result<i64, ServiceError> {
    Ok(store
        .count_relations(RelationKind::Follow, RelationSide::Target, user_id)
        .await?)
}

pub async fn following_count<S: Store>(user_id: Id, store: &S) -> Result<i64, ServiceError> {
    Ok(store
        .count_relations(RelationKind::Follow, RelationSide::Subject, user_id)
        .await?)
}

pub async fn favorites_count<S: Store>(user_id: Id, store: &S) -> Result<i64, ServiceError> {
    Ok(store
        .count_relations(RelationKind::Favorite, RelationSide::Subject, user_id)
        .await?)
}

pub async fn basket_count<S: Store>(user_id: Id, store: &S) -> Result<i64, ServiceError> {
    Ok(store
        .count_relations(RelationKind::Basket, RelationSide::Subject, user_id)
        .await?)
}

/// How many users have favorited a recipe.
pub async fn favorite_count<S: Store>(recipe_id: Id, store: &S) -> Result<i64, ServiceError> {
    Ok(store
        .count_relations(RelationKind::Favorite, RelationSide::Target, recipe_id)
        .await?)
}

pub async fn user_counts<S: Store>(user_id: Id, store: &S) -> Result<UserCounts, ServiceError> {
    Ok(UserCounts {
        followers: followers_count(user_id, store).await?,
        following: following_count(user_id, store).await?,
        favorites: favorites_count(user_id, store).await?,
        basket: basket_count(user_id, store).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        memory::MemoryStore,
        schema::{NewUser, RecipeDraft, User, UserRole},
    };
    use rstest::{fixture, rstest};

    async fn user(name: &str, store: &MemoryStore) -> User {
        store
            .insert_user(&NewUser {
                username: name.to_owned(),
                email: format!("{name}@example.com"),
                first_name: name.to_owned(),
                last_name: "Tester".to_owned(),
                role: UserRole::User,
            })
            .await
            .unwrap()
    }

    async fn recipe(author: Id, store: &MemoryStore) -> Id {
        let draft = RecipeDraft {
            title: "Toast".to_owned(),
            text: "Toast the bread".to_owned(),
            picture: "images/toast.png".to_owned(),
            cooking_time: 2,
            tags: vec![],
            components: vec![],
        };
        store.insert_recipe(author, &draft).await.unwrap().id
    }

    #[fixture]
    fn store() -> MemoryStore {
        MemoryStore::new()
    }

    #[rstest]
    #[tokio::test]
    async fn self_follow_is_rejected(store: MemoryStore) {
        let anna = user("anna", &store).await;

        let err = follow(&SessionData::from(&anna), anna.id, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::SelfReference));
        assert_eq!(following_count(anna.id, &store).await.unwrap(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn follow_twice_then_unfollow_twice(store: MemoryStore) {
        let anna = user("anna", &store).await;
        let bob = user("bob", &store).await;
        let session = SessionData::from(&anna);

        let row = follow(&session, bob.id, &store).await.unwrap();
        assert_eq!(
            row,
            Follow {
                follower_id: anna.id,
                followee_id: bob.id
            }
        );

        let err = follow(&session, bob.id, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(_)));

        assert_eq!(followers_count(bob.id, &store).await.unwrap(), 1);
        assert_eq!(following_count(anna.id, &store).await.unwrap(), 1);
        assert_eq!(followers_count(anna.id, &store).await.unwrap(), 0);

        unfollow(&session, bob.id, &store).await.unwrap();
        let err = unfollow(&session, bob.id, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(followers_count(bob.id, &store).await.unwrap(), 0);
    }

    #[rstest]
    #[tokio::test]
    async fn following_unknown_user_is_not_found(store: MemoryStore) {
        let anna = user("anna", &store).await;

        let err = follow(&SessionData::from(&anna), 4242, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref what) if what == "user"));
    }

    #[rstest]
    #[tokio::test]
    async fn favorites_and_basket_are_independent_sets(store: MemoryStore) {
        let anna = user("anna", &store).await;
        let toast = recipe(anna.id, &store).await;
        let session = SessionData::from(&anna);

        add_favorite(&session, toast, &store).await.unwrap();
        let err = add_favorite(&session, toast, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(ref what) if what == "favorite"));

        add_to_basket(&session, toast, &store).await.unwrap();
        let err = add_to_basket(&session, toast, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(ref what) if what == "basket entry"));

        assert_eq!(
            user_counts(anna.id, &store).await.unwrap(),
            UserCounts {
                followers: 0,
                following: 0,
                favorites: 1,
                basket: 1,
            }
        );
        assert_eq!(favorite_count(toast, &store).await.unwrap(), 1);

        remove_favorite(&session, toast, &store).await.unwrap();
        let err = remove_favorite(&session, toast, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(basket_count(anna.id, &store).await.unwrap(), 1);

        remove_from_basket(&session, toast, &store).await.unwrap();
        let err = remove_from_basket(&session, toast, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }

    #[rstest]
    #[tokio::test]
    async fn marking_missing_recipe_is_not_found(store: MemoryStore) {
        let anna = user("anna", &store).await;

        let err = add_to_basket(&SessionData::from(&anna), 777, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref what) if what == "recipe"));
    }

    #[rstest]
    #[tokio::test]
    async fn relations_are_recorded_for_the_session_user(store: MemoryStore) {
        let anna = user("anna", &store).await;
        let bob = user("bob", &store).await;
        let toast = recipe(anna.id, &store).await;
        let session = SessionData::from(&bob);

        let favorite = add_favorite(&session, toast, &store).await.unwrap();
        assert_eq!(favorite.user_id, bob.id);
        let entry = add_to_basket(&session, toast, &store).await.unwrap();
        assert_eq!(entry.user_id, bob.id);

        assert_eq!(favorites_count(bob.id, &store).await.unwrap(), 1);
        assert_eq!(basket_count(bob.id, &store).await.unwrap(), 1);
        assert_eq!(favorites_count(anna.id, &store).await.unwrap(), 0);
        assert_eq!(basket_count(anna.id, &store).await.unwrap(), 0);

        // Another session cannot remove rows it does not own.
        let err = remove_favorite(&SessionData::from(&anna), toast, &store)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert_eq!(favorite_count(toast, &store).await.unwrap(), 1);
    }
}
