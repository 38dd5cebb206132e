use email_address::EmailAddress;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::{
    authentication::permissions::ActionType,
    constants::{DEFAULT_RECIPES_LIMIT, EMAIL_MAX_LENGTH, USERNAME_MAX_LENGTH},
    error::ServiceError,
    schema::{Id, NewUser, RecipeFilter, User},
    session::{SessionData, Viewer},
    store::{RelationKind, Store},
    views::{RecipeSummary, SubscriptionView, UserView},
};

static USERNAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("username pattern is valid"));

/// Reserved because `users/me` addresses the current user.
const RESERVED_USERNAME: &str = "me";

fn validate_new_user(user: &NewUser) -> Result<(), ServiceError> {
    if user.username.is_empty() || user.username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(ServiceError::validation(format!(
            "Username must be between 1 and {USERNAME_MAX_LENGTH} characters"
        )));
    }
    if !USERNAME_PATTERN.is_match(&user.username) {
        return Err(ServiceError::validation(
            "Username may only contain letters, digits and @/./+/-/_",
        ));
    }
    if user.username.eq_ignore_ascii_case(RESERVED_USERNAME) {
        return Err(ServiceError::validation(format!(
            "Username '{RESERVED_USERNAME}' is reserved"
        )));
    }

    let email = user.email.as_str();
    if email.len() > EMAIL_MAX_LENGTH || !EmailAddress::is_valid(email) {
        return Err(ServiceError::validation(format!("Invalid email: {email}")));
    }

    Ok(())
}

pub async fn register_user<S: Store>(user: &NewUser, store: &S) -> Result<User, ServiceError> {
    validate_new_user(user)?;

    let row = store.insert_user(user).await?;
    log::info!("Registered user {} ({})", row.id, row.username);

    Ok(row)
}

pub async fn get_user<S: Store>(id: Id, store: &S) -> Result<User, ServiceError> {
    store
        .get_user(id)
        .await?
        .ok_or_else(|| ServiceError::NotFound("user".to_owned()))
}

pub async fn get_user_view<S: Store>(
    id: Id,
    viewer: &Viewer,
    store: &S,
) -> Result<UserView, ServiceError> {
    let user = get_user(id, store).await?;

    let is_subscribed = match viewer.user_id() {
        Some(viewer_id) => {
            store
                .relation_exists(RelationKind::Follow, viewer_id, user.id)
                .await?
        }
        None => false,
    };

    Ok(UserView::new(user, is_subscribed))
}

/// Removes a user together with everything they own.
pub async fn delete_user<S: Store>(
    id: Id,
    session: &SessionData,
    store: &S,
) -> Result<(), ServiceError> {
    if session.user_id != id {
        session.authenticate(ActionType::ManageUsers)?;
    }

    if !store.delete_user(id).await? {
        return Err(ServiceError::NotFound("user".to_owned()));
    }
    log::info!("User {} deleted user {id}", session.user_id);

    Ok(())
}

/// Everyone the session's user follows, ordered by username, each with up to
/// `recipes_limit` of their newest recipes.
pub async fn list_subscriptions<S: Store>(
    session: &SessionData,
    recipes_limit: Option<usize>,
    store: &S,
) -> Result<Vec<SubscriptionView>, ServiceError> {
    session.authenticate(ActionType::ManageOwnSubscriptions)?;

    let limit = recipes_limit.unwrap_or(DEFAULT_RECIPES_LIMIT);
    let limit = i64::try_from(limit).unwrap_or(i64::MAX);

    let followees = store.list_followees(session.user_id).await?;
    let mut subscriptions = Vec::with_capacity(followees.len());

    for author in followees {
        let filter = RecipeFilter {
            author: Some(author.id),
            ..Default::default()
        };
        let recipes = store
            .list_recipes(&filter, None, limit)
            .await?
            .into_iter()
            .map(RecipeSummary::from)
            .collect();
        let recipes_count = store.count_recipes_by_author(author.id).await?;

        subscriptions.push(SubscriptionView {
            author: UserView::new(author, true),
            recipes,
            recipes_count,
        });
    }

    Ok(subscriptions)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        actions::relations::follow,
        memory::MemoryStore,
        schema::{ComponentDraft, NewProduct, RecipeDraft, UserRole},
    };
    use rstest::rstest;

    fn new_user(username: &str) -> NewUser {
        NewUser {
            username: username.to_owned(),
            email: format!("{username}@example.com"),
            first_name: "First".to_owned(),
            last_name: "Last".to_owned(),
            role: UserRole::User,
        }
    }

    #[rstest]
    #[case("me")]
    #[case("with space")]
    #[case("")]
    #[tokio::test]
    async fn bad_usernames_are_rejected(#[case] username: &str) {
        let store = MemoryStore::new();

        let mut user = new_user("valid");
        user.username = username.to_owned();

        let err = register_user(&user, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
    }

    #[rstest]
    #[case("anna smith@example.com")]
    #[case("a@.com")]
    #[case("@example.com")]
    #[case("no-at-sign.example.com")]
    #[tokio::test]
    async fn bad_emails_are_rejected(#[case] email: &str) {
        let store = MemoryStore::new();

        let mut user = new_user("anna");
        user.email = email.to_owned();

        let err = register_user(&user, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::Validation(_)));
        assert!(store.get_user(1).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn duplicate_email_is_already_exists() {
        let store = MemoryStore::new();
        register_user(&new_user("anna"), &store).await.unwrap();

        let mut twin = new_user("anna2");
        twin.email = "anna@example.com".to_owned();

        let err = register_user(&twin, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::AlreadyExists(ref what) if what == "email"));
    }

    #[tokio::test]
    async fn subscriptions_carry_limited_recipes_and_total_count() {
        let store = MemoryStore::new();
        let anna = register_user(&new_user("anna"), &store).await.unwrap();
        let bob = register_user(&new_user("bob"), &store).await.unwrap();
        let carl = register_user(&new_user("carl"), &store).await.unwrap();

        let tag = store.insert_tag("Dinner", "#101010", "dinner").await.unwrap();
        let product = store
            .insert_product(&NewProduct {
                name: "rice".to_owned(),
                measurement_unit: "g".to_owned(),
            })
            .await
            .unwrap();
        for n in 0..5 {
            let draft = RecipeDraft {
                title: format!("Rice bowl {n}"),
                text: "Cook the rice".to_owned(),
                picture: "rice.png".to_owned(),
                cooking_time: 20,
                tags: vec![tag.id],
                components: vec![ComponentDraft {
                    product_id: product.id,
                    amount: 150,
                }],
            };
            store.insert_recipe(carl.id, &draft).await.unwrap();
        }

        let session = SessionData::from(&anna);
        follow(&session, carl.id, &store).await.unwrap();
        follow(&session, bob.id, &store).await.unwrap();

        let subscriptions = list_subscriptions(&session, Some(2), &store)
            .await
            .unwrap();

        assert_eq!(subscriptions.len(), 2);
        assert_eq!(subscriptions[0].author.username, "bob");
        assert!(subscriptions[0].recipes.is_empty());
        assert_eq!(subscriptions[1].author.username, "carl");
        assert!(subscriptions[1].author.is_subscribed);
        assert_eq!(subscriptions[1].recipes.len(), 2);
        assert_eq!(subscriptions[1].recipes[0].name, "Rice bowl 4");
        assert_eq!(subscriptions[1].recipes_count, 5);

        let view = get_user_view(carl.id, &Viewer::Anonymous, &store)
            .await
            .unwrap();
        assert!(!view.is_subscribed);
    }

    #[tokio::test]
    async fn users_may_only_delete_themselves() {
        let store = MemoryStore::new();
        let anna = register_user(&new_user("anna"), &store).await.unwrap();
        let bob = register_user(&new_user("bob"), &store).await.unwrap();

        let err = delete_user(bob.id, &SessionData::from(&anna), &store)
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Forbidden));

        delete_user(anna.id, &SessionData::from(&anna), &store)
            .await
            .unwrap();
        let err = get_user(anna.id, &store).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
    }
}
