use foodgram_sdk::{
    actions::{
        add_favorite, add_to_basket, create_product, create_recipe, create_tag,
        download_shopping_list, follow, is_favorited_by, list_recipes, register_user,
        shopping_list, update_recipe, RecipeQuery,
    },
    error::ServiceError,
    memory::MemoryStore,
    schema::{
        ComponentDraft, Id, NewProduct, NewTag, NewUser, Product, RecipeDraft, ShoppingListEntry,
        Tag, User, UserRole,
    },
    session::{SessionData, Viewer},
    store::Store,
    views::RecipeView,
};
use futures_util::TryStreamExt;
use rstest::{fixture, rstest};

async fn user(name: &str, store: &MemoryStore) -> User {
    register_user(
        &NewUser {
            username: name.to_owned(),
            email: format!("{name}@example.com"),
            first_name: name.to_owned(),
            last_name: "Cook".to_owned(),
            role: UserRole::User,
        },
        store,
    )
    .await
    .unwrap()
}

async fn product(name: &str, unit: &str, store: &MemoryStore) -> Product {
    create_product(
        &NewProduct {
            name: name.to_owned(),
            measurement_unit: unit.to_owned(),
        },
        store,
    )
    .await
    .unwrap()
}

async fn tag(name: &str, store: &MemoryStore) -> Tag {
    create_tag(
        &NewTag {
            name: name.to_owned(),
            color: "#aa3355".to_owned(),
            slug: None,
        },
        store,
    )
    .await
    .unwrap()
}

fn draft(title: &str, tags: &[Id], components: &[(Id, i32)]) -> RecipeDraft {
    RecipeDraft {
        title: title.to_owned(),
        text: format!("How to make {title}"),
        picture: format!("recipes/images/{title}.png"),
        cooking_time: 15,
        tags: tags.to_vec(),
        components: components
            .iter()
            .map(|(product_id, amount)| ComponentDraft {
                product_id: *product_id,
                amount: *amount,
            })
            .collect(),
    }
}

#[fixture]
fn store() -> MemoryStore {
    MemoryStore::new()
}

#[rstest]
#[tokio::test]
async fn basket_aggregates_to_sorted_shopping_list(store: MemoryStore) {
    let anna = user("anna", &store).await;
    let session = SessionData::from(&anna);
    let baking = tag("Baking", &store).await;
    let eggs = product("eggs", "pcs", &store).await;
    let flour = product("flour", "cup", &store).await;

    let a = create_recipe(
        &draft("pancakes", &[baking.id], &[(flour.id, 1), (eggs.id, 2)]),
        &session,
        &store,
    )
    .await
    .unwrap();
    let b = create_recipe(
        &draft("omelette", &[baking.id], &[(eggs.id, 3)]),
        &session,
        &store,
    )
    .await
    .unwrap();

    let err = shopping_list(anna.id, &store).await.unwrap_err();
    assert!(matches!(err, ServiceError::EmptyBasket));

    add_to_basket(&session, b.id, &store).await.unwrap();
    add_to_basket(&session, a.id, &store).await.unwrap();

    assert_eq!(
        shopping_list(anna.id, &store).await.unwrap(),
        vec![
            ShoppingListEntry {
                name: "eggs".to_owned(),
                amount: 5,
                measurement_unit: "pcs".to_owned(),
            },
            ShoppingListEntry {
                name: "flour".to_owned(),
                amount: 1,
                measurement_unit: "cup".to_owned(),
            },
        ]
    );

    let file = download_shopping_list(anna.id, &store).await.unwrap();
    assert_eq!(file.file_name, "shopping_list.txt");
    assert!(file.content.contains("* eggs - 5 pcs\r\n"));
    assert!(file.content.ends_with("* flour - 1 cup\r\n"));

    // Baskets are per user.
    let bob = user("bob", &store).await;
    let err = shopping_list(bob.id, &store).await.unwrap_err();
    assert!(matches!(err, ServiceError::EmptyBasket));
}

#[rstest]
#[tokio::test]
async fn update_replaces_tags_and_components(store: MemoryStore) {
    let anna = user("anna", &store).await;
    let session = SessionData::from(&anna);
    let t1 = tag("Lunch", &store).await;
    let t2 = tag("Dinner", &store).await;
    let p1 = product("rice", "g", &store).await;
    let p2 = product("salt", "pinch", &store).await;

    let recipe = create_recipe(
        &draft("pilaf", &[t1.id, t2.id], &[(p1.id, 3), (p2.id, 1)]),
        &session,
        &store,
    )
    .await
    .unwrap();
    assert_eq!(recipe.tags.len(), 2);
    assert_eq!(recipe.ingredients.len(), 2);

    update_recipe(
        recipe.id,
        &draft("pilaf", &[t2.id], &[(p1.id, 5)]),
        &session,
        &store,
    )
    .await
    .unwrap();

    assert_eq!(store.recipe_tags(recipe.id).await.unwrap(), vec![t2]);
    let components = store.recipe_components(recipe.id).await.unwrap();
    assert_eq!(components.len(), 1);
    assert_eq!(components[0].product_id, p1.id);
    assert_eq!(components[0].amount, 5);

    // A rejected update changes nothing.
    let err = update_recipe(
        recipe.id,
        &draft("pilaf", &[t1.id], &[(p2.id, 0)]),
        &session,
        &store,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ServiceError::Validation(_)));
    assert_eq!(store.recipe_components(recipe.id).await.unwrap(), components);
}

#[rstest]
#[tokio::test]
async fn listing_filters_by_any_tag_newest_first(store: MemoryStore) {
    let anna = user("anna", &store).await;
    let bob = user("bob", &store).await;
    let breakfast = tag("Breakfast", &store).await;
    let lunch = tag("Lunch", &store).await;
    let dinner = tag("Dinner", &store).await;
    let bread = product("bread", "slice", &store).await;

    let mut created = Vec::new();
    for (title, tag_id) in [
        ("toast", breakfast.id),
        ("sandwich", lunch.id),
        ("stew", dinner.id),
        ("bagel", breakfast.id),
    ] {
        let view = create_recipe(
            &draft(title, &[tag_id], &[(bread.id, 2)]),
            &SessionData::from(&anna),
            &store,
        )
        .await
        .unwrap();
        created.push(view.id);
    }

    let query = RecipeQuery {
        tags: vec!["breakfast".to_owned(), "lunch".to_owned()],
        ..Default::default()
    };
    let listed: Vec<RecipeView> = list_recipes(&query, &Viewer::Anonymous, &store)
        .try_collect()
        .await
        .unwrap();
    let names: Vec<&str> = listed.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names, vec!["bagel", "sandwich", "toast"]);

    let bob_session = SessionData::from(&bob);
    add_favorite(&bob_session, created[2], &store).await.unwrap();
    let bob_viewer = Viewer::from(bob_session);
    let favorites = RecipeQuery {
        is_favorited: true,
        ..Default::default()
    };

    let listed: Vec<RecipeView> = list_recipes(&favorites, &bob_viewer, &store)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "stew");
    assert!(listed[0].is_favorited);
    assert!(!listed[0].is_in_shopping_cart);

    // The favorited filter is ignored for anonymous viewers.
    let listed: Vec<RecipeView> = list_recipes(&favorites, &Viewer::Anonymous, &store)
        .try_collect()
        .await
        .unwrap();
    assert_eq!(listed.len(), 4);
    assert!(listed.iter().all(|r| !r.is_favorited));
}

#[rstest]
#[tokio::test]
async fn anonymous_viewer_never_sees_favorites(store: MemoryStore) {
    let anna = user("anna", &store).await;
    let soup = tag("Soup", &store).await;
    let water = product("water", "ml", &store).await;

    let recipe = create_recipe(
        &draft("broth", &[soup.id], &[(water.id, 500)]),
        &SessionData::from(&anna),
        &store,
    )
    .await
    .unwrap();
    let session = SessionData::from(&anna);
    add_favorite(&session, recipe.id, &store).await.unwrap();

    let anna_viewer = Viewer::from(session);
    assert!(is_favorited_by(recipe.id, &anna_viewer, &store).await.unwrap());
    assert!(!is_favorited_by(recipe.id, &Viewer::Anonymous, &store)
        .await
        .unwrap());
    assert!(!is_favorited_by(9999, &Viewer::Anonymous, &store)
        .await
        .unwrap());
}

#[rstest]
#[tokio::test]
async fn follow_rules(store: MemoryStore) {
    let anna = user("anna", &store).await;
    let bob = user("bob", &store).await;
    let session = SessionData::from(&anna);

    assert!(matches!(
        follow(&session, anna.id, &store).await,
        Err(ServiceError::SelfReference)
    ));

    follow(&session, bob.id, &store).await.unwrap();
    assert!(matches!(
        follow(&session, bob.id, &store).await,
        Err(ServiceError::AlreadyExists(_))
    ));

    // The storage layer rejects the duplicate even without the pre-check.
    let err = store
        .insert_relation(foodgram_sdk::store::RelationKind::Follow, anna.id, bob.id)
        .await
        .unwrap_err();
    assert!(matches!(
        ServiceError::from(err),
        ServiceError::AlreadyExists(ref what) if what == "subscription"
    ));
}
