mod common;

use common::{attach_role, create_post, create_user, setup, Post, Profile, Role, User};
use serde_json::json;
use strata_orm::{CrudOperations, DatabaseValue, ModelError};

#[tokio::test]
async fn test_belongs_to_with_dangling_key_is_none() {
    let db = setup().await;
    let ann = create_user(&db, "Ann", 30).await;
    let post = create_post(&db, &ann, "hello", 0).await;

    let author = post.belongs_to::<User>(&db, None, None).await.unwrap().unwrap();
    assert_eq!(author.id(), ann.id());

    let mut orphan = Post::make(&db);
    orphan.fill([("title", DatabaseValue::from("orphan")), ("user_id", DatabaseValue::from(999))]);
    orphan.save(&db).await.unwrap();
    assert!(orphan.belongs_to::<User>(&db, None, None).await.unwrap().is_none());

    // no key, no query
    let mut unowned = Post::make(&db);
    unowned.fill([("title", "unowned")]);
    db.enable_query_log();
    assert!(unowned.belongs_to::<User>(&db, None, None).await.unwrap().is_none());
    assert!(db.query_log().is_empty());
}

#[tokio::test]
async fn test_has_many_and_has_one() {
    let db = setup().await;
    let ann = create_user(&db, "Ann", 30).await;
    let bob = create_user(&db, "Bob", 25).await;
    create_post(&db, &ann, "one", 3).await;
    create_post(&db, &ann, "two", 7).await;
    create_post(&db, &bob, "three", 1).await;
    Profile::create(&db, [("user_id", ann.id()), ("bio", DatabaseValue::from("hi"))])
        .await
        .unwrap();

    let posts = ann.has_many::<Post>(&db, None, None);
    assert_eq!(posts.count().await.unwrap(), 2);
    assert_eq!(posts.clone().where_gt("views", 5).count().await.unwrap(), 1);
    assert_eq!(
        posts.to_sql().unwrap(),
        "SELECT * FROM posts WHERE user_id = ?"
    );

    let profile = ann.has_one::<Profile>(&db, None, None).await.unwrap().unwrap();
    assert_eq!(profile.get("bio").unwrap(), DatabaseValue::from("hi"));
    assert!(bob.has_one::<Profile>(&db, None, None).await.unwrap().is_none());
}

#[tokio::test]
async fn test_belongs_to_many_through_pivot() {
    let db = setup().await;
    let ann = create_user(&db, "Ann", 30).await;
    let admin = Role::create(&db, [("name", "admin")]).await.unwrap();
    let editor = Role::create(&db, [("name", "editor")]).await.unwrap();
    Role::create(&db, [("name", "viewer")]).await.unwrap();
    attach_role(&db, &ann, &admin).await;
    attach_role(&db, &ann, &editor).await;

    let roles = ann.belongs_to_many::<Role>(&db, None, None, None);
    assert_eq!(
        roles.to_sql().unwrap(),
        "SELECT roles.* FROM roles INNER JOIN role_user ON roles.id = role_user.role_id \
         WHERE role_user.user_id = ?"
    );
    let names = roles.order_by("roles.name").pluck("name").await.unwrap();
    assert_eq!(
        names.into_vec(),
        [DatabaseValue::from("admin"), DatabaseValue::from("editor")]
    );

    let users = admin.belongs_to_many::<User>(&db, None, None, None).get().await.unwrap();
    assert_eq!(users.len(), 1);
}

#[tokio::test]
async fn test_eager_loading_issues_one_query_per_relation() {
    let db = setup().await;
    let mut users = Vec::new();
    for (index, name) in ["Ann", "Bob", "Cid", "Dee"].iter().enumerate() {
        let user = create_user(&db, name, 20 + index as i64).await;
        for n in 0..index {
            create_post(&db, &user, &format!("{} {}", name, n), 0).await;
        }
        users.push(user);
    }
    let admin = Role::create(&db, [("name", "admin")]).await.unwrap();
    attach_role(&db, &users[0], &admin).await;
    attach_role(&db, &users[2], &admin).await;

    db.enable_query_log();
    let loaded = User::with(&db, ["posts", "roles", "profile"])
        .order_by("id")
        .get()
        .await
        .unwrap();
    assert_eq!(db.query_log().len(), 4);

    let counts: Vec<usize> = loaded
        .iter()
        .map(|u| u.related_many::<Post>("posts").unwrap().len())
        .collect();
    assert_eq!(counts, [0, 1, 2, 3]);

    let role_counts: Vec<usize> = loaded
        .iter()
        .map(|u| u.related_many::<Role>("roles").unwrap().len())
        .collect();
    assert_eq!(role_counts, [1, 0, 1, 0]);

    let cid = loaded.nth(2).unwrap();
    let role = cid.related_many::<Role>("roles").unwrap()[0];
    assert!(role.raw("pivot_owner_key").is_none());
    assert_eq!(role.get("name").unwrap(), DatabaseValue::from("admin"));
    assert!(cid.related_one::<Profile>("profile").unwrap().is_none());

    // reading the cache issues no statements
    db.flush_query_log();
    let _ = loaded.to_array();
    assert!(db.query_log().is_empty());
}

#[tokio::test]
async fn test_eager_loading_belongs_to() {
    let db = setup().await;
    let ann = create_user(&db, "Ann", 30).await;
    let bob = create_user(&db, "Bob", 25).await;
    create_post(&db, &ann, "a", 0).await;
    create_post(&db, &bob, "b", 0).await;
    create_post(&db, &ann, "c", 0).await;

    db.enable_query_log();
    let posts = Post::with(&db, ["author"]).order_by("id").get().await.unwrap();
    let log = db.query_log();
    assert_eq!(log.len(), 2);
    assert_eq!(log[1].params.len(), 2);

    let authors: Vec<DatabaseValue> = posts
        .iter()
        .map(|p| p.related_one::<User>("author").unwrap().unwrap().get("name").unwrap())
        .collect();
    assert_eq!(
        authors,
        [DatabaseValue::from("Ann"), DatabaseValue::from("Bob"), DatabaseValue::from("Ann")]
    );

    let exported = posts.to_array();
    assert_eq!(exported[0]["author"]["name"], json!("Ann"));
    assert!(exported[0]["author"].get("password").is_none());
}

#[tokio::test]
async fn test_eager_loading_without_owners_issues_no_query() {
    let db = setup().await;
    db.enable_query_log();
    let users = User::with(&db, ["posts"]).get().await.unwrap();
    assert!(users.is_empty());
    assert_eq!(db.query_log().len(), 1);
}

#[tokio::test]
async fn test_unknown_relation_is_an_error() {
    let db = setup().await;
    create_user(&db, "Ann", 30).await;
    let err = User::with(&db, ["comments"]).get().await.unwrap_err();
    assert!(matches!(err, ModelError::Relationship(_)));
}

#[tokio::test]
async fn test_load_on_a_single_record() {
    let db = setup().await;
    let mut ann = create_user(&db, "Ann", 30).await;
    create_post(&db, &ann, "one", 0).await;

    assert!(!ann.relation_loaded("posts"));
    assert!(matches!(
        ann.related_many::<Post>("posts"),
        Err(ModelError::Relationship(_))
    ));

    ann.load(&db, ["posts"]).await.unwrap();
    assert!(ann.relation_loaded("posts"));
    assert_eq!(ann.related_many::<Post>("posts").unwrap().len(), 1);

    // wrong type and wrong arity are reported, not panics
    assert!(matches!(
        ann.related_many::<Role>("posts"),
        Err(ModelError::Relationship(_))
    ));
    assert!(matches!(
        ann.related_one::<Post>("posts"),
        Err(ModelError::Relationship(_))
    ));

    assert_eq!(ann.to_array()["posts"][0]["title"], json!("one"));
}

#[tokio::test]
async fn test_eager_loading_skips_trashed_related_rows() {
    let db = setup().await;
    let ann = create_user(&db, "Ann", 30).await;
    let mut bob = create_user(&db, "Bob", 25).await;
    create_post(&db, &ann, "a", 0).await;
    create_post(&db, &bob, "b", 0).await;
    bob.delete(&db).await.unwrap();

    let posts = Post::with(&db, ["author"]).order_by("id").get().await.unwrap();
    assert!(posts.nth(1).unwrap().related_one::<User>("author").unwrap().is_none());
}
