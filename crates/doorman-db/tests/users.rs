//! Repository tests against an in-memory store

use chrono::{Duration, Utc};
use doorman_db::{Database, NewUser, SsoMerge, UserQuery, UserRole};

async fn db() -> Database {
    Database::in_memory().await.unwrap()
}

fn new_user(email: &str, username: &str) -> NewUser {
    NewUser {
        email: email.to_string(),
        username: username.to_string(),
        password_hash: Some("hash".to_string()),
        ..Default::default()
    }
}

#[tokio::test]
async fn insert_rejects_duplicates() {
    let db = db().await;
    db.insert_user(new_user("a@example.com", "a")).await.unwrap();

    let err = db
        .insert_user(new_user("a@example.com", "b"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("a@example.com"));

    let err = db
        .insert_user(new_user("b@example.com", "a"))
        .await
        .unwrap_err();
    assert!(err.to_string().contains("'a'"));
}

#[tokio::test]
async fn lookup_by_email_or_username_hits_both() {
    let db = db().await;
    let user = db.insert_user(new_user("a@example.com", "a")).await.unwrap();

    for identifier in ["a@example.com", "a"] {
        let found = db
            .get_user_by_email_or_username(identifier)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, user.id);
    }
    assert!(db
        .get_user_by_email_or_username("missing")
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn consume_reset_token_is_conditional() {
    let db = db().await;
    let user = db.insert_user(new_user("a@example.com", "a")).await.unwrap();

    let expires = Utc::now() + Duration::hours(1);
    db.set_reset_token(user.id, "token-1", expires).await.unwrap();

    // Wrong token value leaves the row untouched
    assert!(!db
        .consume_reset_token(user.id, "token-2", "new-hash")
        .await
        .unwrap());
    let row = db.get_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(row.pwd_reset_token.as_deref(), Some("token-1"));
    assert_eq!(row.password_hash.as_deref(), Some("hash"));

    // Matching token consumes and clears
    assert!(db
        .consume_reset_token(user.id, "token-1", "new-hash")
        .await
        .unwrap());
    let row = db.get_user_by_id(user.id).await.unwrap().unwrap();
    assert!(row.pwd_reset_token.is_none());
    assert!(row.pwd_reset_expires.is_none());
    assert_eq!(row.password_hash.as_deref(), Some("new-hash"));

    // Second consume of the same token fails
    assert!(!db
        .consume_reset_token(user.id, "token-1", "other-hash")
        .await
        .unwrap());
}

#[tokio::test]
async fn issuing_a_new_token_overwrites_the_old() {
    let db = db().await;
    let user = db.insert_user(new_user("a@example.com", "a")).await.unwrap();
    let expires = Utc::now() + Duration::hours(1);

    db.set_reset_token(user.id, "token-1", expires).await.unwrap();
    db.set_reset_token(user.id, "token-2", expires).await.unwrap();

    assert!(!db
        .consume_reset_token(user.id, "token-1", "h")
        .await
        .unwrap());
    assert!(db
        .consume_reset_token(user.id, "token-2", "h")
        .await
        .unwrap());
}

#[tokio::test]
async fn sso_merge_preserves_username_and_accumulates_mask() {
    let db = db().await;
    let user = db
        .insert_user(NewUser {
            departments: Some("local-dept".to_string()),
            sso_mask: 4,
            ..new_user("a@example.com", "a")
        })
        .await
        .unwrap();

    db.apply_sso_merge(
        user.id,
        &SsoMerge {
            email: "a@example.com".to_string(),
            full_name: Some("From Directory".to_string()),
            avatar: None,
            departments: Some("local-dept".to_string()),
            sso_mask: 4 | 2,
            password_hash: "fresh-hash".to_string(),
        },
    )
    .await
    .unwrap();

    let row = db.get_user_by_id(user.id).await.unwrap().unwrap();
    assert_eq!(row.username, "a");
    assert_eq!(row.sso_mask, 6);
    assert_eq!(row.full_name.as_deref(), Some("From Directory"));
    assert_eq!(row.password_hash.as_deref(), Some("fresh-hash"));
    assert!(row.is_verified);
}

#[tokio::test]
async fn count_super_users_active_only() {
    let db = db().await;
    let su1 = db
        .insert_user(NewUser {
            role: Some(UserRole::SuperUser),
            ..new_user("s1@example.com", "s1")
        })
        .await
        .unwrap();
    db.insert_user(NewUser {
        role: Some(UserRole::SuperUser),
        ..new_user("s2@example.com", "s2")
    })
    .await
    .unwrap();
    db.insert_user(NewUser {
        role: Some(UserRole::Admin),
        ..new_user("a@example.com", "a")
    })
    .await
    .unwrap();

    assert_eq!(db.count_super_users(false).await.unwrap(), 2);
    assert_eq!(db.count_super_users(true).await.unwrap(), 2);

    db.update_user_status(su1.id, true).await.unwrap();
    assert_eq!(db.count_super_users(false).await.unwrap(), 2);
    assert_eq!(db.count_super_users(true).await.unwrap(), 1);
}

#[tokio::test]
async fn list_users_filters() {
    let db = db().await;
    db.insert_user(NewUser {
        role: Some(UserRole::Admin),
        full_name: Some("Ada Lovelace".to_string()),
        ..new_user("ada@example.com", "ada")
    })
    .await
    .unwrap();
    let bob = db.insert_user(new_user("bob@example.com", "bob")).await.unwrap();
    db.update_user_status(bob.id, true).await.unwrap();
    db.insert_user(new_user("carol@example.com", "carol"))
        .await
        .unwrap();

    // Role filter
    let (users, total) = db
        .list_users(UserQuery {
            role: Some("admin".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(users[0].username, "ada");

    // "regular" matches accounts without a role
    let (users, total) = db
        .list_users(UserQuery {
            role: Some("regular".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 2);
    assert!(users.iter().all(|u| u.role.is_none()));

    // Status filter
    let (users, total) = db
        .list_users(UserQuery {
            status: Some("disabled".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);
    assert_eq!(users[0].username, "bob");

    // Search over email and full name
    let (_, total) = db
        .list_users(UserQuery {
            search: Some("lovelace".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 1);

    // Unknown role value is dropped by validation, not an error
    let (_, total) = db
        .list_users(UserQuery {
            role: Some("emperor".to_string()),
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 3);
}

#[tokio::test]
async fn list_users_pagination() {
    let db = db().await;
    for i in 0..5 {
        db.insert_user(new_user(
            &format!("u{}@example.com", i),
            &format!("u{}", i),
        ))
        .await
        .unwrap();
    }

    let (page, total) = db
        .list_users(UserQuery {
            offset: 0,
            limit: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(total, 5);
    assert_eq!(page.len(), 2);

    let (rest, _) = db
        .list_users(UserQuery {
            offset: 4,
            limit: 2,
            ..Default::default()
        })
        .await
        .unwrap();
    assert_eq!(rest.len(), 1);
}
