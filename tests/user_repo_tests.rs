mod store_common;

use feedstore::{ErrorKind, Login, User};
use serde_json::json;
use store_common::{services, store_user};

fn alice() -> User {
    let mut user = User::new("alice");
    user.first_name = "Alice".into();
    user.last_name = "Liddell".into();
    user.email = "alice@example.com".into();
    user.hash_type = "sha1".into();
    user.admin = true;
    user.salt = vec![1, 2, 3];
    user.hash = vec![4, 5, 6];
    user.md5_api = vec![0xde, 0xad, 0xbe, 0xef];
    user.profile_data
        .insert("theme".into(), json!({ "dark": true, "size": 12 }));
    user
}

#[test]
fn test_user_round_trip() {
    for service in services() {
        let user = alice();
        service.users().update(&user).expect("update");
        let stored = service.users().get(&Login::new("alice")).expect("get");
        assert_eq!(stored, user, "backend {}", service.backend_name());
    }
}

#[test]
fn test_user_update_replaces_fields() {
    for service in services() {
        let mut user = alice();
        service.users().update(&user).expect("create");
        user.admin = false;
        user.active = false;
        user.profile_data.clear();
        service.users().update(&user).expect("update");

        let stored = service.users().get(&user.login).expect("get");
        assert!(!stored.admin);
        assert!(!stored.active);
        assert!(stored.profile_data.is_empty());
        assert_eq!(service.users().all().expect("all").len(), 1);
    }
}

#[test]
fn test_missing_user_is_not_found() {
    for service in services() {
        let err = service.users().get(&Login::new("ghost")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound, "backend {}", service.backend_name());
    }
}

#[test]
fn test_invalid_user_is_rejected() {
    for service in services() {
        let mut user = User::new("carol");
        user.email = "not-an-email".into();
        let err = service.users().update(&user).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(service.users().all().expect("all").is_empty());
    }
}

#[test]
fn test_delete_absent_user_is_noop() {
    for service in services() {
        service
            .users()
            .delete(&User::new("nobody"))
            .expect("delete of an absent user");
        store_user(service.as_ref(), "bob");
        service.users().delete(&User::new("bob")).expect("delete");
        assert!(service.users().get(&Login::new("bob")).unwrap_err().is_not_found());
    }
}

#[test]
fn test_all_users_sorted_by_login() {
    for service in services() {
        for login in ["mallory", "bob", "eve"] {
            store_user(service.as_ref(), login);
        }
        let logins: Vec<String> = service
            .users()
            .all()
            .expect("all")
            .into_iter()
            .map(|user| user.login.to_string())
            .collect();
        assert_eq!(logins, vec!["bob", "eve", "mallory"]);
    }
}

#[test]
fn test_find_by_md5() {
    for service in services() {
        service.users().update(&alice()).expect("update");
        store_user(service.as_ref(), "bob");

        let found = service
            .users()
            .find_by_md5(&[0xde, 0xad, 0xbe, 0xef])
            .expect("find");
        assert_eq!(found.login, Login::new("alice"));

        let err = service.users().find_by_md5(&[0, 0, 0]).unwrap_err();
        assert!(err.is_not_found());
        let err = service.users().find_by_md5(&[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }
}
