use super::*;
use std::collections::BTreeSet;

fn alice() -> UserProfile {
    UserProfile {
        id: "u1".to_owned(),
        username: "alice".to_owned(),
        email: "alice@example.com".to_owned(),
        full_name: None,
        roles: BTreeSet::from(["Administrator".to_owned()]),
    }
}

#[test]
fn default_session_is_loading_and_anonymous() {
    let session = Session::default();
    assert!(session.is_loading());
    assert!(!session.is_authenticated());
    assert_eq!(session.phase(), SessionPhase::Loading);
    assert_eq!(session.last_error(), None);
}

#[test]
fn authenticate_settles_and_clears_error() {
    let mut session = Session::default();
    session.set_error(Some("bad password".to_owned()));
    session.authenticate(alice());
    assert_eq!(session.phase(), SessionPhase::Authenticated);
    assert_eq!(session.user().map(|u| u.username.as_str()), Some("alice"));
    assert_eq!(session.last_error(), None);
}

#[test]
fn reset_keeps_error_and_drops_user() {
    let mut session = Session::default();
    session.authenticate(alice());
    session.set_error(Some("expired".to_owned()));
    session.reset();
    assert_eq!(session.phase(), SessionPhase::Unauthenticated);
    assert!(session.user().is_none());
    assert_eq!(session.last_error(), Some("expired"));
}

#[test]
fn loading_wins_over_authenticated() {
    let mut session = Session::default();
    session.authenticate(alice());
    session.begin_loading();
    assert_eq!(session.phase(), SessionPhase::Loading);
    assert!(session.is_authenticated());
}
