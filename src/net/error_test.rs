use super::*;

#[test]
fn from_status_prefers_message_field() {
    let err = ApiError::from_status(400, r#"{"message":"Trial name is required","detail":"ignored"}"#);
    assert_eq!(err, ApiError::Api { status: 400, message: "Trial name is required".to_owned() });
}

#[test]
fn from_status_falls_back_to_detail_string() {
    let err = ApiError::from_status(401, r#"{"detail":"Could not validate credentials"}"#);
    assert_eq!(err.user_message(), "Could not validate credentials");
}

#[test]
fn from_status_joins_validation_detail_list() {
    let body = r#"{"detail":[{"loc":["body","username"],"msg":"field required"},{"msg":"too short"}]}"#;
    let err = ApiError::from_status(422, body);
    assert_eq!(err.user_message(), "field required; too short");
}

#[test]
fn from_status_uses_plain_text_body() {
    let err = ApiError::from_status(502, "upstream unavailable\n");
    assert_eq!(err.user_message(), "upstream unavailable");
}

#[test]
fn from_status_uses_reason_phrase_for_empty_body() {
    assert_eq!(ApiError::from_status(404, "").user_message(), "Not Found");
    assert_eq!(ApiError::from_status(500, "{}").user_message(), "Internal Server Error");
}

#[test]
fn unauthorized_covers_401_and_403_only() {
    assert!(ApiError::from_status(401, "").is_unauthorized());
    assert!(ApiError::from_status(403, "").is_unauthorized());
    assert!(!ApiError::from_status(404, "").is_unauthorized());
    assert!(!ApiError::Network("timeout".into()).is_unauthorized());
}

#[test]
fn network_user_message_is_generic() {
    let err = ApiError::Network("connection refused".into());
    assert!(err.is_network());
    assert!(err.user_message().contains("Unable to reach the server"));
}
