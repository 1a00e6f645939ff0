mod common;

use common::{router, router_with, user_schema};
use resource_engine::router::{EngineEvent, RecordingListener};
use resource_engine::{EngineError, Method, RequestContext};
use serde_json::json;
use std::sync::Arc;

fn request(method: Method, path: &str, props: &[&str]) -> RequestContext {
    let mut ctx = RequestContext::new(method, path);
    ctx.set_props(props.iter().map(|p| p.to_string()).collect());
    ctx
}

#[tokio::test]
async fn requested_props_narrow_the_result() {
    let res = router().handle(request(Method::Get, "/users/42", &["name"])).await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body, json!({ "name": "Ann" }));

    let full = router().handle(request(Method::Get, "/users/42", &[])).await.unwrap();
    assert_eq!(full.body, json!({ "id": 42, "name": "Ann", "age": 30 }));
}

#[tokio::test]
async fn partial_handlers_merge_in_registration_order() {
    let all = router().handle(request(Method::Get, "/pair", &[])).await.unwrap();
    assert_eq!(all.body, json!({ "a": 1, "b": 2 }));

    let only_b = router().handle(request(Method::Get, "/pair", &["b"])).await.unwrap();
    assert_eq!(only_b.body, json!({ "b": 2 }));
}

#[tokio::test]
async fn dispatch_invokes_each_selected_handler_once() {
    let recorder = Arc::new(RecordingListener::new());
    let router = router_with(Some(recorder.clone()));

    router.handle(request(Method::Get, "/pair", &[])).await.unwrap();
    let events = recorder.events();
    let invoked = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::HandlerInvoked { .. }))
        .count();
    let finished: Vec<&EngineEvent> = events
        .iter()
        .filter(|e| matches!(e, EngineEvent::Success { .. } | EngineEvent::Error { .. }))
        .collect();
    assert_eq!(invoked, 2);
    assert_eq!(finished.len(), 1);
    assert!(matches!(finished[0], EngineEvent::Success { schema, .. } if schema["properties"]["a"]["type"] == "integer"));

    recorder.clear();
    router.handle(request(Method::Get, "/pair", &["a"])).await.unwrap();
    let invoked = recorder
        .events()
        .iter()
        .filter(|e| matches!(e, EngineEvent::HandlerInvoked { .. }))
        .count();
    assert_eq!(invoked, 1);
}

#[tokio::test]
async fn unsatisfiable_props_fail_naming_them() {
    let err = router().handle(request(Method::Get, "/pair", &["c"])).await.unwrap_err();
    match err {
        EngineError::UnresolvedProperties(props) => assert_eq!(props, vec!["c".to_string()]),
        other => panic!("unexpected {other:?}"),
    }

    let err = router()
        .handle(request(Method::Get, "/users/42", &["name", "nickname"]))
        .await
        .unwrap_err();
    assert_eq!(err.status().as_u16(), 400);
}

#[tokio::test]
async fn missing_props_are_reflected_from_params() {
    let res = router()
        .handle(request(Method::Get, "/pair", &["a", "id"]))
        .await;
    // `/pair` has no `id` parameter to reflect.
    assert!(matches!(res, Err(EngineError::UnresolvedProperties(_))));

    let mut ctx = request(Method::Get, "/pair", &["a", "debug"]);
    ctx.set_query([("debug".to_string(), "1".to_string())].into_iter().collect());
    let res = router().handle(ctx).await.unwrap();
    assert_eq!(res.body, json!({ "a": 1, "debug": "1" }));
}

#[tokio::test]
async fn options_documents_routes_without_dispatching() {
    let recorder = Arc::new(RecordingListener::new());
    let router = router_with(Some(recorder.clone()));

    let table = router.handle(request(Method::Options, "/", &[])).await.unwrap();
    let paths: Vec<&str> = table.body.as_array().unwrap().iter().filter_map(|r| r["path"].as_str()).collect();
    assert!(paths.contains(&"/users/:id"));
    assert!(paths.contains(&"/pair"));

    let one = router.handle(request(Method::Options, "/users/42", &[])).await.unwrap();
    assert_eq!(one.body["methods"], json!(["GET", "OPTIONS"]));
    assert_eq!(one.body["schema"], user_schema());
    assert!(recorder
        .events()
        .iter()
        .all(|e| !matches!(e, EngineEvent::HandlerInvoked { .. })));
}

#[tokio::test]
async fn routing_failures() {
    let err = router().handle(request(Method::Get, "/nowhere", &[])).await.unwrap_err();
    assert!(matches!(err, EngineError::NotFound(_)));
    let err = router().handle(request(Method::Delete, "/users/1", &[])).await.unwrap_err();
    assert!(matches!(err, EngineError::NoHandler { method: Method::Delete, .. }));
    assert_eq!(err.status().as_u16(), 404);
    assert_eq!(err.to_body().message, "not found");
}

#[tokio::test]
async fn custom_status_is_honored() {
    let mut ctx = request(Method::Post, "/members", &[]);
    ctx.set_body(Some(json!({ "id": "5", "name": "Bo" })));
    let res = router().handle(ctx).await.unwrap();
    assert_eq!(res.status, 201);
    // The body was cast before the handler saw it.
    assert_eq!(res.body, json!({ "created": { "id": 5, "name": "Bo" } }));
}

#[tokio::test]
async fn invalid_bodies_never_reach_handlers() {
    let recorder = Arc::new(RecordingListener::new());
    let router = router_with(Some(recorder.clone()));
    let mut ctx = request(Method::Post, "/members", &[]);
    ctx.set_body(Some(json!({ "name": "Bo", "extra": true })));
    let err = router.handle(ctx).await.unwrap_err();
    let EngineError::Validation(failure) = &err else {
        panic!("unexpected {err:?}");
    };
    let paths = failure.paths();
    assert!(paths.contains(&"extra"));
    assert!(paths.contains(&"id"));
    assert!(recorder
        .events()
        .iter()
        .all(|e| !matches!(e, EngineEvent::HandlerInvoked { .. })));
    assert!(matches!(recorder.events().last(), Some(EngineEvent::Error { schema: Some(_), .. })));
}

#[tokio::test]
async fn handlers_can_raise_custom_property_errors() {
    let mut ctx = request(Method::Post, "/members", &[]);
    ctx.set_body(Some(json!({ "id": 1, "name": "Bo", "email": "taken@example.com" })));
    let err = router().handle(ctx).await.unwrap_err();
    let EngineError::Validation(failure) = err else {
        panic!("expected a validation failure");
    };
    assert_eq!(failure.properties.len(), 1);
    assert_eq!(failure.properties[0].code, 1001);
    assert_eq!(failure.properties[0].name, "EMAIL_TAKEN");
    assert_eq!(failure.properties[0].message, "email already registered");
}

#[tokio::test]
async fn results_are_checked_against_the_route_schema() {
    let err = router().handle(request(Method::Get, "/broken", &[])).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidResult(_)));
    assert_eq!(err.status().as_u16(), 500);
    assert_eq!(err.to_body().message, "internal server error");
}

#[tokio::test]
async fn empty_reads_still_answer_for_requested_props() {
    let err = router().handle(request(Method::Get, "/empty/7", &["name"])).await.unwrap_err();
    match err {
        EngineError::UnresolvedProperties(props) => assert_eq!(props, vec!["name".to_string()]),
        other => panic!("unexpected {other:?}"),
    }

    let res = router().handle(request(Method::Get, "/empty/7", &["id"])).await.unwrap();
    assert_eq!(res.body, json!({ "id": 7 }));

    // Without props the null document is checked against the schema like any read.
    let err = router().handle(request(Method::Get, "/empty/7", &[])).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidResult(_)));

    let res = router().handle(request(Method::Delete, "/empty/7", &[])).await.unwrap();
    assert_eq!(res.status, 200);
    assert_eq!(res.body, serde_json::Value::Null);
}

#[tokio::test]
async fn later_handler_wins_scalar_conflicts() {
    let all = router().handle(request(Method::Get, "/clash", &[])).await.unwrap();
    assert_eq!(all.body, json!({ "a": 10, "b": 2 }));

    let both = router().handle(request(Method::Get, "/clash", &["a", "b"])).await.unwrap();
    assert_eq!(both.body, json!({ "a": 10, "b": 2 }));

    // Both handlers declare `a`, so both run and registration order still decides.
    let only_a = router().handle(request(Method::Get, "/clash", &["a"])).await.unwrap();
    assert_eq!(only_a.body, json!({ "a": 10 }));
}

#[tokio::test]
async fn collections_pluck_items_and_carry_a_fingerprint() {
    let res = router().handle(request(Method::Get, "/users", &["items@name"])).await.unwrap();
    assert_eq!(
        res.body,
        json!({
            "$id": "users",
            "$expires": 60,
            "$total": 2,
            "$offset": 0,
            "$limit": 10,
            "items": [{ "$id": "u1", "name": "Ann" }, { "$id": "u2", "name": "Bo" }]
        })
    );
    assert!(res.etag.as_deref().is_some_and(|t| t.starts_with("W/\"")));
    assert_eq!(res.max_age, Some(60));

    let other = router().handle(request(Method::Get, "/users", &["items@age"])).await.unwrap();
    assert_ne!(other.etag, res.etag);
}

#[tokio::test]
async fn handlers_reissue_requests_through_the_connection() {
    let res = router().handle(request(Method::Get, "/friends/1", &["friend.name"])).await.unwrap();
    assert_eq!(res.body, json!({ "friend": { "name": "Ann" } }));
}
