//! Bridge tests
//!
//! Drive an application purely through JSON requests, the way a remote
//! inspector does.

use canopy_app::{App, Bridge, Request, Response};
use canopy_core::RuntimeConfig;
use canopy_harness::{MemorySurface, SimEnv, fixtures};
use serde_json::{Value, json};

fn demo() -> (App, MemorySurface) {
    let surface = MemorySurface::new();
    let app = fixtures::demo_app(surface.clone(), RuntimeConfig::default(), SimEnv::new()).unwrap();
    (app, surface)
}

fn call(app: &mut App, request: Value) -> Value {
    serde_json::from_str(&Bridge::handle_json(app, &request.to_string())).unwrap()
}

#[test]
fn json_session() {
    let (mut app, surface) = demo();

    assert_eq!(
        call(&mut app, json!({ "op": "mount", "component": "Counter" })),
        json!({ "status": "ok", "result": "Counter-1" })
    );
    assert_eq!(
        call(&mut app, json!({ "op": "set-state", "id": "Counter-1", "state": { "count": 7 } })),
        json!({ "status": "ok" })
    );
    assert_eq!(
        call(&mut app, json!({ "op": "get-state", "id": "Counter-1" })),
        json!({ "status": "ok", "result": { "count": 7 } })
    );
    assert_eq!(
        call(&mut app, json!({ "op": "dispatch", "action": "set", "payload": "dark" })),
        json!({ "status": "ok" })
    );
    assert_eq!(
        call(&mut app, json!({ "op": "store-state" })),
        json!({ "status": "ok", "result": { "theme": "dark" } })
    );
    assert_eq!(
        call(&mut app, json!({ "op": "instance-tree" })),
        json!({
            "status": "ok",
            "result": [{
                "id": "Counter-1",
                "name": "Counter",
                "state": { "count": 7 },
                "children": []
            }]
        })
    );
    assert!(surface.render().contains("<span>7</span>"));
}

#[test]
fn surface_events_route_to_handlers() {
    let (mut app, surface) = demo();
    call(&mut app, json!({ "op": "mount", "component": "Counter" }));
    let button = surface.find_by_tag("button")[0];

    let reply =
        call(&mut app, json!({ "op": "dispatch-event", "node": button, "event": "onClick" }));
    assert_eq!(reply, json!({ "status": "ok", "result": true }));

    let reply =
        call(&mut app, json!({ "op": "dispatch-event", "node": button, "event": "onHover" }));
    assert_eq!(reply, json!({ "status": "ok", "result": false }));
    assert_eq!(app.get_state(&"Counter-1".into()).get("count"), Some(&json!(1)));
}

#[test]
fn handler_failures_report_their_component() {
    let (mut app, surface) = demo();
    call(&mut app, json!({ "op": "mount", "component": "Counter" }));
    let button = surface.find_by_tag("button")[0];

    let reply = call(
        &mut app,
        json!({ "op": "dispatch-event", "node": button, "event": "onClick", "payload": [1] }),
    );

    assert_eq!(reply["status"], "error");
    assert_eq!(reply["kind"], "HandlerError");
    assert!(reply["message"].as_str().unwrap().starts_with("Counter: "));
    assert!(surface.render().contains("<span>0</span>"));
}

#[test]
fn errors_carry_kinds() {
    let (mut app, _) = demo();

    let reply = call(&mut app, json!({ "op": "unmount", "id": "Ghost-4" }));
    assert_eq!(reply["status"], "error");
    assert_eq!(reply["kind"], "NotFoundError");

    let reply = call(&mut app, json!({ "op": "mount", "component": "Ghost" }));
    assert_eq!(reply["kind"], "UnknownComponentError");

    let reply = call(&mut app, json!({ "op": "teleport" }));
    assert_eq!(reply["kind"], "ProtocolError");

    let reply = Bridge::handle_json(&mut app, "{not json");
    assert!(reply.contains(r#""kind":"ProtocolError""#));
}

#[test]
fn batch_and_navigation_requests() {
    let (mut app, surface) = demo();

    let reply = Bridge::handle(&mut app, Request::Batch {
        ops: serde_json::from_value(json!([
            { "type": "navigate", "path": "/about" },
            { "type": "dispatch", "action": "toggle" },
        ]))
        .unwrap(),
    });
    assert!(reply.is_ok());
    assert_eq!(surface.render(), "<main><h1>About</h1></main>");

    let reply = Bridge::handle(&mut app, Request::Navigate { path: "/".into() });
    assert_eq!(reply, Response::Ok { result: Value::Null });
    assert_eq!(app.current_path(), Some("/"));

    let emitted =
        call(&mut app, json!({ "op": "emit", "type": "custom:ping", "payload": { "n": 1 } }));
    assert_eq!(emitted["result"]["type"], "custom:ping");
    let history = call(&mut app, json!({ "op": "event-history" }));
    let kinds: Vec<&str> =
        history["result"]
            .as_array()
            .unwrap()
            .iter()
            .filter_map(|record| record["type"].as_str())
            .collect();
    assert_eq!(kinds.first(), Some(&"batch:start"));
    assert_eq!(kinds.last(), Some(&"custom:ping"));
    assert!(kinds.contains(&"batch:end"));
}
