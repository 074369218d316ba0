//! Component fixtures shared by tests, fuzzing and the demo shell.

use canopy_app::{App, RouteTable};
use canopy_core::{
    ComponentDefinition, Environment, Runtime, RuntimeConfig, RuntimeError, State, Store, Surface,
    state::{from_value, merge},
};
use canopy_proto::Descriptor;
use serde_json::{Value, json};

/// Click counter: `<div class="counter"><span>N</span><button>+</button></div>`.
///
/// `increment` adds its integer payload, or one when the payload is null.
pub fn counter() -> ComponentDefinition {
    ComponentDefinition::new("Counter", from_value(json!({ "count": 0 })), |state, _| {
        Descriptor::element("div")
            .prop("class", "counter")
            .child(Descriptor::element("span").child(int(state, "count")))
            .child(Descriptor::element("button").on("onClick", "increment").child("+"))
    })
    .handler("increment", |ctx, payload| {
        let step = match payload {
            Value::Null => 1,
            other => other.as_i64().ok_or_else(|| RuntimeError::Handler {
                component: "Counter".into(),
                reason: format!("increment step must be an integer, got {other}"),
            })?,
        };
        let count = int(&ctx.state(), "count");
        ctx.set_state(from_value(json!({ "count": count + step })))
    })
}

/// Keyed list of string items.
pub fn todo_list() -> ComponentDefinition {
    let initial = from_value(json!({ "items": ["a", "b", "c"] }));
    ComponentDefinition::new("TodoList", initial, |state, _| {
        Descriptor::element("ul").children(
            items(state)
                .into_iter()
                .map(|item| Descriptor::element("li").key(item.as_str()).child(item)),
        )
    })
}

/// Paragraph showing the store theme. Clicking it toggles the theme.
pub fn theme_label() -> ComponentDefinition {
    ComponentDefinition::new("ThemeLabel", State::new(), |_, store| {
        let theme = store.map_or_else(|| "light".to_string(), theme_of);
        Descriptor::element("p").prop("class", theme.as_str()).on("onClick", "toggle").child(theme)
    })
    .handler("toggle", |ctx, _| ctx.dispatch("toggle", None))
}

/// Store holding `theme`, with `toggle` and `set` actions.
pub fn theme_store() -> Store {
    Store::new(from_value(json!({ "theme": "light" })))
        .action("toggle", |state, _| {
            let next = if theme_of(state) == "dark" { "light" } else { "dark" };
            merge(state, &from_value(json!({ "theme": next })))
        })
        .action("set", |state, payload| match payload.and_then(Value::as_str) {
            Some(next) => merge(state, &from_value(json!({ "theme": next }))),
            None => state.clone(),
        })
}

/// Count badge, rendered from props forwarded by [`panel`].
pub fn badge() -> ComponentDefinition {
    ComponentDefinition::new("Badge", from_value(json!({ "count": 0 })), |state, _| {
        Descriptor::element("em").child(int(state, "count"))
    })
}

/// Titled section embedding a [`badge`].
pub fn panel() -> ComponentDefinition {
    let initial = from_value(json!({ "title": "Inbox", "count": 3 }));
    ComponentDefinition::new("Panel", initial, |state, _| {
        let title = state.get("title").and_then(Value::as_str).unwrap_or_default().to_string();
        Descriptor::element("section")
            .child(Descriptor::element("h2").on("onClick", "bump").child(title))
            .child(Descriptor::component("Badge").prop("count", int(state, "count")))
    })
    .handler("bump", |ctx, _| {
        let count = int(&ctx.state(), "count");
        ctx.set_state(from_value(json!({ "count": count + 1 })))
    })
}

/// Routed page rendering a heading.
pub fn page(name: &str, heading: &str) -> ComponentDefinition {
    let heading = heading.to_string();
    ComponentDefinition::new(name, State::new(), move |_, _| {
        Descriptor::element("main").child(Descriptor::element("h1").child(heading.as_str()))
    })
}

/// Routes of the demo application.
pub fn routes() -> RouteTable {
    RouteTable::new().route("/", "Home").route("/about", "About")
}

/// Application with every fixture registered, the theme store and the demo
/// routes.
pub fn demo_app(
    surface: impl Surface + 'static,
    config: RuntimeConfig,
    env: impl Environment + 'static,
) -> Result<App, RuntimeError> {
    let runtime = Runtime::with_config(surface, config, env).with_store(theme_store());
    let mut app = App::new(runtime).with_router(routes());
    for definition in [
        counter(),
        todo_list(),
        theme_label(),
        badge(),
        panel(),
        page("Home", "Home"),
        page("About", "About"),
    ] {
        app.register(definition)?;
    }
    Ok(app)
}

fn int(state: &State, field: &str) -> i64 {
    state.get(field).and_then(Value::as_i64).unwrap_or(0)
}

fn items(state: &State) -> Vec<String> {
    state
        .get("items")
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_str).map(str::to_string).collect())
        .unwrap_or_default()
}

fn theme_of(state: &State) -> String {
    state.get("theme").and_then(Value::as_str).unwrap_or("light").to_string()
}
