//! Reference model of an application built from the fixtures.
//!
//! `ModelWorld` predicts what the runtime should render and record for a
//! sequence of [`Operation`]s without diffing anything: it keeps typed state
//! per instance and renders markup directly. Property tests drive the model
//! and a real [`App`](canopy_app::App) side by side and compare their
//! [`ObservableState`].

use std::collections::{BTreeMap, VecDeque};

use canopy_core::RuntimeError;
use canopy_proto::event::{
    COMPONENT_MOUNT, COMPONENT_UNMOUNT, COMPONENT_UPDATE, STATE_CHANGE, STORE_CHANGE,
};
use serde_json::{Value, json};

/// Selector into a list of candidate instances, taken modulo its length.
pub type Slot = u8;

/// Fixture a [`Operation::Mount`] instantiates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Widget {
    /// [`crate::fixtures::counter`]
    Counter,
    /// [`crate::fixtures::todo_list`]
    TodoList,
    /// [`crate::fixtures::theme_label`]
    ThemeLabel,
}

impl Widget {
    /// Registered component name.
    pub fn component(self) -> &'static str {
        match self {
            Self::Counter => "Counter",
            Self::TodoList => "TodoList",
            Self::ThemeLabel => "ThemeLabel",
        }
    }
}

/// Store action issued by [`Operation::Dispatch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThemeAction {
    /// `toggle`
    Toggle,
    /// `set` with `"dark"` or `"light"`
    Set {
        /// Target theme is dark
        dark: bool,
    },
    /// An action the store does not declare
    Unknown,
}

/// Operations on the application.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Mount a fixture as a new root
    Mount {
        /// Fixture to mount
        widget: Widget,
    },
    /// Click a counter's button
    Click {
        /// Counter, among every counter ever mounted
        target: Slot,
    },
    /// Overwrite a counter's count
    SetCount {
        /// Counter, among every counter ever mounted
        target: Slot,
        /// New count
        count: i16,
    },
    /// Replace a list's items
    SetItems {
        /// List, among every list ever mounted
        target: Slot,
        /// Item ids, rendered as `i<N>`
        items: Vec<u8>,
    },
    /// Click a theme label, which toggles the store theme
    ClickLabel {
        /// Label, among every label ever mounted
        target: Slot,
    },
    /// Dispatch a store action directly
    Dispatch {
        /// Action to dispatch
        action: ThemeAction,
    },
    /// Unmount an instance
    Unmount {
        /// Instance, among every instance ever mounted
        target: Slot,
    },
    /// Move the virtual clock forward
    AdvanceTime {
        /// Microseconds to advance
        micros: u32,
    },
}

/// Outcome of one operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationResult {
    /// Operation succeeded
    Ok,
    /// Mount succeeded with this instance id
    Mounted(String),
    /// Operation failed
    Error(OperationError),
}

impl OperationResult {
    /// True unless the operation failed.
    pub fn is_ok(&self) -> bool {
        !self.is_err()
    }

    /// True if the operation failed.
    pub fn is_err(&self) -> bool {
        matches!(self, Self::Error(_))
    }
}

/// Failures the model can predict.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationError {
    /// No instance of the requested kind was ever mounted
    NoTarget,
    /// Target instance is no longer mounted
    NotFound,
    /// Store action is not declared
    UnknownAction,
    /// Runtime failure the model never predicts
    Unexpected(String),
}

impl From<&RuntimeError> for OperationError {
    fn from(err: &RuntimeError) -> Self {
        match err {
            RuntimeError::NotFound { .. } => Self::NotFound,
            RuntimeError::UnknownAction { .. } => Self::UnknownAction,
            other => Self::Unexpected(other.to_string()),
        }
    }
}

/// Everything a test compares between model and runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObservableState {
    /// Surface markup
    pub render: String,
    /// State of every live instance
    pub states: BTreeMap<String, Value>,
    /// Store snapshot
    pub store: Value,
    /// Retained event types, oldest first
    pub events: Vec<String>,
    /// Timestamp of the newest retained event
    pub last_timestamp: Option<u64>,
    /// Number of bound surface listeners
    pub listeners: usize,
}

#[derive(Debug, Clone)]
enum ModelState {
    Counter(i64),
    List(Vec<String>),
    Label,
}

#[derive(Debug, Clone)]
struct ModelInstance {
    id: String,
    widget: Widget,
    state: ModelState,
    live: bool,
}

/// Reference model.
#[derive(Debug, Clone)]
pub struct ModelWorld {
    instances: Vec<ModelInstance>,
    next_id: u64,
    dark: bool,
    elapsed_micros: u64,
    events: VecDeque<(String, u64)>,
    history_capacity: usize,
}

impl ModelWorld {
    /// Empty application retaining `history_capacity` events.
    pub fn new(history_capacity: usize) -> Self {
        Self {
            instances: Vec::new(),
            next_id: 0,
            dark: false,
            elapsed_micros: 0,
            events: VecDeque::new(),
            history_capacity,
        }
    }

    /// Apply one operation.
    pub fn apply(&mut self, op: &Operation) -> OperationResult {
        match op {
            Operation::Mount { widget } => self.mount(*widget),
            Operation::Click { target } => self.update_counter(*target, |count| count + 1),
            Operation::SetCount { target, count } => {
                let count = i64::from(*count);
                self.update_counter(*target, |_| count)
            },
            Operation::SetItems { target, items } => self.set_items(*target, items),
            Operation::ClickLabel { target } => {
                match self.live_index(Widget::ThemeLabel, *target) {
                    Ok(_) => {
                        self.change_theme(!self.dark);
                        OperationResult::Ok
                    },
                    Err(err) => OperationResult::Error(err),
                }
            },
            Operation::Dispatch { action } => match action {
                ThemeAction::Toggle => {
                    self.change_theme(!self.dark);
                    OperationResult::Ok
                },
                ThemeAction::Set { dark } => {
                    self.change_theme(*dark);
                    OperationResult::Ok
                },
                ThemeAction::Unknown => OperationResult::Error(OperationError::UnknownAction),
            },
            Operation::Unmount { target } => match self.live_any(*target) {
                Ok(index) => {
                    self.instances[index].live = false;
                    self.record(COMPONENT_UNMOUNT);
                    OperationResult::Ok
                },
                Err(err) => OperationResult::Error(err),
            },
            Operation::AdvanceTime { micros } => {
                self.elapsed_micros += u64::from(*micros);
                OperationResult::Ok
            },
        }
    }

    /// Predicted observable state.
    pub fn observable_state(&self) -> ObservableState {
        let live = || self.instances.iter().filter(|instance| instance.live);
        ObservableState {
            render: live().map(|instance| self.render(instance)).collect(),
            states: live()
                .map(|instance| (instance.id.clone(), state_value(&instance.state)))
                .collect(),
            store: json!({ "theme": self.theme() }),
            events: self.events.iter().map(|(kind, _)| kind.clone()).collect(),
            last_timestamp: self.events.back().map(|(_, at)| *at),
            listeners: live().filter(|instance| instance.widget != Widget::TodoList).count(),
        }
    }

    fn mount(&mut self, widget: Widget) -> OperationResult {
        self.next_id += 1;
        let id = format!("{}-{}", widget.component(), self.next_id);
        let state = match widget {
            Widget::Counter => ModelState::Counter(0),
            Widget::TodoList => ModelState::List(vec!["a".into(), "b".into(), "c".into()]),
            Widget::ThemeLabel => ModelState::Label,
        };
        self.instances.push(ModelInstance { id: id.clone(), widget, state, live: true });
        self.record(COMPONENT_MOUNT);
        OperationResult::Mounted(id)
    }

    fn update_counter(&mut self, target: Slot, update: impl FnOnce(i64) -> i64) -> OperationResult {
        let index = match self.live_index(Widget::Counter, target) {
            Ok(index) => index,
            Err(err) => return OperationResult::Error(err),
        };
        if let ModelState::Counter(count) = &mut self.instances[index].state {
            *count = update(*count);
        }
        self.record(STATE_CHANGE);
        self.record(COMPONENT_UPDATE);
        OperationResult::Ok
    }

    fn set_items(&mut self, target: Slot, items: &[u8]) -> OperationResult {
        let index = match self.live_index(Widget::TodoList, target) {
            Ok(index) => index,
            Err(err) => return OperationResult::Error(err),
        };
        let labels = items.iter().map(|item| item_label(*item)).collect();
        self.instances[index].state = ModelState::List(labels);
        self.record(STATE_CHANGE);
        self.record(COMPONENT_UPDATE);
        OperationResult::Ok
    }

    fn change_theme(&mut self, dark: bool) {
        self.dark = dark;
        self.record(STORE_CHANGE);
        let roots = self.instances.iter().filter(|instance| instance.live).count();
        for _ in 0..roots {
            self.record(COMPONENT_UPDATE);
        }
    }

    fn live_index(&self, widget: Widget, target: Slot) -> Result<usize, OperationError> {
        let candidates: Vec<usize> = self
            .instances
            .iter()
            .enumerate()
            .filter(|(_, instance)| instance.widget == widget)
            .map(|(index, _)| index)
            .collect();
        let index = *pick(&candidates, target).ok_or(OperationError::NoTarget)?;
        if self.instances[index].live { Ok(index) } else { Err(OperationError::NotFound) }
    }

    fn live_any(&self, target: Slot) -> Result<usize, OperationError> {
        let candidates: Vec<usize> = (0..self.instances.len()).collect();
        let index = *pick(&candidates, target).ok_or(OperationError::NoTarget)?;
        if self.instances[index].live { Ok(index) } else { Err(OperationError::NotFound) }
    }

    fn record(&mut self, kind: &str) {
        self.events.push_back((kind.to_string(), self.elapsed_micros));
        while self.events.len() > self.history_capacity {
            self.events.pop_front();
        }
    }

    fn theme(&self) -> &'static str {
        if self.dark { "dark" } else { "light" }
    }

    fn render(&self, instance: &ModelInstance) -> String {
        match &instance.state {
            ModelState::Counter(count) => format!(
                r#"<div class="counter"><span>{count}</span>{}</div>"#,
                r#"<button @onClick=increment>+</button>"#
            ),
            ModelState::List(items) => {
                let items: String = items.iter().map(|item| format!("<li>{item}</li>")).collect();
                format!("<ul>{items}</ul>")
            },
            ModelState::Label => {
                let theme = self.theme();
                format!(r#"<p class="{theme}" @onClick=toggle>{theme}</p>"#)
            },
        }
    }
}

/// Candidate chosen by `slot`, `None` when there are no candidates.
pub fn pick<T>(candidates: &[T], slot: Slot) -> Option<&T> {
    if candidates.is_empty() {
        return None;
    }
    candidates.get(usize::from(slot) % candidates.len())
}

/// Text of list item `item`.
pub fn item_label(item: u8) -> String {
    format!("i{item}")
}

fn state_value(state: &ModelState) -> Value {
    match state {
        ModelState::Counter(count) => json!({ "count": count }),
        ModelState::List(items) => json!({ "items": items }),
        ModelState::Label => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn targets_wrap_around_candidates() {
        assert_eq!(pick(&[10, 20, 30], 4), Some(&20));
        assert_eq!(pick::<u8>(&[], 0), None);
    }

    #[test]
    fn unmounted_targets_are_not_found() {
        let mut model = ModelWorld::new(100);

        assert_eq!(
            model.apply(&Operation::Click { target: 0 }),
            OperationResult::Error(OperationError::NoTarget)
        );
        assert_eq!(
            model.apply(&Operation::Mount { widget: Widget::Counter }),
            OperationResult::Mounted("Counter-1".into())
        );
        assert!(model.apply(&Operation::Unmount { target: 0 }).is_ok());
        assert_eq!(
            model.apply(&Operation::Click { target: 0 }),
            OperationResult::Error(OperationError::NotFound)
        );
        assert_eq!(
            model.apply(&Operation::Unmount { target: 0 }),
            OperationResult::Error(OperationError::NotFound)
        );
    }

    #[test]
    fn theme_changes_update_every_root() {
        let mut model = ModelWorld::new(100);
        model.apply(&Operation::Mount { widget: Widget::Counter });
        model.apply(&Operation::Mount { widget: Widget::ThemeLabel });
        model.apply(&Operation::AdvanceTime { micros: 250 });

        assert!(model.apply(&Operation::ClickLabel { target: 0 }).is_ok());

        let state = model.observable_state();
        assert_eq!(state.events[2..], [STORE_CHANGE, COMPONENT_UPDATE, COMPONENT_UPDATE]);
        assert_eq!(state.last_timestamp, Some(250));
        assert!(state.render.ends_with(r#"<p class="dark" @onClick=toggle>dark</p>"#));
    }

    #[test]
    fn history_is_bounded() {
        let mut model = ModelWorld::new(3);
        for _ in 0..5 {
            model.apply(&Operation::Mount { widget: Widget::TodoList });
        }

        let state = model.observable_state();
        assert_eq!(state.events.len(), 3);
        assert_eq!(state.listeners, 0);
        assert_eq!(state.states.len(), 5);
    }
}
