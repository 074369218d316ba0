//! Global store with named reducer actions.

use std::{collections::BTreeMap, fmt, rc::Rc};

use serde_json::Value;

use crate::{error::RuntimeError, state::State};

/// Pure reducer: `(state, payload) -> next state`.
pub type Reducer = Rc<dyn Fn(&State, Option<&Value>) -> State>;

/// Shared application state replaced wholesale on each dispatch.
///
/// Snapshots are reference counted: a dispatch swaps in a new snapshot and
/// leaves earlier ones untouched, so anything still holding one keeps seeing
/// the state it was rendered with.
#[derive(Clone)]
pub struct Store {
    state: Rc<State>,
    actions: BTreeMap<String, Reducer>,
}

impl Store {
    /// Store with an initial snapshot and no actions.
    pub fn new(state: State) -> Self {
        Self { state: Rc::new(state), actions: BTreeMap::new() }
    }

    /// Declare an action.
    #[must_use]
    pub fn action(
        mut self,
        name: impl Into<String>,
        reducer: impl Fn(&State, Option<&Value>) -> State + 'static,
    ) -> Self {
        self.actions.insert(name.into(), Rc::new(reducer));
        self
    }

    /// Current snapshot.
    pub fn snapshot(&self) -> Rc<State> {
        Rc::clone(&self.state)
    }

    /// Copy of the current snapshot.
    pub fn state(&self) -> State {
        (*self.state).clone()
    }

    /// Declared action names, sorted.
    pub fn action_names(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    /// Run `action` and swap in its result. Returns the previous and next
    /// snapshots.
    ///
    /// # Errors
    ///
    /// `UnknownAction` if no reducer has that name; the store is unchanged.
    pub(crate) fn apply(
        &mut self,
        action: &str,
        payload: Option<&Value>,
    ) -> Result<(Rc<State>, Rc<State>), RuntimeError> {
        let reducer = self
            .actions
            .get(action)
            .cloned()
            .ok_or_else(|| RuntimeError::UnknownAction { action: action.to_string() })?;

        let prev = Rc::clone(&self.state);
        let next = Rc::new(reducer(&prev, payload));
        self.state = Rc::clone(&next);
        Ok((prev, next))
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("state", &self.state)
            .field("actions", &self.actions.keys().collect::<Vec<_>>())
            .finish()
    }
}
