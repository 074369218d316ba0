//! Router collaborator.
//!
//! A [`Router`] resolves a path to the name of a registered component. The
//! [`App`](crate::App) turns a resolved route into unmount/mount calls on
//! the runtime; routers themselves never touch instances.

use std::{
    cell::{Cell, RefCell},
    collections::VecDeque,
    rc::Rc,
};

/// Resolves paths to component names.
pub trait Router {
    /// Component to mount for `path`, or `None` when nothing matches.
    fn resolve(&self, path: &str) -> Option<String>;
}

/// Exact-match route table. Trailing slashes are ignored.
#[derive(Debug, Clone, Default)]
pub struct RouteTable {
    routes: Vec<(String, String)>,
}

impl RouteTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Map `path` to `component`. A later route for the same path wins.
    #[must_use]
    pub fn route(mut self, path: &str, component: impl Into<String>) -> Self {
        let path = normalize(path).to_string();
        self.routes.retain(|(existing, _)| *existing != path);
        self.routes.push((path, component.into()));
        self
    }

    /// Registered paths in insertion order.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.routes.iter().map(|(path, _)| path.as_str())
    }
}

impl Router for RouteTable {
    fn resolve(&self, path: &str) -> Option<String> {
        let path = normalize(path);
        self.routes.iter().find(|(route, _)| route == path).map(|(_, component)| component.clone())
    }
}

fn normalize(path: &str) -> &str {
    let trimmed = path.trim_end_matches('/');
    if trimmed.is_empty() { "/" } else { trimmed }
}

/// Handle through which hosts request navigation, the counterpart of a
/// browser history listener.
///
/// Requests queue up until [`App::process_navigation`](crate::App::process_navigation)
/// runs them. Once the application root unmounts the navigator detaches and
/// further requests are refused.
#[derive(Debug, Clone)]
pub struct Navigator {
    queue: Rc<RefCell<VecDeque<String>>>,
    attached: Rc<Cell<bool>>,
}

impl Navigator {
    pub(crate) fn new() -> Self {
        Self { queue: Rc::new(RefCell::new(VecDeque::new())), attached: Rc::new(Cell::new(true)) }
    }

    /// Queue a navigation. Returns false once detached.
    pub fn request(&self, path: impl Into<String>) -> bool {
        if !self.attached.get() {
            return false;
        }
        self.queue.borrow_mut().push_back(path.into());
        true
    }

    /// True until the application root unmounts.
    pub fn is_attached(&self) -> bool {
        self.attached.get()
    }

    pub(crate) fn next(&self) -> Option<String> {
        self.queue.borrow_mut().pop_front()
    }

    pub(crate) fn detach(&self) {
        self.attached.set(false);
        self.queue.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_matches_exact_paths() {
        let table = RouteTable::new()
            .route("/", "Home")
            .route("/about/", "About")
            .route("/about", "AboutV2");

        assert_eq!(table.resolve("/"), Some("Home".into()));
        assert_eq!(table.resolve("/about"), Some("AboutV2".into()));
        assert_eq!(table.resolve("/about/"), Some("AboutV2".into()));
        assert_eq!(table.resolve("/about/team"), None);
        assert_eq!(table.paths().collect::<Vec<_>>(), vec!["/", "/about"]);
    }

    #[test]
    fn detached_navigator_refuses_requests() {
        let navigator = Navigator::new();
        assert!(navigator.request("/a"));

        navigator.detach();
        assert!(!navigator.request("/b"));
        assert!(navigator.next().is_none());
    }
}
