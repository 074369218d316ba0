//! Fuzz target: reconciliation against a strict surface
//!
//! Decodes a sequence of descriptors and renders them one after another as
//! the output of a single component. The in-memory surface rejects any patch
//! that breaks creation or removal ordering, so a surface error here is an
//! engine bug. Other failures are expected and the sequence carries on. After
//! every step, failed or not, the surface must hold no detached nodes.

#![no_main]

use std::{cell::RefCell, rc::Rc};

use canopy_core::{ComponentDefinition, Runtime, RuntimeError, State};
use canopy_harness::{fixtures, MemorySurface};
use canopy_proto::{codec, Descriptor, NodeKey};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(frames) = codec::from_cbor::<Vec<Descriptor>>(data) else {
        return;
    };
    let Some((first, rest)) = frames.split_first() else {
        return;
    };

    let current = Rc::new(RefCell::new(first.clone()));
    let source = Rc::clone(&current);
    let surface = MemorySurface::new();
    let mut runtime = Runtime::new(surface.clone());
    runtime.register(fixtures::counter()).expect("fresh registry");
    runtime.register(fixtures::badge()).expect("fresh registry");
    let host = runtime
        .register(ComponentDefinition::new("Host", State::new(), move |_, _| {
            source.borrow().clone()
        }))
        .expect("fresh registry");

    let mounted = runtime.mount(host, NodeKey::ROOT);
    assert!(surface.detached_nodes().is_empty());
    let id = match mounted {
        Ok(id) => id,
        Err(err) => return check(&err),
    };

    for frame in rest {
        *current.borrow_mut() = frame.clone();
        if let Err(err) = runtime.set_state(&id, State::new()) {
            check(&err);
        }
        assert!(surface.detached_nodes().is_empty());
    }
});

fn check(err: &RuntimeError) {
    assert!(!matches!(err, RuntimeError::Surface(_)), "surface rejected a patch: {err}");
}
