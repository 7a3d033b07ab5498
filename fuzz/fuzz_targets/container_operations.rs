#![no_main]

use libfuzzer_sys::fuzz_target;
use std::sync::Arc;
use weft_di::{Container, ObjectScope, Resolver};

const SCOPES: [ObjectScope; 4] = [
    ObjectScope::Transient,
    ObjectScope::Graph,
    ObjectScope::Container,
    ObjectScope::Weak,
];

struct Leaf(u8);

struct Branch {
    leaf: Option<Arc<Leaf>>,
}

trait Named: Send + Sync {
    fn name(&self) -> u8;
}

impl Named for Leaf {
    fn name(&self) -> u8 {
        self.0
    }
}

fuzz_target!(|data: &[u8]| {
    let root = Container::new();
    let mut containers = vec![root.clone()];
    let mut held = Vec::new();

    // Each pair of bytes is one operation on one container of the hierarchy.
    for chunk in data.chunks_exact(2) {
        let (op, arg) = (chunk[0], chunk[1]);
        let container = &containers[arg as usize % containers.len()];
        let scope = SCOPES[(op >> 4) as usize % SCOPES.len()];

        match op % 8 {
            0 => {
                container
                    .register::<Leaf, _>(scope, move |_| Arc::new(Leaf(arg)))
                    .implements::<dyn Named, _>(|leaf| leaf);
            }
            1 => {
                container.register::<Branch, _>(scope, |r| Arc::new(Branch { leaf: r.resolve::<Leaf>() }));
            }
            2 => {
                if let Ok(leaf) = container.try_resolve::<Leaf>() {
                    held.push(leaf);
                }
            }
            3 => {
                if let Some(leaf) = container.resolve::<Branch>().and_then(|branch| branch.leaf.clone()) {
                    assert_eq!(leaf.0, leaf.name());
                }
            }
            4 => {
                let child = container.child();
                containers.push(child);
            }
            5 => container.reset_object_scope(scope),
            6 => {
                container.register_into_collection::<dyn Named, _>(scope, move |_| Arc::new(Leaf(arg)));
                let all = container.resolve_collection::<dyn Named>();
                assert!(!all.is_empty());
            }
            _ => {
                held.clear();
                let _ = container.resolve_optional::<dyn Named>();
            }
        }
    }
});
