#![no_main]

use libfuzzer_sys::fuzz_target;
use std::cell::RefCell;
use weft_di::{Container, DependencyGraphBuilder, DiError, DiResult, Module, ModuleType, OverridePolicy};

const NODES: usize = 6;

thread_local! {
    static EDGES: RefCell<[[bool; NODES]; NODES]> = RefCell::new([[false; NODES]; NODES]);
}

struct Node<const N: usize>;

impl<const N: usize> Module for Node<N> {
    fn assemble(&self, _: &Container) -> DiResult<()> {
        Ok(())
    }
    fn dependencies() -> Vec<ModuleType> {
        EDGES.with(|edges| {
            let edges = edges.borrow();
            (0..NODES).filter(|&j| edges[N][j]).map(node_type).collect()
        })
    }
    fn construct() -> Option<Self> {
        // Odd nodes must be supplied by the caller.
        if N % 2 == 0 {
            Some(Node)
        } else {
            None
        }
    }
}

fn node_type(index: usize) -> ModuleType {
    match index {
        0 => ModuleType::of::<Node<0>>(),
        1 => ModuleType::of::<Node<1>>(),
        2 => ModuleType::of::<Node<2>>(),
        3 => ModuleType::of::<Node<3>>(),
        4 => ModuleType::of::<Node<4>>(),
        _ => ModuleType::of::<Node<5>>(),
    }
}

fn node_instance(index: usize) -> weft_di::ModuleInstance {
    match index {
        0 => weft_di::ModuleInstance::new(Node::<0>),
        1 => weft_di::ModuleInstance::new(Node::<1>),
        2 => weft_di::ModuleInstance::new(Node::<2>),
        3 => weft_di::ModuleInstance::new(Node::<3>),
        4 => weft_di::ModuleInstance::new(Node::<4>),
        _ => weft_di::ModuleInstance::new(Node::<5>),
    }
}

fuzz_target!(|data: &[u8]| {
    if data.len() < NODES + 1 {
        return;
    }

    // Arbitrary edges, cycles included.
    EDGES.with(|edges| {
        let mut edges = edges.borrow_mut();
        for i in 0..NODES {
            for j in 0..NODES {
                edges[i][j] = data[i] & (1 << j) != 0;
            }
        }
    });

    let inputs = data[NODES];
    let mut builder = DependencyGraphBuilder::new(OverridePolicy::Never);
    for i in 0..NODES {
        if inputs & (1 << i) != 0 {
            builder = builder.module_instance(node_instance(i));
        }
    }

    match builder.build() {
        Ok(graph) => {
            let order = graph.module_types();
            for (at, module) in order.iter().enumerate() {
                for dependency in module.dependencies() {
                    let position = order.iter().position(|m| *m == dependency);
                    assert!(matches!(position, Some(p) if p < at));
                }
            }
            let _ = graph.describe();
        }
        Err(DiError::ModuleCycle(path)) => {
            assert!(path.len() >= 2);
            assert_eq!(path.first(), path.last());
        }
        Err(DiError::MissingModule { path, .. }) => assert!(!path.is_empty()),
        Err(other) => panic!("unexpected error {}", other),
    }
});
