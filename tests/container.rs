/// Resolution container integration tests
///
/// Object scoping, parent/child shadowing, two-phase construction of
/// circular graphs, forwarding and the failure modes of resolution.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use weft_di::{Container, DiError, Key, ObjectScope, Resolver};

// ===== Test Services =====

struct Connection {
    id: usize,
}

struct Repository {
    connection: Arc<Connection>,
}

struct Service {
    users: Arc<Repository>,
    orders: Arc<Repository>,
    connection: Arc<Connection>,
}

fn wire(container: &Container, connection_scope: ObjectScope) -> Arc<AtomicUsize> {
    let created = Arc::new(AtomicUsize::new(0));
    let counter = created.clone();
    container.register::<Connection, _>(connection_scope, move |_| {
        Arc::new(Connection { id: counter.fetch_add(1, Ordering::SeqCst) })
    });
    container.register::<Repository, _>(ObjectScope::Transient, |r| {
        Arc::new(Repository { connection: r.resolve_required::<Connection>() })
    });
    container.register::<Service, _>(ObjectScope::Transient, |r| {
        Arc::new(Service {
            users: r.resolve_required::<Repository>(),
            orders: r.resolve_required::<Repository>(),
            connection: r.resolve_required::<Connection>(),
        })
    });
    created
}

// ===== Object scopes =====

#[test]
fn graph_scope_is_shared_within_one_resolve_call() {
    let container = Container::new();
    let created = wire(&container, ObjectScope::Graph);

    let first = container.resolve_required::<Service>();
    assert!(Arc::ptr_eq(&first.users.connection, &first.orders.connection));
    assert!(Arc::ptr_eq(&first.users.connection, &first.connection));
    assert!(!Arc::ptr_eq(&first.users, &first.orders));

    let second = container.resolve_required::<Service>();
    assert!(!Arc::ptr_eq(&first.connection, &second.connection));
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn graph_scope_does_not_outlive_the_call() {
    let container = Container::new();
    wire(&container, ObjectScope::Graph);

    let a = container.resolve_required::<Connection>();
    let b = container.resolve_required::<Connection>();
    assert_ne!(a.id, b.id);
}

#[test]
fn container_scope_is_shared_across_calls() {
    let container = Container::new();
    let created = wire(&container, ObjectScope::Container);

    let first = container.resolve_required::<Service>();
    let second = container.resolve_required::<Service>();
    assert!(Arc::ptr_eq(&first.connection, &second.connection));
    assert_eq!(created.load(Ordering::SeqCst), 1);
}

#[test]
fn transient_scope_is_never_shared() {
    let container = Container::new();
    let created = wire(&container, ObjectScope::Transient);

    let service = container.resolve_required::<Service>();
    assert!(!Arc::ptr_eq(&service.users.connection, &service.orders.connection));
    assert_eq!(created.load(Ordering::SeqCst), 3);
}

#[test]
fn weak_scope_is_rebuilt_once_released() {
    let container = Container::new();
    let created = wire(&container, ObjectScope::Weak);

    let held = container.resolve_required::<Connection>();
    let service = container.resolve_required::<Service>();
    assert!(Arc::ptr_eq(&held, &service.connection));

    drop(held);
    drop(service);
    let rebuilt = container.resolve_required::<Connection>();
    assert_eq!(rebuilt.id, 1);
    assert_eq!(created.load(Ordering::SeqCst), 2);
}

#[test]
fn reset_discards_cached_instances_of_one_scope() {
    let container = Container::new();
    container.register::<Connection, _>(ObjectScope::Container, |_| Arc::new(Connection { id: 0 }));
    container.register_named::<Connection, _>("pinned", ObjectScope::Weak, |_| Arc::new(Connection { id: 1 }));

    let cached = container.resolve_required::<Connection>();
    let pinned = container.resolve_named_required::<Connection>("pinned");
    container.reset_object_scope(ObjectScope::Container);

    assert!(!Arc::ptr_eq(&cached, &container.resolve_required::<Connection>()));
    assert!(Arc::ptr_eq(&pinned, &container.resolve_named_required::<Connection>("pinned")));
}

#[test]
fn factories_see_one_graph_id_per_call() {
    struct Probe {
        graph: u64,
        nested: Arc<Nested>,
    }
    struct Nested {
        graph: u64,
    }

    let container = Container::new();
    container.register::<Nested, _>(ObjectScope::Transient, |r| Arc::new(Nested { graph: r.graph_id().as_u64() }));
    container.register::<Probe, _>(ObjectScope::Transient, |r| {
        Arc::new(Probe { graph: r.graph_id().as_u64(), nested: r.resolve_required::<Nested>() })
    });

    let first = container.resolve_required::<Probe>();
    let second = container.resolve_required::<Probe>();
    assert_eq!(first.graph, first.nested.graph);
    assert_ne!(first.graph, second.graph);
}

// ===== Hierarchy =====

#[test]
fn child_shadows_parent_without_touching_it() {
    let parent = Container::new();
    parent.register::<String, _>(ObjectScope::Container, |_| Arc::new("parent".to_string()));
    parent.register::<u32, _>(ObjectScope::Container, |_| Arc::new(7));

    let child = parent.child();
    child.register::<String, _>(ObjectScope::Container, |_| Arc::new("child".to_string()));

    assert_eq!(*child.resolve_required::<String>(), "child");
    assert_eq!(*parent.resolve_required::<String>(), "parent");
    assert!(Arc::ptr_eq(&child.resolve_required::<u32>(), &parent.resolve_required::<u32>()));

    assert!(child.contains(&Key::of::<u32>()));
    assert!(!child.contains_own(&Key::of::<u32>()));
    assert!(child.parent().unwrap().ptr_eq(&parent));
}

#[test]
fn parent_entries_resolve_dependencies_in_the_parent() {
    struct Greeting(String);
    struct Greeter {
        greeting: Arc<Greeting>,
    }

    let parent = Container::new();
    parent.register::<Greeting, _>(ObjectScope::Container, |_| Arc::new(Greeting("parent".into())));
    parent.register::<Greeter, _>(ObjectScope::Transient, |r| {
        Arc::new(Greeter { greeting: r.resolve_required::<Greeting>() })
    });

    let child = parent.child();
    child.register::<Greeting, _>(ObjectScope::Container, |_| Arc::new(Greeting("child".into())));

    assert_eq!(child.resolve_required::<Greeter>().greeting.0, "parent");
}

#[test]
fn weak_resolver_fails_after_release() {
    let container = Container::new();
    container.register::<u64, _>(ObjectScope::Container, |_| Arc::new(99));
    let weak = container.downgrade();

    assert_eq!(*weak.resolve_required::<u64>(), 99);
    assert!(weak.upgrade().is_some());

    drop(container);
    assert!(weak.is_released());
    assert!(weak.upgrade().is_none());
    match weak.try_resolve::<u64>() {
        Err(DiError::ReleasedContainer(key)) => assert_eq!(key, Key::of::<u64>()),
        other => panic!("expected a released container, got {:?}", other.map(|v| *v)),
    }
}

// ===== Two-phase construction =====

struct Parent {
    children: Mutex<Vec<Arc<Child>>>,
}

struct Child {
    parent: Weak<Parent>,
}

#[test]
fn init_completed_closes_circular_graphs() {
    let container = Container::new();
    container
        .register::<Parent, _>(ObjectScope::Graph, |_| Arc::new(Parent { children: Mutex::new(Vec::new()) }))
        .init_completed(|r, parent| {
            parent.children.lock().push(r.resolve_required::<Child>());
        });
    container.register::<Child, _>(ObjectScope::Graph, |r| {
        Arc::new(Child { parent: Arc::downgrade(&r.resolve_required::<Parent>()) })
    });

    let parent = container.resolve_required::<Parent>();
    let children = parent.children.lock();
    assert_eq!(children.len(), 1);
    assert!(Arc::ptr_eq(&children[0].parent.upgrade().unwrap(), &parent));
}

#[test]
fn cycle_entered_from_the_other_side_resolves_consistently() {
    let container = Container::new();
    container
        .register::<Parent, _>(ObjectScope::Container, |_| Arc::new(Parent { children: Mutex::new(Vec::new()) }))
        .init_completed(|r, parent| {
            parent.children.lock().push(r.resolve_required::<Child>());
        });
    container.register::<Child, _>(ObjectScope::Container, |r| {
        Arc::new(Child { parent: Arc::downgrade(&r.resolve_required::<Parent>()) })
    });

    // The child completed inside the parent's hook is cached first and wins.
    let child = container.resolve_required::<Child>();
    let parent = container.resolve_required::<Parent>();
    assert!(Arc::ptr_eq(&parent.children.lock()[0], &child));
    assert!(Arc::ptr_eq(&child.parent.upgrade().unwrap(), &parent));
    assert!(Arc::ptr_eq(&container.resolve_required::<Child>(), &child));
}

#[test]
fn init_completed_runs_once_per_instance() {
    let hooks = Arc::new(AtomicUsize::new(0));
    let seen = hooks.clone();

    let container = Container::new();
    container
        .register::<Connection, _>(ObjectScope::Container, |_| Arc::new(Connection { id: 5 }))
        .init_completed(move |_, connection| {
            assert_eq!(connection.id, 5);
            seen.fetch_add(1, Ordering::SeqCst);
        });

    container.resolve_required::<Connection>();
    container.resolve_required::<Connection>();
    assert_eq!(hooks.load(Ordering::SeqCst), 1);
}

#[test]
#[should_panic(expected = "Maximum resolution depth 16 exceeded")]
fn unbroken_cycle_hits_the_depth_limit() {
    struct Ping(#[allow(dead_code)] Arc<Pong>);
    struct Pong(#[allow(dead_code)] Arc<Ping>);

    let container = Container::with_max_resolution_depth(16);
    container.register::<Ping, _>(ObjectScope::Graph, |r| Arc::new(Ping(r.resolve_required::<Pong>())));
    container.register::<Pong, _>(ObjectScope::Graph, |r| Arc::new(Pong(r.resolve_required::<Ping>())));

    container.resolve_required::<Ping>();
}

// ===== Keys =====

trait Reader: Send + Sync {
    fn read(&self) -> usize;
}

trait Writer: Send + Sync {
    fn write(&self, value: usize);
}

struct Cell(AtomicUsize);

impl Reader for Cell {
    fn read(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

impl Writer for Cell {
    fn write(&self, value: usize) {
        self.0.store(value, Ordering::SeqCst)
    }
}

#[test]
fn forwarded_keys_share_the_instance() {
    let built = Arc::new(AtomicUsize::new(0));
    let counter = built.clone();

    let container = Container::new();
    let handle = container
        .register::<Cell, _>(ObjectScope::Container, move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Arc::new(Cell(AtomicUsize::new(0)))
        })
        .implements::<dyn Reader, _>(|cell| cell)
        .implements_named::<dyn Writer, _>("primary", |cell| cell);
    assert_eq!(handle.key(), &Key::of::<Cell>());
    assert_eq!(handle.scope(), ObjectScope::Container);

    container.resolve_named_required::<dyn Writer>("primary").write(42);
    assert_eq!(container.resolve_required::<dyn Reader>().read(), 42);
    assert_eq!(container.resolve_required::<Cell>().read(), 42);
    assert_eq!(built.load(Ordering::SeqCst), 1);
    assert!(container.resolve::<dyn Writer>().is_none());
}

#[test]
fn named_and_argument_keys_are_distinct() {
    let container = Container::new();
    container.register::<String, _>(ObjectScope::Container, |_| Arc::new("default".to_string()));
    container.register_named::<String, _>("replica", ObjectScope::Container, |_| Arc::new("replica".to_string()));
    container.register_with_args::<String, (String, u16), _>(Some("dsn".into()), ObjectScope::Transient, |_, (host, port)| {
        Arc::new(format!("{}:{}", host, port))
    });

    assert_eq!(*container.resolve_required::<String>(), "default");
    assert_eq!(*container.resolve_named_required::<String>("replica"), "replica");
    assert_eq!(
        *container
            .resolve_named_with_args::<String, _>("dsn", ("db".to_string(), 5432u16))
            .unwrap(),
        "db:5432"
    );
    assert!(container.resolve_named::<String>("dsn").is_none());
    assert_eq!(container.registrations().len(), 3);
}

#[test]
fn unknown_service_reports_the_key() {
    let container = Container::new();
    container.register_named::<String, _>("present", ObjectScope::Graph, |_| Arc::new(String::new()));

    let err = container.try_resolve_named::<String>("absent").unwrap_err();
    assert_eq!(err.to_string(), "Service not found: String (name: \"absent\")");
    assert!(container.resolve_optional::<u8>().is_none());
}

#[test]
#[should_panic(expected = "Service not found: u8")]
fn required_resolution_is_fatal() {
    let container = Container::new();
    container.resolve_required::<u8>();
}
