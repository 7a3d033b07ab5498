/// Module assembler integration tests
///
/// Parent/child assemblers, resolver scopes, configuration and the post
/// assembly hook.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use weft_di::{
    AssemblerConfig, Container, DiError, DiResult, Module, ModuleAssembler, ModuleType, ObjectScope,
    OverridePolicy, Resolver, ResolverCore, ResolverScope,
};

// ===== Test Modules =====

struct Settings {
    url: String,
}

struct Pool {
    settings: Arc<Settings>,
}

struct Session {
    pool: Arc<Pool>,
}

struct SettingsModule;
impl Module for SettingsModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        container.register::<Settings, _>(ObjectScope::Container, |_| {
            Arc::new(Settings { url: "postgres://db".to_string() })
        });
        Ok(())
    }
    fn construct() -> Option<Self> {
        Some(SettingsModule)
    }
}

struct PoolModule;
impl Module for PoolModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        container.register::<Pool, _>(ObjectScope::Container, |r| {
            Arc::new(Pool { settings: r.resolve_required::<Settings>() })
        });
        Ok(())
    }
    fn dependencies() -> Vec<ModuleType> {
        vec![ModuleType::of::<SettingsModule>()]
    }
    fn construct() -> Option<Self> {
        Some(PoolModule)
    }
}

/// Marker for request-scoped assemblers.
struct Request;

struct SessionModule;
impl Module for SessionModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        container.register::<Session, _>(ObjectScope::Container, |r| {
            Arc::new(Session { pool: r.resolve_required::<Pool>() })
        });
        Ok(())
    }
    fn dependencies() -> Vec<ModuleType> {
        vec![ModuleType::of::<PoolModule>()]
    }
    fn resolver_scope() -> ResolverScope {
        ResolverScope::of::<Request>()
    }
}

// ===== Parent and child assemblers =====

#[test]
fn child_assembler_reuses_parent_modules() {
    let app = ModuleAssembler::builder().module(PoolModule).build();
    assert_eq!(app.graph().module_types(), [ModuleType::of::<SettingsModule>(), ModuleType::of::<PoolModule>()]);

    let request = ModuleAssembler::scoped::<Request>()
        .parent(&app)
        .module(SessionModule)
        .build();

    assert_eq!(request.graph().module_types(), [ModuleType::of::<SessionModule>()]);
    assert_eq!(request.graph().inherited(), [ModuleType::of::<PoolModule>()]);
    assert!(request.is_registered(&ModuleType::of::<SettingsModule>()));
    assert!(!app.is_registered(&ModuleType::of::<SessionModule>()));
    assert!(request.parent().is_some());
    assert_eq!(request.resolver_scope(), Some(ResolverScope::of::<Request>()));

    let session = request.resolve_required::<Session>();
    assert!(Arc::ptr_eq(&session.pool, &app.resolve_required::<Pool>()));
    assert_eq!(session.pool.settings.url, "postgres://db");
    assert!(app.resolve::<Session>().is_none());
}

#[test]
fn sibling_children_are_isolated() {
    let app = ModuleAssembler::builder().module(PoolModule).build();
    let first = ModuleAssembler::scoped::<Request>().parent(&app).module(SessionModule).build();
    let second = ModuleAssembler::scoped::<Request>().parent(&app).module(SessionModule).build();

    let a = first.resolve_required::<Session>();
    let b = second.resolve_required::<Session>();
    assert!(!Arc::ptr_eq(&a, &b));
    assert!(Arc::ptr_eq(&a.pool, &b.pool));
}

// ===== Resolver scopes =====

#[test]
fn scope_mismatch_is_rejected_before_registration() {
    static ASSEMBLED: AtomicUsize = AtomicUsize::new(0);

    struct Counting;
    impl Module for Counting {
        fn assemble(&self, _: &Container) -> DiResult<()> {
            ASSEMBLED.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
        fn resolver_scope() -> ResolverScope {
            ResolverScope::of::<Request>()
        }
    }

    // SessionModule is in scope, the discovered PoolModule is not.
    let err = ModuleAssembler::scoped::<Request>()
        .module(Counting)
        .module(SessionModule)
        .try_build()
        .unwrap_err();

    match err {
        DiError::ScopeMismatch { module, expected, actual } => {
            assert_eq!(module, "SettingsModule");
            assert_eq!(expected, "Request");
            assert_eq!(actual, "RootScope");
        }
        other => panic!("unexpected error {}", other),
    }
    assert_eq!(ASSEMBLED.load(Ordering::SeqCst), 0);
}

#[test]
fn unscoped_assembler_accepts_every_scope() {
    let assembler = ModuleAssembler::builder().module(SessionModule).build();
    assert!(assembler.resolver_scope().is_none());
    assert_eq!(assembler.resolve_required::<Session>().pool.settings.url, "postgres://db");
}

// ===== Configuration and overrides =====

struct FakeSettingsModule;
impl Module for FakeSettingsModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        container.register::<Settings, _>(ObjectScope::Container, |_| {
            Arc::new(Settings { url: "sqlite::memory:".to_string() })
        });
        Ok(())
    }
    fn replaces() -> Vec<ModuleType> {
        vec![ModuleType::of::<OverridableSettings>()]
    }
    fn construct() -> Option<Self> {
        Some(FakeSettingsModule)
    }
}

struct OverridableSettings;
impl Module for OverridableSettings {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        SettingsModule.assemble(container)
    }
    fn default_override() -> Option<ModuleType> {
        Some(ModuleType::of::<FakeSettingsModule>())
    }
    fn construct() -> Option<Self> {
        Some(OverridableSettings)
    }
}

struct Consumer;
impl Module for Consumer {
    fn assemble(&self, _: &Container) -> DiResult<()> {
        Ok(())
    }
    fn dependencies() -> Vec<ModuleType> {
        vec![ModuleType::of::<OverridableSettings>()]
    }
}

fn url_with(config: AssemblerConfig) -> String {
    let assembler = ModuleAssembler::builder().config(config).module(Consumer).build();
    assembler.resolve_required::<Settings>().url.clone()
}

#[test]
fn config_decides_whether_default_overrides_apply() {
    assert_eq!(url_with(AssemblerConfig::default()), "postgres://db");
    assert_eq!(url_with(AssemblerConfig::default().with_testing(true)), "sqlite::memory:");
    assert_eq!(
        url_with(AssemblerConfig::default().with_override_policy(OverridePolicy::Always)),
        "sqlite::memory:"
    );
    assert_eq!(
        url_with(
            AssemblerConfig::default()
                .with_override_policy(OverridePolicy::Never)
                .with_testing(true)
        ),
        "postgres://db"
    );
}

#[test]
fn config_from_variables_drives_the_assembler() {
    let config = AssemblerConfig::from_lookup(|name: &str| match name {
        "WEFT_DI_OVERRIDE_POLICY" => Some("always".to_string()),
        "WEFT_DI_MAX_RESOLUTION_DEPTH" => Some("32".to_string()),
        _ => None,
    })
    .unwrap();
    assert_eq!(config.max_resolution_depth, 32);
    assert_eq!(url_with(config), "sqlite::memory:");
}

// ===== Post assembly =====

#[test]
fn post_assemble_sees_every_registration() {
    let checked = Arc::new(AtomicUsize::new(0));
    let seen = checked.clone();

    let assembler = ModuleAssembler::builder()
        .module(PoolModule)
        .post_assemble(move |container| {
            let pool = container.try_resolve::<Pool>()?;
            assert_eq!(pool.settings.url, "postgres://db");
            container.register::<String, _>(ObjectScope::Container, |_| Arc::new("ready".to_string()));
            seen.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .build();

    assert_eq!(checked.load(Ordering::SeqCst), 1);
    assert_eq!(*assembler.resolve_required::<String>(), "ready");
}

#[test]
fn post_assemble_errors_abort_assembly() {
    let err = ModuleAssembler::builder()
        .module(PoolModule)
        .post_assemble(|_| Err(DiError::InvalidConfig("pool is not reachable".into())))
        .try_build()
        .unwrap_err();
    assert_eq!(err.to_string(), "Invalid configuration: pool is not reachable");
}

#[test]
#[should_panic(expected = "Module assembly failed: Missing module ManualSettings (dependency path: NeedsManualSettings -> ManualSettings)")]
fn build_treats_structural_errors_as_fatal() {
    struct NeedsManualSettings;
    impl Module for NeedsManualSettings {
        fn assemble(&self, _: &Container) -> DiResult<()> {
            Ok(())
        }
        fn dependencies() -> Vec<ModuleType> {
            vec![ModuleType::of::<ManualSettings>()]
        }
    }

    // Not auto-constructible and never supplied.
    struct ManualSettings;
    impl Module for ManualSettings {
        fn assemble(&self, _: &Container) -> DiResult<()> {
            Ok(())
        }
    }

    ModuleAssembler::builder().module(NeedsManualSettings).build();
}

// ===== Resolver handles =====

#[test]
fn weak_resolver_fails_once_the_assembler_is_dropped() {
    let assembler = ModuleAssembler::builder().module(PoolModule).build();
    let weak = assembler.weak_resolver();
    assert!(weak.resolve::<Pool>().is_some());

    drop(assembler);
    assert!(matches!(weak.try_resolve::<Pool>(), Err(DiError::ReleasedContainer(_))));
}

#[test]
fn diagnostics_include_the_module_graph() {
    let assembler = ModuleAssembler::builder().module(PoolModule).build();
    let text = assembler.resolver().diagnostics().unwrap();
    assert!(text.contains("Pool [container]"), "{}", text);
    assert!(text.contains("Module graph:\nPoolModule\n  SettingsModule\n"), "{}", text);
}
