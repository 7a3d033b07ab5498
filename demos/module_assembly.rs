/// Example: Assembling an application from modules
///
/// Demonstrates dependency discovery between modules, default overrides for
/// tests, abstract registrations, service collections, two-phase construction
/// of a circular pair, and a request-scoped child assembler.
///
/// Run with `WEFT_DI_TESTING=1` to see the in-memory mailer override kick in.

use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use weft_di::{
    AssemblerConfig, Container, DiResult, Module, ModuleAssembler, ModuleType, ObjectScope, Resolver,
    ResolverScope,
};

// ===== Shared Configuration =====

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub max_connections: usize,
}

pub struct ConfigModule;

impl Module for ConfigModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        container.register::<AppConfig, _>(ObjectScope::Container, |_| {
            Arc::new(AppConfig {
                database_url: "postgresql://localhost:5432/app".to_string(),
                max_connections: 10,
            })
        });
        Ok(())
    }

    fn construct() -> Option<Self> {
        Some(ConfigModule)
    }
}

// ===== Database Module =====

#[derive(Debug)]
pub struct Database {
    pub connection_string: String,
    pub max_connections: usize,
}

pub struct DatabaseModule;

impl Module for DatabaseModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        container.register::<Database, _>(ObjectScope::Container, |r| {
            let config = r.resolve_required::<AppConfig>();
            Arc::new(Database {
                connection_string: config.database_url.clone(),
                max_connections: config.max_connections,
            })
        });
        Ok(())
    }

    fn dependencies() -> Vec<ModuleType> {
        vec![ModuleType::of::<ConfigModule>()]
    }

    fn construct() -> Option<Self> {
        Some(DatabaseModule)
    }
}

// ===== Mail Module (with a test override) =====

pub trait Mailer: Send + Sync {
    fn send(&self, to: &str, body: &str) -> String;
}

struct SmtpMailer;

impl Mailer for SmtpMailer {
    fn send(&self, to: &str, body: &str) -> String {
        format!("smtp -> {}: {}", to, body)
    }
}

#[derive(Default)]
struct InMemoryMailer {
    outbox: Mutex<Vec<String>>,
}

impl Mailer for InMemoryMailer {
    fn send(&self, to: &str, body: &str) -> String {
        let line = format!("memory -> {}: {}", to, body);
        self.outbox.lock().push(line.clone());
        line
    }
}

pub struct SmtpModule;

impl Module for SmtpModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        container.register::<dyn Mailer, _>(ObjectScope::Container, |_| Arc::new(SmtpMailer));
        Ok(())
    }

    fn default_override() -> Option<ModuleType> {
        Some(ModuleType::of::<InMemoryMailModule>())
    }

    fn construct() -> Option<Self> {
        Some(SmtpModule)
    }
}

pub struct InMemoryMailModule;

impl Module for InMemoryMailModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        container.register::<dyn Mailer, _>(ObjectScope::Container, |_| Arc::new(InMemoryMailer::default()));
        Ok(())
    }

    fn replaces() -> Vec<ModuleType> {
        vec![ModuleType::of::<SmtpModule>()]
    }

    fn construct() -> Option<Self> {
        Some(InMemoryMailModule)
    }
}

// ===== User Module =====

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &str) -> String;
}

struct DatabaseAudit;
impl AuditSink for DatabaseAudit {
    fn record(&self, event: &str) -> String {
        format!("db audit: {}", event)
    }
}

struct ConsoleAudit;
impl AuditSink for ConsoleAudit {
    fn record(&self, event: &str) -> String {
        format!("console audit: {}", event)
    }
}

pub struct UserService {
    database: Arc<Database>,
    mailer: Arc<dyn Mailer>,
}

impl UserService {
    pub fn register(&self, email: &str) -> String {
        let stored = format!("stored {} in {}", email, self.database.connection_string);
        let mail = self.mailer.send(email, "welcome!");
        format!("{} / {}", stored, mail)
    }
}

pub struct UserModule;

impl Module for UserModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        // Any module may supply the mailer; assembly fails if none does.
        container.register_abstract::<dyn Mailer>();

        container.register::<UserService, _>(ObjectScope::Graph, |r| {
            Arc::new(UserService {
                database: r.resolve_required::<Database>(),
                mailer: r.resolve_required::<dyn Mailer>(),
            })
        });
        container.register_into_collection::<dyn AuditSink, _>(ObjectScope::Container, |_| Arc::new(DatabaseAudit));
        container.register_into_collection::<dyn AuditSink, _>(ObjectScope::Container, |_| Arc::new(ConsoleAudit));
        Ok(())
    }

    fn dependencies() -> Vec<ModuleType> {
        vec![ModuleType::of::<DatabaseModule>(), ModuleType::of::<SmtpModule>()]
    }
}

// ===== Request Module (circular pair) =====

pub struct Request;

pub struct RequestContext {
    pub id: u64,
    handler: Mutex<Option<Arc<RequestHandler>>>,
}

pub struct RequestHandler {
    context: Weak<RequestContext>,
    users: Arc<UserService>,
}

impl RequestHandler {
    pub fn handle(&self, email: &str) -> String {
        let id = self.context.upgrade().map_or(0, |context| context.id);
        format!("[request {}] {}", id, self.users.register(email))
    }
}

pub struct RequestModule {
    pub id: u64,
}

impl Module for RequestModule {
    fn assemble(&self, container: &Container) -> DiResult<()> {
        let id = self.id;
        container
            .register::<RequestContext, _>(ObjectScope::Container, move |_| {
                Arc::new(RequestContext { id, handler: Mutex::new(None) })
            })
            .init_completed(|r, context| {
                *context.handler.lock() = Some(r.resolve_required::<RequestHandler>());
            });
        container.register::<RequestHandler, _>(ObjectScope::Container, |r| {
            Arc::new(RequestHandler {
                context: Arc::downgrade(&r.resolve_required::<RequestContext>()),
                users: r.resolve_required::<UserService>(),
            })
        });
        Ok(())
    }

    fn dependencies() -> Vec<ModuleType> {
        vec![ModuleType::of::<UserModule>()]
    }

    fn resolver_scope() -> ResolverScope {
        ResolverScope::of::<Request>()
    }
}

fn main() -> DiResult<()> {
    println!("=== Module Assembly Example ===\n");

    let config = AssemblerConfig::from_env()?;
    println!("Override policy: {} (testing: {})", config.override_policy, config.testing);

    let app = ModuleAssembler::builder()
        .config(config)
        .module(UserModule)
        .on_duplicate(|key| println!("duplicate registration: {}", key))
        .try_build()?;

    println!("\n1. Module graph:");
    print!("{}", app.graph().describe());

    println!("\n2. Resolving services:");
    let users = app.try_resolve::<UserService>()?;
    println!("   {}", users.register("alice@example.com"));
    for sink in app.resolve_collection::<dyn AuditSink>().iter() {
        println!("   {}", sink.record("user registered"));
    }

    println!("\n3. Request-scoped child assemblers:");
    for id in 1..=2 {
        let request = ModuleAssembler::scoped::<Request>()
            .parent(&app)
            .module(RequestModule { id })
            .try_build()?;
        let context = request.try_resolve::<RequestContext>()?;
        let handler = context.handler.lock().clone();
        if let Some(handler) = handler {
            println!("   {}", handler.handle("bob@example.com"));
        }
        println!("   inherited modules: {:?}", request.graph().inherited());
    }

    println!("\n4. Weak resolver after release:");
    let weak = app.weak_resolver();
    drop(users);
    drop(app);
    match weak.try_resolve::<UserService>() {
        Ok(_) => println!("   still alive"),
        Err(err) => println!("   {}", err),
    }

    println!("\n=== Example completed successfully ===");
    Ok(())
}
