//! Plugin host integration tests
//! Run with: cargo test --test plugin_host_test

use async_trait::async_trait;
use serde_json::{json, Value};
use std::path::Path;
use std::sync::{Arc, Mutex, Once};

use atri::application::errors::{BotError, ConfigError, PluginError};
use atri::application::messaging::{Flow, MessageRegistration};
use atri::application::Bot;
use atri::domain::entities::{InboundEvent, MessageEvent, Segment};
use atri::domain::traits::{Dependencies, Plugin};
use atri::infrastructure::adapters::{MemoryTransport, SentMessage};
use atri::infrastructure::config::AtriConfig;
use atri::infrastructure::plugins::{LoadOutcome, PluginCatalog};
use atri::plugins::builtin_catalog;
use atri::Atri;

static INIT: Once = Once::new();

fn ensure_init() {
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

type InitLog = Arc<Mutex<Vec<String>>>;

struct TestPlugin {
    name: &'static str,
    version: &'static str,
    dependencies: Vec<(&'static str, &'static str)>,
    fail_init: bool,
    log: InitLog,
}

#[async_trait]
impl Plugin for TestPlugin {
    fn name(&self) -> &str {
        self.name
    }

    fn version(&self) -> &str {
        self.version
    }

    fn dependencies(&self) -> Dependencies {
        self.dependencies
            .iter()
            .map(|(name, range)| (name.to_string(), range.to_string()))
            .collect()
    }

    fn default_config(&self) -> Value {
        json!({ "greeting": "hello" })
    }

    async fn init(&mut self, _config: &Value) -> Result<(), BotError> {
        if self.fail_init {
            return Err(BotError::Internal(format!("{} refused to start", self.name)));
        }
        self.log.lock().unwrap().push(self.name.to_string());
        Ok(())
    }
}

struct Fixture {
    dir: tempfile::TempDir,
    catalog: PluginCatalog,
    log: InitLog,
}

impl Fixture {
    fn new() -> Self {
        ensure_init();
        Self {
            dir: tempfile::tempdir().unwrap(),
            catalog: builtin_catalog(),
            log: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn base(&self) -> &Path {
        self.dir.path()
    }

    /// Register a test plugin and write `<base>/plugins/<name>.yaml` for it
    fn plugin(
        mut self,
        name: &'static str,
        version: &'static str,
        dependencies: &[(&'static str, &'static str)],
    ) -> Self {
        self.register(name, version, dependencies, false);
        self
    }

    fn failing_plugin(mut self, name: &'static str) -> Self {
        self.register(name, "1.0.0", &[], true);
        self
    }

    fn register(&mut self, name: &'static str, version: &'static str, dependencies: &[(&'static str, &'static str)], fail_init: bool) {
        let dependencies = dependencies.to_vec();
        let log = self.log.clone();
        self.catalog.register(name, move |_bot: Arc<Bot>| -> Box<dyn Plugin> {
            Box::new(TestPlugin {
                name,
                version,
                dependencies: dependencies.clone(),
                fail_init,
                log: log.clone(),
            })
        });
        self.manifest(&format!("plugins/{}.yaml", name), &format!("export: {}\n", name));
    }

    fn manifest(&self, path: &str, content: &str) {
        let path = self.base().join(path);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    fn config(&self) -> AtriConfig {
        AtriConfig {
            base_dir: self.base().to_path_buf(),
            disable_banner: true,
            plugins: Vec::new(),
            ..AtriConfig::default()
        }
    }

    async fn host(&self) -> (Atri, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let atri = Atri::init(self.config(), transport.clone(), self.catalog.clone())
            .await
            .unwrap();
        (atri, transport)
    }

    fn initialized(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

fn loaded(atri: &Atri) -> Vec<String> {
    atri.loaded_plugins().map(|plugin| plugin.name().to_string()).collect()
}

fn assert_disjoint(atri: &Atri) {
    for name in atri.waiting_plugins().names() {
        assert!(!loaded(atri).contains(&name), "{} is both loaded and waiting", name);
    }
}

#[tokio::test]
async fn test_dependency_chain_resolves_when_root_loads() {
    let fixture = Fixture::new()
        .plugin("a", "1.0.0", &[("b", "^1.0.0")])
        .plugin("b", "1.2.0", &[("c", "^1.0.0")])
        .plugin("c", "1.0.3", &[]);
    let (mut atri, _) = fixture.host().await;

    assert!(matches!(atri.load_plugin("plugins/a").await, LoadOutcome::Pending(name) if name == "a"));
    assert!(matches!(atri.load_plugin("plugins/b").await, LoadOutcome::Pending(name) if name == "b"));
    assert_eq!(atri.waiting_plugins().names(), vec!["a", "b"]);
    assert_disjoint(&atri);

    assert!(matches!(atri.load_plugin("plugins/c").await, LoadOutcome::Loaded(name) if name == "c"));

    assert_eq!(fixture.initialized(), vec!["c", "b", "a"]);
    assert_eq!(loaded(&atri), vec!["help", "c", "b", "a"]);
    assert!(atri.waiting_plugins().is_empty());
    assert!(atri.check_waiting_plugins().is_ok());
}

#[tokio::test]
async fn test_redeferral_keeps_a_single_entry() {
    let fixture = Fixture::new().plugin("a", "1.0.0", &[("b", "^2.0.0")]).plugin("b", "1.0.0", &[]);
    let (mut atri, _) = fixture.host().await;

    atri.load_plugin("plugins/a").await;
    atri.load_plugin("plugins/a").await;
    assert_eq!(atri.waiting_plugins().len(), 1);

    // b loads but is too old for a
    assert!(matches!(atri.load_plugin("plugins/b").await, LoadOutcome::Loaded(_)));
    assert_eq!(atri.waiting_plugins().names(), vec!["a"]);
    assert_disjoint(&atri);

    match atri.check_waiting_plugins() {
        Err(BotError::UnresolvedDependencies(names)) => assert_eq!(names, vec!["a"]),
        other => panic!("expected unresolved dependencies, got {:?}", other),
    }
}

#[tokio::test]
async fn test_duplicate_load_is_a_no_op() {
    let fixture = Fixture::new().plugin("c", "1.0.0", &[]);
    let (mut atri, _) = fixture.host().await;

    assert!(matches!(atri.load_plugin("plugins/c").await, LoadOutcome::Loaded(_)));
    assert!(matches!(atri.load_plugin("plugins/c").await, LoadOutcome::AlreadyLoaded(name) if name == "c"));
    assert_eq!(fixture.initialized(), vec!["c"]);
}

#[tokio::test]
async fn test_batch_stops_on_failure_but_not_on_pending() {
    let fixture = Fixture::new()
        .plugin("a", "1.0.0", &[("c", "*")])
        .plugin("c", "1.0.0", &[])
        .plugin("d", "1.0.0", &[]);
    let (mut atri, _) = fixture.host().await;

    assert!(atri.load_plugins(["plugins/a", "plugins/c"]).await);
    assert!(!atri.load_plugins(["plugins/missing", "plugins/d"]).await);

    assert_eq!(loaded(&atri), vec!["help", "c", "a"]);
}

#[tokio::test]
async fn test_resolution_and_contract_failures() {
    let mut fixture = Fixture::new();
    fixture.manifest("plugins/noexport.yaml", "description: nothing to see\n");
    fixture.manifest("plugins/stranger.yaml", "export: nobody\n");
    fixture.manifest("plugins/broken/plugin.yaml", "export: broken\n");
    fixture.catalog.register("broken", |_bot: Arc<Bot>| -> Box<dyn Plugin> { panic!("constructor bug") });
    let (mut atri, _) = fixture.host().await;

    assert!(matches!(
        atri.load_plugin("plugins/missing").await,
        LoadOutcome::Failed(PluginError::NotFound(_))
    ));
    assert!(matches!(
        atri.load_plugin("plugins/noexport").await,
        LoadOutcome::Failed(PluginError::Contract(_))
    ));
    assert!(matches!(
        atri.load_plugin("plugins/stranger").await,
        LoadOutcome::Failed(PluginError::Contract(_))
    ));
    assert!(matches!(
        atri.load_plugin("plugins/broken").await,
        LoadOutcome::Failed(PluginError::Contract(_))
    ));
    assert_eq!(loaded(&atri), vec!["help"]);
}

#[tokio::test]
async fn test_config_and_init_failures() {
    let fixture = Fixture::new().plugin("c", "1.0.0", &[]).failing_plugin("grumpy");
    fixture.manifest("config/c.json", "{ not json");
    let (mut atri, _) = fixture.host().await;

    assert!(matches!(
        atri.load_plugin("plugins/c").await,
        LoadOutcome::Failed(PluginError::Config(ConfigError::Parse { .. }))
    ));
    assert!(matches!(
        atri.load_plugin("plugins/grumpy").await,
        LoadOutcome::Failed(PluginError::Init(_))
    ));
    assert_eq!(loaded(&atri), vec!["help"]);
    assert!(fixture.initialized().is_empty());
}

#[tokio::test]
async fn test_config_document_merges_file_values() {
    let fixture = Fixture::new().plugin("c", "1.0.0", &[]);
    fixture.manifest("config/c.json", r#"{"greeting": "hi", "extra": true}"#);
    let (mut atri, _) = fixture.host().await;

    atri.load_plugin("plugins/c").await;

    let plugin = atri.loaded_plugins().find(|plugin| plugin.name() == "c").unwrap();
    assert_eq!(plugin.config(), &json!({ "greeting": "hi", "extra": true }));
}

#[tokio::test]
async fn test_load_from_another_base_dir() {
    let fixture = Fixture::new().plugin("c", "1.0.0", &[]);
    let other = tempfile::tempdir().unwrap();
    std::fs::create_dir_all(other.path().join("c")).unwrap();
    std::fs::write(other.path().join("c/plugin.yaml"), "export: c\n").unwrap();
    let (mut atri, _) = fixture.host().await;

    assert!(matches!(atri.load_plugin_from("c", other.path()).await, LoadOutcome::Loaded(_)));
    // config documents stay under the host base dir
    assert!(fixture.base().join("config/c.json").is_file());
}

#[tokio::test]
async fn test_help_plugin_can_be_disabled() {
    let fixture = Fixture::new();
    let transport = Arc::new(MemoryTransport::new());
    let config = AtriConfig {
        disable_help_plugin: true,
        ..fixture.config()
    };

    let atri = Atri::init(config, transport, fixture.catalog.clone()).await.unwrap();

    assert!(loaded(&atri).is_empty());
}

#[tokio::test]
async fn test_invalid_config_is_rejected() {
    let fixture = Fixture::new();
    let config = AtriConfig {
        prefix: vec!["!!".to_string()],
        ..fixture.config()
    };

    let result = Atri::init(config, Arc::new(MemoryTransport::new()), fixture.catalog.clone()).await;

    assert!(matches!(result, Err(BotError::Config(ConfigError::InvalidValue(_)))));
}

#[tokio::test]
async fn test_run_dispatches_until_transport_closes() {
    let fixture = Fixture::new();
    fixture.manifest("plugins/ping.yaml", "export: ping\n");
    let (mut atri, transport) = fixture.host().await;
    assert!(matches!(atri.load_plugin("plugins/ping").await, LoadOutcome::Loaded(_)));

    let seen = Arc::new(Mutex::new(0));
    let counter = seen.clone();
    atri.bot().register(
        MessageRegistration::new("gate", |_ctx| async { Ok(Flow::Stop) })
            .with_priority(10)
            .with_end_point("message.group"),
    );
    atri.bot().register(MessageRegistration::new("counter", move |_ctx| {
        let counter = counter.clone();
        async move {
            *counter.lock().unwrap() += 1;
            Ok(Flow::Continue)
        }
    }));

    transport
        .push(InboundEvent::Message(MessageEvent::group(1, 10, 2, "/ping hi")))
        .await
        .unwrap();
    transport
        .push(InboundEvent::Message(MessageEvent::private(2, 2, "/ping")))
        .await
        .unwrap();
    transport.close();

    atri.run().await.unwrap();

    // the group message stopped at the gate, the private one did not
    assert_eq!(*seen.lock().unwrap(), 1);
    let replies: Vec<String> = transport
        .sent()
        .iter()
        .map(|sent| match sent {
            SentMessage::Group { message, .. } | SentMessage::Private { message, .. } => Segment::plain_text(message),
            other => panic!("unexpected {:?}", other),
        })
        .collect();
    assert_eq!(replies, vec!["hi", "pong"]);
}
