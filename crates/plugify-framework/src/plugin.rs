//! Plugin instances and their exported function tables.
//!
//! # Lifecycle
//!
//! ```text
//! Loader::load() ──► Loaded
//!   on_init()    ──► Initialized   (load function or deferred program bound)
//!   on_run()     ──► Running       (repeatable)
//!   upgrade()    ──► Initialized   (table and meta replaced, counters kept)
//!   on_destroy() ──► Destroyed     (terminal; table dropped)
//! ```
//!
//! Every operation that touches the function table takes the plugin's single
//! lock, so a run never observes a half-replaced table.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use parking_lot::{Mutex, RwLock};
use plugify_core::Value;
use serde::Serialize;
use tracing::debug;

use crate::component::PluginComponents;
use crate::error::{BoxError, PluginError, PluginResult};
use crate::meta::Meta;

/// Name of the machine running plugins, recorded on every run.
static HOST: Lazy<String> = Lazy::new(|| {
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
});

// ─── Function table ───────────────────────────────────────────────────────────

pub type LoadFn = Box<dyn FnMut(&PluginComponents) -> Result<(), BoxError> + Send + Sync>;
pub type RunFn = Box<dyn FnMut(Value) -> Result<Value, BoxError> + Send + Sync>;
pub type MethodFn = Arc<dyn Fn(Value) -> Value + Send + Sync>;
pub type DestroyFn = Box<dyn FnMut(Value) -> Result<(), BoxError> + Send + Sync>;

/// Functions a plugin exports to the host. Every entry is optional.
#[derive(Default)]
pub struct FunctionTable {
    pub load: Option<LoadFn>,
    pub run: Option<RunFn>,
    pub methods: HashMap<String, MethodFn>,
    pub destroy: Option<DestroyFn>,
}

impl FunctionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_load<F>(mut self, load: F) -> Self
    where
        F: FnMut(&PluginComponents) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.load = Some(Box::new(load));
        self
    }

    pub fn with_run<F>(mut self, run: F) -> Self
    where
        F: FnMut(Value) -> Result<Value, BoxError> + Send + Sync + 'static,
    {
        self.run = Some(Box::new(run));
        self
    }

    pub fn with_method<F>(mut self, name: impl Into<String>, method: F) -> Self
    where
        F: Fn(Value) -> Value + Send + Sync + 'static,
    {
        self.methods.insert(name.into(), Arc::new(method));
        self
    }

    pub fn with_destroy<F>(mut self, destroy: F) -> Self
    where
        F: FnMut(Value) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        self.destroy = Some(Box::new(destroy));
        self
    }

    /// Builds a table whose entries all delegate to one [`PluginFunc`].
    pub fn from_func<F: PluginFunc>(func: F) -> Self {
        let methods = func.methods();
        let shared = Arc::new(Mutex::new(func));
        let (load, run, destroy) = (shared.clone(), shared.clone(), shared);
        Self {
            load: Some(Box::new(move |components| load.lock().load(components))),
            run: Some(Box::new(move |input| run.lock().run(input))),
            methods,
            destroy: Some(Box::new(move |input| destroy.lock().destroy(input))),
        }
    }
}

impl fmt::Debug for FunctionTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&String> = self.methods.keys().collect();
        methods.sort();
        f.debug_struct("FunctionTable")
            .field("load", &self.load.is_some())
            .field("run", &self.run.is_some())
            .field("methods", &methods)
            .field("destroy", &self.destroy.is_some())
            .finish()
    }
}

/// Authoring trait for plugins written as a single stateful type.
///
/// ```rust,ignore
/// struct Greeter { greeting: String }
///
/// impl PluginFunc for Greeter {
///     fn run(&mut self, input: Value) -> Result<Value, BoxError> {
///         Ok(Value::from(format!("{} {}", self.greeting, input)))
///     }
/// }
///
/// let table = FunctionTable::from_func(Greeter { greeting: "hi".into() });
/// ```
pub trait PluginFunc: Send + 'static {
    fn load(&mut self, _components: &PluginComponents) -> Result<(), BoxError> {
        Ok(())
    }

    fn run(&mut self, input: Value) -> Result<Value, BoxError>;

    fn methods(&self) -> HashMap<String, MethodFn> {
        HashMap::new()
    }

    fn destroy(&mut self, _input: Value) -> Result<(), BoxError> {
        Ok(())
    }
}

/// A plugin body whose function table only exists once host components are
/// known, such as a script evaluated against an injected environment.
pub trait Program: Send + Sync {
    fn bind(&mut self, components: &PluginComponents) -> PluginResult<FunctionTable>;
}

// ─── Plugin ───────────────────────────────────────────────────────────────────

/// Lifecycle stage of a plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PluginStage {
    Loaded,
    Initialized,
    Running,
    Destroyed,
}

struct PluginState {
    meta: Meta,
    table: FunctionTable,
    program: Option<Box<dyn Program>>,
    stage: PluginStage,
    install_time: DateTime<Utc>,
    upgrade_time: Option<DateTime<Utc>>,
    last_run_time: Option<DateTime<Utc>>,
    run_count: u64,
    host: Option<String>,
}

/// A loaded plugin.
///
/// The id is fixed for the lifetime of the instance; everything else lives
/// behind one lock.
pub struct Plugin {
    id: String,
    state: RwLock<PluginState>,
}

impl Plugin {
    /// A plugin bound to an exported function table.
    pub fn new(meta: Meta, table: FunctionTable) -> Self {
        Self::with_parts(meta, table, None)
    }

    /// A plugin whose table is produced by `program` at [`on_init`](Self::on_init).
    pub fn deferred(meta: Meta, program: impl Program + 'static) -> Self {
        Self::with_parts(meta, FunctionTable::new(), Some(Box::new(program)))
    }

    fn with_parts(meta: Meta, table: FunctionTable, program: Option<Box<dyn Program>>) -> Self {
        Self {
            id: meta.id.clone(),
            state: RwLock::new(PluginState {
                meta,
                table,
                program,
                stage: PluginStage::Loaded,
                install_time: Utc::now(),
                upgrade_time: None,
                last_run_time: None,
                run_count: 0,
                host: None,
            }),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn meta(&self) -> Meta {
        self.state.read().meta.clone()
    }

    pub fn stage(&self) -> PluginStage {
        self.state.read().stage
    }

    pub fn install_time(&self) -> DateTime<Utc> {
        self.state.read().install_time
    }

    pub fn upgrade_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().upgrade_time
    }

    pub fn last_run_time(&self) -> Option<DateTime<Utc>> {
        self.state.read().last_run_time
    }

    pub fn run_count(&self) -> u64 {
        self.state.read().run_count
    }

    /// Host that executed the latest run.
    pub fn host(&self) -> Option<String> {
        self.state.read().host.clone()
    }

    /// Binds host dependencies.
    ///
    /// A deferred program is evaluated first; then the table's `load`
    /// function, if any, is called. Fails with
    /// [`PluginError::NoLoadMethod`] when neither exists.
    pub fn on_init(&self, components: &PluginComponents) -> PluginResult<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;

        let mut bound = false;
        if let Some(program) = state.program.as_mut() {
            state.table = program.bind(components)?;
            state.program = None;
            bound = true;
        }

        match state.table.load.as_mut() {
            Some(load) => load(components).map_err(PluginError::Plugin)?,
            None if !bound => return Err(PluginError::NoLoadMethod),
            None => {}
        }

        state.stage = PluginStage::Initialized;
        debug!(plugin = %self.id, table = ?state.table, "Plugin initialized");
        Ok(())
    }

    /// Invokes the bound `run` function.
    ///
    /// Runs are serialized with each other and with upgrades.
    pub fn on_run(&self, input: Value) -> PluginResult<Value> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        if state.stage == PluginStage::Destroyed {
            return Err(PluginError::Destroyed(self.id.clone()));
        }

        let run = state.table.run.as_mut().ok_or(PluginError::NoRunMethod)?;
        state.last_run_time = Some(Utc::now());
        state.run_count += 1;
        state.host = Some(HOST.clone());
        state.stage = PluginStage::Running;

        run(input).map_err(PluginError::Plugin)
    }

    /// Replaces meta and function table with those of an initialized
    /// `candidate`, keeping id, install time and counters.
    ///
    /// The previous table is dropped without calling its `destroy`. A
    /// destroyed plugin cannot be upgraded.
    pub fn upgrade(&self, candidate: Plugin) -> PluginResult<()> {
        let incoming = candidate.state.into_inner();
        let previous = {
            let mut state = self.state.write();
            if state.stage == PluginStage::Destroyed {
                return Err(PluginError::Destroyed(self.id.clone()));
            }
            state.meta = incoming.meta;
            state.program = incoming.program;
            state.upgrade_time = Some(Utc::now());
            state.stage = PluginStage::Initialized;
            std::mem::replace(&mut state.table, incoming.table)
        };
        drop(previous);
        Ok(())
    }

    /// Invokes the bound `destroy` function; a missing one is a no-op.
    ///
    /// The table is released afterwards, so later runs and method lookups
    /// find nothing. Destroying twice fails with [`PluginError::Destroyed`].
    pub fn on_destroy(&self, input: Value) -> PluginResult<()> {
        let mut state = self.state.write();
        if state.stage == PluginStage::Destroyed {
            return Err(PluginError::Destroyed(self.id.clone()));
        }
        let result = match state.table.destroy.as_mut() {
            Some(destroy) => destroy(input).map_err(PluginError::Plugin),
            None => Ok(()),
        };
        state.stage = PluginStage::Destroyed;
        state.program = None;
        let table = std::mem::take(&mut state.table);
        drop(state);
        drop(table);
        result
    }

    /// Looks up an exported method.
    pub fn method(&self, name: &str) -> Option<MethodFn> {
        self.state.read().table.methods.get(name).cloned()
    }

    /// Names of exported methods, sorted.
    pub fn method_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.state.read().table.methods.keys().cloned().collect();
        names.sort();
        names
    }

    pub fn summary(&self) -> PluginSummary {
        let state = self.state.read();
        PluginSummary {
            id: self.id.clone(),
            name: state.meta.name.clone(),
            description: state.meta.description.clone(),
            author: state.meta.author.clone(),
            version: state.meta.version.clone(),
            loader: state.meta.loader.clone(),
            stage: state.stage,
            install_time: state.install_time,
            upgrade_time: state.upgrade_time,
            last_run_time: state.last_run_time,
            run_count: state.run_count,
            host: state.host.clone(),
        }
    }
}

impl fmt::Debug for Plugin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Plugin")
            .field("id", &self.id)
            .field("stage", &state.stage)
            .field("table", &state.table)
            .field("run_count", &state.run_count)
            .finish_non_exhaustive()
    }
}

/// Listing entry for a plugin.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PluginSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub author: String,
    pub version: String,
    pub loader: String,
    pub stage: PluginStage,
    pub install_time: DateTime<Utc>,
    pub upgrade_time: Option<DateTime<Utc>>,
    pub last_run_time: Option<DateTime<Utc>>,
    pub run_count: u64,
    pub host: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::ComponentRegistry;
    use crate::logger::NoopLogger;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn components() -> PluginComponents {
        PluginComponents::new(Arc::new(NoopLogger), Arc::new(ComponentRegistry::new()))
    }

    fn echo_table(tag: &'static str) -> FunctionTable {
        FunctionTable::new()
            .with_load(|_| Ok(()))
            .with_run(move |input| Ok(Value::from(format!("{tag}:{input}"))))
            .with_method("tag", move |_| Value::from(tag))
    }

    struct Counter {
        loaded: bool,
        total: i64,
    }

    impl PluginFunc for Counter {
        fn load(&mut self, _components: &PluginComponents) -> Result<(), BoxError> {
            self.loaded = true;
            Ok(())
        }

        fn run(&mut self, input: Value) -> Result<Value, BoxError> {
            if !self.loaded {
                return Err("not loaded".into());
            }
            self.total += input.as_i64().ok_or("expected an integer")?;
            Ok(Value::Int(self.total))
        }
    }

    struct FixedProgram;

    impl Program for FixedProgram {
        fn bind(&mut self, _components: &PluginComponents) -> PluginResult<FunctionTable> {
            Ok(FunctionTable::new().with_run(|_| Ok(Value::from("bound"))))
        }
    }

    #[test]
    fn test_run_before_init_has_no_run_method() {
        let plugin = Plugin::deferred(Meta::new("p", "script"), FixedProgram);
        assert!(matches!(
            plugin.on_run(Value::Null),
            Err(PluginError::NoRunMethod)
        ));
        assert_eq!(plugin.run_count(), 0);
    }

    #[test]
    fn test_init_without_load_path() {
        let plugin = Plugin::new(Meta::new("p", "native"), FunctionTable::new());
        assert!(matches!(
            plugin.on_init(&components()),
            Err(PluginError::NoLoadMethod)
        ));
        assert_eq!(plugin.stage(), PluginStage::Loaded);
    }

    #[test]
    fn test_deferred_program_binds_on_init() {
        let plugin = Plugin::deferred(Meta::new("p", "script"), FixedProgram);
        plugin.on_init(&components()).unwrap();

        assert_eq!(plugin.on_run(Value::Null).unwrap(), Value::from("bound"));
        assert_eq!(plugin.stage(), PluginStage::Running);
        assert_eq!(plugin.run_count(), 1);
        assert!(plugin.host().is_some());
    }

    #[test]
    fn test_plugin_func_table() {
        let plugin = Plugin::new(
            Meta::new("counter", "native"),
            FunctionTable::from_func(Counter {
                loaded: false,
                total: 0,
            }),
        );
        plugin.on_init(&components()).unwrap();

        plugin.on_run(Value::Int(2)).unwrap();
        assert_eq!(plugin.on_run(Value::Int(3)).unwrap(), Value::Int(5));
        assert!(matches!(
            plugin.on_run(Value::from("x")),
            Err(PluginError::Plugin(_))
        ));
        assert_eq!(plugin.run_count(), 3);
    }

    #[test]
    fn test_upgrade_preserves_identity_and_counters() {
        let plugin = Plugin::new(Meta::new("p", "native").with_version("1"), echo_table("v1"));
        plugin.on_init(&components()).unwrap();
        plugin.on_run(Value::Int(1)).unwrap();
        let installed = plugin.install_time();

        let candidate = Plugin::new(Meta::new("p", "native").with_version("2"), echo_table("v2"));
        candidate.on_init(&components()).unwrap();
        plugin.upgrade(candidate).unwrap();

        assert_eq!(plugin.on_run(Value::Int(7)).unwrap(), Value::from("v2:7"));
        assert_eq!(plugin.run_count(), 2);
        assert_eq!(plugin.install_time(), installed);
        assert!(plugin.upgrade_time().is_some());
        assert_eq!(plugin.meta().version, "2");
        assert_eq!(plugin.method("tag").map(|m| m(Value::Null)), Some(Value::from("v2")));
    }

    #[test]
    fn test_destroy_is_optional() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let table = echo_table("x").with_destroy(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        let plugin = Plugin::new(Meta::new("p", "native"), table);
        plugin.on_destroy(Value::Null).unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(plugin.stage(), PluginStage::Destroyed);

        let bare = Plugin::new(Meta::new("q", "native"), FunctionTable::new());
        assert!(bare.on_destroy(Value::Null).is_ok());
    }

    #[test]
    fn test_destroyed_plugin_rejects_run_and_upgrade() {
        let plugin = Plugin::new(Meta::new("p", "native"), echo_table("v1"));
        plugin.on_init(&components()).unwrap();
        plugin.on_run(Value::Int(1)).unwrap();
        plugin.on_destroy(Value::Null).unwrap();

        assert!(matches!(
            plugin.on_run(Value::Int(2)),
            Err(PluginError::Destroyed(id)) if id == "p"
        ));
        assert_eq!(plugin.run_count(), 1);
        assert_eq!(plugin.stage(), PluginStage::Destroyed);
        assert!(plugin.method("tag").is_none());

        let candidate = Plugin::new(Meta::new("p", "native").with_version("2"), echo_table("v2"));
        candidate.on_init(&components()).unwrap();
        assert!(matches!(plugin.upgrade(candidate), Err(PluginError::Destroyed(_))));
        assert_eq!(plugin.stage(), PluginStage::Destroyed);
        assert!(plugin.upgrade_time().is_none());

        assert!(matches!(
            plugin.on_destroy(Value::Null),
            Err(PluginError::Destroyed(_))
        ));
    }

    #[test]
    fn test_summary() {
        let plugin = Plugin::new(
            Meta::new("p", "native").with_name("Echo").with_author("ops"),
            echo_table("x"),
        );
        let summary = plugin.summary();
        assert_eq!(summary.id, "p");
        assert_eq!(summary.name, "Echo");
        assert_eq!(summary.stage, PluginStage::Loaded);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["stage"], "loaded");
        assert_eq!(json["run_count"], 0);
    }
}
