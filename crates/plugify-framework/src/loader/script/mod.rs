//! Loader for Rhai script plugins.
//!
//! Loading only captures the source. Evaluation happens in
//! [`Plugin::on_init`](crate::plugin::Plugin::on_init), once the host
//! components are known and the symbol environment can be built.
//!
//! # Script contract
//!
//! ```rhai
//! // Required. `ctx` is `#{ id: "<plugin id>", input: <run input> }`.
//! fn Run(ctx) {
//!     #{ message: "hello" }
//! }
//!
//! // Optional: name -> function pointer, exposed as plugin methods.
//! fn Methods() {
//!     #{ double: |x| x * 2 }
//! }
//!
//! // Optional.
//! fn Destroy(input) {
//!     plugify::Logger.info("bye");
//! }
//! ```
//!
//! Injected components are called with `plugify::Users.invoke("find", [1])`
//! and type placeholders produce zero values with `plugify::ModelsUser.zero()`.
//!
//! Top-level statements run once at init. Script functions cannot see
//! top-level variables; each call starts from an empty scope.

mod dynamic;
mod handles;

use std::sync::Arc;

use plugify_core::Value;
use rhai::{CallFnOptions, Dynamic, Engine, EvalAltResult, FnPtr, FuncArgs, Map, Scope, AST};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use self::dynamic::{from_dynamic, to_dynamic};
use self::handles::{MODULE_NAME, environment_module, register_handles};
use super::Loader;
use crate::component::PluginComponents;
use crate::error::{PluginError, PluginResult};
use crate::injector::ComponentInjector;
use crate::meta::Meta;
use crate::plugin::{FunctionTable, MethodFn, Plugin, Program};
use crate::source::{PluginSource, read_plugin_content};

pub const SCRIPT_LOADER: &str = "script";

const RUN_FN: &str = "Run";
const METHODS_FN: &str = "Methods";
const DESTROY_FN: &str = "Destroy";

/// Sandbox limits applied to every script engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScriptLimits {
    /// Operations per call before the script is aborted.
    pub max_operations: u64,
    pub max_call_levels: usize,
    pub max_string_size: usize,
    pub max_array_size: usize,
    pub max_map_size: usize,
}

impl Default for ScriptLimits {
    fn default() -> Self {
        Self {
            max_operations: 1_000_000,
            max_call_levels: 64,
            max_string_size: 1 << 20,
            max_array_size: 10_000,
            max_map_size: 10_000,
        }
    }
}

impl ScriptLimits {
    fn apply(&self, engine: &mut Engine) {
        engine
            .set_max_operations(self.max_operations)
            .set_max_call_levels(self.max_call_levels)
            .set_max_string_size(self.max_string_size)
            .set_max_array_size(self.max_array_size)
            .set_max_map_size(self.max_map_size);
    }
}

/// Loader for `script` plugins.
#[derive(Debug, Clone, Default)]
pub struct ScriptLoader {
    limits: ScriptLimits,
}

impl ScriptLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_limits(mut self, limits: ScriptLimits) -> Self {
        self.limits = limits;
        self
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }
}

impl Loader for ScriptLoader {
    fn kind(&self) -> &str {
        SCRIPT_LOADER
    }

    fn load(&self, meta: Meta, source: &dyn PluginSource) -> PluginResult<Plugin> {
        let content = read_plugin_content(source)?;
        let text = String::from_utf8(content)
            .map_err(|_| PluginError::invalid_source("script is not valid UTF-8"))?;
        if text.trim().is_empty() {
            return Err(PluginError::invalid_source("script is blank"));
        }

        info!(plugin = %meta.id, loader = SCRIPT_LOADER, size = text.len(), "Script plugin loaded");
        let program = ScriptProgram {
            meta: meta.clone(),
            source: text,
            limits: self.limits,
        };
        Ok(Plugin::deferred(meta, program))
    }
}

// ─── Evaluation ───────────────────────────────────────────────────────────────

struct ScriptProgram {
    meta: Meta,
    source: String,
    limits: ScriptLimits,
}

impl Program for ScriptProgram {
    fn bind(&mut self, components: &PluginComponents) -> PluginResult<FunctionTable> {
        let env = ComponentInjector::new(components).inject(&self.meta);

        let mut engine = Engine::new();
        self.limits.apply(&mut engine);
        register_handles(&mut engine);
        engine.register_static_module(MODULE_NAME, environment_module(&env, &self.meta.id).into());

        let ast = engine.compile(&self.source).map_err(PluginError::script)?;
        let mut scope = Scope::new();
        engine
            .run_ast_with_scope(&mut scope, &ast)
            .map_err(PluginError::script)?;

        let script = Arc::new(Script {
            id: self.meta.id.clone(),
            engine,
            ast,
        });
        debug!(plugin = %script.id, symbols = ?env.keys().collect::<Vec<_>>(), "Script evaluated");
        script.function_table()
    }
}

/// An evaluated script shared by the functions of its table.
struct Script {
    id: String,
    engine: Engine,
    ast: AST,
}

impl Script {
    fn defines(&self, name: &str) -> bool {
        self.ast.iter_functions().any(|f| f.name == name)
    }

    fn call(&self, name: &str, args: impl FuncArgs) -> Result<Dynamic, Box<EvalAltResult>> {
        let mut scope = Scope::new();
        let options = CallFnOptions::new().eval_ast(false);
        self.engine
            .call_fn_with_options(options, &mut scope, &self.ast, name, args)
    }

    fn function_table(self: Arc<Self>) -> PluginResult<FunctionTable> {
        let mut table = FunctionTable::new();

        if self.defines(RUN_FN) {
            let script = self.clone();
            table = table.with_run(move |input| {
                let mut ctx = Map::new();
                ctx.insert("id".into(), Dynamic::from(script.id.clone()));
                ctx.insert("input".into(), to_dynamic(input));
                script
                    .call(RUN_FN, (Dynamic::from_map(ctx),))
                    .map(from_dynamic)
                    .map_err(|e| e.to_string().into())
            });
        }

        if self.defines(METHODS_FN) {
            let exported = self.call(METHODS_FN, ()).map_err(PluginError::script)?;
            let exported = exported.try_cast::<Map>().ok_or_else(|| {
                PluginError::script(format!("{METHODS_FN}() must return an object map"))
            })?;
            for (name, value) in exported {
                let Some(pointer) = value.try_cast::<FnPtr>() else {
                    warn!(plugin = %self.id, method = %name, "Method entry is not a function, skipping");
                    continue;
                };
                table.methods.insert(name.to_string(), self.method(name.to_string(), pointer));
            }
        }

        if self.defines(DESTROY_FN) {
            let script = self.clone();
            table = table.with_destroy(move |input| {
                script
                    .call(DESTROY_FN, (to_dynamic(input),))
                    .map(|_| ())
                    .map_err(|e| e.to_string().into())
            });
        }

        Ok(table)
    }

    /// Methods have no error channel: a failing call is logged and yields `Null`.
    fn method(self: &Arc<Self>, name: String, pointer: FnPtr) -> MethodFn {
        let script = self.clone();
        Arc::new(move |input: Value| {
            match pointer.call::<Dynamic>(&script.engine, &script.ast, (to_dynamic(input),)) {
                Ok(output) => from_dynamic(output),
                Err(e) => {
                    warn!(plugin = %script.id, method = %name, error = %e, "Script method failed");
                    Value::Null
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, ComponentRegistry};
    use crate::logger::LogLevel;
    use crate::logger::testing::MemoryLogger;
    use crate::plugin::PluginStage;
    use crate::source::MemorySource;
    use plugify_core::{Mapping, Reflect, reflect_methods};

    pub mod models {
        use plugify_core::Reflect;

        #[derive(Debug, Clone, Default, PartialEq, Reflect)]
        pub struct User {
            pub id: i64,
            pub name: String,
        }
    }

    #[derive(Debug, Default, Reflect)]
    pub struct Users {
        pub admin: models::User,
    }

    #[reflect_methods]
    impl Users {
        pub fn find(&self, id: i64) -> Option<models::User> {
            (id == 1).then(|| models::User {
                id,
                name: "ada".into(),
            })
        }

        pub fn rename(&self, user: models::User, name: &str) -> models::User {
            models::User {
                name: name.to_string(),
                ..user
            }
        }
    }

    fn components(logger: Arc<MemoryLogger>) -> PluginComponents {
        let registry = ComponentRegistry::new().with(Component::new("users", Users::default()));
        PluginComponents::new(logger, Arc::new(registry))
    }

    fn load(meta: Meta, script: &str) -> Plugin {
        ScriptLoader::new()
            .load(meta, &MemorySource::from_bytes(script))
            .unwrap()
    }

    fn init(plugin: &Plugin) -> Arc<MemoryLogger> {
        let logger = Arc::new(MemoryLogger::default());
        plugin.on_init(&components(logger.clone())).unwrap();
        logger
    }

    #[test]
    fn test_greet() {
        let plugin = load(
            Meta::new("greet", SCRIPT_LOADER),
            r#"fn Run(ctx) { #{ message: "hello" } }"#,
        );
        assert_eq!(plugin.stage(), PluginStage::Loaded);
        init(&plugin);

        let output = plugin.on_run(Value::Null).unwrap();
        assert_eq!(output, Value::Map(Mapping::new().with("message", "hello")));
        assert_eq!(plugin.run_count(), 1);
    }

    #[test]
    fn test_run_receives_ctx() {
        let plugin = load(
            Meta::new("echo", SCRIPT_LOADER),
            r#"
                fn greeting() { "hi " }
                fn Run(ctx) { greeting() + ctx.input.name + " from " + ctx.id }
            "#,
        );
        init(&plugin);

        let input = Value::Map(Mapping::new().with("name", "bob"));
        assert_eq!(plugin.on_run(input).unwrap(), Value::from("hi bob from echo"));
    }

    #[test]
    fn test_components_logger_and_util() {
        let plugin = load(
            Meta::new("lookup", SCRIPT_LOADER),
            r#"
                fn Run(ctx) {
                    let user = plugify::Users.invoke("find", [ctx.input]);
                    plugify::Logger.info("found " + plugify::Util.to_json(user));
                    plugify::Util.get_attr(user, "NAME")
                }
            "#,
        );
        let logger = init(&plugin);

        assert_eq!(plugin.on_run(Value::Int(1)).unwrap(), Value::from("ada"));
        let lines = logger.lines.lock();
        assert_eq!(
            lines[0],
            (
                LogLevel::Info,
                Some("lookup".to_string()),
                r#"found {"id":1,"name":"ada"}"#.to_string()
            )
        );
    }

    #[test]
    fn test_type_placeholders() {
        let meta = Meta::new("types", SCRIPT_LOADER)
            .with_component("", "users")
            .with_component(format!("{}::models", module_path!()), "User");
        let plugin = load(
            meta,
            r#"
                fn Run(ctx) {
                    let blank = plugify::ModelsUser.zero();
                    let shaped = plugify::Util.convert_to(#{ ID: 7, Name: "eve" }, plugify::ModelsUser);
                    plugify::Users.invoke("rename", [shaped, "mallory"]).name + ":" + blank.id
                }
            "#,
        );
        init(&plugin);

        assert_eq!(plugin.on_run(Value::Null).unwrap(), Value::from("mallory:0"));
    }

    #[test]
    fn test_manager_runs_script_with_components() {
        let logger = Arc::new(MemoryLogger::default());
        let manager = crate::manager::PluginManager::builder()
            .without_loaders()
            .with_loader(ScriptLoader::new())
            .with_shared_logger(logger.clone())
            .with_component(Component::new("users", Users::default()))
            .build();

        let meta = Meta::new("profile", SCRIPT_LOADER)
            .with_component("", "users")
            .with_component(format!("{}::models", module_path!()), "User");
        let script = r#"
            fn Run(ctx) {
                let user = plugify::Users.invoke("find", [ctx.input]);
                if type_of(user) == "()" { user = plugify::ModelsUser.zero(); }
                plugify::Logger.info("user " + user.name);
                plugify::Users.invoke("rename", [user, "grace"])
            }
        "#;
        manager.load(meta, &MemorySource::from_bytes(script)).unwrap();

        let found = manager.run("profile", Value::Int(1)).unwrap();
        assert_eq!(
            plugify_core::convert_into::<models::User>(found).unwrap(),
            models::User { id: 1, name: "grace".into() }
        );

        let blank = manager.run("profile", Value::Int(9)).unwrap();
        assert_eq!(
            plugify_core::convert_into::<models::User>(blank).unwrap(),
            models::User { id: 0, name: "grace".into() }
        );

        let lines = logger.lines.lock();
        assert_eq!(lines[0].2, "user ada");
        assert_eq!(lines[1].2, "user ");
        assert_eq!(manager.get("profile").unwrap().run_count(), 2);
    }

    #[test]
    fn test_methods_and_destroy() {
        let plugin = load(
            Meta::new("math", SCRIPT_LOADER),
            r#"
                fn double(x) { x * 2 }
                fn Run(ctx) { ctx.input }
                fn Methods() { #{ double: Fn("double"), bad: 1 } }
                fn Destroy(input) { plugify::Logger.warn("bye " + input) }
            "#,
        );
        let logger = init(&plugin);

        let double = plugin.method("double").unwrap();
        assert_eq!(double(Value::Int(21)), Value::Int(42));
        assert_eq!(double(Value::from("x")), Value::Null);
        assert!(plugin.method("bad").is_none());

        plugin.on_destroy(Value::from("now")).unwrap();
        let lines = logger.lines.lock();
        assert_eq!(lines.last().unwrap().2, "bye now");
    }

    #[test]
    fn test_missing_run_and_script_errors() {
        let plugin = load(Meta::new("idle", SCRIPT_LOADER), "let x = 1;");
        init(&plugin);
        assert!(matches!(plugin.on_run(Value::Null), Err(PluginError::NoRunMethod)));

        let broken = load(Meta::new("broken", SCRIPT_LOADER), "fn Run(ctx) {");
        let logger = Arc::new(MemoryLogger::default());
        assert!(matches!(
            broken.on_init(&components(logger)),
            Err(PluginError::Script(_))
        ));

        let throws = load(Meta::new("throws", SCRIPT_LOADER), r#"fn Run(ctx) { throw "nope" }"#);
        init(&throws);
        assert!(matches!(throws.on_run(Value::Null), Err(PluginError::Plugin(_))));
    }

    #[test]
    fn test_operation_limit() {
        let loader = ScriptLoader::new().with_limits(ScriptLimits {
            max_operations: 1_000,
            ..ScriptLimits::default()
        });
        let plugin = loader
            .load(
                Meta::new("spin", SCRIPT_LOADER),
                &MemorySource::from_bytes("fn Run(ctx) { loop {} }"),
            )
            .unwrap();
        init(&plugin);
        assert!(plugin.on_run(Value::Null).is_err());
    }

    #[test]
    fn test_invalid_sources() {
        let loader = ScriptLoader::new();
        assert!(matches!(
            loader.load(Meta::new("a", SCRIPT_LOADER), &MemorySource::from_bytes(vec![0xff, 0xfe])),
            Err(PluginError::InvalidLoaderSource(_))
        ));
        assert!(matches!(
            loader.load(Meta::new("b", SCRIPT_LOADER), &MemorySource::from_bytes("   \n")),
            Err(PluginError::InvalidLoaderSource(_))
        ));
    }
}
