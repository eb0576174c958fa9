//! Host handles registered with the script engine and the `plugify` module
//! that exposes a [`SymbolEnvironment`] to scripts.
//!
//! ```rhai
//! fn Run(ctx) {
//!     let user = plugify::Users.invoke("find", [ctx.input.id]);
//!     plugify::Logger.info("found " + plugify::Util.to_json(user));
//!     plugify::Util.convert_to(user, plugify::ModelsUser)
//! }
//! ```

use std::fmt;
use std::sync::Arc;

use plugify_core::Value;
use rhai::{Array, Dynamic, Engine, EvalAltResult, Module, Position};

use super::dynamic::{from_dynamic, string, to_array, to_dynamic};
use crate::component::Component;
use crate::injector::{Symbol, SymbolEnvironment, TypePlaceholder};
use crate::logger::{LogContext, LogLevel, Logger};
use crate::util::Util;

/// Name of the static module carrying the symbol environment.
pub(crate) const MODULE_NAME: &str = "plugify";

type ScriptResult<T> = Result<T, Box<EvalAltResult>>;

fn runtime_error(message: impl fmt::Display) -> Box<EvalAltResult> {
    EvalAltResult::ErrorRuntime(string(message.to_string()), Position::NONE).into()
}

/// Results are unwrapped when there is exactly one.
fn results(mut values: Vec<Value>) -> Dynamic {
    match values.len() {
        0 => Dynamic::UNIT,
        1 => to_dynamic(values.remove(0)),
        _ => Dynamic::from_array(to_array(values)),
    }
}

// ─── Handles ──────────────────────────────────────────────────────────────────

#[derive(Clone)]
pub(crate) struct ComponentHandle(Component);

impl ComponentHandle {
    pub(crate) fn snapshot(&self) -> Value {
        self.0.service().snapshot()
    }

    fn invoke(&self, method: &str, args: Array) -> ScriptResult<Dynamic> {
        let args = args.into_iter().map(from_dynamic).collect();
        self.0.call(method, args).map(results).map_err(runtime_error)
    }
}

#[derive(Clone)]
pub(crate) struct UtilHandle(Util);

#[derive(Clone)]
pub(crate) struct LoggerHandle {
    logger: Arc<dyn Logger>,
    context: LogContext,
}

impl LoggerHandle {
    fn log(&self, level: LogLevel, message: &str) {
        self.logger.log(level, Some(&self.context), message);
    }
}

#[derive(Clone)]
pub(crate) struct TypeToken(TypePlaceholder);

impl TypeToken {
    pub(crate) fn zero_value(&self) -> Value {
        self.0.zero_value()
    }
}

// ─── Registration ─────────────────────────────────────────────────────────────

/// Registers the handle types and their script-visible functions.
pub(crate) fn register_handles(engine: &mut Engine) {
    engine
        .register_type_with_name::<ComponentHandle>("Component")
        .register_get("name", |h: &mut ComponentHandle| h.0.name().to_string())
        .register_get("value", |h: &mut ComponentHandle| to_dynamic(h.snapshot()))
        .register_fn("methods", |h: &mut ComponentHandle| -> Array {
            h.0.service()
                .methods()
                .into_iter()
                .map(|method| string(method.name))
                .collect()
        })
        .register_fn("invoke", |h: &mut ComponentHandle, method: &str| {
            h.invoke(method, Array::new())
        })
        .register_fn("invoke", |h: &mut ComponentHandle, method: &str, args: Array| {
            h.invoke(method, args)
        });

    engine
        .register_type_with_name::<UtilHandle>("Util")
        .register_fn("to_json", |u: &mut UtilHandle, value: Dynamic| {
            u.0.to_json(&from_dynamic(value))
        })
        .register_fn(
            "from_json",
            |u: &mut UtilHandle, text: &str| -> ScriptResult<Dynamic> {
                u.0.from_json(text).map(to_dynamic).map_err(runtime_error)
            },
        )
        .register_fn("get_attr", |u: &mut UtilHandle, value: Dynamic, name: &str| {
            u.0.get_attr(&from_dynamic(value), name)
                .map(to_dynamic)
                .unwrap_or(Dynamic::UNIT)
        })
        .register_fn(
            "convert_to",
            |u: &mut UtilHandle, value: Dynamic, target: TypeToken| -> ScriptResult<Dynamic> {
                u.0.convert_to(from_dynamic(value), &target.0.type_info())
                    .map(to_dynamic)
                    .map_err(runtime_error)
            },
        )
        .register_fn(
            "call_method",
            |u: &mut UtilHandle, target: ComponentHandle, method: &str, args: Array| {
                let args = args.into_iter().map(from_dynamic).collect();
                u.0.call_method(target.0.service().as_ref(), method, args)
                    .map(results)
                    .map_err(runtime_error)
            },
        );

    engine
        .register_type_with_name::<LoggerHandle>("Logger")
        .register_fn("debug", |l: &mut LoggerHandle, m: &str| l.log(LogLevel::Debug, m))
        .register_fn("info", |l: &mut LoggerHandle, m: &str| l.log(LogLevel::Info, m))
        .register_fn("warn", |l: &mut LoggerHandle, m: &str| l.log(LogLevel::Warn, m))
        .register_fn("error", |l: &mut LoggerHandle, m: &str| l.log(LogLevel::Error, m));

    engine
        .register_type_with_name::<TypeToken>("Type")
        .register_get("name", |t: &mut TypeToken| t.0.info().qualified_name())
        .register_fn("zero", |t: &mut TypeToken| to_dynamic(t.zero_value()));
}

/// Builds the `plugify` module from an injected environment.
pub(crate) fn environment_module(env: &SymbolEnvironment, plugin: &str) -> Module {
    let mut module = Module::new();
    for (key, symbol) in env.iter() {
        match symbol {
            Symbol::Util(util) => {
                module.set_var(key, UtilHandle(*util));
            }
            Symbol::Logger(logger) => {
                module.set_var(
                    key,
                    LoggerHandle {
                        logger: logger.clone(),
                        context: LogContext::plugin(plugin).with_stage("script"),
                    },
                );
            }
            Symbol::Component(component) => {
                module.set_var(key, ComponentHandle(component.clone()));
            }
            Symbol::Type(placeholder) => {
                module.set_var(key, TypeToken(placeholder.clone()));
            }
        }
    }
    module
}
