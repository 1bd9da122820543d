//! Sandboxed execution of Lua health scripts
//!
//! Every run gets a fresh interpreter that is dropped on return, whatever
//! the outcome, so nothing leaks between resources or reconciliation passes.
//! The resource is bound to the read-only global `obj`, mirroring the
//! document's shape, and the script must return
//! `{ status = "...", message = "..." }`.
//!
//! Libraries:
//! - closed (default): base (without loaders or `print`), `table`, `string`,
//!   `math`, and an `os` reduced to `time`, `date` and `clock`
//! - open: every safe standard library, including `io`, `os` and `package`
//!
//! Runs are bounded by a wall-clock deadline, an instruction budget and a
//! heap limit. A VM hook aborts the script from inside once either time
//! bound is spent. Each run also has its own worker thread whose result the
//! caller waits for with a timeout, which covers time spent inside a single
//! library call where the hook never fires.

use super::error::EvaluationError;
use super::status::{HealthStatus, HealthStatusCode};
use crate::config::ScriptLimits;
use kube::core::DynamicObject;
use mlua::{HookTriggers, Lua, LuaOptions, LuaSerdeExt, SerializeOptions, StdLib, Value, VmState};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::warn;

/// Instructions between two budget checks
const HOOK_INSTRUCTION_STEP: u32 = 1_000;

/// Extra wait on top of the deadline before the watchdog gives up on a worker
pub const WATCHDOG_GRACE: Duration = Duration::from_millis(100);

/// Global the resource document is bound to
pub const INPUT_GLOBAL: &str = "obj";

/// Globals removed from the closed sandbox
const CLOSED_REMOVALS: [&str; 7] = [
    "dofile",
    "loadfile",
    "load",
    "require",
    "package",
    "collectgarbage",
    "print",
];

/// `os` functions kept in the closed sandbox
const SAFE_OS_FUNCTIONS: [&str; 3] = ["time", "date", "clock"];

const BUDGET_OK: u8 = 0;
const BUDGET_DEADLINE: u8 = 1;
const BUDGET_INSTRUCTIONS: u8 = 2;

/// Runs scripted health checks under fixed resource limits
///
/// Holds no interpreter state; safe to share across threads.
#[derive(Debug, Clone, Default)]
pub struct ScriptRuntime {
    limits: ScriptLimits,
}

impl ScriptRuntime {
    pub fn new(limits: ScriptLimits) -> Self {
        Self { limits }
    }

    pub fn limits(&self) -> &ScriptLimits {
        &self.limits
    }

    /// Run `source` against a resource
    pub fn run(
        &self,
        source: &str,
        obj: &DynamicObject,
        open_libraries: bool,
    ) -> Result<HealthStatus, EvaluationError> {
        let document = serde_json::to_value(obj)
            .map_err(|e| EvaluationError::ScriptRuntime(format!("failed to encode resource: {}", e)))?;
        self.run_document(source, &document, open_libraries)
    }

    /// Run `source` against an already-serialized resource document
    ///
    /// The script runs on its own worker thread. The VM hook stops ordinary
    /// Lua loops; a run stuck inside a single library call (a pathological
    /// `string.find` pattern) never reaches the hook, so the caller stops
    /// waiting once the deadline plus [`WATCHDOG_GRACE`] has passed and the
    /// worker is left to finish on its own.
    pub fn run_document(
        &self,
        source: &str,
        document: &serde_json::Value,
        open_libraries: bool,
    ) -> Result<HealthStatus, EvaluationError> {
        let runtime = self.clone();
        let source = source.to_string();
        let document = document.clone();
        let abandoned = Arc::new(AtomicBool::new(false));
        let worker_abandoned = abandoned.clone();
        let (tx, rx) = mpsc::sync_channel(1);

        thread::Builder::new()
            .name("health-script".to_string())
            .spawn(move || {
                let result =
                    runtime.run_sandboxed(&source, &document, open_libraries, &worker_abandoned);
                // The receiver is gone when the watchdog already gave up
                let _ = tx.send(result);
            })
            .map_err(|e| {
                EvaluationError::ScriptRuntime(format!("failed to start script worker: {}", e))
            })?;

        match rx.recv_timeout(self.limits.timeout + WATCHDOG_GRACE) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                abandoned.store(true, Ordering::SeqCst);
                warn!(
                    timeout = ?self.limits.timeout,
                    "Health script stuck outside the interpreter, abandoning its worker"
                );
                Err(self.deadline_exceeded())
            }
            Err(RecvTimeoutError::Disconnected) => Err(EvaluationError::ScriptRuntime(
                "script worker exited without a result".to_string(),
            )),
        }
    }

    fn run_sandboxed(
        &self,
        source: &str,
        document: &serde_json::Value,
        open_libraries: bool,
        abandoned: &Arc<AtomicBool>,
    ) -> Result<HealthStatus, EvaluationError> {
        let lua = self.sandbox(open_libraries)?;
        let budget = self.install_budget(&lua, abandoned.clone());

        let result = execute(&lua, source, document);

        match budget.load(Ordering::SeqCst) {
            BUDGET_DEADLINE => Err(self.deadline_exceeded()),
            BUDGET_INSTRUCTIONS => Err(EvaluationError::ScriptTimeout(format!(
                "budget of {} instructions",
                self.limits.max_instructions
            ))),
            _ => result,
        }
    }

    fn deadline_exceeded(&self) -> EvaluationError {
        EvaluationError::ScriptTimeout(format!("wall-clock budget of {:?}", self.limits.timeout))
    }

    fn sandbox(&self, open_libraries: bool) -> Result<Lua, EvaluationError> {
        let libs = if open_libraries {
            StdLib::ALL_SAFE
        } else {
            StdLib::TABLE | StdLib::STRING | StdLib::MATH | StdLib::OS
        };
        let lua = Lua::new_with(libs, LuaOptions::new()).map_err(runtime_error)?;
        lua.set_memory_limit(self.limits.memory_limit)
            .map_err(runtime_error)?;
        if !open_libraries {
            close_libraries(&lua).map_err(runtime_error)?;
        }
        Ok(lua)
    }

    /// Abort the script once the deadline or instruction budget is spent,
    /// or as soon as an abandoned run gets back into the interpreter
    ///
    /// The returned flag records which bound tripped, so the caller can tell
    /// a timeout apart from an ordinary script error.
    fn install_budget(&self, lua: &Lua, abandoned: Arc<AtomicBool>) -> Arc<AtomicU8> {
        let state = Arc::new(AtomicU8::new(BUDGET_OK));
        let deadline = Instant::now() + self.limits.timeout;
        let max_steps = (self.limits.max_instructions / u64::from(HOOK_INSTRUCTION_STEP)).max(1);
        let steps = AtomicU64::new(0);

        let hook_state = state.clone();
        lua.set_hook(
            HookTriggers::new().every_nth_instruction(HOOK_INSTRUCTION_STEP),
            move |_lua, _debug| {
                let tripped = if steps.fetch_add(1, Ordering::Relaxed) + 1 >= max_steps {
                    BUDGET_INSTRUCTIONS
                } else if Instant::now() >= deadline || abandoned.load(Ordering::Relaxed) {
                    BUDGET_DEADLINE
                } else {
                    return Ok(VmState::Continue);
                };
                hook_state.store(tripped, Ordering::SeqCst);
                Err(mlua::Error::runtime("health script execution budget exceeded"))
            },
        );
        state
    }
}

/// Strip the closed sandbox down to the safe core
fn close_libraries(lua: &Lua) -> mlua::Result<()> {
    let globals = lua.globals();
    for name in CLOSED_REMOVALS {
        globals.set(name, Value::Nil)?;
    }

    let os: mlua::Table = globals.get("os")?;
    let safe_os = lua.create_table()?;
    for name in SAFE_OS_FUNCTIONS {
        safe_os.set(name, os.get::<Value>(name)?)?;
    }
    globals.set("os", safe_os)
}

fn execute(
    lua: &Lua,
    source: &str,
    document: &serde_json::Value,
) -> Result<HealthStatus, EvaluationError> {
    // JSON null becomes nil so `obj.status ~= nil` checks behave
    let options = SerializeOptions::new()
        .serialize_none_to_null(false)
        .serialize_unit_to_null(false);
    let input = lua.to_value_with(document, options).map_err(runtime_error)?;
    let input = read_only(lua, input).map_err(runtime_error)?;
    lua.globals().set(INPUT_GLOBAL, input).map_err(runtime_error)?;

    let function = lua
        .load(source)
        .set_name("=health.lua")
        .into_function()
        .map_err(|e| EvaluationError::ScriptParse(lua_error_message(&e)))?;
    let returned: Value = function.call(()).map_err(runtime_error)?;

    decode_status(returned)
}

/// Wrap every table of the bound document in a read-only proxy
///
/// Reads, `#`, `ipairs` and `pairs` see the original fields; any assignment
/// raises an error. The proxies' metatables are locked.
fn read_only(lua: &Lua, value: Value) -> mlua::Result<Value> {
    let Value::Table(fields) = value else {
        return Ok(value);
    };

    let nested: Vec<(Value, Value)> = fields
        .clone()
        .pairs::<Value, Value>()
        .filter(|pair| matches!(pair, Ok((_, Value::Table(_))) | Err(_)))
        .collect::<mlua::Result<_>>()?;
    for (key, child) in nested {
        fields.raw_set(key, read_only(lua, child)?)?;
    }

    let next: mlua::Function = lua.globals().get("next")?;
    let meta = lua.create_table()?;
    meta.set("__index", fields.clone())?;
    meta.set(
        "__newindex",
        lua.create_function(|_, _: mlua::MultiValue| -> mlua::Result<()> {
            Err(mlua::Error::runtime(format!("{} is read-only", INPUT_GLOBAL)))
        })?,
    )?;
    let len_fields = fields.clone();
    meta.set(
        "__len",
        lua.create_function(move |_, _: mlua::MultiValue| Ok(len_fields.raw_len()))?,
    )?;
    meta.set(
        "__pairs",
        lua.create_function(move |_, _: mlua::MultiValue| {
            Ok((next.clone(), fields.clone(), Value::Nil))
        })?,
    )?;
    meta.set("__metatable", false)?;

    let proxy = lua.create_table()?;
    proxy.set_metatable(Some(meta));
    Ok(Value::Table(proxy))
}

/// Decode the `{status, message}` table a script returns
fn decode_status(returned: Value) -> Result<HealthStatus, EvaluationError> {
    let table = match returned {
        Value::Table(table) => table,
        Value::Nil => {
            return Err(EvaluationError::InvalidReturnShape(
                "script did not return a value".to_string(),
            ))
        }
        other => {
            return Err(EvaluationError::InvalidReturnShape(format!(
                "expected a table, got {}",
                other.type_name()
            )))
        }
    };

    let status = match table.get::<Value>("status").map_err(shape_error)? {
        Value::String(s) => s.to_str().map_err(shape_error)?.to_string(),
        Value::Nil => {
            return Err(EvaluationError::InvalidReturnShape(
                "missing status field".to_string(),
            ))
        }
        other => {
            return Err(EvaluationError::InvalidReturnShape(format!(
                "status must be a string, got {}",
                other.type_name()
            )))
        }
    };
    let code = status
        .parse::<HealthStatusCode>()
        .map_err(|e| EvaluationError::UnknownStatusLiteral(e.0))?;

    let message = match table.get::<Value>("message").map_err(shape_error)? {
        Value::String(s) => s.to_str().map_err(shape_error)?.to_string(),
        Value::Nil => String::new(),
        other => {
            return Err(EvaluationError::InvalidReturnShape(format!(
                "message must be a string, got {}",
                other.type_name()
            )))
        }
    };

    Ok(HealthStatus::new(code, message))
}

/// The innermost message of a Lua error, without callback tracebacks
fn lua_error_message(e: &mlua::Error) -> String {
    match e {
        mlua::Error::CallbackError { cause, .. } => lua_error_message(cause),
        mlua::Error::RuntimeError(message) => message.clone(),
        mlua::Error::SyntaxError { message, .. } => message.clone(),
        other => other.to_string(),
    }
}

fn runtime_error(e: mlua::Error) -> EvaluationError {
    EvaluationError::ScriptRuntime(lua_error_message(&e))
}

fn shape_error(e: mlua::Error) -> EvaluationError {
    EvaluationError::InvalidReturnShape(lua_error_message(&e))
}

#[cfg(test)]
#[path = "script_test.rs"]
mod tests;
