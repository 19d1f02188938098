//! Sandboxed Lua 5.4 runtime for tagger scripts.
//!
//! Tagger scripts run inside a VM with the dangerous parts of the standard
//! library removed and a small set of host modules registered.
//!
//! # Host APIs
//!
//! | Module | Functions |
//! |--------|-----------|
//! | `json` | `parse`, `encode` |
//! | `env` | `get` |
//! | `log` | `info`, `warn`, `error`, `debug` |
//!
//! Log calls are routed to `tracing` with the script name attached, so they
//! obey the same `RUST_LOG` filter as the rest of the binary.
//!
//! # Sandboxing
//!
//! `os`, `io`, `debug`, `loadfile` and `dofile` are removed. Scripts cannot
//! touch the filesystem, spawn processes, or reach the network.

use mlua::prelude::*;
use std::time::{Duration, Instant};

/// Instructions between deadline checks.
const HOOK_INTERVAL: u32 = 10_000;

/// Sandbox the globals and register every host module.
pub(crate) fn register_host_apis(lua: &Lua, script_name: &str) -> LuaResult<()> {
    sandbox_globals(lua)?;
    register_json_api(lua)?;
    register_env_api(lua)?;
    register_log_api(lua, script_name)?;
    Ok(())
}

/// Abort any Lua execution that runs past `timeout` from now.
///
/// Replaces a previously installed deadline, so call it before each entry
/// into the script.
pub(crate) fn set_deadline(lua: &Lua, timeout: Duration) {
    let deadline = Instant::now() + timeout;
    lua.set_hook(
        mlua::HookTriggers::new().every_nth_instruction(HOOK_INTERVAL),
        move |_lua, _debug| {
            if Instant::now() > deadline {
                Err(mlua::Error::RuntimeError(format!(
                    "script timed out after {:.1} seconds",
                    timeout.as_secs_f64()
                )))
            } else {
                Ok(mlua::VmState::Continue)
            }
        },
    );
}

// ═══════════════════════════════════════════════════════════════════════
// Sandboxing
// ═══════════════════════════════════════════════════════════════════════

/// Remove dangerous standard library functions from the Lua globals.
pub(crate) fn sandbox_globals(lua: &Lua) -> LuaResult<()> {
    let globals = lua.globals();
    globals.set("os", LuaValue::Nil)?;
    globals.set("io", LuaValue::Nil)?;
    globals.set("loadfile", LuaValue::Nil)?;
    globals.set("dofile", LuaValue::Nil)?;
    globals.set("debug", LuaValue::Nil)?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Host API: json
// ═══════════════════════════════════════════════════════════════════════

fn register_json_api(lua: &Lua) -> LuaResult<()> {
    let json_table = lua.create_table()?;

    json_table.set(
        "parse",
        lua.create_function(|lua, s: String| {
            let value: serde_json::Value = serde_json::from_str(&s)
                .map_err(|e| mlua::Error::external(anyhow::anyhow!("json.parse: {}", e)))?;
            json_value_to_lua(lua, &value)
        })?,
    )?;

    json_table.set(
        "encode",
        lua.create_function(|_lua, value: LuaValue| {
            let json = lua_value_to_json(value)?;
            serde_json::to_string(&json)
                .map_err(|e| mlua::Error::external(anyhow::anyhow!("json.encode: {}", e)))
        })?,
    )?;

    lua.globals().set("json", json_table)?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Host API: env
// ═══════════════════════════════════════════════════════════════════════

fn register_env_api(lua: &Lua) -> LuaResult<()> {
    let env = lua.create_table()?;

    env.set(
        "get",
        lua.create_function(|_lua, name: String| Ok(std::env::var(&name).ok()))?,
    )?;

    lua.globals().set("env", env)?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Host API: log
// ═══════════════════════════════════════════════════════════════════════

fn register_log_api(lua: &Lua, script_name: &str) -> LuaResult<()> {
    let log = lua.create_table()?;

    let n = script_name.to_string();
    log.set(
        "info",
        lua.create_function(move |_lua, msg: String| {
            tracing::info!(script = %n, "{}", msg);
            Ok(())
        })?,
    )?;

    let n = script_name.to_string();
    log.set(
        "warn",
        lua.create_function(move |_lua, msg: String| {
            tracing::warn!(script = %n, "{}", msg);
            Ok(())
        })?,
    )?;

    let n = script_name.to_string();
    log.set(
        "error",
        lua.create_function(move |_lua, msg: String| {
            tracing::error!(script = %n, "{}", msg);
            Ok(())
        })?,
    )?;

    let n = script_name.to_string();
    log.set(
        "debug",
        lua.create_function(move |_lua, msg: String| {
            tracing::debug!(script = %n, "{}", msg);
            Ok(())
        })?,
    )?;

    lua.globals().set("log", log)?;
    Ok(())
}

// ═══════════════════════════════════════════════════════════════════════
// Value conversion
// ═══════════════════════════════════════════════════════════════════════

/// Convert a JSON value to a Lua value.
pub(crate) fn json_value_to_lua(lua: &Lua, value: &serde_json::Value) -> LuaResult<LuaValue> {
    match value {
        serde_json::Value::Null => Ok(LuaValue::Nil),
        serde_json::Value::Bool(b) => Ok(LuaValue::Boolean(*b)),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(LuaValue::Integer(i))
            } else {
                Ok(LuaValue::Number(n.as_f64().unwrap_or(0.0)))
            }
        }
        serde_json::Value::String(s) => lua.create_string(s).map(LuaValue::String),
        serde_json::Value::Array(arr) => {
            let table = lua.create_table()?;
            for (i, v) in arr.iter().enumerate() {
                table.set(i as i64 + 1, json_value_to_lua(lua, v)?)?;
            }
            Ok(LuaValue::Table(table))
        }
        serde_json::Value::Object(map) => {
            let table = lua.create_table()?;
            for (k, v) in map {
                table.set(k.as_str(), json_value_to_lua(lua, v)?)?;
            }
            Ok(LuaValue::Table(table))
        }
    }
}

/// Convert a Lua value to a JSON value.
pub(crate) fn lua_value_to_json(value: LuaValue) -> LuaResult<serde_json::Value> {
    match value {
        LuaValue::Nil => Ok(serde_json::Value::Null),
        LuaValue::Boolean(b) => Ok(serde_json::Value::Bool(b)),
        LuaValue::Integer(i) => Ok(serde_json::Value::Number(i.into())),
        LuaValue::Number(n) => Ok(serde_json::Number::from_f64(n)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null)),
        LuaValue::String(s) => Ok(serde_json::Value::String(s.to_str()?.to_string())),
        LuaValue::Table(t) => {
            // Non-empty sequence → array, anything else → object.
            let len = t.raw_len();
            if len > 0 {
                let mut arr = Vec::new();
                for i in 1..=len {
                    let v: LuaValue = t.raw_get(i)?;
                    arr.push(lua_value_to_json(v)?);
                }
                Ok(serde_json::Value::Array(arr))
            } else {
                let mut map = serde_json::Map::new();
                for pair in t.pairs::<String, LuaValue>() {
                    let (k, v) = pair?;
                    map.insert(k, lua_value_to_json(v)?);
                }
                Ok(serde_json::Value::Object(map))
            }
        }
        _ => Ok(serde_json::Value::Null),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm() -> Lua {
        let lua = Lua::new();
        register_host_apis(&lua, "test").unwrap();
        lua
    }

    #[test]
    fn test_dangerous_globals_removed() {
        let lua = vm();
        for name in ["os", "io", "debug", "loadfile", "dofile"] {
            let value: LuaValue = lua.globals().get(name).unwrap();
            assert!(value.is_nil(), "{} should be removed", name);
        }
        // Plain string and table libraries stay available.
        let upper: String = lua.load(r#"return string.upper("ok")"#).eval().unwrap();
        assert_eq!(upper, "OK");
    }

    #[test]
    fn test_json_round_trip_in_lua() {
        let lua = vm();
        let encoded: String = lua
            .load(r#"return json.encode(json.parse('{"tags":["a","b"]}'))"#)
            .eval()
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&encoded).unwrap();
        assert_eq!(value, serde_json::json!({"tags": ["a", "b"]}));
    }

    #[test]
    fn test_log_calls_succeed() {
        let lua = vm();
        lua.load(r#"log.info("hi"); log.warn("w"); log.error("e"); log.debug("d")"#)
            .exec()
            .unwrap();
    }

    #[test]
    fn test_deadline_stops_runaway_script() {
        let lua = vm();
        set_deadline(&lua, Duration::from_millis(50));
        let err = lua.load("while true do end").exec().unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }
}
