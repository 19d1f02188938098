//! Lua tagging hook.
//!
//! A tagger script defines a global `tagger` table with a `tag` function:
//!
//! ```lua
//! tagger = { name = "work" }
//!
//! function tagger.tag(text, url, context)
//!     if url:find("jira") then
//!         return { "Work" }
//!     end
//!     return {}
//! end
//! ```
//!
//! The function receives the classification text, the visit URL and a
//! context table, and returns a list of tag names (or `nil`). Non-string
//! entries are ignored. Each call runs under the configured timeout.
//!
//! One VM is created per script and reused for every entry, so script-level
//! state (lookup tables built at load time, for example) survives between
//! calls.

use anyhow::{bail, Context, Result};
use mlua::prelude::*;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use crate::classify::Classifier;
use crate::config::{expand_home, TaggerConfig};
use crate::lua_runtime::{register_host_apis, set_deadline};
use crate::traits::Tagger;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// A [`Tagger`] backed by a Lua script.
pub struct LuaTagger {
    name: String,
    script_path: PathBuf,
    timeout: Duration,
    lua: Mutex<Lua>,
}

impl std::fmt::Debug for LuaTagger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LuaTagger")
            .field("name", &self.name)
            .field("script_path", &self.script_path)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl LuaTagger {
    /// Load and execute a tagger script.
    ///
    /// Fails if the script cannot be read, raises an error while loading,
    /// or does not define `tagger.tag`.
    pub fn load(path: &Path, timeout: Duration) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read tagger script: {}", path.display()))?;

        let fallback_name = path
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "tagger".to_string());

        let lua = Lua::new();
        register_host_apis(&lua, &format!("tagger:{}", fallback_name))?;

        set_deadline(&lua, timeout);
        lua.load(&source)
            .set_name(path.to_string_lossy())
            .exec()
            .map_err(|e| {
                anyhow::anyhow!("Failed to execute tagger script {}: {}", path.display(), e)
            })?;

        let table: LuaTable = lua
            .globals()
            .get::<LuaTable>("tagger")
            .map_err(|e| anyhow::anyhow!("Script must define a global 'tagger' table: {}", e))?;
        table
            .get::<LuaFunction>("tag")
            .map_err(|e| anyhow::anyhow!("tagger.tag function not defined: {}", e))?;

        let name = table
            .get::<Option<String>>("name")
            .ok()
            .flatten()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(fallback_name);

        Ok(Self {
            name,
            script_path: path.to_path_buf(),
            timeout,
            lua: Mutex::new(lua),
        })
    }

    /// Load the script named in the `[tagger]` config section.
    pub fn from_config(config: &TaggerConfig) -> Result<Self> {
        Self::load(
            &expand_home(&config.script),
            Duration::from_secs(config.timeout_secs),
        )
    }

    pub fn script_path(&self) -> &Path {
        &self.script_path
    }

    fn call(&self, text: &str, url: &str, context: &HashMap<String, String>) -> Result<Vec<String>> {
        let lua = self
            .lua
            .lock()
            .map_err(|_| anyhow::anyhow!("tagger '{}' is poisoned by an earlier panic", self.name))?;

        let table: LuaTable = lua.globals().get::<LuaTable>("tagger")?;
        let tag: LuaFunction = table
            .get::<LuaFunction>("tag")
            .map_err(|e| anyhow::anyhow!("tagger.tag function not defined: {}", e))?;

        let ctx = lua.create_table()?;
        for (k, v) in context {
            ctx.set(k.as_str(), v.as_str())?;
        }

        set_deadline(&lua, self.timeout);
        let result: LuaValue = tag
            .call::<LuaValue>((text, url, ctx))
            .map_err(|e| anyhow::anyhow!("tagger.tag() failed in '{}': {}", self.name, e))?;

        collect_tags(result)
    }
}

impl Tagger for LuaTagger {
    fn name(&self) -> &str {
        &self.name
    }

    fn tags(
        &self,
        text: &str,
        url: &str,
        context: &HashMap<String, String>,
    ) -> Result<Vec<String>> {
        self.call(text, url, context)
    }
}

/// Keep the string entries of a returned sequence.
fn collect_tags(value: LuaValue) -> Result<Vec<String>> {
    match value {
        LuaValue::Nil => Ok(Vec::new()),
        LuaValue::Table(t) => {
            let mut tags = Vec::new();
            for item in t.sequence_values::<LuaValue>() {
                if let LuaValue::String(s) = item? {
                    tags.push(s.to_str()?.to_string());
                }
            }
            Ok(tags)
        }
        other => bail!(
            "tagger.tag() must return a table or nil, got {}",
            other.type_name()
        ),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// CLI Commands
// ═══════════════════════════════════════════════════════════════════════

/// Scaffold a new tagger script from a template.
///
/// Creates `taggers/<name>.lua` with a commented template showing the
/// tagger interface and available host APIs.
pub fn scaffold_tagger(name: &str) -> Result<PathBuf> {
    let dir = Path::new("taggers");
    std::fs::create_dir_all(dir)?;

    let filename = format!("{}.lua", name.replace('_', "-"));
    let path = dir.join(&filename);

    if path.exists() {
        bail!("Tagger script already exists: {}", path.display());
    }

    let template = format!(
        r#"--[[
  History Digest tagger: {name}

  Configuration (add to config/hdigest.toml):

    [tagger]
    script = "taggers/{filename}"
    timeout_secs = 5

  Test:
    hdigest tagger test taggers/{filename} "some page title" --url https://example.com

  Host APIs: log.info/warn/error/debug, env.get, json.parse/encode
]]

tagger = {{
    name = "{name}",
}}

--- Return extra tags for one history entry.
--- @param text string Page title, or the search query for search URLs
--- @param url string Visit URL
--- @param context table Extra information (currently empty)
--- @return table|nil List of tag names
function tagger.tag(text, url, context)
    local tags = {{}}
    if string.find(string.lower(url), "example.com", 1, true) then
        table.insert(tags, "Example")
    end
    return tags
end
"#,
        name = name,
        filename = filename,
    );

    std::fs::write(&path, template)?;
    println!("Created tagger: {}", path.display());
    println!();
    println!("Add to your config/hdigest.toml:");
    println!();
    println!("  [tagger]");
    println!("  script = \"taggers/{}\"", filename);
    println!();
    println!("Then test:");
    println!();
    println!(
        "  hdigest tagger test taggers/{} \"hello\" --url https://example.com",
        filename
    );

    Ok(path)
}

/// Run a tagger script once and print what it and the full classifier
/// produce for the given input.
pub fn test_tagger(path: &Path, text: &str, url: &str, timeout: Option<u64>) -> Result<()> {
    let timeout = timeout.map(Duration::from_secs).unwrap_or(DEFAULT_TIMEOUT);

    println!("Testing tagger: {}", path.display());
    let tagger = LuaTagger::load(path, timeout)?;
    println!("  ✓ Script loaded ({})", tagger.name());

    let tags = tagger.tags(text, url, &HashMap::new())?;
    println!("  ✓ tagger.tag() returned {} tag(s)", tags.len());
    println!();
    println!("Script tags:");
    for tag in &tags {
        println!("  {}", tag);
    }

    let classifier = Classifier::default().with_tagger(Box::new(tagger));
    println!();
    println!("Combined tags:");
    for tag in classifier.classify_tags(text, url) {
        println!("  {}", tag);
    }

    Ok(())
}
