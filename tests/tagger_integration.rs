use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;

use history_digest::classify::Classifier;
use history_digest::config::TaggerConfig;
use history_digest::tagger::LuaTagger;

fn write_script(dir: &TempDir, name: &str, body: &str) -> PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_script_tags_merge_with_builtin_tags() {
    let tmp = TempDir::new().unwrap();
    let path = write_script(
        &tmp,
        "work.lua",
        r#"
local projects = { "atlas", "zephyr" }

tagger = { name = "work" }

function tagger.tag(text, url, context)
    local tags = {}
    local lower = string.lower(text)
    for _, p in ipairs(projects) do
        if string.find(lower, p, 1, true) then
            table.insert(tags, "Project:" .. p)
        end
    end
    log.debug("tagged " .. url)
    return tags
end
"#,
    );

    let tagger = LuaTagger::from_config(&TaggerConfig {
        script: path,
        timeout_secs: 5,
    })
    .unwrap();
    let classifier = Classifier::default().with_tagger(Box::new(tagger));

    let result = classifier.classify_visit(
        "Atlas API docs",
        "https://wiki.corp/atlas",
    );
    assert_eq!(result.tags, vec!["Project:atlas", "Reference"]);
}

#[test]
fn test_failing_script_contributes_nothing() {
    let tmp = TempDir::new().unwrap();
    let path = write_script(
        &tmp,
        "broken.lua",
        r#"
tagger = {}
function tagger.tag(text, url, context)
    error("lookup service down")
end
"#,
    );

    let tagger = LuaTagger::load(&path, Duration::from_secs(5)).unwrap();
    let classifier = Classifier::default().with_tagger(Box::new(tagger));

    let result = classifier.classify_visit("Python tutorial", "https://example.org/");
    assert_eq!(result.topic, "Coding");
    assert_eq!(result.tags, vec!["Programming"]);
}

#[test]
fn test_slow_script_is_cut_off() {
    let tmp = TempDir::new().unwrap();
    let path = write_script(
        &tmp,
        "slow.lua",
        r#"
tagger = {}
function tagger.tag(text, url, context)
    local n = 0
    while true do n = n + 1 end
end
"#,
    );

    let tagger = LuaTagger::load(&path, Duration::from_millis(200)).unwrap();
    let classifier = Classifier::default().with_tagger(Box::new(tagger));

    // Each call gets a fresh deadline, so the classifier keeps working.
    for _ in 0..2 {
        let result = classifier.classify_visit("GitHub", "https://github.com/");
        assert_eq!(result.topic, "Coding");
        assert!(result.tags.is_empty());
    }
}

#[test]
fn test_script_state_persists_between_calls() {
    let tmp = TempDir::new().unwrap();
    let path = write_script(
        &tmp,
        "counter.lua",
        r#"
local calls = 0
tagger = {}
function tagger.tag(text, url, context)
    calls = calls + 1
    return { "call-" .. calls }
end
"#,
    );

    let tagger = LuaTagger::load(&path, Duration::from_secs(5)).unwrap();
    let classifier = Classifier::default().with_tagger(Box::new(tagger));
    assert_eq!(classifier.classify_tags("x", "y"), vec!["call-1"]);
    assert_eq!(classifier.classify_tags("x", "y"), vec!["call-2"]);
}

#[test]
fn test_missing_script_is_config_error() {
    let tmp = TempDir::new().unwrap();
    let err = LuaTagger::from_config(&TaggerConfig {
        script: tmp.path().join("missing.lua"),
        timeout_secs: 5,
    })
    .unwrap_err();
    assert!(err.to_string().contains("Failed to read tagger script"));
}
