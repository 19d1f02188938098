use chrono::{DateTime, Duration, Local, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};
use sqlx::{Connection, SqliteConnection};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const WEBKIT_OFFSET_MICROS: i64 = 11_644_473_600 * 1_000_000;

fn hdigest_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("hdigest");
    path
}

async fn write_chrome_history(path: &Path, rows: &[(&str, &str, DateTime<Utc>)]) {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Delete);
    let mut conn = SqliteConnection::connect_with(&options).await.unwrap();
    sqlx::query(
        "CREATE TABLE urls (id INTEGER PRIMARY KEY, url LONGVARCHAR, title LONGVARCHAR, \
         last_visit_time INTEGER NOT NULL)",
    )
    .execute(&mut conn)
    .await
    .unwrap();
    for (url, title, at) in rows {
        sqlx::query("INSERT INTO urls (url, title, last_visit_time) VALUES (?, ?, ?)")
            .bind(*url)
            .bind(*title)
            .bind(at.timestamp_micros() + WEBKIT_OFFSET_MICROS)
            .execute(&mut conn)
            .await
            .unwrap();
    }
    conn.close().await.unwrap();
}

/// Temp dir with a Chrome fixture, an output dir, and a config that
/// disables every other browser.
fn setup_test_env(extra_config: &str) -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[history]
lookback_days = 7

[output]
dir = "{root}/out"

[sources.brave]
enabled = false

[sources.chrome]
path = "{root}/chrome/History"

[sources.safari]
path = "{root}/safari/History.db"

[sources.firefox]
enabled = false

{extra}
"#,
        root = root.display(),
        extra = extra_config,
    );

    let config_path = config_dir.join("hdigest.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_hdigest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = hdigest_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run hdigest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let success = output.status.success();
    (stdout, stderr, success)
}

// ═══════════════════════════════════════════════════════════════════════
// classify
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_classify_search_url_json() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_hdigest(
        &config_path,
        &[
            "classify",
            "rust ownership - Google Search",
            "--url",
            "https://www.google.com/search?q=rust+ownership",
            "--json",
        ],
    );
    assert!(success, "classify failed: stdout={}, stderr={}", stdout, stderr);

    let value: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(value["topic"], "Coding");
    assert_eq!(value["search"]["engine"], "google");
    assert_eq!(value["search"]["query"], "rust ownership");
}

#[test]
fn test_classify_untitled_docs_page() {
    let (_tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) =
        run_hdigest(&config_path, &["classify", "", "--url", "https://docs.rs/tokio"]);
    assert!(success, "classify failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("topic:  Reference"));
    assert!(stdout.contains("tags:   Reference"));
    assert!(stdout.contains("search: -"));
}

#[test]
fn test_classify_uses_configured_topics() {
    let (_tmp, config_path) = setup_test_env(
        r#"[[classifier.topics]]
name = "Gaming"
keywords = ["steampowered"]
"#,
    );

    let (stdout, _, success) = run_hdigest(
        &config_path,
        &["classify", "Sale", "--url", "https://store.steampowered.com/"],
    );
    assert!(success);
    assert!(stdout.contains("topic:  Gaming"));
}

// ═══════════════════════════════════════════════════════════════════════
// config handling
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_missing_explicit_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_hdigest(&tmp.path().join("nope.toml"), &["sources"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_rejected() {
    let (_tmp, config_path) = setup_test_env("");
    fs::write(&config_path, "[history]\nlookback_days = 0\n").unwrap();

    let (_, stderr, success) = run_hdigest(&config_path, &["sources"]);
    assert!(!success);
    assert!(stderr.contains("lookback_days"));
}

// ═══════════════════════════════════════════════════════════════════════
// sources / run
// ═══════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_sources_lists_status() {
    let (tmp, config_path) = setup_test_env("");
    fs::create_dir_all(tmp.path().join("chrome")).unwrap();
    write_chrome_history(&tmp.path().join("chrome/History"), &[]).await;

    let (stdout, stderr, success) = run_hdigest(&config_path, &["sources"]);
    assert!(success, "sources failed: stdout={}, stderr={}", stdout, stderr);

    let line = |name: &str| {
        stdout
            .lines()
            .find(|l| l.starts_with(name))
            .unwrap_or_else(|| panic!("no {} line in {}", name, stdout))
            .to_string()
    };
    assert!(line("brave").contains("DISABLED"));
    assert!(line("chrome").contains("OK"));
    assert!(line("chrome").contains("webkit-micros"));
    assert!(line("safari").contains("NOT FOUND"));
    assert!(line("firefox").contains("DISABLED"));
}

#[tokio::test]
async fn test_run_writes_daily_and_weekly() {
    let (tmp, config_path) = setup_test_env("");
    let root = tmp.path();
    fs::create_dir_all(root.join("chrome")).unwrap();

    let visit = Utc::now() - Duration::hours(1);
    write_chrome_history(
        &root.join("chrome/History"),
        &[
            (
                "https://www.google.com/search?q=rust+ownership",
                "rust ownership - Google Search",
                visit,
            ),
            ("https://docs.rs/tokio", "", visit - Duration::minutes(1)),
        ],
    )
    .await;

    let day = visit.with_timezone(&Local).date_naive();
    let iso = day.format("%Y-%m-%d").to_string();
    let start = (day - Duration::days(6)).format("%Y-%m-%d").to_string();

    let (stdout, stderr, success) = run_hdigest(&config_path, &["run", "--date", &iso]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Daily written:"));
    assert!(stdout.contains("Weekly written:"));

    let daily = fs::read_to_string(root.join(format!("out/daily/{}.md", iso))).unwrap();
    assert!(daily.starts_with(&format!("---\ndate: {}\n", iso)));
    assert!(daily.contains("**google**: rust ownership"));
    assert!(daily.contains("[Search: rust ownership](https://www.google.com/search?q=rust+ownership)"));
    assert!(daily.contains("[(Untitled)](https://docs.rs/tokio) `Reference`"));
    assert!(daily.contains("## Coding (1)"));
    assert!(daily.contains("## Reference (1)"));

    let weekly = fs::read_to_string(root.join(format!(
        "out/weekly/weekly-summary-{}_to_{}.md",
        start, iso
    )))
    .unwrap();
    assert!(weekly.contains("**Top domains:** www.google.com (1)"));
    assert!(weekly.contains("**Top domains:** docs.rs (1)"));

    // Only the fixture remains next to the live database.
    let names: Vec<_> = fs::read_dir(root.join("chrome")).unwrap().collect();
    assert_eq!(names.len(), 1);
}

#[tokio::test]
async fn test_run_falls_back_when_day_is_empty() {
    let (tmp, config_path) = setup_test_env("");
    let root = tmp.path();
    fs::create_dir_all(root.join("chrome")).unwrap();

    let visit = Utc::now() - Duration::days(3);
    write_chrome_history(&root.join("chrome/History"), &[("https://a.example/", "A page", visit)])
        .await;

    let later = (visit + Duration::days(2)).with_timezone(&Local).date_naive();
    let iso = later.format("%Y-%m-%d").to_string();

    let (stdout, stderr, success) = run_hdigest(&config_path, &["run", "--date", &iso]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);

    let daily = fs::read_to_string(root.join(format!("out/daily/{}.md", iso))).unwrap();
    assert!(daily.contains("[A page](https://a.example/)"));
    assert!(daily.contains("_No searches_"));
}

#[test]
fn test_run_with_no_sources_writes_empty_reports() {
    let (tmp, config_path) = setup_test_env("");

    let (stdout, stderr, success) = run_hdigest(&config_path, &["run", "--date", "2024-03-05"]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);

    let daily = fs::read_to_string(tmp.path().join("out/daily/2024-03-05.md")).unwrap();
    assert!(daily.contains("# Browser Activity — 2024-03-05"));
    assert!(daily.contains("_No searches_"));
    assert!(tmp
        .path()
        .join("out/weekly/weekly-summary-2024-02-28_to_2024-03-05.md")
        .exists());
}

#[test]
fn test_bad_date_rejected() {
    let (_tmp, config_path) = setup_test_env("");
    let (_, _, success) = run_hdigest(&config_path, &["run", "--date", "05/03/2024"]);
    assert!(!success);
}

// ═══════════════════════════════════════════════════════════════════════
// tagger
// ═══════════════════════════════════════════════════════════════════════

#[test]
fn test_tagger_init_and_test() {
    let tmp = TempDir::new().unwrap();

    let output = Command::new(hdigest_binary())
        .args(["tagger", "init", "work"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(output.status.success());
    let script = tmp.path().join("taggers/work.lua");
    assert!(script.exists());

    // A second init must not overwrite.
    let again = Command::new(hdigest_binary())
        .args(["tagger", "init", "work"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    assert!(!again.status.success());

    let output = Command::new(hdigest_binary())
        .args(["tagger", "test"])
        .arg(&script)
        .args(["API docs", "--url", "https://example.com/docs"])
        .current_dir(tmp.path())
        .output()
        .unwrap();
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(output.status.success(), "tagger test failed: {}", stdout);
    assert!(stdout.contains("Example"));
    assert!(stdout.contains("Reference"));
}

#[tokio::test]
async fn test_run_applies_configured_tagger() {
    let tmp_script = TempDir::new().unwrap();
    let script = tmp_script.path().join("work.lua");
    fs::write(
        &script,
        r#"
tagger = { name = "work" }
function tagger.tag(text, url, context)
    if string.find(url, "intranet", 1, true) then
        return { "Work" }
    end
    return {}
end
"#,
    )
    .unwrap();

    let (tmp, config_path) = setup_test_env(&format!(
        "[tagger]\nscript = \"{}\"\ntimeout_secs = 2\n",
        script.display()
    ));
    let root = tmp.path();
    fs::create_dir_all(root.join("chrome")).unwrap();
    let visit = Utc::now() - Duration::hours(1);
    write_chrome_history(
        &root.join("chrome/History"),
        &[("https://intranet.corp/wiki", "Wiki", visit)],
    )
    .await;

    let iso = visit.with_timezone(&Local).date_naive().format("%Y-%m-%d").to_string();
    let (stdout, stderr, success) = run_hdigest(&config_path, &["run", "--date", &iso]);
    assert!(success, "run failed: stdout={}, stderr={}", stdout, stderr);

    let daily = fs::read_to_string(root.join(format!("out/daily/{}.md", iso))).unwrap();
    assert!(daily.contains("tags: [Work]"));
    assert!(daily.contains("[Wiki](https://intranet.corp/wiki) `Work`"));
}
