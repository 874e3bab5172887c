use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::{Value, json};

use crate::commands::*;
use crate::config::*;
use crate::console::*;
use crate::passthrough::*;
use crate::service::*;
use crate::shell::*;
use crate::tokenizer::*;

struct Harness {
    shell: Shell,
    console: ScriptedConsole,
    dir: tempfile::TempDir,
    _runtime: tokio::runtime::Runtime,
}

fn test_runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .unwrap()
}

fn harness_in(
    dir: tempfile::TempDir,
    prefs: Preferences,
    transport: Arc<dyn HttpTransport>,
    console: ScriptedConsole,
) -> Harness {
    let runtime = test_runtime();
    let cfg = test_runtime_config(dir.path());
    let shell = Shell::new(
        &cfg,
        prefs,
        transport,
        runtime.handle().clone(),
        Box::new(console.clone()),
    );
    Harness {
        shell,
        console,
        dir,
        _runtime: runtime,
    }
}

fn harness(transport: Arc<dyn HttpTransport>) -> Harness {
    harness_in(
        tempfile::tempdir().unwrap(),
        Preferences::default(),
        transport,
        ScriptedConsole::default(),
    )
}

fn completion(content: &str) -> Result<RawResponse, ServiceFailure> {
    Ok(RawResponse::ok(
        json!({
            "id": "chatcmpl-test",
            "object": "chat.completion",
            "model": "gpt-3.5-turbo",
            "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7}
        })
        .to_string(),
    ))
}

fn probe_ok() -> Result<RawResponse, ServiceFailure> {
    Ok(RawResponse::ok(r#"{"data": []}"#))
}

fn sent_chat_contents(transport: &ScriptedTransport) -> Vec<String> {
    transport
        .sent()
        .into_iter()
        .filter(|request| request.method == HttpMethod::Post)
        .filter_map(|request| {
            request
                .body
                .as_ref()
                .and_then(|body| body["messages"][0]["content"].as_str().map(str::to_string))
        })
        .collect()
}

fn canonical(path: &Path) -> PathBuf {
    path.canonicalize().unwrap()
}

/// Answers credential probes and never answers anything else.
struct ProbeThenHang;

#[async_trait::async_trait]
impl HttpTransport for ProbeThenHang {
    async fn send(&self, request: ServiceRequest) -> Result<RawResponse, ServiceFailure> {
        if request.method == HttpMethod::Get {
            return probe_ok();
        }
        tokio::time::sleep(Duration::from_secs(60)).await;
        probe_ok()
    }
}

// ---------------------------------------------------------------------------
// Tokenizer and dispatch tree
// ---------------------------------------------------------------------------

#[test]
fn quoted_directory_is_one_token() {
    assert_eq!(
        tokenize("terminal cd 'My Documents'"),
        vec!["terminal", "cd", "My Documents"]
    );
}

#[test]
fn terminal_passes_raw_remainder_with_quotes() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    let target = h.dir.path().join("My Documents");
    std::fs::create_dir(&target).unwrap();

    h.shell
        .process_line(&format!(".terminal cd '{}'", h.dir.path().join("My Documents").display()));
    assert_eq!(h.shell.passthrough.current_dir(), canonical(&target));
}

#[test]
fn missing_argument_prints_hint_and_continues() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    assert_eq!(h.shell.process_line(".user startup add"), Flow::Continue);
    assert_eq!(h.shell.process_line(".ai apikey"), Flow::Continue);
    let hints = h
        .console
        .output()
        .iter()
        .filter(|line| line.as_str() == MISSING_ARGUMENTS)
        .count();
    assert_eq!(hints, 2);
    assert!(h.shell.session.startup_commands.is_empty());
}

#[test]
fn unknown_token_stops_with_hint_and_suggestion() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".user shortcat add x y");
    assert!(h.console.contains("unknown command 'shortcat', try help"));
    assert!(h.shell.session.shortcuts.is_empty());

    h.shell.process_line(".wea");
    assert!(h.console.contains("Did you mean"));
}

#[test]
fn branch_help_lists_subcommands() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".user startup help");
    assert!(h.console.contains("user startup commands:"));
    assert!(h.console.contains("user startup runall"));

    h.shell.process_line("help");
    assert!(h.console.contains("weather"));
}

#[test]
fn testing_mode_traces_every_popped_token() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".user testing");
    assert!(h.shell.session.testing);
    h.shell.process_line(".user location get");
    assert!(h.console.contains("[testing] token: user"));
    assert!(h.console.contains("[testing] token: location"));
    assert!(h.console.contains("[testing] token: get"));
}

#[test]
fn completion_walks_the_command_tree() {
    assert_eq!(complete_line(".us"), (1, vec!["user"]));
    assert_eq!(complete_line(".user st"), (6, vec!["startup"]));
    let (start, candidates) = complete_line(".user startup ");
    assert_eq!(start, 14);
    assert!(candidates.contains(&"runall"));
    assert!(complete_line("git st").1.is_empty());
    assert!(complete_line(".terminal x").1.is_empty());
}

#[test]
fn clear_resets_screen_and_terminal_history() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".terminal true");
    assert!(!h.shell.passthrough.history().is_empty());
    h.shell.process_line("clear");
    assert!(h.shell.passthrough.history().is_empty());
    assert_eq!(
        h.console.clears.load(std::sync::atomic::Ordering::SeqCst),
        1
    );
}

// ---------------------------------------------------------------------------
// Passthrough
// ---------------------------------------------------------------------------

#[test]
fn shortcut_routes_like_the_expanded_command() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".terminal");

    h.shell.process_line("git status");
    let direct = h.shell.passthrough.last_record().cloned().unwrap();

    h.shell.process_line(".user shortcut add gs \"git status\"");
    h.shell.process_line(".ss gs");
    let via_shortcut = h.shell.passthrough.last_record().cloned().unwrap();

    assert_eq!(via_shortcut.command, "git status");
    assert_eq!(via_shortcut.command, direct.command);
    assert_eq!(via_shortcut.exit_code, direct.exit_code);
}

#[test]
fn shortcut_output_is_reported() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".user shortcut add hi \"echo hello from devsh\"");
    h.shell.process_line(".ss hi");
    assert!(h.console.contains("hello from devsh"));

    h.shell.process_line(".user shortcut disable");
    h.shell.process_line(".ss hi");
    assert!(h.console.contains("shortcuts are disabled"));
}

#[test]
fn cd_never_leaves_an_invalid_directory() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    let root = canonical(h.dir.path());
    std::fs::create_dir(root.join("sub")).unwrap();
    std::fs::write(root.join("file.txt"), "x").unwrap();

    h.shell.process_line(&format!(".terminal cd {}", root.display()));
    assert_eq!(h.shell.passthrough.current_dir(), root);

    for attempt in ["cd does-not-exist", "cd file.txt", "cd sub/../missing"] {
        let before = h.shell.passthrough.current_dir().to_path_buf();
        h.shell.process_line(&format!(".terminal {attempt}"));
        assert_eq!(h.shell.passthrough.current_dir(), before);
    }
    assert!(h.console.contains("no such directory"));

    h.shell.process_line(".terminal cd sub");
    assert_eq!(h.shell.passthrough.current_dir(), root.join("sub"));
    h.shell.process_line(".terminal cd ..");
    assert_eq!(h.shell.passthrough.current_dir(), root);
    assert!(h.shell.passthrough.current_dir().is_dir());
}

#[test]
fn subprocess_runs_in_virtual_directory() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    let root = canonical(h.dir.path());
    std::fs::write(root.join("marker-file"), "x").unwrap();

    h.shell.process_line(&format!(".terminal cd {}", root.display()));
    h.shell.process_line(".terminal ls");
    assert!(h.console.contains("marker-file"));

    h.shell.process_line(".terminal exit 3");
    assert!(h.console.contains("command exited with status 3"));
    assert_eq!(h.shell.passthrough.last_record().unwrap().exit_code, Some(3));
}

#[test]
fn compound_cd_runs_in_subprocess_and_keeps_directory() {
    assert_eq!(parse_cd_command("cd /tmp && ls"), None);
    assert_eq!(parse_cd_command("cd"), Some(None));
    assert_eq!(parse_cd_command("cd 'a b'"), Some(Some("a b".to_string())));
    assert_eq!(parse_cd_command("echo cd"), None);
}

#[test]
fn git_branch_is_read_from_head() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical(dir.path());
    assert_eq!(find_git_branch(&root), None);

    std::fs::create_dir_all(root.join(".git")).unwrap();
    std::fs::write(root.join(".git/HEAD"), "ref: refs/heads/feature/x\n").unwrap();
    std::fs::create_dir_all(root.join("nested/deeper")).unwrap();
    assert_eq!(
        find_git_branch(&root.join("nested/deeper")).as_deref(),
        Some("feature/x")
    );

    std::fs::write(root.join(".git/HEAD"), "0123456789abcdef0123456789abcdef01234567\n").unwrap();
    assert_eq!(find_git_branch(&root).as_deref(), Some("0123456"));
}

#[test]
fn worktree_gitdir_file_is_followed() {
    let dir = tempfile::tempdir().unwrap();
    let root = canonical(dir.path());
    std::fs::create_dir_all(root.join("real-git")).unwrap();
    std::fs::write(root.join("real-git/HEAD"), "ref: refs/heads/wt\n").unwrap();
    std::fs::create_dir_all(root.join("tree")).unwrap();
    std::fs::write(root.join("tree/.git"), "gitdir: ../real-git\n").unwrap();
    assert_eq!(find_git_branch(&root.join("tree")).as_deref(), Some("wt"));
}

#[test]
fn prompt_omits_branch_outside_repositories() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    let root = canonical(h.dir.path());
    std::fs::create_dir(root.join("leafdir")).unwrap();
    h.shell
        .process_line(&format!(".terminal cd {}", root.join("leafdir").display()));

    let prompt = crate::theme::strip_ansi(&h.shell.prompt());
    assert!(prompt.starts_with("leafdir "));
    assert!(!prompt.contains("git:("));

    h.shell.process_line(".user terminal path full");
    let prompt = crate::theme::strip_ansi(&h.shell.prompt());
    assert!(prompt.starts_with(&root.join("leafdir").display().to_string()));
}

#[test]
fn output_cache_keeps_the_tail() {
    let (kept, truncated) = truncate_tail("abcdef", 3);
    assert_eq!(kept, "def");
    assert!(truncated);
    assert_eq!(truncate_tail("abc", 3), ("abc".to_string(), false));
}

#[test]
fn invalid_utf8_output_is_kept_and_child_runs_to_completion() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".terminal printf 'ok\\n\\377\\nafter\\n'");

    let record = h.shell.passthrough.last_record().cloned().unwrap();
    assert_eq!(record.exit_code, Some(0));
    assert_eq!(record.output, "ok\n\u{FFFD}\nafter\n");
    assert!(h.console.contains("after"));
    assert!(!h.console.contains("terminated by signal"));
}

#[test]
fn stdout_and_stderr_keep_arrival_order() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(
        ".terminal printf 'one\\n'; sleep 0.2; printf 'two\\n' >&2; sleep 0.2; printf 'three\\n'",
    );
    let record = h.shell.passthrough.last_record().unwrap();
    assert_eq!(record.output, "one\ntwo\nthree\n");
}

#[test]
fn output_without_trailing_newline_is_kept() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".terminal printf 'name? '");
    assert_eq!(h.shell.passthrough.last_record().unwrap().output, "name? ");
}

// ---------------------------------------------------------------------------
// Chat and the conversation cache
// ---------------------------------------------------------------------------

#[test]
fn bad_key_disables_chat_and_free_text_goes_to_the_host_shell() {
    let transport = ScriptedTransport::new(vec![Ok(RawResponse {
        status: 401,
        body: r#"{"error": {"message": "invalid api key"}}"#.to_string(),
    })]);
    let mut h = harness(Arc::new(transport.clone()));

    h.shell.process_line(".ai apikey set BADKEY");
    assert!(!h.shell.chat.is_enabled());
    assert_eq!(h.shell.chat.api_key(), Some("BADKEY"));
    assert!(h.console.contains("validation failed"));

    h.shell.process_line("hello");
    let record = h.shell.passthrough.last_record().unwrap();
    assert_eq!(record.command, "hello");
    assert!(sent_chat_contents(&transport).is_empty());
}

#[test]
fn follow_up_embeds_transcript_until_cache_is_disabled() {
    let transport = ScriptedTransport::new(vec![
        probe_ok(),
        completion("first reply"),
        completion("second reply"),
        completion("third reply"),
    ]);
    let mut h = harness(Arc::new(transport.clone()));

    h.shell.process_line(".ai apikey set sk-testkey1234567890");
    assert!(h.shell.chat.is_enabled());

    h.shell.process_line("hello");
    assert!(h.console.contains("first reply"));
    h.shell.process_line("tell me more");
    h.shell.process_line(".user chat cache disable");
    h.shell.process_line("standalone question");

    let sent = sent_chat_contents(&transport);
    assert_eq!(sent[0], "hello");
    assert!(sent[1].contains("User: hello\nAssistant: first reply"));
    assert!(sent[1].ends_with("tell me more"));
    assert_eq!(sent[2], "standalone question");
    assert_eq!(h.shell.conversation.turns().len(), 4);
}

#[test]
fn incognito_clears_transcript_and_stops_recording() {
    let transport = ScriptedTransport::new(vec![
        probe_ok(),
        completion("one"),
        completion("two"),
        completion("three"),
    ]);
    let mut h = harness(Arc::new(transport.clone()));
    h.shell.process_line(".ai apikey set sk-testkey1234567890");

    h.shell.process_line("first");
    assert_eq!(h.shell.conversation.turns().len(), 2);

    h.shell.process_line(".user chat incognito enable");
    assert!(h.shell.conversation.is_empty());
    h.shell.process_line("second");
    assert!(h.shell.conversation.is_empty());

    h.shell.process_line(".user chat incognito disable");
    h.shell.process_line("third");
    assert_eq!(h.shell.conversation.turns().len(), 2);

    let sent = sent_chat_contents(&transport);
    assert_eq!(sent, vec!["first", "second", "third"]);
}

#[test]
fn chat_timeout_returns_near_deadline_without_side_effects() {
    let mut h = harness(Arc::new(ProbeThenHang));
    h.shell.process_line(".ai apikey set sk-testkey1234567890");
    assert!(h.shell.chat.is_enabled());

    let started = Instant::now();
    h.shell.process_line("are you there?");
    let elapsed = started.elapsed();

    assert!(elapsed < Duration::from_millis(300) + Duration::from_secs(2));
    assert!(h.shell.conversation.is_empty());
    assert!(!h.shell.chat.is_enabled());
    assert!(h.console.contains("request timed out"));
    assert!(h.shell.chat.last_response().is_none());
}

#[test]
fn ai_branch_reads_fields_and_masks_key() {
    let transport = ScriptedTransport::new(vec![probe_ok(), completion("pong")]);
    let mut h = harness(Arc::new(transport));
    h.shell.process_line(".ai apikey set sk-testkey1234567890");
    h.shell.process_line(".ai chat ping, with punctuation!");

    h.shell.process_line(".ai get total_tokens");
    assert!(h.console.output().iter().any(|line| line == "7"));
    h.shell.process_line(".ai get model");
    assert!(h.console.output().iter().any(|line| line == "gpt-3.5-turbo"));
    h.shell.process_line(".ai apikey get");
    assert!(h.console.contains("********7890"));
    assert!(!h.console.contains("sk-testkey1234567890"));
    h.shell.process_line(".ai dump");
    assert!(h.console.contains("ping, with punctuation!"));
}

#[test]
fn explain_sends_last_terminal_command() {
    let transport = ScriptedTransport::new(vec![probe_ok(), completion("it printed oops")]);
    let mut h = harness(Arc::new(transport.clone()));
    h.shell.process_line(".terminal echo oops");
    h.shell.process_line(".ai apikey set sk-testkey1234567890");
    h.shell.process_line(".ai explain");

    let sent = sent_chat_contents(&transport);
    assert!(sent[0].contains("Command: echo oops"));
    assert!(sent[0].contains("oops\n"));
    assert!(h.console.contains("it printed oops"));
}

#[test]
fn log_writes_exchange_and_extracts_code_blocks() {
    let transport = ScriptedTransport::new(vec![
        probe_ok(),
        completion("Try this:\n```python\nprint('hi')\n```\n"),
    ]);
    let mut h = harness_in(
        tempfile::tempdir().unwrap(),
        Preferences::default(),
        Arc::new(transport),
        ScriptedConsole::with_answers(&[true]),
    );
    h.shell.process_line(".ai apikey set sk-testkey1234567890");
    h.shell.process_line("write hello world in python");
    h.shell.process_line(".ai log");

    let logs = h.dir.path().join("logs");
    let names: Vec<String> = std::fs::read_dir(&logs)
        .unwrap()
        .map(|entry| entry.unwrap().file_name().to_string_lossy().to_string())
        .collect();
    assert!(names.iter().any(|name| name.starts_with("chat-") && name.ends_with(".txt")));
    let script = names
        .iter()
        .find(|name| name.ends_with("-1.py"))
        .expect("code block file");
    assert_eq!(
        std::fs::read_to_string(logs.join(script)).unwrap(),
        "print('hi')\n"
    );
}

#[test]
fn repeated_logs_never_overwrite_each_other() {
    let transport = ScriptedTransport::new(vec![probe_ok(), completion("plain answer")]);
    let mut h = harness(Arc::new(transport));
    h.shell.process_line(".ai apikey set sk-testkey1234567890");
    h.shell.process_line("question");
    h.shell.process_line(".ai log");
    h.shell.process_line(".ai log");

    let logs = std::fs::read_dir(h.dir.path().join("logs"))
        .unwrap()
        .filter(|entry| {
            entry
                .as_ref()
                .unwrap()
                .file_name()
                .to_string_lossy()
                .ends_with(".txt")
        })
        .count();
    assert_eq!(logs, 2);
}

#[test]
fn log_stem_gains_a_counter_when_taken() {
    use chrono::TimeZone;

    let dir = tempfile::tempdir().unwrap();
    let now = chrono::Local.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
    let first = unused_log_stem(dir.path(), now);
    assert_eq!(first, "chat-20240501-120000-000");
    std::fs::write(dir.path().join(format!("{first}.txt")), "x").unwrap();
    assert_eq!(unused_log_stem(dir.path(), now), "chat-20240501-120000-000-2");
}

#[test]
fn history_save_while_incognito_keeps_previous_snapshot() {
    let prefs = Preferences {
        saved_chat: vec!["User: earlier".to_string(), "Assistant: reply".to_string()],
        ..Preferences::default()
    };
    let mut h = harness_in(
        tempfile::tempdir().unwrap(),
        prefs,
        Arc::new(ScriptedTransport::default()),
        ScriptedConsole::default(),
    );
    h.shell.process_line(".user chat incognito enable");
    h.shell.process_line(".user chat history save");
    assert!(h.console.contains("saved history left unchanged"));

    h.shell.process_line(".user data save");
    let (saved, _) =
        load_or_create_preferences(&h.dir.path().join(PREFERENCES_FILE_NAME)).unwrap();
    assert_eq!(saved.saved_chat, vec!["User: earlier", "Assistant: reply"]);
}

#[test]
fn text_buffer_toggle_is_reported() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".user text buffer enable");
    assert!(h.shell.session.text_buffer);
    assert!(h.console.contains("text buffer enabled"));
}

#[test]
fn exit_offers_to_save_chat_and_writes_preferences() {
    let transport = ScriptedTransport::new(vec![probe_ok(), completion("hi there")]);
    let mut h = harness_in(
        tempfile::tempdir().unwrap(),
        Preferences::default(),
        Arc::new(transport),
        ScriptedConsole::with_answers(&[true]),
    );
    h.shell.process_line(".ai apikey set sk-testkey1234567890");
    h.shell.process_line("hello");

    assert_eq!(h.shell.process_line("exit"), Flow::Exit);
    let (saved, source) =
        load_or_create_preferences(&h.dir.path().join(PREFERENCES_FILE_NAME)).unwrap();
    assert_eq!(source, PreferencesSource::Loaded);
    assert_eq!(saved.saved_chat, vec!["User: hello", "Assistant: hi there"]);
    assert_eq!(saved.api_key.as_deref(), Some("sk-testkey1234567890"));
}

// ---------------------------------------------------------------------------
// Startup, shortcuts and persistence
// ---------------------------------------------------------------------------

#[test]
fn startup_cd_applies_before_first_prompt_after_restart() {
    let dir = tempfile::tempdir().unwrap();
    let mut first = harness_in(
        dir,
        Preferences::default(),
        Arc::new(ScriptedTransport::default()),
        ScriptedConsole::default(),
    );
    first
        .shell
        .process_line(".user startup add \"terminal cd /\"");
    assert_eq!(first.shell.session.startup_commands, vec!["terminal cd /"]);
    assert_eq!(first.shell.process_line("exit"), Flow::Exit);

    let prefs_path = first.dir.path().join(PREFERENCES_FILE_NAME);
    let (prefs, _) = load_or_create_preferences(&prefs_path).unwrap();
    let Harness { dir, .. } = first;
    let mut second = harness_in(
        dir,
        prefs,
        Arc::new(ScriptedTransport::default()),
        ScriptedConsole::default(),
    );
    second.shell.boot();
    assert_eq!(second.shell.passthrough.current_dir(), Path::new("/"));
}

#[test]
fn exit_during_startup_replay_is_ignored() {
    let prefs = Preferences {
        startup_commands: vec!["exit".to_string(), "user testing".to_string()],
        ..Preferences::default()
    };
    let mut h = harness_in(
        tempfile::tempdir().unwrap(),
        prefs,
        Arc::new(ScriptedTransport::default()),
        ScriptedConsole::default(),
    );
    h.shell.boot();
    assert!(h.console.contains("'exit' is ignored while running startup commands"));
    assert!(h.shell.session.testing);
}

#[test]
fn disabled_startup_skips_replay_but_runall_still_works() {
    let prefs = Preferences {
        startup_enabled: false,
        startup_commands: vec!["user testing".to_string()],
        ..Preferences::default()
    };
    let mut h = harness_in(
        tempfile::tempdir().unwrap(),
        prefs,
        Arc::new(ScriptedTransport::default()),
        ScriptedConsole::default(),
    );
    h.shell.boot();
    assert!(!h.shell.session.testing);
    h.shell.process_line(".user startup runall");
    assert!(h.shell.session.testing);
}

#[test]
fn recursive_shortcuts_stop_at_depth_limit() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".user shortcut add a \".ss b\"");
    h.shell.process_line(".user shortcut add b \".ss a\"");
    assert_eq!(h.shell.process_line(".ss a"), Flow::Continue);
    assert!(h.console.contains("expansion depth limit (4) reached"));
}

#[test]
fn exit_from_shortcut_is_honoured() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".user shortcut add q exit");
    assert_eq!(h.shell.process_line(".ss q"), Flow::Exit);
}

#[test]
fn missing_preferences_file_is_created_with_defaults() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested/preferences.toml");
    let (prefs, source) = load_or_create_preferences(&path).unwrap();
    assert_eq!(source, PreferencesSource::Created);
    assert_eq!(prefs, Preferences::default());
    assert!(path.exists());
}

#[test]
fn corrupt_preferences_file_is_recovered() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(PREFERENCES_FILE_NAME);
    std::fs::write(&path, "default_to_chat = [not valid").unwrap();

    let (prefs, source) = load_or_create_preferences(&path).unwrap();
    assert_eq!(source, PreferencesSource::Recovered);
    assert_eq!(prefs, Preferences::default());
    let (reloaded, source) = load_or_create_preferences(&path).unwrap();
    assert_eq!(source, PreferencesSource::Loaded);
    assert_eq!(reloaded, prefs);
}

#[test]
fn settings_persist_through_data_save() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".user text speed fast");
    h.shell.process_line(".user location set 51.5 -0.12");
    h.shell.process_line(".user terminal path full");
    h.shell.process_line(".user chat incognito enable");
    h.shell.process_line(".terminal");
    h.shell.process_line(".user data save");
    assert!(h.console.contains("preferences saved"));

    let (prefs, _) = load_or_create_preferences(&h.dir.path().join(PREFERENCES_FILE_NAME)).unwrap();
    assert_eq!(prefs.text_speed, crate::cli::TextSpeed::Fast);
    assert_eq!(prefs.latitude, "51.5");
    assert_eq!(prefs.path_display, crate::cli::PathDisplay::Full);
    assert!(prefs.incognito);
    assert!(!prefs.default_to_chat);
}

// ---------------------------------------------------------------------------
// Weather
// ---------------------------------------------------------------------------

fn forecast() -> Result<RawResponse, ServiceFailure> {
    let body: Value = json!({
        "timelines": {"minutely": [
            {"time": "2024-05-01T12:00:00Z", "values": {
                "temperature": 21.5, "temperatureApparent": 20.9, "humidity": 48,
                "windSpeed": 3.1, "weatherCode": 1000
            }}
        ]}
    });
    Ok(RawResponse::ok(body.to_string()))
}

#[test]
fn weather_reads_first_minutely_values_for_location() {
    let transport = ScriptedTransport::new(vec![forecast()]);
    let prefs = Preferences {
        location_enabled: true,
        ..Preferences::default()
    };
    let mut h = harness_in(
        tempfile::tempdir().unwrap(),
        prefs,
        Arc::new(transport.clone()),
        ScriptedConsole::default(),
    );

    h.shell.process_line(".weather get temperature");
    assert!(h.console.contains("temperature: 21.5"));
    h.shell.process_line(".weather");
    assert!(h.console.contains("humidity 48%"));

    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].url.contains("/weather/forecast?location=40.712776,-74.005974"));
}

#[test]
fn weather_failure_disables_until_location_reenabled() {
    let transport = ScriptedTransport::new(vec![
        Err(ServiceFailure::Transport("connection refused".to_string())),
        forecast(),
    ]);
    let prefs = Preferences {
        location_enabled: true,
        ..Preferences::default()
    };
    let mut h = harness_in(
        tempfile::tempdir().unwrap(),
        prefs,
        Arc::new(transport),
        ScriptedConsole::default(),
    );

    h.shell.process_line(".weather refresh");
    assert!(h.console.contains("weather disabled"));
    assert!(!h.shell.weather.is_enabled());

    h.shell.process_line(".user location enable");
    h.shell.process_line(".weather refresh");
    assert!(h.console.contains("weather code 1000"));
}

#[test]
fn weather_requires_enabled_location() {
    let mut h = harness(Arc::new(ScriptedTransport::default()));
    h.shell.process_line(".weather");
    assert!(h.console.contains("location is disabled"));
}

// ---------------------------------------------------------------------------
// Error reporting
// ---------------------------------------------------------------------------

#[test]
fn error_categories_map_to_exit_codes() {
    use crate::error::*;

    let err = anyhow::anyhow!("failed to write preferences file '/x/preferences.toml'");
    assert_eq!(categorize_error(&err), ErrorCategory::Filesystem);
    assert_eq!(categorize_error(&err).exit_code(), 2);

    let err = anyhow::anyhow!("invalid value 'abc' for --timeout-ms");
    assert_eq!(categorize_error(&err), ErrorCategory::Config);
    assert_eq!(categorize_error(&err).exit_code(), 3);

    let err = anyhow::anyhow!("request timed out");
    assert_eq!(categorize_error(&err), ErrorCategory::Service);
    assert_eq!(categorize_error(&err).exit_code(), 1);
}

#[test]
fn formatted_errors_never_leak_keys() {
    use crate::error::*;

    let err = anyhow::anyhow!(
        "GET http://weather.test/v4/weather/forecast?location=1,2&apikey=weather-test-key failed"
    );
    let text = format_cli_error(&err);
    assert!(text.starts_with("[INTERNAL]"));
    assert!(!text.contains("weather-test-key"));
    assert!(text.contains("apikey=[REDACTED] failed"));

    assert_eq!(
        redact_api_keys("key sk-abc123 rejected"),
        "key sk-[REDACTED] rejected"
    );
    assert_eq!(redact_api_keys("task-force"), "task-force");
    assert_eq!(mask_secret("short"), "*****");
}
