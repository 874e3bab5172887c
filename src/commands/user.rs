use clap::ValueEnum;

use super::{Branch, branch, leaf, on_off, require, require_rest_joined};
use crate::cli::{PathDisplay, TextSpeed};
use crate::shell::{Flow, Shell};
use crate::tokenizer::TokenQueue;

pub static USER: Branch = Branch {
    name: "user",
    entries: &[
        branch("startup", "commands replayed at launch", &STARTUP),
        branch("shortcut", "aliases run with 'ss <alias>'", &SHORTCUT),
        branch("chat", "chat history, cache and incognito", &CHAT),
        branch("text", "text speed and input buffer", &TEXT),
        branch("location", "coordinates used for weather", &LOCATION),
        branch("terminal", "terminal path full|leaf", &TERMINAL),
        leaf("testing", "toggle token tracing", testing),
        branch("data", "data save", &DATA),
    ],
    default: None,
};

static STARTUP: Branch = Branch {
    name: "user startup",
    entries: &[
        leaf("add", "add <command>: replay at launch", startup_add),
        leaf("remove", "remove <command|number>", startup_remove),
        leaf("clear", "remove every startup command", startup_clear),
        leaf("enable", "replay startup commands at launch", startup_enable),
        leaf("disable", "skip startup commands at launch", startup_disable),
        leaf("list", "list startup commands", startup_list),
        leaf("runall", "run every startup command now", startup_runall),
    ],
    default: None,
};

static SHORTCUT: Branch = Branch {
    name: "user shortcut",
    entries: &[
        leaf("add", "add <alias> <command>", shortcut_add),
        leaf("remove", "remove <alias>", shortcut_remove),
        leaf("clear", "remove every shortcut", shortcut_clear),
        leaf("enable", "allow 'ss <alias>'", shortcut_enable),
        leaf("disable", "ignore 'ss <alias>'", shortcut_disable),
        leaf("list", "list shortcuts", shortcut_list),
    ],
    default: None,
};

static CHAT: Branch = Branch {
    name: "user chat",
    entries: &[
        branch("history", "history save|clear", &CHAT_HISTORY),
        branch("cache", "cache enable|disable", &CHAT_CACHE),
        branch("incognito", "incognito enable|disable", &CHAT_INCOGNITO),
    ],
    default: None,
};

static CHAT_HISTORY: Branch = Branch {
    name: "user chat history",
    entries: &[
        leaf("save", "keep the transcript for the next launch", history_save),
        leaf("clear", "drop the transcript and the saved copy", history_clear),
    ],
    default: None,
};

static CHAT_CACHE: Branch = Branch {
    name: "user chat cache",
    entries: &[
        leaf("enable", "record turns and send them as context", cache_enable),
        leaf("disable", "send each message on its own", cache_disable),
    ],
    default: None,
};

static CHAT_INCOGNITO: Branch = Branch {
    name: "user chat incognito",
    entries: &[
        leaf("enable", "clear the transcript and stop recording", incognito_enable),
        leaf("disable", "resume recording", incognito_disable),
    ],
    default: None,
};

static TEXT: Branch = Branch {
    name: "user text",
    entries: &[
        leaf("speed", "speed slow|normal|fast|nodelay", text_speed),
        branch("buffer", "buffer enable|disable", &TEXT_BUFFER),
    ],
    default: None,
};

static TEXT_BUFFER: Branch = Branch {
    name: "user text buffer",
    entries: &[
        leaf("enable", "ask for enter before typing answers", buffer_enable),
        leaf("disable", "answer prompts directly", buffer_disable),
    ],
    default: None,
};

static LOCATION: Branch = Branch {
    name: "user location",
    entries: &[
        leaf("set", "set <latitude> <longitude>", location_set),
        leaf("enable", "use the location (re-enables weather)", location_enable),
        leaf("disable", "stop using the location", location_disable),
        leaf("get", "show the stored location", location_get),
    ],
    default: None,
};

static TERMINAL: Branch = Branch {
    name: "user terminal",
    entries: &[leaf("path", "path full|leaf: directory shown in the prompt", terminal_path)],
    default: None,
};

static DATA: Branch = Branch {
    name: "user data",
    entries: &[leaf("save", "write preferences now", data_save)],
    default: None,
};

// ---------------------------------------------------------------------------
// Startup commands
// ---------------------------------------------------------------------------

fn startup_add(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    if let Some(command) = require_rest_joined(shell, queue) {
        shell.session.add_startup(&command);
        shell.say(&format!("added startup command '{command}'"));
    }
    Flow::Continue
}

fn startup_remove(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(selector) = require_rest_joined(shell, queue) else {
        return Flow::Continue;
    };
    match shell.session.remove_startup(&selector) {
        Some(removed) => shell.say(&format!("removed startup command '{removed}'")),
        None => shell.say(&format!("no startup command matches '{selector}'")),
    }
    Flow::Continue
}

fn startup_clear(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.startup_commands.clear();
    shell.say("startup commands cleared");
    Flow::Continue
}

fn startup_enable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.startup_enabled = true;
    shell.say("startup commands enabled");
    Flow::Continue
}

fn startup_disable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.startup_enabled = false;
    shell.say("startup commands disabled");
    Flow::Continue
}

fn startup_list(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    let header = format!(
        "startup commands ({}):",
        on_off(shell.session.startup_enabled)
    );
    let lines: Vec<String> = shell
        .session
        .startup_commands
        .iter()
        .enumerate()
        .map(|(index, command)| format!("  {}. {command}", index + 1))
        .collect();
    shell.say(&header);
    if lines.is_empty() {
        shell.say("  (none)");
    }
    for line in lines {
        shell.say(&line);
    }
    Flow::Continue
}

fn startup_runall(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    if shell.session.startup_commands.is_empty() {
        shell.say("no startup commands");
        return Flow::Continue;
    }
    shell.replay_startup();
    Flow::Continue
}

// ---------------------------------------------------------------------------
// Shortcuts
// ---------------------------------------------------------------------------

fn shortcut_add(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(alias) = require(shell, queue) else {
        return Flow::Continue;
    };
    let Some(expansion) = require_rest_joined(shell, queue) else {
        return Flow::Continue;
    };
    match shell.session.add_shortcut(&alias, &expansion) {
        Some(previous) => shell.say(&format!(
            "shortcut '{alias}' now runs '{expansion}' (was '{previous}')"
        )),
        None => shell.say(&format!("shortcut '{alias}' runs '{expansion}'")),
    }
    Flow::Continue
}

fn shortcut_remove(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(alias) = require(shell, queue) else {
        return Flow::Continue;
    };
    match shell.session.remove_shortcut(&alias) {
        Some(_) => shell.say(&format!("removed shortcut '{alias}'")),
        None => shell.say(&format!("no shortcut named '{alias}'")),
    }
    Flow::Continue
}

fn shortcut_clear(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.shortcuts.clear();
    shell.say("shortcuts cleared");
    Flow::Continue
}

fn shortcut_enable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.shortcuts_enabled = true;
    shell.say("shortcuts enabled");
    Flow::Continue
}

fn shortcut_disable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.shortcuts_enabled = false;
    shell.say("shortcuts disabled");
    Flow::Continue
}

fn shortcut_list(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    let header = format!("shortcuts ({}):", on_off(shell.session.shortcuts_enabled));
    let lines: Vec<String> = shell
        .session
        .shortcuts
        .iter()
        .map(|(alias, expansion)| format!("  {alias} -> {expansion}"))
        .collect();
    shell.say(&header);
    if lines.is_empty() {
        shell.say("  (none)");
    }
    for line in lines {
        shell.say(&line);
    }
    Flow::Continue
}

// ---------------------------------------------------------------------------
// Chat history
// ---------------------------------------------------------------------------

fn history_save(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    if !shell.conversation.is_recording() {
        shell.say("chat is not being recorded (incognito or cache disabled); saved history left unchanged");
        return Flow::Continue;
    }
    shell.save_chat_history();
    if shell.save_preferences() {
        let turns = shell.conversation.turns().len();
        shell.say(&format!("saved {turns} chat turn(s)"));
    }
    Flow::Continue
}

fn history_clear(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.clear_chat_history();
    shell.say("chat history cleared");
    Flow::Continue
}

fn cache_enable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.conversation.set_cache_enabled(true);
    shell.say("chat cache enabled");
    Flow::Continue
}

fn cache_disable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.conversation.set_cache_enabled(false);
    shell.say("chat cache disabled; messages are sent without earlier context");
    Flow::Continue
}

fn incognito_enable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.conversation.set_incognito(true);
    shell.say("incognito enabled; transcript cleared");
    Flow::Continue
}

fn incognito_disable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.conversation.set_incognito(false);
    shell.say("incognito disabled");
    Flow::Continue
}

// ---------------------------------------------------------------------------
// Text output
// ---------------------------------------------------------------------------

fn text_speed(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(value) = require(shell, queue) else {
        return Flow::Continue;
    };
    match TextSpeed::from_str(&value, true) {
        Ok(speed) => {
            shell.session.text_speed = speed;
            let effective = shell.session.effective_speed();
            shell.console.set_speed(effective);
            shell.say(&format!("text speed set to {}", speed.label()));
        }
        Err(_) => shell.say(&format!(
            "unknown speed '{value}', expected slow, normal, fast or nodelay"
        )),
    }
    Flow::Continue
}

fn buffer_enable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    set_buffer(shell, true)
}

fn buffer_disable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    set_buffer(shell, false)
}

fn set_buffer(shell: &mut Shell, enabled: bool) -> Flow {
    shell.session.text_buffer = enabled;
    shell.console.set_buffer(enabled);
    shell.say(&format!("text buffer {}", on_off(enabled)));
    Flow::Continue
}

fn testing(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.testing = !shell.session.testing;
    let effective = shell.session.effective_speed();
    shell.console.set_speed(effective);
    shell.say(&format!("testing mode {}", on_off(shell.session.testing)));
    Flow::Continue
}

// ---------------------------------------------------------------------------
// Location, display and data
// ---------------------------------------------------------------------------

fn location_set(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(latitude) = require(shell, queue) else {
        return Flow::Continue;
    };
    let Some(longitude) = require(shell, queue) else {
        return Flow::Continue;
    };
    match shell.session.location.set(&latitude, &longitude) {
        Ok(()) => {
            shell.weather.invalidate();
            shell.say(&format!("location set to {latitude}, {longitude}"));
        }
        Err(err) => shell.say(&err),
    }
    Flow::Continue
}

fn location_enable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.location.enabled = true;
    shell.weather.enable();
    shell.say("location enabled");
    Flow::Continue
}

fn location_disable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.location.enabled = false;
    shell.say("location disabled");
    Flow::Continue
}

fn location_get(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    let location = &shell.session.location;
    let text = format!(
        "{}, {} ({})",
        location.latitude,
        location.longitude,
        on_off(location.enabled)
    );
    shell.say(&text);
    Flow::Continue
}

fn terminal_path(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(value) = require(shell, queue) else {
        return Flow::Continue;
    };
    match PathDisplay::from_str(&value, true) {
        Ok(display) => {
            shell.passthrough.set_path_display(display);
            shell.say(&format!("prompt shows {}", shell.passthrough.display_directory()));
        }
        Err(_) => shell.say(&format!("unknown path mode '{value}', expected full or leaf")),
    }
    Flow::Continue
}

fn data_save(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    if shell.save_preferences() {
        shell.say("preferences saved");
    }
    Flow::Continue
}
