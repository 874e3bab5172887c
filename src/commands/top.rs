use super::{Branch, branch, leaf, noop, require};
use crate::shell::{Flow, Shell};
use crate::tokenizer::TokenQueue;

pub static ROOT: Branch = Branch {
    name: "",
    entries: &[
        leaf("clear", "clear the screen and the terminal history", clear),
        leaf("exit", "save preferences and quit", exit),
        branch("ai", "make chat the default entry; 'ai help' for more", &super::ai::AI),
        branch("user", "session settings; 'user help' for more", &super::user::USER),
        leaf(
            "terminal",
            "make the host shell the default entry, or run 'terminal <command>'",
            terminal,
        ),
        leaf("ss", "ss <alias>: run a saved shortcut", shortcut),
        branch("weather", "current weather; 'weather help' for more", &super::weather::WEATHER),
    ],
    default: Some(noop),
};

fn clear(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.console.clear_screen();
    shell.passthrough.clear_history();
    Flow::Continue
}

fn exit(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    if shell.is_replaying_startup() {
        shell.say("'exit' is ignored while running startup commands");
        return Flow::Continue;
    }
    shell.shutdown();
    Flow::Exit
}

fn terminal(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    if queue.is_empty() {
        shell.session.default_to_chat = false;
        shell.say("free text now goes to the host shell");
        return Flow::Continue;
    }
    let command = queue.take_rest_raw();
    shell.run_passthrough(&command);
    Flow::Continue
}

fn shortcut(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(alias) = require(shell, queue) else {
        return Flow::Continue;
    };
    if !shell.session.shortcuts_enabled {
        shell.say("shortcuts are disabled (user shortcut enable)");
        return Flow::Continue;
    }
    let Some(expansion) = shell.session.expand_shortcut(&alias).map(str::to_string) else {
        shell.say(&format!("no shortcut named '{alias}' (user shortcut list)"));
        return Flow::Continue;
    };
    tracing::debug!(alias = %alias, expansion = %expansion, "expanding shortcut");
    shell.reenter(&expansion)
}

