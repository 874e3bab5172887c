use super::{Branch, branch, leaf, require, require_rest_raw};
use crate::error::{format_cli_error, mask_secret};
use crate::shell::{Flow, Shell};
use crate::tokenizer::TokenQueue;

pub static AI: Branch = Branch {
    name: "ai",
    entries: &[
        branch("apikey", "apikey set <key> | apikey get", &APIKEY),
        leaf("chat", "chat <message>: one message to chat", chat),
        leaf("get", "get <field>: one field of the last response", get),
        leaf("dump", "print the last prompt and full response", dump),
        leaf("log", "save the last exchange and offer to extract code blocks", log),
        leaf("enable", "re-validate the stored key and turn chat on", enable),
        leaf("disable", "turn chat off", disable),
        leaf("explain", "ask chat about the last terminal command and its output", explain),
    ],
    default: Some(make_default),
};

static APIKEY: Branch = Branch {
    name: "ai apikey",
    entries: &[
        leaf("set", "set <key>: store and validate a key", apikey_set),
        leaf("get", "show the stored key (masked)", apikey_get),
    ],
    default: None,
};

fn make_default(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.session.default_to_chat = true;
    if shell.chat.is_enabled() {
        shell.say("free text now goes to chat");
    } else {
        shell.say("free text goes to chat once it is enabled (ai apikey set <key>)");
    }
    Flow::Continue
}

fn apikey_set(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(key) = require(shell, queue) else {
        return Flow::Continue;
    };
    if shell.chat.set_api_key(&key) {
        shell.say("API key accepted, chat enabled");
    } else {
        shell.say("API key stored but validation failed; chat disabled");
    }
    Flow::Continue
}

fn apikey_get(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    let text = match shell.chat.api_key() {
        Some(key) => mask_secret(key),
        None => "no API key set".to_string(),
    };
    shell.say(&text);
    Flow::Continue
}

fn chat(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    if let Some(message) = require_rest_raw(shell, queue) {
        shell.chat_message(&message);
    }
    Flow::Continue
}

fn get(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(field) = require(shell, queue) else {
        return Flow::Continue;
    };
    let text = match shell.chat.last_response() {
        None => "no response yet".to_string(),
        Some(response) => response
            .get(&field)
            .unwrap_or_else(|| format!("no field '{field}' in the last response")),
    };
    shell.say(&text);
    Flow::Continue
}

fn dump(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    let text = shell
        .chat
        .dump()
        .unwrap_or_else(|| "no response yet".to_string());
    shell.say(&text);
    Flow::Continue
}

fn log(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    match shell.log_last_exchange() {
        Ok(Some(_)) => {}
        Ok(None) => shell.say("nothing to log yet"),
        Err(err) => {
            let text = format_cli_error(&err);
            shell.say(&text);
        }
    }
    Flow::Continue
}

fn enable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    if shell.chat.api_key().is_none() {
        shell.say("no API key set (ai apikey set <key>)");
        return Flow::Continue;
    }
    if shell.chat.enable() {
        shell.say("chat enabled");
    } else {
        shell.say("API key validation failed; chat stays disabled");
    }
    Flow::Continue
}

fn disable(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    shell.chat.disable();
    shell.say("chat disabled");
    Flow::Continue
}

fn explain(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    let Some(record) = shell.passthrough.last_record().cloned() else {
        shell.say("no terminal command has run yet");
        return Flow::Continue;
    };
    let status = match record.exit_code {
        Some(code) => code.to_string(),
        None => "none".to_string(),
    };
    let message = format!(
        "Explain what happened when I ran this terminal command, and how to fix any error.\n\
         Command: {}\nExit status: {}\nOutput:\n{}",
        record.command, status, record.output
    );
    shell.chat_message(&message);
    Flow::Continue
}
