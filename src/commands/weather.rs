use super::{Branch, leaf, require};
use crate::shell::{Flow, Shell};
use crate::tokenizer::TokenQueue;

pub static WEATHER: Branch = Branch {
    name: "weather",
    entries: &[
        leaf("get", "get <field>: one value, e.g. temperature or windSpeed", get),
        leaf("refresh", "fetch fresh data and print the summary", refresh),
    ],
    default: Some(summary),
};

fn show_summary(shell: &mut Shell, refresh: bool) -> Flow {
    let location = shell.session.location.clone();
    let result = shell
        .weather
        .current(&location, refresh)
        .map(|snapshot| snapshot.summary());
    match result {
        Ok(text) => shell.say(&text),
        Err(err) => shell.report_weather_error(err),
    }
    Flow::Continue
}

fn summary(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    show_summary(shell, false)
}

fn refresh(shell: &mut Shell, _queue: &mut TokenQueue) -> Flow {
    show_summary(shell, true)
}

fn get(shell: &mut Shell, queue: &mut TokenQueue) -> Flow {
    let Some(field) = require(shell, queue) else {
        return Flow::Continue;
    };
    let location = shell.session.location.clone();
    match shell.weather.field(&location, &field) {
        Ok(value) => shell.say(&format!("{field}: {value}")),
        Err(err) => shell.report_weather_error(err),
    }
    Flow::Continue
}
