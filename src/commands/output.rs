use std::fs;
use std::io::{self, IsTerminal};
use std::path::Path;
use std::time::Duration;

use owo_colors::OwoColorize;
use serde_json::{Map, Value, json};

use crate::commands::CliError;
use crate::commands::options::{ChatSettings, OutputMode};
use crate::rchain::messages::{ChatMessage, Usage};

/// A finished command result, ready to print or save.
#[derive(Debug, Clone)]
pub struct Report {
    pub command: &'static str,
    pub answer: String,
    pub usage: Option<Usage>,
    pub latency: Duration,
    /// Command-specific fields merged into the JSON object.
    pub extras: Map<String, Value>,
    /// Lines printed after the answer in text mode.
    pub footer: Vec<String>,
}

impl Report {
    pub fn new(command: &'static str, answer: String, usage: Option<Usage>, latency: Duration) -> Self {
        Self {
            command,
            answer,
            usage,
            latency,
            extras: Map::new(),
            footer: Vec::new(),
        }
    }

    pub fn with_extra(mut self, key: &str, value: Value) -> Self {
        self.extras.insert(key.to_string(), value);
        self
    }

    pub fn with_footer(mut self, line: String) -> Self {
        self.footer.push(line);
        self
    }

    fn to_json(&self, settings: &ChatSettings) -> Value {
        let mut map = Map::new();
        map.insert("command".to_string(), json!(self.command));
        map.insert("model".to_string(), json!(settings.model));
        map.insert("answer".to_string(), json!(self.answer));
        map.insert("usage".to_string(), json!(self.usage));
        map.insert("latency_ms".to_string(), json!(latency_ms(self.latency)));
        for (key, value) in &self.extras {
            map.insert(key.clone(), value.clone());
        }
        Value::Object(map)
    }
}

/// Prints a result according to the output mode, then saves and reports usage if asked.
pub fn emit(settings: &ChatSettings, report: &Report) -> Result<(), CliError> {
    let body = report.to_json(settings);
    match settings.output {
        OutputMode::Text => {
            println!("{}", report.answer.trim_end());
            for line in &report.footer {
                println!("{line}");
            }
        }
        OutputMode::Json => println!("{body}"),
    }

    if let Some(path) = &settings.save {
        save_json(path, &body)?;
    }

    if settings.show_usage && !settings.quiet() {
        eprintln!("{}", usage_line(report.usage, report.latency, io::stderr().is_terminal()));
    }
    Ok(())
}

/// Prints the request a command would send, without calling the model.
pub fn emit_dry_run(
    settings: &ChatSettings,
    command: &'static str,
    messages: &[ChatMessage],
    extras: Map<String, Value>,
) -> Result<(), CliError> {
    let mut map = Map::new();
    map.insert("dry_run".to_string(), Value::Bool(true));
    map.insert("command".to_string(), json!(command));
    map.insert("model".to_string(), json!(settings.model));
    map.insert("output".to_string(), json!(settings.output.as_str()));
    map.insert("messages".to_string(), json!(messages));
    map.insert("request".to_string(), settings.request_preview(messages));
    for (key, value) in extras {
        map.insert(key, value);
    }
    let body = Value::Object(map);

    println!("{body}");
    if let Some(path) = &settings.save {
        save_json(path, &body)?;
    }
    if settings.show_usage && !settings.quiet() {
        eprintln!(
            "{} unavailable latency_ms=0 (dry-run)",
            usage_label(io::stderr().is_terminal())
        );
    }
    Ok(())
}

fn save_json(path: &Path, body: &Value) -> Result<(), CliError> {
    if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|source| CliError::SaveDir {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, format!("{body}\n")).map_err(|source| CliError::SaveWrite {
        path: path.to_path_buf(),
        source,
    })
}

fn usage_label(colored: bool) -> String {
    if colored {
        "usage:".dimmed().to_string()
    } else {
        "usage:".to_string()
    }
}

fn usage_line(usage: Option<Usage>, latency: Duration, colored: bool) -> String {
    let latency_ms = latency_ms(latency);
    match usage {
        Some(usage) => format!(
            "{} prompt={} completion={} total={} latency_ms={latency_ms}",
            usage_label(colored),
            count(usage.prompt_tokens),
            count(usage.completion_tokens),
            count(usage.total_tokens),
        ),
        None => format!("{} unavailable latency_ms={latency_ms}", usage_label(colored)),
    }
}

fn count(value: Option<u32>) -> String {
    value.map_or_else(|| "?".to_string(), |value| value.to_string())
}

fn latency_ms(latency: Duration) -> u64 {
    u64::try_from(latency.as_millis()).unwrap_or(u64::MAX)
}
