use std::env;
use std::path::PathBuf;

use clap::{Args, ValueEnum};

use crate::commands::CliError;
use crate::config::{self, ProfileConfig};
use crate::logging::{self, Verbosity};
use crate::rchain::chat_models::{ChatOpenAI, preview_request};
use crate::rchain::messages::ChatMessage;

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
pub const DEFAULT_TEMPERATURE: f64 = 0.0;

const MODEL_ENV: &str = "CP_MODEL";
const TEMPERATURE_ENV: &str = "CP_TEMPERATURE";
const MAX_TOKENS_ENV: &str = "CP_MAX_TOKENS";
const TIMEOUT_ENV: &str = "CP_TIMEOUT";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputMode {
    Text,
    Json,
}

impl OutputMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Json => "json",
        }
    }

    fn parse(value: &str) -> Option<Self> {
        match value {
            "text" => Some(Self::Text),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

/// Options shared by every subcommand that talks to the chat model.
#[derive(Debug, Args, Clone, Default)]
pub struct ChatArgs {
    /// Chat model name [env: CP_MODEL] [default: gpt-3.5-turbo]
    #[arg(long)]
    pub model: Option<String>,
    /// Sampling temperature, 0 to 2 [env: CP_TEMPERATURE] [default: 0]
    #[arg(long)]
    pub temperature: Option<f64>,
    /// Upper bound on generated tokens [env: CP_MAX_TOKENS]
    #[arg(long = "max-tokens")]
    pub max_tokens: Option<u32>,
    /// Per-request timeout in seconds [env: CP_TIMEOUT]
    #[arg(long)]
    pub timeout: Option<u64>,
    /// Profile name from the config file
    #[arg(long)]
    pub profile: Option<String>,
    /// Output format
    #[arg(long, value_enum)]
    pub output: Option<OutputMode>,
    /// Shorthand for --output json
    #[arg(long)]
    pub json: bool,
    /// Print token usage and latency on stderr
    #[arg(long = "show-usage")]
    pub show_usage: bool,
    /// Also write the JSON result to this file
    #[arg(long)]
    pub save: Option<PathBuf>,
    /// Print the request instead of calling the model
    #[arg(long = "dry-run")]
    pub dry_run: bool,
    /// Debug logging on stderr
    #[arg(short, long)]
    pub verbose: bool,
    /// Only fatal errors on stderr
    #[arg(short, long)]
    pub quiet: bool,
}

/// Settings after applying CLI > environment > profile > default.
#[derive(Debug, Clone)]
pub struct ChatSettings {
    pub model: String,
    pub temperature: f64,
    pub max_tokens: Option<u32>,
    pub timeout_secs: Option<u64>,
    pub output: OutputMode,
    pub show_usage: bool,
    pub save: Option<PathBuf>,
    pub dry_run: bool,
    pub verbosity: Verbosity,
    pub profile: ProfileConfig,
}

impl ChatSettings {
    /// Resolves settings from the process environment and the optional profile.
    pub fn resolve(args: &ChatArgs) -> Result<Self, CliError> {
        let profile = match &args.profile {
            Some(name) => config::load_profile(name)?,
            None => ProfileConfig::default(),
        };
        Self::resolve_with(args, profile, |name| env::var(name).ok())
    }

    pub fn resolve_with<F>(args: &ChatArgs, profile: ProfileConfig, env: F) -> Result<Self, CliError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = |name: &str| env(name).filter(|value| !value.trim().is_empty());

        let model = args
            .model
            .clone()
            .or_else(|| env(MODEL_ENV))
            .or_else(|| profile.model.clone())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        if model.trim().is_empty() {
            return Err(CliError::Usage(
                "No model provided. Use --model or set CP_MODEL.".to_string(),
            ));
        }

        let temperature = match args.temperature {
            Some(value) => value,
            None => match env(TEMPERATURE_ENV) {
                Some(raw) => parse_env(TEMPERATURE_ENV, &raw, "expected a number")?,
                None => profile.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            },
        };
        if !(0.0..=2.0).contains(&temperature) {
            return Err(CliError::Usage(format!(
                "Invalid temperature {temperature}: expected a value between 0 and 2."
            )));
        }

        let max_tokens = match args.max_tokens {
            Some(value) => Some(non_zero("--max-tokens", value, "expected a positive integer")?),
            None => match env(MAX_TOKENS_ENV) {
                Some(raw) => {
                    let value = parse_env(MAX_TOKENS_ENV, &raw, "expected a positive integer")?;
                    Some(non_zero(MAX_TOKENS_ENV, value, "expected a positive integer")?)
                }
                None => profile.max_tokens,
            },
        };
        let timeout_secs = match args.timeout {
            Some(value) => Some(non_zero("--timeout", value, "expected a positive number of seconds")?),
            None => match env(TIMEOUT_ENV) {
                Some(raw) => {
                    let value = parse_env(TIMEOUT_ENV, &raw, "expected a positive number of seconds")?;
                    Some(non_zero(TIMEOUT_ENV, value, "expected a positive number of seconds")?)
                }
                None => profile.timeout,
            },
        };

        let profile_output = match profile.output.as_deref() {
            Some(raw) => Some(OutputMode::parse(raw).ok_or_else(|| {
                CliError::Usage(format!("Invalid profile output '{raw}'. Supported values: text, json."))
            })?),
            None => None,
        };
        let output = if args.json {
            OutputMode::Json
        } else {
            args.output.or(profile_output).unwrap_or(OutputMode::Text)
        };

        Ok(Self {
            model,
            temperature,
            max_tokens,
            timeout_secs,
            output,
            show_usage: args.show_usage || profile.show_usage.unwrap_or(false),
            save: args.save.clone(),
            dry_run: args.dry_run,
            verbosity: Verbosity::from_flags(args.verbose, args.quiet),
            profile,
        })
    }

    pub fn init_logging(&self) {
        logging::init(self.verbosity);
    }

    pub fn quiet(&self) -> bool {
        self.verbosity == Verbosity::Quiet
    }

    /// Builds the OpenAI client; requires `OPENAI_API_KEY`.
    pub fn chat_model(&self) -> Result<ChatOpenAI, CliError> {
        let mut chat = ChatOpenAI::from_env(self.model.clone())?.with_temperature(self.temperature);
        if let Some(max_tokens) = self.max_tokens {
            chat = chat.with_max_tokens(max_tokens);
        }
        if let Some(timeout_secs) = self.timeout_secs {
            chat = chat.with_timeout_secs(timeout_secs);
        }
        Ok(chat)
    }

    /// Dry-run view of the request; works without a key.
    pub fn request_preview(&self, messages: &[ChatMessage]) -> serde_json::Value {
        preview_request(
            &self.model,
            messages,
            Some(self.temperature),
            self.max_tokens,
            self.timeout_secs,
        )
    }
}

fn parse_env<T: std::str::FromStr>(name: &str, raw: &str, expected: &str) -> Result<T, CliError> {
    raw.trim()
        .parse()
        .map_err(|_| CliError::Usage(format!("Invalid {name} '{raw}': {expected}.")))
}

fn non_zero<T: Default + PartialEq + std::fmt::Display>(
    name: &str,
    value: T,
    expected: &str,
) -> Result<T, CliError> {
    if value == T::default() {
        return Err(CliError::Usage(format!("Invalid {name} '{value}': {expected}.")));
    }
    Ok(value)
}
