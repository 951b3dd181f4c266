use std::path::PathBuf;
use std::time::Instant;

use clap::{Args, ValueEnum};
use serde_json::{Map, json};
use tracing::debug;

use crate::commands::options::{ChatArgs, ChatSettings};
use crate::commands::output::{self, Report};
use crate::commands::{CliError, read_input};
use crate::rchain::api_docs::{ApiDocsSource, load_api_docs};
use crate::rchain::chains::ApiChain;
use crate::rchain::chains::api::base_hosts;
use crate::rchain::chat_models::ChatOpenAI;
use crate::rchain::provider::{NYT_API_KEY_ENV, OPENAI_API_KEY_ENV, is_api_key_present};

const NYT_KEY_PARAM: &str = "api-key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DocsPreset {
    /// Numbers API (inline docs, no key)
    Numbers,
    /// New York Times APIs (needs NYT_API_KEY)
    Nyt,
}

#[derive(Debug, Args, Clone)]
pub struct ApiArgs {
    /// Natural-language question; read from stdin when omitted
    pub question: Option<String>,
    /// Bundled API documentation to use
    #[arg(long, value_enum, default_value_t = DocsPreset::Numbers)]
    pub docs: DocsPreset,
    /// Read API documentation from a file instead
    #[arg(long = "docs-file", conflicts_with = "docs_url")]
    pub docs_file: Option<PathBuf>,
    /// Fetch API documentation from a URL instead
    #[arg(long = "docs-url")]
    pub docs_url: Option<String>,
    /// Extra host the generated URL may point at (repeatable)
    #[arg(long = "allow-domain")]
    pub allow_domain: Vec<String>,
    /// Environment variable holding a key for the target API
    #[arg(long = "api-key-env", requires = "api_key_param")]
    pub api_key_env: Option<String>,
    /// Query parameter the key is sent as
    #[arg(long = "api-key-param", requires = "api_key_env")]
    pub api_key_param: Option<String>,
    /// Characters of the API response passed to the model
    #[arg(long = "max-response-chars")]
    pub max_response_chars: Option<usize>,
    #[command(flatten)]
    pub chat: ChatArgs,
}

impl ApiArgs {
    fn docs_source(&self) -> ApiDocsSource {
        if let Some(path) = &self.docs_file {
            ApiDocsSource::File(path.clone())
        } else if let Some(url) = &self.docs_url {
            ApiDocsSource::Url(url.clone())
        } else {
            match self.docs {
                DocsPreset::Numbers => ApiDocsSource::Numbers,
                DocsPreset::Nyt => ApiDocsSource::Nyt,
            }
        }
    }

    /// Key variable and query parameter, if the target API needs one.
    fn key_binding(&self) -> Option<(String, String)> {
        match (&self.api_key_env, &self.api_key_param) {
            (Some(env), Some(param)) => Some((env.clone(), param.clone())),
            _ if self.docs == DocsPreset::Nyt => {
                Some((NYT_API_KEY_ENV.to_string(), NYT_KEY_PARAM.to_string()))
            }
            _ => None,
        }
    }
}

pub async fn run(args: ApiArgs) -> Result<(), CliError> {
    let settings = ChatSettings::resolve(&args.chat)?;
    settings.init_logging();

    let question = read_input(args.question.clone(), "question")?;
    let source = args.docs_source();
    let client = reqwest::Client::new();
    let api_docs = load_api_docs(&source, &client, settings.timeout_secs).await?;
    debug!(
        docs = %source.describe(),
        chars = api_docs.chars().count(),
        api_key_present = is_api_key_present(OPENAI_API_KEY_ENV),
        "api docs loaded"
    );

    if settings.dry_run {
        // Placeholder key: dry-run never sends a request.
        let llm = ChatOpenAI::new(settings.model.clone(), "dry-run")?;
        let chain = build_chain(llm, &api_docs, &args)?;
        let messages = chain.url_messages(&question)?;
        let mut extras = Map::new();
        extras.insert("docs".to_string(), json!(source.describe()));
        extras.insert("allowed_domains".to_string(), json!(chain.limit_to_domains()));
        return output::emit_dry_run(&settings, "api", &messages, extras);
    }

    let mut chain = build_chain(settings.chat_model()?, &api_docs, &args)?;
    if let Some(timeout_secs) = settings.timeout_secs {
        chain = chain.with_timeout_secs(timeout_secs);
    }
    if let Some((key_env, param)) = args.key_binding() {
        let key = lookup_key(&key_env)?;
        debug!(key_env = %key_env, param = %param, "attaching API key");
        chain = chain.with_query_param(param, key);
    }

    let started = Instant::now();
    let answer = chain.run(&question).await?;

    let report = Report::new("api", answer.answer, answer.usage, started.elapsed())
        .with_extra("api_url", json!(answer.api_url));
    output::emit(&settings, &report)
}

fn build_chain(llm: ChatOpenAI, api_docs: &str, args: &ApiArgs) -> Result<ApiChain, CliError> {
    let mut chain = ApiChain::from_llm_and_api_docs(llm, api_docs)?;
    if base_hosts(api_docs).is_empty() && args.allow_domain.is_empty() {
        return Err(CliError::Usage(
            "API docs do not name a BASE URL. Pass --allow-domain for the API host.".to_string(),
        ));
    }
    for domain in &args.allow_domain {
        chain = chain.allow_domain(domain.clone());
    }
    if let Some(max_response_chars) = args.max_response_chars {
        chain = chain.with_max_response_chars(max_response_chars);
    }
    Ok(chain)
}

fn lookup_key(key_env: &str) -> Result<String, CliError> {
    std::env::var(key_env)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or_else(|| CliError::Usage(format!("{key_env} is not set in the environment")))
}
