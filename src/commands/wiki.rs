use std::time::Instant;

use clap::Args;
use serde_json::{Map, Value, json};
use tracing::{debug, warn};

use crate::commands::CliError;
use crate::commands::options::{ChatArgs, ChatSettings};
use crate::commands::output::{self, Report};
use crate::rchain::chains::load_qa_chain;
use crate::rchain::chains::qa::qa_messages;
use crate::rchain::documents::Document;
use crate::rchain::loaders::wikipedia::{
    DEFAULT_DOC_CONTENT_CHARS_MAX, DEFAULT_LANG, DEFAULT_LOAD_MAX_DOCS,
};
use crate::rchain::loaders::{DocumentLoader, WikipediaLoader};
use crate::rchain::provider::{OPENAI_API_KEY_ENV, is_api_key_present};

#[derive(Debug, Args, Clone)]
pub struct WikiArgs {
    /// Search term for Wikipedia
    pub topic: String,
    /// Question to answer from the loaded pages; defaults to the topic
    pub question: Option<String>,
    /// Wikipedia language edition
    #[arg(long)]
    pub lang: Option<String>,
    /// Number of search results to load
    #[arg(long = "max-docs")]
    pub max_docs: Option<usize>,
    /// Characters kept per page
    #[arg(long = "chars-max", default_value_t = DEFAULT_DOC_CONTENT_CHARS_MAX)]
    pub chars_max: usize,
    /// MediaWiki api.php endpoint to query instead of Wikipedia
    #[arg(long = "wiki-api-url", hide = true)]
    pub wiki_api_url: Option<String>,
    #[command(flatten)]
    pub chat: ChatArgs,
}

pub async fn run(args: WikiArgs) -> Result<(), CliError> {
    let settings = ChatSettings::resolve(&args.chat)?;
    settings.init_logging();

    let topic = args.topic.trim().to_string();
    if topic.is_empty() {
        return Err(CliError::Usage("Wikipedia topic must not be empty.".to_string()));
    }
    let question = args
        .question
        .filter(|question| !question.trim().is_empty())
        .unwrap_or_else(|| topic.clone());

    let lang = args
        .lang
        .or_else(|| settings.profile.wiki_lang.clone())
        .unwrap_or_else(|| DEFAULT_LANG.to_string());
    let max_docs = args
        .max_docs
        .or(settings.profile.wiki_max_docs)
        .unwrap_or(DEFAULT_LOAD_MAX_DOCS);

    let mut loader = WikipediaLoader::new(topic.clone())
        .with_lang(lang.clone())
        .with_load_max_docs(max_docs)
        .with_doc_content_chars_max(args.chars_max);
    if let Some(api_url) = args.wiki_api_url {
        loader = loader.with_api_url(api_url);
    }
    if let Some(timeout_secs) = settings.timeout_secs {
        loader = loader.with_timeout_secs(timeout_secs);
    }
    debug!(
        model = %settings.model,
        lang = %lang,
        max_docs = loader.load_max_docs(),
        api_key_present = is_api_key_present(OPENAI_API_KEY_ENV),
        "wiki settings resolved"
    );

    if settings.dry_run {
        let placeholder = Document::new(format!("<Wikipedia results for '{topic}'>"));
        let messages = qa_messages(&[placeholder], &question)?;
        let mut extras = Map::new();
        extras.insert("wikipedia_api".to_string(), json!(loader.api_url()));
        extras.insert("max_docs".to_string(), json!(loader.load_max_docs()));
        return output::emit_dry_run(&settings, "wiki", &messages, extras);
    }

    let chain = load_qa_chain(settings.chat_model()?);
    let started = Instant::now();
    let documents = loader.load().await?;
    if documents.is_empty() {
        warn!(topic = %topic, "no Wikipedia pages found; answering without context");
    }
    let answer = chain.run(&documents, &question).await?;

    let report = Report::new("wiki", answer.answer, answer.usage, started.elapsed())
        .with_extra("sources", sources(&documents));
    output::emit(&settings, &report)
}

fn sources(documents: &[Document]) -> Value {
    Value::Array(
        documents
            .iter()
            .map(|document| {
                json!({
                    "title": document.metadata_str("title"),
                    "source": document.metadata_str("source"),
                })
            })
            .collect(),
    )
}
