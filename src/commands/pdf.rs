use std::path::PathBuf;
use std::time::Instant;

use clap::Args;
use serde_json::{Map, Value, json};
use tracing::{debug, info};

use crate::commands::options::{ChatArgs, ChatSettings};
use crate::commands::output::{self, Report};
use crate::commands::{CliError, read_input};
use crate::rchain::chains::load_qa_chain;
use crate::rchain::chains::qa::qa_messages;
use crate::rchain::documents::Document;
use crate::rchain::loaders::{DocumentLoader, PdfLoader};
use crate::rchain::provider::{OPENAI_API_KEY_ENV, is_api_key_present};

#[derive(Debug, Args, Clone)]
pub struct PdfArgs {
    /// PDF file to load
    pub path: PathBuf,
    /// Question about the document; read from stdin when omitted
    pub question: Option<String>,
    /// List the pages that were sent to the model
    #[arg(long = "show-sources")]
    pub show_sources: bool,
    #[command(flatten)]
    pub chat: ChatArgs,
}

pub async fn run(args: PdfArgs) -> Result<(), CliError> {
    let settings = ChatSettings::resolve(&args.chat)?;
    settings.init_logging();

    let question = read_input(args.question, "question")?;
    let documents = PdfLoader::new(&args.path).load().await?;
    info!(path = %args.path.display(), pages = documents.len(), "pdf loaded");
    debug!(
        model = %settings.model,
        api_key_present = is_api_key_present(OPENAI_API_KEY_ENV),
        "pdf settings resolved"
    );

    if settings.dry_run {
        let messages = qa_messages(&documents, &question)?;
        let mut extras = Map::new();
        extras.insert("pages".to_string(), json!(documents.len()));
        return output::emit_dry_run(&settings, "pdf", &messages, extras);
    }

    let chain = load_qa_chain(settings.chat_model()?);
    let started = Instant::now();
    let answer = chain.run(&documents, &question).await?;

    let mut report = Report::new("pdf", answer.answer, answer.usage, started.elapsed())
        .with_extra("sources", sources(&documents));
    if args.show_sources {
        report = report.with_footer(source_footer(&documents));
    }
    output::emit(&settings, &report)
}

fn sources(documents: &[Document]) -> Value {
    Value::Array(
        documents
            .iter()
            .map(|document| {
                json!({
                    "source": document.metadata.get("source"),
                    "page": document.metadata.get("page"),
                })
            })
            .collect(),
    )
}

/// Human-facing page list; pages are numbered from 1.
fn source_footer(documents: &[Document]) -> String {
    let pages = documents
        .iter()
        .filter_map(|document| document.metadata.get("page").and_then(Value::as_u64))
        .map(|page| (page + 1).to_string())
        .collect::<Vec<_>>();
    let source = documents
        .first()
        .and_then(|document| document.metadata_str("source"))
        .unwrap_or("pdf");
    format!("\nSources: {source} (pages {})", pages.join(", "))
}
