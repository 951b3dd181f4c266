use std::time::Instant;

use clap::Args;
use serde_json::Map;
use tracing::debug;

use crate::commands::options::{ChatArgs, ChatSettings};
use crate::commands::output::{self, Report};
use crate::commands::{CliError, read_input};
use crate::rchain::messages::ChatMessage;
use crate::rchain::provider::{OPENAI_API_KEY_ENV, is_api_key_present};

#[derive(Debug, Args, Clone)]
pub struct AskArgs {
    /// Prompt text; read from stdin when omitted
    pub prompt: Option<String>,
    /// System message sent before the prompt
    #[arg(long)]
    pub system: Option<String>,
    #[command(flatten)]
    pub chat: ChatArgs,
}

pub async fn run(args: AskArgs) -> Result<(), CliError> {
    let settings = ChatSettings::resolve(&args.chat)?;
    settings.init_logging();

    let prompt = read_input(args.prompt, "prompt")?;
    let mut messages = Vec::with_capacity(2);
    if let Some(system) = args.system.or_else(|| settings.profile.system.clone()) {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(prompt));

    debug!(
        model = %settings.model,
        api_key_present = is_api_key_present(OPENAI_API_KEY_ENV),
        dry_run = settings.dry_run,
        "ask settings resolved"
    );
    if settings.dry_run {
        return output::emit_dry_run(&settings, "ask", &messages, Map::new());
    }

    let chat = settings.chat_model()?;
    let started = Instant::now();
    let reply = chat.invoke(&messages).await?;

    let report = Report::new("ask", reply.content, reply.usage, started.elapsed());
    output::emit(&settings, &report)
}
