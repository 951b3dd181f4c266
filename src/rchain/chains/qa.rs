use serde::Serialize;
use tracing::debug;

use crate::rchain::chains::ChainError;
use crate::rchain::chat_models::ChatOpenAI;
use crate::rchain::documents::Document;
use crate::rchain::messages::{ChatMessage, Usage};
use crate::rchain::prompts::PromptTemplate;

const QA_SYSTEM_TEMPLATE: &str = "Use the following pieces of context to answer the user's question.\n\
If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\
----------------\n\
{context}";

const DOCUMENT_SEPARATOR: &str = "\n\n";

/// Answer produced by a question-answering chain.
#[derive(Debug, Clone, Serialize)]
pub struct QaAnswer {
    pub answer: String,
    pub usage: Option<Usage>,
}

/// Question answering that puts every document into a single prompt.
#[derive(Debug, Clone)]
pub struct StuffDocumentsChain {
    llm: ChatOpenAI,
}

/// Builds the "stuff" question-answering chain around a chat model.
pub fn load_qa_chain(llm: ChatOpenAI) -> StuffDocumentsChain {
    StuffDocumentsChain { llm }
}

impl StuffDocumentsChain {
    pub fn llm(&self) -> &ChatOpenAI {
        &self.llm
    }

    pub async fn run(&self, documents: &[Document], question: &str) -> Result<QaAnswer, ChainError> {
        let messages = qa_messages(documents, question)?;
        debug!(documents = documents.len(), "running qa chain");
        let reply = self.llm.invoke(&messages).await?;
        Ok(QaAnswer {
            answer: reply.content,
            usage: reply.usage,
        })
    }
}

/// The exact messages the QA chain sends for these inputs.
pub fn qa_messages(documents: &[Document], question: &str) -> Result<Vec<ChatMessage>, ChainError> {
    let question = question.trim();
    if question.is_empty() {
        return Err(ChainError::EmptyQuestion);
    }

    let context = documents
        .iter()
        .map(|document| document.page_content.as_str())
        .collect::<Vec<_>>()
        .join(DOCUMENT_SEPARATOR);
    let system = PromptTemplate::new(QA_SYSTEM_TEMPLATE)?.format(&[("context", context.as_str())])?;

    Ok(vec![ChatMessage::system(system), ChatMessage::user(question)])
}
