use super::memory::Exchange;

pub const NO_ANSWER: &str = "The dataset does not contain this information.";

const QA_TEMPLATE: &str = r#"
You are an expert on Bangladeshi forestry and the timber industry,
but you can also have a friendly casual conversation.

Rules:
- If the user greets (e.g., "hi", "hello", "hey"), respond in a warm and friendly way.
- If the user introduces themselves (e.g., "I am Hasib"), acknowledge and respond kindly.
- If the user's question is about Bangladeshi forestry or timber industry, use the context below to answer.
- If the context does NOT contain the answer to a forestry/timber question, say exactly:
"{no_answer}"
- For other casual or off-topic questions, respond in a friendly and interactive way without using context.

Chat History:
{chat_history}

Context (only for forestry/timber questions):
{context}

User: {question}

Answer:
"#;

const CONDENSE_TEMPLATE: &str = "Given the following conversation and a follow up question, \
rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

/// Renders history as alternating `Human:` / `Assistant:` lines.
pub fn format_chat_history(history: &[Exchange]) -> String {
    history
        .iter()
        .map(|turn| format!("\nHuman: {}\nAssistant: {}", turn.question, turn.answer))
        .collect()
}

pub fn qa_prompt(chat_history: &str, context: &[&str], question: &str) -> String {
    QA_TEMPLATE
        .replace("{no_answer}", NO_ANSWER)
        .replace("{chat_history}", chat_history)
        .replace("{context}", &context.join("\n\n"))
        .replace("{question}", question)
}

pub fn condense_prompt(chat_history: &str, question: &str) -> String {
    CONDENSE_TEMPLATE
        .replace("{chat_history}", chat_history)
        .replace("{question}", question)
}
