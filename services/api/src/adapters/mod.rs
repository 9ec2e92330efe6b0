pub mod db;
pub mod gemini_llm;
pub mod openai_llm;

pub use db::DbAdapter;
pub use gemini_llm::GeminiGenerationAdapter;
pub use openai_llm::OpenAiGenerationAdapter;
