pub mod openai;
pub mod relay;
pub mod replicate;
pub mod telegram;
