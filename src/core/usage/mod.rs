pub mod extractor;
pub mod scanner;
