pub mod fallback;
pub mod providers;
pub mod recommendations;
pub mod scanner;
pub mod text_extract;
