pub mod console;
pub mod tag;
