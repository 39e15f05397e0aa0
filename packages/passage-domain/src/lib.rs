pub mod fuzzy;
pub mod phrase;
pub mod sanitize;
pub mod tokenize;
