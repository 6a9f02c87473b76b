pub mod composition;
pub mod errors;
pub mod glycoct;
pub mod primitives;
