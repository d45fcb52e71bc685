pub mod engine;
pub mod extract;
pub mod score;
pub mod validator;
