pub mod base64url;
pub mod credential_format;
pub mod credential_store;
pub mod dcql_query;
pub mod evaluator;
pub mod request;
