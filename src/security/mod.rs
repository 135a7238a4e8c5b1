pub mod audit_log;
pub mod authenticator;
pub mod bearer;
pub mod credential_cache;
pub mod exchange;
pub mod privileges;
pub mod signer;
