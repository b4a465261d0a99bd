//! External delivery collaborators.
//!
//! The SMTP sender and the push batch sender sit behind traits so the
//! per-channel dispatchers can be exercised against in-memory fakes;
//! webhook and Discord delivery go straight through a shared
//! `reqwest::Client` in the sender.

pub mod email;
pub mod push;

pub use email::{EmailError, EmailTransport, SmtpConfig, SmtpMailer};
pub use push::{FcmClient, FcmConfig, PushClient, PushError, PushMessage, PushOutcome};
