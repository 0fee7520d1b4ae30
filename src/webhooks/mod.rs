//! Inbound webhooks: signature verification and payload normalization.

pub mod events;
pub mod parser;
pub mod signature;

pub use events::{
    EntityAction, EntityEvent, FieldValue, GitHubEvent, ProjectFieldEvent, ZenHubEvent,
    ZenHubEventKind,
};
pub use parser::{ParseError, parse_github_webhook, parse_zenhub_form, parse_zenhub_json};
pub use signature::{SignatureError, decode_signature_header, sign_payload, verify_signature};
