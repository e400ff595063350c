//! Permission checks for rules commands.
//!
//! Chat member lookups are cached per `(chat, user)`; bot owners from
//! `OWNER_IDS` bypass every check.

mod checker;

pub use checker::Permissions;
