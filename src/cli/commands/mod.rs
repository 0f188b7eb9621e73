mod tokens;
mod users;

pub use tokens::{cmd_cleanup_tokens, cmd_revoke_user};
pub use users::cmd_create_user;
