mod admin;
mod check_config;

pub use admin::cmd_create_admin;
pub use check_config::cmd_check_config;
