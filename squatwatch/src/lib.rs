pub mod commands;
pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use commands::{command_argument_builder, normalize_legacy_flags};
pub use handlers::{
    SearchArgs, load_domains_from_file, load_domains_from_source, parse_domain_line,
};
