use squatwatch::commands::{command_argument_builder, normalize_legacy_flags};
use squatwatch::handlers::{handle_search, init_logging};
use squatwatch_core::print_banner;

#[tokio::main]
async fn main() {
    let args = normalize_legacy_flags(std::env::args());
    let matches = command_argument_builder().get_matches_from(args);

    init_logging(matches.get_count("verbose"));

    // Show banner unless --quiet flag is set
    if !matches.get_flag("quiet") {
        print_banner();
    }

    handle_search(&matches).await;
}
