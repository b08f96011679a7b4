use colored::Colorize;

pub mod report;
pub mod search;

pub use report::{
    generate_csv_report, generate_json_report, generate_text_report, report_timestamp,
    save_report,
};
pub use search::{SearchFailure, SearchOptions, SearchOutcome, SearchProgressCallback, execute_search};

const BANNER: &str = r#"
                        _                    _       _
  ___  __ _ _   _  __ _| |___      ____ _ __| |_ ___| |__
 / __|/ _` | | | |/ _` | __\ \ /\ / / _` / _` __/ __| '_ \
 \__ \ (_| | |_| | (_| | |_ \ V  V / (_| \__ \ || (__| | | |
 |___/\__, |\__,_|\__,_|\__| \_/\_/ \__,_|___/\__\___|_| |_|
         |_|
"#;

pub fn print_banner() {
    println!("{}", BANNER.bright_cyan().bold());
    println!(
        "  {} v{}\n",
        "cyber/typo-squatting lookups via ImmuniWeb Radar".bright_white(),
        env!("CARGO_PKG_VERSION")
    );
}
