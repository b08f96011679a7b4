use clap::{ArgGroup, arg};
use squatwatch_scanner::ProxyConfig;
use url::Url;

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);

/// Two-letter short flags clap cannot express, mapped to their long forms.
const LEGACY_FLAGS: [(&str, &str); 3] = [
    ("-oC", "--csv-out"),
    ("-oJ", "--json-out"),
    ("-iL", "--input-list"),
];

/// Rewrite `-oC`, `-oJ` and `-iL` (also with an attached value, e.g.
/// `-oCout.csv`) into the long flags before clap sees them.
pub fn normalize_legacy_flags<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut normalized = Vec::new();
    let mut passthrough = false;

    for arg in args {
        if passthrough || arg == "--" {
            passthrough = true;
            normalized.push(arg);
            continue;
        }

        let legacy = LEGACY_FLAGS
            .iter()
            .find_map(|(short, long)| arg.strip_prefix(short).map(|rest| (*long, rest)));

        match legacy {
            Some((long, "")) => normalized.push(long.to_string()),
            Some((long, rest)) => {
                normalized.push(long.to_string());
                normalized.push(rest.strip_prefix('=').unwrap_or(rest).to_string());
            }
            None => normalized.push(arg),
        }
    }

    normalized
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("squatwatch")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("squatwatch")
        .about("Check ImmuniWeb Radar for cyber/typo-squatting threat intel on the given domain(s).")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Enable verbose output. Ex: -v, -vv, -vvv")
                .required(false)
                .action(clap::ArgAction::Count),
        )
        .arg(
            arg!(-d --"domain" <DOMAIN>)
                .required(false)
                .help("Get results for a single domain."),
        )
        .arg(
            arg!(--"input-list" <PATH>)
                .required(false)
                .help("Newline-delimited list of domains to check (also -iL).")
                .value_parser(clap::value_parser!(std::path::PathBuf)),
        )
        .group(
            ArgGroup::new("target")
                .args(["domain", "input-list"])
                .required(true)
                .multiple(false),
        )
        .arg(
            arg!(-p --"proxy" <PROXY>)
                .required(false)
                .help("Proxy to use, such as a rotating proxy. Example: socks5://127.0.0.1:9050")
                .value_parser(ProxyConfig::parse),
        )
        .arg(
            arg!(--"csv-out" <PATH>)
                .required(false)
                .help("Dump results to csv file (also -oC)."),
        )
        .arg(
            arg!(--"json-out" <PATH>)
                .required(false)
                .help("Dump results to json file (also -oJ)."),
        )
        .arg(
            arg!(x: -x "Keeps the browser open (for debugging purposes).")
                .required(false)
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(-t --"threads" <NUM_WORKERS>)
                .required(false)
                .help("The number of browser sessions to run at once for --input-list.")
                .value_parser(clap::value_parser!(usize))
                .default_value("4"),
        )
        .arg(
            arg!(--"headless")
                .required(false)
                .help("Run Firefox without a visible window")
                .action(clap::ArgAction::SetTrue),
        )
        .arg(
            arg!(--"webdriver-url" <URL>)
                .required(false)
                .help("Use a running WebDriver server instead of spawning geckodriver")
                .value_parser(clap::value_parser!(Url)),
        )
}
