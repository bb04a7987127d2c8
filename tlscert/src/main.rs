//! tlscert: show the certificate of a TLS endpoint or file, with its chain,
//! validity and revocation status.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::time::Duration;
use tlscert_lib::ocsp;
use tlscert_lib::sct::{self, LogList};
use tlscert_lib::{
    display_table, to_json, Badge, Certificate, CertificateReport, ChainResolver, ResolverConfig,
    Retriever, RetrieverConfig, RevocationReport, SctReport, TrustStore, Validator,
};
use tracing::warn;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "tlscert",
    version,
    about = "Show the certificate of a TLS server or a certificate file",
    long_about = "tlscert fetches a certificate and prints its details, whether it\n\
                  validates against the system trust store and, when the certificate\n\
                  names an OCSP responder, whether it has been revoked.\n\n\
                  LOCATOR is a host:port, a tcp://, udp:// or https:// address of a\n\
                  TLS server, an http(s):// URL of a certificate file, or a local path.\n\
                  Missing intermediates are downloaded from the Authority Information\n\
                  Access URLs of the certificates unless --no-aia is given.",
    after_help = "EXAMPLES:\n\
                  \n  tlscert example.com:443\
                  \n  tlscert https://example.com --show-chain\
                  \n  tlscert udp://dns.example.net:853\
                  \n  tlscert --scts https://example.com\
                  \n  tlscert http://crt.example.net/issuer.p7c\
                  \n  tlscert --json --ca-file roots.pem cert.pem"
)]
struct Cli {
    /// Server address, URL or file to take the certificate from
    locator: String,

    /// Also print every certificate of the chain
    #[arg(long)]
    show_chain: bool,

    /// Do not download issuers from AIA URLs
    #[arg(long)]
    no_aia: bool,

    /// Print Signed Certificate Timestamps
    #[arg(long)]
    scts: bool,

    /// Output in JSON format
    #[arg(long)]
    json: bool,

    /// Input format: der, pem, p7c, pfx (default: from extension, else auto-detect)
    #[arg(long, value_name = "FORMAT")]
    format: Option<String>,

    /// PEM bundle of trusted roots (default: system trust store)
    #[arg(long, value_name = "FILE")]
    ca_file: Option<PathBuf>,

    /// CT log list URL or file, used to name SCT logs
    #[arg(long, value_name = "SOURCE", default_value = sct::DEFAULT_LOG_LIST_URL)]
    ct_log_list: String,

    /// Timeout for establishing connections (e.g. 5s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "5s")]
    connect_timeout: String,

    /// Timeout for handshakes and HTTP requests (e.g. 10s, 1m)
    #[arg(long, value_name = "DURATION", default_value = "10s")]
    timeout: String,

    /// Maximum number of issuers downloaded in a row
    #[arg(long, value_name = "N", default_value_t = ResolverConfig::default().max_hops)]
    max_aia_hops: usize,

    /// Accept invalid certificates on HTTPS downloads (AIA, OCSP, log list)
    #[arg(long)]
    insecure: bool,

    /// Log every network step to stderr
    #[arg(short, long)]
    verbose: bool,
}

/// Parse a duration string: humantime notation (`30s`, `1m30s`) or plain seconds.
fn parse_duration(s: &str) -> Result<Duration> {
    if !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()) {
        let secs: u64 = s.parse().context("Invalid duration value")?;
        return Ok(Duration::from_secs(secs));
    }
    humantime::parse_duration(s).with_context(|| format!("Invalid duration: '{s}'"))
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn badge(badge: Badge) -> String {
    match badge {
        Badge::Valid => badge.label().black().on_bright_green().to_string(),
        Badge::NotValid | Badge::Revoked => badge.label().white().on_bright_red().to_string(),
    }
}

/// Gathers validity, revocation and SCT data for one certificate.
struct Reporter<'a> {
    validator: Validator<'a>,
    retriever: &'a Retriever,
    logs: Option<&'a LogList>,
}

impl Reporter<'_> {
    fn report(&self, cert: &Certificate) -> CertificateReport {
        let validity = self.validator.validate(cert);
        let revocation = if cert.info().ocsp_urls().is_empty() {
            None
        } else {
            Some(RevocationReport::from(ocsp::check(cert, self.retriever)))
        };
        let scts = match self.logs {
            Some(logs) => sct::extract_scts(cert.info())
                .iter()
                .map(|s| SctReport::new(s, logs))
                .collect(),
            None => Vec::new(),
        };
        CertificateReport::new(cert, &validity, revocation, scts)
    }
}

fn print_report(report: &CertificateReport) {
    println!(
        "{} {}",
        badge(report.badge()),
        report.certificate.common_name()
    );
    print!("{}", display_table(report));
}

fn run(cli: &Cli) -> Result<()> {
    let config = RetrieverConfig {
        connect_timeout: parse_duration(&cli.connect_timeout)?,
        request_timeout: parse_duration(&cli.timeout)?,
        accept_invalid_http_certs: cli.insecure,
    };
    let retriever = Retriever::new(config).context("failed to set up HTTP client")?;

    let mut cert = retriever
        .get_certificate(&cli.locator, cli.format.as_deref())
        .with_context(|| format!("failed to get certificate from {}", cli.locator))?;

    if !cli.no_aia {
        let resolver = ChainResolver::new(
            &retriever,
            ResolverConfig {
                max_hops: cli.max_aia_hops,
            },
        );
        resolver.resolve(&mut cert);
    }

    let trust_store = match &cli.ca_file {
        Some(path) => TrustStore::from_pem_file(path)
            .with_context(|| format!("failed to load CA file {}", path.display()))?,
        None => TrustStore::system().unwrap_or_else(|e| {
            warn!("{}", e);
            TrustStore::new()
        }),
    };

    let logs = if cli.scts {
        Some(
            LogList::load(&cli.ct_log_list, &retriever).unwrap_or_else(|e| {
                warn!("failed to load CT log list: {}", e);
                LogList::empty()
            }),
        )
    } else {
        None
    };

    let reporter = Reporter {
        validator: Validator::new(&trust_store),
        retriever: &retriever,
        logs: logs.as_ref(),
    };
    let mut report = reporter.report(&cert);
    let members = if cli.show_chain {
        cert.chain_certificates()
    } else {
        Vec::new()
    };

    if cli.json {
        report.chain = members.iter().map(|m| reporter.report(m)).collect();
        println!("{}", to_json(&report)?);
        return Ok(());
    }

    print_report(&report);
    for member in &members {
        println!("{}", "-".repeat(30));
        print_report(&reporter.report(member));
    }
    Ok(())
}

/// Exit status for a command line that did not parse: `--help` and
/// `--version` succeed, usage errors fail with 1.
fn usage_exit_code(e: &clap::Error) -> i32 {
    if e.use_stderr() {
        1
    } else {
        0
    }
}

fn main() {
    let cli = Cli::try_parse().unwrap_or_else(|e| {
        if e.print().is_err() {
            std::process::exit(1);
        }
        std::process::exit(usage_exit_code(&e))
    });
    init_logging(cli.verbose);

    if let Err(e) = run(&cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    // ---- Duration parsing ----

    #[test]
    fn plain_numbers_are_seconds() {
        assert_eq!(parse_duration("5").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("0").unwrap(), Duration::ZERO);
    }

    #[test]
    fn humantime_units() {
        assert_eq!(parse_duration("10s").unwrap(), Duration::from_secs(10));
        assert_eq!(parse_duration("2m").unwrap(), Duration::from_secs(120));
        assert_eq!(parse_duration("1m30s").unwrap(), Duration::from_secs(90));
        assert_eq!(
            parse_duration("500ms").unwrap(),
            Duration::from_millis(500)
        );
    }

    #[test]
    fn reject_bad_durations() {
        assert!(parse_duration("").is_err());
        assert!(parse_duration("-5s").is_err());
        assert!(parse_duration("3.5").is_err());
        assert!(parse_duration("10x").is_err());
    }

    // ---- Arguments ----

    #[test]
    fn defaults() {
        let cli = Cli::try_parse_from(["tlscert", "example.com:443"]).unwrap();
        assert_eq!(cli.locator, "example.com:443");
        assert!(!cli.show_chain && !cli.no_aia && !cli.scts && !cli.json);
        assert_eq!(cli.max_aia_hops, 8);
        assert_eq!(parse_duration(&cli.connect_timeout).unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration(&cli.timeout).unwrap(), Duration::from_secs(10));
        assert_eq!(cli.ct_log_list, sct::DEFAULT_LOG_LIST_URL);
    }

    #[test]
    fn locator_is_required() {
        let err = Cli::try_parse_from(["tlscert"]).err().unwrap();
        assert_eq!(usage_exit_code(&err), 1);
    }

    #[test]
    fn help_and_version_exit_cleanly() {
        let help = Cli::try_parse_from(["tlscert", "--help"]).err().unwrap();
        assert_eq!(usage_exit_code(&help), 0);
        let version = Cli::try_parse_from(["tlscert", "--version"]).err().unwrap();
        assert_eq!(usage_exit_code(&version), 0);
    }

    #[test]
    fn flags() {
        let cli = Cli::try_parse_from([
            "tlscert",
            "--show-chain",
            "--no-aia",
            "--scts",
            "--format",
            "p7c",
            "-v",
            "https://example.com/ca.p7c",
        ])
        .unwrap();
        assert!(cli.show_chain && cli.no_aia && cli.scts && cli.verbose);
        assert_eq!(cli.format.as_deref(), Some("p7c"));
    }
}
