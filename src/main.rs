use clap::{ArgAction, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, error};
use tracing_subscriber::EnvFilter;
use vpn_leak_check::probe::SystemProbe;
use vpn_leak_check::{run_check, Config, IpAddress, Resolver, Strategy, Verdict};

const EXIT_SECURE: u8 = 0;
const EXIT_NOT_SECURE: u8 = 1;
/// Exit status when the home IP is missing or the configuration is unusable
const EXIT_INVOCATION_ERROR: u8 = 2;

/// Reject a home IP that is blank once trimmed
fn parse_home_ip(raw: &str) -> Result<IpAddress, String> {
    let home = IpAddress::new(raw);
    if home.is_empty() {
        return Err("home IP must not be empty".to_string());
    }
    Ok(home)
}

fn exit_code(verdict: &Verdict) -> u8 {
    if verdict.is_secure() {
        EXIT_SECURE
    } else {
        EXIT_NOT_SECURE
    }
}

fn log_level(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    }
}

#[derive(Parser)]
#[command(name = "vpn-leak-check")]
#[command(about = "Check that outbound traffic leaves through the VPN, not the home connection")]
#[command(
    long_about = "Prints `secure` (exit 0) when the observed public IP differs from HOME_IP, \
                  or `notsecure` (exit 1) on a leak, lookup failure or missing VPN."
)]
#[command(version)]
struct Cli {
    /// Public IP address of the connection without VPN
    #[arg(required_unless_present = "print_config", value_parser = parse_home_ip)]
    home_ip: Option<IpAddress>,

    /// Config file (defaults to <config dir>/vpn-leak-check/config.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Resolution strategy
    #[arg(short, long, value_enum)]
    strategy: Option<Strategy>,

    /// Attempt cap for the single-retry strategy
    #[arg(long)]
    attempts: Option<u32>,

    /// Per-request timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Check the VPN process and interface before resolving
    #[arg(long)]
    probe: bool,

    /// VPN client process name for --probe
    #[arg(long)]
    process: Option<String>,

    /// VPN tunnel interface name for --probe
    #[arg(long)]
    interface: Option<String>,

    /// Echo the home and external IP before the verdict
    #[arg(long)]
    show_ips: bool,

    /// Print the effective configuration as TOML and exit
    #[arg(long)]
    print_config: bool,

    /// Increase log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(strategy) = self.strategy {
            config.resolver.strategy = strategy;
        }
        if let Some(attempts) = self.attempts {
            config.resolver.max_attempts = attempts;
        }
        if let Some(timeout) = self.timeout {
            config.resolver.timeout_secs = timeout;
        }
        if self.probe {
            config.probe.enabled = true;
        }
        if let Some(process) = &self.process {
            config.probe.process_name = process.clone();
        }
        if let Some(interface) = &self.interface {
            config.probe.interface = interface.clone();
        }
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // stdout carries only the verdict; logs go to stderr
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level(cli.verbose)));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = match Config::load_or_default(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::from(EXIT_INVOCATION_ERROR));
        }
    };
    cli.apply_overrides(&mut config);

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(ExitCode::SUCCESS);
    }

    let Some(home) = cli.home_ip.clone() else {
        error!("HOME_IP is required");
        return Ok(ExitCode::from(EXIT_INVOCATION_ERROR));
    };
    debug!("Home IP: {}", home);

    let resolver = match Resolver::from_config(&config.resolver) {
        Ok(resolver) => resolver,
        Err(e) => {
            error!("{}", e);
            return Ok(ExitCode::from(EXIT_INVOCATION_ERROR));
        }
    };
    debug!("Resolving with {:?} strategy", resolver.strategy());

    let probe = config
        .probe
        .enabled
        .then(|| SystemProbe::from_config(&config.probe));

    let report = run_check(&home, probe.as_ref(), &resolver, &config.policy.blocklist).await;

    if cli.show_ips {
        println!("home: {}", home);
        match report.external_ip() {
            Some(ip) => println!("external: {}", ip),
            None => println!("external: unavailable"),
        }
    }
    if let Some(finding) = report.verdict.finding() {
        println!("{}", finding);
    }
    println!("{}", report.verdict);

    Ok(ExitCode::from(exit_code(&report.verdict)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }

    #[test]
    fn test_home_ip_required() {
        assert!(Cli::try_parse_from(["vpn-leak-check"]).is_err());
        assert!(Cli::try_parse_from(["vpn-leak-check", "--print-config"]).is_ok());
    }

    #[test]
    fn test_home_ip_trimmed() {
        let cli = Cli::try_parse_from(["vpn-leak-check", "203.0.113.9\n"]).unwrap();
        assert_eq!(cli.home_ip, Some(IpAddress::new("203.0.113.9")));
    }

    #[test]
    fn test_blank_home_ip_is_invocation_error() {
        for blank in ["", "   ", "\n"] {
            let err = match Cli::try_parse_from(["vpn-leak-check", blank]) {
                Ok(_) => panic!("blank home IP {:?} should be rejected", blank),
                Err(e) => e,
            };
            assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
            assert_eq!(err.exit_code(), i32::from(EXIT_INVOCATION_ERROR));
        }
    }

    #[test]
    fn test_missing_home_ip_is_invocation_error() {
        let err = match Cli::try_parse_from(["vpn-leak-check"]) {
            Ok(_) => panic!("missing home IP should be rejected"),
            Err(e) => e,
        };
        assert_eq!(err.exit_code(), i32::from(EXIT_INVOCATION_ERROR));
    }

    #[test]
    fn test_exit_codes() {
        use vpn_leak_check::Finding;

        assert_eq!(exit_code(&Verdict::Secure), 0);
        assert_eq!(
            exit_code(&Verdict::NotSecure(Finding::Leak {
                ip: IpAddress::new("203.0.113.9")
            })),
            1
        );
        assert_eq!(exit_code(&Verdict::NotSecure(Finding::MissingHomeIp)), 1);
        assert_eq!(EXIT_INVOCATION_ERROR, 2);
    }

    #[test]
    fn test_log_level_defaults_to_warn() {
        assert_eq!(log_level(0), "warn");
        assert_eq!(log_level(1), "info");
        assert_eq!(log_level(2), "debug");
        assert_eq!(log_level(7), "debug");
    }

    #[test]
    fn test_subscriber_installs_as_default() {
        let subscriber = tracing_subscriber::fmt()
            .with_env_filter(EnvFilter::new(log_level(0)))
            .with_target(false)
            .with_writer(std::io::stderr)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            tracing::warn!("subscriber ready");
        });
    }

    #[test]
    fn test_overrides_applied() {
        let cli = Cli::try_parse_from([
            "vpn-leak-check",
            "203.0.113.9",
            "--strategy",
            "fallback",
            "--attempts",
            "5",
            "--timeout",
            "3",
            "--probe",
            "--interface",
            "wg0",
        ])
        .unwrap();

        let mut config = Config::default();
        cli.apply_overrides(&mut config);

        assert_eq!(config.resolver.strategy, Strategy::Fallback);
        assert_eq!(config.resolver.max_attempts, 5);
        assert_eq!(config.resolver.timeout_secs, 3);
        assert!(config.probe.enabled);
        assert_eq!(config.probe.interface, "wg0");
        assert_eq!(config.probe.process_name, "openvpn");
    }
}
