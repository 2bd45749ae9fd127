//! Command-line argument parsing

use crate::config::PolicyConfig;
use crate::error::{ResolverError, Result};
use crate::registry::Credentials;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "docker-registry-resolver")]
#[command(about = "Resolve image references against a registry policy and check where they can be pulled from")]
#[command(version, author)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Additional registry searched after the public default
    #[arg(
        long = "add-registry",
        global = true,
        value_name = "HOST",
        help = "Registry searched for unqualified references after docker.io (repeatable, in order)"
    )]
    pub add_registry: Vec<String>,

    /// Blocked registry
    #[arg(
        long = "block-registry",
        global = true,
        value_name = "HOST",
        help = "Registry excluded from resolution: a host, \"public\" or \"all\" (repeatable)"
    )]
    pub block_registry: Vec<String>,

    /// Policy file path
    #[arg(
        long = "config",
        short = 'c',
        global = true,
        help = "Path to a JSON policy file"
    )]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(
        long = "verbose",
        short = 'v',
        global = true,
        help = "Enable verbose output"
    )]
    pub verbose: bool,

    /// Quiet mode
    #[arg(
        long = "quiet",
        short = 'q',
        global = true,
        conflicts_with = "verbose",
        help = "Only print errors and the final result"
    )]
    pub quiet: bool,

    /// Output format for results
    #[arg(
        long = "output",
        short = 'o',
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format"
    )]
    pub output: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the ordered registry candidates for a reference
    Resolve {
        reference: String,

        /// Resolve as a push target instead of a pull search
        #[arg(long = "push", help = "Apply push rules and print the single push target")]
        push: bool,
    },
    /// Probe candidates in order until one has the image
    Pull {
        reference: String,

        /// Registry username
        #[arg(long = "username", short = 'u', help = "Username for registry authentication")]
        username: Option<String>,

        /// Registry password
        #[arg(long = "password", short = 'p', help = "Password for registry authentication")]
        password: Option<String>,

        /// Skip TLS verification
        #[arg(long = "skip-tls", short = 'k', help = "Skip TLS certificate verification")]
        skip_tls: bool,

        /// Timeout in seconds for network operations
        #[arg(
            long = "timeout",
            short = 't',
            default_value = "30",
            help = "Timeout for network operations in seconds"
        )]
        timeout: u64,
    },
    /// Show the effective registry policy
    Policy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

impl Args {
    pub fn parse_args() -> Self {
        Args::parse()
    }

    /// Policy entries given on the command line
    pub fn policy_flags(&self) -> PolicyConfig {
        PolicyConfig::new(self.add_registry.clone(), self.block_registry.clone())
    }
}

/// Build credentials from the pull flags; a password without a username is an error
pub fn credentials(username: Option<String>, password: Option<String>) -> Result<Option<Credentials>> {
    match (username, password) {
        (Some(username), password) => Ok(Some(Credentials {
            username,
            password: password.unwrap_or_default(),
        })),
        (None, Some(_)) => Err(ResolverError::Config(
            "--password requires --username".to_string(),
        )),
        (None, None) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_global_policy_flags() {
        let args = Args::try_parse_from([
            "docker-registry-resolver",
            "resolve",
            "dockercli/busybox",
            "--add-registry",
            "localhost:5000",
            "--add-registry",
            "registry.example.com",
            "--block-registry",
            "public",
        ])
        .unwrap();

        let flags = args.policy_flags();
        assert_eq!(
            flags.additional_registries,
            vec!["localhost:5000", "registry.example.com"]
        );
        assert_eq!(flags.block_registries, vec!["public"]);
        assert!(matches!(args.command, Command::Resolve { push: false, .. }));
        assert_eq!(args.output, OutputFormat::Text);
    }

    #[test]
    fn test_parse_pull_options() {
        let args = Args::try_parse_from([
            "docker-registry-resolver",
            "-o",
            "json",
            "pull",
            "busybox",
            "-k",
            "--timeout",
            "5",
        ])
        .unwrap();
        assert_eq!(args.output, OutputFormat::Json);
        match args.command {
            Command::Pull {
                skip_tls, timeout, ..
            } => {
                assert!(skip_tls);
                assert_eq!(timeout, 5);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_quiet_conflicts_with_verbose() {
        assert!(Args::try_parse_from(["docker-registry-resolver", "policy", "-q", "-v"]).is_err());
    }

    #[test]
    fn test_credentials() {
        assert!(credentials(None, None).unwrap().is_none());
        assert!(credentials(None, Some("secret".to_string())).is_err());
        let c = credentials(Some("user".to_string()), None).unwrap().unwrap();
        assert_eq!(c.username, "user");
        assert_eq!(c.password, "");
    }
}
