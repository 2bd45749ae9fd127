//! Command runner: builds the policy once and dispatches subcommands

use crate::cli::args::{Args, Command, OutputFormat, credentials};
use crate::config::PolicyConfig;
use crate::error::Result;
use crate::logging::Logger;
use crate::operations::{EventSink, ProgressEvent, PullDriver};
use crate::registry::{HttpTransfer, RegistryPolicy, ResolvedEndpoint, Resolver};
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

pub struct Runner {
    args: Args,
    output: Logger,
}

impl Runner {
    pub fn new(args: Args) -> Self {
        let output = if args.quiet || args.output == OutputFormat::Json {
            Logger::new_quiet()
        } else {
            Logger::new(args.verbose)
        };

        Self { args, output }
    }

    pub fn logger(&self) -> &Logger {
        &self.output
    }

    pub async fn run(&self) -> Result<()> {
        let resolver = self.build_resolver()?;

        match &self.args.command {
            Command::Resolve { reference, push } if *push => self.resolve_push(&resolver, reference),
            Command::Resolve { reference, .. } => self.resolve(&resolver, reference),
            Command::Pull {
                reference,
                username,
                password,
                skip_tls,
                timeout,
            } => {
                let transfer = HttpTransfer::builder()
                    .with_credentials(credentials(username.clone(), password.clone())?)
                    .with_skip_tls(*skip_tls)
                    .with_timeout(*timeout)
                    .build()?;
                self.pull(resolver, reference, &transfer).await
            }
            Command::Policy => self.policy(resolver.policy()),
        }
    }

    fn build_resolver(&self) -> Result<Resolver> {
        let config = PolicyConfig::load(self.args.config.as_deref(), &self.args.policy_flags())?;
        debug!(?config, "effective policy configuration");
        let policy = RegistryPolicy::from_config(&config)?;
        Ok(Resolver::new(Arc::new(policy)))
    }

    fn resolve(&self, resolver: &Resolver, reference: &str) -> Result<()> {
        let candidates = resolver.resolve(reference)?;

        match self.args.output {
            OutputFormat::Json => print_json(&json!({
                "reference": reference,
                "candidates": candidates,
            })),
            OutputFormat::Text => {
                self.output.section("Resolution");
                self.output.info(&format!("Reference: {}", reference));
                let lines: Vec<String> = candidates.iter().map(describe_candidate).collect();
                self.output.list("Candidates (in search order)", &lines);
                if self.output.quiet {
                    for candidate in &candidates {
                        println!("{}", candidate);
                    }
                }
                Ok(())
            }
        }
    }

    fn resolve_push(&self, resolver: &Resolver, reference: &str) -> Result<()> {
        let target = resolver.resolve_push(reference)?;

        match self.args.output {
            OutputFormat::Json => print_json(&json!({
                "reference": reference,
                "identity": target.endpoint.identity(),
                "target": target.endpoint,
            })),
            OutputFormat::Text => {
                self.output.section("Push target");
                self.output.info(&format!("Reference: {}", reference));
                self.output.success(&format!("Target: {}", describe_candidate(&target.endpoint)));
                self.output.detail(&format!("Lock identity: {}", target.endpoint.identity()));
                if self.output.quiet {
                    println!("{}", target.endpoint);
                }
                Ok(())
            }
        }
    }

    async fn pull(&self, resolver: Resolver, reference: &str, transfer: &HttpTransfer) -> Result<()> {
        let (sink, mut events) = EventSink::channel();
        let logger = self.output.clone();
        let printer = tokio::spawn(async move {
            let mut seen = Vec::new();
            while let Some(event) = events.recv().await {
                report_event(&logger, &event);
                seen.push(event);
            }
            seen
        });

        self.output.section("Pull");
        let result = PullDriver::new(resolver).pull(reference, transfer, &sink).await;
        drop(sink);
        let events = printer.await.unwrap_or_default();
        let endpoint = result?;

        match self.args.output {
            OutputFormat::Json => print_json(&json!({
                "reference": reference,
                "found": endpoint,
                "events": events,
            })),
            OutputFormat::Text => {
                self.output.success(&format!(
                    "{} is available as {} ({})",
                    reference,
                    endpoint,
                    self.output.format_duration(self.output.elapsed())
                ));
                if self.output.quiet {
                    println!("{}", endpoint);
                }
                Ok(())
            }
        }
    }

    fn policy(&self, policy: &RegistryPolicy) -> Result<()> {
        let summary = policy.describe();

        match self.args.output {
            OutputFormat::Json => print_json(&summary),
            OutputFormat::Text => {
                let list = |items: &[String]| {
                    if items.is_empty() {
                        "(none)".to_string()
                    } else {
                        items.join(", ")
                    }
                };
                self.output.summary_kv(
                    "Registry policy",
                    &[
                        ("Public registry", summary.public_registry.clone()),
                        ("Additional registries", list(&summary.additional_registries)),
                        ("Blocked registries", list(&summary.blocked_registries)),
                        ("Public registry blocked", summary.block_public.to_string()),
                        ("All registries blocked", summary.block_all.to_string()),
                    ],
                );
                Ok(())
            }
        }
    }
}

fn describe_candidate(endpoint: &ResolvedEndpoint) -> String {
    if endpoint.is_official_public {
        format!("{} (official: {})", endpoint, endpoint.qualified_name())
    } else {
        endpoint.to_string()
    }
}

fn report_event(logger: &Logger, event: &ProgressEvent) {
    match event {
        ProgressEvent::Resolved { candidates, .. } => {
            logger.detail(&format!("Candidates: {}", candidates.join(", ")))
        }
        ProgressEvent::Trying { candidate } => logger.step(&format!("Trying {}", candidate)),
        ProgressEvent::NotFound { candidate } => logger.info(&format!("Not found on {}", candidate)),
        ProgressEvent::Waiting { message, .. } => logger.warning(message),
        ProgressEvent::Completed { candidate } => logger.verbose(&format!("Found on {}", candidate)),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
