use std::io::Read;
use std::str::FromStr;

use anyhow::{anyhow, Context, Result};
use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use meshroute_apply::{apply_virtual_service, parse_revisions, render_all, ApplyOutcome, Format};
use meshroute_builder::{make_virtual_service, RouteContext};
use meshroute_core::{ClusterAddressing, Revision, SystemConfig, SYSTEM_NAMESPACE_ENV};
use meshroute_istio::VirtualService;
use tracing::{error, info, warn};

#[derive(Parser, Debug)]
#[command(name = "meshroutectl", version, about = "Build Istio VirtualServices for Knative Revisions")]
struct Cli {
    /// Output format
    #[arg(short = 'o', long = "output", value_enum, global = true, default_value_t = Output::Yaml)]
    output: Output,

    /// Namespace the control plane (activator) runs in [default: knative-serving]
    #[arg(long = "system-namespace", env = SYSTEM_NAMESPACE_ENV, global = true)]
    system_namespace: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum Output { Yaml, Json }

impl From<Output> for Format {
    fn from(o: Output) -> Self {
        match o {
            Output::Yaml => Format::Yaml,
            Output::Json => Format::Json,
        }
    }
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the VirtualService for every Revision in a manifest, or for one live Revision
    Render {
        /// Revision manifest path, or "-" for stdin
        #[arg(short = 'f', long = "file", required_unless_present = "revision", conflicts_with = "revision")]
        file: Option<String>,
        /// Name of a live Revision to fetch instead of reading a manifest
        #[arg(long = "revision")]
        revision: Option<String>,
        /// Namespace of the live Revision
        #[arg(long = "ns", default_value = "default")]
        namespace: String,
    },
    /// Build and server-side apply VirtualServices for Revisions in a manifest
    Apply {
        /// Revision manifest path, or "-" for stdin
        #[arg(short = 'f', long = "file")]
        file: String,
        /// Target namespace (default: each Revision's namespace)
        #[arg(long = "ns")]
        namespace: Option<String>,
        /// Ask the server to validate without persisting
        #[arg(long = "dry-run", action = ArgAction::SetTrue)]
        dry_run: bool,
    },
    /// Apply VirtualServices for all live Revisions in a namespace
    Reconcile {
        #[arg(long = "ns", default_value = "default")]
        namespace: String,
        #[arg(long = "dry-run", action = ArgAction::SetTrue)]
        dry_run: bool,
    },
}

fn init_tracing() {
    let env = std::env::var("MESHROUTE_LOG").unwrap_or_else(|_| "info".to_string());
    let filter = tracing_subscriber::EnvFilter::from_str(&env).unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).with_writer(std::io::stderr).init();
}

fn init_metrics() {
    if let Ok(addr) = std::env::var("MESHROUTE_METRICS_ADDR") {
        if let Ok(sock) = addr.parse::<std::net::SocketAddr>() {
            let builder = metrics_exporter_prometheus::PrometheusBuilder::new();
            match builder.with_http_listener(sock).install() {
                Ok(_) => tracing::info!(addr = %addr, "Prometheus metrics exporter listening"),
                Err(e) => tracing::warn!(error = %e, "failed to install metrics exporter"),
            }
        } else {
            tracing::warn!(addr = %addr, "invalid MESHROUTE_METRICS_ADDR; expected host:port");
        }
    }
}

fn read_manifest(file: &str) -> Result<String> {
    if file == "-" {
        let mut s = String::new();
        std::io::stdin().read_to_string(&mut s).context("reading manifest from stdin")?;
        Ok(s)
    } else {
        std::fs::read_to_string(file).with_context(|| format!("reading manifest {}", file))
    }
}

/// Explicit flag wins; otherwise the environment, with the built-in default.
fn system_config(flag: Option<String>) -> SystemConfig {
    match flag {
        Some(ns) if !ns.is_empty() => SystemConfig::new(ns),
        _ => SystemConfig::from_env(),
    }
}

/// Build VirtualServices for the valid Revisions; invalid ones are logged and counted.
fn build_all(revs: &[Revision], ctx: &RouteContext<'_>) -> (Vec<(String, VirtualService)>, usize) {
    let mut out = Vec::with_capacity(revs.len());
    let mut invalid = 0usize;
    for rev in revs {
        if let Err(e) = rev.validate() {
            warn!(error = %e, namespace = %rev.namespace(), "skipping revision");
            metrics::counter!("vs_build_invalid", 1u64);
            invalid += 1;
            continue;
        }
        out.push((rev.namespace().to_string(), make_virtual_service(rev, ctx)));
    }
    (out, invalid)
}

async fn apply_all(built: Vec<(String, VirtualService)>, ns_override: Option<&str>, dry_run: bool) -> Result<(Vec<ApplyOutcome>, usize)> {
    let client = meshroute_kubehub::get_kube_client().await?;
    let mut outcomes = Vec::with_capacity(built.len());
    let mut failed = 0usize;
    for (ns, vs) in built {
        let ns = ns_override.unwrap_or(&ns);
        match apply_virtual_service(client.clone(), ns, &vs, dry_run).await {
            Ok(o) => outcomes.push(o),
            Err(e) => {
                error!(error = ?e, namespace = %ns, name = ?vs.metadata.name, "apply failed");
                failed += 1;
            }
        }
    }
    Ok((outcomes, failed))
}

fn print_outcomes(outcomes: &[ApplyOutcome], output: Output) -> Result<()> {
    match output {
        Output::Yaml => {
            for o in outcomes {
                let verb = if o.dry_run { "validated" } else { "applied" };
                println!(
                    "virtualservice {}/{} {} (+{} ~{} -{})",
                    o.namespace, o.name, verb, o.summary.adds, o.summary.updates, o.summary.removes
                );
            }
        }
        Output::Json => println!("{}", serde_json::to_string_pretty(outcomes)?),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    init_metrics();
    let cli = Cli::parse();
    let config = system_config(cli.system_namespace.clone());
    let addressing = ClusterAddressing::new(config.clone());
    let ctx = RouteContext::new(&addressing, &config);
    info!(system_namespace = %config.namespace, "meshroutectl starting");

    let failures = match cli.command {
        Commands::Render { file, revision, namespace } => {
            let revs = match (file, revision) {
                (Some(file), _) => parse_revisions(&read_manifest(&file)?)?,
                (None, Some(name)) => {
                    let client = meshroute_kubehub::get_kube_client().await?;
                    vec![meshroute_kubehub::get_revision(client, &namespace, &name).await?]
                }
                (None, None) => return Err(anyhow!("either --file or --revision is required")),
            };
            let (built, invalid) = build_all(&revs, &ctx);
            let items: Vec<VirtualService> = built.into_iter().map(|(_, vs)| vs).collect();
            print!("{}", render_all(&items, cli.output.into())?);
            invalid
        }
        Commands::Apply { file, namespace, dry_run } => {
            let revs = parse_revisions(&read_manifest(&file)?)?;
            let (built, invalid) = build_all(&revs, &ctx);
            let (outcomes, failed) = apply_all(built, namespace.as_deref(), dry_run).await?;
            print_outcomes(&outcomes, cli.output)?;
            invalid + failed
        }
        Commands::Reconcile { namespace, dry_run } => {
            let client = meshroute_kubehub::get_kube_client().await?;
            let revs = meshroute_kubehub::list_revisions(client, &namespace).await?;
            let (built, invalid) = build_all(&revs, &ctx);
            let (outcomes, failed) = apply_all(built, Some(&namespace), dry_run).await?;
            print_outcomes(&outcomes, cli.output)?;
            info!(namespace = %namespace, applied = outcomes.len(), failed = failed + invalid, "reconcile finished");
            invalid + failed
        }
    };

    if failures > 0 {
        return Err(anyhow!("{} revision(s) failed", failures));
    }
    Ok(())
}
