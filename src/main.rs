//! nodestat
//!
//! Host telemetry exporter serving Prometheus metrics over HTTP.
//!
//! ```text
//! GET /metrics[?collect[]=<name>...]  → concurrent scrape, text format
//! GET /healthz                        → results of the last scrape
//! GET /                               → landing page
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{CommandFactory, FromArgMatches, Parser};
use http_body_util::Full;
use hyper::body::{Bytes, Incoming};
use hyper::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use hyper::{Method, Request, Response, StatusCode};
use tracing::{error, info, Level};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use nodestat::collector::{CollectorContext, DEFAULT_NAMESPACE};
use nodestat::collectors::register_builtin;
use nodestat::config::{
    augment_collector_flags, selection_from_matches, timeout_from_secs, CollectorSelection,
    FileConfig, PathConfig, DEFAULT_PROCFS, DEFAULT_ROOTFS, DEFAULT_SYSFS,
};
use nodestat::error::{Error, Result};
use nodestat::orchestrator::{OrchestratorConfig, ScrapeOrchestrator, DEFAULT_SCRAPE_TIMEOUT};
use nodestat::registry::CollectorRegistry;

// =============================================================================
// CLI Arguments
// =============================================================================

/// nodestat - Prometheus exporter for host metrics
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Address to listen on for web interface and telemetry
    #[arg(
        long = "web.listen-address",
        env = "NODESTAT_LISTEN_ADDRESS",
        default_value = "0.0.0.0:9100"
    )]
    listen_address: String,

    /// Path under which to expose metrics
    #[arg(
        long = "web.telemetry-path",
        env = "NODESTAT_TELEMETRY_PATH",
        default_value = "/metrics"
    )]
    telemetry_path: String,

    /// Scrape deadline in seconds [default: 10]
    #[arg(long = "scrape.timeout", env = "NODESTAT_SCRAPE_TIMEOUT")]
    scrape_timeout: Option<f64>,

    /// Metric namespace [default: node]
    #[arg(long = "namespace", env = "NODESTAT_NAMESPACE")]
    namespace: Option<String>,

    /// Disable every collector not explicitly enabled
    #[arg(long = "collector.disable-defaults")]
    disable_defaults: bool,

    /// Comma-separated list of the only collectors to run
    #[arg(long = "collectors.enabled", value_delimiter = ',')]
    collectors_enabled: Vec<String>,

    /// Comma-separated list of collectors to skip
    #[arg(long = "collectors.exclude", value_delimiter = ',')]
    collectors_exclude: Vec<String>,

    /// procfs mountpoint
    #[arg(long = "path.procfs", env = "NODESTAT_PROCFS", default_value = DEFAULT_PROCFS)]
    procfs: PathBuf,

    /// sysfs mountpoint
    #[arg(long = "path.sysfs", env = "NODESTAT_SYSFS", default_value = DEFAULT_SYSFS)]
    sysfs: PathBuf,

    /// rootfs mountpoint
    #[arg(long = "path.rootfs", env = "NODESTAT_ROOTFS", default_value = DEFAULT_ROOTFS)]
    rootfs: PathBuf,

    /// YAML configuration file
    #[arg(long = "config.file", env = "NODESTAT_CONFIG_FILE")]
    config_file: Option<PathBuf>,

    /// Print the available collectors and their state, then exit
    #[arg(long = "collectors.print")]
    print_collectors: bool,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long = "log.level", env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// Output logs as JSON
    #[arg(long = "log.json", env = "LOG_JSON")]
    log_json: bool,
}

impl Args {
    fn cli_selection(&self, flags: CollectorSelection) -> CollectorSelection {
        CollectorSelection {
            disable_defaults: self.disable_defaults,
            enable_collectors: self.collectors_enabled.clone(),
            exclude_collectors: self.collectors_exclude.clone(),
            ..flags
        }
    }

    fn scrape_timeout(&self, file: &FileConfig) -> Result<Duration> {
        match self.scrape_timeout {
            Some(secs) => timeout_from_secs(secs),
            None => Ok(file.scrape_timeout().unwrap_or(DEFAULT_SCRAPE_TIMEOUT)),
        }
    }
}

// =============================================================================
// Main
// =============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Flags are generated from the registry, so it must be complete first.
    let mut registry = CollectorRegistry::new();
    register_builtin(&mut registry)?;

    let matches = augment_collector_flags(Args::command(), &registry).get_matches();
    let args = Args::from_arg_matches(&matches).unwrap_or_else(|e| e.exit());

    init_logging(&args);

    let file = match &args.config_file {
        Some(path) => {
            info!("Loading configuration from {}", path.display());
            FileConfig::from_path(path)?
        }
        None => FileConfig::default(),
    };
    let selection = file
        .selection()
        .merge(args.cli_selection(selection_from_matches(&matches, &registry)));

    if args.print_collectors {
        print_collectors(&registry, &selection);
        return Ok(());
    }

    let namespace = args
        .namespace
        .clone()
        .or_else(|| file.namespace.clone())
        .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
    let config = OrchestratorConfig {
        namespace: namespace.clone(),
        scrape_timeout: args.scrape_timeout(&file)?,
    };
    let ctx = CollectorContext {
        namespace,
        paths: PathConfig::new(&args.procfs, &args.sysfs, &args.rootfs),
    };

    info!("Starting nodestat");
    info!("  Listen address: {}", args.listen_address);
    info!("  Telemetry path: {}", args.telemetry_path);
    info!("  Scrape timeout: {:?}", config.scrape_timeout);
    info!("  Namespace: {}", config.namespace);

    let orchestrator = Arc::new(ScrapeOrchestrator::from_selection(
        &registry, &selection, &ctx, config,
    )?);
    info!(collectors = ?orchestrator.collector_names(), "Collectors initialized");

    let state = Arc::new(ServerState {
        orchestrator,
        telemetry_path: args.telemetry_path.clone(),
    });

    tokio::select! {
        result = run_server(&args.listen_address, state) => {
            if let Err(e) = &result {
                error!("Metrics server error: {}", e);
            }
            result?;
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
    }

    info!("nodestat shutdown complete");
    Ok(())
}

fn print_collectors(registry: &CollectorRegistry, selection: &CollectorSelection) {
    println!("Available collectors:");
    for entry in registry.entries() {
        let state = if selection.is_enabled(entry) {
            "enabled"
        } else {
            "disabled"
        };
        println!(" - {} [{}]", entry.name(), state);
    }
}

// =============================================================================
// Logging Setup
// =============================================================================

/// Env var that replaces `--log.level` with a full filter directive list.
const LOG_FILTER_ENV: &str = "NODESTAT_LOG";

/// `--log.level` sets the default; `NODESTAT_LOG` (e.g.
/// `nodestat::orchestrator=debug`) refines it per target. HTTP plumbing is
/// held at warn.
fn log_filter(args: &Args) -> EnvFilter {
    let level: Level = args.log_level.parse().unwrap_or(Level::INFO);

    EnvFilter::builder()
        .with_default_directive(level.into())
        .with_env_var(LOG_FILTER_ENV)
        .from_env_lossy()
        .add_directive("hyper=warn".parse().unwrap())
        .add_directive("hyper_util=warn".parse().unwrap())
}

fn init_logging(args: &Args) {
    let filter = log_filter(args);

    if args.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().flatten_event(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().with_target(true))
            .init();
    }
}

// =============================================================================
// HTTP Server
// =============================================================================

/// Header carrying the scraper's own timeout.
const SCRAPE_TIMEOUT_HEADER: &str = "X-Prometheus-Scrape-Timeout-Seconds";

struct ServerState {
    orchestrator: Arc<ScrapeOrchestrator>,
    telemetry_path: String,
}

fn respond(status: StatusCode, content_type: &str, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_str(content_type).unwrap_or(HeaderValue::from_static("text/plain")),
    );
    response
}

/// Values of every `collect[]` query parameter.
fn collect_params(query: Option<&str>) -> Vec<String> {
    let Some(query) = query else {
        return Vec::new();
    };
    query
        .split('&')
        .filter_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            let key = urlencoding::decode(key).ok()?;
            if key != "collect[]" {
                return None;
            }
            let value = value.replace('+', " ");
            urlencoding::decode(&value).ok().map(|v| v.into_owned())
        })
        .filter(|name| !name.is_empty())
        .collect()
}

/// Scrape deadline requested by the scraper, if any.
fn timeout_hint(headers: &HeaderMap) -> Option<Duration> {
    let secs: f64 = headers.get(SCRAPE_TIMEOUT_HEADER)?.to_str().ok()?.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

async fn serve_metrics(
    state: &ServerState,
    names: Vec<String>,
    hint: Option<Duration>,
) -> Response<Full<Bytes>> {
    let batch = match state.orchestrator.collect_filtered(&names, hint).await {
        Ok(batch) => batch,
        Err(e) => {
            info!(error = %e, "Rejected scrape request");
            return respond(StatusCode::BAD_REQUEST, "text/plain", format!("{}\n", e));
        }
    };

    match nodestat::exposition::encode_text(&batch) {
        Ok(text) => respond(StatusCode::OK, &nodestat::exposition::content_type(), text),
        Err(e) => {
            error!(error = %e, "Failed to encode metrics");
            respond(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                format!("{}\n", e),
            )
        }
    }
}

fn serve_health(state: &ServerState) -> Response<Full<Bytes>> {
    let results = state.orchestrator.last_results();
    match serde_yaml::to_string(&results) {
        Ok(body) => respond(StatusCode::OK, "application/yaml", body),
        Err(e) => respond(
            StatusCode::INTERNAL_SERVER_ERROR,
            "text/plain",
            format!("{}\n", e),
        ),
    }
}

fn landing_page(telemetry_path: &str) -> String {
    format!(
        "<html>\n<head><title>nodestat</title></head>\n<body>\n<h1>nodestat</h1>\n\
         <p><a href=\"{}\">Metrics</a></p>\n</body>\n</html>\n",
        telemetry_path
    )
}

async fn handle(
    state: Arc<ServerState>,
    req: Request<Incoming>,
) -> std::result::Result<Response<Full<Bytes>>, std::convert::Infallible> {
    let path = req.uri().path().to_string();
    let response = match (req.method().clone(), path.as_str()) {
        (Method::GET, path) if path == state.telemetry_path => {
            let names = collect_params(req.uri().query());
            let hint = timeout_hint(req.headers());
            serve_metrics(&state, names, hint).await
        }
        (Method::GET, "/healthz") => serve_health(&state),
        (Method::GET, "/") => respond(
            StatusCode::OK,
            "text/html; charset=utf-8",
            landing_page(&state.telemetry_path),
        ),
        (Method::GET, _) => respond(StatusCode::NOT_FOUND, "text/plain", "not found"),
        _ => respond(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain",
            "method not allowed",
        ),
    };
    Ok(response)
}

async fn run_server(addr: &str, state: Arc<ServerState>) -> Result<()> {
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper_util::rt::TokioIo;
    use std::net::SocketAddr;
    use tokio::net::TcpListener;

    let addr: SocketAddr = addr
        .parse()
        .map_err(|e| Error::Config(format!("Invalid listen address: {}", e)))?;

    let listener = TcpListener::bind(addr)
        .await
        .map_err(|e| Error::Internal(format!("Failed to bind metrics server: {}", e)))?;

    info!("Metrics server listening on {}", addr);

    loop {
        let (stream, _) = listener
            .accept()
            .await
            .map_err(|e| Error::Internal(format!("Metrics server accept error: {}", e)))?;

        let io = TokioIo::new(stream);
        let state = Arc::clone(&state);

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(Arc::clone(&state), req));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Metrics server connection error: {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_params() {
        assert!(collect_params(None).is_empty());
        assert_eq!(
            collect_params(Some("collect[]=cpu&collect%5B%5D=meminfo&other=x")),
            vec!["cpu", "meminfo"]
        );
        assert!(collect_params(Some("collect[]=")).is_empty());
    }

    #[test]
    fn test_timeout_hint() {
        let mut headers = HeaderMap::new();
        assert_eq!(timeout_hint(&headers), None);

        headers.insert(SCRAPE_TIMEOUT_HEADER, HeaderValue::from_static("2.5"));
        assert_eq!(timeout_hint(&headers), Some(Duration::from_millis(2500)));

        headers.insert(SCRAPE_TIMEOUT_HEADER, HeaderValue::from_static("soon"));
        assert_eq!(timeout_hint(&headers), None);

        headers.insert(SCRAPE_TIMEOUT_HEADER, HeaderValue::from_static("-1"));
        assert_eq!(timeout_hint(&headers), None);
    }

    #[test]
    fn test_cli_overrides_file_timeout() {
        let file = FileConfig::from_yaml_str("scrape_timeout_seconds: 4").unwrap();

        let args = Args::try_parse_from(["nodestat"]).unwrap();
        assert_eq!(args.scrape_timeout(&file).unwrap(), Duration::from_secs(4));

        let args = Args::try_parse_from(["nodestat", "--scrape.timeout", "1.5"]).unwrap();
        assert_eq!(
            args.scrape_timeout(&file).unwrap(),
            Duration::from_millis(1500)
        );

        let args = Args::try_parse_from(["nodestat", "--scrape.timeout", "0"]).unwrap();
        assert!(args.scrape_timeout(&file).is_err());

        let args = Args::try_parse_from(["nodestat", "--scrape.timeout", "1e20"]).unwrap();
        assert_matches::assert_matches!(args.scrape_timeout(&file), Err(Error::Config(_)));
    }

    #[test]
    fn test_cli_selection_lists() {
        let args = Args::try_parse_from(["nodestat", "--collectors.enabled", "loadavg,time"]).unwrap();
        let selection = args.cli_selection(CollectorSelection::new().with_override("time", true));
        assert_eq!(selection.enable_collectors, vec!["loadavg", "time"]);
        assert_eq!(selection.overrides.get("time"), Some(&true));
    }

    #[test]
    fn test_log_filter_defaults() {
        let args = Args::try_parse_from(["nodestat", "--log.level", "debug"]).unwrap();
        let filter = log_filter(&args).to_string();
        assert!(filter.contains("hyper=warn"));
        assert!(filter.contains("hyper_util=warn"));
        assert!(filter.to_lowercase().contains("debug"));

        let args = Args::try_parse_from(["nodestat", "--log.level", "chatty"]).unwrap();
        assert!(log_filter(&args).to_string().to_lowercase().contains("info"));
    }

    #[test]
    fn test_landing_page_links_telemetry_path() {
        assert!(landing_page("/metrics").contains("href=\"/metrics\""));
    }
}
