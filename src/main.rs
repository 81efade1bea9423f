//! Nexus Forensics Core - Command Line Entry Point

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use serde::Serialize;

use nexus_core::api::{self, info};
use nexus_core::constants::{APP_NAME, APP_VERSION};
use nexus_core::logic::capture::{AcquisitionOrchestrator, CaptureFormat, CaptureRequest};
use nexus_core::logic::config::CaptureConfig;
use nexus_core::logic::threat::Severity;

#[derive(Parser, Debug)]
#[command(version, about = "Memory acquisition and process triage")]
struct Cli {
    /// Directory for dumps and sidecars
    #[arg(long, env = "NEXUS_STORAGE_DIR", global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Acquire physical memory with the platform capture tool
    Capture {
        /// Case identifier used in the file name and sidecar
        #[arg(long, default_value = "CASE")]
        case: String,
        /// raw, lime or mem
        #[arg(long, default_value = "raw")]
        format: CaptureFormat,
        /// Output file (relative paths land in the storage directory)
        #[arg(long)]
        output: Option<PathBuf>,
        /// Investigator name recorded in the sidecar
        #[arg(long)]
        investigator: Option<String>,
    },
    /// Score running processes for anomalies
    Scan {
        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show host facts relevant to a capture
    Info,
    /// Read-only host views, printed as JSON
    Triage {
        #[command(subcommand)]
        view: TriageView,
    },
}

#[derive(Subcommand, Debug)]
enum TriageView {
    /// CPU, RAM, process and socket counts
    Stats,
    /// Top processes by memory
    Processes,
    /// One process in detail
    Process { pid: u32 },
    /// Inet sockets
    Connections {
        /// Only sockets in this state (e.g. ESTABLISHED)
        #[arg(long)]
        status: Option<String>,
    },
    /// Most recently started processes
    Timeline,
    /// Memory usage and the largest processes
    Memory,
    /// OS, CPU, disks and interfaces
    Specs,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    log::info!("Starting {} v{}", APP_NAME, APP_VERSION);

    let mut config = CaptureConfig::from_env();
    if let Some(dir) = cli.storage_dir {
        config.tool_dir = nexus_core::constants::get_tool_dir(&dir);
        config.storage_dir = dir;
    }

    match cli.command {
        Commands::Capture {
            case,
            format,
            output,
            investigator,
        } => run_capture(config, &case, format, output, investigator).await,
        Commands::Scan { json } => run_scan(json).await,
        Commands::Info => run_info(config).await,
        Commands::Triage { view } => run_triage(view).await,
    }
}

async fn run_capture(
    config: CaptureConfig,
    case: &str,
    format: CaptureFormat,
    output: Option<PathBuf>,
    investigator: Option<String>,
) -> ExitCode {
    log::info!("Capture platform: {}", info::platform_label(config.os));

    let mut request = CaptureRequest::new(case, format);
    if let Some(output) = output {
        request = request.with_output(output);
    }
    if let Some(name) = investigator {
        request = request.with_investigator(&name);
    }

    let orchestrator = AcquisitionOrchestrator::with_system(config);
    let result = tokio::task::spawn_blocking(move || orchestrator.capture_blocking(request)).await;

    match result {
        Ok(Ok(outcome)) => {
            println!("{}", outcome.output_path.display());
            println!("{}", outcome.metadata_path.display());
            for warning in &outcome.warnings {
                eprintln!("warning: {}", warning);
            }
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            eprintln!("error [{}]: {}", e.kind(), e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error: capture task failed: {}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_scan(json: bool) -> ExitCode {
    let report = match api::scan_threats().await {
        Ok(report) => report,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    if json {
        match serde_json::to_string_pretty(&report) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("error: {}", e);
                return ExitCode::FAILURE;
            }
        }
        return ExitCode::SUCCESS;
    }

    if report.threats.is_empty() {
        println!("No suspicious processes.");
    }
    for finding in &report.threats {
        let marker = if finding.severity >= Severity::High { "!" } else { " " };
        println!(
            "{} {:>7} {:<24} {:>6.1} {:<8} {}",
            marker,
            finding.pid,
            finding.name,
            finding.score,
            finding.severity.as_str(),
            finding.message
        );
    }
    ExitCode::SUCCESS
}

async fn run_info(config: CaptureConfig) -> ExitCode {
    let info = match tokio::task::spawn_blocking(move || info::collect_capture_info(&config)).await {
        Ok(info) => info,
        Err(e) => {
            eprintln!("error: {}", e);
            return ExitCode::FAILURE;
        }
    };

    println!("Hostname:    {}", info.hostname);
    println!("OS:          {}", info.os);
    println!("RAM:         {}", info.ram_total);
    println!("Uptime:      {}", info.uptime);
    println!("Admin:       {}", info.is_admin);
    println!(
        "Tool:        {} ({})",
        info.tool_name.as_deref().unwrap_or("none"),
        if info.tool_available { "present" } else { "missing" }
    );
    println!("Storage:     {}", info.storage_dir);
    ExitCode::SUCCESS
}

async fn run_triage(view: TriageView) -> ExitCode {
    let result = match view {
        TriageView::Stats => api::get_system_stats().await.map(to_json),
        TriageView::Processes => api::list_processes().await.map(to_json),
        TriageView::Process { pid } => api::get_process_detail(pid).await.map(to_json),
        TriageView::Connections { status } => api::list_connections(status).await.map(to_json),
        TriageView::Timeline => api::get_timeline().await.map(to_json),
        TriageView::Memory => api::get_memory_overview().await.map(to_json),
        TriageView::Specs => api::get_host_specs().await.map(to_json),
    };

    match result {
        Ok(Ok(text)) => {
            println!("{}", text);
            ExitCode::SUCCESS
        }
        Ok(Err(e)) => {
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
        Err(e) => {
            eprintln!("error [{}]: {}", e.status(), e);
            ExitCode::FAILURE
        }
    }
}

fn to_json<T: Serialize>(value: T) -> serde_json::Result<String> {
    serde_json::to_string_pretty(&value)
}
