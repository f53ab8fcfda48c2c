use anyhow::Context;
use clap::Parser;
use parcel_zoning::core::export;
use parcel_zoning::utils::error::{ErrorSeverity, ZoningError};
use parcel_zoning::utils::{logger, validation::Validate};
use parcel_zoning::{AnalysisReport, CliConfig, LayerConfig, LocalStorage, OutputFormat, SpatialAnalyzer};

fn main() {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting parcel-zoning CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = config.validate() {
        tracing::error!("Configuration validation failed: {}", e);
        tracing::error!("Suggestion: {}", e.recovery_suggestion());
        eprintln!("{}", e.user_friendly_message());
        std::process::exit(1);
    }

    if let Err(e) = run(&config) {
        match e.downcast_ref::<ZoningError>() {
            Some(err) => {
                tracing::error!(
                    "Analysis failed: {} (Category: {:?}, Severity: {:?})",
                    err,
                    err.category(),
                    err.severity()
                );
                tracing::error!("Recovery suggestion: {}", err.recovery_suggestion());
                eprintln!("{}", err.user_friendly_message());
                eprintln!("Suggestion: {}", err.recovery_suggestion());

                let exit_code = match err.severity() {
                    ErrorSeverity::Low => 0,
                    ErrorSeverity::Medium => 2,
                    ErrorSeverity::High => 1,
                    ErrorSeverity::Critical => 3,
                };
                if exit_code > 0 {
                    std::process::exit(exit_code);
                }
            }
            None => {
                tracing::error!("Analysis failed: {:#}", e);
                eprintln!("Error: {:#}", e);
                std::process::exit(1);
            }
        }
    }
}

fn run(config: &CliConfig) -> anyhow::Result<()> {
    let layers = match &config.config {
        Some(path) => {
            let layers = LayerConfig::from_file(path).with_context(|| format!("loading layer config {}", path))?;
            layers.validate()?;
            layers
        }
        None => {
            tracing::warn!("No layer configuration given, only the zone map will be used");
            LayerConfig::default()
        }
    };

    let egrn = std::fs::read(&config.egrn).with_context(|| format!("reading EGRN extract {}", config.egrn))?;
    let kpt = match &config.kpt {
        Some(path) => Some(std::fs::read(path).with_context(|| format!("reading KPT extract {}", path))?),
        None => None,
    };

    let storage = LocalStorage::new(config.layers_dir.clone());
    let analyzer = SpatialAnalyzer::new(storage, layers);

    for (layer, present) in analyzer.layer_availability() {
        if !present {
            tracing::warn!("Layer '{}' is not available", layer);
        }
    }

    let report = analyzer.analyze_documents(&egrn, kpt.as_deref())?;
    write_report(config, &report)?;

    tracing::info!(
        restrictions = report.has_restrictions(),
        planning_project = report.in_planning_project(),
        "Analysis completed with {} warnings and {} errors",
        report.warnings.len(),
        report.errors.len()
    );
    Ok(())
}

fn write_report(config: &CliConfig, report: &AnalysisReport) -> anyhow::Result<()> {
    let data = match config.format {
        OutputFormat::Json => export::report_json(report)?.into_bytes(),
        OutputFormat::Csv => export::records_csv(report)?.into_bytes(),
        OutputFormat::Summary => format!("{}\n", report.summary()).into_bytes(),
        OutputFormat::Bundle => export::bundle(report)?,
    };

    match &config.output {
        Some(path) => {
            if let Some(parent) = std::path::Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            std::fs::write(path, &data).with_context(|| format!("writing {}", path))?;
            tracing::info!("Output saved to: {}", path);
        }
        None => {
            use std::io::Write;
            std::io::stdout().write_all(&data)?;
        }
    }
    Ok(())
}
