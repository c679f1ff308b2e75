use super::ImportArgs;
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use mysql_import::config::ImportConfig;
use mysql_import::connection::Connector;
use mysql_import::resolver;
use mysql_import::{DumpFile, DuckDbConnector, ImportError, ImportProgress, ImportSummary, Importer};
use serde::Serialize;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Serialize)]
pub(crate) struct ImportJsonOutput {
    target: String,
    database: Option<String>,
    encoding: String,
    files: Vec<ImportFileResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    statistics: Option<ImportStatistics>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ImportFileResult {
    file: String,
    status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct ImportStatistics {
    #[serde(flatten)]
    summary: ImportSummary,
    elapsed_secs: f64,
}

pub fn run(args: ImportArgs) -> anyhow::Result<()> {
    let config = match &args.config {
        Some(path) => ImportConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => ImportConfig::default(),
    };

    let encoding = match &args.encoding {
        Some(name) => name.clone(),
        None => config.encoding()?.name().to_string(),
    };
    let env_password = std::env::var("MYSQL_PWD").ok();
    let settings = args.connection.apply(config.connection, env_password);

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    match &args.duckdb {
        Some(path) => {
            let importer = Importer::new(DuckDbConnector::open(path), settings);
            let target = format!("duckdb:{}", path.display());
            runtime.block_on(execute(importer, &args, &encoding, target))
        }
        None => {
            let target = match &settings.socket {
                Some(socket) => format!("mysql:{}", socket.display()),
                None => format!("mysql://{}@{}:{}", settings.user, settings.host, settings.port),
            };
            runtime.block_on(execute(Importer::mysql(settings), &args, &encoding, target))
        }
    }
}

async fn execute<C: Connector>(
    mut importer: Importer<C>,
    args: &ImportArgs,
    encoding: &str,
    target: String,
) -> anyhow::Result<()> {
    importer.set_encoding(encoding)?;

    // Resolved up front so the progress bar knows the batch size
    let files = resolver::resolve(&args.inputs, importer.encoding())?;
    let sizes: Vec<u64> = files
        .iter()
        .map(|f| std::fs::metadata(&f.path).map(|m| m.len()).unwrap_or(0))
        .collect();
    let paths: Vec<PathBuf> = files.into_iter().map(|f| f.path).collect();

    if !args.json {
        println!(
            "Importing {} file(s) into {} [encoding: {}]",
            paths.len(),
            target,
            importer.encoding()
        );
    }

    let pb = if args.progress && !args.json {
        let pb = ProgressBar::new(sizes.iter().sum());
        pb.set_style(
            ProgressStyle::with_template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({percent}%) {msg}",
            )
            .unwrap()
            .progress_chars("█▓▒░  ")
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
        );
        pb.enable_steady_tick(std::time::Duration::from_millis(100));

        let offsets: Vec<u64> = sizes
            .iter()
            .scan(0u64, |acc, size| {
                let start = *acc;
                *acc += size;
                Some(start)
            })
            .collect();
        let pb_clone = pb.clone();
        importer.on_progress(Some(move |p: &ImportProgress| {
            let base = offsets.get(p.file_no - 1).copied().unwrap_or(0);
            pb_clone.set_position(base + p.bytes_processed);
            pb_clone.set_message(format!("{} statements", p.statements_executed));
        }));
        Some(pb)
    } else {
        None
    };

    let results = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&results);
    let echo = !args.json;
    let pb_clone = pb.clone();
    importer.on_dump_completed(Some(move |err: Option<&ImportError>, dump: &DumpFile| {
        let file = dump.path.display().to_string();
        if echo {
            let line = match err {
                None => format!("  ✓ {}", file),
                Some(e) => format!("  ✗ {}: {}", file, e),
            };
            match &pb_clone {
                Some(pb) => pb.println(line),
                None => println!("{}", line),
            }
        }
        if let Ok(mut results) = sink.lock() {
            results.push(ImportFileResult {
                file,
                status: if err.is_none() { "ok" } else { "failed" }.to_string(),
                error: err.map(|e| e.to_string()),
            });
        }
    }));

    let start_time = Instant::now();
    let outcome = importer.import(&paths).await;
    let closed = importer.disconnect(false).await;
    let elapsed = start_time.elapsed();

    if let Some(pb) = &pb {
        match &outcome {
            Ok(_) => pb.finish_with_message("done"),
            Err(_) => pb.abandon_with_message("failed"),
        }
    }

    // Printed even when the import failed
    if args.json {
        let files = results
            .lock()
            .map(|mut r| std::mem::take(&mut *r))
            .unwrap_or_default();
        let output_json = ImportJsonOutput {
            target,
            database: importer.settings().database.clone(),
            encoding: importer.encoding().to_string(),
            files,
            statistics: outcome.as_ref().ok().map(|summary| ImportStatistics {
                summary: *summary,
                elapsed_secs: elapsed.as_secs_f64(),
            }),
            error: outcome.as_ref().err().map(|e| e.to_string()),
        };
        println!("{}", serde_json::to_string_pretty(&output_json)?);
    }

    let summary = outcome.context("import failed")?;
    closed.context("failed to close connection")?;

    if !args.json {
        println!("\n✓ Import completed successfully!");
        println!("\nStatistics:");
        println!("  Files imported: {}", summary.files);
        println!("  Statements executed: {}", summary.statements);
        println!(
            "  Bytes processed: {:.2} MB",
            summary.bytes as f64 / (1024.0 * 1024.0)
        );
        println!("  Elapsed time: {:.3?}", elapsed);
    }

    Ok(())
}
