use anyhow::{bail, Context, Result};
use clap::Parser;
use img_convert::cli::{Args, Commands, InputArgs};
use img_convert::status;
use img_convert::utils::format_file_size;
use img_convert::{
    logger, BatchConverter, ConversionResult, ExportOptions, Quality, ScanOptions, ScanReport,
    SizeEstimate, Workspace,
};
use serde::Serialize;

fn main() -> Result<()> {
    let args = Args::parse();
    logger::init(args.quiet, args.verbose);
    let options = args.command.scan_options();

    match args.command {
        Commands::Scan { input, .. } => {
            let (workspace, report) = load(&input, &options, Quality::default())?;
            if input.json {
                print_json(&report)?;
            } else {
                print_inventory(&workspace, &report);
            }
        }
        Commands::Estimate { input, quality } => {
            let (workspace, report) = load(&input, &options, Quality::new(quality)?)?;
            let estimate = workspace.estimate();
            if input.json {
                print_json(&estimate)?;
            } else {
                print_failures(&report);
                print_estimate(estimate.as_ref(), workspace.quality());
            }
        }
        Commands::Convert {
            input,
            output,
            quality,
            layout,
        } => {
            let (workspace, report) = load(&input, &options, Quality::new(quality)?)?;
            if !input.json {
                print_failures(&report);
            }

            let converter = BatchConverter::new(ExportOptions {
                layout: layout.into(),
                max_workers: input.threads,
            });
            let result = converter.run_job(&workspace.snapshot(), &output);

            if input.json {
                print_json(&result)?;
            } else {
                print_result(&result);
            }
            if !result.success {
                bail!("{}", result.message);
            }
        }
    }

    Ok(())
}

fn load(
    input: &InputArgs,
    options: &ScanOptions,
    quality: Quality,
) -> Result<(Workspace, ScanReport)> {
    let mut workspace = Workspace::new(quality);
    let report = workspace
        .submit(&input.paths, options)
        .context("Failed to scan inputs")?;
    Ok((workspace, report))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_inventory(workspace: &Workspace, report: &ScanReport) {
    for entry in workspace.entries() {
        status!(
            "  {:<40} {:>5}x{:<5} {:>10}  {}",
            entry.name,
            entry.width,
            entry.height,
            format_file_size(entry.size_bytes),
            entry.format
        );
        if logger::is_verbose() {
            status!("    {}", entry.location);
        }
    }
    print_failures(report);
    status!("Found {} image(s)", workspace.len());
}

fn print_failures(report: &ScanReport) {
    if !report.has_failures() {
        return;
    }
    status!(
        "Skipped {} unreadable input(s) and {} unreadable image(s)",
        report.expansion_failures.len(),
        report.probe_failures.len()
    );
}

fn print_estimate(estimate: Option<&SizeEstimate>, quality: Quality) {
    match estimate {
        Some(estimate) => {
            status!("Images:          {}", estimate.entry_count);
            status!("Quality:         {}", quality);
            status!("Original size:   {}", format_file_size(estimate.original_total));
            status!("Estimated size:  {}", format_file_size(estimate.estimated_total));
            status!("Savings:         {:.1}%", estimate.savings_percent);
        }
        None => status!("No images found"),
    }
}

fn print_result(result: &ConversionResult) {
    for failure in &result.failures {
        status!("  failed: {}", failure);
    }
    if result.success {
        status!("{}", result.message);
        if let Some(path) = &result.output_path {
            status!(
                "Saved {} to {}",
                format_file_size(result.output_bytes),
                path.display()
            );
        }
    }
}
