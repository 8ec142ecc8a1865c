use std::fs::File;
use std::io::{BufWriter, Write};

use anyhow::Result;
use clap::Parser;
use log::info;
use serde::Serialize;
use sram_forge_bin::{Catalog, ChipConfig, SlotTable, init_logging};
use sram_forge_core::FitResult;

/// CLI arguments for the `compose` binary.
///
/// Runs the composition pipeline for one chip and writes the result as JSON.
#[derive(Debug, Parser, Serialize, Clone)]
struct CliArgs {
    /// The chip description.
    #[clap(long = "config", default_value = "config/chip.json")]
    config: String,
    /// The macro catalog.
    #[clap(long = "catalog", default_value = "config/srams.json")]
    catalog: String,
    /// The slot table.
    #[clap(long = "slots", default_value = "config/slots.json")]
    slots: String,
    /// Output file (JSON format). Defaults to stdout.
    #[clap(long = "output", short = 'o')]
    output: Option<String>,
    /// Stop after fit planning.
    #[clap(long = "fit-only")]
    fit_only: bool,
}

#[derive(Debug, Serialize)]
struct FitReport<'a> {
    chip: &'a str,
    slot: &'a str,
    #[serde(rename = "macro")]
    macro_name: &'a str,
    fit: FitResult,
    placement_density_pct: u32,
}

fn write_json<T: Serialize>(value: &T, output: Option<&str>) -> Result<()> {
    match output {
        Some(filename) => {
            let mut writer = BufWriter::new(File::create(filename)?);
            serde_json::to_writer_pretty(&mut writer, value)?;
            writeln!(writer)?;
            writer.flush()?;
            info!("Results saved to {}", filename);
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            serde_json::to_writer_pretty(&mut stdout, value)?;
            writeln!(stdout)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    init_logging()?;
    let args = CliArgs::parse();
    info!("CLI args: {:?}", args);

    let catalog = Catalog::from_jsonfile(&args.catalog)?;
    let slots = SlotTable::from_jsonfile(&args.slots)?;
    let chip = ChipConfig::from_jsonfile(&args.config)?;
    info!(
        "Loaded {} macros, chip {:?} targets slot {:?}",
        catalog.len(),
        chip.chip.name,
        chip.slot
    );

    let forge = chip.build_forge(&catalog, &slots)?;
    if args.fit_only {
        let fit = forge.plan()?;
        let report = FitReport {
            chip: &chip.chip.name,
            slot: &chip.slot,
            macro_name: &chip.memory.macro_name,
            placement_density_pct: fit.placement_density_pct(),
            fit,
        };
        return write_json(&report, args.output.as_deref());
    }

    let composition = forge.run()?;
    write_json(&composition, args.output.as_deref())
}
