/// Land-use fusion runner: reads a run configuration plus materialised
/// vector datasets, executes the fusion pipeline, and writes the
/// deliverables (fused + final rasters, legend and remap tables, area
/// statistics).
///
/// Dataset files are JSON-serialised `VectorDataset` values; readers for
/// GeoPackage / FileGDB containers live outside this repository and hand
/// their output over in that form.
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use serde::{Deserialize, Serialize};

use landfuse_core::classify::ClassRule;
use landfuse_core::crs::NoReproject;
use landfuse_core::dataset::VectorDataset;
use landfuse_core::legend::{write_legend_csv, write_remap_csv};
use landfuse_core::pipeline::{self, DatasetSpec, RunConfig, RunResult};
use landfuse_core::raster::{GridSpec, Raster, NODATA};
use landfuse_core::reclass::FinalRaster;
use landfuse_core::stats::{class_areas, legend_counts};

// ── CLI ──────────────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "fuse", about = "Fuse vector land-cover datasets into a categorical raster")]
struct Args {
    /// Path to the run configuration JSON.
    #[arg(short, long, default_value = "run.json")]
    config: PathBuf,

    /// Output directory (created if absent).
    #[arg(short, long, default_value = "out")]
    output: PathBuf,

    /// Skip the area-statistics tables.
    #[arg(long)]
    no_stats: bool,
}

// ── Run configuration ────────────────────────────────────────────────────────

/// On-disk run description, one entry per dataset in priority order.
#[derive(Debug, Deserialize)]
struct FuseConfig {
    /// Clip bbox (minx, miny, maxx, maxy); omit for the full extent.
    bbox: Option<(f64, f64, f64, f64)>,
    /// Pixel edge length in CRS units.
    resolution: f64,
    datasets: Vec<DatasetEntry>,
    /// Path to the external "globalcode" -> "SWATCODE" lookup JSON.
    lookup: PathBuf,
    class_priority: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
struct DatasetEntry {
    rule: ClassRule,
    path: PathBuf,
}

/// Sidecar carrying the georeferencing the bare TIFF container omits.
#[derive(Debug, Serialize)]
struct RasterSidecar<'a> {
    grid: &'a GridSpec,
    epsg: u32,
    nodata: u32,
    bits_per_pixel: u8,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let config_dir = args.config.parent().unwrap_or(Path::new(".")).to_path_buf();
    let config: FuseConfig = read_json(&args.config)
        .with_context(|| format!("reading run configuration {}", args.config.display()))?;

    let lookup_path = config_dir.join(&config.lookup);
    let lookup = read_json(&lookup_path)
        .with_context(|| format!("reading global lookup {}", lookup_path.display()))?;

    let mut datasets = Vec::with_capacity(config.datasets.len());
    for entry in &config.datasets {
        let path = config_dir.join(&entry.path);
        let dataset: VectorDataset =
            read_json(&path).with_context(|| format!("reading dataset {}", path.display()))?;
        info!("loaded dataset '{}' ({} features)", dataset.name, dataset.len());
        datasets.push(DatasetSpec { dataset, rule: entry.rule.clone() });
    }

    let run_config = RunConfig {
        grid: GridSpec::from_bbox(config.bbox, config.resolution),
        lookup,
        class_priority: config.class_priority,
    };
    let result = pipeline::run(&datasets, &run_config, &NoReproject)
        .context("fusion pipeline failed")?;

    fs::create_dir_all(&args.output)
        .with_context(|| format!("creating output directory {}", args.output.display()))?;
    write_outputs(&args.output, &result, !args.no_stats)?;

    println!(
        "fused {} layers into {}x{} raster: {} codes, {} classes, {} unmatched ({} ms)",
        result.layer_names.len(),
        result.fused.width,
        result.fused.height,
        result.code_table.len(),
        result.remap.classes.len(),
        result.warnings.unmatched_codes,
        result.elapsed_ms
    );
    Ok(())
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let text = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&text)?)
}

fn write_outputs(dir: &Path, result: &RunResult, with_stats: bool) -> Result<()> {
    // Fused raster keeps the transient run codes for auditability.
    write_fused_tiff(&dir.join("merged_output.tif"), &result.fused)?;
    write_sidecar(&dir.join("merged_output.json"), &result.fused.grid, 32)?;

    // The deliverable, at its reduced pixel width.
    let final_path = dir.join("landuse_final.tif");
    write_final_tiff(&final_path, &result.final_raster)?;
    write_sidecar(
        &dir.join("landuse_final.json"),
        &result.fused.grid,
        result.final_raster.bits_per_pixel(),
    )?;

    let legend_file = File::create(dir.join("legend.csv")).context("creating legend.csv")?;
    write_legend_csv(BufWriter::new(legend_file), &result.legend)?;

    let remap_file = File::create(dir.join("remap.csv")).context("creating remap.csv")?;
    write_remap_csv(BufWriter::new(remap_file), &result.remap)?;

    if with_stats {
        write_stats(dir, result)?;
    }
    Ok(())
}

fn write_fused_tiff(path: &Path, raster: &Raster<u32>) -> Result<()> {
    use tiff::encoder::{colortype, TiffEncoder};
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    encoder.write_image::<colortype::Gray32>(
        raster.width as u32,
        raster.height as u32,
        &raster.data,
    )?;
    Ok(())
}

fn write_final_tiff(path: &Path, raster: &FinalRaster) -> Result<()> {
    use tiff::encoder::{colortype, TiffEncoder};
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut encoder = TiffEncoder::new(BufWriter::new(file))?;
    match raster {
        FinalRaster::U8(r) => {
            encoder.write_image::<colortype::Gray8>(r.width as u32, r.height as u32, &r.data)?
        }
        FinalRaster::U16(r) => {
            encoder.write_image::<colortype::Gray16>(r.width as u32, r.height as u32, &r.data)?
        }
        FinalRaster::U32(r) => {
            encoder.write_image::<colortype::Gray32>(r.width as u32, r.height as u32, &r.data)?
        }
    }
    Ok(())
}

fn write_sidecar(path: &Path, grid: &GridSpec, bits_per_pixel: u8) -> Result<()> {
    let sidecar = RasterSidecar {
        grid,
        epsg: landfuse_core::CANONICAL_CRS.epsg(),
        nodata: NODATA,
        bits_per_pixel,
    };
    fs::write(path, serde_json::to_string_pretty(&sidecar)?)
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

/// detailed_sums.csv: one row per legend code with its pixel count
/// (zero-pixel codes included); sums.csv: per canonical class with
/// percentage shares.
fn write_stats(dir: &Path, result: &RunResult) -> Result<()> {
    let counts = legend_counts(&result.fused, &result.legend);

    let file = File::create(dir.join("detailed_sums.csv")).context("creating detailed_sums.csv")?;
    let mut w = csv::Writer::from_writer(BufWriter::new(file));
    w.write_record(["ID", "LU", "SWATCODE", "Count", "Area_km2"])?;
    for count in &counts {
        w.write_record([
            count.code.to_string(),
            count.label.clone(),
            count.canonical.clone().unwrap_or_default(),
            count.pixels.to_string(),
            format!("{:.6}", count.area_km2),
        ])?;
    }
    w.flush()?;

    let areas = class_areas(&result.final_raster, &result.remap, result.fused.grid.resolution);
    let file = File::create(dir.join("sums.csv")).context("creating sums.csv")?;
    let mut w = csv::Writer::from_writer(BufWriter::new(file));
    w.write_record(["SWATCODE", "Area_km2", "Area_%"])?;
    for area in &areas {
        w.write_record([
            area.class_name.clone(),
            format!("{:.2}", area.area_km2),
            format!("{:.2}", area.area_pct),
        ])?;
    }
    w.flush()?;
    Ok(())
}
