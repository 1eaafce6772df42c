
use log::{LevelFilter, error, info};
use std::time::Instant;

use gtmerge::cli::core::get_cli;
use gtmerge::cli::generate::check_generate_settings;
use gtmerge::merge_engine::{ensure_same_chromosome, merge_streams, PositionPool};
use gtmerge::parsing::vcf_reader::VcfReader;
use gtmerge::writers::RowSink;
use gtmerge::writers::genotype_matrix::GenotypeMatrixWriter;

fn main() {
    let settings = get_cli();

    // start the timer
    let start_time = Instant::now();

    // set up logging before we check the other settings
    let filter_level: LevelFilter = match settings.verbosity {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace
    };
    env_logger::builder()
        .format_timestamp_millis()
        .filter_level(filter_level)
        .init();

    let settings = match check_generate_settings(settings) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while verifying settings: {e:#}");
            std::process::exit(exitcode::CONFIG);
        }
    };

    // create the output folder
    match std::fs::create_dir_all(&settings.output_dir) {
        Ok(()) => {},
        Err(e) => {
            error!("Error while creating output folder: {e}");
            std::process::exit(exitcode::IOERR);
        }
    }

    // first pass over the modern file builds the position pool
    info!("Building position pool from {:?}...", settings.modern_fn);
    let pool_reader = match VcfReader::open(&settings.modern_fn) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while opening modern VCF: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let pool = match PositionPool::from_records(pool_reader) {
        Ok(p) => p,
        Err(e) => {
            error!("Error while building position pool: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    info!("Position pool contains {} unique sites.", pool.len());

    // second pass over the modern file supplies the merge cursor
    let mut modern_reader = match VcfReader::open(&settings.modern_fn) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while opening modern VCF: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let mut archaic_reader = match VcfReader::open(&settings.archaic_fn) {
        Ok(r) => r,
        Err(e) => {
            error!("Error while opening archaic VCF: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    // only the first archaic sample column gets used
    let archaic_sample = match archaic_reader.sample_names().first() {
        Some(s) => s.clone(),
        None => {
            error!("Archaic VCF has no sample column after FORMAT: {:?}", settings.archaic_fn);
            std::process::exit(exitcode::DATAERR);
        }
    };
    let modern_samples = modern_reader.sample_names().to_vec();
    info!("Archaic sample: {archaic_sample:?}");
    info!("Modern samples: {}", modern_samples.len());

    // the output is named after the archaic sample and the chromosome of its first record
    let archaic_chrom = match archaic_reader.first_chrom() {
        Ok(Some(c)) => c,
        Ok(None) => {
            error!("Archaic VCF has no data rows: {:?}", settings.archaic_fn);
            std::process::exit(exitcode::DATAERR);
        },
        Err(e) => {
            error!("Error while reading archaic VCF: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    let modern_chrom = match modern_reader.first_chrom() {
        Ok(c) => c,
        Err(e) => {
            error!("Error while reading modern VCF: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };

    // both inputs have to describe the same chromosome before anything gets written
    if let Err(e) = ensure_same_chromosome(&archaic_chrom, modern_chrom.as_deref()) {
        error!("Error while checking inputs: {e}");
        std::process::exit(exitcode::DATAERR);
    }

    let out_fn = settings.output_dir.join(format!("{archaic_sample}_{archaic_chrom}.gz"));
    info!("Writing genotype matrix to {out_fn:?}...");
    let mut matrix_writer = match GenotypeMatrixWriter::new(&out_fn) {
        Ok(w) => w,
        Err(e) => {
            error!("Error while creating output file: {e:#}");
            std::process::exit(exitcode::IOERR);
        }
    };
    if let Err(e) = matrix_writer.write_header(&archaic_sample, &modern_samples) {
        error!("Error while writing output header: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    // single forward pass over both streams
    let summary = match merge_streams(
        archaic_reader, modern_reader, &pool, modern_samples.len(), &mut matrix_writer
    ) {
        Ok(s) => s,
        Err(e) => {
            error!("Error while merging variant streams: {e:#}");
            std::process::exit(exitcode::DATAERR);
        }
    };

    if let Err(e) = matrix_writer.finish() {
        error!("Error while finalizing output file: {e:#}");
        std::process::exit(exitcode::IOERR);
    }

    info!("Archaic records scanned: {}", summary.archaic_records());
    info!("\tNon-SNV sites skipped: {}", summary.non_snv_skipped());
    info!("\tPrivate archaic rows: {}", summary.private_rows());
    info!("\tMatched rows: {}", summary.matched_rows());
    info!("\tUnmatched sites: {}", summary.unmatched_sites());
    info!("Rows emitted: {}", summary.rows_emitted());
    info!("Merge completed in {} seconds.", start_time.elapsed().as_secs_f64());
    info!("Process finished successfully.");
}
