mod config;
mod error;
mod ftl;
mod trace;

use std::env;
use std::fs::File;
use std::io::BufReader;

use anyhow::{Context, Result};
use log::{info, trace};
use rand::prelude::*;
use simplelog::*;
use time::macros::format_description;

use crate::config::Geometry;
use crate::ftl::Ftl;
use crate::trace::{Op, TraceReader};

fn main() -> Result<()> {
    let log_cfg = ConfigBuilder::new()
        .set_time_format_custom(format_description!("[hour]:[minute]:[second].[subsecond]"))
        .build();

    SimpleLogger::init(LevelFilter::Trace, log_cfg)?;

    match env::args().nth(1) {
        Some(path) => replay(&path),
        None => synthetic(),
    }
}

/// Replay a trace file, reporting WAF and utilization after every full
/// physical capacity of written data.
fn replay(path: &str) -> Result<()> {
    let geometry = Geometry::default();
    let report_interval = geometry.physical_bytes();
    let page_size = geometry.page_size;
    let mut fw = Ftl::new(geometry)?;

    let file = File::open(path).with_context(|| format!("cannot open trace file {}", path))?;
    info!("replaying {}", path);

    let mut processed = 0;
    let mut reported_gib = 0;
    for record in TraceReader::new(BufReader::new(file)) {
        let record = record.context("reading trace")?;
        if record.op != Op::Write {
            trace!(
                "skipping {:?} at {:.6} ({} bytes, stream {})",
                record.op,
                record.timestamp,
                record.size,
                record.stream
            );
            continue;
        }

        fw.write(record.lba)
            .with_context(|| format!("write at lba {}", record.lba))?;
        processed += page_size;

        if processed >= report_interval {
            reported_gib += processed >> 30;
            processed = 0;
            if let Some(waf) = fw.waf() {
                info!(
                    "[progress: {} GiB] WAF: {:.3}, utilization: {:.3}",
                    reported_gib,
                    waf,
                    fw.utilization()
                );
            }
        }
    }

    summary(&fw);
    Ok(())
}

/// Precondition the whole drive sequentially, then overwrite it randomly
/// four capacities over from a fixed seed.
fn synthetic() -> Result<()> {
    let op = 7.0;
    let mut fw = Ftl::new(Geometry::with_over_provisioning(op))?;
    let max_lba = fw.max_lba();

    for lba in 0..max_lba {
        fw.write(lba)?;
    }
    info!("Drive preconditioned");

    let mut rng: SmallRng = SmallRng::seed_from_u64(7);

    for c in 0..4 {
        for _ in 0..max_lba {
            let lba = rng.gen_range(0..max_lba);
            fw.write(lba)?;
        }
        match fw.waf() {
            Some(waf) => info!(
                "Capacity {} randomly written, WAF: {:.3}, utilization: {:.3}",
                c,
                waf,
                fw.utilization()
            ),
            None => info!("Capacity {} randomly written", c),
        }
    }

    summary(&fw);
    Ok(())
}

fn summary(fw: &Ftl) {
    info!(
        "{} user writes, {} gc writes, {} live lbas, {} free blocks",
        fw.user_writes(),
        fw.gc_writes(),
        fw.live_lbas(),
        fw.free_block_count()
    );
    if let Some(waf) = fw.waf() {
        info!("WAF: {:.3}, utilization: {:.3}", waf, fw.utilization());
    }
}

#[cfg(test)]
mod tests {
    use crate::config::Geometry;
    use crate::ftl::Ftl;

    #[test]
    fn writes_against_default_geometry() {
        let mut fw = Ftl::new(Geometry::default()).unwrap();

        fw.write(0).unwrap();
        fw.write(fw.max_lba() - 1).unwrap();
        fw.write(fw.max_lba() - 1).unwrap();

        assert_eq!(fw.live_lbas(), 2);
        assert_eq!(fw.user_writes(), 3);
    }

    #[test]
    fn writes_more_than_one_block() {
        let mut fw = Ftl::new(Geometry::with_over_provisioning(7.0)).unwrap();
        let pages_per_block = crate::config::PAGES_PER_BLOCK;

        for lba in 0..pages_per_block + 1 {
            fw.write(lba).unwrap();
        }
        assert_eq!(fw.free_block_count(), crate::config::BLOCKS_PER_DEVICE - 1);
    }
}
