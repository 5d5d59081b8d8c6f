//! Synthetic input for the `bulk_test` table.
//!
//! Generated files follow the `bulk_test` column layout with a header row.
//! `time` advances one second per row, so `(time, device_id)` never repeats
//! within a file.

use crate::error::LoadError;
use crate::schema::Schema;
use chrono::{DateTime, Duration, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::io::Write;
use std::path::Path;

const DEVICE_COUNT: i32 = 100;
const LABELS: &[&str] = &[
    "idle", "active", "degraded", "offline", "calibrating", "alarm, high", "maintenance",
];

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
        .single()
        .unwrap_or_else(Utc::now)
}

/// Write `rows` synthetic records (plus header) to `writer`.
pub fn write_bulk_test<W: Write>(writer: W, rows: usize, seed: u64) -> Result<(), LoadError> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut csv = csv::Writer::from_writer(writer);
    let schema = Schema::bulk_test();
    csv.write_record(schema.columns().iter().map(|c| c.name.as_str()))?;

    let start = base_time();
    for i in 0..rows {
        let time = start + Duration::seconds(i as i64);
        let device_id = (i as i32) % DEVICE_COUNT;
        let label = LABELS.choose(&mut rng).copied().unwrap_or("idle");

        csv.write_record([
            time.to_rfc3339(),
            device_id.to_string(),
            rng.gen_range(0..1_000).to_string(),
            rng.gen_range(0..1_000).to_string(),
            rng.gen_range(-500..500).to_string(),
            rng.gen_range(0..100_000).to_string(),
            format!("{:.4}", rng.gen_range(0.0..100.0)),
            format!("{:.4}", rng.gen_range(-40.0..60.0)),
            format!("{:.4}", rng.r#gen::<f64>()),
            label.to_string(),
            format!("device-{device_id:03}"),
        ])?;
    }

    csv.flush()?;
    Ok(())
}

/// Write a synthetic CSV file at `path`.
pub fn generate_file(path: &Path, rows: usize, seed: u64) -> Result<(), LoadError> {
    let file = std::fs::File::create(path)?;
    write_bulk_test(std::io::BufWriter::new(file), rows, seed)?;
    log::info!("wrote {} rows to {}", rows, path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::load::RowSource;
    use std::collections::HashSet;

    #[test]
    fn test_generated_rows_parse_against_bulk_test() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bulk_test.csv");
        generate_file(&path, 250, 7).unwrap();

        let source = RowSource::open(&path, Schema::bulk_test()).unwrap();
        let rows = source.load_all().unwrap();
        assert_eq!(rows.len(), 250);

        let keys: HashSet<String> = rows
            .iter()
            .map(|row| format!("{:?}|{:?}", row.values()[0], row.values()[1]))
            .collect();
        assert_eq!(keys.len(), 250);
    }

    #[test]
    fn test_same_seed_same_output() {
        let mut a = Vec::new();
        let mut b = Vec::new();
        write_bulk_test(&mut a, 20, 42).unwrap();
        write_bulk_test(&mut b, 20, 42).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_zero_rows_writes_header_only() {
        let mut out = Vec::new();
        write_bulk_test(&mut out, 0, 1).unwrap();
        let text = String::from_utf8(out).unwrap();
        assert_eq!(text.lines().count(), 1);
        assert!(text.starts_with("time,device_id,val1"));
    }
}
