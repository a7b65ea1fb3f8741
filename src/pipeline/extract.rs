//! Extract flow: download, clean, split and summarise the student tables.

use std::path::{Path, PathBuf};

use crate::common::config::DataCfg;
use crate::common::error::PassResult;
use crate::data::service;
use crate::data::BasicStats;

/// Files produced by one extract run.
#[derive(Clone, Debug, PartialEq)]
pub struct ExtractOutput {
    pub data_dir: PathBuf,
    pub clean: PathBuf,
    pub train: PathBuf,
    pub test: PathBuf,
    pub stats: BasicStats,
}

/// Fetch the archive and process it.
pub fn extract_flow(cfg: &DataCfg) -> PassResult<ExtractOutput> {
    let data_dir = service::download_and_extract(cfg)?;
    process_extracted(&data_dir, cfg)
}

/// Everything after the download, for a folder holding the raw course tables.
pub fn process_extracted(data_dir: &Path, cfg: &DataCfg) -> PassResult<ExtractOutput> {
    let clean = service::treat_data(data_dir)?;
    let (train, test) = service::split_train_test(&clean, cfg.test_size, cfg.seed)?;
    let stats = service::basic_stats(&train)?;
    tracing::info!(train = %train.display(), test = %test.display(), "extract flow finished");
    Ok(ExtractOutput {
        data_dir: data_dir.to_path_buf(),
        clean,
        train,
        test,
        stats,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn processes_raw_tables_into_splits() {
        let dir = tempfile::tempdir().unwrap();
        let header = "school;sex;age;G1;G2;G3\n";
        let mut math = header.to_string();
        let mut por = header.to_string();
        for i in 0..10 {
            math.push_str(&format!("GP;F;{};8;9;{}\n", 15 + i % 4, 5 + i));
            por.push_str(&format!("MS;M;{};12;12;{}\n", 15 + i % 4, 8 + i));
        }
        fs::write(dir.path().join(service::MATH_FILE), math).unwrap();
        fs::write(dir.path().join(service::PORTUGUESE_FILE), por).unwrap();

        let out = process_extracted(dir.path(), &DataCfg::default()).unwrap();
        assert!(out.clean.is_file() && out.train.is_file() && out.test.is_file());
        assert_eq!(out.stats.rows, 16);
        assert!(out.stats.pass_rate > 0.0 && out.stats.pass_rate < 1.0);
    }
}
