//! Service layer for acquiring, cleaning and splitting the student tables.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use crate::common::config::DataCfg;
use crate::common::error::{PassError, PassResult};
use crate::common::download::{self, Attempts, MAX_ARCHIVE_BYTES};
use crate::common::time;

use super::domain::{BasicStats, Cell, Frame};
use super::repo_fs;
use super::split;
use super::vectorizer::Vectorizer;

pub const MATH_FILE: &str = "student-mat.csv";
pub const PORTUGUESE_FILE: &str = "student-por.csv";
pub const CLEAN_FILE: &str = "students_clean.csv";
pub const TARGET: &str = "pass";
/// Final grade at or above which a student passes.
pub const PASS_GRADE: f64 = 10.0;

/// Download the archive at `cfg.url` and extract it into a dated folder
/// under `cfg.base_dir`.
pub fn download_and_extract(cfg: &DataCfg) -> PassResult<PathBuf> {
    let dir = cfg.base_dir.join(time::utc_date_folder());
    fs::create_dir_all(&dir).map_err(|source| PassError::io(&dir, source))?;

    tracing::info!(url = %cfg.url, dir = %dir.display(), "fetching archive");
    let bytes = download::download(&cfg.url, Attempts::from_cfg(cfg), MAX_ARCHIVE_BYTES)?;

    unzip_bytes(&bytes, &dir)?;
    unfold_nested(&dir)?;
    Ok(dir)
}

/// Extract every safely named entry of an in-memory zip into `dest`.
pub fn unzip_bytes(bytes: &[u8], dest: &Path) -> PassResult<usize> {
    let mut archive = zip::ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| PassError::Archive(err.to_string()))?;
    let mut written = 0usize;
    for i in 0..archive.len() {
        let mut entry = archive
            .by_index(i)
            .map_err(|err| PassError::Archive(err.to_string()))?;
        let Some(relative) = entry.enclosed_name() else {
            tracing::warn!(name = entry.name(), "skipping unsafe archive entry");
            continue;
        };
        let outpath = dest.join(relative);
        if entry.is_dir() {
            fs::create_dir_all(&outpath).map_err(|source| PassError::io(&outpath, source))?;
            continue;
        }
        if let Some(parent) = outpath.parent() {
            fs::create_dir_all(parent).map_err(|source| PassError::io(parent, source))?;
        }
        let mut file =
            fs::File::create(&outpath).map_err(|source| PassError::io(&outpath, source))?;
        std::io::copy(&mut entry, &mut file).map_err(|source| PassError::io(&outpath, source))?;
        written += 1;
    }
    Ok(written)
}

/// Extract any `*.zip` sitting directly in `dir`, then delete it.
fn unfold_nested(dir: &Path) -> PassResult<()> {
    let entries = fs::read_dir(dir).map_err(|source| PassError::io(dir, source))?;
    let mut nested = entries
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|path| path.extension().is_some_and(|ext| ext == "zip"))
        .collect::<Vec<_>>();
    nested.sort();
    for path in nested {
        tracing::info!(archive = %path.display(), "unfolding nested archive");
        let bytes = fs::read(&path).map_err(|source| PassError::io(&path, source))?;
        unzip_bytes(&bytes, dir)?;
        fs::remove_file(&path).map_err(|source| PassError::io(&path, source))?;
    }
    Ok(())
}

/// Merge the math and Portuguese tables, derive `pass` and drop the raw grades.
pub fn treat_data(dir: &Path) -> PassResult<PathBuf> {
    let math = repo_fs::read_csv(&dir.join(MATH_FILE), b';')?
        .with_constant("course", Cell::Text("math".into()));
    let por = repo_fs::read_csv(&dir.join(PORTUGUESE_FILE), b';')?
        .with_constant("course", Cell::Text("por".into()));

    let students = clean(Frame::concat(vec![math, por])?)?;
    let out = dir.join(CLEAN_FILE);
    repo_fs::write_csv(&out, &students)?;
    tracing::info!(
        path = %out.display(),
        rows = students.len(),
        dataset = %students.fingerprint(),
        "treated data saved"
    );
    Ok(out)
}

fn clean(frame: Frame) -> PassResult<Frame> {
    let grade = frame.column_index("G3")?;
    frame
        .with_derived(TARGET, |_, row| {
            let value = row[grade].as_f64().ok_or_else(|| {
                PassError::invalid(format!("non-numeric final grade '{}'", row[grade]))
            })?;
            Ok(Cell::Num(if value >= PASS_GRADE { 1.0 } else { 0.0 }))
        })?
        .drop_columns(&["G1", "G2", "G3"])
}

/// Shuffle-split the cleaned table into `train.csv` and `test.csv` next to it.
pub fn split_train_test(path: &Path, test_size: f64, seed: u64) -> PassResult<(PathBuf, PathBuf)> {
    let frame = repo_fs::read_csv(path, b',')?;
    let split = split::shuffle_split(frame.len(), test_size, seed)?;
    let train_path = path.with_file_name("train.csv");
    let test_path = path.with_file_name("test.csv");
    repo_fs::write_csv(&train_path, &frame.take(&split.train))?;
    repo_fs::write_csv(&test_path, &frame.take(&split.test))?;
    Ok((train_path, test_path))
}

/// Row count and pass/fail rates of a labelled file.
pub fn basic_stats(path: &Path) -> PassResult<BasicStats> {
    let frame = repo_fs::read_csv(path, b',')?;
    let labels = frame.labels(TARGET)?;
    if labels.is_empty() {
        return Err(PassError::invalid("no rows to summarise"));
    }
    let pass_rate = labels.iter().map(|&l| f64::from(l)).sum::<f64>() / labels.len() as f64;
    let stats = BasicStats {
        rows: labels.len(),
        pass_rate,
        fail_rate: 1.0 - pass_rate,
    };
    tracing::info!(
        rows = stats.rows,
        pass_rate = %format_args!("{:.2}%", stats.pass_rate * 100.0),
        fail_rate = %format_args!("{:.2}%", stats.fail_rate * 100.0),
        "basic stats"
    );
    Ok(stats)
}

/// Vectorised training material with a stratified validation split.
#[derive(Clone, Debug)]
pub struct TrainingSplit {
    pub x_train: ndarray::Array2<f64>,
    pub y_train: Vec<u8>,
    pub x_val: ndarray::Array2<f64>,
    pub y_val: Vec<u8>,
    pub vectorizer: Vectorizer,
}

/// Fit the vectorizer on all rows and cut a stratified validation set.
pub fn vectorize(
    frame: &Frame,
    target: &str,
    val_size: f64,
    seed: u64,
) -> PassResult<TrainingSplit> {
    let labels = frame.labels(target)?;
    let vectorizer = Vectorizer::fit(frame, &[target]);
    let x = vectorizer.transform(frame, &[target]);
    let split = split::stratified_split(&labels, val_size, seed)?;

    let rows = |indices: &[usize]| x.select(ndarray::Axis(0), indices);
    let pick = |indices: &[usize]| indices.iter().map(|&i| labels[i]).collect::<Vec<_>>();
    Ok(TrainingSplit {
        x_train: rows(&split.train),
        y_train: pick(&split.train),
        x_val: rows(&split.test),
        y_val: pick(&split.test),
        vectorizer,
    })
}
