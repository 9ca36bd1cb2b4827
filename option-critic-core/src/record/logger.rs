//! Aggregating logger writing a JSON-lines progress file.
use super::{Record, RecordValue};
use anyhow::Result;
use log::info;
use std::{
    collections::HashMap,
    fs::{create_dir_all, File, OpenOptions},
    io::{BufRead, BufReader, Write},
    path::PathBuf,
};

const PROGRESS_FILE: &str = "progress.json";

/// Accumulates per-episode metrics and periodically dumps their means.
///
/// [`Logger::store`] collects scalar samples under their keys. [`Logger::dump`]
/// averages the samples collected since the previous dump, appends the result
/// as one JSON line to `progress.json` under the save directory and emits it
/// through [`log::info!`]. Without a save directory only the log output is
/// produced.
pub struct Logger {
    save_dir: Option<PathBuf>,
    scalars: HashMap<String, Vec<f32>>,
    latest: Record,
}

impl Logger {
    /// Creates a logger, creating the save directory if it does not exist.
    pub fn new(save_dir: Option<PathBuf>) -> Result<Self> {
        if let Some(dir) = &save_dir {
            create_dir_all(dir)?;
        }
        Ok(Self {
            save_dir,
            scalars: HashMap::new(),
            latest: Record::empty(),
        })
    }

    /// Accumulates the values of a record.
    ///
    /// Scalar values are collected as samples to be averaged at the next dump;
    /// other value types overwrite the previously stored one.
    pub fn store(&mut self, record: Record) {
        for (k, v) in record.into_iter_in_record() {
            match v {
                RecordValue::Scalar(x) => {
                    self.scalars.entry(k).or_insert_with(Vec::new).push(x)
                }
                _ => self.latest.insert(k, v),
            }
        }
    }

    /// Dumps the means of the accumulated scalars and clears the accumulator.
    pub fn dump(&mut self) -> Result<Record> {
        let mut record = std::mem::replace(&mut self.latest, Record::empty());
        let mut keys: Vec<_> = self.scalars.keys().cloned().collect();
        keys.sort();
        for k in keys.iter() {
            let samples = &self.scalars[k];
            let mean = samples.iter().sum::<f32>() / samples.len() as f32;
            record.insert(k.clone(), RecordValue::Scalar(mean));
        }
        self.scalars.clear();

        let mut line = String::new();
        for k in keys.iter() {
            if let Ok(v) = record.get_scalar(k) {
                line.push_str(&format!("{}: {:.4}, ", k, v));
            }
        }
        info!("{}", line.trim_end_matches(", "));

        if let Some(dir) = &self.save_dir {
            let mut file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join(PROGRESS_FILE))?;
            writeln!(file, "{}", serde_json::to_string(&record)?)?;
        }
        Ok(record)
    }

    /// Extracts columns of scalar values from the progress file.
    ///
    /// Returns one vector per requested key, in the order of `keys`. Lines
    /// missing a key are skipped for that column.
    pub fn load_results(&self, keys: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut columns = vec![Vec::new(); keys.len()];
        let dir = match &self.save_dir {
            Some(dir) => dir,
            None => return Ok(columns),
        };
        let path = dir.join(PROGRESS_FILE);
        if !path.exists() {
            return Ok(columns);
        }
        let rdr = BufReader::new(File::open(path)?);
        for line in rdr.lines() {
            let record: Record = serde_json::from_str(&line?)?;
            for (i, k) in keys.iter().enumerate() {
                if let Ok(v) = record.get_scalar(k) {
                    columns[i].push(v);
                }
            }
        }
        Ok(columns)
    }

    /// Discards accumulated values and truncates the progress file.
    pub fn reset(&mut self) -> Result<()> {
        self.scalars.clear();
        self.latest = Record::empty();
        if let Some(dir) = &self.save_dir {
            let path = dir.join(PROGRESS_FILE);
            if path.exists() {
                File::create(path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    #[test]
    fn test_dump_averages_scalars() {
        let mut logger = Logger::new(None).unwrap();
        logger.store(Record::from_scalar("ep_ret", 10.0));
        logger.store(Record::from_scalar("ep_ret", 20.0));
        let record = logger.dump().unwrap();
        assert_eq!(record.get_scalar("ep_ret").unwrap(), 15.0);

        // The accumulator is cleared by the dump.
        logger.store(Record::from_scalar("ep_ret", 1.0));
        let record = logger.dump().unwrap();
        assert_eq!(record.get_scalar("ep_ret").unwrap(), 1.0);
    }

    #[test]
    fn test_load_results() {
        let dir = TempDir::new("logger").unwrap();
        let mut logger = Logger::new(Some(dir.path().to_path_buf())).unwrap();

        for i in 0..3 {
            logger.store(Record::from_scalar("ep_ret", i as f32));
            logger.store(Record::from_scalar("ep_len", 10.0 * i as f32));
            logger.dump().unwrap();
        }

        let columns = logger.load_results(&["ep_ret", "ep_len"]).unwrap();
        assert_eq!(columns[0], vec![0.0, 1.0, 2.0]);
        assert_eq!(columns[1], vec![0.0, 10.0, 20.0]);
    }

    #[test]
    fn test_reset_truncates() {
        let dir = TempDir::new("logger").unwrap();
        let mut logger = Logger::new(Some(dir.path().to_path_buf())).unwrap();

        logger.store(Record::from_scalar("ep_ret", 5.0));
        logger.dump().unwrap();
        logger.reset().unwrap();

        let columns = logger.load_results(&["ep_ret"]).unwrap();
        assert!(columns[0].is_empty());
    }
}
