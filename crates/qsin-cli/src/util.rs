use std::{
    fs::File,
    io::{self, BufWriter, StdoutLock, Write as _},
    path::{Path, PathBuf},
};

use anyhow::Context;
use qsin_analysis::observation::{self, DataPartition, ItemBank, Observation, TrialRecord};
use tracing::info;

#[derive(Debug)]
pub enum Output {
    Stdout {
        writer: StdoutLock<'static>,
    },
    File {
        writer: BufWriter<File>,
        path: PathBuf,
    },
}

impl Output {
    pub fn save_json<T>(value: &T, output_path: Option<PathBuf>) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        let mut output = Output::from_output_path(output_path)?;
        output.write_json(value)?;
        info!(path = %output.display_path(), "output written");
        Ok(())
    }

    pub fn from_output_path(output_path: Option<PathBuf>) -> anyhow::Result<Self> {
        match output_path {
            Some(path) => Output::open(path),
            None => Ok(Output::stdout()),
        }
    }

    pub fn stdout() -> Self {
        Output::Stdout {
            writer: io::stdout().lock(),
        }
    }

    pub fn open(path: PathBuf) -> anyhow::Result<Self> {
        let file = File::create(&path)
            .with_context(|| format!("Failed to create output file: {}", path.display()))?;
        Ok(Output::File {
            writer: BufWriter::new(file),
            path,
        })
    }

    pub fn display_path(&self) -> String {
        match self {
            Output::Stdout { .. } => "stdout".to_string(),
            Output::File { path, .. } => path.display().to_string(),
        }
    }

    pub fn write_json<T>(&mut self, value: T) -> anyhow::Result<()>
    where
        T: serde::Serialize,
    {
        serde_json::to_writer_pretty(&mut *self, &value)
            .with_context(|| format!("Failed to write JSON to {}", self.display_path()))?;
        writeln!(&mut *self).with_context(|| {
            format!(
                "Failed to write newline after JSON to {}",
                self.display_path()
            )
        })?;
        self.flush()
            .with_context(|| format!("Failed to flush output to {}", self.display_path()))?;
        Ok(())
    }
}

impl io::Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Stdout { writer } => writer.write(buf),
            Output::File { writer, .. } => writer.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Stdout { writer } => writer.flush(),
            Output::File { writer, .. } => writer.flush(),
        }
    }
}

pub fn read_json_file<T, P>(file_kind: &str, path: P) -> anyhow::Result<T>
where
    T: serde::de::DeserializeOwned,
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let file = File::open(path)
        .with_context(|| format!("Failed to open {} file: {}", file_kind, path.display()))?;

    let reader = io::BufReader::new(file);
    let value = serde_json::from_reader(reader).with_context(|| {
        format!(
            "Failed to parse {} JSON file: {}",
            file_kind,
            path.display()
        )
    })?;

    Ok(value)
}

pub fn read_item_bank_file<P>(path: P) -> anyhow::Result<ItemBank>
where
    P: AsRef<Path>,
{
    read_json_file("item bank", path)
}

/// Layout of an observations input file
#[derive(Default, Debug, Clone, Copy, PartialEq, Eq, derive_more::FromStr)]
pub enum InputFormat {
    /// Array of scored observations
    #[default]
    Observations,
    /// Array of trial records with per-keyword scores
    Records,
}

/// Read observations, validate them and keep those of `partition`
///
/// `None` keeps every session.
pub fn read_observations_file<P>(
    path: P,
    format: InputFormat,
    partition: Option<DataPartition>,
) -> anyhow::Result<Vec<Observation>>
where
    P: AsRef<Path>,
{
    let path = path.as_ref();
    let observations = match format {
        InputFormat::Observations => {
            let observations: Vec<Observation> = read_json_file("observations", path)?;
            observations
                .iter()
                .try_for_each(Observation::validate)
                .map(|()| observations)
        }
        InputFormat::Records => {
            let records: Vec<TrialRecord> = read_json_file("trial records", path)?;
            observation::observations_from_records(&records)
        }
    }
    .with_context(|| format!("Invalid observation in {}", path.display()))?;

    let total = observations.len();
    let observations = match partition {
        Some(partition) => partition.select(&observations),
        None => observations,
    };
    info!(
        path = %path.display(),
        total,
        selected = observations.len(),
        "observations loaded"
    );
    Ok(observations)
}
