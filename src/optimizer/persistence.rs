use std::path::Path;

use crate::config::Config;
use crate::error::Result;
use crate::space::SearchSpace;

use super::{BayesOpt, OptimizationState};

/// Everything needed to resume a run from disk.
///
/// The inner optimizer is not stored; a resumed run uses the default
/// [`BoxOptimizer`](crate::inner::BoxOptimizer) configured from `config`.
#[derive(Clone, Debug, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Checkpoint {
    /// The run configuration.
    pub config: Config,
    /// The search space.
    pub space: SearchSpace,
    /// The mutable run state.
    pub state: OptimizationState,
}

/// Write `value` as pretty JSON next to `path`, then rename over it.
fn write_atomic<T: serde::Serialize>(path: &Path, value: &T) -> Result<()> {
    let parent = path.parent().unwrap_or(Path::new("."));
    let tmp_path = parent.join(format!(
        ".{}.tmp",
        path.file_name().unwrap_or_default().to_string_lossy()
    ));
    let file = std::fs::File::create(&tmp_path)?;
    serde_json::to_writer_pretty(file, value)?;
    std::fs::rename(&tmp_path, path)?;
    Ok(())
}

impl OptimizationState {
    /// Save the snapshot to a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) or [`Error::Serde`](crate::Error::Serde) if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        write_atomic(path.as_ref(), self)
    }

    /// Load a snapshot from a JSON file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) or [`Error::Serde`](crate::Error::Serde) if the file cannot be read
    /// or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        Ok(serde_json::from_reader(std::io::BufReader::new(file))?)
    }
}

impl BayesOpt {
    /// Save configuration, search space and run state to a JSON file.
    ///
    /// The write is atomic: a temporary file in the same directory is
    /// renamed over `path`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) or [`Error::Serde`](crate::Error::Serde) if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let checkpoint = Checkpoint {
            config: self.config.clone(),
            space: self.space.clone(),
            state: self.snapshot(),
        };
        write_atomic(path.as_ref(), &checkpoint)?;
        trace_debug!(path = %path.as_ref().display(), "checkpoint saved");
        Ok(())
    }

    /// Rebuild an optimizer from a file written by [`save`](Self::save).
    ///
    /// Continuing the resumed run produces the same proposals as the
    /// uninterrupted run would have.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Io`](crate::Error::Io) or [`Error::Serde`](crate::Error::Serde) for unreadable files and
    /// the errors of [`BayesOpt::new`] and [`restore`](Self::restore).
    pub fn resume(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let checkpoint: Checkpoint = serde_json::from_reader(std::io::BufReader::new(file))?;
        let opt = Self::new(checkpoint.space, checkpoint.config)?;
        opt.restore(checkpoint.state)?;
        Ok(opt)
    }

    /// Replace the run state with a snapshot saved by
    /// [`OptimizationState::save`].
    ///
    /// # Errors
    ///
    /// See [`OptimizationState::load`] and [`restore`](Self::restore).
    pub fn load_state(&self, path: impl AsRef<Path>) -> Result<()> {
        let state = OptimizationState::load(path)?;
        self.restore(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn temp_path(name: &str) -> std::path::PathBuf {
        std::env::temp_dir().join(format!("smbo-{name}-{}.json", std::process::id()))
    }

    #[test]
    fn checkpoint_file_round_trips() {
        let opt = BayesOpt::builder()
            .space(SearchSpace::unit(2).unwrap())
            .learning("fixed")
            .n_init_samples(4)
            .n_iterations(2)
            .build()
            .unwrap();
        opt.initialize(&|x: &[f64]| Ok::<_, Error>(x[0] * x[1])).unwrap();

        let path = temp_path("round-trip");
        opt.save(&path).unwrap();
        let resumed = BayesOpt::resume(&path).unwrap();
        assert_eq!(resumed.snapshot(), opt.snapshot());
        assert_eq!(resumed.config(), opt.config());
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn missing_file_is_an_io_error() {
        assert!(matches!(
            OptimizationState::load(temp_path("missing")),
            Err(Error::Io(_))
        ));
    }
}
