use crate::{common::*, config::LoadCheckpoint};

/// The time format used in run directory and checkpoint file names.
pub const FILE_STRFTIME: &str = "%Y-%m-%d-%H-%M-%S.%3f%z";

const CHECKPOINT_FILE_PATTERN: &str =
    r"^(\d{4}-\d{2}-\d{2}-\d{2}-\d{2}-\d{2}\.\d{3}[+-]\d{4})_\d{6}_[-+]?(\d+\.\d+|NaN|inf)\.ckpt$";

/// Save parameters to a checkpoint file named after the time, epoch and average loss.
pub fn save_checkpoint(
    vs: &nn::VarStore,
    checkpoint_dir: &Path,
    epoch: usize,
    loss: f64,
) -> Result<PathBuf> {
    let filename = checkpoint_file_name(Local::now(), epoch, loss);
    let path = checkpoint_dir.join(filename);
    vs.save(&path)
        .with_context(|| format!("failed to save checkpoint '{}'", path.display()))?;
    Ok(path)
}

fn checkpoint_file_name(time: DateTime<Local>, epoch: usize, loss: f64) -> String {
    let time = time.format(FILE_STRFTIME);
    if loss.is_finite() {
        format!("{}_{:06}_{:08.5}.ckpt", time, epoch, loss)
    } else {
        format!("{}_{:06}_{}.ckpt", time, epoch, loss)
    }
}

/// Find the checkpoint with the latest timestamp under the logging directory.
pub fn find_recent_checkpoint(logging_dir: &Path) -> Result<Option<PathBuf>> {
    let regex = Regex::new(CHECKPOINT_FILE_PATTERN)?;
    let pattern = format!("{}/*/checkpoints/*.ckpt", logging_dir.display());

    let paths = glob::glob(&pattern)?.collect::<Result<Vec<_>, _>>()?;
    let recent = paths
        .into_iter()
        .filter_map(|path| {
            let file_name = path.file_name()?.to_str()?;
            let captures = regex.captures(file_name)?;
            let datetime_str = captures.get(1)?.as_str();
            let datetime = DateTime::parse_from_str(datetime_str, FILE_STRFTIME).ok()?;
            Some((path, datetime))
        })
        .max_by_key(|(_path, datetime)| *datetime)
        .map(|(path, _datetime)| path);

    Ok(recent)
}

/// Load parameters from a diretory with specified checkpoint loading method.
///
/// Returns the loaded file, if any.
pub fn try_load_checkpoint(
    vs: &mut nn::VarStore,
    logging_dir: &Path,
    load_checkpoint: &LoadCheckpoint,
) -> Result<Option<PathBuf>> {
    let path = match load_checkpoint {
        LoadCheckpoint::Disabled => {
            info!("checkpoint loading is disabled");
            None
        }
        LoadCheckpoint::FromRecent => {
            let checkpoint_file = find_recent_checkpoint(logging_dir)?;
            if checkpoint_file.is_none() {
                warn!("no checkpoint file found");
            }
            checkpoint_file
        }
        LoadCheckpoint::FromFile { file } => {
            if file.is_file() {
                Some(file.to_owned())
            } else {
                warn!("{} is not a file", file.display());
                None
            }
        }
    };

    if let Some(path) = &path {
        info!("load checkpoint file {}", path.display());
        vs.load_partial(path)
            .with_context(|| format!("failed to load checkpoint '{}'", path.display()))?;
    }

    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::fs;

    #[test]
    fn checkpoint_file_name_matches_pattern() {
        let time = Local.ymd(2022, 3, 4).and_hms_milli(5, 6, 7, 89);
        let name = checkpoint_file_name(time, 12, 0.25);
        assert!(name.ends_with("_000012_00.25000.ckpt"), "{}", name);
        assert!(Regex::new(CHECKPOINT_FILE_PATTERN).unwrap().is_match(&name));
    }

    #[test]
    fn find_the_most_recent_checkpoint() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let early = Local.ymd(2022, 1, 1).and_hms_milli(0, 0, 0, 0);
        let late = Local.ymd(2022, 1, 2).and_hms_milli(0, 0, 0, 0);

        let run_dir = dir.path().join("run").join("checkpoints");
        fs::create_dir_all(&run_dir)?;
        let early_file = run_dir.join(checkpoint_file_name(early, 1, 1.0));
        let late_file = run_dir.join(checkpoint_file_name(late, 0, 2.0));
        fs::write(&early_file, b"")?;
        fs::write(&late_file, b"")?;
        fs::write(run_dir.join("unrelated.ckpt"), b"")?;

        assert_eq!(find_recent_checkpoint(dir.path())?, Some(late_file));
        Ok(())
    }

    #[test]
    fn negative_and_non_finite_losses_are_found() -> Result<()> {
        let regex = Regex::new(CHECKPOINT_FILE_PATTERN)?;
        let time = Local.ymd(2022, 3, 4).and_hms_milli(5, 6, 7, 89);
        for loss in [-1.5, f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let name = checkpoint_file_name(time, 3, loss);
            assert!(regex.is_match(&name), "{}", name);
        }

        let dir = tempfile::tempdir()?;
        let run_dir = dir.path().join("run").join("checkpoints");
        fs::create_dir_all(&run_dir)?;
        let early = Local.ymd(2022, 1, 1).and_hms_milli(0, 0, 0, 0);
        let late = Local.ymd(2022, 1, 2).and_hms_milli(0, 0, 0, 0);
        fs::write(run_dir.join(checkpoint_file_name(early, 0, 0.5)), b"")?;
        let diverged = run_dir.join(checkpoint_file_name(late, 1, f64::NAN));
        fs::write(&diverged, b"")?;

        assert_eq!(find_recent_checkpoint(dir.path())?, Some(diverged));
        Ok(())
    }

    #[test]
    fn no_checkpoint_in_empty_dir() -> Result<()> {
        let dir = tempfile::tempdir()?;
        assert_eq!(find_recent_checkpoint(dir.path())?, None);
        Ok(())
    }
}
