//! Stages the `pg_worker` binary where the unprivileged user can run it.

use super::BoxError;
use super::fs_utils::open_parent_dir;
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use cap_std::fs::{Permissions, PermissionsExt};
use std::collections::HashMap;
use std::io::{ErrorKind, Write};
use std::sync::{Mutex, OnceLock, PoisonError};

static PREPARED: OnceLock<Mutex<HashMap<Utf8PathBuf, Utf8PathBuf>>> = OnceLock::new();

pub(super) fn locate_pg_worker_path() -> Option<Utf8PathBuf> {
    crate::test_helpers::locate_pg_worker_path()
}

/// Copies `worker` into the temp directory behind a wrapper script that drops
/// to `nobody`. Build directories under `/root` are not traversable by that
/// user, so the worker cannot run from where cargo left it.
pub(super) fn prepare_pg_worker(worker: &Utf8Path) -> Result<Utf8PathBuf, BoxError> {
    let mut prepared = PREPARED
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    if let Some(path) = prepared.get(worker) {
        return Ok(path.clone());
    }

    let temp_dir = Utf8PathBuf::try_from(std::env::temp_dir())?;
    let wrapper = temp_dir.join(format!("scrapeyard_pg_worker_{}", std::process::id()));
    let binary = wrapper.with_extension("bin");
    let (source_dir, source_name) = open_parent_dir(worker)?;
    let (wrapper_dir, wrapper_name) = open_parent_dir(&wrapper)?;
    let (binary_dir, binary_name) = open_parent_dir(&binary)?;

    for (dir, name) in [(&wrapper_dir, wrapper_name), (&binary_dir, binary_name)] {
        match dir.remove_file(name) {
            Ok(()) => {}
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => return Err(err.into()),
        }
    }
    source_dir.copy(source_name, &binary_dir, binary_name)?;
    let script = format!(
        concat!(
            "#!/bin/sh\n",
            "if [ \"$(id -u)\" -eq 0 ]; then\n",
            "  exec /usr/sbin/runuser -u nobody -- {worker} \"$@\"\n",
            "fi\n",
            "exec {worker} \"$@\"\n",
        ),
        worker = binary.as_str()
    );
    wrapper_dir
        .create(wrapper_name)?
        .write_all(script.as_bytes())?;

    #[cfg(unix)]
    {
        wrapper_dir.set_permissions(wrapper_name, Permissions::from_mode(0o755))?;
        binary_dir.set_permissions(binary_name, Permissions::from_mode(0o755))?;
    }

    prepared.insert(worker.to_owned(), wrapper.clone());
    Ok(wrapper)
}

#[cfg(test)]
mod tests {
    //! Staging of the helper binary.

    use super::prepare_pg_worker;
    use camino::Utf8PathBuf;
    use cap_std::ambient_authority;
    use cap_std::fs_utf8::Dir;
    use std::io::Write;

    fn scratch_worker() -> eyre::Result<Utf8PathBuf> {
        let base = Utf8PathBuf::try_from(std::env::temp_dir())?;
        let dir_name = format!("scrapeyard_worker_src_{}", uuid::Uuid::new_v4());
        Dir::open_ambient_dir(&base, ambient_authority())?.create_dir(&dir_name)?;
        let dir = base.join(dir_name);
        Dir::open_ambient_dir(&dir, ambient_authority())?
            .create("pg_worker")?
            .write_all(b"#!/bin/sh\nexit 0\n")?;
        Ok(dir.join("pg_worker"))
    }

    #[test]
    fn staging_is_cached_and_executable() -> eyre::Result<()> {
        let worker = scratch_worker()?;

        let first = prepare_pg_worker(&worker).map_err(|err| eyre::eyre!("{err}"))?;
        let second = prepare_pg_worker(&worker).map_err(|err| eyre::eyre!("{err}"))?;

        eyre::ensure!(first == second, "staged path changed: {first} then {second}");
        let script = std::fs::read_to_string(first.as_std_path())?;
        eyre::ensure!(script.contains("runuser -u nobody"));
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt as _;
            let mode = std::fs::metadata(first.as_std_path())?.permissions().mode();
            eyre::ensure!(mode & 0o111 != 0, "wrapper mode {mode:o}");
        }
        Ok(())
    }
}
