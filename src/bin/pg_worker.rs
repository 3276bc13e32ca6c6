//! Runs one embedded `PostgreSQL` lifecycle step on behalf of the test
//! cluster when the tests themselves run as root.
//!
//! Usage:
//!
//! ```text
//! pg_worker <setup|start|stop> <payload-path>
//! ```
//!
//! The payload is the JSON [`WorkerPayload`] written by
//! `pg_embedded_setup_unpriv`: cluster settings plus environment overrides.
//! `PostgreSQL` refuses to run as root, so the worker switches to `nobody`
//! before touching the data directory.

#[cfg(unix)]
use camino::{Utf8Path, Utf8PathBuf};
#[cfg(unix)]
use nix::unistd::{Uid, User, initgroups, setgid, setuid};
#[cfg(unix)]
use pg_embedded_setup_unpriv::ambient_dir_and_path;
#[cfg(unix)]
use pg_embedded_setup_unpriv::worker::{PlainSecret, WorkerPayload};
#[cfg(unix)]
use postgresql_embedded::{PostgreSQL, Status};
#[cfg(unix)]
use std::ffi::CString;
#[cfg(unix)]
use std::io::Read;
#[cfg(unix)]
use thiserror::Error;
#[cfg(unix)]
use tokio::runtime::Builder;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[cfg(unix)]
const UNPRIVILEGED_USER: &str = "nobody";

/// Failures of a single lifecycle step.
#[cfg(unix)]
#[derive(Debug, Error)]
enum StepError {
    #[error("usage: pg_worker <setup|start|stop> <payload-path>: {0}")]
    Usage(String),
    #[error("failed to read payload {path}: {source}")]
    PayloadRead { path: Utf8PathBuf, source: BoxError },
    #[error("failed to parse payload: {0}")]
    PayloadParse(#[source] serde_json::Error),
    #[error("invalid cluster settings: {0}")]
    Settings(String),
    #[error("failed to switch to {UNPRIVILEGED_USER}: {0}")]
    PrivilegeDrop(String),
    #[error("runtime init failed: {0}")]
    Runtime(#[source] std::io::Error),
    #[error("postgres {step} failed: {reason}")]
    Postgres { step: &'static str, reason: String },
}

#[cfg(unix)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    Setup,
    Start,
    Stop,
}

#[cfg(unix)]
impl Step {
    fn parse(raw: &str) -> Result<Self, StepError> {
        match raw {
            "setup" => Ok(Self::Setup),
            "start" => Ok(Self::Start),
            "stop" => Ok(Self::Stop),
            other => Err(StepError::Usage(format!("unknown step {other:?}"))),
        }
    }

    const fn name(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

#[cfg(unix)]
fn main() -> Result<(), BoxError> {
    let (step, payload_path) = parse_args(std::env::args_os().skip(1))?;
    let payload = read_payload(&payload_path)?;
    become_unprivileged()?;
    let settings = payload
        .settings
        .into_settings()
        .map_err(|err| StepError::Settings(err.to_string()))?;
    apply_environment(&payload.environment);

    let runtime = Builder::new_current_thread()
        .enable_all()
        .build()
        .map_err(StepError::Runtime)?;
    runtime.block_on(run_step(step, PostgreSQL::new(settings)))?;
    Ok(())
}

#[cfg(unix)]
fn parse_args(
    mut args: impl Iterator<Item = std::ffi::OsString>,
) -> Result<(Step, Utf8PathBuf), StepError> {
    let mut next_utf8 = |what: &str| {
        args.next()
            .ok_or_else(|| StepError::Usage(format!("missing {what}")))?
            .into_string()
            .map_err(|_| StepError::Usage(format!("{what} is not valid UTF-8")))
    };
    let step = Step::parse(&next_utf8("step")?)?;
    let payload_path = Utf8PathBuf::from(next_utf8("payload path")?);
    if args.next().is_some() {
        return Err(StepError::Usage("unexpected extra argument".to_owned()));
    }
    Ok((step, payload_path))
}

#[cfg(unix)]
fn read_payload(path: &Utf8Path) -> Result<WorkerPayload, StepError> {
    let read = || -> Result<Vec<u8>, BoxError> {
        let (dir, relative) = ambient_dir_and_path(path)?;
        let mut file = dir.open(relative.as_std_path())?;
        let mut bytes = Vec::new();
        file.read_to_end(&mut bytes)?;
        Ok(bytes)
    };
    let bytes = read().map_err(|source| StepError::PayloadRead {
        path: path.to_owned(),
        source,
    })?;
    serde_json::from_slice(&bytes).map_err(StepError::PayloadParse)
}

#[cfg(unix)]
fn become_unprivileged() -> Result<(), StepError> {
    if !Uid::effective().is_root() {
        return Ok(());
    }
    let drop_err = |err: nix::Error| StepError::PrivilegeDrop(err.to_string());
    let user = User::from_name(UNPRIVILEGED_USER)
        .map_err(drop_err)?
        .ok_or_else(|| StepError::PrivilegeDrop("user not found".to_owned()))?;
    let user_name = CString::new(user.name.clone())
        .map_err(|err| StepError::PrivilegeDrop(err.to_string()))?;
    initgroups(&user_name, user.gid).map_err(drop_err)?;
    setgid(user.gid).map_err(drop_err)?;
    setuid(user.uid).map_err(drop_err)?;

    // SAFETY: no other threads exist yet; the runtime is built afterwards.
    unsafe {
        std::env::set_var("HOME", &user.dir);
        std::env::set_var("USER", &user.name);
        std::env::set_var("LOGNAME", &user.name);
    }
    Ok(())
}

#[cfg(unix)]
fn apply_environment(environment: &[(String, Option<PlainSecret>)]) {
    for (key, value) in environment {
        // SAFETY: still single-threaded; see `become_unprivileged`.
        unsafe {
            match value {
                Some(secret) => std::env::set_var(key, secret.expose()),
                None => std::env::remove_var(key),
            }
        }
    }
}

#[cfg(unix)]
async fn run_step(step: Step, mut postgres: PostgreSQL) -> Result<(), StepError> {
    let failed = |reason: postgresql_embedded::Error| StepError::Postgres {
        step: step.name(),
        reason: reason.to_string(),
    };
    match step {
        Step::Setup => {
            postgres.setup().await.map_err(failed)?;
            start_if_stopped(&mut postgres).await.map_err(failed)
        }
        Step::Start => {
            start_if_stopped(&mut postgres).await.map_err(failed)?;
            // Dropping the handle would stop the server this step started.
            std::mem::forget(postgres);
            Ok(())
        }
        Step::Stop => postgres.stop().await.map_err(failed),
    }
}

#[cfg(unix)]
async fn start_if_stopped(postgres: &mut PostgreSQL) -> Result<(), postgresql_embedded::Error> {
    if matches!(postgres.status(), Status::Started) {
        return Ok(());
    }
    postgres.start().await
}

#[cfg(not(unix))]
fn main() -> Result<(), BoxError> {
    Err("pg_worker is only supported on Unix".into())
}
