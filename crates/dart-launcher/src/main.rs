//! `dart-launcher` (spec §6 CLI surface, ABI exit codes): spawns `n` copies
//! of a target executable, appending the four `--dart-*` flags each unit's
//! `dart_init`/`dart_init_thread` scans for.
//!
//! Grounded on `dartrun.c`/`dart_spawn`
//! (`examples/original_source/dart-impl/shmem/dart-shmem/dartrun.c`): the
//! original creates one `SysV` shared-memory "syncarea" up front, forks
//! `nprocs` children, `execv`s each with `--dart-id=`/`--dart-size=`/
//! `--dart-syncarea_id=`/`--dart-syncarea_size=` appended, then waits for
//! all of them. We keep the same shape with `std::process::Command`
//! instead of `fork`/`execv`, and a process id in place of the original's
//! SysV shm key (this workspace's in-process transport has no shared-memory
//! segment of its own to identify; the field is carried through for ABI
//! parity with a future out-of-process backend, per spec §6's "Launcher-
//! specific variables for `(my_id, size, syncarea_id, syncarea_size)`").

use clap::Parser;
use std::path::PathBuf;
use std::process::{Command, ExitCode, Stdio};

/// `EXIT_SUCCESS`/`EXIT_FAILURE`/`ASSERT` from spec §6's CLI surface.
const DART_EXIT_SUCCESS: u8 = 0;
const DART_EXIT_FAILURE: u8 = 1;
const DART_EXIT_ASSERT: i32 = -6;

/// Default syncarea size: 4096 * 8 bytes, matching `dartrun.c`'s
/// `syncarea_size` constant.
const DEFAULT_SYNCAREA_SIZE: usize = 4096 * 8;

/// Runs `n` copies of `executable`, each seeing its own `--dart-id=`.
#[derive(Debug, Parser)]
#[command(name = "dart-launcher", about = "Spawn n copies of a DART unit executable")]
struct Options {
    /// Number of units to spawn.
    #[arg(short = 'n', value_name = "N")]
    nprocs: usize,

    /// Path to the unit executable.
    executable: PathBuf,

    /// Arguments forwarded verbatim to every spawned copy.
    #[arg(trailing_var_arg = true)]
    args: Vec<String>,
}

fn main() -> ExitCode {
    env_logger::Builder::from_env(
        env_logger::Env::default().filter_or("DART_LOG_LEVEL", "warn"),
    )
    .init();

    let opts = Options::parse();
    if opts.nprocs == 0 {
        log::error!("dart-launcher: -n must be a positive integer");
        return ExitCode::from(DART_EXIT_FAILURE);
    }

    match run(&opts) {
        Ok(true) => ExitCode::from(DART_EXIT_SUCCESS),
        Ok(false) => ExitCode::from(DART_EXIT_FAILURE),
        Err(err) => {
            log::error!("dart-launcher: {err}");
            ExitCode::from(DART_EXIT_ASSERT.unsigned_abs() as u8)
        }
    }
}

/// Spawns `opts.nprocs` copies of `opts.executable`, waits for all of
/// them, and reports whether every child exited successfully.
fn run(opts: &Options) -> std::io::Result<bool> {
    // Stands in for `dartrun.c`'s `shmem_mm_create`/`shmem_syncarea_init`:
    // a single id shared by every spawned unit identifying this run's
    // syncarea, carried through as an ABI-compatible flag even though the
    // in-process transport resolves rendezvous on its own.
    let syncarea_id = std::process::id() as usize;
    let syncarea_size = DEFAULT_SYNCAREA_SIZE;

    log::info!(
        "dart-launcher: spawning {} unit(s) of {:?}",
        opts.nprocs,
        opts.executable
    );

    let mut children = Vec::with_capacity(opts.nprocs);
    for id in 0..opts.nprocs {
        let child = Command::new(&opts.executable)
            .args(&opts.args)
            .arg(format!("--dart-id={id}"))
            .arg(format!("--dart-size={}", opts.nprocs))
            .arg(format!("--dart-syncarea_id={syncarea_id}"))
            .arg(format!("--dart-syncarea_size={syncarea_size}"))
            .stdin(Stdio::inherit())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()?;
        children.push(child);
    }

    let mut all_ok = true;
    for (id, mut child) in children.into_iter().enumerate() {
        let status = child.wait()?;
        if !status.success() {
            log::error!("dart-launcher: unit {id} exited with {status}");
            all_ok = false;
        }
    }
    Ok(all_ok)
}
