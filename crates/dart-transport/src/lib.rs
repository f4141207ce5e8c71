//! Transport port (spec §4.F): the `Communicator`/`Window` trait pair that
//! the team, RMA, collective and lock layers program against, plus the
//! one concrete backend this workspace ships — an in-process, multi-unit
//! stand-in for the out-of-scope MPI-3/GASPI/POSIX-shmem backends.

mod local;
mod port;

pub use local::LocalCommunicator;
pub use port::{Communicator, Window};
