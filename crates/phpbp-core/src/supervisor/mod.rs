//! Runtime supervision of nginx and php-fpm.
//!
//! `boot` renders the final config from the compiled layout, sizes the
//! php-fpm pool, streams the logs and hands both daemons to the
//! [`Supervisor`]. Whichever daemon ends first ends the run.

mod boot;
mod process;
mod runner;
mod sizing;
mod tail;

pub use boot::{boot, Boot, BootOptions, DEFAULT_PORT};
pub use process::{ProcessExit, ProcessSpec};
pub use runner::{Supervisor, SupervisorState, FATAL_EXIT_CODE};
pub use sizing::{
    effective_memory_limit, parse_budget, parse_size, CommandOracle, MemoryAutotune, Sizing, SizingOracle,
    DEFAULT_MEMORY_BUDGET,
};
pub use tail::LogTailer;
