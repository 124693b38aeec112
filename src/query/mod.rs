pub mod callers;
pub mod dead_code;
pub mod paths;
pub mod search;
pub mod trace;

pub use callers::{get_callees, get_callers};
pub use dead_code::{DeadCodeResult, DeadSymbol, find_dead_code};
pub use paths::{PathsResult, find_paths};
pub use search::{compile_pattern, find_symbols};
pub use trace::{TraceDirection, TraceHop, TraceResult, trace};
