/// Santa Draw
///
/// The gift-exchange draw engine:
/// - `exclusion`: forbidden giver -> receiver pairs and cheap infeasibility checks
/// - `solver`: randomized backtracking search for a valid assignment
/// - `draw`: transactional draw, preview, receiver lookup and checked exclusion adds
/// - `recrypt` / `verify`: maintenance passes over stored receiver ciphers

pub mod draw;
pub mod error;
pub mod exclusion;
pub mod notify;
pub mod recrypt;
pub mod solver;
pub mod verify;

pub use draw::{DrawService, DrawSummary, Preview};
pub use error::{DrawError, SolverError};
pub use exclusion::ExclusionIndex;
pub use notify::{DrawNotifier, NullNotifier, TracingNotifier};
pub use recrypt::{RecryptJob, RecryptOptions, RecryptReport};
pub use solver::{Matching, MatchingSolver, SolverConfig};
pub use verify::{VerifyReport, verify_ciphers};
