pub mod assignments;
pub mod attendance;
pub mod exams;
pub mod holidays;
pub mod sessions;
pub mod students;
pub mod users;

pub use assignments::*;
pub use attendance::*;
pub use exams::*;
pub use holidays::*;
pub use sessions::*;
pub use students::*;
pub use users::*;
