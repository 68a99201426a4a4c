pub mod utils;

mod reconciler;
mod students;
