pub mod resume;
pub mod update;

pub use resume::Resume;
pub use update::ResumeUpdate;
