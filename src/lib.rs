pub mod arm64x;
pub mod clone_cp;
pub mod commands;
pub mod condition;
pub mod error;
pub mod sln;
pub mod vcxproj;

pub use arm64x::setup_arm64x;
pub use clone_cp::{CloneOutcome, CloneRequest, ProjectFilter, clone_platform};
pub use commands::{CloneConfiguration, clone_configuration, fixup_project};
pub use condition::ConfigPlatform;
pub use error::{Error, Result};
pub use sln::Solution;
pub use vcxproj::Vcxproj;
