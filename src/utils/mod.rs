pub mod glob;
pub mod paths;
pub mod shellquote;
