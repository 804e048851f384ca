pub mod host_script;
pub mod outcome_writer;
