pub mod cap_table;
pub mod note;
pub mod scenarios;
