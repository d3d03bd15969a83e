pub mod geo;
pub mod history_report;
