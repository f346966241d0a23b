// Outdated-query scanning

mod scan;

pub use scan::DueQueryScanner;
