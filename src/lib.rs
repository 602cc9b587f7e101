//! barsplit - split scanned PDF batches into per-delivery documents.
//!
//! Each page is rasterized and scanned for two barcode markers: a delivery
//! number and a customer name. Pages are grouped by that pair, orphan pages are
//! folded in according to an [`models::AssignmentPolicy`], and every group is
//! written as its own PDF with a CSV audit trail.

pub mod barcode;
pub mod cli;
pub mod config;
pub mod diagnostics;
pub mod models;
pub mod pdf;
pub mod services;
