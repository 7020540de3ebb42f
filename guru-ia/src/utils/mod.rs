//! Utility functions for guru-ia

pub mod json_extract;
