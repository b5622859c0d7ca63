//! HTTP Route Handlers

pub mod predictions;
