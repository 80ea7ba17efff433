//! Core library for the lcams-tools command line application.
//!
//! The library imports grading workbooks exported by the national grading
//! platform into two stores: a normalized relational database and a
//! cumulative ledger workbook. Readers and writers of workbooks live under
//! [`lcams::tools::io`], header mapping in [`lcams::tools::normalize`], the
//! relational schema and its loader in [`lcams::tools::store`], and the
//! commands that keep both stores in step in [`lcams::tools::sync`].

pub mod lcams;

pub use lcams::tools::{
    Result, ToolError, coerce, config, error, io, logging, model, normalize, store, sync,
};
