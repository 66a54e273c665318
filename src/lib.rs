//! Core of a PAE fragmentation front end: ingestion and normalization of
//! Predicted Aligned Error matrices, a content-addressed cache of rendered
//! error-matrix plots with time-based eviction, and the pipeline that wires
//! acquisition, clustering and rendering together.
//!
//! The HTTP layer and the clustering algorithm live elsewhere; the former
//! drives [`pipeline::IngestionPipeline`], the latter plugs in through
//! [`cluster::FragmentClusterer`].

pub mod afdb;
pub mod cache;
pub mod cluster;
pub mod error;
pub mod matrix;
pub mod pipeline;
pub mod plot;
pub mod settings;
pub mod structure_format;
