//! # Answer Gate Core
//!
//! Pure gating logic for retrieval-augmented answers: quality scoring,
//! hallucination detection, fallback retrieval, and the collaborator
//! traits they run against.
//!
//! This crate does no filesystem or network I/O. Retrieval and
//! generation are reached only through [`collab::Retriever`] and
//! [`collab::Generator`].
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`models`] | Passages, assessments, reports, gated answers |
//! | [`config`] | Scoring weights, thresholds, retrieval parameters |
//! | [`text`] | Sentence and word helpers shared by the scorers |
//! | [`chunk`] | Paragraph-boundary passage splitter |
//! | [`quality`] | Answer quality assessor |
//! | [`hallucination`] | Hallucination detector and report renderer |
//! | [`fallback`] | Fallback strategy selection and execution |
//! | [`collab`] | Retriever, generator and embedder traits; in-memory and embedding backends |
//! | [`gate`] | The single-question gate procedure |

pub mod chunk;
pub mod collab;
pub mod config;
pub mod fallback;
pub mod gate;
pub mod hallucination;
pub mod models;
pub mod quality;
pub mod text;
