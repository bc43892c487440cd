//! # Answer Gate
//!
//! Quality gating and repair for retrieval-augmented answers, with durable
//! per-session conversation history.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────────┐
//! │  gate docs   │──▶│   Session    │──▶│ keyword/embedding│
//! │  add PATH... │   │  JSON record │   │  passage index   │
//! └──────────────┘   └──────┬───────┘   └────────┬─────────┘
//!                           │                    ▼
//!                           │          ┌──────────────────────┐
//!                           │          │ Gate: generate,      │
//!                           │◀─────────│ assess, detect,      │
//!                           │   turn   │ fallback             │
//!                           ▼          └──────────────────────┘
//!                    export json / md
//! ```
//!
//! The gating algorithms live in the `answer-gate-core` crate; this crate
//! adds configuration, persistence, document loading, generation
//! backends, and the `gate` CLI.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing and validation |
//! | [`session`] | File-backed session store |
//! | [`export`] | JSON and Markdown session reports |
//! | [`corpus`] | Local document discovery, chunking, and index building |
//! | [`extract`] | PDF, DOCX and XLSX text extraction |
//! | [`embedding`] | OpenAI embeddings for the embedding retrieval backend |
//! | [`generation`] | Extractive and OpenAI answer generators |
//! | [`ask`] | Gated question answering inside a session |
//! | [`session_cmd`] | `gate session` subcommands |

pub mod ask;
pub mod config;
pub mod corpus;
pub mod embedding;
pub mod export;
pub mod extract;
pub mod generation;
pub mod session;
pub mod session_cmd;
