//! # grex-rs
//!
//! `grex-rs` is a pure Rust engine for identifying and extracting the files stored in
//! game archive containers. Container formats are described by pluggable format
//! descriptors; the engine scores every descriptor against an unidentified file,
//! parses the directory of the best match, and extracts entries lazily.
//!
//! ## Features
//! - Heuristic format detection over extensions, magic signatures and header fields
//! - Lazy resources: raw spans, spans behind a codec, and chunked resources
//! - Built-in codecs: zlib, raw deflate, LZSS, PackBits RLE, XOR, tagged frames
//! - Block-wise decoding for containers that compress in independent windows
//! - Bounds checking of every structural field read from untrusted input
//! - Reconciliation of split volumes, hierarchical names and hashed names
//! - Reference descriptors for Quake `PACK` and BLTE encoded blobs
//!
//! ## Usage
//! Add to your `Cargo.toml`:
//! ```toml
//! [dependencies]
//! grex-rs = "0.1"
//! ```
//!
//! ### Example: Detecting and Extracting an Archive
//! ```no_run
//! use grex_rs::{DetectionEngine, ExtensionSniffPass, Reconciler};
//!
//! // Register the built-in descriptors with the default configuration
//! let engine = DetectionEngine::default();
//!
//! // Detect the format and parse the directory
//! let mut archive = engine.open_path("id1/pak0.pak").unwrap();
//! println!("{} is a {} archive", archive.file_name(), archive.format().name);
//!
//! // Give unnamed entries an extension from their content
//! let mut reconciler = Reconciler::new();
//! reconciler.push(ExtensionSniffPass::new());
//! archive.reconcile(&reconciler).unwrap();
//!
//! // Extract a single file, or everything
//! let palette = archive.extract("gfx/palette.lmp").unwrap();
//! let report = archive.extract_to("out").unwrap();
//! println!("{} extracted, {} failed", report.extracted.len(), report.failed.len());
//! ```

pub mod archive;
pub mod block_codec;
pub mod chunked_resource;
pub mod codec;
pub mod descriptors;
pub mod detection;
pub mod engine_config;
pub mod entry;
pub mod error;
mod ext;
pub mod file_type_hints;
pub mod reconcile;
pub mod resource;
pub mod resource_flags;
pub mod resource_stream;
pub mod source;
mod utility;
pub mod validator;
pub mod volume_set;

pub use archive::{Archive, ExtractionReport};
pub use block_codec::{BlockCodecAdapter, CancelToken};
pub use chunked_resource::{Chunk, ChunkedResource};
pub use codec::Codec;
pub use detection::{DetectionEngine, FormatDescriptor, Probe};
pub use engine_config::EngineConfig;
pub use entry::Entry;
pub use error::GrexError;
pub use file_type_hints::FileTypeHints;
pub use reconcile::{ExtensionSniffPass, HashRenamePass, NameDictionary, Reconciler};
pub use resource::Resource;
pub use resource_flags::ResourceFlags;
pub use source::Source;
pub use validator::Validator;
pub use volume_set::VolumeSet;
