//! Fetching, table extraction, and field normalization for regulatory
//! decision pages.
//!
//! This crate provides:
//! - [`fetch`]: HTTP fetcher with timeout and content hashing
//! - [`sources`]: Per-source adapters ([`GifAdapter`], [`UrplAdapter`]) and the [`SourceRegistry`]
//! - [`extract`]: Decisions table to [`RawRow`] extraction
//! - [`normalize`]: Entity decoding, decision type mapping, date parsing

pub mod extract;
pub mod fetch;
pub mod normalize;
pub mod sources;

pub use extract::{RawEntry, RawRow, extract_rows};
pub use fetch::{FetchedPage, HttpFetcher, compute_hash};
pub use normalize::{
    DECISION_DATE_FORMAT, decode_entities, is_placeholder_name, map_decision_type,
    parse_decision_date,
};
pub use sources::{
    ColumnLayout, GifAdapter, SourceAdapter, SourceRegistry, UrplAdapter, adapter_for,
};
