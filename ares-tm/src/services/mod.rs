//! Service modules for credit resolution and reconciliation
//!
//! Parsing side: graph resolver, credit parser, franchise resolver.
//! Store side: reconciler plus the HTTP store client. The in-memory store
//! is built for tests and with the `test-util` feature.
//! File side: ID3 tag synchronizer.

pub mod credit_parser;
pub mod customization_client;
pub mod franchise_resolver;
pub mod graph_resolver;
pub mod id3_tags;
#[cfg(any(test, feature = "test-util"))]
pub mod memory_store;
pub mod reconciler;

pub use credit_parser::{split_credits, tokenize, CreditParser, ParsedCredit};
pub use customization_client::CustomizationClient;
pub use franchise_resolver::{resolve_franchise, FranchiseCatalog, FranchiseNotConfiguredError};
pub use graph_resolver::{
    reorder_voice_actor_pairs, CreditSlot, GraphError, GraphResolver, MalformedGraphError,
    RelationNode, RelationRecord, ResolvedGraph,
};
pub use id3_tags::Id3TagSynchronizer;
#[cfg(any(test, feature = "test-util"))]
pub use memory_store::{MemoryStore, StoreCall};
pub use reconciler::{
    AliasOutcome, EntityReport, HydrationReport, IdentityOutcome, ReconcileError,
    ReconcileReport, Reconciler,
};
