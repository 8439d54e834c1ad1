//! Core tool model: the stream primitive, tool contracts, callback chains,
//! toolsets, name filters, and the small template/artifact-path support
//! utilities shared by the rest of the toolkit.

pub mod artifact_path;
pub mod callback;
pub mod context;
pub mod error;
pub mod filter;
pub mod schema;
pub mod stream;
pub mod template;
pub mod tool;
pub mod toolset;

pub use callback::{AfterCallback, BeforeCallback, BeforeOutcome, CallbackChain};
pub use context::{ContextualTool, Invocation, Session, ToolContext, ToolContextExt};
pub use error::{CoreError, CoreResult};
pub use filter::{Composite, Exclude, Filter, FuncFilter, Include, NoFilter, PatternExclude, PatternInclude, PatternTarget};
pub use schema::{
    describe_field, synthesize, type_key_of, FieldKind, FieldSchema, FieldSpec, FieldTag, Reflect, ReflectCtx, Schema, SchemaBuilder,
};
pub use stream::{stream, ChunkMetadata, StreamChunk, StreamReader, StreamWriter, DEFAULT_STREAM_CAPACITY};
pub use tool::{CallableTool, Declaration, StreamableTool, Tool};
pub use toolset::{NamedToolSet, ToolHandle, ToolSet};
