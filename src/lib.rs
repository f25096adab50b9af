//! A row mapper and parameter binder for ADO-style database drivers.
//!
//! The crate has no opinion on wire protocol, connection pooling, or
//! session lifecycle — those belong to a [`driver::Connection`]
//! implementation the caller supplies (see [`sqlx_any`] for a reference
//! one). What it owns is: binding parameters from an entity's fields or
//! a dynamic bag ([`binder`]), matching result columns to a type's
//! construction strategy and caching that match ([`reflect`],
//! [`decode`]), reading multi-statement batches in sequence ([`grid`]),
//! and the small set of query operations callers actually call
//! ([`facade`]).

pub mod binder;
pub mod coltype;
pub mod decode;
pub mod driver;
pub mod error;
pub mod grid;
pub mod handlers;
pub mod ident;
pub mod reflect;
pub mod sqlx_any;

pub mod facade;

pub use binder::{BindableEntity, BindableField, BindableParam, ParamBag, ParamSource};
pub use coltype::{ColumnKind, ColumnKindHint, ColumnResolution, ColumnType};
pub use decode::DecodePlan;
pub use driver::{CancelSignal, Command, Connection, DbTypeHint, DbValue, NoCancel, Parameter, RowReader, Transaction};
pub use error::{MapperError, MapperResult};
pub use facade::{
    execute, execute_scalar, query, query_first_or_default, query_multiple, query_single,
    query_single_or_default, ExecutionContext,
};
pub use grid::GridReader;
pub use handlers::enum_handler::{DbEnum, EnumHandler};
pub use handlers::{HandlerRegistry, TypeHandler};
pub use ident::snake_to_pascal;
pub use reflect::{
    ConstructionStrategy, ConstructionStrategyBuilder, CtorParamDescriptor, MappedEntity, SettableField,
    StrategyCache,
};
