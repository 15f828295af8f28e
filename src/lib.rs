//! Response resolver and shaper for a federated GraphQL gateway.
//!
//! Given a typed response plan and the raw JSON a set of subgraph fetches
//! produced, [`resolver::Resolvable`] walks the two together and writes a
//! GraphQL response document: null propagation, `@skip`/`@include`,
//! interface/union dispatch by `__typename`, and field-level authorization
//! are all handled here. Query planning, fetch execution, and the
//! authorizer/rate-limiter/tracer implementations themselves are out of
//! scope — this crate only consumes their output.

pub mod arena;
pub mod authorization;
pub mod config;
pub mod context;
pub mod error;
pub mod extensions;
pub mod path;
pub mod plan;
pub mod resolver;
pub mod response;
pub mod walker;

pub use config::ResolverOptions;
pub use context::Context;
pub use error::{ResolverError, Result};
pub use plan::{Field, PlanNode};
pub use resolver::{Resolvable, SubscriptionPostProcessing};
pub use response::GraphQLError;
