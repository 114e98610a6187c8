//! Typed access to a route tree, over the network or in process.
//!
//! Both strategies share request building ([`build_request`]) and the
//! `{data, error, status, ok, res}` result shape ([`ClientResponse`]):
//!
//! - [`Client`] sends built requests through a [`Transport`] to a base URL and
//!   parses the response by its content type.
//! - [`Caller`] runs the matching route's chain directly and reads the typed
//!   output the handler produced.

mod caller;
mod network;
mod path;
mod request;
mod response;

pub use caller::Caller;
pub use network::{Client, FnTransport, HyperTransport, Transport, transport_fn};
pub use path::{Call, Dispatch, PathNode, RequestInvoker};
pub use request::{BuiltRequest, ClientInput, InputBody, RequestInit, build_request};
pub use response::{ClientResponse, ResponseLike};
