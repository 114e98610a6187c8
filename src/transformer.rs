//! Serialization strategies for json-kind payloads and their negotiation.
//!
//! A request names the transformer it wants in the [`TRANSFORMER_HEADER`]
//! header. If a registered transformer carries that name it encodes the
//! response; otherwise the default (plain JSON) does. An unknown name is
//! never an error.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::Result;

/// Request header carrying the desired transformer's registered name.
/// Responses encoded by a non-default transformer echo it back.
pub const TRANSFORMER_HEADER: &str = "x-transformer";

/// A named pair of serialize / deserialize functions.
pub trait Transformer: Send + Sync + 'static {
    fn name(&self) -> &str;
    fn stringify(&self, value: &Value) -> Result<String>;
    fn parse(&self, text: &str) -> Result<Value>;
}

/// Identity JSON encode / decode, registered as `"json"`.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonTransformer;

impl Transformer for JsonTransformer {
    fn name(&self) -> &str { "json" }

    fn stringify(&self, value: &Value) -> Result<String> {
        Ok(serde_json::to_string(value)?)
    }

    fn parse(&self, text: &str) -> Result<Value> {
        Ok(serde_json::from_str(text)?)
    }
}

/// The registered transformers. The default is always first.
///
/// Immutable once handed to an [`App`](crate::App) or client; cloning shares
/// the transformer instances.
#[derive(Clone)]
pub struct Transformers {
    list: Vec<Arc<dyn Transformer>>,
}

impl Transformers {
    /// A registry holding only the default JSON transformer.
    pub fn new() -> Self {
        Self { list: vec![Arc::new(JsonTransformer)] }
    }

    /// Registers `transformer`. A transformer with the same name as an
    /// existing entry replaces it in place, so registering `"json"` swaps the
    /// default.
    pub fn register(mut self, transformer: impl Transformer) -> Self {
        let transformer: Arc<dyn Transformer> = Arc::new(transformer);
        match self.list.iter_mut().find(|t| t.name() == transformer.name()) {
            Some(slot) => *slot = transformer,
            None => self.list.push(transformer),
        }
        self
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn Transformer>> {
        self.list.iter().find(|t| t.name() == name)
    }

    pub fn default_transformer(&self) -> &Arc<dyn Transformer> {
        &self.list[0]
    }

    pub fn is_default(&self, transformer: &dyn Transformer) -> bool {
        self.default_transformer().name() == transformer.name()
    }

    /// Selects the transformer for one request.
    pub fn negotiate(&self, requested: Option<&str>) -> Arc<dyn Transformer> {
        if let Some(name) = requested {
            if let Some(found) = self.get(name) {
                return Arc::clone(found);
            }
            tracing::debug!(transformer = name, "unknown transformer, using default");
        }
        Arc::clone(self.default_transformer())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Transformer>> {
        self.list.iter()
    }
}

impl Default for Transformers {
    fn default() -> Self { Self::new() }
}

impl fmt::Debug for Transformers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.list.iter().map(|t| t.name())).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Upper;

    impl Transformer for Upper {
        fn name(&self) -> &str { "upper" }
        fn stringify(&self, value: &Value) -> Result<String> {
            Ok(serde_json::to_string(value)?.to_uppercase())
        }
        fn parse(&self, text: &str) -> Result<Value> {
            Ok(serde_json::from_str(&text.to_lowercase())?)
        }
    }

    #[test]
    fn negotiation_prefers_a_matching_name() {
        let registry = Transformers::new().register(Upper);
        assert_eq!(registry.negotiate(Some("upper")).name(), "upper");
        assert_eq!(registry.negotiate(Some("json")).name(), "json");
    }

    #[test]
    fn negotiation_falls_back_to_default() {
        let registry = Transformers::new().register(Upper);
        assert_eq!(registry.negotiate(None).name(), "json");
        assert_eq!(registry.negotiate(Some("msgpack")).name(), "json");
    }

    #[test]
    fn registering_an_existing_name_replaces_it() {
        struct Pretty;
        impl Transformer for Pretty {
            fn name(&self) -> &str { "json" }
            fn stringify(&self, value: &Value) -> Result<String> {
                Ok(serde_json::to_string_pretty(value)?)
            }
            fn parse(&self, text: &str) -> Result<Value> {
                Ok(serde_json::from_str(text)?)
            }
        }

        let registry = Transformers::new().register(Pretty);
        assert_eq!(registry.iter().count(), 1);
        let out = registry.negotiate(None).stringify(&serde_json::json!({"a": 1})).unwrap();
        assert!(out.contains('\n'));
    }

    #[test]
    fn only_the_first_entry_is_default() {
        let registry = Transformers::new().register(Upper);
        assert!(registry.is_default(&JsonTransformer));
        assert!(!registry.is_default(&Upper));
        assert!(registry.is_default(&*registry.negotiate(Some("msgpack"))));
    }
}
